use chrono::NaiveDateTime;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

use crate::database::from_db_datetime;
use crate::dialogue::{DaySlots, SlotChoice, USER_DATE_FORMAT, USER_TIME_FORMAT};
use crate::models::booking::ExportRow;

pub const USER_DATETIME_FORMAT: &str = "%d.%m.%Y %H:%M";

/// Parses the admin-facing "ДД.ММ.ГГГГ ЧЧ:ММ" form.
pub fn parse_datetime_ru(raw: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw.trim(), USER_DATETIME_FORMAT).ok()
}

pub fn format_date_ru(dt: NaiveDateTime) -> String {
    dt.format(USER_DATE_FORMAT).to_string()
}

pub fn format_time_ru(dt: NaiveDateTime) -> String {
    dt.format(USER_TIME_FORMAT).to_string()
}

pub fn slot_label(slot: &SlotChoice) -> String {
    match &slot.photographer {
        Some(username) => format!("{} (@{})", slot.time, username),
        None => slot.time.clone(),
    }
}

pub fn make_dates_keyboard(days: &[DaySlots]) -> InlineKeyboardMarkup {
    let rows = days
        .iter()
        .map(|day| {
            vec![InlineKeyboardButton::callback(
                day.date.clone(),
                format!("date:{}", day.date),
            )]
        })
        .collect::<Vec<_>>();
    InlineKeyboardMarkup::new(rows)
}

pub fn make_times_keyboard(day: &DaySlots) -> InlineKeyboardMarkup {
    let rows = day
        .slots
        .iter()
        .map(|slot| {
            vec![InlineKeyboardButton::callback(
                slot_label(slot),
                format!("time:{}", slot.slot_id),
            )]
        })
        .collect::<Vec<_>>();
    InlineKeyboardMarkup::new(rows)
}

pub fn confirm_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![
            InlineKeyboardButton::callback("✏️ Изменить имя", "edit:name"),
            InlineKeyboardButton::callback("✏️ Изменить телефон", "edit:phone"),
        ],
        vec![
            InlineKeyboardButton::callback("✅ Подтвердить", "confirm:yes"),
            InlineKeyboardButton::callback("❌ Отмена", "confirm:no"),
        ],
    ])
}

pub fn admin_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![InlineKeyboardButton::callback("➕ Добавить слот", "admin:addslot")],
        vec![InlineKeyboardButton::callback("🗑️ Удалить слот", "admin:delslot")],
        vec![InlineKeyboardButton::callback("📤 Экспорт записей", "admin:export")],
        vec![InlineKeyboardButton::callback("📝 Редактировать шаблоны", "admin:templates")],
        vec![InlineKeyboardButton::callback("📊 Статистика", "admin:stats")],
        vec![InlineKeyboardButton::callback("📸 Управление фотографами", "admin:photographers")],
        vec![InlineKeyboardButton::callback("📬 Отзывы", "admin:feedbacks")],
        vec![InlineKeyboardButton::callback("🎁 Скидки", "admin:discounts")],
        vec![InlineKeyboardButton::callback("🔐 Сменить пароль", "admin:changepw")],
        vec![InlineKeyboardButton::callback("🚪 Выйти", "admin:logout")],
    ])
}

pub fn discount_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![InlineKeyboardButton::callback("✏️ Изменить процент", "discount:percent")],
        vec![InlineKeyboardButton::callback("✏️ Изменить кол-во отзывов", "discount:reviews")],
        vec![InlineKeyboardButton::callback("🔙 Назад", "admin:back")],
    ])
}

pub fn photo_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![
        InlineKeyboardButton::callback("✅ Да", "feedback:yes"),
        InlineKeyboardButton::callback("❌ Нет", "feedback:no"),
    ]])
}

pub fn rating_keyboard() -> InlineKeyboardMarkup {
    let row = (1..=5)
        .map(|n| InlineKeyboardButton::callback(format!("{n}⭐"), format!("rating:{n}")))
        .collect::<Vec<_>>();
    InlineKeyboardMarkup::new(vec![row])
}

pub fn language_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![
        InlineKeyboardButton::callback("🇷🇺 Русский", "lang:ru"),
        InlineKeyboardButton::callback("🇬🇧 English", "lang:en"),
    ]])
}

pub fn logout_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![
        InlineKeyboardButton::callback("✅ Да", "logout:yes"),
        InlineKeyboardButton::callback("❌ Нет", "logout:no"),
    ]])
}

/// Plain-text CSV rendering of the export listing.
pub fn bookings_csv(rows: &[ExportRow]) -> String {
    let mut lines = vec!["Дата,Время,Имя,Телефон,Тип съёмки,Дата записи,Фотограф".to_string()];

    for row in rows {
        let (date, time) = match from_db_datetime(&row.datetime) {
            Some(dt) => (format_date_ru(dt), format_time_ru(dt)),
            None => (row.datetime.clone(), String::new()),
        };
        let created = from_db_datetime(&row.created_at)
            .map(|dt| dt.format(USER_DATETIME_FORMAT).to_string())
            .unwrap_or_else(|| row.created_at.clone());
        let photographer = row.photographer.as_deref().unwrap_or("Не назначен");

        lines.push(format!(
            "{},{},{},{},{},{},{}",
            date,
            time,
            csv_escape(&row.name),
            row.contact,
            csv_escape(&row.shoot_type),
            created,
            photographer
        ));
    }

    lines.join("\n")
}

fn csv_escape(field: &str) -> String {
    if field.contains(',') {
        format!("\"{}\"", field)
    } else {
        field.to_string()
    }
}

/// At least 8 chars with an uppercase letter, a digit and a special char.
pub fn is_strong_password(password: &str) -> bool {
    password.chars().count() >= 8
        && password.chars().any(|c| c.is_uppercase())
        && password.chars().any(|c| c.is_ascii_digit())
        && password.chars().any(|c| !c.is_alphanumeric())
}
