//! User-facing message templates: compiled-in defaults merged with
//! overrides from templates.json, editable at runtime by admins.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::RwLock;

#[derive(Clone)]
pub struct Templates {
    inner: Arc<RwLock<HashMap<String, String>>>,
    path: PathBuf,
}

impl Templates {
    /// Loads overrides from `path` on top of the defaults. A missing or
    /// unreadable file falls back to defaults; keys absent from the file are
    /// backfilled so `render` never misses.
    pub fn load(path: &Path) -> Self {
        let mut map = defaults();

        match std::fs::read_to_string(path) {
            Ok(raw) => match serde_json::from_str::<HashMap<String, String>>(&raw) {
                Ok(overrides) => {
                    for (key, text) in overrides {
                        if map.contains_key(&key) {
                            map.insert(key, text);
                        } else {
                            log::warn!("Ignoring unknown template key '{}' in {:?}", key, path);
                        }
                    }
                }
                Err(e) => {
                    log::error!("Failed to parse {:?}: {}. Using default templates", path, e);
                }
            },
            Err(_) => {
                log::info!("No template file at {:?}, using defaults", path);
            }
        }

        Templates {
            inner: Arc::new(RwLock::new(map)),
            path: path.to_path_buf(),
        }
    }

    pub async fn get(&self, key: &str) -> String {
        let map = self.inner.read().await;
        match map.get(key) {
            Some(text) => text.clone(),
            None => {
                log::error!("Missing template key '{}'", key);
                key.to_string()
            }
        }
    }

    /// `{placeholder}` substitution over the template text.
    pub async fn render(&self, key: &str, fields: &[(&str, &str)]) -> String {
        let mut text = self.get(key).await;
        for (name, value) in fields {
            text = text.replace(&format!("{{{name}}}"), value);
        }
        text
    }

    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.inner.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.inner.read().await.contains_key(key)
    }

    /// Updates a known key and persists the whole map. Returns false for an
    /// unknown key. The lock is held across the file write so concurrent
    /// updates cannot persist a stale snapshot over a newer one.
    pub async fn set(&self, key: &str, text: &str) -> std::io::Result<bool> {
        let mut map = self.inner.write().await;
        if !map.contains_key(key) {
            return Ok(false);
        }
        map.insert(key.to_string(), text.to_string());

        let json = serde_json::to_string_pretty(&*map)?;
        std::fs::write(&self.path, json)?;
        Ok(true)
    }
}

fn defaults() -> HashMap<String, String> {
    let pairs: &[(&str, &str)] = &[
        ("start", "Привет! Я бот для записи на фотосессии. Нажмите /book, чтобы записаться."),
        ("help_text", "📋 Доступные команды:\n/start - начать работу\n/book - записаться\n/mybooking - ваша запись\n/feedback - оставить отзыв\n/language - язык\n/faq - вопросы\n/help - справка"),
        ("faq_text", "❓ Часто задаваемые вопросы:\n\n1. Как записаться?\n - Используйте /book\n\n2. Можно ли перенести запись?\n - Да, напишите администратору"),
        ("no_free_slots", "😔 На данный момент нет свободных слотов для записи."),
        ("ask_date", "📆 Выберите дату для фотосессии:"),
        ("ask_time", "⏰ Выберите время для фотосессии:"),
        ("ask_type", "📷 Какой вид съёмки вы хотите? (например, портрет, свадьба)"),
        ("ask_name", "👤 Пожалуйста, введите ваше имя:"),
        ("ask_contact", "📞 Отправьте контактный телефон (или введите вручную):"),
        ("type_invalid", "❌ Укажите вид съёмки текстом до 100 символов."),
        ("name_invalid", "❌ Имя должно содержать только буквы и быть длиной 2-30 символов."),
        ("phone_invalid", "❌ Неверный формат телефона. Введите номер в формате +71234567890 или 81234567890."),
        ("edit_name_prompt", "✏️ Введите новое имя:"),
        ("edit_phone_prompt", "✏️ Введите новый телефон:"),
        ("confirm_details", "Проверьте данные записи:\nДата: {date}\nВремя: {time}\nТип съёмки: {shoot_type}\nИмя: {name}\nТелефон: {phone}\n\nПодтвердить запись?"),
        ("booking_confirmed", "✅ Ваша запись подтверждена на {date} {time}! Спасибо!"),
        ("booking_cancelled", "❌ Запись отменена. Если хотите начать заново, отправьте /book."),
        ("slot_taken_error", "❗ Этот слот уже занят, выберите другое время."),
        ("double_booking_error", "❗ Вы уже записаны на эту дату."),
        ("already_booked_error", "❗ Вы уже записаны на этот временной слот."),
        ("confirmation_card", "📷 Ваша фотосессия подтверждена!\n\n📅 Дата: {date}\n⏰ Время: {time}\n👤 Имя: {name}\n📞 Телефон: {phone}\n📸 Тип съемки: {shoot_type}\n\nСохраните эту карточку!"),
        ("admin_new_booking", "✅ Новая запись!\nДата: {date} {time}\nКлиент: {name}\nТел: {phone}\nТип: {shoot_type}"),
        ("photographer_notify", "📸 Новая запись:\nДата: {date}\nВремя: {time}\nКлиент: {name}\nТел: {phone}"),
        ("photographer_assigned", "📸 Ваш фотограф: @{username}"),
        ("no_active_bookings", "ℹ️ У вас нет активных записей. Используйте /book для записи."),
        ("mybooking_header", "✅ Ваша текущая запись:"),
        ("reminder_client", "🔔 Напоминание: завтра в {time} у вас фотосессия!"),
        ("reminder_admin", "🔔 Напоминание: завтра в {time} фотосессия с {name} (тел: {phone})."),
        ("review_request", "🌟 Как прошла ваша фотосессия?\nПожалуйста, поделитесь впечатлением — отправьте команду /feedback 💬"),
        ("feedback_prompt", "📝 Пожалуйста, напишите ваш отзыв о фотосессии:"),
        ("feedback_photo_prompt", "📸 Хотите прикрепить фото к отзыву?"),
        ("feedback_send_photo", "📸 Отправьте фото для отзыва:"),
        ("feedback_rating_prompt", "⭐ Оцените фотосессию от 1 до 5:"),
        ("feedback_thanks", "🙏 Спасибо за ваш отзыв!"),
        ("feedback_received", "📩 Новый отзыв от {name} (ID: {user_id}):\n\n{feedback}\n\nРейтинг: {rating}/5"),
        ("feedback_none", "📭 Отзывов пока нет."),
        ("feedback_no_more", "✅ Отзывов больше нет."),
        ("feedback_entry", "👤 {name}\n🗓 {date}\n⭐ Рейтинг: {rating}\n\n{text}"),
        ("discount_info", "🎉 Вам доступна скидка {percent}% за {reviews} отзывов!"),
        ("discount_settings", "🎁 Текущие настройки скидок:\n\nПроцент скидки: {percent}%\nМинимальное количество отзывов: {reviews}\n\nИзменить настройки:"),
        ("discount_percent_prompt", "Введите новый процент скидки (0-100):"),
        ("discount_reviews_prompt", "Введите новое минимальное количество отзывов:"),
        ("discount_percent_set", "✅ Процент скидки изменен на {value}%"),
        ("discount_reviews_set", "✅ Минимальное количество отзывов изменено на {value}"),
        ("discount_percent_invalid", "❌ Ошибка: процент должен быть от 0 до 100"),
        ("discount_reviews_invalid", "❌ Ошибка: количество отзывов должно быть положительным"),
        ("language_select", "🌐 Текущий язык: {current}\nВыберите язык:"),
        ("language_set", "🌐 Язык изменён на {language}"),
        ("stats_text", "📊 Статистика:\n\nВсего записей: {total}\nЗа неделю: {last_week}\nСвободных слотов: {free_slots}\nСредний рейтинг: {avg_rating}"),
        ("admin_enter_password", "🔐 Введите пароль администратора:"),
        ("admin_login_success", "✅ Режим администратора активирован."),
        ("admin_login_fail", "❌ Неверный пароль."),
        ("admin_access_denied", "❌ Доступ запрещен"),
        ("admin_menu_title", "⚙️ Панель администратора:"),
        ("admin_add_slot_prompt", "📅 Отправьте дату и время нового слота (ДД.ММ.ГГГГ ЧЧ:ММ, можно добавить @username фотографа):"),
        ("admin_add_slot_success", "✅ Слот {date} {time} добавлен."),
        ("admin_add_slot_exists", "⚠️ Такой слот уже существует."),
        ("admin_bad_datetime", "❌ Неверный формат времени (нужно ДД.ММ.ГГГГ ЧЧ:ММ)."),
        ("admin_del_slot_prompt", "❌ Отправьте дату и время слота для удаления (ДД.ММ.ГГГГ ЧЧ:ММ):"),
        ("admin_del_slot_success", "✅ Слот {date} {time} удалён."),
        ("admin_del_slot_not_found", "⚠️ Слот с такой датой и временем не найден."),
        ("admin_del_slot_booked", "⚠️ Нельзя удалить слот: на него есть запись."),
        ("admin_export_success", "✅ Экспортировано записей: {count}."),
        ("admin_export_no_data", "⚠️ Записей для экспорта нет."),
        ("admin_template_list", "📋 Список шаблонов: {keys}\nОтправьте ключ шаблона для редактирования."),
        ("admin_template_prompt", "✏️ Отправьте новый текст для шаблона \"{key}\":"),
        ("admin_template_updated", "✅ Шаблон \"{key}\" обновлён."),
        ("admin_template_invalid", "❌ Шаблон с ключом \"{key}\" не найден."),
        ("photographer_add_prompt", "📝 Введите ID и username фотографа (формат: id username [специализация]):"),
        ("photographer_add_success", "✅ Фотограф @{username} добавлен!"),
        ("photographer_add_bad_format", "❌ Ошибка: неверный формат. Используйте: ID username [специализация]"),
        ("photographer_list", "📸 Список фотографов:\n{list}"),
        ("photographer_list_empty", "📸 Нет добавленных фотографов"),
        ("photographer_not_found", "❌ Фотограф @{username} не найден."),
        ("photographer_assign_prompt", "📌 Отправьте дату и время слота и username фотографа (ДД.ММ.ГГГГ ЧЧ:ММ @username):"),
        ("photographer_assigned_to_slot", "✅ Фотограф @{username} назначен на слот {date} {time}."),
        ("slot_not_found", "⚠️ Слот с такой датой и временем не найден."),
        ("password_change_prompt", "🔐 Введите новый пароль (минимум 8 символов, заглавные, цифры, спецсимволы):"),
        ("password_changed", "✅ Пароль успешно изменен!"),
        ("password_weak", "❌ Пароль должен быть не короче 8 символов и содержать заглавную букву, цифру и спецсимвол."),
        ("admin_logout_confirm", "❓ Вы уверены, что хотите выйти из режима администратора?"),
        ("logout_success", "✅ Вы успешно вышли из режима администратора."),
        ("logout_cancelled", "✅ Выход отменён."),
        ("generic_error", "⚠️ Произошла ошибка. Пожалуйста, попробуйте позже."),
    ];

    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}
