use std::error::Error;

use chrono::Local;
use teloxide::prelude::*;

use crate::bot_state::BotState;
use crate::database::from_db_datetime;
use crate::dialogue::{begin_booking, DialogueState};
use crate::handlers::utils::{
    admin_keyboard, format_date_ru, format_time_ru, language_keyboard, make_dates_keyboard,
};
use crate::models::{Booking, Slot, UserSettings};
use crate::Command;

pub async fn command_handler(
    bot: Bot,
    msg: Message,
    cmd: Command,
    state: BotState,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    match cmd {
        Command::Start => {
            bot.send_message(msg.chat.id, state.templates.get("start").await).await?;
            log::info!("User {} started bot", msg.chat.id);
        }
        Command::Help => {
            bot.send_message(msg.chat.id, state.templates.get("help_text").await).await?;
        }
        Command::Faq => {
            bot.send_message(msg.chat.id, state.templates.get("faq_text").await).await?;
        }
        Command::Book => handle_book(bot, msg, state).await?,
        Command::MyBooking => handle_my_booking(bot, msg, state).await?,
        Command::Feedback => {
            state.set_dialogue(msg.chat.id, DialogueState::FeedbackText).await;
            bot.send_message(msg.chat.id, state.templates.get("feedback_prompt").await).await?;
            log::info!("User {} started feedback", msg.chat.id);
        }
        Command::Language => {
            let current = UserSettings::language(
                &state.db,
                msg.chat.id.0,
                &state.config.default_language,
            )
            .await?;
            bot.send_message(
                msg.chat.id,
                state.templates.render("language_select", &[("current", current.as_str())]).await,
            )
            .reply_markup(language_keyboard())
            .await?;
        }
        Command::Admin => handle_admin(bot, msg, state).await?,
        Command::Cancel => {
            state.clear_dialogue(msg.chat.id).await;
            bot.send_message(msg.chat.id, state.templates.get("booking_cancelled").await).await?;
            log::info!("User {} canceled the current operation", msg.chat.id);
        }
    }
    Ok(())
}

async fn handle_book(
    bot: Bot,
    msg: Message,
    state: BotState,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let now = Local::now().naive_local();
    let free = Slot::free_within(&state.db, now, state.config.slots_days_ahead).await?;

    let Some(dialogue) = begin_booking(&free) else {
        bot.send_message(msg.chat.id, state.templates.get("no_free_slots").await).await?;
        return Ok(());
    };

    if let DialogueState::PickingDate { days } = &dialogue {
        bot.send_message(msg.chat.id, state.templates.get("ask_date").await)
            .reply_markup(make_dates_keyboard(days))
            .await?;
    }
    state.set_dialogue(msg.chat.id, dialogue).await;
    log::info!("User {} started booking", msg.chat.id);

    Ok(())
}

async fn handle_my_booking(
    bot: Bot,
    msg: Message,
    state: BotState,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let now = Local::now().naive_local();
    let booking = Booking::upcoming_for_user(&state.db, msg.chat.id.0, now).await?;

    let Some(view) = booking else {
        bot.send_message(msg.chat.id, state.templates.get("no_active_bookings").await).await?;
        return Ok(());
    };

    let (date, time) = match from_db_datetime(&view.datetime) {
        Some(dt) => (format_date_ru(dt), format_time_ru(dt)),
        None => (view.datetime.clone(), String::new()),
    };
    let card = state
        .templates
        .render(
            "confirmation_card",
            &[
                ("date", &date),
                ("time", &time),
                ("name", &view.name),
                ("phone", &view.contact),
                ("shoot_type", &view.shoot_type),
            ],
        )
        .await;

    let header = state.templates.get("mybooking_header").await;
    let mut text = format!("{header}\n\n{card}");
    if let Some(photographer) = &view.photographer {
        text.push('\n');
        text.push_str(
            &state
                .templates
                .render("photographer_assigned", &[("username", photographer)])
                .await,
        );
    }

    if UserSettings::discount_eligible(&state.db, msg.chat.id.0).await? {
        let discounts = state.discounts().await;
        let percent = discounts.percent.to_string();
        let reviews = discounts.min_reviews.to_string();
        text.push('\n');
        text.push_str(
            &state
                .templates
                .render("discount_info", &[("percent", percent.as_str()), ("reviews", reviews.as_str())])
                .await,
        );
    }

    bot.send_message(msg.chat.id, text).await?;
    log::info!("User {} viewed their booking", msg.chat.id);

    Ok(())
}

async fn handle_admin(
    bot: Bot,
    msg: Message,
    state: BotState,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let user_id = msg.chat.id.0;
    if !state.is_admin(user_id) {
        return Ok(());
    }

    if state.authorize_admin(user_id).await {
        bot.send_message(msg.chat.id, state.templates.get("admin_menu_title").await)
            .reply_markup(admin_keyboard())
            .await?;
    } else {
        state.set_dialogue(msg.chat.id, DialogueState::AdminAwaitingPassword).await;
        bot.send_message(msg.chat.id, state.templates.get("admin_enter_password").await).await?;
    }

    Ok(())
}
