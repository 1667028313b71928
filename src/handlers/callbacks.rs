use std::error::Error;

use chrono::Local;
use teloxide::prelude::*;
use teloxide::types::{ChatId, InlineKeyboardButton, InlineKeyboardMarkup, InputFile, MessageId};

use crate::bot_state::BotState;
use crate::dialogue::{find_day, find_slot, BookingDraft, DialogueState};
use crate::handlers::utils::{
    admin_keyboard, bookings_csv, discount_keyboard, logout_keyboard, make_times_keyboard,
    rating_keyboard,
};
use crate::models::{Booking, Feedback, Photographer, UserSettings};
use crate::reservation::{reserve, ReserveOutcome};

pub async fn callback_handler(
    bot: Bot,
    q: CallbackQuery,
    state: BotState,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    if let (Some(data), Some(message)) = (q.data.as_deref(), q.message.as_ref()) {
        let chat_id = message.chat().id;
        let message_id = message.id();
        let user_id = q.from.id.0 as i64;

        match data {
            d if d.starts_with("date:") => {
                on_date_chosen(&bot, &state, chat_id, message_id, d.split_at(5).1).await?;
            }
            d if d.starts_with("time:") => {
                on_time_chosen(&bot, &state, chat_id, message_id, d.split_at(5).1).await?;
            }
            d if d.starts_with("edit:") => {
                on_edit(&bot, &state, chat_id, message_id, d.split_at(5).1).await?;
            }
            d if d.starts_with("confirm:") => {
                on_confirm(&bot, &state, chat_id, message_id, user_id, d.split_at(8).1).await?;
            }
            d if d.starts_with("feedback:") => {
                on_feedback_photo_choice(&bot, &state, chat_id, d.split_at(9).1).await?;
            }
            d if d.starts_with("rating:") => {
                on_rating(&bot, &state, &q, chat_id, d.split_at(7).1).await?;
            }
            d if d.starts_with("lang:") => {
                let language = d.split_at(5).1;
                UserSettings::set_language(&state.db, user_id, language).await?;
                bot.edit_message_text(
                    chat_id,
                    message_id,
                    state.templates.render("language_set", &[("language", language)]).await,
                )
                .await?;
            }
            d if d.starts_with("logout:") => {
                if d.split_at(7).1 == "yes" {
                    state.admin_sessions.logout(user_id).await;
                    bot.edit_message_text(
                        chat_id,
                        message_id,
                        state.templates.get("logout_success").await,
                    )
                    .await?;
                } else {
                    bot.edit_message_text(
                        chat_id,
                        message_id,
                        state.templates.get("logout_cancelled").await,
                    )
                    .await?;
                }
            }
            d if d.starts_with("admin:") => {
                admin_actions(&bot, &state, chat_id, user_id, d.split_at(6).1).await?;
            }
            d if d.starts_with("discount:") => {
                if state.authorize_admin(user_id).await {
                    match d.split_at(9).1 {
                        "percent" => {
                            state
                                .set_dialogue(chat_id, DialogueState::AdminSettingDiscountPercent)
                                .await;
                            bot.send_message(
                                chat_id,
                                state.templates.get("discount_percent_prompt").await,
                            )
                            .await?;
                        }
                        "reviews" => {
                            state
                                .set_dialogue(chat_id, DialogueState::AdminSettingDiscountReviews)
                                .await;
                            bot.send_message(
                                chat_id,
                                state.templates.get("discount_reviews_prompt").await,
                            )
                            .await?;
                        }
                        _ => {}
                    }
                }
            }
            d if d.starts_with("fb:") => {
                if state.authorize_admin(user_id).await {
                    if let Ok(offset) = d.split_at(3).1.parse::<i64>() {
                        show_feedback(&bot, &state, chat_id, offset).await?;
                    }
                }
            }
            "photographer:add" => {
                if state.authorize_admin(user_id).await {
                    state.set_dialogue(chat_id, DialogueState::AdminAddingPhotographer).await;
                    bot.send_message(chat_id, state.templates.get("photographer_add_prompt").await)
                        .await?;
                }
            }
            "photographer:assign" => {
                if state.authorize_admin(user_id).await {
                    state.set_dialogue(chat_id, DialogueState::AdminAssigningPhotographer).await;
                    bot.send_message(
                        chat_id,
                        state.templates.get("photographer_assign_prompt").await,
                    )
                    .await?;
                }
            }
            _ => {}
        }
    }

    bot.answer_callback_query(q.id.clone()).await?;
    Ok(())
}

async fn on_date_chosen(
    bot: &Bot,
    state: &BotState,
    chat_id: ChatId,
    message_id: MessageId,
    date: &str,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let Some(DialogueState::PickingDate { days }) = state.dialogue(chat_id).await else {
        return Ok(());
    };
    let Some(day) = find_day(&days, date) else {
        return Ok(());
    };

    let keyboard = make_times_keyboard(day);
    bot.edit_message_text(
        chat_id,
        message_id,
        format!("📆 Дата: {}\n{}", date, state.templates.get("ask_time").await),
    )
    .reply_markup(keyboard)
    .await?;

    state
        .set_dialogue(chat_id, DialogueState::PickingTime { days, date: date.to_string() })
        .await;
    Ok(())
}

async fn on_time_chosen(
    bot: &Bot,
    state: &BotState,
    chat_id: ChatId,
    message_id: MessageId,
    raw_slot_id: &str,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let Some(DialogueState::PickingTime { days, date }) = state.dialogue(chat_id).await else {
        return Ok(());
    };
    let Ok(slot_id) = raw_slot_id.parse::<i64>() else {
        return Ok(());
    };
    let Some(slot) = find_slot(&days, &date, slot_id) else {
        return Ok(());
    };

    let draft = BookingDraft {
        slot_id,
        date: date.clone(),
        time: slot.time.clone(),
        photographer: slot.photographer.clone(),
        shoot_type: None,
        name: None,
        contact: None,
    };

    bot.edit_message_text(
        chat_id,
        message_id,
        format!(
            "📆 Дата: {}\n⏰ Время: {}\n{}",
            date,
            slot.time,
            state.templates.get("ask_type").await
        ),
    )
    .await?;

    state.set_dialogue(chat_id, DialogueState::EnteringType { draft }).await;
    Ok(())
}

/// Side transition out of Confirming; the edited field re-validates on the
/// way back in.
async fn on_edit(
    bot: &Bot,
    state: &BotState,
    chat_id: ChatId,
    message_id: MessageId,
    field: &str,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let Some(DialogueState::Confirming { draft }) = state.dialogue(chat_id).await else {
        return Ok(());
    };

    match field {
        "name" => {
            bot.edit_message_text(
                chat_id,
                message_id,
                state.templates.get("edit_name_prompt").await,
            )
            .await?;
            state.set_dialogue(chat_id, DialogueState::EnteringName { draft }).await;
        }
        "phone" => {
            bot.edit_message_text(
                chat_id,
                message_id,
                state.templates.get("edit_phone_prompt").await,
            )
            .await?;
            state.set_dialogue(chat_id, DialogueState::EnteringContact { draft }).await;
        }
        _ => {}
    }
    Ok(())
}

async fn on_confirm(
    bot: &Bot,
    state: &BotState,
    chat_id: ChatId,
    message_id: MessageId,
    user_id: i64,
    action: &str,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let Some(DialogueState::Confirming { draft }) = state.dialogue(chat_id).await else {
        return Ok(());
    };

    // both confirm and decline end the conversation
    state.clear_dialogue(chat_id).await;

    if action != "yes" {
        bot.edit_message_text(chat_id, message_id, state.templates.get("booking_cancelled").await)
            .await?;
        log::info!("User {} declined the booking", user_id);
        return Ok(());
    }

    let (Some(name), Some(contact), Some(shoot_type)) =
        (draft.name.as_deref(), draft.contact.as_deref(), draft.shoot_type.as_deref())
    else {
        bot.edit_message_text(chat_id, message_id, state.templates.get("generic_error").await)
            .await?;
        return Ok(());
    };

    let outcome = match reserve(&state.db, draft.slot_id, user_id, name, contact, shoot_type).await
    {
        Ok(outcome) => outcome,
        Err(e) => {
            log::error!("Reservation failed for user {}: {}", user_id, e);
            bot.edit_message_text(chat_id, message_id, state.templates.get("generic_error").await)
                .await?;
            return Ok(());
        }
    };

    let error_key = match outcome {
        ReserveOutcome::Confirmed { photographer } => {
            confirm_success(bot, state, chat_id, message_id, &draft, photographer).await?;
            log::info!(
                "Booking confirmed for user {}: {} {}, type={}",
                user_id,
                draft.date,
                draft.time,
                shoot_type
            );
            return Ok(());
        }
        ReserveOutcome::AlreadyBookedThisSlot => "already_booked_error",
        ReserveOutcome::DoubleBookingSameDay => {
            log::info!("Booking failed: user {} already has a booking on {}", user_id, draft.date);
            "double_booking_error"
        }
        ReserveOutcome::SlotTakenRace => "slot_taken_error",
    };

    bot.edit_message_text(chat_id, message_id, state.templates.get(error_key).await).await?;
    Ok(())
}

/// Confirmation fan-out. Every delivery is best effort; the booking is
/// already durable at this point.
async fn confirm_success(
    bot: &Bot,
    state: &BotState,
    chat_id: ChatId,
    message_id: MessageId,
    draft: &BookingDraft,
    photographer: Option<Photographer>,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let time_label = match &draft.photographer {
        Some(username) => format!("{} (@{})", draft.time, username),
        None => draft.time.clone(),
    };
    let name = draft.name.as_deref().unwrap_or("");
    let phone = draft.contact.as_deref().unwrap_or("");
    let shoot_type = draft.shoot_type.as_deref().unwrap_or("");

    bot.edit_message_text(
        chat_id,
        message_id,
        state
            .templates
            .render("booking_confirmed", &[("date", draft.date.as_str()), ("time", time_label.as_str())])
            .await,
    )
    .await?;

    let card = state
        .templates
        .render(
            "confirmation_card",
            &[
                ("date", draft.date.as_str()),
                ("time", draft.time.as_str()),
                ("name", name),
                ("phone", phone),
                ("shoot_type", shoot_type),
            ],
        )
        .await;
    if let Err(e) = bot.send_message(chat_id, card).await {
        log::error!("Failed to send confirmation card: {}", e);
    }

    let admin_text = state
        .templates
        .render(
            "admin_new_booking",
            &[
                ("date", draft.date.as_str()),
                ("time", time_label.as_str()),
                ("name", name),
                ("phone", phone),
                ("shoot_type", shoot_type),
            ],
        )
        .await;
    for admin_id in &state.config.admin_ids {
        if let Err(e) = bot.send_message(ChatId(*admin_id), &admin_text).await {
            log::error!("Failed to send notification to admin {}: {}", admin_id, e);
        }
    }

    if let Some(photographer) = photographer {
        let text = state
            .templates
            .render(
                "photographer_notify",
                &[
                    ("date", draft.date.as_str()),
                    ("time", draft.time.as_str()),
                    ("name", name),
                    ("phone", phone),
                ],
            )
            .await;
        if let Err(e) = bot.send_message(ChatId(photographer.user_id), text).await {
            log::error!("Failed to notify photographer {}: {}", photographer.user_id, e);
        }
    }

    Ok(())
}

async fn on_feedback_photo_choice(
    bot: &Bot,
    state: &BotState,
    chat_id: ChatId,
    choice: &str,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let Some(DialogueState::FeedbackPhoto { text }) = state.dialogue(chat_id).await else {
        return Ok(());
    };

    if choice == "yes" {
        // stay in FeedbackPhoto, the next photo upload moves us on
        bot.send_message(chat_id, state.templates.get("feedback_send_photo").await).await?;
    } else {
        state
            .set_dialogue(chat_id, DialogueState::FeedbackRating { text, photo_id: None })
            .await;
        bot.send_message(chat_id, state.templates.get("feedback_rating_prompt").await)
            .reply_markup(rating_keyboard())
            .await?;
    }
    Ok(())
}

async fn on_rating(
    bot: &Bot,
    state: &BotState,
    q: &CallbackQuery,
    chat_id: ChatId,
    raw_rating: &str,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let Some(DialogueState::FeedbackRating { text, photo_id }) = state.dialogue(chat_id).await
    else {
        return Ok(());
    };
    let Ok(rating) = raw_rating.parse::<i64>() else {
        return Ok(());
    };

    state.clear_dialogue(chat_id).await;

    let user_id = q.from.id.0 as i64;
    let user_name = q.from.full_name();
    let discounts = state.discounts().await;
    let crossed_threshold = Feedback::add(
        &state.db,
        user_id,
        &user_name,
        &text,
        photo_id.as_deref(),
        Some(rating),
        discounts.min_reviews,
    )
    .await?;

    bot.send_message(chat_id, state.templates.get("feedback_thanks").await).await?;

    if crossed_threshold {
        let percent = discounts.percent.to_string();
        let reviews = discounts.min_reviews.to_string();
        bot.send_message(
            chat_id,
            state
                .templates
                .render("discount_info", &[("percent", percent.as_str()), ("reviews", reviews.as_str())])
                .await,
        )
        .await?;
    }

    let rating_str = rating.to_string();
    let user_id_str = user_id.to_string();
    let admin_text = state
        .templates
        .render(
            "feedback_received",
            &[
                ("name", user_name.as_str()),
                ("user_id", user_id_str.as_str()),
                ("feedback", text.as_str()),
                ("rating", rating_str.as_str()),
            ],
        )
        .await;
    for admin_id in &state.config.admin_ids {
        if let Err(e) = bot.send_message(ChatId(*admin_id), &admin_text).await {
            log::error!("Failed to send feedback to admin {}: {}", admin_id, e);
        }
    }

    log::info!("User {} submitted feedback with rating {}", user_id, rating);
    Ok(())
}

async fn admin_actions(
    bot: &Bot,
    state: &BotState,
    chat_id: ChatId,
    user_id: i64,
    action: &str,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    if !state.authorize_admin(user_id).await {
        bot.send_message(chat_id, state.templates.get("admin_access_denied").await).await?;
        return Ok(());
    }

    match action {
        "addslot" => {
            state.set_dialogue(chat_id, DialogueState::AdminAddingSlot).await;
            bot.send_message(chat_id, state.templates.get("admin_add_slot_prompt").await).await?;
        }
        "delslot" => {
            state.set_dialogue(chat_id, DialogueState::AdminDeletingSlot).await;
            bot.send_message(chat_id, state.templates.get("admin_del_slot_prompt").await).await?;
        }
        "export" => {
            let rows = Booking::export_rows(&state.db).await?;
            if rows.is_empty() {
                bot.send_message(chat_id, state.templates.get("admin_export_no_data").await)
                    .await?;
            } else {
                bot.send_message(chat_id, bookings_csv(&rows)).await?;
                let count = rows.len().to_string();
                bot.send_message(
                    chat_id,
                    state.templates.render("admin_export_success", &[("count", count.as_str())]).await,
                )
                .await?;
                log::info!("Admin exported {} bookings", rows.len());
            }
        }
        "templates" => {
            let keys = state.templates.keys().await.join(", ");
            state.set_dialogue(chat_id, DialogueState::AdminAwaitingTemplateKey).await;
            bot.send_message(
                chat_id,
                state.templates.render("admin_template_list", &[("keys", keys.as_str())]).await,
            )
            .await?;
        }
        "stats" => {
            let stats = Booking::stats(&state.db, Local::now().naive_local()).await?;
            let total = stats.total.to_string();
            let last_week = stats.last_week.to_string();
            let free_slots = stats.free_slots.to_string();
            let avg_rating = format!("{:.1}", stats.avg_rating);
            bot.send_message(
                chat_id,
                state
                    .templates
                    .render(
                        "stats_text",
                        &[
                            ("total", total.as_str()),
                            ("last_week", last_week.as_str()),
                            ("free_slots", free_slots.as_str()),
                            ("avg_rating", avg_rating.as_str()),
                        ],
                    )
                    .await,
            )
            .await?;
        }
        "photographers" => {
            let photographers = Photographer::all(&state.db).await?;
            let text = if photographers.is_empty() {
                state.templates.get("photographer_list_empty").await
            } else {
                let list = photographers
                    .iter()
                    .enumerate()
                    .map(|(idx, p)| {
                        let specialties = if p.specialties.is_empty() {
                            "без специализации"
                        } else {
                            &p.specialties
                        };
                        format!("{}. ID: {}, @{} ({})", idx + 1, p.user_id, p.username, specialties)
                    })
                    .collect::<Vec<_>>()
                    .join("\n");
                state.templates.render("photographer_list", &[("list", list.as_str())]).await
            };

            let keyboard = InlineKeyboardMarkup::new(vec![
                vec![InlineKeyboardButton::callback("➕ Добавить фотографа", "photographer:add")],
                vec![InlineKeyboardButton::callback("📌 Назначить на слот", "photographer:assign")],
                vec![InlineKeyboardButton::callback("🔙 Назад", "admin:back")],
            ]);
            bot.send_message(chat_id, text).reply_markup(keyboard).await?;
        }
        "feedbacks" => {
            show_feedback(bot, state, chat_id, 0).await?;
        }
        "discounts" => {
            let discounts = state.discounts().await;
            let percent = discounts.percent.to_string();
            let reviews = discounts.min_reviews.to_string();
            bot.send_message(
                chat_id,
                state
                    .templates
                    .render(
                        "discount_settings",
                        &[("percent", percent.as_str()), ("reviews", reviews.as_str())],
                    )
                    .await,
            )
            .reply_markup(discount_keyboard())
            .await?;
        }
        "changepw" => {
            state.set_dialogue(chat_id, DialogueState::AdminChangingPassword).await;
            bot.send_message(chat_id, state.templates.get("password_change_prompt").await).await?;
        }
        "logout" => {
            bot.send_message(chat_id, state.templates.get("admin_logout_confirm").await)
                .reply_markup(logout_keyboard())
                .await?;
        }
        "back" => {
            bot.send_message(chat_id, state.templates.get("admin_menu_title").await)
                .reply_markup(admin_keyboard())
                .await?;
        }
        _ => {}
    }

    Ok(())
}

/// One feedback entry per message, newest first, with a "next" button.
/// Entries with an attached photo are sent as the photo with a caption.
async fn show_feedback(
    bot: &Bot,
    state: &BotState,
    chat_id: ChatId,
    offset: i64,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let Some(entry) = Feedback::nth(&state.db, offset).await? else {
        let key = if offset == 0 { "feedback_none" } else { "feedback_no_more" };
        bot.send_message(chat_id, state.templates.get(key).await).await?;
        return Ok(());
    };

    let rating = entry
        .rating
        .map(|r| format!("{r}/5"))
        .unwrap_or_else(|| "—".to_string());
    let caption = state
        .templates
        .render(
            "feedback_entry",
            &[
                ("name", entry.user_name.as_str()),
                ("date", entry.created_at.as_str()),
                ("rating", rating.as_str()),
                ("text", entry.text.as_str()),
            ],
        )
        .await;

    let keyboard = InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::callback(
        "➡️ Следующий",
        format!("fb:{}", offset + 1),
    )]]);

    match entry.photo_id {
        Some(photo_id) => {
            bot.send_photo(chat_id, InputFile::file_id(photo_id))
                .caption(caption)
                .reply_markup(keyboard)
                .await?;
        }
        None => {
            bot.send_message(chat_id, caption).reply_markup(keyboard).await?;
        }
    }

    Ok(())
}
