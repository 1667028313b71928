use std::error::Error;

use teloxide::prelude::*;
use teloxide::types::ChatId;

use crate::bot_state::BotState;
use crate::dialogue::{is_cancel, DialogueState, TextStep};
use crate::handlers::utils::{
    admin_keyboard, confirm_keyboard, format_date_ru, format_time_ru, is_strong_password,
    parse_datetime_ru, rating_keyboard,
};
use crate::handlers::photo_keyboard;
use crate::models::{DeleteSlotOutcome, Photographer, Slot};

pub async fn message_handler(
    bot: Bot,
    msg: Message,
    state: BotState,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let chat_id = msg.chat.id;

    // a shared contact counts as phone input for the contact step
    if let Some(contact) = msg.contact() {
        let phone = contact.phone_number.clone();
        if let Some(dialogue @ DialogueState::EnteringContact { .. }) = state.dialogue(chat_id).await
        {
            apply_booking_text(&bot, &state, chat_id, dialogue, &phone).await?;
        }
        return Ok(());
    }

    if let Some(photos) = msg.photo() {
        if let Some(DialogueState::FeedbackPhoto { text }) = state.dialogue(chat_id).await {
            if let Some(photo) = photos.last() {
                state
                    .set_dialogue(
                        chat_id,
                        DialogueState::FeedbackRating { text, photo_id: Some(photo.file.id.clone()) },
                    )
                    .await;
                bot.send_message(chat_id, state.templates.get("feedback_rating_prompt").await)
                    .reply_markup(rating_keyboard())
                    .await?;
            }
        }
        return Ok(());
    }

    let Some(text) = msg.text() else {
        return Ok(());
    };

    // commands are routed by the command handler branch
    if text.starts_with('/') {
        return Ok(());
    }

    if is_cancel(text) {
        state.clear_dialogue(chat_id).await;
        bot.send_message(chat_id, state.templates.get("booking_cancelled").await).await?;
        log::info!("User {} canceled the current operation", chat_id);
        return Ok(());
    }

    let Some(dialogue) = state.dialogue(chat_id).await else {
        return Ok(());
    };

    match dialogue {
        dialogue @ (DialogueState::EnteringType { .. }
        | DialogueState::EnteringName { .. }
        | DialogueState::EnteringContact { .. }) => {
            apply_booking_text(&bot, &state, chat_id, dialogue, text).await?;
        }

        DialogueState::FeedbackText => {
            state
                .set_dialogue(chat_id, DialogueState::FeedbackPhoto { text: text.trim().to_string() })
                .await;
            bot.send_message(chat_id, state.templates.get("feedback_photo_prompt").await)
                .reply_markup(photo_keyboard())
                .await?;
        }
        DialogueState::FeedbackPhoto { .. } => {
            // waiting for a photo or a button press, nudge again
            bot.send_message(chat_id, state.templates.get("feedback_photo_prompt").await)
                .reply_markup(photo_keyboard())
                .await?;
        }
        DialogueState::FeedbackRating { .. } => {
            bot.send_message(chat_id, state.templates.get("feedback_rating_prompt").await)
                .reply_markup(rating_keyboard())
                .await?;
        }

        DialogueState::AdminAwaitingPassword => {
            admin_password_input(&bot, &state, chat_id, text).await?;
        }
        dialogue @ (DialogueState::AdminAddingSlot
        | DialogueState::AdminDeletingSlot
        | DialogueState::AdminAwaitingTemplateKey
        | DialogueState::AdminAwaitingTemplateText { .. }
        | DialogueState::AdminAddingPhotographer
        | DialogueState::AdminAssigningPhotographer
        | DialogueState::AdminSettingDiscountPercent
        | DialogueState::AdminSettingDiscountReviews
        | DialogueState::AdminChangingPassword) => {
            if !state.authorize_admin(chat_id.0).await {
                state.clear_dialogue(chat_id).await;
                bot.send_message(chat_id, state.templates.get("admin_access_denied").await).await?;
                return Ok(());
            }
            admin_text_input(&bot, &state, chat_id, dialogue, text).await?;
        }

        // slot picking advances via inline buttons only
        DialogueState::PickingDate { .. }
        | DialogueState::PickingTime { .. }
        | DialogueState::Confirming { .. } => {}
    }

    Ok(())
}

/// Feeds free text into the field-collection machine and sends the prompt
/// for whatever state comes next.
async fn apply_booking_text(
    bot: &Bot,
    state: &BotState,
    chat_id: ChatId,
    dialogue: DialogueState,
    text: &str,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    match dialogue.advance_with_text(text) {
        TextStep::Advanced(next) => {
            match &next {
                DialogueState::EnteringName { .. } => {
                    bot.send_message(chat_id, state.templates.get("ask_name").await).await?;
                }
                DialogueState::EnteringContact { .. } => {
                    bot.send_message(chat_id, state.templates.get("ask_contact").await).await?;
                }
                DialogueState::Confirming { draft } => {
                    let time_label = match &draft.photographer {
                        Some(username) => format!("{} (@{})", draft.time, username),
                        None => draft.time.clone(),
                    };
                    let text = state
                        .templates
                        .render(
                            "confirm_details",
                            &[
                                ("date", draft.date.as_str()),
                                ("time", time_label.as_str()),
                                ("shoot_type", draft.shoot_type.as_deref().unwrap_or("")),
                                ("name", draft.name.as_deref().unwrap_or("")),
                                ("phone", draft.contact.as_deref().unwrap_or("")),
                            ],
                        )
                        .await;
                    bot.send_message(chat_id, text).reply_markup(confirm_keyboard()).await?;
                }
                _ => {}
            }
            state.set_dialogue(chat_id, next).await;
        }
        TextStep::Rejected(unchanged, error_key) => {
            bot.send_message(chat_id, state.templates.get(error_key).await).await?;
            state.set_dialogue(chat_id, unchanged).await;
        }
        TextStep::NotApplicable(unchanged) => {
            state.set_dialogue(chat_id, unchanged).await;
        }
    }
    Ok(())
}

async fn admin_password_input(
    bot: &Bot,
    state: &BotState,
    chat_id: ChatId,
    password: &str,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    state.clear_dialogue(chat_id).await;

    if !state.is_admin(chat_id.0) {
        return Ok(());
    }

    let hash = state.password_hash().await;
    if state.admin_sessions.login(chat_id.0, password, &hash).await {
        bot.send_message(chat_id, state.templates.get("admin_login_success").await).await?;
        bot.send_message(chat_id, state.templates.get("admin_menu_title").await)
            .reply_markup(admin_keyboard())
            .await?;
    } else {
        bot.send_message(chat_id, state.templates.get("admin_login_fail").await).await?;
    }

    Ok(())
}

async fn admin_text_input(
    bot: &Bot,
    state: &BotState,
    chat_id: ChatId,
    dialogue: DialogueState,
    text: &str,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    match dialogue {
        DialogueState::AdminAddingSlot => {
            // "ДД.ММ.ГГГГ ЧЧ:ММ" with an optional trailing @username
            let (datetime_part, username) = match text.rsplit_once('@') {
                Some((head, username)) => (head.trim(), Some(username.trim())),
                None => (text.trim(), None),
            };
            let Some(dt) = parse_datetime_ru(datetime_part) else {
                bot.send_message(chat_id, state.templates.get("admin_bad_datetime").await).await?;
                return Ok(());
            };

            let photographer_id = match username {
                Some(username) => match Photographer::by_username(&state.db, username).await? {
                    Some(p) => Some(p.id),
                    None => {
                        bot.send_message(
                            chat_id,
                            state
                                .templates
                                .render("photographer_not_found", &[("username", username)])
                                .await,
                        )
                        .await?;
                        return Ok(());
                    }
                },
                None => None,
            };
            state.clear_dialogue(chat_id).await;

            let fields = [("date", format_date_ru(dt)), ("time", format_time_ru(dt))];
            let fields: Vec<(&str, &str)> =
                fields.iter().map(|(k, v)| (*k, v.as_str())).collect();
            if Slot::add(&state.db, dt, photographer_id).await? {
                bot.send_message(
                    chat_id,
                    state.templates.render("admin_add_slot_success", &fields).await,
                )
                .await?;
                log::info!("Admin added new slot {}", dt);
            } else {
                bot.send_message(chat_id, state.templates.get("admin_add_slot_exists").await)
                    .await?;
            }
        }

        DialogueState::AdminDeletingSlot => {
            let Some(dt) = parse_datetime_ru(text) else {
                bot.send_message(chat_id, state.templates.get("admin_bad_datetime").await).await?;
                return Ok(());
            };
            state.clear_dialogue(chat_id).await;

            let fields = [("date", format_date_ru(dt)), ("time", format_time_ru(dt))];
            let fields: Vec<(&str, &str)> =
                fields.iter().map(|(k, v)| (*k, v.as_str())).collect();
            let key = match Slot::delete(&state.db, dt).await? {
                DeleteSlotOutcome::Deleted => {
                    log::info!("Admin deleted slot {}", dt);
                    "admin_del_slot_success"
                }
                DeleteSlotOutcome::NotFound => "admin_del_slot_not_found",
                DeleteSlotOutcome::Booked => "admin_del_slot_booked",
            };
            bot.send_message(chat_id, state.templates.render(key, &fields).await).await?;
        }

        DialogueState::AdminAwaitingTemplateKey => {
            let key = text.trim();
            if !state.templates.contains(key).await {
                bot.send_message(
                    chat_id,
                    state.templates.render("admin_template_invalid", &[("key", key)]).await,
                )
                .await?;
                return Ok(());
            }
            state
                .set_dialogue(chat_id, DialogueState::AdminAwaitingTemplateText { key: key.to_string() })
                .await;
            bot.send_message(
                chat_id,
                state.templates.render("admin_template_prompt", &[("key", key)]).await,
            )
            .await?;
        }

        DialogueState::AdminAwaitingTemplateText { key } => {
            state.clear_dialogue(chat_id).await;
            match state.templates.set(&key, text).await {
                Ok(true) => {
                    bot.send_message(
                        chat_id,
                        state.templates.render("admin_template_updated", &[("key", &key)]).await,
                    )
                    .await?;
                    log::info!("Admin updated template '{}'", key);
                }
                Ok(false) => {
                    bot.send_message(
                        chat_id,
                        state.templates.render("admin_template_invalid", &[("key", &key)]).await,
                    )
                    .await?;
                }
                Err(e) => {
                    log::error!("Failed to save templates: {}", e);
                    bot.send_message(chat_id, state.templates.get("generic_error").await).await?;
                }
            }
        }

        DialogueState::AdminAddingPhotographer => {
            state.clear_dialogue(chat_id).await;

            let mut parts = text.split_whitespace();
            let user_id = parts.next().and_then(|s| s.parse::<i64>().ok());
            let username = parts.next().map(|s| s.trim_start_matches('@').to_string());
            let specialties = parts.collect::<Vec<_>>().join(" ");

            let (Some(user_id), Some(username)) = (user_id, username) else {
                bot.send_message(chat_id, state.templates.get("photographer_add_bad_format").await)
                    .await?;
                return Ok(());
            };

            match Photographer::add(&state.db, user_id, &username, &specialties).await {
                Ok(()) => {
                    bot.send_message(
                        chat_id,
                        state
                            .templates
                            .render("photographer_add_success", &[("username", &username)])
                            .await,
                    )
                    .await?;
                    log::info!("Added photographer: {} @{}", user_id, username);
                }
                Err(e) => {
                    log::error!("Error adding photographer: {}", e);
                    bot.send_message(chat_id, state.templates.get("generic_error").await).await?;
                }
            }
        }

        DialogueState::AdminAssigningPhotographer => {
            // "ДД.ММ.ГГГГ ЧЧ:ММ @username"
            let Some((datetime_part, username)) = text.rsplit_once('@') else {
                bot.send_message(chat_id, state.templates.get("photographer_assign_prompt").await)
                    .await?;
                return Ok(());
            };
            let username = username.trim();
            let Some(dt) = parse_datetime_ru(datetime_part) else {
                bot.send_message(chat_id, state.templates.get("admin_bad_datetime").await).await?;
                return Ok(());
            };

            let Some(slot_id) = Slot::id_at(&state.db, dt).await? else {
                bot.send_message(chat_id, state.templates.get("slot_not_found").await).await?;
                return Ok(());
            };
            let Some(photographer) = Photographer::by_username(&state.db, username).await? else {
                bot.send_message(
                    chat_id,
                    state
                        .templates
                        .render("photographer_not_found", &[("username", username)])
                        .await,
                )
                .await?;
                return Ok(());
            };

            state.clear_dialogue(chat_id).await;
            Slot::assign_photographer(&state.db, slot_id, photographer.id).await?;

            let date = format_date_ru(dt);
            let time = format_time_ru(dt);
            bot.send_message(
                chat_id,
                state
                    .templates
                    .render(
                        "photographer_assigned_to_slot",
                        &[
                            ("username", photographer.username.as_str()),
                            ("date", date.as_str()),
                            ("time", time.as_str()),
                        ],
                    )
                    .await,
            )
            .await?;
            log::info!("Photographer {} assigned to slot {}", photographer.id, slot_id);
        }

        DialogueState::AdminSettingDiscountPercent => {
            match text.trim().parse::<i64>() {
                Ok(value) if (0..=100).contains(&value) => {
                    state.clear_dialogue(chat_id).await;
                    state.set_discount_percent(value).await;

                    let value = value.to_string();
                    bot.send_message(
                        chat_id,
                        state
                            .templates
                            .render("discount_percent_set", &[("value", value.as_str())])
                            .await,
                    )
                    .await?;
                    log::info!("Discount percent changed to {}", value);
                }
                _ => {
                    bot.send_message(chat_id, state.templates.get("discount_percent_invalid").await)
                        .await?;
                }
            }
        }

        DialogueState::AdminSettingDiscountReviews => {
            match text.trim().parse::<i64>() {
                Ok(value) if value >= 1 => {
                    state.clear_dialogue(chat_id).await;
                    state.set_min_reviews(value).await;

                    let value = value.to_string();
                    bot.send_message(
                        chat_id,
                        state
                            .templates
                            .render("discount_reviews_set", &[("value", value.as_str())])
                            .await,
                    )
                    .await?;
                    log::info!("Min reviews for discount changed to {}", value);
                }
                _ => {
                    bot.send_message(chat_id, state.templates.get("discount_reviews_invalid").await)
                        .await?;
                }
            }
        }

        DialogueState::AdminChangingPassword => {
            if !is_strong_password(text) {
                bot.send_message(chat_id, state.templates.get("password_weak").await).await?;
                return Ok(());
            }
            state.clear_dialogue(chat_id).await;

            match bcrypt::hash(text, bcrypt::DEFAULT_COST) {
                Ok(hash) => {
                    state.set_password_hash(hash).await;
                    bot.send_message(chat_id, state.templates.get("password_changed").await)
                        .await?;
                    log::info!("Admin password changed");
                }
                Err(e) => {
                    log::error!("Password hashing failed: {}", e);
                    bot.send_message(chat_id, state.templates.get("generic_error").await).await?;
                }
            }
        }

        _ => {}
    }

    Ok(())
}
