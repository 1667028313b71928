//! Per-user conversation state for the booking flow and the other
//! text-input prompts (feedback, admin actions).
//!
//! States form a closed set; every free-text transition validates its input
//! and re-prompts without advancing when validation fails. Sessions live in
//! the in-memory map owned by [`crate::bot_state::BotState`] and are dropped
//! on completion, decline or an explicit cancel keyword.

use std::sync::LazyLock;

use regex::Regex;

use crate::models::FreeSlot;

static PHONE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\+?\d{10,15}$").unwrap());
static NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-zА-Яа-яЁё\s\-]+$").unwrap());

pub const USER_DATE_FORMAT: &str = "%d.%m.%Y";
pub const USER_TIME_FORMAT: &str = "%H:%M";

/// Booking fields collected so far. `slot_id`, `date` and `time` are fixed
/// once a slot is picked; the rest fill in step by step.
#[derive(Debug, Clone)]
pub struct BookingDraft {
    pub slot_id: i64,
    pub date: String,
    pub time: String,
    pub photographer: Option<String>,
    pub shoot_type: Option<String>,
    pub name: Option<String>,
    pub contact: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SlotChoice {
    pub slot_id: i64,
    pub time: String,
    pub photographer: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DaySlots {
    pub date: String,
    pub slots: Vec<SlotChoice>,
}

#[derive(Debug, Clone)]
pub enum DialogueState {
    // booking flow
    PickingDate { days: Vec<DaySlots> },
    PickingTime { days: Vec<DaySlots>, date: String },
    EnteringType { draft: BookingDraft },
    EnteringName { draft: BookingDraft },
    EnteringContact { draft: BookingDraft },
    Confirming { draft: BookingDraft },
    // feedback flow
    FeedbackText,
    FeedbackPhoto { text: String },
    FeedbackRating { text: String, photo_id: Option<String> },
    // admin prompts
    AdminAwaitingPassword,
    AdminAddingSlot,
    AdminDeletingSlot,
    AdminAwaitingTemplateKey,
    AdminAwaitingTemplateText { key: String },
    AdminAddingPhotographer,
    AdminAssigningPhotographer,
    AdminSettingDiscountPercent,
    AdminSettingDiscountReviews,
    AdminChangingPassword,
}

/// Result of feeding free text into a field-collection state. `Rejected`
/// carries the unchanged state plus the template key for the re-prompt.
#[derive(Debug)]
pub enum TextStep {
    Advanced(DialogueState),
    Rejected(DialogueState, &'static str),
    NotApplicable(DialogueState),
}

impl DialogueState {
    pub fn advance_with_text(self, input: &str) -> TextStep {
        let text = input.trim();
        match self {
            DialogueState::EnteringType { mut draft } => {
                if !validate_shoot_type(text) {
                    return TextStep::Rejected(DialogueState::EnteringType { draft }, "type_invalid");
                }
                draft.shoot_type = Some(text.to_string());
                TextStep::Advanced(DialogueState::EnteringName { draft })
            }
            DialogueState::EnteringName { mut draft } => {
                if !validate_name(text) {
                    return TextStep::Rejected(DialogueState::EnteringName { draft }, "name_invalid");
                }
                draft.name = Some(text.to_string());
                // contact already present means this was an edit from Confirming
                if draft.contact.is_some() {
                    TextStep::Advanced(DialogueState::Confirming { draft })
                } else {
                    TextStep::Advanced(DialogueState::EnteringContact { draft })
                }
            }
            DialogueState::EnteringContact { mut draft } => {
                if !validate_phone(text) {
                    return TextStep::Rejected(
                        DialogueState::EnteringContact { draft },
                        "phone_invalid",
                    );
                }
                draft.contact = Some(text.to_string());
                TextStep::Advanced(DialogueState::Confirming { draft })
            }
            other => TextStep::NotApplicable(other),
        }
    }
}

/// Entry transition: groups free slots by calendar date. Returns None when
/// the horizon holds no free slot, in which case no session is created.
pub fn begin_booking(free: &[FreeSlot]) -> Option<DialogueState> {
    let mut days: Vec<DaySlots> = Vec::new();

    for slot in free {
        let Some(dt) = slot.scheduled_at() else {
            log::warn!("Skipping slot {} with unparseable datetime", slot.id);
            continue;
        };
        let date = dt.format(USER_DATE_FORMAT).to_string();
        let choice = SlotChoice {
            slot_id: slot.id,
            time: dt.format(USER_TIME_FORMAT).to_string(),
            photographer: slot.photographer_username.clone(),
        };

        match days.iter_mut().find(|d| d.date == date) {
            Some(day) => day.slots.push(choice),
            None => days.push(DaySlots { date, slots: vec![choice] }),
        }
    }

    if days.is_empty() {
        None
    } else {
        Some(DialogueState::PickingDate { days })
    }
}

pub fn find_day<'a>(days: &'a [DaySlots], date: &str) -> Option<&'a DaySlots> {
    days.iter().find(|d| d.date == date)
}

pub fn find_slot<'a>(days: &'a [DaySlots], date: &str, slot_id: i64) -> Option<&'a SlotChoice> {
    find_day(days, date)?.slots.iter().find(|s| s.slot_id == slot_id)
}

pub fn is_cancel(text: &str) -> bool {
    let lowered = text.trim().to_lowercase();
    lowered == "отмена" || lowered == "cancel" || lowered == "/cancel"
}

pub fn validate_shoot_type(text: &str) -> bool {
    let len = text.chars().count();
    (1..=100).contains(&len)
}

pub fn validate_name(name: &str) -> bool {
    let len = name.chars().count();
    (2..=30).contains(&len) && NAME_RE.is_match(name)
}

pub fn validate_phone(phone: &str) -> bool {
    PHONE_RE.is_match(phone)
}
