//! Four-step compose flow: select representative, build message, personalise,
//! copy and send.
//!
//! Functions here only touch the draft they are given; callers run them inside
//! [`DraftSession::update`](crate::session::DraftSession::update) so that every
//! transition counts as activity and gets persisted.

use crate::model::{Draft, Representative, Step, CUSTOM_OPTION};
use std::collections::BTreeSet;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WizardError {
    #[error("select an MEP before continuing")]
    NoRepresentative,
    #[error("choose a greeting before continuing")]
    NoGreeting,
    #[error("enter your name before continuing")]
    NoSenderName,
    #[error("already at the last step")]
    LastStep,
}

/// Whether `step` should be shown for this draft.
pub fn is_visible(draft: &Draft, step: Step) -> bool {
    draft.current_step >= step
        && (step == Step::SelectRepresentative || draft.selected_mep.is_some())
}

/// Check the current step's required field.
pub fn validate(draft: &Draft) -> Result<(), WizardError> {
    match draft.current_step {
        Step::SelectRepresentative if draft.selected_mep.is_none() => {
            Err(WizardError::NoRepresentative)
        }
        Step::ComposeMessage if draft.greeting.is_empty() => Err(WizardError::NoGreeting),
        Step::Personalize if draft.sender_name.trim().is_empty() => Err(WizardError::NoSenderName),
        Step::CopyAndSend => Err(WizardError::LastStep),
        _ => Ok(()),
    }
}

pub fn can_continue(draft: &Draft) -> bool {
    validate(draft).is_ok()
}

/// Move forward one step when the current step is complete.
pub fn advance(draft: &mut Draft) -> Result<Step, WizardError> {
    validate(draft)?;
    let next = draft.current_step.next().ok_or(WizardError::LastStep)?;
    draft.current_step = next;
    Ok(next)
}

/// Move back one step; no validation. Stays put on the first step.
pub fn back(draft: &mut Draft) -> Step {
    if let Some(prev) = draft.current_step.prev() {
        draft.current_step = prev;
    }
    draft.current_step
}

/// Jump straight to step `n` (clamped into 1..=4) regardless of validation.
pub fn jump(draft: &mut Draft, n: i64) -> Step {
    draft.current_step = Step::clamped(n);
    draft.current_step
}

/// Pick the representative. Later-step content is kept.
pub fn select_representative(draft: &mut Draft, rep: &Representative) {
    draft.selected_mep = Some(rep.clone());
}

/// Add `id` if absent, remove it if present. Returns whether it is now selected.
pub fn toggle(set: &mut BTreeSet<String>, id: &str) -> bool {
    if set.remove(id) {
        false
    } else {
        set.insert(id.to_string());
        true
    }
}

/// Typing a custom opening selects the custom option.
pub fn set_custom_opening(draft: &mut Draft, text: &str) {
    draft.custom_opening = text.to_string();
    if !text.is_empty() {
        draft.opening = CUSTOM_OPTION.to_string();
    }
}

/// Typing a custom closing selects the custom option.
pub fn set_custom_closing(draft: &mut Draft, text: &str) {
    draft.custom_closing = text.to_string();
    if !text.is_empty() {
        draft.closing = CUSTOM_OPTION.to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rep() -> Representative {
        Representative {
            id: 7,
            ep_id: "7".into(),
            name: "Jan Novak".into(),
            country: "Czechia".into(),
            group: "NI".into(),
            email: String::new(),
            photo_url: String::new(),
            profile_url: String::new(),
        }
    }

    #[test]
    fn forward_requires_each_steps_field() {
        let mut d = Draft::default();
        assert_eq!(advance(&mut d), Err(WizardError::NoRepresentative));
        assert_eq!(d.current_step, Step::SelectRepresentative);

        select_representative(&mut d, &rep());
        assert_eq!(advance(&mut d), Ok(Step::ComposeMessage));

        assert!(!can_continue(&d));
        d.greeting = "formal-name".into();
        assert_eq!(advance(&mut d), Ok(Step::Personalize));

        d.sender_name = "   ".into();
        assert_eq!(advance(&mut d), Err(WizardError::NoSenderName));
        d.sender_name = "Jane".into();
        assert_eq!(advance(&mut d), Ok(Step::CopyAndSend));

        assert_eq!(advance(&mut d), Err(WizardError::LastStep));
    }

    #[test]
    fn back_and_jump() {
        let mut d = Draft::default();
        assert_eq!(back(&mut d), Step::SelectRepresentative);
        assert_eq!(jump(&mut d, 3), Step::Personalize);
        assert_eq!(back(&mut d), Step::ComposeMessage);
        assert_eq!(jump(&mut d, 42), Step::CopyAndSend);
        assert_eq!(jump(&mut d, -1), Step::SelectRepresentative);
    }

    #[test]
    fn visibility_needs_step_and_representative() {
        let mut d = Draft::default();
        jump(&mut d, 4);
        assert!(is_visible(&d, Step::SelectRepresentative));
        assert!(!is_visible(&d, Step::ComposeMessage));
        select_representative(&mut d, &rep());
        assert!(Step::ALL.iter().all(|s| is_visible(&d, *s)));
        jump(&mut d, 2);
        assert!(is_visible(&d, Step::ComposeMessage));
        assert!(!is_visible(&d, Step::Personalize));
    }

    #[test]
    fn changing_representative_keeps_content() {
        let mut d = Draft::default();
        select_representative(&mut d, &rep());
        d.personal_message = "kept".into();
        d.concerns.insert("a".into());
        let mut other = rep();
        other.id = 8;
        select_representative(&mut d, &other);
        assert_eq!(d.selected_mep.as_ref().map(|r| r.id), Some(8));
        assert_eq!(d.personal_message, "kept");
        assert!(d.concerns.contains("a"));
    }

    #[test]
    fn toggle_and_custom_slots() {
        let mut d = Draft::default();
        assert!(toggle(&mut d.asks, "x"));
        assert!(!toggle(&mut d.asks, "x"));
        assert!(d.asks.is_empty());

        set_custom_opening(&mut d, "Hello there.");
        assert_eq!(d.opening, CUSTOM_OPTION);
        d.opening = "upcoming-vote".into();
        set_custom_opening(&mut d, "");
        assert_eq!(d.opening, "upcoming-vote");

        set_custom_closing(&mut d, "Bye.");
        assert_eq!(d.closing, CUSTOM_OPTION);
        assert_eq!(d.custom_closing, "Bye.");
    }
}
