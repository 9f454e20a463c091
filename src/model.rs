use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Option id that selects the free-text override for opening/closing slots.
pub const CUSTOM_OPTION: &str = "custom";

/// One directory entry. Loaded once from the bundled dataset and never mutated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Representative {
    pub id: i64,
    #[serde(default)]
    pub ep_id: String,
    pub name: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub group: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub photo_url: String,
    #[serde(default)]
    pub profile_url: String,
}

/// Wrapper shape of the bundled dataset file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryData {
    pub last_updated: String,
    pub total_meps: usize,
    pub meps: Vec<Representative>,
}

/// Search/filter input for the directory listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterState {
    pub search: String,
    pub country: String,
    pub group: String,
}

/// Visible autosave status of a draft session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SaveStatus {
    #[default]
    Idle,
    Saving,
    Saved,
    Restored,
}

impl SaveStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SaveStatus::Idle => "idle",
            SaveStatus::Saving => "saving",
            SaveStatus::Saved => "saved",
            SaveStatus::Restored => "restored",
        }
    }
}

/// Wizard step. Persisted as its number (1..=4); anything outside that range
/// is clamped on the way in.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Default)]
#[serde(from = "i64", into = "u8")]
pub enum Step {
    #[default]
    SelectRepresentative = 1,
    ComposeMessage = 2,
    Personalize = 3,
    CopyAndSend = 4,
}

impl Step {
    pub const ALL: [Step; 4] = [
        Step::SelectRepresentative,
        Step::ComposeMessage,
        Step::Personalize,
        Step::CopyAndSend,
    ];

    pub fn number(self) -> u8 {
        self as u8
    }

    /// Clamp an arbitrary step number into the valid range.
    pub fn clamped(n: i64) -> Step {
        match n {
            i64::MIN..=1 => Step::SelectRepresentative,
            2 => Step::ComposeMessage,
            3 => Step::Personalize,
            _ => Step::CopyAndSend,
        }
    }

    pub fn next(self) -> Option<Step> {
        match self {
            Step::SelectRepresentative => Some(Step::ComposeMessage),
            Step::ComposeMessage => Some(Step::Personalize),
            Step::Personalize => Some(Step::CopyAndSend),
            Step::CopyAndSend => None,
        }
    }

    pub fn prev(self) -> Option<Step> {
        match self {
            Step::SelectRepresentative => None,
            Step::ComposeMessage => Some(Step::SelectRepresentative),
            Step::Personalize => Some(Step::ComposeMessage),
            Step::CopyAndSend => Some(Step::Personalize),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Step::SelectRepresentative => "Select MEP",
            Step::ComposeMessage => "Build Message",
            Step::Personalize => "Personal Touch",
            Step::CopyAndSend => "Copy & Send",
        }
    }
}

impl From<i64> for Step {
    fn from(n: i64) -> Self {
        Step::clamped(n)
    }
}

impl From<Step> for u8 {
    fn from(step: Step) -> Self {
        step.number()
    }
}

/// In-progress advocacy email for one campaign.
///
/// `template_index`/`subject_index` are persisted state: they are assigned once
/// when a draft lifecycle starts and survive every other update.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct Draft {
    pub selected_mep: Option<Representative>,
    pub greeting: String,
    pub opening: String,
    pub custom_opening: String,
    pub concerns: BTreeSet<String>,
    pub custom_concern: String,
    pub asks: BTreeSet<String>,
    pub custom_ask: String,
    pub closing: String,
    pub custom_closing: String,
    pub personal_message: String,
    pub sender_name: String,
    pub current_step: Step,
    #[serde(with = "chrono::serde::ts_milliseconds_option")]
    pub last_saved: Option<DateTime<Utc>>,
    pub template_index: Option<usize>,
    pub subject_index: Option<usize>,
}

impl Draft {
    /// A draft is worth persisting (and guarding with an inactivity timer) once
    /// the user has touched any tracked field.
    pub fn is_non_empty(&self) -> bool {
        self.selected_mep.is_some()
            || !self.greeting.is_empty()
            || !self.opening.is_empty()
            || !self.closing.is_empty()
            || !self.concerns.is_empty()
            || !self.asks.is_empty()
            || !self.personal_message.is_empty()
            || !self.sender_name.is_empty()
    }

    pub fn has_indices(&self) -> bool {
        self.template_index.is_some() && self.subject_index.is_some()
    }
}
