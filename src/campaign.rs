//! Campaign definitions: the selectable message fragments and template
//! variants for one advocacy topic.
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Built-in campaign definitions, in YAML.
const BUILTIN: &[&str] = &[include_str!("../campaigns/iran.yaml")];

#[derive(Debug, Error)]
pub enum CampaignError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("unknown campaign: {0}")]
    Unknown(String),
    #[error("campaign {id} is invalid: {reason}")]
    Invalid { id: String, reason: &'static str },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Greeting {
    pub id: String,
    /// May contain `{title}` and `{lastName}`.
    pub template: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageOption {
    pub id: String,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Campaign {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub subtitle: String,
    pub subjects: Vec<String>,
    pub greetings: Vec<Greeting>,
    pub openings: Vec<MessageOption>,
    pub concerns: Vec<MessageOption>,
    pub asks: Vec<MessageOption>,
    pub closings: Vec<MessageOption>,
    pub body_templates: Vec<String>,
    #[serde(default)]
    pub personal_message_placeholder: String,
}

impl Campaign {
    pub fn from_yaml(content: &str) -> Result<Self, CampaignError> {
        let campaign: Campaign = serde_yaml::from_str(content)?;
        campaign.validate()?;
        Ok(campaign)
    }

    fn validate(&self) -> Result<(), CampaignError> {
        let invalid = |reason| CampaignError::Invalid {
            id: self.id.clone(),
            reason,
        };
        if self.id.trim().is_empty() {
            return Err(invalid("id must be non-empty"));
        }
        if self.subjects.is_empty() {
            return Err(invalid("at least one subject is required"));
        }
        if self.body_templates.is_empty() {
            return Err(invalid("at least one body template is required"));
        }
        Ok(())
    }

    pub fn greeting(&self, id: &str) -> Option<&Greeting> {
        self.greetings.iter().find(|g| g.id == id)
    }

    pub fn opening(&self, id: &str) -> Option<&MessageOption> {
        self.openings.iter().find(|o| o.id == id)
    }

    pub fn closing(&self, id: &str) -> Option<&MessageOption> {
        self.closings.iter().find(|o| o.id == id)
    }

    pub fn concern(&self, id: &str) -> Option<&MessageOption> {
        self.concerns.iter().find(|o| o.id == id)
    }

    pub fn ask(&self, id: &str) -> Option<&MessageOption> {
        self.asks.iter().find(|o| o.id == id)
    }

    /// Storage key of this campaign's draft.
    pub fn storage_key(&self) -> String {
        storage_key(&self.id)
    }
}

pub fn storage_key(campaign_id: &str) -> String {
    format!("{}{}", STORAGE_KEY_PREFIX, campaign_id)
}

pub const STORAGE_KEY_PREFIX: &str = "mep-campaign-";

/// Campaigns available to the tool, keyed by id.
#[derive(Debug, Clone)]
pub struct Catalog {
    campaigns: Vec<Campaign>,
}

impl Catalog {
    pub fn builtin() -> Result<Self, CampaignError> {
        let campaigns = BUILTIN
            .iter()
            .map(|src| Campaign::from_yaml(src))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { campaigns })
    }

    /// Add campaigns from a YAML file holding either one campaign or a list.
    /// A campaign with an existing id replaces the earlier definition.
    pub fn extend_from_file(&mut self, path: &Path) -> Result<(), CampaignError> {
        let content = fs::read_to_string(path)?;
        let loaded: Vec<Campaign> = match serde_yaml::from_str::<Vec<Campaign>>(&content) {
            Ok(list) => list,
            Err(_) => vec![serde_yaml::from_str::<Campaign>(&content)?],
        };
        for campaign in loaded {
            campaign.validate()?;
            self.campaigns.retain(|c| c.id != campaign.id);
            self.campaigns.push(campaign);
        }
        Ok(())
    }

    pub fn get(&self, id: &str) -> Result<&Campaign, CampaignError> {
        self.campaigns
            .iter()
            .find(|c| c.id == id)
            .ok_or_else(|| CampaignError::Unknown(id.to_string()))
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.campaigns.iter().map(|c| c.id.as_str())
    }
}
