//! Email rendering: campaign template + draft -> subject and body.
use crate::campaign::{Campaign, MessageOption};
use crate::model::{Draft, Representative, CUSTOM_OPTION};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;

static BLANK_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

/// Given names treated as female by the salutation heuristic. Best effort only.
const FEMALE_NAMES: &[&str] = &[
    "Anna", "Maria", "Sophie", "Hannah", "Nathalie", "Christine", "Magdalena", "Katarina", "Mona",
    "Anja", "Renate", "Sabine", "Heidi",
];

const FALLBACK_GREETING: &str = "Dear Sir/Madam,";
const FALLBACK_CONCERN: &str = "human rights violations continue unchecked";
const NAME_PLACEHOLDER: &str = "[Your name]";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedEmail {
    pub subject: String,
    pub body: String,
}

pub fn render(draft: &Draft, campaign: &Campaign) -> RenderedEmail {
    RenderedEmail {
        subject: subject(draft, campaign),
        body: body(draft, campaign),
    }
}

pub fn subject(draft: &Draft, campaign: &Campaign) -> String {
    let index = draft.subject_index.unwrap_or(0);
    campaign
        .subjects
        .get(index)
        .or_else(|| campaign.subjects.first())
        .cloned()
        .unwrap_or_default()
}

/// Rendered body, or an empty string until a representative is chosen.
pub fn body(draft: &Draft, campaign: &Campaign) -> String {
    let Some(mep) = draft.selected_mep.as_ref() else {
        return String::new();
    };
    let index = draft.template_index.unwrap_or(0);
    let Some(template) = campaign
        .body_templates
        .get(index)
        .or_else(|| campaign.body_templates.first())
    else {
        return String::new();
    };

    let greeting = match campaign.greeting(&draft.greeting) {
        Some(g) => g
            .template
            .replace("{title}", salutation_title(mep))
            .replace("{lastName}", last_name(mep)),
        None => FALLBACK_GREETING.to_string(),
    };
    let opening = choose(&draft.opening, &draft.custom_opening, |id| campaign.opening(id));
    let closing = choose(&draft.closing, &draft.custom_closing, |id| campaign.closing(id));

    let concerns = collect_items(&campaign.concerns, &draft.concerns, &draft.custom_concern);
    let asks = collect_items(&campaign.asks, &draft.asks, &draft.custom_ask);
    let concern_first = concerns
        .first()
        .map(|c| c.to_lowercase())
        .unwrap_or_else(|| FALLBACK_CONCERN.to_string());

    let name = if draft.sender_name.trim().is_empty() {
        NAME_PLACEHOLDER
    } else {
        draft.sender_name.as_str()
    };

    let filled = template
        .replace("{greeting}", &greeting)
        .replace("{opening}", opening)
        .replace("{concernsParagraph}", &concerns.join(" Furthermore, "))
        .replace("{concernFirst}", &concern_first)
        .replace("{concerns}", &bullets(&concerns))
        .replace("{asksParagraph}", &asks.join(" Additionally, "))
        .replace("{asks}", &bullets(&asks))
        .replace("{personal}", &draft.personal_message)
        .replace("{closing}", closing)
        .replace("{name}", name);

    collapse_blank_lines(&filled)
}

/// `Ms.` when the first name starts with a listed female name, else `Mr.`.
pub fn salutation_title(mep: &Representative) -> &'static str {
    let first = mep.name.split_whitespace().next().unwrap_or("").to_lowercase();
    let female = FEMALE_NAMES
        .iter()
        .any(|n| first.starts_with(&n.to_lowercase()));
    if female {
        "Ms."
    } else {
        "Mr."
    }
}

pub fn last_name(mep: &Representative) -> &str {
    mep.name.split_whitespace().last().unwrap_or("")
}

/// Reduce runs of blank lines to a single blank line and trim the ends.
pub fn collapse_blank_lines(text: &str) -> String {
    BLANK_RUNS.replace_all(text, "\n\n").trim().to_string()
}

fn choose<'a>(
    id: &str,
    custom: &'a str,
    lookup: impl Fn(&str) -> Option<&'a MessageOption>,
) -> &'a str {
    if id == CUSTOM_OPTION && !custom.is_empty() {
        return custom;
    }
    lookup(id).map(|o| o.text.as_str()).unwrap_or("")
}

/// Selected options in campaign order, then the free-text addition.
fn collect_items<'a>(
    options: &'a [MessageOption],
    selected: &BTreeSet<String>,
    custom: &'a str,
) -> Vec<&'a str> {
    let mut items: Vec<&str> = options
        .iter()
        .filter(|o| selected.contains(&o.id))
        .map(|o| o.text.as_str())
        .collect();
    if !custom.is_empty() {
        items.push(custom);
    }
    items
}

fn bullets(items: &[&str]) -> String {
    items
        .iter()
        .map(|i| format!("• {}", i))
        .collect::<Vec<_>>()
        .join("\n")
}
