//! Default country filter from the user's locale.

/// Locale tags mapped to EU member states. Exact tags take precedence over the
/// bare language.
const LOCALE_COUNTRIES: &[(&str, &str)] = &[
    ("de", "Germany"),
    ("de-AT", "Austria"),
    ("de-DE", "Germany"),
    ("fr", "France"),
    ("fr-FR", "France"),
    ("fr-BE", "Belgium"),
    ("it", "Italy"),
    ("it-IT", "Italy"),
    ("es", "Spain"),
    ("es-ES", "Spain"),
    ("pt", "Portugal"),
    ("pt-PT", "Portugal"),
    ("nl", "Netherlands"),
    ("nl-NL", "Netherlands"),
    ("nl-BE", "Belgium"),
    ("pl", "Poland"),
    ("pl-PL", "Poland"),
    ("ro", "Romania"),
    ("ro-RO", "Romania"),
    ("el", "Greece"),
    ("el-GR", "Greece"),
    ("cs", "Czechia"),
    ("cs-CZ", "Czechia"),
    ("hu", "Hungary"),
    ("hu-HU", "Hungary"),
    ("sv", "Sweden"),
    ("sv-SE", "Sweden"),
    ("bg", "Bulgaria"),
    ("bg-BG", "Bulgaria"),
    ("da", "Denmark"),
    ("da-DK", "Denmark"),
    ("fi", "Finland"),
    ("fi-FI", "Finland"),
    ("sk", "Slovakia"),
    ("sk-SK", "Slovakia"),
    ("hr", "Croatia"),
    ("hr-HR", "Croatia"),
    ("lt", "Lithuania"),
    ("lt-LT", "Lithuania"),
    ("sl", "Slovenia"),
    ("sl-SI", "Slovenia"),
    ("lv", "Latvia"),
    ("lv-LV", "Latvia"),
    ("et", "Estonia"),
    ("et-EE", "Estonia"),
    ("mt", "Malta"),
    ("mt-MT", "Malta"),
    ("ga", "Ireland"),
    ("en-IE", "Ireland"),
    ("lb", "Luxembourg"),
    ("fr-LU", "Luxembourg"),
    ("de-LU", "Luxembourg"),
];

/// Environment variables consulted, highest priority first.
const LOCALE_VARS: &[&str] = &["LANGUAGE", "LC_ALL", "LC_MESSAGES", "LANG"];

fn lookup(tag: &str) -> Option<&'static str> {
    LOCALE_COUNTRIES
        .iter()
        .find(|(t, _)| *t == tag)
        .map(|(_, country)| *country)
}

/// `de_AT.UTF-8@euro` -> `de-AT`. `C`, `POSIX` and blanks yield `None`.
pub fn normalize(raw: &str) -> Option<String> {
    let base = raw.split(['.', '@']).next().unwrap_or("").trim();
    if base.is_empty() || base == "C" || base == "POSIX" {
        return None;
    }
    let mut parts = base.split(['_', '-']);
    let lang = parts.next()?.to_ascii_lowercase();
    match parts.next() {
        Some(region) if !region.is_empty() => {
            Some(format!("{}-{}", lang, region.to_ascii_uppercase()))
        }
        _ => Some(lang),
    }
}

pub fn country_for_locale(raw: &str) -> Option<&'static str> {
    let tag = normalize(raw)?;
    lookup(&tag).or_else(|| tag.split('-').next().and_then(lookup))
}

/// First locale in `locales` that maps to a country.
pub fn country_for_locales<I, S>(locales: I) -> Option<&'static str>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    locales
        .into_iter()
        .find_map(|l| country_for_locale(l.as_ref()))
}

/// Locale candidates in priority order; `LANGUAGE` may hold a `:` list.
pub fn locales_from(var: impl Fn(&str) -> Option<String>) -> Vec<String> {
    LOCALE_VARS
        .iter()
        .filter_map(|name| var(name))
        .flat_map(|value| {
            value
                .split(':')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect::<Vec<_>>()
        })
        .collect()
}

/// Country suggested by the process environment, if any.
pub fn detect_country() -> Option<&'static str> {
    country_for_locales(locales_from(|name| std::env::var(name).ok()))
}
