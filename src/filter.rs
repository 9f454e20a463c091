use crate::model::{FilterState, Representative};

/// Representatives matching `filters`, in input order.
///
/// `search` is a case-insensitive substring of the name or the email;
/// `country` and `group` must match exactly when non-empty.
pub fn filter<'a>(list: &'a [Representative], filters: &FilterState) -> Vec<&'a Representative> {
    let search = filters.search.to_lowercase();
    list.iter()
        .filter(|rep| matches(rep, &search, filters))
        .collect()
}

fn matches(rep: &Representative, search_lower: &str, filters: &FilterState) -> bool {
    let matches_search = rep.name.to_lowercase().contains(search_lower)
        || rep.email.to_lowercase().contains(search_lower);
    let matches_country = filters.country.is_empty() || rep.country == filters.country;
    let matches_group = filters.group.is_empty() || rep.group == filters.group;
    matches_search && matches_country && matches_group
}

/// Comma-separated emails for "copy all", skipping representatives without one.
pub fn format_emails_for_copy<'a, I>(reps: I) -> String
where
    I: IntoIterator<Item = &'a Representative>,
{
    reps.into_iter()
        .filter(|r| !r.email.is_empty())
        .map(|r| r.email.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}
