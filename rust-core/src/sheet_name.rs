use crate::error::{Error, Result};

/// Longest sheet name spreadsheet applications accept.
pub const MAX_SHEET_NAME_LEN: usize = 31;

const FORBIDDEN: [char; 7] = ['[', ']', ':', '*', '?', '/', '\\'];

/// Checks that `name` can be used as a worksheet tab name.
pub fn validate_sheet_name(name: &str) -> Result<()> {
    let reason = if name.trim().is_empty() {
        Some("name is blank")
    } else if name.chars().count() > MAX_SHEET_NAME_LEN {
        Some("name is longer than 31 characters")
    } else if name.contains(FORBIDDEN) {
        Some("name contains one of [ ] : * ? / \\")
    } else if name.starts_with('\'') || name.ends_with('\'') {
        Some("name begins or ends with an apostrophe")
    } else if name.eq_ignore_ascii_case("History") {
        Some("`History` is reserved")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(Error::InvalidSheetName {
            name: name.to_owned(),
            reason,
        }),
        None => Ok(()),
    }
}

/// Derives a valid sheet name from a query, for when the user leaves the
/// sheet name blank.
pub fn sheet_name_from_query(query: &str) -> String {
    let cleaned: String = query
        .trim()
        .chars()
        .map(|c| if FORBIDDEN.contains(&c) { '_' } else { c })
        .take(MAX_SHEET_NAME_LEN)
        .collect();
    let cleaned = cleaned.trim_matches('\'');

    if cleaned.trim().is_empty() || cleaned.eq_ignore_ascii_case("History") {
        // "History" и пустое имя Excel не принимает
        format!("Sheet {}", cleaned.trim()).trim_end().to_owned()
    } else {
        cleaned.to_owned()
    }
}

/// Sheet names are unique regardless of case.
pub fn same_sheet_name(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}
