/// Clean the text content of a table cell.
///
/// Steps, in order: trim; drop literal `&nbsp` escapes; cut at the first `" *"`
/// footnote marker; cut at the first `[` citation marker; remove newlines and any
/// remaining asterisks. Never fails.
pub fn clean(text: Option<&str>) -> String {
    let mut text = text.unwrap_or_default().trim().to_string();

    text = text.replace("&nbsp;", "").replace("&nbsp", "");

    if let Some(idx) = text.find(" *") {
        text.truncate(idx);
    }
    if let Some(idx) = text.find('[') {
        text.truncate(idx);
    }

    text.retain(|c| c != '\n' && c != '*');
    text
}

/// Strip thousands/decimal separators from a cleaned capacity cell.
pub fn strip_separators(text: &str) -> String {
    text.chars().filter(|c| *c != ',' && *c != '.').collect()
}
