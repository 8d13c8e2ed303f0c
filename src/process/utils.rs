/// Markers that tabular exports use for a missing value.
const NA_MARKERS: &[&str] = &[
    "", "na", "n/a", "nan", "null", "none", "#n/a", "<na>", "nat",
];

/// 1) Trim whitespace + strip outer quotes if present.
pub fn clean_str(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.starts_with('"') && trimmed.ends_with('"') && trimmed.len() >= 2 {
        trimmed[1..trimmed.len() - 1].trim().to_string()
    } else {
        trimmed.to_string()
    }
}

/// 2) Is a cleaned cell a missing-value marker?
pub fn is_na(cleaned: &str) -> bool {
    let lower = cleaned.to_ascii_lowercase();
    NA_MARKERS.contains(&lower.as_str())
}

/// 3) Shorten `s` to at most `max` chars, marking the cut with `…`.
pub fn truncate_display(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let keep = max.saturating_sub(1);
    let mut out: String = s.chars().take(keep).collect();
    out.push('…');
    out
}
