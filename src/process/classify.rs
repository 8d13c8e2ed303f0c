// src/process/classify.rs

/// Well-known publication date headers, highest priority first.
pub const DATE_COLUMN_PRIORITY: &[&str] = &[
    "publish_time",
    "publish_date",
    "pub_date",
    "date",
    "publication_date",
    "time",
];

/// Fragments that mark a header as date-like when no exact name matches.
pub const DATE_COLUMN_FRAGMENTS: &[&str] = &["publish", "publication", "pub", "date", "time"];

/// Pick the single column most likely to hold a publication date.
///
///  - exact, case-insensitive match against `DATE_COLUMN_PRIORITY`, in list order
///  - otherwise the first column (left to right) containing a `DATE_COLUMN_FRAGMENTS` entry
///  - otherwise `None`
pub fn classify<S: AsRef<str>>(columns: &[S]) -> Option<String> {
    exact_match(columns).or_else(|| fragment_matches(columns).next())
}

/// Every date-like column, in the order the rules in [`classify`] would visit them.
/// The first entry is always what `classify` returns.
pub fn candidates<S: AsRef<str>>(columns: &[S]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for wanted in DATE_COLUMN_PRIORITY {
        for c in columns {
            let c = c.as_ref();
            if c.eq_ignore_ascii_case(wanted) && !out.iter().any(|o| o == c) {
                out.push(c.to_string());
            }
        }
    }
    for c in fragment_matches(columns) {
        if !out.contains(&c) {
            out.push(c);
        }
    }
    out
}

fn exact_match<S: AsRef<str>>(columns: &[S]) -> Option<String> {
    DATE_COLUMN_PRIORITY.iter().find_map(|wanted| {
        columns
            .iter()
            .map(AsRef::as_ref)
            .find(|c| c.eq_ignore_ascii_case(wanted))
            .map(str::to_string)
    })
}

fn fragment_matches<S: AsRef<str>>(columns: &[S]) -> impl Iterator<Item = String> + '_ {
    columns.iter().filter_map(|c| {
        let lower = c.as_ref().to_lowercase();
        DATE_COLUMN_FRAGMENTS
            .iter()
            .any(|f| lower.contains(f))
            .then(|| c.as_ref().to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_priority_beats_column_order() {
        assert_eq!(classify(&["id", "pub_date", "date"]), Some("pub_date".into()));
        assert_eq!(classify(&["date", "publish_time"]), Some("publish_time".into()));
    }

    #[test]
    fn exact_match_is_case_insensitive_and_keeps_original_name() {
        assert_eq!(classify(&["Title", "Publish_Time"]), Some("Publish_Time".into()));
    }

    #[test]
    fn substring_fallback_scans_left_to_right() {
        assert_eq!(
            classify(&["id", "release_date_of_record"]),
            Some("release_date_of_record".into())
        );
        assert_eq!(
            classify(&["id", "first_pub_year", "updated_date"]),
            Some("first_pub_year".into())
        );
    }

    #[test]
    fn no_candidate_yields_none() {
        assert_eq!(classify(&["id", "title", "author"]), None);
        assert_eq!(classify::<&str>(&[]), None);
    }

    #[test]
    fn classification_is_deterministic() {
        let cols = vec!["sha".to_string(), "Time".into(), "publish_date".into(), "journal".into()];
        let first = classify(&cols);
        for _ in 0..10 {
            assert_eq!(classify(&cols), first);
        }
        assert_eq!(first, Some("publish_date".into()));
    }

    #[test]
    fn candidates_start_with_classified_column() {
        let cols = ["id", "updated_date", "pub_date", "date"];
        let all = candidates(&cols);
        assert_eq!(all, vec!["pub_date", "date", "updated_date"]);
        assert_eq!(classify(&cols).as_deref(), all.first().map(String::as_str));
    }
}
