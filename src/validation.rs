use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;

use crate::parsing::sections::count_numbered_items;
use crate::types::worksheet_data::{
    ActivityCheck, ExpectedCounts, ParsedSections, ValidationResult, ValidationSummary,
    ACTIVITY_ORDINALS,
};

static BANNED_TERMS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(picture|draw|diagram|image|illustration)\b").unwrap());

/// Topic must appear at least this many times for the lesson to count as on-topic.
pub const MIN_TOPIC_MENTIONS: usize = 2;

/// Compares item counts of activities 1..=4 against `expected`. Activities the parser
/// did not find count as empty; activities beyond 4 are not checked.
pub fn validate_counts(sections: &ParsedSections, expected: &ExpectedCounts) -> ValidationResult {
    let activities: Vec<ActivityCheck> = ACTIVITY_ORDINALS
        .iter()
        .map(|&ordinal| {
            let actual = count_numbered_items(sections.activity(ordinal).unwrap_or(""));
            let expected_count = expected.for_activity(ordinal);
            ActivityCheck {
                ordinal,
                actual,
                expected: expected_count,
                matches: actual == expected_count as usize,
            }
        })
        .collect();

    let summary = ValidationSummary {
        ok: activities.iter().all(|a| a.matches),
        total_activities: sections.activity_count(),
        matching_activities: activities.iter().filter(|a| a.matches).count(),
        total_expected: expected.total(),
        total_actual: activities.iter().map(|a| a.actual).sum(),
    };

    ValidationResult { activities, summary }
}

/// Checks a raw lesson for visual-task vocabulary and for staying on topic.
/// Returns whether it passed plus one warning per failed check.
pub fn validate_lesson_content(text: &str, topic: &str) -> (bool, Vec<String>) {
    let mut warnings = Vec::new();

    let banned: BTreeSet<String> = BANNED_TERMS_RE
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect();
    if !banned.is_empty() {
        let listed: Vec<String> = banned.into_iter().collect();
        warnings.push(format!("Found banned terms: {}", listed.join(", ")));
    }

    let topic_mentions = count_case_insensitive(text, topic);
    if topic_mentions < MIN_TOPIC_MENTIONS {
        warnings.push(format!("Topic '{}' only appears {} times", topic, topic_mentions));
    }

    (warnings.is_empty(), warnings)
}

fn count_case_insensitive(haystack: &str, needle: &str) -> usize {
    match Regex::new(&format!("(?i){}", regex::escape(needle))) {
        Ok(re) => re.find_iter(haystack).count(),
        Err(_) => haystack.to_lowercase().matches(&needle.to_lowercase()).count(),
    }
}
