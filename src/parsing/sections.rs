use crate::types::worksheet_data::{ParsedSections, ACTIVITY_ORDINALS};
use once_cell::sync::Lazy;
use regex::Regex;

static ACTIVITY_HEADER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^Activity\s+(\d+)\s*$").unwrap());
static NUMBERED_ITEM_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^\s*\d+\.\s").unwrap());
static NUMBERED_LINE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*\d+\.\s").unwrap());

// Which buffer the parser is currently filling.
#[derive(Debug, PartialEq, Clone, Copy)]
enum ParsingSection {
    Explanation,
    Activity(u32),
}

pub fn activity_header_ordinal(line: &str) -> Option<u32> {
    let caps = ACTIVITY_HEADER_RE.captures(line.trim())?;
    caps.get(1)?.as_str().parse().ok()
}

fn flush(sections: &mut ParsedSections, current: ParsingSection, buffer: &mut Vec<&str>) {
    let content = buffer.join("\n").trim().to_string();
    buffer.clear();
    match current {
        ParsingSection::Explanation => sections.set_explanation(content),
        ParsingSection::Activity(ordinal) => sections.put_activity(ordinal, content),
    }
}

/// Splits cleaned worksheet text at "Activity N" header lines. Text before the first
/// header is the explanation; header lines themselves are never part of any content.
pub fn parse_lesson_sections(text: &str) -> ParsedSections {
    let mut sections = ParsedSections::new("");
    let mut current = ParsingSection::Explanation;
    let mut buffer: Vec<&str> = Vec::new();

    for line in text.split('\n') {
        match activity_header_ordinal(line) {
            Some(ordinal) => {
                flush(&mut sections, current, &mut buffer);
                current = ParsingSection::Activity(ordinal);
            }
            None => buffer.push(line),
        }
    }
    flush(&mut sections, current, &mut buffer);

    sections
}

pub fn count_numbered_items(block: &str) -> usize {
    if block.is_empty() {
        return 0;
    }
    NUMBERED_ITEM_RE.find_iter(block).count()
}

pub fn is_numbered_line(line: &str) -> bool {
    NUMBERED_LINE_RE.is_match(line.trim())
}

/// Lines of `text` that look like "N. item", in order.
pub fn numbered_lines(text: &str) -> Vec<&str> {
    text.split('\n').filter(|line| is_numbered_line(line)).collect()
}

/// Serializes sections back into worksheet text: explanation, then activities 1..=4 in
/// order. Activities missing from `sections` are skipped, as is anything beyond 4.
pub fn reassemble(sections: &ParsedSections) -> String {
    let mut text = String::new();
    text.push_str(sections.explanation().trim());
    text.push_str("\n\n");
    for ordinal in ACTIVITY_ORDINALS {
        if let Some(content) = sections.activity(ordinal) {
            text.push_str(&format!("Activity {}\n{}\n\n", ordinal, content));
        }
    }
    text.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::worksheet_data::Section;
    use pretty_assertions::assert_eq;

    const CLEANED: &str = "Grammar — Nouns\n\
\n\
Explanation\n\
\n\
A noun names a person, place, or thing.\n\
\n\
Activity 1\n\
\n\
1. cat\n\
2. dog\n\
\n\
Activity 2\n\
Circle the nouns.\n\
1. The bus is red.\n\
\n\
activity   4  \n\
1. one";

    #[test]
    fn splits_explanation_and_activities() {
        let sections = parse_lesson_sections(CLEANED);
        assert_eq!(
            sections.explanation(),
            "Grammar — Nouns\n\nExplanation\n\nA noun names a person, place, or thing."
        );
        assert_eq!(sections.activity(1), Some("1. cat\n2. dog"));
        assert_eq!(sections.activity(2), Some("Circle the nouns.\n1. The bus is red."));
        assert_eq!(sections.activity(3), None);
        assert_eq!(sections.activity(4), Some("1. one"));
        assert_eq!(sections.activity_count(), 3);
    }

    #[test]
    fn no_headers_means_everything_is_explanation() {
        let sections = parse_lesson_sections("  just some text\n\n");
        assert_eq!(sections.explanation(), "just some text");
        assert_eq!(sections.activity_count(), 0);
        assert_eq!(sections.sections().len(), 1);
    }

    #[test]
    fn repeated_ordinal_keeps_the_last_content() {
        let sections = parse_lesson_sections("intro\nActivity 1\nfirst\nActivity 1\nsecond");
        assert_eq!(sections.activity(1), Some("second"));
        assert_eq!(sections.activity_count(), 1);
    }

    #[test]
    fn explanation_is_always_first_section() {
        let sections = parse_lesson_sections("Activity 2\nx\nActivity 1\ny");
        assert!(matches!(sections.sections()[0], Section::Explanation(ref t) if t.is_empty()));
    }

    #[test]
    fn counts_numbered_lines_only() {
        assert_eq!(count_numbered_items("1. a\n2. b\n   3. c\nnot numbered"), 3);
        assert_eq!(count_numbered_items(""), 0);
        assert_eq!(count_numbered_items("1.no space\n10. ten\n- 2. bullet"), 1);
    }

    #[test]
    fn numbered_lines_are_filtered_in_order() {
        let response = "Here you go:\n1. first\n  2. second\nThanks!\n3. third";
        assert_eq!(numbered_lines(response), vec!["1. first", "  2. second", "3. third"]);
    }

    #[test]
    fn reassemble_orders_activities_and_skips_missing() {
        let sections = ParsedSections::new("Title\n\nExplanation")
            .with_activity(3, "1. c")
            .with_activity(1, "1. a")
            .with_activity(7, "1. ignored");
        assert_eq!(
            reassemble(&sections),
            "Title\n\nExplanation\n\nActivity 1\n1. a\n\nActivity 3\n1. c"
        );
    }

    #[test]
    fn reassembled_text_parses_back_to_the_same_sections() {
        let original = parse_lesson_sections(CLEANED);
        let round_tripped = parse_lesson_sections(&reassemble(&original));
        assert_eq!(round_tripped.explanation(), original.explanation());
        for ordinal in ACTIVITY_ORDINALS {
            assert_eq!(round_tripped.activity(ordinal), original.activity(ordinal));
        }
    }
}
