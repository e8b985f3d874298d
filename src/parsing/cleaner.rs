use once_cell::sync::Lazy;
use regex::Regex;

static BOLD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*(.*?)\*\*").unwrap());
static ITALIC_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"_(.*?)_").unwrap());
static HEADING_MARK_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^#{1,3}\s*").unwrap());
static RULE_HEADING_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^\s*Rule Heading\s*$").unwrap());
static RULE_N_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^\s*Rule \d+:.*$").unwrap());
static ACTIVITY_SECTION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(?:\d+\.\s*)?(?:Activity|Section) Section [A-Z]\s*$").unwrap()
});
static BULLET_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*[-•]\s*").unwrap());

pub const EXPLANATION_HEADER: &str = "Explanation";

/// How a single source line is handled. Variants are listed in priority order;
/// the first predicate that accepts a line decides its kind.
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum LineKind {
    RuleHeading,
    TopicDuplicate,
    ActivityHeader,
    BulletItem,
    Plain,
}

pub fn is_rule_heading(line: &str) -> bool {
    RULE_HEADING_RE.is_match(line) || RULE_N_RE.is_match(line)
}

pub fn is_topic_duplicate(line: &str, topic: &str) -> bool {
    line.trim().to_lowercase() == topic.to_lowercase()
}

pub fn is_activity_header(line: &str) -> bool {
    ACTIVITY_SECTION_RE.is_match(line)
}

pub fn is_bullet_item(line: &str) -> bool {
    BULLET_RE.is_match(line)
}

pub fn classify_line(line: &str, topic: &str) -> LineKind {
    if is_rule_heading(line) {
        LineKind::RuleHeading
    } else if is_topic_duplicate(line, topic) {
        LineKind::TopicDuplicate
    } else if is_activity_header(line) {
        LineKind::ActivityHeader
    } else if is_bullet_item(line) {
        LineKind::BulletItem
    } else {
        LineKind::Plain
    }
}

pub fn strip_bullet(line: &str) -> &str {
    match BULLET_RE.find(line) {
        Some(m) => &line[m.end()..],
        None => line,
    }
}

/// Removes `**bold**` and `_italic_` wrappers (keeping the inner text) and leading `#` heading marks.
pub fn strip_markdown(text: &str) -> String {
    let text = BOLD_RE.replace_all(text, "$1");
    let text = ITALIC_RE.replace_all(&text, "$1");
    HEADING_MARK_RE.replace_all(&text, "").into_owned()
}

pub fn title_line(subject: &str, topic: &str) -> String {
    format!("{} — {}", subject, topic)
}

// Per-call walk state; nothing survives between `clean_lesson_text` calls.
#[derive(Debug, Default)]
struct CleanState {
    explanation_emitted: bool,
    activity_counter: u32,
    lines: Vec<String>,
}

impl CleanState {
    fn emit(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    fn accept(&mut self, line: &str, topic: &str) {
        match classify_line(line, topic) {
            LineKind::RuleHeading => {
                if !self.explanation_emitted {
                    self.emit(EXPLANATION_HEADER);
                    self.emit("");
                    self.explanation_emitted = true;
                }
            }
            LineKind::TopicDuplicate => {}
            LineKind::ActivityHeader => {
                self.activity_counter += 1;
                let header = format!("Activity {}", self.activity_counter);
                self.emit(header);
                self.emit("");
            }
            LineKind::BulletItem => self.emit(strip_bullet(line)),
            LineKind::Plain => self.emit(line),
        }
    }
}

/// Keeps at most one blank line in a row and drops blank lines at either end.
pub fn collapse_blank_lines(lines: Vec<String>) -> Vec<String> {
    let mut collapsed: Vec<String> = Vec::with_capacity(lines.len());
    let mut consecutive_blanks = 0;
    for line in lines {
        if line.trim().is_empty() {
            consecutive_blanks += 1;
        } else {
            consecutive_blanks = 0;
        }
        if consecutive_blanks <= 1 {
            collapsed.push(line);
        }
    }

    let start = collapsed.iter().position(|l| !l.trim().is_empty()).unwrap_or(collapsed.len());
    let end = collapsed.iter().rposition(|l| !l.trim().is_empty()).map_or(start, |i| i + 1);
    collapsed.drain(start..end).collect()
}

/// Rewrites raw model output into the canonical layout: one title line, a single
/// "Explanation" header and "Activity 1".."Activity N" headers in encounter order.
/// Empty input comes back untouched.
pub fn clean_lesson_text(text: &str, subject: &str, topic: &str) -> String {
    if text.is_empty() {
        return text.to_string();
    }

    let stripped = strip_markdown(text);

    let mut state = CleanState::default();
    state.emit(title_line(subject, topic));
    state.emit("");

    for line in stripped.split('\n') {
        state.accept(line, topic);
    }

    collapse_blank_lines(state.lines).join("\n")
}
