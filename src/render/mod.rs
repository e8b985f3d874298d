pub mod pdf;

pub use pdf::render_pdf;

use once_cell::sync::Lazy;
use regex::Regex;

static NUMBERED_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d+)\.\s*(.+)$").unwrap());
static BULLET_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[-•]\s*(.+)$").unwrap());
static BOLD_SPLIT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*(.*?)\*\*").unwrap());

pub const DOCUMENT_TITLE: &str = "Grammar Club";
pub const WORKSHEET_HEADING: &str = "Lesson Worksheet";
pub const INSTRUCTIONS_PREFIX: &str = "Instructions:";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Run {
    pub text: String,
    pub bold: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Title(String),
    Subtitle(String),
    NameDateLine,
    Heading { level: u8, text: String },
    Numbered { number: usize, text: String },
    Bullet(String),
    Instructions(String),
    Paragraph(Vec<Run>),
    AnswerLine,
    Blank,
}

fn is_all_caps(line: &str) -> bool {
    line.chars().any(char::is_uppercase) && !line.chars().any(char::is_lowercase)
}

fn is_section_heading(line: &str) -> bool {
    let len = line.chars().count();
    (is_all_caps(line) && len < 50) || (line.ends_with(':') && len < 100)
}

fn is_blank(lines: &[&str], i: usize) -> bool {
    lines.get(i).is_some_and(|l| l.trim().is_empty())
}

fn paragraph_runs(line: &str) -> Vec<Run> {
    let mut runs = Vec::new();
    let mut last = 0;
    for caps in BOLD_SPLIT_RE.captures_iter(line) {
        let (Some(whole), Some(inner)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        if whole.start() > last {
            runs.push(Run { text: line[last..whole.start()].to_string(), bold: false });
        }
        runs.push(Run { text: inner.as_str().to_string(), bold: true });
        last = whole.end();
    }
    if last < line.len() {
        runs.push(Run { text: line[last..].to_string(), bold: false });
    }
    runs
}

/// Header blocks every worksheet document opens with.
pub fn header_blocks(grade: u32, topics: &[String]) -> Vec<Block> {
    vec![
        Block::Title(DOCUMENT_TITLE.to_string()),
        Block::Subtitle(format!("Grade {} — Topic: {}", grade, topics.join(", "))),
        Block::NameDateLine,
        Block::Heading { level: 1, text: WORKSHEET_HEADING.to_string() },
    ]
}

/// Classifies worksheet lines into document blocks.
///
/// The "subject — topic" title line and the blank after it are skipped since the
/// header already carries grade and topics. Runs of "N." lines are renumbered from 1
/// per run, and two blank lines after a list item or paragraph become an answer line.
pub fn layout(lesson_text: &str, grade: u32, topics: &[String]) -> Vec<Block> {
    let mut blocks = header_blocks(grade, topics);
    let lines: Vec<&str> = lesson_text.split('\n').collect();

    let mut i = 0;
    if lines.first().is_some_and(|l| l.contains(" — ")) {
        i = 2;
    }

    while i < lines.len() {
        let line = lines[i].trim();

        if line.is_empty() {
            blocks.push(Block::Blank);
            i += 1;
            continue;
        }

        if is_section_heading(line) {
            blocks.push(Block::Heading { level: 2, text: line.to_string() });
            i += 1;
            continue;
        }

        if NUMBERED_RE.is_match(line) {
            let mut items = Vec::new();
            while let Some(caps) = lines.get(i).and_then(|l| NUMBERED_RE.captures(l.trim())) {
                items.push(caps[2].to_string());
                i += 1;
            }
            for (idx, item) in items.into_iter().enumerate() {
                blocks.push(Block::Numbered { number: idx + 1, text: item });
                if is_blank(&lines, i) {
                    i += 1;
                    if is_blank(&lines, i) {
                        blocks.push(Block::AnswerLine);
                        i += 1;
                    }
                }
            }
            continue;
        }

        if BULLET_RE.is_match(line) {
            while let Some(caps) = lines.get(i).and_then(|l| BULLET_RE.captures(l.trim())) {
                blocks.push(Block::Bullet(caps[1].to_string()));
                i += 1;
            }
            continue;
        }

        if let Some(rest) = line.strip_prefix(INSTRUCTIONS_PREFIX) {
            blocks.push(Block::Instructions(rest.trim().to_string()));
            i += 1;
            continue;
        }

        blocks.push(Block::Paragraph(paragraph_runs(line)));
        if is_blank(&lines, i + 1) {
            i += 1;
            if is_blank(&lines, i + 1) {
                blocks.push(Block::AnswerLine);
                i += 1;
            }
        }
        i += 1;
    }

    blocks
}

pub fn document_filename(grade: u32, topics: &[String]) -> String {
    format!("Lesson_Grade{}_{}.pdf", grade, topics.join("_").replace(' ', "_"))
}
