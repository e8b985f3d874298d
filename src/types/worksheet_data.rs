use serde::{Deserialize, Serialize};

/// Activities the validator and repair engine always consider, whatever the parser found.
pub const ACTIVITY_ORDINALS: [u32; 4] = [1, 2, 3, 4];

pub const DEFAULT_QUESTIONS_PER_SECTION: u32 = 6;
pub const MIN_QUESTIONS_PER_SECTION: u32 = 1;
pub const MAX_QUESTIONS_PER_SECTION: u32 = 20;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum Section {
    Explanation(String),
    Activity { ordinal: u32, text: String },
}

impl Section {
    pub fn text(&self) -> &str {
        match self {
            Section::Explanation(text) => text,
            Section::Activity { text, .. } => text,
        }
    }
}

/// A worksheet split at its "Activity N" headers. The explanation always comes first;
/// activities follow in the order their headers were first seen.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedSections {
    sections: Vec<Section>,
}

impl ParsedSections {
    pub fn new(explanation: impl Into<String>) -> Self {
        Self { sections: vec![Section::Explanation(explanation.into())] }
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn explanation(&self) -> &str {
        self.sections
            .iter()
            .find_map(|s| match s {
                Section::Explanation(text) => Some(text.as_str()),
                _ => None,
            })
            .unwrap_or("")
    }

    pub fn activity(&self, ordinal: u32) -> Option<&str> {
        self.sections.iter().find_map(|s| match s {
            Section::Activity { ordinal: o, text } if *o == ordinal => Some(text.as_str()),
            _ => None,
        })
    }

    pub fn activity_count(&self) -> usize {
        self.sections.iter().filter(|s| matches!(s, Section::Activity { .. })).count()
    }

    /// Returns a copy with the activity's content replaced, or appended when the ordinal is new.
    pub fn with_activity(&self, ordinal: u32, text: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.put_activity(ordinal, text.into());
        next
    }

    pub(crate) fn set_explanation(&mut self, text: String) {
        match self.sections.iter_mut().find(|s| matches!(s, Section::Explanation(_))) {
            Some(slot) => *slot = Section::Explanation(text),
            None => self.sections.insert(0, Section::Explanation(text)),
        }
    }

    pub(crate) fn put_activity(&mut self, ordinal: u32, text: String) {
        let existing = self
            .sections
            .iter_mut()
            .find(|s| matches!(s, Section::Activity { ordinal: o, .. } if *o == ordinal));
        match existing {
            Some(slot) => *slot = Section::Activity { ordinal, text },
            None => self.sections.push(Section::Activity { ordinal, text }),
        }
    }
}

/// Number of numbered items each activity must hold. Fields map A→1, B→2, C→3, D→4.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct ExpectedCounts {
    pub section_a_questions: u32,
    pub section_b_questions: u32,
    pub section_c_questions: u32,
    pub section_d_questions: u32,
}

impl Default for ExpectedCounts {
    fn default() -> Self {
        Self::uniform(DEFAULT_QUESTIONS_PER_SECTION)
    }
}

impl ExpectedCounts {
    pub fn uniform(count: u32) -> Self {
        Self {
            section_a_questions: count,
            section_b_questions: count,
            section_c_questions: count,
            section_d_questions: count,
        }
    }

    pub fn for_activity(&self, ordinal: u32) -> u32 {
        match ordinal {
            1 => self.section_a_questions,
            2 => self.section_b_questions,
            3 => self.section_c_questions,
            4 => self.section_d_questions,
            _ => DEFAULT_QUESTIONS_PER_SECTION,
        }
    }

    pub fn total(&self) -> u32 {
        ACTIVITY_ORDINALS.iter().map(|&n| self.for_activity(n)).sum()
    }

    pub fn is_within_bounds(&self) -> bool {
        ACTIVITY_ORDINALS.iter().all(|&n| {
            (MIN_QUESTIONS_PER_SECTION..=MAX_QUESTIONS_PER_SECTION).contains(&self.for_activity(n))
        })
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivityCheck {
    pub ordinal: u32,
    pub actual: usize,
    pub expected: u32,
    pub matches: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationSummary {
    pub ok: bool,
    pub total_activities: usize,
    pub matching_activities: usize,
    pub total_expected: u32,
    pub total_actual: usize,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    pub activities: Vec<ActivityCheck>,
    pub summary: ValidationSummary,
}

impl ValidationResult {
    pub fn ok(&self) -> bool {
        self.summary.ok
    }

    pub fn activity(&self, ordinal: u32) -> Option<&ActivityCheck> {
        self.activities.iter().find(|a| a.ordinal == ordinal)
    }

    pub fn mismatched(&self) -> impl Iterator<Item = &ActivityCheck> {
        self.activities.iter().filter(|a| !a.matches)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairMethod {
    Regenerated,
    Synthesized,
    Unchanged,
}

/// What a repair of one activity produced. `succeeded` is false whenever the activity
/// may still be short of its expected count.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct RepairOutcome {
    pub ordinal: u32,
    pub text: String,
    pub succeeded: bool,
    pub attempts_used: u32,
    pub method: RepairMethod,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct LessonRecord {
    pub id: i64,
    pub topics: Vec<String>,
    pub grade: u32,
    pub age: Option<u32>,
    pub date_generated: String,
    pub lesson_text: String,
    pub tags: Option<Vec<String>>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct LessonSummary {
    pub id: i64,
    pub topics: Vec<String>,
    pub grade: u32,
    pub age: Option<u32>,
    pub date_generated: String,
}

impl From<&LessonRecord> for LessonSummary {
    fn from(record: &LessonRecord) -> Self {
        Self {
            id: record.id,
            topics: record.topics.clone(),
            grade: record.grade,
            age: record.age,
            date_generated: record.date_generated.clone(),
        }
    }
}
