use tracing::{error, info, warn};

use crate::llm::LanguageModel;
use crate::parsing::sections::{count_numbered_items, numbered_lines, parse_lesson_sections, reassemble};
use crate::prompts::{build_synthesis_prompt, build_targeted_activity_prompt};
use crate::types::worksheet_data::{RepairMethod, RepairOutcome};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 2;

/// Brings one activity to its expected item count by asking the model again.
///
/// Each attempt asks for a full regeneration of the activity. When no attempt returns
/// exactly the expected number of items, one narrower request asks only for the missing
/// tail items, which are appended to what the activity already has. Model failures are
/// logged and never returned; the worst case hands back the worksheet untouched.
pub struct ActivityRepairer<M: LanguageModel> {
    model: M,
    max_attempts: u32,
}

impl<M: LanguageModel> ActivityRepairer<M> {
    pub fn new(model: M) -> Self {
        Self { model, max_attempts: DEFAULT_MAX_ATTEMPTS }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn model_mut(&mut self) -> &mut M {
        &mut self.model
    }

    pub fn into_model(self) -> M {
        self.model
    }

    pub fn repair(
        &mut self,
        lesson_text: &str,
        topic: &str,
        activity_num: u32,
        expected_count: u32,
    ) -> RepairOutcome {
        info!("Attempting to fix Activity {} (expected: {} items)", activity_num, expected_count);

        let mut calls = 0;
        for attempt in 1..=self.max_attempts {
            let prompt = build_targeted_activity_prompt(topic, activity_num, expected_count);
            calls += 1;
            let response = match self.model.generate(&prompt) {
                Ok(response) => response,
                Err(e) => {
                    error!("Error fixing Activity {} attempt {}: {}", activity_num, attempt, e);
                    continue;
                }
            };

            let items = numbered_lines(&response);
            if items.len() == expected_count as usize {
                let sections = parse_lesson_sections(lesson_text).with_activity(activity_num, items.join("\n"));
                info!("Successfully fixed Activity {} on attempt {}", activity_num, attempt);
                return RepairOutcome {
                    ordinal: activity_num,
                    text: reassemble(&sections),
                    succeeded: true,
                    attempts_used: calls,
                    method: RepairMethod::Regenerated,
                };
            }
            warn!(
                "Activity {} attempt {}: got {} items, expected {}",
                activity_num,
                attempt,
                items.len(),
                expected_count
            );
        }

        warn!("All attempts failed for Activity {}, synthesizing items", activity_num);
        self.synthesize_missing_items(lesson_text, topic, activity_num, expected_count, calls)
    }

    fn synthesize_missing_items(
        &mut self,
        lesson_text: &str,
        topic: &str,
        activity_num: u32,
        expected_count: u32,
        calls_so_far: u32,
    ) -> RepairOutcome {
        let unchanged = |succeeded: bool, calls: u32| RepairOutcome {
            ordinal: activity_num,
            text: lesson_text.to_string(),
            succeeded,
            attempts_used: calls,
            method: RepairMethod::Unchanged,
        };

        let sections = parse_lesson_sections(lesson_text);
        let current_content = sections.activity(activity_num).unwrap_or("");
        let current_count = count_numbered_items(current_content);
        if current_count >= expected_count as usize {
            let exact = current_count == expected_count as usize;
            if !exact {
                warn!(
                    "Activity {} has {} items, more than the {} expected; leaving it as is",
                    activity_num, current_count, expected_count
                );
            }
            return unchanged(exact, calls_so_far);
        }

        let existing_items: Vec<String> = numbered_lines(current_content)
            .into_iter()
            .map(|line| line.trim().to_string())
            .collect();
        let missing_count = expected_count as usize - current_count;
        let prompt = build_synthesis_prompt(topic, activity_num, &existing_items, current_count, expected_count);

        let calls = calls_so_far + 1;
        let response = match self.model.generate(&prompt) {
            Ok(response) => response,
            Err(e) => {
                error!("Error synthesizing items for Activity {}: {}", activity_num, e);
                return unchanged(false, calls);
            }
        };

        let additional_items: Vec<String> = numbered_lines(&response)
            .into_iter()
            .take(missing_count)
            .map(|line| line.trim().to_string())
            .collect();
        if additional_items.is_empty() {
            warn!("Synthesis for Activity {} returned no numbered items", activity_num);
            return unchanged(false, calls);
        }

        let added = additional_items.len();
        let all_items = [existing_items, additional_items].concat();
        let succeeded = all_items.len() == expected_count as usize;
        let updated = sections.with_activity(activity_num, all_items.join("\n"));

        info!("Synthesized {} items for Activity {}", added, activity_num);
        if !succeeded {
            warn!(
                "Activity {} still short after synthesis: {} of {} items",
                activity_num,
                all_items.len(),
                expected_count
            );
        }
        RepairOutcome {
            ordinal: activity_num,
            text: reassemble(&updated),
            succeeded,
            attempts_used: calls,
            method: RepairMethod::Synthesized,
        }
    }
}
