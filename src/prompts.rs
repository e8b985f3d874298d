use crate::types::worksheet_data::ExpectedCounts;

/// How many existing items the synthesis prompt shows as style context.
pub const SYNTHESIS_CONTEXT_ITEMS: usize = 3;

pub const CONSTRAINT_STEER: &str = "Your last output violated constraints. Strictly follow: no pictures; keep strictly on-topic:";

pub fn build_grammar_lesson_prompt(rule_title: &str, grade: u32, counts: &ExpectedCounts) -> String {
    format!(
        "You are an expert elementary ELA teacher. Create a reproducible worksheet for Grade {grade} students based on the following grammar rule: \"{rule_title}\".\n\n\
The worksheet should follow this structure (do NOT copy any real content, generate everything originally):\n\n\
1. **Rule Heading**\n\
   - Begin with a bold rule title (e.g., 'Rule 1: Kinds of Sentences')\n\n\
2. **Rule Explanation**\n\
   - Write a short, student-friendly explanation of the rule.\n\
   - Include 3-5 clearly formatted examples of the rule in action.\n\
   - Use bold to highlight key grammar terms (e.g., **declarative**, **interrogative**).\n\n\
3. **Activity Section A**\n\
   - Exactly {a} numbered items where students must apply the rule (e.g., punctuate, identify sentence type).\n\
   - Include simple instructions at the top.\n\n\
4. **Activity Section B**\n\
   - Exactly {b} numbered items where students write their own sentences that follow the rule.\n\n\
5. **Activity Section C**\n\
   - Exactly {c} numbered items that rewrite or correct sentences.\n\n\
6. **Activity Section D**\n\
   - Exactly {d} numbered items of higher-order thinking: explain, match, or find the mistake.\n\n\
Number every item '1.', '2.', ... within its section. Do not ask students to draw or look at pictures. \
Make the worksheet engaging, clear, and appropriate for Grade {grade}. Generate all content originally.",
        grade = grade,
        rule_title = rule_title,
        a = counts.section_a_questions,
        b = counts.section_b_questions,
        c = counts.section_c_questions,
        d = counts.section_d_questions,
    )
}

pub fn build_multi_rule_grammar_lesson_prompt(rule_titles: &[String], grade: u32, counts: &ExpectedCounts) -> String {
    let mut prompt = format!(
        "You are an expert elementary ELA teacher. Create a comprehensive, multi-part lesson for Grade {grade} students covering the following grammar rules. \
For each rule, generate a separate lesson section using the structure below. Do NOT copy any real content; generate everything originally.\n\n\
For each rule, include:\n\
1. A clear, student-friendly explanation of the rule, with at least 2 correct and 2 incorrect examples, each explained.\n\
2. Activity Section A: Identification. Exactly {a} numbered sentences; at least one should not fit the rule.\n\
3. Activity Section B: Application. Exactly {b} numbered items mixing fill-in-the-blank, rewrite, and error correction.\n\
4. Activity Section C: Production. Exactly {c} numbered creative writing prompts using the rule.\n\
5. Activity Section D: Higher-order thinking. Exactly {d} numbered items mixing explain, match, and 'find the mistake'.\n\
For every activity, provide explicit, student-friendly instructions. All content must be original, age-appropriate, and varied.\n\n",
        grade = grade,
        a = counts.section_a_questions,
        b = counts.section_b_questions,
        c = counts.section_c_questions,
        d = counts.section_d_questions,
    );

    let sections: Vec<String> = rule_titles
        .iter()
        .enumerate()
        .map(|(idx, rule)| {
            format!(
                "## Rule {}: {}\n\
**Rule Explanation**\n\
**Activity Section A**\n\
**Activity Section B**\n\
**Activity Section C**\n\
**Activity Section D**\n",
                idx + 1,
                rule
            )
        })
        .collect();
    prompt.push_str(&sections.join("\n"));
    prompt
}

/// Appends the stronger steer used for the one-shot regeneration after content warnings.
pub fn build_constrained_retry_prompt(prompt: &str, topic: &str) -> String {
    format!("{}\n\n{} {}.", prompt, CONSTRAINT_STEER, topic)
}

pub fn build_targeted_activity_prompt(topic: &str, activity_num: u32, expected_count: u32) -> String {
    format!(
        "Regenerate ONLY Activity {activity} for topic \"{topic}\", exactly {count} items, each on its own line starting '1.' to '{count}.' No extra text.\n\n\
Example format:\n\
1. [First item]\n\
2. [Second item]\n\
3. [Third item]\n\
...\n\
{count}. [Last item]\n\n\
Topic: {topic}\n\
Activity {activity}:",
        activity = activity_num,
        topic = topic,
        count = expected_count,
    )
}

pub fn build_synthesis_prompt(
    topic: &str,
    activity_num: u32,
    existing_items: &[String],
    current_count: usize,
    expected_count: u32,
) -> String {
    let missing = expected_count as usize - current_count.min(expected_count as usize);
    let context: Vec<&str> = existing_items
        .iter()
        .take(SYNTHESIS_CONTEXT_ITEMS)
        .map(String::as_str)
        .collect();
    format!(
        "Generate exactly {missing} more numbered items for Activity {activity} about \"{topic}\".\n\
Each item should be on its own line starting with the next number ({next}.) through ({expected}.).\n\
Make them relevant to the topic and consistent with the existing items.\n\n\
Existing items:\n\
{context}\n\n\
Generate {missing} more items:",
        missing = missing,
        activity = activity_num,
        topic = topic,
        next = current_count + 1,
        expected = expected_count,
        context = context.join("\n"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_rule_prompt_states_each_count() {
        let counts = ExpectedCounts {
            section_a_questions: 4,
            section_b_questions: 5,
            section_c_questions: 6,
            section_d_questions: 7,
        };
        let prompt = build_grammar_lesson_prompt("Commas in a Series", 3, &counts);
        assert!(prompt.contains("Grade 3 students"));
        assert!(prompt.contains("\"Commas in a Series\""));
        for n in 4..=7 {
            assert!(prompt.contains(&format!("Exactly {} numbered", n)));
        }
    }

    #[test]
    fn multi_rule_prompt_numbers_each_rule() {
        let topics = vec!["Nouns".to_string(), "Verbs".to_string()];
        let prompt = build_multi_rule_grammar_lesson_prompt(&topics, 4, &ExpectedCounts::default());
        assert!(prompt.contains("## Rule 1: Nouns"));
        assert!(prompt.contains("## Rule 2: Verbs"));
    }

    #[test]
    fn targeted_prompt_bounds_the_numbering() {
        let prompt = build_targeted_activity_prompt("Adverbs", 2, 8);
        assert!(prompt.starts_with("Regenerate ONLY Activity 2 for topic \"Adverbs\", exactly 8 items"));
        assert!(prompt.contains("'1.' to '8.'"));
        assert!(prompt.ends_with("Activity 2:"));
    }

    #[test]
    fn synthesis_prompt_shows_at_most_three_items() {
        let existing: Vec<String> = (1..=5).map(|n| format!("{}. item {}", n, n)).collect();
        let prompt = build_synthesis_prompt("Adverbs", 1, &existing, 5, 8);
        assert!(prompt.starts_with("Generate exactly 3 more numbered items for Activity 1"));
        assert!(prompt.contains("(6.) through (8.)"));
        assert!(prompt.contains("3. item 3"));
        assert!(!prompt.contains("4. item 4"));
    }
}
