//! Transcript noise scrubbing.
//!
//! Live sessions carry tool chatter, system reminders, and continuation
//! directives that would poison retrieval. The scrub set below is applied
//! to every message before it is admitted to the pipeline; messages that
//! shrink below [`MIN_MESSAGE_CHARS`] afterwards are dropped by the caller.

use regex::Regex;
use std::sync::OnceLock;

/// Messages shorter than this after scrubbing carry no signal.
pub const MIN_MESSAGE_CHARS: usize = 3;

const NOISE_PATTERNS: &[&str] = &[
    r"(?s)\[search-mode\].*?---\s*\n",
    r"(?s)\[analyze-mode\].*?---\s*\n",
    r"(?s)\[SYSTEM DIRECTIVE[^\]]*\].*?(?:\[Status:[^\]]*\])",
    r"(?s)# Continuation Prompt.*",
    r"\(sisyphus\)\s*",
    r"\(prometheus\)\s*",
    r"\(oracle\)\s*",
    r"(?s)\[BACKGROUND TASK COMPLETED\].*?\n",
    r"(?s)\[ALL BACKGROUND TASKS COMPLETE\].*?(?:\n\n|\z)",
    r"(?s)\[Agent Usage Reminder\].*?(?:\n\n|\z)",
    r"(?s)\[Category\+Skill Reminder\].*?(?:\n\n|\z)",
    r"(?s)\[SYSTEM REMINDER[^\]]*\].*?(?:\n\n|\z)",
    r"(?s)<system-reminder>.*?</system-reminder>",
];

fn noise_patterns() -> &'static Vec<Regex> {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        NOISE_PATTERNS
            .iter()
            .map(|p| Regex::new(p).expect("valid noise pattern"))
            .collect()
    })
}

/// Apply every scrub in order and trim the result.
pub fn strip_noise(text: &str) -> String {
    let mut text = text.to_string();
    for pattern in noise_patterns() {
        text = pattern.replace_all(&text, "").into_owned();
    }
    text.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_passes_through_trimmed() {
        assert_eq!(strip_noise("  hello world \n"), "hello world");
    }

    #[test]
    fn system_reminders_are_removed() {
        let text = "before <system-reminder>internal note</system-reminder> after";
        assert_eq!(strip_noise(text), "before  after");
    }

    #[test]
    fn continuation_prompt_truncates_the_rest() {
        let text = "real content\n# Continuation Prompt\neverything after is dropped";
        assert_eq!(strip_noise(text), "real content");
    }

    #[test]
    fn agent_markers_are_removed() {
        assert_eq!(strip_noise("(sisyphus) did the work"), "did the work");
    }

    #[test]
    fn reminder_blocks_are_removed() {
        let text = "[Agent Usage Reminder] use fewer agents\n\nkept tail";
        assert_eq!(strip_noise(text), "kept tail");
    }
}
