use inquire::Confirm;

use crate::common::{UpdError, UpdErrorKind};

/// Asks the operator yes/no questions. Blocks until an answer is given, an
/// interrupted or unreadable prompt is an error, never an answer.
pub trait Prompter {
    fn confirm(&self, question: &str, default: bool) -> Result<bool, UpdError>;
}

/// Prompts on the controlling terminal.
pub struct TermPrompter;

impl TermPrompter {
    pub fn new() -> TermPrompter {
        TermPrompter
    }
}

impl Default for TermPrompter {
    fn default() -> Self {
        TermPrompter::new()
    }
}

impl Prompter for TermPrompter {
    fn confirm(&self, question: &str, default: bool) -> Result<bool, UpdError> {
        Confirm::new(question)
            .with_default(default)
            .prompt()
            .map_err(|why| {
                UpdError::from_remark(
                    UpdErrorKind::Interrupted,
                    &format!("no answer to '{}': {}", question, why),
                )
            })
    }
}


#[cfg(test)]
mod tests {
    use super::mock::ScriptedPrompter;
    use super::*;

    #[test]
    fn scripted_answers_fall_back_to_default() {
        let prompter = ScriptedPrompter::new(&[("Reboot", true)]);
        assert!(!prompter.confirm("Remove these 2 large file(s)?", false).unwrap());
        assert!(prompter.confirm("Reboot now?", false).unwrap());
        // each scripted answer is used once
        assert!(!prompter.confirm("Reboot now?", false).unwrap());
        assert!(prompter.was_asked("large file"));
    }

    #[test]
    fn interrupted_prompt_is_not_an_answer() {
        let prompter = ScriptedPrompter::new(&[]).fail_on("Continue");
        let err = prompter
            .confirm("Continue with the update?", true)
            .unwrap_err();
        assert_eq!(err.kind(), UpdErrorKind::Interrupted);
    }
}
