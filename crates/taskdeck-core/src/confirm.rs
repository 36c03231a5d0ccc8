use dialoguer::Confirm as Prompt;
use tracing::warn;

pub const DELETE_PROMPT: &str = "Are you sure you want to delete this task?";

/// Yes/no gate consulted before a destructive change.
pub trait Confirm {
    fn confirm(&self, prompt: &str) -> bool;
}

/// Asks on the terminal; anything but an explicit yes is a no.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalConfirm;

impl Confirm for TerminalConfirm {
    fn confirm(&self, prompt: &str) -> bool {
        match Prompt::new().with_prompt(prompt).default(false).interact() {
            Ok(answer) => answer,
            Err(err) => {
                warn!(error = %err, "confirmation prompt failed; treating as no");
                false
            }
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct AssumeYes;

impl Confirm for AssumeYes {
    fn confirm(&self, _prompt: &str) -> bool {
        true
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct AssumeNo;

impl Confirm for AssumeNo {
    fn confirm(&self, _prompt: &str) -> bool {
        false
    }
}
