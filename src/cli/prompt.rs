//! Terminal permission prompt.

use async_trait::async_trait;
use dialoguer::Select;
use ferrocode_core::tools::{PermissionPrompt, PromptDecision};
use tracing::warn;

pub struct TerminalPrompt;

#[async_trait]
impl PermissionPrompt for TerminalPrompt {
    async fn confirm(&self, tool: &str, target: &str) -> PromptDecision {
        let question = format!("Allow {tool} on '{target}'?");
        // dialoguer blocks on the terminal.
        let choice = tokio::task::spawn_blocking(move || {
            Select::new()
                .with_prompt(question)
                .items(&["deny", "allow once", "allow for this session"])
                .default(1)
                .interact()
        })
        .await;

        match choice {
            Ok(Ok(0)) => PromptDecision::Deny,
            Ok(Ok(1)) => PromptDecision::AllowOnce,
            Ok(Ok(2)) => PromptDecision::AllowAlways,
            Ok(Ok(_)) => PromptDecision::Deny,
            Ok(Err(err)) => {
                warn!("permission prompt failed, denying: {err}");
                PromptDecision::Deny
            }
            Err(err) => {
                warn!("permission prompt task failed, denying: {err}");
                PromptDecision::Deny
            }
        }
    }
}
