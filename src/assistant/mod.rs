//! The chat assistant: guideline text plus mailbox context wrapped around a
//! completion client.

pub mod client;
pub mod guideline;
pub mod prompt;
pub mod routes;

use std::sync::Arc;

use crate::error::AssistantError;
use crate::mail::MailService;

pub use client::{ChatClient, ChatMessage, ChatRole, OpenRouterClient};
pub use guideline::{DEFAULT_GUIDELINE, GuidelineStore};
pub use routes::{AssistantState, assistant_routes};

/// Prepares each conversation turn and forwards it to the completion client.
pub struct ChatGateway {
    client: Arc<dyn ChatClient>,
    guidelines: Arc<GuidelineStore>,
    mail: Arc<MailService>,
}

impl ChatGateway {
    pub fn new(
        client: Arc<dyn ChatClient>,
        guidelines: Arc<GuidelineStore>,
        mail: Arc<MailService>,
    ) -> Self {
        Self {
            client,
            guidelines,
            mail,
        }
    }

    /// One chat turn.
    ///
    /// Context emails are resolved from the mailbox only for authenticated
    /// callers; anonymous turns reach the model without mailbox context.
    pub async fn respond(
        &self,
        turns: &[ChatMessage],
        context_ids: &[String],
        authenticated: bool,
    ) -> Result<String, AssistantError> {
        let context: Vec<_> = if authenticated && !context_ids.is_empty() {
            self.mail
                .fetch_messages(None, None)
                .await
                .into_iter()
                .filter(|e| context_ids.contains(&e.id))
                .collect()
        } else {
            Vec::new()
        };

        tracing::debug!(
            turns = turns.len(),
            context = context.len(),
            "assistant turn"
        );

        let guideline = self.guidelines.current().await;
        let mut messages = Vec::with_capacity(turns.len() + 1);
        messages.push(ChatMessage::system(prompt::build_system_prompt(
            &guideline, &context,
        )));
        messages.extend_from_slice(turns);

        self.client.complete(&messages).await
    }
}
