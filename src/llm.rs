use crate::consts::FALLBACK_REPLY;
use crate::error::AppError;
use crate::extractor::RESERVATION_MARKER;
use crate::gateways::ReplyGenerator;
use crate::openai_types::{OpenAIBatchResponse, OpenAIMessage, OpenAIPayload};
use crate::types::{BusinessContext, GeneratedReply, Role, Turn};

use async_trait::async_trait;
use std::fmt::Write;
use tracing::{debug, error, warn};

const COMPLETIONS_URL: &str = "https://api.openai.com/v1/chat/completions";

pub struct OpenAIReplyGenerator {
    http_client: reqwest::Client,
    api_key: String,
    model: String,
}

impl OpenAIReplyGenerator {
    pub fn new(http_client: reqwest::Client, api_key: &str, model: &str) -> Self {
        Self {
            http_client,
            api_key: api_key.to_string(),
            model: model.to_string(),
        }
    }

    async fn complete(&self, messages: Vec<OpenAIMessage>) -> Result<String, AppError> {
        let payload = OpenAIPayload {
            model: self.model.clone(),
            messages,
            max_tokens: Some(200),
            temperature: Some(0.4),
        };
        let key = self.api_key.as_str();
        let resp = self
            .http_client
            .post(COMPLETIONS_URL)
            .header(reqwest::header::AUTHORIZATION, format!("Bearer {key}"))
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                error!(error=%e, "failed to send request to OpenAI");
                failure(e.to_string())
            })?
            .error_for_status()
            .map_err(|e| {
                error!(error=%e, "OpenAI rejected completion request");
                failure(e.to_string())
            })?;
        let resp = resp.json::<OpenAIBatchResponse>().await.map_err(|e| {
            error!(error=%e, "failed to deserialize openai completion response");
            failure(e.to_string())
        })?;
        debug!(id=%resp.id, model=%resp.model, usage=?resp.usage, "openai completion");
        resp.choices
            .into_iter()
            .next()
            .map(|c| c.message.content.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or_else(|| failure("completion had no content".to_string()))
    }
}

fn failure(reason: String) -> AppError {
    AppError::GatewayFailure {
        gateway: "reply",
        reason,
    }
}

/// Instructions plus everything the assistant may tell the caller about the business.
pub fn system_prompt(context: &BusinessContext) -> String {
    let mut prompt = format!(
        "You are the friendly phone host of {}. Keep every answer to one or two short \
         spoken sentences; the caller hears you through a phone line.\n\
         Opening hours: {}.\n",
        context.name, context.hours
    );
    if !context.menu.is_empty() {
        prompt.push_str("Menu:\n");
        for item in &context.menu {
            let _ = writeln!(
                prompt,
                "- {} ({}.{:02}): {}",
                item.name,
                item.price_cents / 100,
                item.price_cents % 100,
                item.description
            );
        }
    }
    if !context.tables.is_empty() {
        let seats: i32 = context.tables.iter().map(|t| t.seats).sum();
        let _ = writeln!(
            prompt,
            "Dining room: {} tables, {} seats in total.",
            context.tables.len(),
            seats
        );
    }
    if context.available_slots.is_empty() {
        prompt.push_str("Availability for today is unknown; offer to take the booking anyway.\n");
    } else {
        let _ = writeln!(
            prompt,
            "Free reservation times today: {}.",
            context.available_slots.join(", ")
        );
    }
    let _ = write!(
        prompt,
        "To book a table you need the caller's name, party size, date and time. Once the \
         caller confirms all of them, confirm the booking out loud and append the exact \
         token {RESERVATION_MARKER} at the end of that reply. Never use the token otherwise. \
         When the caller has nothing else, end with a short closing such as \"Goodbye\"."
    );
    prompt
}

pub fn conversation(history: &[Turn], context: &BusinessContext) -> Vec<OpenAIMessage> {
    let mut messages = vec![OpenAIMessage {
        role: "system".to_string(),
        content: system_prompt(context),
    }];
    messages.extend(history.iter().map(|turn| OpenAIMessage {
        role: match turn.role {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
        .to_string(),
        content: turn.content.clone(),
    }));
    messages
}

#[async_trait]
impl ReplyGenerator for OpenAIReplyGenerator {
    async fn generate_reply(&self, history: &[Turn], context: &BusinessContext) -> GeneratedReply {
        match self.complete(conversation(history, context)).await {
            Ok(text) => {
                let raw_action_marker = text
                    .contains(RESERVATION_MARKER)
                    .then(|| RESERVATION_MARKER.to_string());
                GeneratedReply {
                    text,
                    raw_action_marker,
                }
            }
            Err(e) => {
                warn!(error=%e, "falling back to apology reply");
                GeneratedReply {
                    text: FALLBACK_REPLY.to_string(),
                    raw_action_marker: None,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DiningTable, MenuItem};

    #[test]
    fn prompt_lists_business_details() {
        let context = BusinessContext {
            name: "La Tasca".to_string(),
            hours: "13:00-23:30".to_string(),
            menu: vec![MenuItem {
                name: "Paella".to_string(),
                description: "saffron rice".to_string(),
                price_cents: 1850,
            }],
            tables: vec![
                DiningTable {
                    label: "T1".to_string(),
                    seats: 4,
                },
                DiningTable {
                    label: "T2".to_string(),
                    seats: 2,
                },
            ],
            available_slots: vec!["20:00".to_string(), "21:00".to_string()],
        };
        let prompt = system_prompt(&context);
        assert!(prompt.contains("La Tasca"));
        assert!(prompt.contains("13:00-23:30"));
        assert!(prompt.contains("- Paella (18.50): saffron rice"));
        assert!(prompt.contains("2 tables, 6 seats"));
        assert!(prompt.contains("20:00, 21:00"));
        assert!(prompt.contains(RESERVATION_MARKER));
    }

    #[test]
    fn degraded_context_still_yields_prompt() {
        let prompt = system_prompt(&BusinessContext::default());
        assert!(prompt.contains("our restaurant"));
        assert!(prompt.contains("Availability for today is unknown"));
        assert!(!prompt.contains("Menu:"));
    }

    #[test]
    fn history_maps_to_chat_roles() {
        let history = vec![
            Turn::assistant("Hi, how can I help?", None),
            Turn::user("A table for two"),
        ];
        let messages = conversation(&history, &BusinessContext::default());
        let roles: Vec<&str> = messages.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, vec!["system", "assistant", "user"]);
        assert_eq!(messages[2].content, "A table for two");
    }
}
