//! Contract between the chat layer's message interpreter and the booking
//! engine.
//!
//! Natural-language understanding is opaque here: an interpreter turns text
//! plus history into a reply and, optionally, a structured booking intent.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::chat::ChatMessage;
use crate::types::{DbId, SlotTime};

/// Appointment details extracted from a chat message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingIntent {
    pub date: Option<NaiveDate>,
    pub time: Option<SlotTime>,
    pub product_id: Option<DbId>,
    pub branch_id: Option<DbId>,
    pub notes: Option<String>,
}

impl BookingIntent {
    /// An intent can be acted on once it names a date, a time and a service.
    pub fn is_actionable(&self) -> bool {
        self.date.is_some() && self.time.is_some() && self.product_id.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interpretation {
    pub reply_text: String,
    pub booking_intent: Option<BookingIntent>,
}

#[async_trait]
pub trait MessageInterpreter: Send + Sync {
    async fn interpret(&self, text: &str, history: &[ChatMessage]) -> Interpretation;
}

/// A keyword set mapped to a canned response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordMapping {
    pub keywords: Vec<String>,
    pub response: String,
}

/// Default interpreter: first mapping with a keyword contained in the text
/// (case-insensitive) wins, otherwise the fallback reply. Never produces a
/// booking intent.
#[derive(Debug, Clone)]
pub struct KeywordInterpreter {
    mappings: Vec<KeywordMapping>,
    fallback: String,
}

impl KeywordInterpreter {
    pub fn new(mappings: Vec<KeywordMapping>, fallback: impl Into<String>) -> Self {
        Self {
            mappings,
            fallback: fallback.into(),
        }
    }

    fn reply_for(&self, text: &str) -> &str {
        let lowered = text.to_lowercase();
        self.mappings
            .iter()
            .find(|m| {
                m.keywords
                    .iter()
                    .any(|k| !k.trim().is_empty() && lowered.contains(&k.to_lowercase()))
            })
            .map(|m| m.response.as_str())
            .unwrap_or(&self.fallback)
    }
}

impl Default for KeywordInterpreter {
    fn default() -> Self {
        Self::new(
            Vec::new(),
            "I am your assistant. Ask about our services or book an appointment.",
        )
    }
}

#[async_trait]
impl MessageInterpreter for KeywordInterpreter {
    async fn interpret(&self, text: &str, _history: &[ChatMessage]) -> Interpretation {
        Interpretation {
            reply_text: self.reply_for(text).to_string(),
            booking_intent: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interpreter() -> KeywordInterpreter {
        KeywordInterpreter::new(
            vec![
                KeywordMapping {
                    keywords: vec!["price".into(), "cost".into()],
                    response: "Our prices start at 20.".into(),
                },
                KeywordMapping {
                    keywords: vec!["hours".into()],
                    response: "We are open 09:00 to 17:00.".into(),
                },
            ],
            "fallback",
        )
    }

    #[tokio::test]
    async fn keyword_match_is_case_insensitive() {
        let out = interpreter().interpret("What does it COST?", &[]).await;
        assert_eq!(out.reply_text, "Our prices start at 20.");
        assert!(out.booking_intent.is_none());
    }

    #[tokio::test]
    async fn falls_back_when_nothing_matches() {
        let out = interpreter().interpret("hello", &[]).await;
        assert_eq!(out.reply_text, "fallback");
    }

    #[test]
    fn intent_needs_date_time_and_product() {
        let mut intent = BookingIntent {
            date: Some("2024-07-15".parse().unwrap()),
            time: Some("09:00".parse().unwrap()),
            ..BookingIntent::default()
        };
        assert!(!intent.is_actionable());
        intent.product_id = Some(1);
        assert!(intent.is_actionable());
    }
}
