// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Prompt construction for card readings
//!
//! [`construct_prompts`] is a pure function: the same reading always yields
//! byte-identical prompts, so a persisted reading can be replayed into the
//! same conversation seed later.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::{ArcanaError, Result};

/// Label used for a card drawn upright
pub const UPRIGHT_LABEL: &str = "upright";

/// Label used for a card drawn reversed
pub const REVERSED_LABEL: &str = "reversed";

const SYSTEM_PROMPT: &str = "\
You are a seasoned tarot reader with a deep grounding in symbolism, mythology and depth psychology. \
Your tone is calm, warm and candid; you illuminate possibilities rather than pronounce fate.

Interpretive principles:
- Read every card in the context of its position in the spread; the position frames the meaning.
- A reversed card expresses its energy as blocked, internalised or delayed, not simply as its opposite.
- Look for the story the cards tell together: recurring suits, major arcana, tension and resolution.
- Stay anchored to the querent's question and avoid generic statements that could fit any reading.
- Do not make medical, legal or financial determinations; point to practical reflection instead.

Structure your answer in Markdown with these sections:
1. **Overview** - the core message of the spread in two or three sentences.
2. **Card by card** - one short subsection per position, naming the card and its orientation.
3. **Synthesis** - how the cards interact and what they suggest about the question.
4. **Guidance** - two to four concrete, actionable suggestions.";

/// A card placed in a spread position
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawnItem {
    /// Name of the spread position (e.g. "Past")
    pub position_label: String,
    /// Name of the card drawn into the position
    pub item_name: String,
    /// Whether the card came up reversed
    #[serde(default)]
    pub reversed: bool,
}

impl DrawnItem {
    /// Create a drawn card
    pub fn new(
        position_label: impl Into<String>,
        item_name: impl Into<String>,
        reversed: bool,
    ) -> Self {
        Self {
            position_label: position_label.into(),
            item_name: item_name.into(),
            reversed,
        }
    }

    /// Create an upright card
    pub fn upright(position_label: impl Into<String>, item_name: impl Into<String>) -> Self {
        Self::new(position_label, item_name, false)
    }

    /// Create a reversed card
    pub fn reversed(position_label: impl Into<String>, item_name: impl Into<String>) -> Self {
        Self::new(position_label, item_name, true)
    }

    /// Human-readable orientation
    pub fn orientation_label(&self) -> &'static str {
        if self.reversed {
            REVERSED_LABEL
        } else {
            UPRIGHT_LABEL
        }
    }
}

/// Split a trailing `:reversed` / `:upright` marker off a card name.
pub(crate) fn split_orientation(raw: &str) -> Result<(&str, bool)> {
    match raw.rsplit_once(':') {
        Some((name, marker)) => {
            let reversed = match marker.trim().to_ascii_lowercase().as_str() {
                "r" | "rev" | "reversed" => true,
                "u" | "up" | "upright" => false,
                other => {
                    return Err(ArcanaError::InvalidInput(format!(
                        "unknown orientation '{}' (expected 'upright' or 'reversed')",
                        other
                    )))
                }
            };
            Ok((name.trim(), reversed))
        }
        None => Ok((raw.trim(), false)),
    }
}

/// Parses `POSITION=CARD[:reversed]`
impl FromStr for DrawnItem {
    type Err = ArcanaError;

    fn from_str(s: &str) -> Result<Self> {
        let (position, card) = s.split_once('=').ok_or_else(|| {
            ArcanaError::InvalidInput(format!(
                "card '{}' must look like POSITION=CARD[:reversed]",
                s
            ))
        })?;
        let position = position.trim();
        let (name, reversed) = split_orientation(card)?;

        if position.is_empty() || name.is_empty() {
            return Err(ArcanaError::InvalidInput(format!(
                "card '{}' needs both a position and a card name",
                s
            )));
        }

        Ok(Self::new(position, name, reversed))
    }
}

/// Everything needed to start a reading
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadingRequest {
    /// The querent's question (may be empty for a general reading)
    pub question: String,
    /// Display name of the spread
    pub spread_name: String,
    /// Stable identifier of the spread
    pub spread_id: String,
    /// Cards in draw order
    pub items: Vec<DrawnItem>,
    /// Model to use instead of the configured one
    pub override_model: Option<String>,
}

impl ReadingRequest {
    /// Create a request without a model override
    pub fn new(
        question: impl Into<String>,
        spread_name: impl Into<String>,
        spread_id: impl Into<String>,
        items: Vec<DrawnItem>,
    ) -> Self {
        Self {
            question: question.into(),
            spread_name: spread_name.into(),
            spread_id: spread_id.into(),
            items,
            override_model: None,
        }
    }

    /// Set the override model
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.override_model = Some(model.into());
        self
    }

    /// Build the prompt pair for this request
    pub fn prompts(&self) -> PromptPair {
        construct_prompts(
            &self.question,
            &self.spread_name,
            &self.spread_id,
            &self.items,
        )
    }

    /// Whether two requests describe the same reading (ignores the model)
    pub fn same_reading(&self, other: &ReadingRequest) -> bool {
        self.question == other.question
            && self.spread_name == other.spread_name
            && self.spread_id == other.spread_id
            && self.items == other.items
    }
}

/// System and user prompts for one reading
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptPair {
    pub system_prompt: String,
    pub user_prompt: String,
}

#[derive(Serialize)]
struct CardLine<'a> {
    position: &'a str,
    card: &'a str,
    orientation: &'a str,
}

/// Render the system and user prompts for a reading.
pub fn construct_prompts(
    question: &str,
    spread_name: &str,
    spread_id: &str,
    items: &[DrawnItem],
) -> PromptPair {
    let lines: Vec<CardLine<'_>> = items
        .iter()
        .map(|item| CardLine {
            position: &item.position_label,
            card: &item.item_name,
            orientation: item.orientation_label(),
        })
        .collect();
    let cards_json = serde_json::to_string_pretty(&lines).unwrap_or_default();

    let question = question.trim();
    let question_line = if question.is_empty() {
        "My question: (none given - please offer a general reading)".to_string()
    } else {
        format!("My question: {}", question)
    };

    let user_prompt = format!(
        "{question_line}\n\
         Spread: {spread_name} (id: {spread_id})\n\
         Cards drawn ({count}), in order:\n\
         {cards_json}\n\n\
         Please interpret these cards for my question and close with guidance I can act on.",
        count = items.len(),
    );

    PromptPair {
        system_prompt: SYSTEM_PROMPT.to_string(),
        user_prompt,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn three_cards() -> Vec<DrawnItem> {
        vec![
            DrawnItem::upright("Past", "The Fool"),
            DrawnItem::reversed("Present", "The Tower"),
            DrawnItem::upright("Future", "The Star"),
        ]
    }

    #[test]
    fn test_construct_prompts_is_deterministic() {
        let a = construct_prompts("Will I move?", "Three Card", "three-card", &three_cards());
        let b = construct_prompts("Will I move?", "Three Card", "three-card", &three_cards());
        assert_eq!(a, b);
    }

    #[test]
    fn test_user_prompt_embeds_inputs() {
        let prompts = construct_prompts("Will I move?", "Three Card", "three-card", &three_cards());

        assert!(prompts.user_prompt.contains("My question: Will I move?"));
        assert!(prompts.user_prompt.contains("Spread: Three Card (id: three-card)"));
        assert!(prompts.user_prompt.contains("\"position\": \"Present\""));
        assert!(prompts.user_prompt.contains("\"card\": \"The Tower\""));
        assert!(prompts.user_prompt.contains("\"orientation\": \"reversed\""));
        assert!(prompts.user_prompt.contains("Cards drawn (3)"));
    }

    #[test]
    fn test_user_prompt_preserves_card_order() {
        let prompts = construct_prompts("q", "Three Card", "three-card", &three_cards());
        let past = prompts.user_prompt.find("The Fool").unwrap();
        let present = prompts.user_prompt.find("The Tower").unwrap();
        let future = prompts.user_prompt.find("The Star").unwrap();
        assert!(past < present && present < future);
    }

    #[test]
    fn test_system_prompt_is_fixed_template() {
        let a = construct_prompts("a", "One", "one", &[]);
        let b = construct_prompts("b", "Two", "two", &three_cards());
        assert_eq!(a.system_prompt, b.system_prompt);
        assert!(a.system_prompt.contains("Interpretive principles"));
        assert!(a.system_prompt.contains("**Guidance**"));
    }

    #[test]
    fn test_empty_question_requests_general_reading() {
        let prompts = construct_prompts("   ", "Single", "single", &three_cards());
        assert!(prompts.user_prompt.contains("general reading"));
    }

    #[test]
    fn test_drawn_item_from_str() {
        let item: DrawnItem = "Past=The Fool".parse().unwrap();
        assert_eq!(item, DrawnItem::upright("Past", "The Fool"));

        let item: DrawnItem = "Outcome = Ten of Swords:reversed".parse().unwrap();
        assert_eq!(item, DrawnItem::reversed("Outcome", "Ten of Swords"));

        let item: DrawnItem = "Advice=Death:upright".parse().unwrap();
        assert!(!item.reversed);
    }

    #[test]
    fn test_drawn_item_from_str_rejects_bad_input() {
        assert!("The Fool".parse::<DrawnItem>().is_err());
        assert!("=The Fool".parse::<DrawnItem>().is_err());
        assert!("Past=The Fool:sideways".parse::<DrawnItem>().is_err());
    }

    #[test]
    fn test_orientation_label() {
        assert_eq!(DrawnItem::upright("a", "b").orientation_label(), "upright");
        assert_eq!(DrawnItem::reversed("a", "b").orientation_label(), "reversed");
    }

    #[test]
    fn test_same_reading_ignores_model() {
        let a = ReadingRequest::new("q", "Three Card", "three-card", three_cards());
        let b = a.clone().with_model("model-X");
        assert!(a.same_reading(&b));
        assert_ne!(a, b);
    }
}
