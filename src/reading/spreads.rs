// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Built-in spread layouts

use crate::error::{ArcanaError, Result};
use crate::reading::prompts::{split_orientation, DrawnItem};

/// A named spread and its ordered positions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Spread {
    pub id: &'static str,
    pub name: &'static str,
    pub positions: &'static [&'static str],
}

const BUILTIN_SPREADS: &[Spread] = &[
    Spread {
        id: "single",
        name: "Single Card",
        positions: &["Message"],
    },
    Spread {
        id: "three-card",
        name: "Past, Present, Future",
        positions: &["Past", "Present", "Future"],
    },
    Spread {
        id: "choice",
        name: "Two Paths",
        positions: &[
            "Current situation",
            "Path A",
            "Path B",
            "Outcome of A",
            "Outcome of B",
        ],
    },
    Spread {
        id: "celtic-cross",
        name: "Celtic Cross",
        positions: &[
            "Present",
            "Challenge",
            "Foundation",
            "Recent past",
            "Crown",
            "Near future",
            "Self",
            "Environment",
            "Hopes and fears",
            "Outcome",
        ],
    },
];

impl Spread {
    /// All built-in spreads
    pub fn builtin() -> &'static [Spread] {
        BUILTIN_SPREADS
    }

    /// Look up a built-in spread by id
    pub fn find(id: &str) -> Option<&'static Spread> {
        BUILTIN_SPREADS
            .iter()
            .find(|s| s.id.eq_ignore_ascii_case(id.trim()))
    }

    /// Place cards into this spread's positions in order.
    ///
    /// Each entry is `CARD[:reversed]`, or `POSITION=CARD[:reversed]` to name
    /// the position explicitly.
    pub fn place(&self, cards: &[String]) -> Result<Vec<DrawnItem>> {
        if cards.len() > self.positions.len() {
            return Err(ArcanaError::InvalidInput(format!(
                "spread '{}' has {} positions but {} cards were given",
                self.id,
                self.positions.len(),
                cards.len()
            )));
        }

        cards
            .iter()
            .zip(self.positions.iter())
            .map(|(card, position)| {
                if card.contains('=') {
                    card.parse()
                } else {
                    let (name, reversed) = split_orientation(card)?;
                    if name.is_empty() {
                        return Err(ArcanaError::InvalidInput(format!(
                            "empty card name for position '{}'",
                            position
                        )));
                    }
                    Ok(DrawnItem::new(*position, name, reversed))
                }
            })
            .collect()
    }
}
