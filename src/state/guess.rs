//! Reveal classification. Pure: counters are updated by the turn machine.

use thiserror::Error;

use crate::dao::models::{CardColor, CardResult, Team};

/// Classification of a reveal plus the card's own colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuessOutcome {
    /// Result relative to the revealing team.
    pub result: CardResult,
    /// Intrinsic colour of the card.
    pub color: CardColor,
}

/// Reveals that must never be applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GuessError {
    /// The slot is already face up; applying it again would double-count.
    #[error("card {index} is already revealed")]
    AlreadyRevealed {
        /// Slot index.
        index: usize,
    },
    /// The index does not address a slot.
    #[error("card {index} is not on the board")]
    OutOfRange {
        /// Slot index.
        index: usize,
    },
}

/// Classify a card colour from `team`'s point of view.
pub fn classify(color: CardColor, team: Team) -> CardResult {
    match color {
        CardColor::Assassin => CardResult::Assassin,
        CardColor::Neutral => CardResult::Neutral,
        CardColor::Red | CardColor::Blue if color == team.color() => CardResult::Correct,
        CardColor::Red | CardColor::Blue => CardResult::Opponent,
    }
}

/// Resolve a reveal of slot `index` by `team`.
pub fn resolve_guess(
    index: usize,
    color_map: &[CardColor],
    revealed: &[bool],
    team: Team,
) -> Result<GuessOutcome, GuessError> {
    let color = *color_map
        .get(index)
        .ok_or(GuessError::OutOfRange { index })?;
    match revealed.get(index) {
        Some(true) => return Err(GuessError::AlreadyRevealed { index }),
        Some(false) => {}
        None => return Err(GuessError::OutOfRange { index }),
    }
    Ok(GuessOutcome {
        result: classify(color, team),
        color,
    })
}
