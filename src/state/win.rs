//! Win detection after a reveal. The assassin is handled by the caller.

use crate::dao::models::{CardColor, Team, WinReason};

/// A team and the number of its cards it must find.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TeamTarget {
    /// The team.
    pub team: Team,
    /// Cards of its colour on the board.
    pub total: u8,
}

/// Game-over verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Victory {
    /// Winning team.
    pub winner: Team,
    /// Why it won.
    pub reason: WinReason,
}

/// Revealed cards painted `color`.
pub fn revealed_count(revealed: &[bool], color_map: &[CardColor], color: CardColor) -> usize {
    revealed
        .iter()
        .zip(color_map)
        .filter(|(shown, slot)| **shown && **slot == color)
        .count()
}

/// Return the first team, in argument order, whose revealed own-colour count reached its target.
pub fn evaluate(
    revealed: &[bool],
    color_map: &[CardColor],
    first: TeamTarget,
    second: TeamTarget,
) -> Option<Victory> {
    [first, second]
        .into_iter()
        .find(|target| {
            revealed_count(revealed, color_map, target.team.color()) >= usize::from(target.total)
        })
        .map(|target| Victory {
            winner: target.team,
            reason: WinReason::AllRevealed,
        })
}
