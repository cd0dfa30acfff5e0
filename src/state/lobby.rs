//! Lobby rules: player names, seat checks before a round, and game identifiers.

use rand::{Rng, seq::IndexedRandom};
use thiserror::Error;

use crate::dao::models::{Player, PlayerId, Role, Team};

/// Longest accepted player name, in characters.
pub const MAX_NAME_CHARS: usize = 20;
/// Length of a public game code.
pub const CODE_LENGTH: usize = 6;
/// Characters used in game codes; 0/O and 1/I are left out.
pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

const CALL_SIGNS: &[&str] = &[
    "PHOENIX", "DRAGON", "EAGLE", "LION", "WOLF", "HAWK", "SHARK", "TIGER", "COBRA", "FALCON",
    "PANTHER", "VIPER", "RAVEN", "STORM", "BLAZE", "FROST", "SHADOW", "THUNDER", "COMET",
    "AURORA", "GALAXY", "NEBULA", "TITAN", "ATLAS",
];

/// Why a player name was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum NameRejection {
    /// Blank after trimming.
    #[error("Name cannot be empty")]
    Empty,
    /// Longer than [`MAX_NAME_CHARS`].
    #[error("Name must be 20 characters or less")]
    TooLong,
}

/// Returns the trimmed name when acceptable.
pub fn validate_player_name(raw: &str) -> Result<String, NameRejection> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(NameRejection::Empty);
    }
    if name.chars().count() > MAX_NAME_CHARS {
        return Err(NameRejection::TooLong);
    }
    Ok(name.to_owned())
}

/// Every reason a round cannot start yet.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot start game: {}", .reasons.join("; "))]
pub struct StartRejection {
    /// Player-facing reasons, red before blue.
    pub reasons: Vec<String>,
}

/// Check that both teams have active players and exactly one active spymaster each.
pub fn can_start_game<'a, I>(players: I) -> Result<(), StartRejection>
where
    I: IntoIterator<Item = &'a Player>,
{
    let active: Vec<&Player> = players.into_iter().filter(|p| p.is_active).collect();
    let mut reasons = Vec::new();

    for team in Team::ALL {
        if !active.iter().any(|player| player.team == Some(team)) {
            reasons.push(format!("{} team needs at least 1 player", team.label()));
        }
    }
    for team in Team::ALL {
        // An empty team is already reported above.
        if !active.iter().any(|player| player.team == Some(team)) {
            continue;
        }
        let spymasters = active
            .iter()
            .filter(|player| player.seated_as(team, Role::Spymaster))
            .count();
        if spymasters != 1 {
            reasons.push(format!("{} team needs exactly 1 spymaster", team.label()));
        }
    }

    if reasons.is_empty() {
        Ok(())
    } else {
        Err(StartRejection { reasons })
    }
}

/// Active spymaster of `team`, if the seat is taken.
pub fn spymaster_of<'a, I>(players: I, team: Team) -> Option<(PlayerId, &'a Player)>
where
    I: IntoIterator<Item = (&'a PlayerId, &'a Player)>,
{
    players
        .into_iter()
        .find(|(_, player)| player.seated_as(team, Role::Spymaster))
        .map(|(id, player)| (*id, player))
}

/// Random public game code.
pub fn generate_code<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..CODE_LENGTH)
        .map(|_| char::from(CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())]))
        .collect()
}

/// Random friendly name shown next to the code.
pub fn generate_display_name<R: Rng + ?Sized>(rng: &mut R) -> String {
    CALL_SIGNS.choose(rng).copied().unwrap_or("AGENT").to_owned()
}
