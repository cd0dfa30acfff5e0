//! Board dealing: 25 distinct words and a shuffled colour multiset.

use std::collections::HashSet;

use rand::{
    Rng,
    seq::{SliceRandom, index},
};
use thiserror::Error;

use crate::{
    dao::models::{BOARD_SIZE, Board, CardColor, Team},
    state::vocabulary::DEFAULT_WORDS,
};

/// Cards painted in the starting team's colour.
pub const STARTING_TEAM_CARDS: usize = 9;
/// Cards painted in the other team's colour.
pub const OTHER_TEAM_CARDS: usize = 8;
/// Neutral cards.
pub const NEUTRAL_CARDS: usize = 7;
/// Assassin cards.
pub const ASSASSIN_CARDS: usize = 1;

/// Raised when a generator cannot be built.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BoardError {
    /// Fewer distinct words than board slots.
    #[error("vocabulary has {available} distinct words but a board needs {BOARD_SIZE}")]
    InsufficientVocabulary {
        /// Distinct words available.
        available: usize,
    },
}

/// Normalised, duplicate-free word pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vocabulary {
    words: Vec<String>,
}

impl Vocabulary {
    /// Build a vocabulary, trimming and uppercasing every word and dropping blanks and repeats.
    pub fn new<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let words = words
            .into_iter()
            .map(|word| word.as_ref().trim().to_uppercase())
            .filter(|word| !word.is_empty())
            .filter(|word| seen.insert(word.clone()))
            .collect();
        Self { words }
    }

    /// The vocabulary shipped with the binary.
    pub fn builtin() -> Self {
        Self::new(DEFAULT_WORDS.iter().copied())
    }

    /// Number of distinct words.
    pub fn len(&self) -> usize {
        self.words.len()
    }

    /// True when there are no words at all.
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Deals fresh boards from a vocabulary checked once, at construction.
#[derive(Debug, Clone)]
pub struct BoardGenerator {
    vocabulary: Vocabulary,
}

impl BoardGenerator {
    /// Fails when the vocabulary cannot fill a board.
    pub fn new(vocabulary: Vocabulary) -> Result<Self, BoardError> {
        if vocabulary.len() < BOARD_SIZE {
            return Err(BoardError::InsufficientVocabulary {
                available: vocabulary.len(),
            });
        }
        Ok(Self { vocabulary })
    }

    /// Deal a board with `starting_team` holding the extra card.
    pub fn generate<R: Rng + ?Sized>(&self, starting_team: Team, rng: &mut R) -> Board {
        let words = index::sample(rng, self.vocabulary.len(), BOARD_SIZE)
            .into_iter()
            .map(|position| self.vocabulary.words[position].clone())
            .collect();

        let mut color_map = color_multiset(starting_team);
        color_map.shuffle(rng);

        Board { words, color_map }
    }
}

/// Unshuffled colours of a board where `starting_team` goes first.
pub fn color_multiset(starting_team: Team) -> Vec<CardColor> {
    let mut colors = Vec::with_capacity(BOARD_SIZE);
    colors.extend(std::iter::repeat_n(starting_team.color(), STARTING_TEAM_CARDS));
    colors.extend(std::iter::repeat_n(
        starting_team.other().color(),
        OTHER_TEAM_CARDS,
    ));
    colors.extend(std::iter::repeat_n(CardColor::Neutral, NEUTRAL_CARDS));
    colors.extend(std::iter::repeat_n(CardColor::Assassin, ASSASSIN_CARDS));
    colors
}

/// Coin flip for the team that goes first.
pub fn random_starting_team<R: Rng + ?Sized>(rng: &mut R) -> Team {
    if rng.random_bool(0.5) {
        Team::Red
    } else {
        Team::Blue
    }
}
