//! Clue legality checks. Nothing here touches game state.

use thiserror::Error;

/// Largest card count a clue may announce.
pub const MAX_CLUE_NUMBER: u8 = 9;

/// Guess allowance stored for an "unlimited" clue.
pub const UNLIMITED_GUESSES: u8 = 99;

/// Number attached to a clue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClueNumber {
    /// Announced as 0: guess as many as you like.
    Unlimited,
    /// Announced as 1 to 9.
    Cards(u8),
}

impl ClueNumber {
    /// Value written to the shared document.
    pub fn as_raw(self) -> u8 {
        match self {
            ClueNumber::Unlimited => 0,
            ClueNumber::Cards(count) => count,
        }
    }

    /// Guesses granted for this clue: one bonus guess, or the unlimited sentinel.
    pub fn guess_allowance(self) -> u8 {
        match self {
            ClueNumber::Unlimited => UNLIMITED_GUESSES,
            ClueNumber::Cards(count) => count + 1,
        }
    }
}

/// A clue that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidClue {
    /// Trimmed, uppercased word.
    pub word: String,
    /// Parsed number.
    pub number: ClueNumber,
}

/// Why a clue was refused; the message is shown to the spymaster as is.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClueRejection {
    /// Nothing left after trimming.
    #[error("Clue cannot be empty")]
    Empty,
    /// Whitespace inside the word.
    #[error("Clue must be a single word")]
    NotSingleWord,
    /// Same word as a board slot, ignoring case.
    #[error("Clue cannot be a word on the board")]
    OnBoard,
    /// Not an integer in 0..=9.
    #[error("Number must be a whole number between 0 and {MAX_CLUE_NUMBER}")]
    InvalidNumber,
}

/// Validate raw clue input against the words currently on the board.
///
/// Any whitespace left after trimming is refused; hyphens and other punctuation are allowed.
/// The number arrives as a float because clients send arbitrary JSON numbers.
pub fn validate_clue<S: AsRef<str>>(
    word: &str,
    number: f64,
    board_words: &[S],
) -> Result<ValidClue, ClueRejection> {
    let word = word.trim().to_uppercase();
    if word.is_empty() {
        return Err(ClueRejection::Empty);
    }
    if word.chars().any(char::is_whitespace) {
        return Err(ClueRejection::NotSingleWord);
    }
    if board_words
        .iter()
        .any(|candidate| candidate.as_ref().trim().to_uppercase() == word)
    {
        return Err(ClueRejection::OnBoard);
    }

    Ok(ValidClue {
        word,
        number: parse_number(number)?,
    })
}

fn parse_number(number: f64) -> Result<ClueNumber, ClueRejection> {
    if !number.is_finite() || number.fract() != 0.0 {
        return Err(ClueRejection::InvalidNumber);
    }
    if !(0.0..=f64::from(MAX_CLUE_NUMBER)).contains(&number) {
        return Err(ClueRejection::InvalidNumber);
    }
    match number as u8 {
        0 => Ok(ClueNumber::Unlimited),
        count => Ok(ClueNumber::Cards(count)),
    }
}
