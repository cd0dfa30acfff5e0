//! Validation helpers for DTOs.

use validator::ValidationError;

use crate::state::lobby::{NameRejection, validate_player_name};

/// Validates a player name with the lobby rule: non-blank, at most 20 characters once trimmed.
///
/// # Examples
///
/// ```ignore
/// validate_player_name_field("Ada")        // Ok
/// validate_player_name_field("   ")        // Err - blank
/// validate_player_name_field(&"x".repeat(21)) // Err - too long
/// ```
pub fn validate_player_name_field(name: &str) -> Result<(), ValidationError> {
    match validate_player_name(name) {
        Ok(_) => Ok(()),
        Err(rejection) => {
            let code = match rejection {
                NameRejection::Empty => "name_empty",
                NameRejection::TooLong => "name_length",
            };
            let mut err = ValidationError::new(code);
            err.message = Some(rejection.to_string().into());
            Err(err)
        }
    }
}

/// Validates that a card index addresses a slot of the 25-card board.
///
/// `validator` hands `Copy` fields to custom validators by value.
pub fn validate_card_index(index: usize) -> Result<(), ValidationError> {
    if index >= crate::dao::models::BOARD_SIZE {
        let mut err = ValidationError::new("card_index_range");
        err.message = Some(format!("Card index must be below 25 (got {index})").into());
        return Err(err);
    }
    Ok(())
}
