use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;
use validator::ValidationErrors;

use crate::{
    dao::{models::Team, storage::StorageError},
    state::{
        clue::ClueRejection,
        guess::GuessError,
        lobby::{NameRejection, StartRejection},
        state_machine::TurnError,
    },
};

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Clue failed validation.
    #[error(transparent)]
    InvalidClue(#[from] ClueRejection),
    /// Player name failed validation.
    #[error(transparent)]
    InvalidName(#[from] NameRejection),
    /// Actor does not hold the seat that may act right now.
    #[error("it is not player {player}'s turn")]
    NotYourTurn {
        /// Acting player.
        player: Uuid,
    },
    /// Action does not fit the current phase or status.
    #[error("wrong phase: {0}")]
    WrongPhase(String),
    /// No game is stored under the code.
    #[error("game `{code}` not found")]
    GameNotFound {
        /// Game code.
        code: String,
    },
    /// The round already has a winner.
    #[error("game `{code}` is already finished")]
    GameAlreadyFinished {
        /// Game code.
        code: String,
    },
    /// New players may only join during setup.
    #[error("game `{code}` is in progress and cannot be joined")]
    CannotJoinInProgress {
        /// Game code.
        code: String,
    },
    /// The card was turned over before this request landed.
    #[error("card {index} is already revealed")]
    CardAlreadyRevealed {
        /// Slot index.
        index: usize,
    },
    /// Index outside the board.
    #[error("card {index} is out of range")]
    CardOutOfRange {
        /// Slot index.
        index: usize,
    },
    /// Seats are not filled well enough to start.
    #[error(transparent)]
    CannotStart(#[from] StartRejection),
    /// Another active player already is the team's spymaster.
    #[error("{team} team already has a spymaster")]
    SpymasterTaken {
        /// Team whose seat is taken.
        team: Team,
    },
    /// Player id is not part of the game.
    #[error("player {player} is not in this game")]
    UnknownPlayer {
        /// Unknown id.
        player: Uuid,
    },
    /// Application is running in degraded mode without storage.
    #[error("storage unavailable (degraded mode)")]
    Degraded,
    /// Storage backend is unavailable.
    #[error("storage unavailable")]
    Unavailable(#[source] StorageError),
    /// Every conditional write attempt lost against concurrent writers.
    #[error("game `{code}` is busy; gave up after {attempts} attempts")]
    WriteContention {
        /// Game code.
        code: String,
        /// Attempts made.
        attempts: u32,
    },
}

impl ServiceError {
    /// Whether the client may retry the same request unchanged.
    pub fn is_retryable(&self) -> bool {
        match self {
            ServiceError::Unavailable(err) => err.is_retryable(),
            ServiceError::Degraded | ServiceError::WriteContention { .. } => true,
            _ => false,
        }
    }
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound { code } => ServiceError::GameNotFound { code },
            other => ServiceError::Unavailable(other),
        }
    }
}

impl From<TurnError> for ServiceError {
    fn from(err: TurnError) -> Self {
        match err {
            TurnError::InvalidTransition(invalid) => ServiceError::WrongPhase(invalid.to_string()),
            TurnError::InvalidClue(rejection) => ServiceError::InvalidClue(rejection),
            TurnError::Guess(GuessError::AlreadyRevealed { index }) => {
                ServiceError::CardAlreadyRevealed { index }
            }
            TurnError::Guess(GuessError::OutOfRange { index }) => {
                ServiceError::CardOutOfRange { index }
            }
        }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(err: ValidationErrors) -> Self {
        AppError::BadRequest(format!("validation failed: {}", err))
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Requested resource not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Conflict with current state.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Service unavailable or degraded.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        let message = err.to_string();
        match err {
            ServiceError::InvalidClue(_)
            | ServiceError::InvalidName(_)
            | ServiceError::CardOutOfRange { .. } => AppError::BadRequest(message),
            ServiceError::GameNotFound { .. } | ServiceError::UnknownPlayer { .. } => {
                AppError::NotFound(message)
            }
            ServiceError::NotYourTurn { .. }
            | ServiceError::WrongPhase(_)
            | ServiceError::GameAlreadyFinished { .. }
            | ServiceError::CannotJoinInProgress { .. }
            | ServiceError::CardAlreadyRevealed { .. }
            | ServiceError::CannotStart(_)
            | ServiceError::SpymasterTaken { .. } => AppError::Conflict(message),
            ServiceError::Unavailable(StorageError::Corrupt { .. }) => AppError::Internal(message),
            ServiceError::Unavailable(source) => AppError::ServiceUnavailable(source.to_string()),
            ServiceError::Degraded => AppError::ServiceUnavailable("degraded mode".into()),
            ServiceError::WriteContention { .. } => AppError::ServiceUnavailable(message),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
    retryable: bool,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let payload = Json(ErrorBody {
            message: self.to_string(),
            retryable: status == StatusCode::SERVICE_UNAVAILABLE,
        });

        (status, payload).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_not_found_maps_to_game_not_found() {
        let err = ServiceError::from(StorageError::NotFound { code: "ABC".into() });
        assert!(matches!(err, ServiceError::GameNotFound { ref code } if code == "ABC"));
        assert!(!err.is_retryable());
    }

    #[test]
    fn storage_conflict_is_retryable() {
        let err = ServiceError::from(StorageError::Conflict { code: "ABC".into() });
        assert!(err.is_retryable());
    }

    #[test]
    fn corrupt_documents_are_not_retryable() {
        let err = ServiceError::Unavailable(StorageError::corrupt("ABC", "malformed board"));
        assert!(!err.is_retryable());
        let response = AppError::from(err);
        assert!(matches!(response, AppError::Internal(_)));
    }

    #[test]
    fn guess_errors_keep_their_index() {
        let err = ServiceError::from(TurnError::Guess(GuessError::AlreadyRevealed { index: 3 }));
        assert!(matches!(err, ServiceError::CardAlreadyRevealed { index: 3 }));
    }

    #[test]
    fn http_status_follows_error_family() {
        let cases = [
            (ServiceError::InvalidClue(ClueRejection::Empty), StatusCode::BAD_REQUEST),
            (
                ServiceError::GameNotFound { code: "X".into() },
                StatusCode::NOT_FOUND,
            ),
            (
                ServiceError::CardAlreadyRevealed { index: 1 },
                StatusCode::CONFLICT,
            ),
            (ServiceError::Degraded, StatusCode::SERVICE_UNAVAILABLE),
            (
                ServiceError::Unavailable(StorageError::corrupt("X", "bad")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            let response = AppError::from(err).into_response();
            assert_eq!(response.status(), expected);
        }
    }
}
