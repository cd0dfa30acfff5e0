use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::{CardColor, CardResult, GameDocument, GameStatus, GameSummaryEntity, Role, Team},
    dto::{
        format_system_time,
        validation::{validate_card_index, validate_player_name_field},
    },
    services::sync_coordinator::CreatedGame,
    state::guess::GuessOutcome,
};

/// Payload used to open a new game lobby.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateGameRequest {
    /// Name of the host, who becomes the first player.
    #[validate(custom(function = "validate_player_name_field"))]
    pub name: String,
}

/// Join a lobby, or come back to a game with a known player id.
#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct JoinGameRequest {
    /// Player id handed out by an earlier join; omitted for a new player.
    #[serde(default)]
    pub player_id: Option<Uuid>,
    /// Name shown to the other players.
    #[validate(custom(function = "validate_player_name_field"))]
    pub name: String,
}

/// Request that only identifies the acting player.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlayerRequest {
    /// Acting player.
    pub player_id: Uuid,
}

/// Seat a player during setup.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AssignTeamRequest {
    /// Player taking the seat.
    pub player_id: Uuid,
    /// Team to join.
    pub team: Team,
    /// Role within the team.
    pub role: Role,
}

/// Clue given by the active spymaster. The number is checked by the clue rules, not here.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GiveClueRequest {
    /// Spymaster giving the clue.
    pub player_id: Uuid,
    /// Single-word clue.
    pub word: String,
    /// Number of related cards; 0 for unlimited.
    pub number: f64,
}

/// Card an operative wants to turn over.
#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RevealCardRequest {
    /// Operative turning the card over.
    pub player_id: Uuid,
    /// Board slot, 0 to 24.
    #[validate(custom(function = "validate_card_index"))]
    pub index: usize,
}

/// Records returned by the history listing when no limit is given.
pub const DEFAULT_HISTORY_LIMIT: usize = 10;

/// Query string of the history listing.
#[derive(Debug, Default, Deserialize, IntoParams, Validate)]
#[into_params(parameter_in = Query)]
pub struct HistoryQuery {
    /// Records to return, 1 to 50; 10 when omitted.
    #[validate(range(min = 1, max = 50))]
    pub limit: Option<usize>,
}

impl HistoryQuery {
    /// Requested limit, or the default.
    pub fn limit(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_HISTORY_LIMIT)
    }
}

/// Identifiers handed to the host of a new game.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreatedGameResponse {
    /// Code to share with the other players.
    pub code: String,
    /// Player id of the host.
    pub player_id: Uuid,
    /// Game as first written.
    pub game: GameDocument,
}

impl From<CreatedGame> for CreatedGameResponse {
    fn from(value: CreatedGame) -> Self {
        Self {
            code: value.code,
            player_id: value.player_id,
            game: value.document,
        }
    }
}

/// Player id confirmed by a join, with the game as written.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct JoinGameResponse {
    /// Id to send with every later request.
    pub player_id: Uuid,
    /// Game as written by the join.
    pub game: GameDocument,
}

/// What a reveal turned up.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RevealCardResponse {
    /// Revealed slot.
    pub index: usize,
    /// How the reveal played out for the guessing team.
    pub result: CardResult,
    /// Color under the card.
    pub color: CardColor,
    /// Game as written by the reveal.
    pub game: GameDocument,
}

impl RevealCardResponse {
    /// Build the response for a committed reveal.
    pub fn new(index: usize, outcome: GuessOutcome, game: GameDocument) -> Self {
        Self {
            index,
            result: outcome.result,
            color: outcome.color,
            game,
        }
    }
}

/// Lobby listing entry.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GameSummary {
    /// Public code.
    pub code: String,
    /// Friendly name.
    pub display_name: String,
    /// Lifecycle status.
    pub status: GameStatus,
    /// Players currently connected.
    pub active_players: usize,
    /// RFC 3339 creation time.
    pub created_at: String,
}

impl From<GameSummaryEntity> for GameSummary {
    fn from(value: GameSummaryEntity) -> Self {
        Self {
            code: value.code,
            display_name: value.display_name,
            status: value.status,
            active_players: value.active_players,
            created_at: format_system_time(value.created_at),
        }
    }
}
