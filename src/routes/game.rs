use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use validator::Validate;

use crate::{
    dao::models::{GameDocument, GameHistoryEntry},
    dto::game::{
        AssignTeamRequest, CreateGameRequest, CreatedGameResponse, GameSummary, GiveClueRequest,
        HistoryQuery, JoinGameRequest, JoinGameResponse, PlayerRequest, RevealCardRequest,
        RevealCardResponse,
    },
    error::AppError,
    services::game_service,
    state::SharedState,
};

/// Routes handling the lobby and every turn of a game.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/games", get(list_games).post(create_game))
        .route("/games/{code}", get(get_game))
        .route("/games/{code}/join", post(join_game))
        .route("/games/{code}/leave", post(leave_game))
        .route("/games/{code}/team", post(assign_team))
        .route("/games/{code}/start", post(start_game))
        .route("/games/{code}/clue", post(give_clue))
        .route("/games/{code}/reveal", post(reveal_card))
        .route("/games/{code}/pass", post(end_guessing))
        .route("/games/{code}/reset", post(reset_game))
        .route("/games/{code}/rematch", post(rematch))
        .route("/history", get(list_history))
}

/// List stored games, newest first.
#[utoipa::path(
    get,
    path = "/games",
    tag = "game",
    responses(
        (status = 200, description = "Known games", body = [GameSummary]),
        (status = 503, description = "Storage unavailable")
    )
)]
pub async fn list_games(State(state): State<SharedState>) -> Result<Json<Vec<GameSummary>>, AppError> {
    let games = game_service::list_games(&state).await?;
    Ok(Json(games))
}

/// Finished games, most recent first.
#[utoipa::path(
    get,
    path = "/history",
    tag = "game",
    params(HistoryQuery),
    responses(
        (status = 200, description = "Finished games", body = [GameHistoryEntry]),
        (status = 400, description = "Limit outside 1 to 50"),
        (status = 503, description = "Storage unavailable")
    )
)]
pub async fn list_history(
    State(state): State<SharedState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<GameHistoryEntry>>, AppError> {
    query.validate()?;
    let history = game_service::list_history(&state, query.limit()).await?;
    Ok(Json(history))
}

/// Open a new lobby; the caller becomes its host.
#[utoipa::path(
    post,
    path = "/games",
    tag = "game",
    request_body = CreateGameRequest,
    responses(
        (status = 200, description = "Game created", body = CreatedGameResponse),
        (status = 400, description = "Invalid host name")
    )
)]
pub async fn create_game(
    State(state): State<SharedState>,
    Json(payload): Json<CreateGameRequest>,
) -> Result<Json<CreatedGameResponse>, AppError> {
    payload.validate()?;
    let created = game_service::create_game(&state, payload).await?;
    Ok(Json(created))
}

/// Fetch the current document of a game.
#[utoipa::path(
    get,
    path = "/games/{code}",
    tag = "game",
    params(("code" = String, Path, description = "Game code")),
    responses(
        (status = 200, description = "Current document", body = GameDocument),
        (status = 404, description = "Unknown game")
    )
)]
pub async fn get_game(
    State(state): State<SharedState>,
    Path(code): Path<String>,
) -> Result<Json<GameDocument>, AppError> {
    let game = game_service::get_game(&state, &code).await?;
    Ok(Json(game))
}

/// Join a lobby, or come back with a known player id.
#[utoipa::path(
    post,
    path = "/games/{code}/join",
    tag = "game",
    params(("code" = String, Path, description = "Game code")),
    request_body = JoinGameRequest,
    responses(
        (status = 200, description = "Player joined", body = JoinGameResponse),
        (status = 404, description = "Unknown game"),
        (status = 409, description = "Game finished or already in progress")
    )
)]
pub async fn join_game(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    Json(payload): Json<JoinGameRequest>,
) -> Result<Json<JoinGameResponse>, AppError> {
    payload.validate()?;
    let (player_id, game) = game_service::join_game(&state, &code, payload).await?;
    Ok(Json(JoinGameResponse { player_id, game }))
}

/// Mark a player as gone; they may join again with the same id.
#[utoipa::path(
    post,
    path = "/games/{code}/leave",
    tag = "game",
    params(("code" = String, Path, description = "Game code")),
    request_body = PlayerRequest,
    responses(
        (status = 200, description = "Player left", body = GameDocument),
        (status = 404, description = "Unknown game or player")
    )
)]
pub async fn leave_game(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    Json(payload): Json<PlayerRequest>,
) -> Result<Json<GameDocument>, AppError> {
    let game = game_service::leave_game(&state, &code, payload.player_id).await?;
    Ok(Json(game))
}

/// Seat a player in a team and role during setup.
#[utoipa::path(
    post,
    path = "/games/{code}/team",
    tag = "game",
    params(("code" = String, Path, description = "Game code")),
    request_body = AssignTeamRequest,
    responses(
        (status = 200, description = "Seat assigned", body = GameDocument),
        (status = 409, description = "Not in setup or spymaster seat taken")
    )
)]
pub async fn assign_team(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    Json(payload): Json<AssignTeamRequest>,
) -> Result<Json<GameDocument>, AppError> {
    let game = game_service::assign_team(&state, &code, payload).await?;
    Ok(Json(game))
}

/// Deal a board and start the round.
#[utoipa::path(
    post,
    path = "/games/{code}/start",
    tag = "game",
    params(("code" = String, Path, description = "Game code")),
    request_body = PlayerRequest,
    responses(
        (status = 200, description = "Round started", body = GameDocument),
        (status = 409, description = "Seats incomplete or game already started")
    )
)]
pub async fn start_game(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    Json(payload): Json<PlayerRequest>,
) -> Result<Json<GameDocument>, AppError> {
    let game = game_service::start_game(&state, &code, payload.player_id).await?;
    Ok(Json(game))
}

/// Give a clue as the active team's spymaster.
#[utoipa::path(
    post,
    path = "/games/{code}/clue",
    tag = "game",
    params(("code" = String, Path, description = "Game code")),
    request_body = GiveClueRequest,
    responses(
        (status = 200, description = "Clue recorded", body = GameDocument),
        (status = 400, description = "Clue rejected"),
        (status = 409, description = "Not this player's turn or wrong phase")
    )
)]
pub async fn give_clue(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    Json(payload): Json<GiveClueRequest>,
) -> Result<Json<GameDocument>, AppError> {
    let game = game_service::give_clue(&state, &code, payload).await?;
    Ok(Json(game))
}

/// Reveal a card as an operative of the active team.
#[utoipa::path(
    post,
    path = "/games/{code}/reveal",
    tag = "game",
    params(("code" = String, Path, description = "Game code")),
    request_body = RevealCardRequest,
    responses(
        (status = 200, description = "Card revealed", body = RevealCardResponse),
        (status = 400, description = "Index outside the board"),
        (status = 409, description = "Card already revealed, wrong phase or not this player's turn")
    )
)]
pub async fn reveal_card(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    Json(payload): Json<RevealCardRequest>,
) -> Result<Json<RevealCardResponse>, AppError> {
    payload.validate()?;
    let revealed = game_service::reveal_card(&state, &code, payload).await?;
    Ok(Json(revealed))
}

/// Stop guessing and hand the turn to the other team.
#[utoipa::path(
    post,
    path = "/games/{code}/pass",
    tag = "game",
    params(("code" = String, Path, description = "Game code")),
    request_body = PlayerRequest,
    responses(
        (status = 200, description = "Turn passed", body = GameDocument),
        (status = 409, description = "Wrong phase or not this player's turn")
    )
)]
pub async fn end_guessing(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    Json(payload): Json<PlayerRequest>,
) -> Result<Json<GameDocument>, AppError> {
    let game = game_service::end_guessing(&state, &code, payload.player_id).await?;
    Ok(Json(game))
}

/// Send the game back to setup and clear every seat.
#[utoipa::path(
    post,
    path = "/games/{code}/reset",
    tag = "game",
    params(("code" = String, Path, description = "Game code")),
    responses(
        (status = 200, description = "Game reset", body = GameDocument),
        (status = 404, description = "Unknown game")
    )
)]
pub async fn reset_game(
    State(state): State<SharedState>,
    Path(code): Path<String>,
) -> Result<Json<GameDocument>, AppError> {
    let game = game_service::reset_game(&state, &code).await?;
    Ok(Json(game))
}

/// Deal a new board to the same seats after a finished round.
#[utoipa::path(
    post,
    path = "/games/{code}/rematch",
    tag = "game",
    params(("code" = String, Path, description = "Game code")),
    responses(
        (status = 200, description = "New round started", body = GameDocument),
        (status = 409, description = "Game is not finished")
    )
)]
pub async fn rematch(
    State(state): State<SharedState>,
    Path(code): Path<String>,
) -> Result<Json<GameDocument>, AppError> {
    let game = game_service::rematch(&state, &code).await?;
    Ok(Json(game))
}
