use uuid::Uuid;

use crate::{
    dao::models::{GameDocument, GameHistoryEntry},
    dto::game::{
        AssignTeamRequest, CreateGameRequest, CreatedGameResponse, GameSummary, GiveClueRequest,
        JoinGameRequest, RevealCardRequest, RevealCardResponse,
    },
    error::ServiceError,
    state::SharedState,
};

/// List every stored game for the lobby.
pub async fn list_games(state: &SharedState) -> Result<Vec<GameSummary>, ServiceError> {
    let games = state.coordinator().await?.list_games().await?;
    Ok(games.into_iter().map(Into::into).collect())
}

/// Finished games, most recent first.
pub async fn list_history(
    state: &SharedState,
    limit: usize,
) -> Result<Vec<GameHistoryEntry>, ServiceError> {
    state.coordinator().await?.list_history(limit).await
}

/// Open a new lobby hosted by the requesting player.
pub async fn create_game(
    state: &SharedState,
    request: CreateGameRequest,
) -> Result<CreatedGameResponse, ServiceError> {
    let created = state.coordinator().await?.create_game(&request.name).await?;
    Ok(created.into())
}

/// Latest stored document of `code`.
pub async fn get_game(state: &SharedState, code: &str) -> Result<GameDocument, ServiceError> {
    state.coordinator().await?.snapshot(code).await
}

/// Join a lobby or return to a game.
pub async fn join_game(
    state: &SharedState,
    code: &str,
    request: JoinGameRequest,
) -> Result<(Uuid, GameDocument), ServiceError> {
    let committed = state
        .coordinator()
        .await?
        .join_game(code, request.player_id, &request.name)
        .await?;
    Ok((committed.value, committed.document))
}

/// Mark a player as gone.
pub async fn leave_game(
    state: &SharedState,
    code: &str,
    player_id: Uuid,
) -> Result<GameDocument, ServiceError> {
    let committed = state
        .coordinator()
        .await?
        .leave_game(code, player_id)
        .await?;
    Ok(committed.document)
}

/// Seat a player during setup.
pub async fn assign_team(
    state: &SharedState,
    code: &str,
    request: AssignTeamRequest,
) -> Result<GameDocument, ServiceError> {
    let committed = state
        .coordinator()
        .await?
        .assign_team(code, request.player_id, request.team, request.role)
        .await?;
    Ok(committed.document)
}

/// Deal the board and start the round.
pub async fn start_game(
    state: &SharedState,
    code: &str,
    player_id: Uuid,
) -> Result<GameDocument, ServiceError> {
    let committed = state
        .coordinator()
        .await?
        .start_game(code, player_id)
        .await?;
    Ok(committed.document)
}

/// Record a clue from the active spymaster.
pub async fn give_clue(
    state: &SharedState,
    code: &str,
    request: GiveClueRequest,
) -> Result<GameDocument, ServiceError> {
    let committed = state
        .coordinator()
        .await?
        .give_clue(code, request.player_id, &request.word, request.number)
        .await?;
    Ok(committed.document)
}

/// Turn over a card for the active team.
pub async fn reveal_card(
    state: &SharedState,
    code: &str,
    request: RevealCardRequest,
) -> Result<RevealCardResponse, ServiceError> {
    let committed = state
        .coordinator()
        .await?
        .reveal_card(code, request.player_id, request.index)
        .await?;
    let revealed = committed.value;
    Ok(RevealCardResponse::new(
        revealed.index,
        revealed.outcome,
        committed.document,
    ))
}

/// End the active team's guessing.
pub async fn end_guessing(
    state: &SharedState,
    code: &str,
    player_id: Uuid,
) -> Result<GameDocument, ServiceError> {
    let committed = state
        .coordinator()
        .await?
        .end_guessing(code, player_id)
        .await?;
    Ok(committed.document)
}

/// Send the game back to setup.
pub async fn reset_game(state: &SharedState, code: &str) -> Result<GameDocument, ServiceError> {
    let committed = state.coordinator().await?.reset_for_new_game(code).await?;
    Ok(committed.document)
}

/// Deal a fresh board to the same seats.
pub async fn rematch(state: &SharedState, code: &str) -> Result<GameDocument, ServiceError> {
    let committed = state.coordinator().await?.rematch(code).await?;
    Ok(committed.document)
}
