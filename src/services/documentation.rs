use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the Codenames sync gateway.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::sse::game_stream,
        crate::routes::game::list_games,
        crate::routes::game::create_game,
        crate::routes::game::get_game,
        crate::routes::game::join_game,
        crate::routes::game::leave_game,
        crate::routes::game::assign_team,
        crate::routes::game::start_game,
        crate::routes::game::give_clue,
        crate::routes::game::reveal_card,
        crate::routes::game::end_guessing,
        crate::routes::game::reset_game,
        crate::routes::game::rematch,
        crate::routes::game::list_history,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::sse::StreamError,
            crate::dto::game::CreateGameRequest,
            crate::dto::game::JoinGameRequest,
            crate::dto::game::PlayerRequest,
            crate::dto::game::AssignTeamRequest,
            crate::dto::game::GiveClueRequest,
            crate::dto::game::RevealCardRequest,
            crate::dto::game::CreatedGameResponse,
            crate::dto::game::JoinGameResponse,
            crate::dto::game::RevealCardResponse,
            crate::dto::game::GameSummary,
            crate::dao::models::GameDocument,
            crate::dao::models::Player,
            crate::dao::models::Board,
            crate::dao::models::GameState,
            crate::dao::models::ActiveClue,
            crate::dao::models::ClueLogEntry,
            crate::dao::models::GuessRecord,
            crate::dao::models::Team,
            crate::dao::models::Role,
            crate::dao::models::CardColor,
            crate::dao::models::CardResult,
            crate::dao::models::Phase,
            crate::dao::models::WinReason,
            crate::dao::models::GameStatus,
            crate::dao::models::GameHistoryEntry,
            crate::dao::models::HistoryPlayer,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "game", description = "Lobby and turn operations on a shared game"),
        (name = "sse", description = "Server-sent events streams"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_game_route_is_documented() {
        let doc = ApiDoc::openapi();
        for path in [
            "/healthcheck",
            "/games",
            "/games/{code}",
            "/games/{code}/events",
            "/games/{code}/reveal",
            "/games/{code}/rematch",
            "/history",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
