use std::{fmt, time::SystemTime};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_with::{DefaultOnNull, TimestampMilliSeconds, serde_as};
use utoipa::ToSchema;
use uuid::Uuid;

/// Number of word slots on every board.
pub const BOARD_SIZE: usize = 25;

/// Stable identifier of a player (one per device/session).
pub type PlayerId = Uuid;

/// One of the two competing teams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Team {
    /// The red team.
    Red,
    /// The blue team.
    Blue,
}

impl Team {
    /// Both teams, red first. This is also the tie-break order used by win detection.
    pub const ALL: [Team; 2] = [Team::Red, Team::Blue];

    /// The opposing team.
    pub fn other(self) -> Self {
        match self {
            Team::Red => Team::Blue,
            Team::Blue => Team::Red,
        }
    }

    /// Card colour owned by this team.
    pub fn color(self) -> CardColor {
        match self {
            Team::Red => CardColor::Red,
            Team::Blue => CardColor::Blue,
        }
    }

    /// Capitalised name used in player-facing messages.
    pub fn label(self) -> &'static str {
        match self {
            Team::Red => "Red",
            Team::Blue => "Blue",
        }
    }
}

impl fmt::Display for Team {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Team::Red => f.write_str("red"),
            Team::Blue => f.write_str("blue"),
        }
    }
}

/// Seat a player takes inside a team.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Gives clues during the clue phase.
    Spymaster,
    /// Reveals cards during the guess phase.
    Operative,
}

/// Intrinsic colour of a board slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum CardColor {
    /// Red agent.
    Red,
    /// Blue agent.
    Blue,
    /// Innocent bystander.
    Neutral,
    /// Ends the game for the revealing team.
    Assassin,
}

/// Classification of a reveal relative to the revealing team.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum CardResult {
    /// The card belongs to the revealing team.
    Correct,
    /// The card belongs to the other team.
    Opponent,
    /// Neutral card.
    Neutral,
    /// The assassin.
    Assassin,
}

/// Sub-phase of a team's turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// The spymaster is expected to give a clue.
    Clue,
    /// Operatives are guessing.
    Guess,
}

/// Why a game ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum WinReason {
    /// The losing team revealed the assassin.
    Assassin,
    /// The winner found every card of its colour.
    AllRevealed,
}

/// Lifecycle status of a game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum GameStatus {
    /// Players are joining and picking seats.
    Setup,
    /// A board is dealt and turns are running.
    Playing,
    /// A winner has been decided.
    Finished,
}

/// A participant of a game.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    /// Display name.
    pub name: String,
    /// When the player first joined.
    #[serde_as(as = "TimestampMilliSeconds<i64>")]
    #[schema(value_type = i64)]
    pub joined_at: SystemTime,
    /// Soft presence flag; leaving clears it instead of deleting the record.
    pub is_active: bool,
    /// Team the player sits with, if any.
    pub team: Option<Team>,
    /// Role within the team, if any.
    pub role: Option<Role>,
}

impl Player {
    /// A freshly joined, unassigned player.
    pub fn new(name: impl Into<String>, joined_at: SystemTime) -> Self {
        Self {
            name: name.into(),
            joined_at,
            is_active: true,
            team: None,
            role: None,
        }
    }

    /// True when the player is active and seated as `role` in `team`.
    pub fn seated_as(&self, team: Team, role: Role) -> bool {
        self.is_active && self.team == Some(team) && self.role == Some(role)
    }
}

/// The 25 words of a round and their hidden colours.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Board {
    /// Words in slot order.
    pub words: Vec<String>,
    /// Colour of each slot, parallel to `words`.
    pub color_map: Vec<CardColor>,
}

impl Board {
    /// Number of slots painted `color`.
    pub fn count(&self, color: CardColor) -> usize {
        self.color_map.iter().filter(|c| **c == color).count()
    }
}

/// Clue currently in effect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ActiveClue {
    /// Normalised clue word.
    pub word: String,
    /// Number announced with the clue; 0 means unlimited.
    pub number: u8,
    /// Name of the spymaster who gave it.
    pub given_by: String,
}

/// Mutable per-round state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GameState {
    /// Team whose turn it is.
    pub current_turn: Team,
    /// Clue or guess phase of that turn.
    pub phase: Phase,
    /// One flag per slot; never goes back to false within a round.
    pub revealed_cards: Vec<bool>,
    /// Clue being guessed, if any.
    pub current_clue: Option<ActiveClue>,
    /// Guesses left for the current clue.
    pub guesses_remaining: u8,
    /// Red cards revealed so far.
    pub red_revealed: u8,
    /// Blue cards revealed so far.
    pub blue_revealed: u8,
    /// Red cards on the board.
    pub red_total: u8,
    /// Blue cards on the board.
    pub blue_total: u8,
    /// Winner once the game is over.
    pub winner: Option<Team>,
    /// Why the game ended.
    pub win_reason: Option<WinReason>,
}

impl GameState {
    /// Revealed count for `team`.
    pub fn revealed_for(&self, team: Team) -> u8 {
        match team {
            Team::Red => self.red_revealed,
            Team::Blue => self.blue_revealed,
        }
    }

    /// Fixed target for `team`.
    pub fn total_for(&self, team: Team) -> u8 {
        match team {
            Team::Red => self.red_total,
            Team::Blue => self.blue_total,
        }
    }
}

/// Outcome recorded under a clue log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum GuessRecord {
    /// A card was revealed.
    Reveal {
        /// Slot index.
        #[serde(rename = "cardIndex")]
        card_index: usize,
        /// Word on the slot.
        word: String,
        /// How the reveal was classified.
        result: CardResult,
    },
    /// The operatives stopped guessing.
    Passed {
        /// Always true.
        passed: bool,
    },
}

/// Audit record of one clue and the guesses made for it.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClueLogEntry {
    /// Team that received the clue.
    pub team: Team,
    /// Name of the spymaster.
    pub spymaster: String,
    /// Clue word.
    pub word: String,
    /// Clue number.
    pub number: u8,
    /// Guesses in order.
    #[serde(default)]
    #[serde_as(as = "DefaultOnNull")]
    pub guesses: Vec<GuessRecord>,
}

/// The shared document every writer reads and patches.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GameDocument {
    /// Short public code.
    pub code: String,
    /// Friendly name shown in lobbies.
    pub display_name: String,
    /// Name of the player who created the game.
    pub created_by: String,
    /// Player id of the creator.
    #[schema(value_type = String, format = Uuid)]
    pub host_id: PlayerId,
    /// Lifecycle status.
    pub status: GameStatus,
    /// Creation time.
    #[serde_as(as = "TimestampMilliSeconds<i64>")]
    #[schema(value_type = i64)]
    pub created_at: SystemTime,
    /// Start time of the running round.
    #[serde_as(as = "Option<TimestampMilliSeconds<i64>>")]
    #[schema(value_type = Option<i64>)]
    pub started_at: Option<SystemTime>,
    /// End time of the last round.
    #[serde_as(as = "Option<TimestampMilliSeconds<i64>>")]
    #[schema(value_type = Option<i64>)]
    pub finished_at: Option<SystemTime>,
    /// Team that went first this round.
    pub starting_team: Option<Team>,
    /// Everybody who ever joined, keyed by player id.
    #[serde(default)]
    #[schema(value_type = Object)]
    pub players: IndexMap<PlayerId, Player>,
    /// Board of the running round.
    pub board: Option<Board>,
    /// Turn state of the running round.
    pub game_state: Option<GameState>,
    /// Clues given this round, oldest first.
    #[serde(default)]
    #[serde_as(as = "DefaultOnNull")]
    pub clue_log: Vec<ClueLogEntry>,
}

impl GameDocument {
    /// A new game in setup with its host as the only player.
    pub fn new(
        code: impl Into<String>,
        display_name: impl Into<String>,
        host_id: PlayerId,
        host: Player,
    ) -> Self {
        let created_at = host.joined_at;
        let created_by = host.name.clone();
        let mut players = IndexMap::new();
        players.insert(host_id, host);
        Self {
            code: code.into(),
            display_name: display_name.into(),
            created_by,
            host_id,
            status: GameStatus::Setup,
            created_at,
            started_at: None,
            finished_at: None,
            starting_team: None,
            players,
            board: None,
            game_state: None,
            clue_log: Vec::new(),
        }
    }

    /// Active players, in map order.
    pub fn active_players(&self) -> impl Iterator<Item = (&PlayerId, &Player)> {
        self.players.iter().filter(|(_, player)| player.is_active)
    }
}

/// Lightweight listing entry for lobbies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameSummaryEntity {
    /// Game code.
    pub code: String,
    /// Friendly name.
    pub display_name: String,
    /// Lifecycle status.
    pub status: GameStatus,
    /// Number of active players.
    pub active_players: usize,
    /// Creation time.
    pub created_at: SystemTime,
}

impl From<&GameDocument> for GameSummaryEntity {
    fn from(document: &GameDocument) -> Self {
        Self {
            code: document.code.clone(),
            display_name: document.display_name.clone(),
            status: document.status,
            active_players: document.active_players().count(),
            created_at: document.created_at,
        }
    }
}

/// Seat a player held when a game ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HistoryPlayer {
    /// Display name.
    pub name: String,
    /// Team, if seated.
    pub team: Option<Team>,
    /// Role, if seated.
    pub role: Option<Role>,
}

/// Record kept for every finished game, keyed by game code.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GameHistoryEntry {
    /// Code of the finished game.
    pub game_id: String,
    /// When the winning reveal landed.
    #[serde_as(as = "TimestampMilliSeconds<i64>")]
    #[schema(value_type = i64)]
    pub finished_at: SystemTime,
    /// Milliseconds between creation and finish.
    #[serde(rename = "duration")]
    pub duration_ms: u64,
    /// Friendly name of the game.
    pub display_name: String,
    /// Winning team.
    pub winner: Team,
    /// How the game was won.
    pub win_reason: WinReason,
    /// Name of the host.
    pub created_by: String,
    /// Every player who ever joined, with their last seat.
    #[serde(default)]
    #[schema(value_type = Object)]
    pub players: IndexMap<PlayerId, HistoryPlayer>,
}

impl GameHistoryEntry {
    /// History record of `document`, once it has finished with a winner.
    pub fn from_finished(document: &GameDocument) -> Option<Self> {
        if document.status != GameStatus::Finished {
            return None;
        }
        let state = document.game_state.as_ref()?;
        let (winner, win_reason) = state.winner.zip(state.win_reason)?;
        let finished_at = document.finished_at.unwrap_or_else(SystemTime::now);
        let duration = finished_at
            .duration_since(document.created_at)
            .unwrap_or_default();
        let players = document
            .players
            .iter()
            .map(|(id, player)| {
                let seat = HistoryPlayer {
                    name: player.name.clone(),
                    team: player.team,
                    role: player.role,
                };
                (*id, seat)
            })
            .collect();

        Some(Self {
            game_id: document.code.clone(),
            finished_at,
            duration_ms: u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
            display_name: document.display_name.clone(),
            winner,
            win_reason,
            created_by: document.created_by.clone(),
            players,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn document_uses_shared_field_names() {
        let host = Player::new("Ada", SystemTime::UNIX_EPOCH);
        let document = GameDocument::new("ABC234", "PHOENIX", Uuid::nil(), host);
        let value = serde_json::to_value(&document).unwrap();

        assert_eq!(value["displayName"], "PHOENIX");
        assert_eq!(value["status"], "setup");
        assert_eq!(value["createdAt"], 0);
        assert_eq!(value["gameState"], serde_json::Value::Null);
        assert_eq!(value["players"][Uuid::nil().to_string()]["isActive"], true);
    }

    #[test]
    fn missing_or_null_clue_log_decodes_as_empty() {
        let mut value = json!({
            "code": "ABC234",
            "displayName": "EAGLE",
            "createdBy": "Ada",
            "hostId": Uuid::nil(),
            "status": "setup",
            "createdAt": 1_700_000_000_000i64,
            "startingTeam": null,
            "board": null,
            "gameState": null
        });
        let decoded: GameDocument = serde_json::from_value(value.clone()).unwrap();
        assert!(decoded.clue_log.is_empty());
        assert!(decoded.started_at.is_none());

        value["clueLog"] = serde_json::Value::Null;
        let decoded: GameDocument = serde_json::from_value(value).unwrap();
        assert!(decoded.clue_log.is_empty());
    }

    #[test]
    fn guess_records_are_untagged() {
        let reveal = GuessRecord::Reveal {
            card_index: 4,
            word: "BANK".into(),
            result: CardResult::Opponent,
        };
        assert_eq!(
            serde_json::to_value(&reveal).unwrap(),
            json!({"cardIndex": 4, "word": "BANK", "result": "opponent"})
        );

        let passed: GuessRecord = serde_json::from_value(json!({"passed": true})).unwrap();
        assert_eq!(passed, GuessRecord::Passed { passed: true });
    }

    #[test]
    fn win_reason_uses_snake_case() {
        assert_eq!(
            serde_json::to_value(WinReason::AllRevealed).unwrap(),
            json!("all_revealed")
        );
    }

    #[test]
    fn history_is_only_recorded_for_finished_games() {
        let created = SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(60);
        let mut host = Player::new("Ada", created);
        host.team = Some(Team::Red);
        host.role = Some(Role::Spymaster);
        let mut document = GameDocument::new("ABC234", "PHOENIX", Uuid::nil(), host);
        assert!(GameHistoryEntry::from_finished(&document).is_none());

        document.status = GameStatus::Finished;
        document.finished_at = Some(created + std::time::Duration::from_millis(90_500));
        document.game_state = Some(GameState {
            current_turn: Team::Blue,
            phase: Phase::Guess,
            revealed_cards: vec![false; BOARD_SIZE],
            current_clue: None,
            guesses_remaining: 0,
            red_revealed: 0,
            blue_revealed: 0,
            red_total: 9,
            blue_total: 8,
            winner: Some(Team::Red),
            win_reason: Some(WinReason::Assassin),
        });

        let entry = GameHistoryEntry::from_finished(&document).unwrap();
        assert_eq!(entry.duration_ms, 90_500);
        assert_eq!(entry.winner, Team::Red);
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["gameId"], "ABC234");
        assert_eq!(value["duration"], 90_500);
        assert_eq!(value["winReason"], "assassin");
        assert_eq!(value["players"][Uuid::nil().to_string()]["role"], "spymaster");
    }
}
