use thiserror::Error;

use crate::{
    dao::models::{
        ActiveClue, BOARD_SIZE, Board, CardColor, CardResult, ClueLogEntry, GameDocument, GameState,
        GuessRecord, Phase, Team, WinReason,
    },
    state::{
        clue::{ClueRejection, validate_clue},
        guess::{GuessError, GuessOutcome, resolve_guess},
        win::{TeamTarget, Victory, evaluate},
    },
};

/// Turn phase derived from a round's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPhase {
    /// The team's spymaster must give a clue.
    Clue(Team),
    /// The team's operatives are guessing.
    Guess(Team),
    /// Terminal: a winner is decided.
    Finished {
        /// Winning team.
        winner: Team,
    },
}

/// Events that can be applied to a round.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnEvent {
    /// Spymaster gives a clue; the raw input is validated by the transition.
    GiveClue {
        /// Raw clue word.
        word: String,
        /// Raw clue number.
        number: f64,
        /// Spymaster display name.
        author: String,
    },
    /// An operative reveals a slot.
    RevealCard {
        /// Slot index.
        index: usize,
    },
    /// Operatives stop guessing.
    EndGuessing,
}

/// Error returned when an event does not apply to the current phase.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("invalid transition: {event:?} cannot be applied while in {from:?}")]
pub struct InvalidTransition {
    /// Phase the round was in.
    pub from: TurnPhase,
    /// Rejected event.
    pub event: TurnEvent,
}

/// A stored round whose arrays do not line up with a full board.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed board: {words} words, {colors} colors and {revealed} reveal flags")]
pub struct MalformedRound {
    /// Length of `board.words`.
    pub words: usize,
    /// Length of `board.colorMap`.
    pub colors: usize,
    /// Length of `gameState.revealedCards`.
    pub revealed: usize,
}

/// Why an event was refused. The input round is untouched in every case.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TurnError {
    /// Wrong phase for the event.
    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),
    /// Clue failed validation.
    #[error(transparent)]
    InvalidClue(#[from] ClueRejection),
    /// Reveal must not be applied.
    #[error(transparent)]
    Guess(#[from] GuessError),
}

/// What a successful transition did, for the caller's bookkeeping and logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnEffect {
    /// A clue was recorded.
    ClueGiven {
        /// Team that received the clue.
        team: Team,
        /// Normalised word.
        word: String,
        /// Guesses granted.
        guesses: u8,
    },
    /// A card was turned over.
    CardRevealed {
        /// Slot index.
        index: usize,
        /// Classification.
        outcome: GuessOutcome,
    },
    /// Guessing ended by choice.
    Passed {
        /// Team that passed.
        team: Team,
    },
}

/// Board, turn state and clue log of the round in play.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Round {
    /// Dealt board.
    pub board: Board,
    /// Turn state.
    pub state: GameState,
    /// Clues given so far.
    pub clue_log: Vec<ClueLogEntry>,
}

/// Next round plus what happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    /// Round after the event.
    pub round: Round,
    /// Effect of the event.
    pub effect: TurnEffect,
}

impl Transition {
    /// Victory reached by this transition, if any.
    pub fn victory(&self) -> Option<Victory> {
        let state = &self.round.state;
        state.winner.zip(state.win_reason).map(|(winner, reason)| Victory { winner, reason })
    }
}

impl Round {
    /// Fresh round on `board`: `starting_team` to give the first clue, nothing revealed.
    pub fn deal(board: Board, starting_team: Team) -> Self {
        let count = |color: CardColor| u8::try_from(board.count(color)).unwrap_or(u8::MAX);
        let state = GameState {
            current_turn: starting_team,
            phase: Phase::Clue,
            revealed_cards: vec![false; board.color_map.len()],
            current_clue: None,
            guesses_remaining: 0,
            red_revealed: 0,
            blue_revealed: 0,
            red_total: count(CardColor::Red),
            blue_total: count(CardColor::Blue),
            winner: None,
            win_reason: None,
        };
        Self {
            board,
            state,
            clue_log: Vec::new(),
        }
    }

    /// The round stored in a document, if a board has been dealt.
    ///
    /// Every writer can patch the arrays independently, so their lengths are checked here
    /// before any transition indexes into them.
    pub fn from_document(document: &GameDocument) -> Result<Option<Self>, MalformedRound> {
        let (Some(board), Some(state)) = (&document.board, &document.game_state) else {
            return Ok(None);
        };
        let lengths = [
            board.words.len(),
            board.color_map.len(),
            state.revealed_cards.len(),
        ];
        if lengths.iter().any(|len| *len != BOARD_SIZE) {
            return Err(MalformedRound {
                words: lengths[0],
                colors: lengths[1],
                revealed: lengths[2],
            });
        }
        Ok(Some(Self {
            board: board.clone(),
            state: state.clone(),
            clue_log: document.clue_log.clone(),
        }))
    }

    /// Write this round back into `document`.
    pub fn store_into(self, document: &mut GameDocument) {
        document.board = Some(self.board);
        document.game_state = Some(self.state);
        document.clue_log = self.clue_log;
    }

    /// Current phase.
    pub fn phase(&self) -> TurnPhase {
        if let Some(winner) = self.state.winner {
            return TurnPhase::Finished { winner };
        }
        match self.state.phase {
            Phase::Clue => TurnPhase::Clue(self.state.current_turn),
            Phase::Guess => TurnPhase::Guess(self.state.current_turn),
        }
    }
}

/// Apply `event` to `round`, returning the next round without touching the input.
pub fn apply(round: &Round, event: TurnEvent) -> Result<Transition, TurnError> {
    let from = round.phase();
    match (from, &event) {
        (TurnPhase::Clue(team), TurnEvent::GiveClue { word, number, author }) => {
            give_clue(round, team, word, *number, author)
        }
        (TurnPhase::Guess(team), TurnEvent::RevealCard { index }) => {
            reveal_card(round, team, *index)
        }
        (TurnPhase::Guess(team), TurnEvent::EndGuessing) => Ok(end_guessing(round, team)),
        (TurnPhase::Clue(_), TurnEvent::RevealCard { .. } | TurnEvent::EndGuessing)
        | (TurnPhase::Guess(_), TurnEvent::GiveClue { .. })
        | (TurnPhase::Finished { .. }, _) => Err(InvalidTransition {
            from,
            event: event.clone(),
        }
        .into()),
    }
}

fn give_clue(
    round: &Round,
    team: Team,
    word: &str,
    number: f64,
    author: &str,
) -> Result<Transition, TurnError> {
    let clue = validate_clue(word, number, &round.board.words)?;
    let guesses = clue.number.guess_allowance();

    let mut next = round.clone();
    next.state.phase = Phase::Guess;
    next.state.guesses_remaining = guesses;
    next.state.current_clue = Some(ActiveClue {
        word: clue.word.clone(),
        number: clue.number.as_raw(),
        given_by: author.to_owned(),
    });
    next.clue_log.push(ClueLogEntry {
        team,
        spymaster: author.to_owned(),
        word: clue.word.clone(),
        number: clue.number.as_raw(),
        guesses: Vec::new(),
    });

    Ok(Transition {
        round: next,
        effect: TurnEffect::ClueGiven {
            team,
            word: clue.word,
            guesses,
        },
    })
}

fn reveal_card(round: &Round, team: Team, index: usize) -> Result<Transition, TurnError> {
    let outcome = resolve_guess(
        index,
        &round.board.color_map,
        &round.state.revealed_cards,
        team,
    )?;

    let mut next = round.clone();
    let state = &mut next.state;
    state.revealed_cards[index] = true;
    match outcome.color {
        CardColor::Red => state.red_revealed += 1,
        CardColor::Blue => state.blue_revealed += 1,
        CardColor::Neutral | CardColor::Assassin => {}
    }
    if let Some(entry) = next.clue_log.last_mut() {
        entry.guesses.push(GuessRecord::Reveal {
            card_index: index,
            word: round.board.words.get(index).cloned().unwrap_or_default(),
            result: outcome.result,
        });
    }

    let victory = match outcome.result {
        CardResult::Assassin => Some(Victory {
            winner: team.other(),
            reason: WinReason::Assassin,
        }),
        CardResult::Correct | CardResult::Opponent | CardResult::Neutral => evaluate(
            &state.revealed_cards,
            &round.board.color_map,
            TeamTarget {
                team: Team::Red,
                total: state.red_total,
            },
            TeamTarget {
                team: Team::Blue,
                total: state.blue_total,
            },
        ),
    };

    match (victory, outcome.result) {
        (Some(victory), _) => finish(state, victory),
        (None, CardResult::Correct) => {
            state.guesses_remaining = state.guesses_remaining.saturating_sub(1);
            if state.guesses_remaining == 0 {
                switch_turn(state);
            }
        }
        (None, CardResult::Opponent | CardResult::Neutral | CardResult::Assassin) => {
            switch_turn(state)
        }
    }

    Ok(Transition {
        round: next,
        effect: TurnEffect::CardRevealed { index, outcome },
    })
}

fn end_guessing(round: &Round, team: Team) -> Transition {
    let mut next = round.clone();
    if let Some(entry) = next.clue_log.last_mut() {
        entry.guesses.push(GuessRecord::Passed { passed: true });
    }
    switch_turn(&mut next.state);
    Transition {
        round: next,
        effect: TurnEffect::Passed { team },
    }
}

fn switch_turn(state: &mut GameState) {
    state.current_turn = state.current_turn.other();
    state.phase = Phase::Clue;
    state.current_clue = None;
    state.guesses_remaining = 0;
}

fn finish(state: &mut GameState, victory: Victory) {
    state.winner = Some(victory.winner);
    state.win_reason = Some(victory.reason);
    state.current_clue = None;
    state.guesses_remaining = 0;
}
