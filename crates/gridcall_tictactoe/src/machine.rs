//! Replicated game-state machine.
//!
//! Every participant runs its own [`GameMachine`]. Local moves are applied
//! immediately and produce the messages to broadcast; remote messages are
//! replayed through the same validation but never produce messages of their
//! own, so nothing echoes. The `game_over` message carries the sender's final
//! board and overrides whatever a peer computed locally, which is how peers
//! converge on the terminal state.

use super::message::GameMessage;
use super::rules::{apply_move, compute_winner, is_draw};
use super::{Board, GameState, GameStatus, MoveError, Player};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

/// Whether a move must come from the player whose turn it is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnPolicy {
    /// Reject moves by the player not on turn, local or remote.
    #[default]
    Strict,
    /// Accept a move for either mark as long as the square is free.
    Permissive,
}

/// What [`GameMachine::handle_message`] did with an inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handled {
    /// The state changed.
    Applied,
    /// A move arrived after the game ended and was dropped.
    Skipped,
}

/// Applies `message` to `state` and returns the resulting state.
///
/// This is the inbound message handler in pure form: `move` is validated and
/// replayed, `game_over` replaces board and status, `reset` starts over.
///
/// # Errors
///
/// Any [`MoveError`] from validating a `move`; `state` is not affected.
#[instrument(skip(state), fields(kind = message.kind()))]
pub fn reduce(
    state: &GameState,
    message: &GameMessage,
    policy: TurnPolicy,
) -> Result<GameState, MoveError> {
    match message {
        GameMessage::Move { position, player } => play(state, *position, *player, policy),
        GameMessage::GameOver {
            winner,
            final_board,
        } => Ok(game_over(state, *winner, final_board.clone())),
        GameMessage::Reset => Ok(GameState::new()),
    }
}

fn play(
    state: &GameState,
    position: usize,
    player: Player,
    policy: TurnPolicy,
) -> Result<GameState, MoveError> {
    if state.is_game_over() {
        return Err(MoveError::GameOver);
    }
    if policy == TurnPolicy::Strict && player != state.current_player() {
        return Err(MoveError::WrongPlayer {
            expected: state.current_player(),
            got: player,
        });
    }

    let board = apply_move(state.board(), position, player)?;
    let winner = compute_winner(&board);
    let status = match winner {
        Some(mark) => GameStatus::Won(mark),
        None if is_draw(&board, winner) => GameStatus::Draw,
        None => GameStatus::InProgress,
    };

    // The turn passes even on the final move; nothing can be played after it.
    Ok(GameState::from_parts(board, player.opponent(), status))
}

fn game_over(state: &GameState, winner: Option<Player>, final_board: Board) -> GameState {
    let status = match winner {
        Some(player) => GameStatus::Won(player),
        None => GameStatus::Draw,
    };
    GameState::from_parts(final_board, state.current_player(), status)
}

/// Owner of one participant's copy of the game.
#[derive(Debug, Clone, Default)]
pub struct GameMachine {
    state: GameState,
    policy: TurnPolicy,
}

impl GameMachine {
    /// Creates a machine in the initial state.
    #[instrument]
    pub fn new(policy: TurnPolicy) -> Self {
        Self {
            state: GameState::new(),
            policy,
        }
    }

    /// Returns the current state.
    pub fn state(&self) -> &GameState {
        &self.state
    }

    /// Returns the turn policy.
    pub fn policy(&self) -> TurnPolicy {
        self.policy
    }

    /// Applies a move made by this participant.
    ///
    /// Returns the messages to publish, in order: the `move` itself, then a
    /// `game_over` with the final board if the move ended the game.
    ///
    /// # Errors
    ///
    /// [`MoveError::GameOver`] once the game has ended, a placement error for
    /// a bad square, or [`MoveError::WrongPlayer`] out of turn under
    /// [`TurnPolicy::Strict`]. The state is unchanged on error.
    #[instrument(skip(self))]
    pub fn apply_local_move(
        &mut self,
        position: usize,
        player: Player,
    ) -> Result<Vec<GameMessage>, MoveError> {
        let next = play(&self.state, position, player, self.policy).inspect_err(|e| {
            debug!(error = %e, "Local move rejected");
        })?;
        self.state = next;

        let mut outbound = vec![GameMessage::Move { position, player }];
        if self.state.is_game_over() {
            info!(status = ?self.state.status(), "Game finished by local move");
            outbound.push(GameMessage::GameOver {
                winner: self.state.winner(),
                final_board: self.state.board().clone(),
            });
        }
        Ok(outbound)
    }

    /// Replays a move received from a peer. Never produces messages.
    ///
    /// # Errors
    ///
    /// Same as [`apply_local_move`](Self::apply_local_move).
    #[instrument(skip(self))]
    pub fn apply_remote_move(&mut self, position: usize, player: Player) -> Result<(), MoveError> {
        self.state = play(&self.state, position, player, self.policy)?;
        if self.state.is_game_over() {
            debug!(status = ?self.state.status(), "Remote move ended the game");
        }
        Ok(())
    }

    /// Adopts a peer's terminal state, whatever the local state is.
    #[instrument(skip(self, final_board))]
    pub fn apply_remote_game_over(&mut self, winner: Option<Player>, final_board: Board) {
        if self.state.is_game_over() && self.state.board() != &final_board {
            warn!("Local terminal board differs from peer's; adopting peer's");
        }
        self.state = game_over(&self.state, winner, final_board);
    }

    /// Returns to the initial state. Idempotent.
    #[instrument(skip(self))]
    pub fn reset(&mut self) {
        self.state = GameState::new();
    }

    /// Resets and returns the message announcing it.
    pub fn reset_local(&mut self) -> GameMessage {
        self.reset();
        GameMessage::Reset
    }

    /// Dispatches a message received from a peer.
    ///
    /// A `move` that arrives after the game has ended is skipped rather than
    /// rejected: it is expected traffic once a `game_over` has crossed it.
    ///
    /// # Errors
    ///
    /// A [`MoveError`] when a `move` fails validation.
    #[instrument(skip(self), fields(kind = message.kind()))]
    pub fn handle_message(&mut self, message: &GameMessage) -> Result<Handled, MoveError> {
        if matches!(message, GameMessage::Move { .. }) && self.state.is_game_over() {
            debug!("Ignoring move received after game over");
            return Ok(Handled::Skipped);
        }
        self.state = reduce(&self.state, message, self.policy)?;
        Ok(Handled::Applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Square;

    use crate::Player::{O, X};

    #[test]
    fn local_move_emits_move_only_while_in_progress() {
        let mut machine = GameMachine::default();
        let outbound = machine.apply_local_move(4, X).unwrap();
        assert_eq!(
            outbound,
            vec![GameMessage::Move {
                position: 4,
                player: X
            }]
        );
        assert_eq!(machine.state().current_player(), O);
    }

    #[test]
    fn remote_move_never_emits() {
        let mut machine = GameMachine::default();
        machine.apply_remote_move(0, X).unwrap();
        assert_eq!(machine.state().board().get(0), Some(Square::Occupied(X)));
        assert_eq!(machine.state().current_player(), O);
    }

    #[test]
    fn strict_policy_rejects_out_of_turn() {
        let mut machine = GameMachine::new(TurnPolicy::Strict);
        let before = machine.state().clone();
        let out_of_turn = Err(MoveError::WrongPlayer {
            expected: X,
            got: O,
        });
        assert_eq!(machine.apply_local_move(4, O).map(|_| ()), out_of_turn);
        assert_eq!(machine.apply_remote_move(4, O), out_of_turn);
        assert_eq!(machine.state(), &before);
    }

    #[test]
    fn permissive_policy_accepts_either_mark() {
        let mut machine = GameMachine::new(TurnPolicy::Permissive);
        machine.apply_remote_move(4, O).unwrap();
        machine.apply_remote_move(0, O).unwrap();
        // The turn follows the mover, not a strict alternation.
        assert_eq!(machine.state().current_player(), X);
        assert_eq!(machine.state().board().occupied(), 2);
    }

    #[test]
    fn winning_move_advances_turn_and_emits_game_over() {
        let mut machine = GameMachine::default();
        for (pos, player) in [(0, X), (3, O), (1, X), (4, O)] {
            machine.apply_local_move(pos, player).unwrap();
        }
        let outbound = machine.apply_local_move(2, X).unwrap();
        assert_eq!(outbound.len(), 2);
        assert_eq!(
            outbound[0],
            GameMessage::Move {
                position: 2,
                player: X
            }
        );
        assert_eq!(
            outbound[1],
            GameMessage::GameOver {
                winner: Some(X),
                final_board: machine.state().board().clone(),
            }
        );
        assert_eq!(machine.state().current_player(), O);
        assert_eq!(machine.state().winner(), Some(X));
    }

    #[test]
    fn remote_game_over_overwrites_in_progress_state() {
        let mut machine = GameMachine::default();
        machine.apply_local_move(8, X).unwrap();

        let final_board = Board::from_cells([
            Some(O),
            Some(O),
            Some(O),
            Some(X),
            Some(X),
            None,
            None,
            None,
            Some(X),
        ]);
        machine.apply_remote_game_over(Some(O), final_board.clone());

        assert!(machine.state().is_game_over());
        assert_eq!(machine.state().winner(), Some(O));
        assert_eq!(machine.state().board(), &final_board);
        assert_eq!(machine.state().current_player(), O);
    }

    #[test]
    fn remote_game_over_without_winner_is_draw() {
        let mut machine = GameMachine::default();
        machine.apply_remote_game_over(None, Board::new());
        assert_eq!(machine.state().status(), GameStatus::Draw);
        assert_eq!(machine.state().winner(), None);
    }

    #[test]
    fn adopted_draw_on_open_board_survives_serde() {
        let mut machine = GameMachine::default();
        machine.apply_local_move(4, X).unwrap();
        let board = machine.state().board().clone();
        machine.apply_remote_game_over(None, board);

        let json = serde_json::to_string(machine.state()).unwrap();
        let back: GameState = serde_json::from_str(&json).unwrap();
        assert_eq!(&back, machine.state());
        assert_eq!(back.status(), GameStatus::Draw);
        assert_eq!(back.board().occupied(), 1);
    }

    #[test]
    fn handle_message_skips_moves_after_game_over() {
        let mut machine = GameMachine::default();
        machine.apply_remote_game_over(Some(X), Board::new());
        let before = machine.state().clone();
        assert_eq!(
            machine.handle_message(&GameMessage::Move {
                position: 4,
                player: O
            }),
            Ok(Handled::Skipped)
        );
        assert_eq!(machine.state(), &before);
    }

    #[test]
    fn reset_local_returns_reset_message() {
        let mut machine = GameMachine::default();
        machine.apply_local_move(4, X).unwrap();
        assert_eq!(machine.reset_local(), GameMessage::Reset);
        assert_eq!(machine.state(), &GameState::new());
    }

    #[test]
    fn reduce_leaves_input_state_alone() {
        let state = GameState::new();
        let message = GameMessage::Move {
            position: 1,
            player: X,
        };
        let next = reduce(&state, &message, TurnPolicy::Strict).unwrap();
        assert_eq!(state, GameState::new());
        assert_eq!(next.board().get(1), Some(Square::Occupied(X)));
    }
}
