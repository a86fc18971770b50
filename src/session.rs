//! The game backend: a real chess game plus the drill against the opening tree.

use rand::rngs::StdRng;
use shakmaty::san::SanPlus;
use shakmaty::uci::UciMove;
use shakmaty::{Chess, Color, Move, Position, Rank, Role, Square};

use crate::drill::{Drill, MoveAssessment};
use crate::repertoire::OpeningDatabase;
use crate::{DrillBackend, DrillError, color_name};

/// Backend state behind the front end's commands.
///
/// Moves played while no drill runs are remembered as the prefix, and a drill
/// started later begins from that point of the preparation.
#[derive(Debug)]
pub struct DrillSession {
    db: OpeningDatabase,
    color: Color,
    game: Chess,
    prefix: Vec<SanPlus>,
    drill: Option<Drill>,
    last_assessment: Option<MoveAssessment>,
    rng: StdRng,
}

impl DrillSession {
    pub fn new(db: OpeningDatabase, rng: StdRng) -> Self {
        Self {
            db,
            color: Color::White,
            game: Chess::default(),
            prefix: Vec::new(),
            drill: None,
            last_assessment: None,
            rng,
        }
    }

    /// The side the player practices.
    #[inline]
    pub fn color(&self) -> Color {
        self.color
    }

    #[inline]
    pub fn drill(&self) -> Option<&Drill> {
        self.drill.as_ref()
    }

    /// Moves played before the current drill.
    #[inline]
    pub fn prefix(&self) -> &[SanPlus] {
        &self.prefix
    }

    /// Verdict on the latest drilled move, if any.
    #[inline]
    pub fn last_assessment(&self) -> Option<&MoveAssessment> {
        self.last_assessment.as_ref()
    }

    /// Board placement of the current position.
    pub fn board_fen(&self) -> String {
        self.game.board().to_string()
    }

    /// Find the legal move for a dropped piece. `Ok(None)` if the drop is illegal.
    fn resolve_move(
        &self,
        from: Square,
        to: Square,
        promotion: &str,
    ) -> Result<Option<Move>, DrillError> {
        let piece = self
            .game
            .board()
            .piece_at(from)
            .ok_or(DrillError::NoPiece(from))?;

        let last_rank = piece.color.fold_wb(Rank::Eighth, Rank::First);
        let promotion =
            (piece.role == Role::Pawn && to.rank() == last_rank).then(|| promotion_role(promotion));

        let uci = UciMove::Normal {
            from,
            to,
            promotion,
        };
        Ok(uci.to_move(&self.game).ok())
    }

    fn play(&mut self, mv: Move) -> SanPlus {
        SanPlus::from_move_and_play_unchecked(&mut self.game, mv)
    }

    /// Let the opponent answer from the preparation if it is their turn.
    fn play_reply(&mut self) {
        let Some(drill) = self.drill.as_mut() else {
            return;
        };
        let Some(reply) = drill.make_move(self.db.graph(self.color), &mut self.rng) else {
            return;
        };
        let status = drill.status().clone();

        match reply.san.to_move(&self.game) {
            Ok(mv) => {
                log::info!("Opponent plays {}", reply);
                self.play(mv);
                if status != MoveAssessment::InPrep {
                    log::info!("Drill finished: {}", status);
                    self.last_assessment = Some(status);
                }
            }
            Err(e) => {
                log::error!("Prepared reply {} is not playable: {}", reply, e);
                self.drill = None;
            }
        }
    }

    fn replay_prefix(&mut self) {
        let mut game = Chess::default();
        for san in &self.prefix {
            match san.san.to_move(&game) {
                Ok(mv) => game.play_unchecked(mv),
                Err(e) => {
                    log::error!("Recorded move {} no longer playable: {}", san, e);
                    break;
                }
            }
        }
        self.game = game;
    }
}

impl DrillBackend for DrillSession {
    type Error = DrillError;

    fn move_piece(&mut self, from: &str, to: &str, promotion: &str) -> Result<String, DrillError> {
        log::info!("Args: {}->{} {}", from, to, promotion);

        let from = parse_square(from)?;
        let to = parse_square(to)?;

        let Some(mv) = self.resolve_move(from, to, promotion)? else {
            log::debug!("Illegal move {}{} ignored", from, to);
            return Ok(self.board_fen());
        };
        let san = self.play(mv);

        match self.drill.as_mut() {
            Some(drill) if drill.still_running() => {
                let assessment = drill.apply_move(&san, self.db.graph(self.color));
                log::info!("{}: {}", san, assessment);
                self.last_assessment = Some(assessment.clone());
                if assessment == MoveAssessment::InPrep {
                    self.play_reply();
                }
            }
            // Finished drills keep the board playable but stop recording.
            Some(_) => {}
            None => self.prefix.push(san),
        }
        Ok(self.board_fen())
    }

    fn start(&mut self) -> Result<String, DrillError> {
        if self.drill.as_ref().is_some_and(Drill::still_running) {
            log::info!("Drill already running");
            return Ok(self.board_fen());
        }
        if self.drill.take().is_some() {
            self.replay_prefix();
        }

        self.drill = self.db.start_drill(self.color, &self.prefix);
        match &self.drill {
            None => log::warn!(
                "Moves so far are not in the {} preparation",
                color_name(self.color)
            ),
            Some(drill) if !drill.still_running() => {
                log::warn!("Nothing prepared after these moves")
            }
            Some(_) => log::info!("Lets start playing as {}!", color_name(self.color)),
        }
        self.last_assessment = self.drill.as_ref().map(|d| d.status().clone());
        self.play_reply();
        Ok(self.board_fen())
    }

    fn reset(&mut self, color: Color) -> Result<(), DrillError> {
        log::info!("Resetting board for {}", color_name(color));
        self.color = color;
        self.game = Chess::default();
        self.prefix.clear();
        self.drill = None;
        self.last_assessment = None;
        Ok(())
    }
}

fn parse_square(name: &str) -> Result<Square, DrillError> {
    name.trim()
        .parse()
        .map_err(|_| DrillError::InvalidSquare(name.to_string()))
}

/// Promotion piece from a piece code; the last character decides so both `"Q"` and
/// `"wQ"` work. Anything unrecognized promotes to a queen.
fn promotion_role(code: &str) -> Role {
    code.chars()
        .last()
        .and_then(|c| Role::from_char(c.to_ascii_lowercase()))
        .filter(|role| matches!(role, Role::Queen | Role::Rook | Role::Bishop | Role::Knight))
        .unwrap_or(Role::Queen)
}
