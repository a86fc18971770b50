use std::fmt;

use rand::Rng;
use shakmaty::Color;
use shakmaty::san::SanPlus;

use crate::repertoire::{NodeId, OpeningTree};

/// How a move relates to the preparation being drilled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveAssessment {
    /// The move was prepared and the line continues.
    InPrep,
    /// The line is complete; nothing further was prepared.
    EndOfPrep,
    /// The move left the preparation.
    Deviated {
        /// Prepared moves at the point of deviation.
        expected: Vec<SanPlus>,
    },
}

impl fmt::Display for MoveAssessment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MoveAssessment::InPrep => f.write_str("in preparation"),
            MoveAssessment::EndOfPrep => f.write_str("end of preparation"),
            MoveAssessment::Deviated { expected } => {
                f.write_str("left preparation, expected")?;
                for (i, san) in expected.iter().enumerate() {
                    let sep = if i == 0 { " " } else { ", " };
                    write!(f, "{sep}{san}")?;
                }
                Ok(())
            }
        }
    }
}

/// Progress of one practice run through a color's opening tree.
///
/// The drill only tracks where in the tree the game is. Move legality and the
/// board itself belong to the session driving it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Drill {
    player: Color,
    node: NodeId,
    ply: usize,
    status: MoveAssessment,
}

impl Drill {
    /// Start after `moves` from the initial position, or `None` if they are not
    /// all prepared.
    pub fn start(tree: &OpeningTree, player: Color, moves: &[SanPlus]) -> Option<Self> {
        let node = tree.find_line(moves)?;
        let status = if tree.is_leaf(node) {
            MoveAssessment::EndOfPrep
        } else {
            MoveAssessment::InPrep
        };
        Some(Self {
            player,
            node,
            ply: moves.len(),
            status,
        })
    }

    #[inline]
    pub fn player(&self) -> Color {
        self.player
    }

    /// Half-moves played since the initial position.
    #[inline]
    pub fn ply(&self) -> usize {
        self.ply
    }

    #[inline]
    pub fn status(&self) -> &MoveAssessment {
        &self.status
    }

    #[inline]
    pub fn still_running(&self) -> bool {
        self.status == MoveAssessment::InPrep
    }

    #[inline]
    pub fn is_player_turn(&self) -> bool {
        let turn = if self.ply % 2 == 0 {
            Color::White
        } else {
            Color::Black
        };
        turn == self.player
    }

    /// Record a move made on the board and judge it against the preparation.
    pub fn apply_move(&mut self, san: &SanPlus, tree: &OpeningTree) -> MoveAssessment {
        if !self.still_running() {
            return self.status.clone();
        }
        match tree.child(self.node, &san.san) {
            Some(child) => self.advance(child, tree),
            None => {
                self.status = MoveAssessment::Deviated {
                    expected: tree.replies(self.node).cloned().collect(),
                }
            }
        }
        self.status.clone()
    }

    /// Pick one of the prepared replies when it is the opponent's turn.
    pub fn make_move(&mut self, tree: &OpeningTree, rng: &mut impl Rng) -> Option<SanPlus> {
        if !self.still_running() || self.is_player_turn() {
            return None;
        }
        let children = tree.children(self.node);
        if children.is_empty() {
            self.status = MoveAssessment::EndOfPrep;
            return None;
        }
        let child = children[rng.random_range(0..children.len())];
        self.advance(child, tree);
        tree.san(child).cloned()
    }

    fn advance(&mut self, child: NodeId, tree: &OpeningTree) {
        self.node = child;
        self.ply += 1;
        self.status = if tree.is_leaf(child) {
            MoveAssessment::EndOfPrep
        } else {
            MoveAssessment::InPrep
        };
    }
}
