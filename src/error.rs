use std::io;

use shakmaty::Square;

/// Errors surfaced by the drill backend and its loaders.
#[derive(Debug, thiserror::Error)]
pub enum DrillError {
    /// A square identifier sent by the front end could not be parsed.
    #[error("invalid square notation: '{0}'")]
    InvalidSquare(String),

    /// A move was requested from an empty square.
    #[error("no piece on {0}")]
    NoPiece(Square),

    /// A color name other than white/black.
    #[error("invalid color: '{0}'")]
    InvalidColor(String),

    #[error("malformed PGN: {0}")]
    Pgn(&'static str),

    #[error("failed to read input: {0}")]
    Io(#[from] io::Error),

    #[error("chess.com request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid config: {0}")]
    Config(#[from] serde_json::Error),
}
