use shakmaty::Color;

pub mod chess_com;
pub mod config;
pub mod drill;
mod error;
pub mod repertoire;
pub mod session;
pub mod shell;
pub mod terminal;

pub use error::DrillError;

/// Board placement of the standard starting position, as exchanged with the front end.
pub const STARTING_POSITION: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR";

/// Commands a front end sends to the game backend.
///
/// Abstracts over the real drill session and test doubles, so the
/// presentation shell can be exercised without any chess logic behind it.
/// Positions travel as board placement strings (the first field of a FEN).
pub trait DrillBackend {
    /// Error type for rejected commands.
    type Error: std::fmt::Debug + std::fmt::Display;

    /// Play `from` -> `to`, returning the resulting position.
    ///
    /// `promotion` is a piece code (`"Q"`, `"N"`, ... or a piece name such as
    /// `"wQ"`); it only matters for pawns reaching the last rank.
    fn move_piece(
        &mut self,
        from: &str,
        to: &str,
        promotion: &str,
    ) -> Result<String, Self::Error>;

    /// Start drilling from the moves played so far, returning the resulting position.
    fn start(&mut self) -> Result<String, Self::Error>;

    /// Begin a fresh game with the player on `color`.
    fn reset(&mut self, color: Color) -> Result<(), Self::Error>;
}

/// Lowercase color name used in paths and messages.
#[inline]
pub fn color_name(color: Color) -> &'static str {
    color.fold_wb("white", "black")
}

/// Parse `white`/`black` (or `w`/`b`), ignoring case.
pub fn parse_color(name: &str) -> Result<Color, DrillError> {
    match name.trim().to_ascii_lowercase().as_str() {
        "white" | "w" => Ok(Color::White),
        "black" | "b" => Ok(Color::Black),
        _ => Err(DrillError::InvalidColor(name.to_string())),
    }
}
