use std::io::{self, Write};

use shakmaty::{Board, Color, File, Rank, Square};

use crate::{DrillBackend, STARTING_POSITION, color_name};

/// Promotion code sent when the front end supplies none.
pub const DEFAULT_PROMOTION: &str = "Q";

/// Presentation shell around a [`DrillBackend`].
///
/// Holds only what is on screen: the position string last returned by the
/// backend and which side is at the bottom. Backend failures leave the display
/// untouched.
#[derive(Debug)]
pub struct BoardShell<B> {
    backend: B,
    position: String,
    orientation: Color,
}

impl<B: DrillBackend> BoardShell<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            position: STARTING_POSITION.to_string(),
            orientation: Color::White,
        }
    }

    /// Position currently displayed.
    #[inline]
    pub fn position(&self) -> &str {
        &self.position
    }

    #[inline]
    pub fn orientation(&self) -> Color {
        self.orientation
    }

    #[inline]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// A piece was dragged from `from` to `to`.
    pub fn on_piece_drop(&mut self, from: &str, to: &str, piece: Option<&str>) {
        let promotion = piece.unwrap_or(DEFAULT_PROMOTION);
        match self.backend.move_piece(from, to, promotion) {
            Ok(position) => self.position = position,
            Err(e) => log::warn!("move_piece {}->{} failed: {}", from, to, e),
        }
    }

    /// Session control keys: `f` flips, `s` starts a drill, `r` resets.
    pub fn on_key(&mut self, key: char) {
        match key {
            'f' => {
                self.orientation = !self.orientation;
                if let Err(e) = self.backend.reset(self.orientation) {
                    log::warn!("reset failed: {}", e);
                }
            }
            's' => match self.backend.start() {
                Ok(position) => self.position = position,
                Err(e) => log::warn!("start failed: {}", e),
            },
            'r' => {
                // The display resets without waiting on the backend.
                self.position = STARTING_POSITION.to_string();
                if let Err(e) = self.backend.reset(self.orientation) {
                    log::warn!("reset failed: {}", e);
                }
            }
            _ => log::debug!("Unsupported key: {:?}", key),
        }
    }

    /// Draw the displayed position from the current orientation.
    pub fn render(&self, w: &mut impl Write) -> io::Result<()> {
        let board = match Board::from_ascii_board_fen(self.position.as_bytes()) {
            Ok(board) => board,
            Err(_) => {
                writeln!(w, "{}", self.position)?;
                return w.flush();
            }
        };

        let flipped = self.orientation == Color::Black;
        let mut ranks = Rank::ALL;
        let mut files = File::ALL;
        if flipped {
            files.reverse();
        } else {
            ranks.reverse();
        }

        for rank in ranks {
            write!(w, " {} ", rank.char())?;
            for file in files {
                match board.piece_at(Square::from_coords(file, rank)) {
                    Some(piece) => write!(w, " {} ", piece.char())?,
                    None => write!(w, " · ")?,
                }
            }
            writeln!(w)?;
        }
        write!(w, "   ")?;
        for file in files {
            write!(w, " {} ", file.char())?;
        }
        writeln!(w)?;
        writeln!(w, "   {} to play at the bottom", color_name(self.orientation))?;
        w.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        MovePiece(String, String, String),
        Start,
        Reset(Color),
    }

    /// Backend double that records calls and answers with a fixed position.
    #[derive(Debug, Default)]
    struct RecordingBackend {
        calls: Vec<Call>,
        response: String,
        fail: bool,
    }

    impl RecordingBackend {
        fn answering(response: &str) -> Self {
            Self {
                response: response.to_string(),
                ..Self::default()
            }
        }

        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        fn answer(&self) -> Result<String, String> {
            if self.fail {
                Err("backend unavailable".to_string())
            } else {
                Ok(self.response.clone())
            }
        }
    }

    impl DrillBackend for RecordingBackend {
        type Error = String;

        fn move_piece(&mut self, from: &str, to: &str, promotion: &str) -> Result<String, String> {
            self.calls.push(Call::MovePiece(
                from.to_string(),
                to.to_string(),
                promotion.to_string(),
            ));
            self.answer()
        }

        fn start(&mut self) -> Result<String, String> {
            self.calls.push(Call::Start);
            self.answer()
        }

        fn reset(&mut self, color: Color) -> Result<(), String> {
            self.calls.push(Call::Reset(color));
            self.answer().map(|_| ())
        }
    }

    const AFTER_E4: &str = "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR";

    fn render_to_string<B: DrillBackend>(shell: &BoardShell<B>) -> String {
        let mut buf = Vec::new();
        shell
            .render(&mut buf)
            .expect("rendering to buffer should succeed");
        String::from_utf8(buf).expect("output should be valid UTF-8")
    }

    #[test]
    fn test_initial_state() {
        let shell = BoardShell::new(RecordingBackend::default());
        assert_eq!(shell.position(), STARTING_POSITION);
        assert_eq!(shell.orientation(), Color::White);
        assert!(shell.backend().calls.is_empty());
    }

    #[test]
    fn test_drop_defaults_promotion_to_queen() {
        let mut shell = BoardShell::new(RecordingBackend::answering(AFTER_E4));

        shell.on_piece_drop("e2", "e4", None);

        assert_eq!(
            shell.backend().calls,
            vec![Call::MovePiece("e2".into(), "e4".into(), "Q".into())]
        );
        assert_eq!(shell.position(), AFTER_E4);
    }

    #[test]
    fn test_drop_forwards_piece_code() {
        let mut shell = BoardShell::new(RecordingBackend::answering(AFTER_E4));

        shell.on_piece_drop("b7", "b8", Some("wN"));

        assert_eq!(
            shell.backend().calls,
            vec![Call::MovePiece("b7".into(), "b8".into(), "wN".into())]
        );
    }

    #[test]
    fn test_drop_replaces_position_unconditionally() {
        let mut shell = BoardShell::new(RecordingBackend::answering("not a board"));
        shell.on_piece_drop("e2", "e4", None);
        assert_eq!(shell.position(), "not a board");
    }

    #[test]
    fn test_failed_call_leaves_display() {
        let mut shell = BoardShell::new(RecordingBackend::failing());

        shell.on_piece_drop("e2", "e4", None);
        shell.on_key('s');

        assert_eq!(shell.position(), STARTING_POSITION);
        assert_eq!(shell.backend().calls.len(), 2);
    }

    #[test]
    fn test_flip_toggles_and_resets_with_new_color() {
        let mut shell = BoardShell::new(RecordingBackend::answering(AFTER_E4));
        shell.on_piece_drop("e2", "e4", None);

        shell.on_key('f');
        assert_eq!(shell.orientation(), Color::Black);
        shell.on_key('f');
        assert_eq!(shell.orientation(), Color::White);

        let resets: Vec<_> = shell.backend().calls[1..].to_vec();
        assert_eq!(resets, vec![Call::Reset(Color::Black), Call::Reset(Color::White)]);
        // Flipping leaves the displayed position alone.
        assert_eq!(shell.position(), AFTER_E4);
    }

    #[test]
    fn test_start_updates_position_only() {
        let mut shell = BoardShell::new(RecordingBackend::answering(AFTER_E4));
        shell.on_key('f');

        shell.on_key('s');

        assert_eq!(shell.position(), AFTER_E4);
        assert_eq!(shell.orientation(), Color::Black);
        assert_eq!(shell.backend().calls.last(), Some(&Call::Start));
    }

    #[test]
    fn test_reset_restores_layout_even_if_backend_fails() {
        let mut shell = BoardShell::new(RecordingBackend::failing());
        shell.position = AFTER_E4.to_string();
        shell.orientation = Color::Black;

        shell.on_key('r');

        assert_eq!(shell.position(), STARTING_POSITION);
        assert_eq!(shell.orientation(), Color::Black);
        assert_eq!(shell.backend().calls, vec![Call::Reset(Color::Black)]);
    }

    #[test]
    fn test_unknown_key_ignored() {
        let mut shell = BoardShell::new(RecordingBackend::default());
        shell.on_key('x');
        assert!(shell.backend().calls.is_empty());
    }

    #[test]
    fn test_render_white_orientation() {
        let shell = BoardShell::new(RecordingBackend::default());
        let output = render_to_string(&shell);
        let lines: Vec<&str> = output.lines().collect();

        assert_eq!(lines[0], " 8  r  n  b  q  k  b  n  r ");
        assert_eq!(lines[7], " 1  R  N  B  Q  K  B  N  R ");
        assert_eq!(lines[8], "    a  b  c  d  e  f  g  h ");
    }

    #[test]
    fn test_render_black_orientation() {
        let mut shell = BoardShell::new(RecordingBackend::default());
        shell.on_key('f');
        let output = render_to_string(&shell);
        let lines: Vec<&str> = output.lines().collect();

        assert_eq!(lines[0], " 1  R  N  B  K  Q  B  N  R ");
        assert_eq!(lines[7], " 8  r  n  b  k  q  b  n  r ");
        assert_eq!(lines[8], "    h  g  f  e  d  c  b  a ");
    }

    #[test]
    fn test_render_unparsable_position_raw() {
        let mut shell = BoardShell::new(RecordingBackend::answering("garbage"));
        shell.on_key('s');
        assert_eq!(render_to_string(&shell), "garbage\n");
    }
}
