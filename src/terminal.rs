use std::io::{self, BufRead, Write};

use crate::session::DrillSession;
use crate::shell::BoardShell;
use crate::{DrillBackend, color_name};

/// Clears the screen and moves cursor to top-left.
#[inline]
fn clear_screen() {
    print!("\x1B[2J\x1B[H");
}

/// What the loop should do after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Redraw,
    Quit,
    Usage(&'static str),
    Unknown,
}

/// Apply one line of input to the shell.
///
/// `m <from> <to> [piece]` drops a piece; `f`, `s` and `r` are the board keys.
pub fn handle_command<B: DrillBackend>(shell: &mut BoardShell<B>, input: &str) -> Flow {
    let parts: Vec<&str> = input.split_whitespace().collect();
    let Some(command) = parts.first() else {
        return Flow::Redraw;
    };

    match *command {
        "m" => {
            if parts.len() < 3 {
                return Flow::Usage("Usage: m <from> <to> [promotion]");
            }
            shell.on_piece_drop(parts[1], parts[2], parts.get(3).copied());
            Flow::Redraw
        }
        "f" | "s" | "r" => {
            if let Some(key) = command.chars().next() {
                shell.on_key(key);
            }
            Flow::Redraw
        }
        "p" => Flow::Redraw,
        "q" => Flow::Quit,
        _ => Flow::Unknown,
    }
}

/// Runs the interactive drill on stdin/stdout until `q` or end of input.
pub fn run_interactive_terminal(mut shell: BoardShell<DrillSession>) {
    clear_screen();
    draw_interface(&shell);

    let stdin = io::stdin();
    loop {
        print!("> ");
        if let Err(e) = io::stdout().flush() {
            eprintln!("Failed to flush stdout: {}", e);
            break;
        }

        let mut input = String::new();
        match stdin.lock().read_line(&mut input) {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                eprintln!("Failed to read input: {}", e);
                break;
            }
        }

        match handle_command(&mut shell, &input) {
            Flow::Redraw => {
                clear_screen();
                draw_interface(&shell);
            }
            Flow::Quit => break,
            Flow::Usage(usage) => println!("{usage}"),
            Flow::Unknown => println!("Unknown command"),
        }
    }
}

/// Draws the complete interface: help text, drill status and board.
fn draw_interface(shell: &BoardShell<DrillSession>) {
    println!("♟️  Chess Driller");
    println!();
    println!("Commands: m <from> <to> [promotion] | f (flip) | s (start) | r (reset) | p (refresh) | q (quit)");
    println!();

    if let Err(e) = shell.render(&mut io::stdout()) {
        eprintln!("Failed to draw board: {}", e);
    }

    let session = shell.backend();
    match (session.drill(), session.last_assessment()) {
        (Some(drill), Some(assessment)) => {
            println!(
                "Drill as {}: {} (move {})",
                color_name(drill.player()),
                assessment,
                drill.ply() / 2 + 1
            )
        }
        (None, _) if !session.prefix().is_empty() => {
            println!("Free play: {} moves recorded", session.prefix().len())
        }
        _ => println!("Press s to start drilling"),
    }
}
