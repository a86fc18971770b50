use std::path::PathBuf;

use anyhow::Context;
use chess_driller::chess_com::{self, ChessComClient};
use chess_driller::config::Config;
use chess_driller::repertoire::OpeningDatabase;
use chess_driller::session::DrillSession;
use chess_driller::shell::BoardShell;
use chess_driller::{DrillBackend, parse_color, terminal};
use clap::Parser;
use rand::SeedableRng;
use rand::rngs::StdRng;

#[derive(Parser, Debug)]
#[command(author, version, about = "Drill your opening preparation", long_about = None)]
struct Args {
    /// Config file, created with defaults if missing
    /// (default: chess-driller/config.json in the user config folder)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Preparation folder, overriding the config
    #[arg(long)]
    prep: Option<PathBuf>,

    /// Side to practice: white or black
    #[arg(long, default_value = "white")]
    color: String,

    /// Build the preparation from the configured chess.com users' games instead,
    /// downloading archives not cached yet
    #[arg(long)]
    from_games: bool,

    /// Only use archives already cached, without downloading
    #[arg(long)]
    offline: bool,

    /// Seed for the opponent's choice between prepared replies
    #[arg(long)]
    seed: Option<u64>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_level = if args.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();
    log::info!("Starting chess driller");

    let config_path = args.config.clone().unwrap_or_else(Config::default_path);
    let config = Config::load(&config_path)
        .with_context(|| format!("loading config {}", config_path.display()))?;
    let color = parse_color(&args.color)?;

    let db = if args.from_games {
        if !args.offline {
            let client = ChessComClient::new()?;
            let written =
                chess_com::download_all_games(&client, &config.games_dir, &config.chess_com);
            log::info!("Downloaded {} archives", written);
        }
        OpeningDatabase::load_games(&config.games_dir, &config.chess_com, config.max_plies)
    } else {
        let prep = args.prep.as_ref().unwrap_or(&config.prep_dir);
        OpeningDatabase::load(prep)
            .with_context(|| format!("loading preparation from {}", prep.display()))?
    };

    let rng = match args.seed.or(config.seed) {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };

    let mut session = DrillSession::new(db, rng);
    session.reset(color)?;

    let mut shell = BoardShell::new(session);
    if color != shell.orientation() {
        // Flipping also resets the backend to the flipped color.
        shell.on_key('f');
    }

    terminal::run_interactive_terminal(shell);
    Ok(())
}
