//! Download a player's game archives from chess.com into the local cache that
//! [`OpeningDatabase::load_games`](crate::repertoire::OpeningDatabase::load_games) reads.
//!
//! Archives of a player:
//! GET https://api.chess.com/pub/player/$USER/games/archives
//!
//! All PGNs for a month:
//! GET https://api.chess.com/pub/player/$USER/games/$YEAR/$MONTH/pgn

use std::fs;
use std::path::{Path, PathBuf};

use reqwest::blocking::Client;
use serde::Deserialize;

use crate::DrillError;

pub const API_ROOT: &str = "https://api.chess.com/pub/player";

/// Where archived games come from.
pub trait ArchiveSource {
    /// URLs of the monthly archives of `user`, oldest first.
    fn archives(&self, user: &str) -> Result<Vec<String>, DrillError>;

    /// PGN text of every game at `url`.
    fn pgn(&self, url: &str) -> Result<String, DrillError>;
}

#[derive(Debug, Clone, Deserialize)]
struct Archives {
    archives: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ChessComClient {
    client: Client,
}

impl ChessComClient {
    pub fn new() -> Result<Self, DrillError> {
        // The default user agent gets an HTML challenge page back instead of data.
        let client = Client::builder().user_agent("curl/7.58.0").build()?;
        Ok(Self { client })
    }

    fn get_text(&self, url: &str) -> Result<String, DrillError> {
        log::debug!("GET {}", url);
        let text = self.client.get(url).send()?.error_for_status()?.text()?;
        Ok(text)
    }
}

impl ArchiveSource for ChessComClient {
    fn archives(&self, user: &str) -> Result<Vec<String>, DrillError> {
        let body = self.get_text(&archives_url(user))?;
        let archives: Archives = serde_json::from_str(&body)?;
        Ok(archives.archives)
    }

    fn pgn(&self, url: &str) -> Result<String, DrillError> {
        self.get_text(url)
    }
}

pub fn archives_url(user: &str) -> String {
    format!("{}/{}/games/archives", API_ROOT, user)
}

/// PGN download URL for an archive listed by the archives endpoint.
pub fn pgn_url(archive: &str) -> String {
    if archive.ends_with("/pgn") {
        archive.to_string()
    } else {
        format!("{}/pgn", archive.trim_end_matches('/'))
    }
}

/// Cache file of the `index`th archive of a user.
pub fn archive_path(user_folder: &Path, index: usize) -> PathBuf {
    user_folder.join(format!("{index}.pgn"))
}

/// Download every archive of `users` into `games_dir/<user>/<n>.pgn`.
///
/// Users that already have a cache folder are skipped. Failures are logged and
/// the remaining archives still downloaded. Returns how many files were written.
pub fn download_all_games(
    source: &impl ArchiveSource,
    games_dir: &Path,
    users: &[String],
) -> usize {
    let mut written = 0;
    for user in users {
        let user_folder = games_dir.join(user);
        if user_folder.exists() {
            log::info!("Skipping download, you already have games for {}", user);
            continue;
        }
        let archives = match source.archives(user) {
            Ok(a) => a,
            Err(e) => {
                log::error!("Couldn't get player archives for {}: {}", user, e);
                continue;
            }
        };
        if let Err(e) = fs::create_dir_all(&user_folder) {
            log::error!("Couldn't create {}: {}", user_folder.display(), e);
            continue;
        }
        for (i, archive) in archives.iter().enumerate() {
            let url = pgn_url(archive);
            log::info!("Processing archive: {}", url);
            let pgn = match source.pgn(&url) {
                Ok(pgn) => pgn,
                Err(e) => {
                    log::error!("Downloading {}: {}", url, e);
                    continue;
                }
            };
            match fs::write(archive_path(&user_folder, i), pgn) {
                Ok(()) => written += 1,
                Err(e) => log::error!("Failed to cache {}: {}", url, e),
            }
        }
    }
    written
}
