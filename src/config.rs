use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::DrillError;

/// Per-user folder holding the config file and downloaded data.
pub fn config_dir() -> PathBuf {
    dirs::config_dir().unwrap_or_default().join("chess-driller")
}

/// Downloaded data, next to the config file.
pub fn data_dir() -> PathBuf {
    config_dir().join("data")
}

/// User settings, stored as JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Folder holding `white/` and `black/` preparation PGNs.
    pub prep_dir: PathBuf,
    /// Chess.com usernames for the user
    #[serde(rename = "chess.com")]
    pub chess_com: Vec<String>,
    /// Cached chess.com archives, one subfolder per username.
    pub games_dir: PathBuf,
    /// Plies of each archived game merged into the preparation.
    pub max_plies: usize,
    /// Fixed seed for choosing between prepared replies.
    pub seed: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            prep_dir: PathBuf::from("prep"),
            chess_com: Vec::new(),
            games_dir: data_dir().join("chess.com"),
            max_plies: 16,
            seed: None,
        }
    }
}

impl Config {
    /// Where the config lives unless another file is given.
    pub fn default_path() -> PathBuf {
        config_dir().join("config.json")
    }

    /// Read the config at `path`, writing out the defaults if there is none yet.
    pub fn load(path: &Path) -> Result<Self, DrillError> {
        match fs::read(path) {
            Ok(data) => Ok(serde_json::from_slice(&data)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!("Config file doesn't exist, creating {}", path.display());
                Ok(Self::create_default(path))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn create_default(path: &Path) -> Self {
        let config = Self::default();
        let written = serde_json::to_vec_pretty(&config)
            .map_err(DrillError::from)
            .and_then(|data| {
                if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
                    fs::create_dir_all(dir)?;
                }
                fs::write(path, data)?;
                Ok(())
            });
        if let Err(e) = written {
            log::error!("Failed to write out config file: {}", e);
        }
        config
    }
}
