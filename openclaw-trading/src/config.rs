use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Directory name used under the home directory by default.
pub const DEFAULT_DATA_DIR: &str = ".openclaw";

/// File names of the persisted aggregates.
pub const PORTFOLIO_FILE: &str = "portfolio.json";
pub const FUTURES_FILE: &str = "futures-positions.json";
pub const OPTIONS_FILE: &str = "options-positions.json";
pub const WATCHLIST_FILE: &str = "watchlist.json";

/// Configuration for constructing a `TradingSystem`.
///
/// Each aggregate persists to its own JSON file under `data_dir`. Tests
/// relocate the directory to isolate state.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    pub data_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        Self {
            data_dir: home.join(DEFAULT_DATA_DIR),
        }
    }
}

impl Config {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn portfolio_file(&self) -> PathBuf {
        self.data_dir.join(PORTFOLIO_FILE)
    }

    pub fn futures_file(&self) -> PathBuf {
        self.data_dir.join(FUTURES_FILE)
    }

    pub fn options_file(&self) -> PathBuf {
        self.data_dir.join(OPTIONS_FILE)
    }

    pub fn watchlist_file(&self) -> PathBuf {
        self.data_dir.join(WATCHLIST_FILE)
    }
}
