use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::layout::Geometry;

/// Upper bound on points per round; placement cost grows quadratically
pub const MAX_POINTS: u32 = 500;

/// Persisted settings. Missing fields fall back to their defaults so older
/// files keep loading.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub points: u32,
    pub token_size: u32,
    pub padding: u32,
    pub autoplay: bool,
}

impl Default for Config {
    fn default() -> Self {
        let geometry = Geometry::default();
        Self {
            points: 10,
            token_size: geometry.token_size,
            padding: geometry.padding,
            autoplay: false,
        }
    }
}

impl Config {
    /// Pull values a hand-edited file may carry back into playable range
    pub fn sanitized(mut self) -> Self {
        let points = self.points.clamp(1, MAX_POINTS);
        if points != self.points {
            tracing::warn!(points = self.points, clamped = points, "point count out of range");
            self.points = points;
        }
        self
    }

    pub fn geometry(&self) -> Geometry {
        Geometry {
            token_size: self.token_size.max(1),
            padding: self.padding,
        }
    }
}

pub trait ConfigStore {
    fn load(&self) -> Config;
    fn save(&self, cfg: &Config) -> std::io::Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    pub fn new() -> Self {
        let path = if let Some(pd) = ProjectDirs::from("", "", "clearpoints") {
            pd.config_dir().join("config.json")
        } else {
            PathBuf::from("clearpoints_config.json")
        };
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Config {
        match fs::read(&self.path) {
            Ok(bytes) => match serde_json::from_slice::<Config>(&bytes) {
                Ok(cfg) => cfg.sanitized(),
                Err(err) => {
                    tracing::warn!(path = %self.path.display(), %err, "unreadable config, using defaults");
                    Config::default()
                }
            },
            Err(_) => Config::default(),
        }
    }

    fn save(&self, cfg: &Config) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(cfg)?;
        fs::write(&self.path, data)
    }
}
