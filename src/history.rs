use chrono::{DateTime, Local};
use itertools::{Itertools, MinMaxResult};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::app_dirs::AppDirs;
use crate::session::{GameSession, Phase};

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("history file: {0}")]
    Io(#[from] std::io::Error),
    #[error("history format: {0}")]
    Csv(#[from] csv::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display)]
#[serde(rename_all = "lowercase")]
pub enum RoundOutcome {
    Completed,
    Failed,
}

/// One finished round, as stored in the CSV log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundRecord {
    pub finished_at: DateTime<Local>,
    pub points: u32,
    pub elapsed_secs: f64,
    pub outcome: RoundOutcome,
    pub autoplay: bool,
}

impl RoundRecord {
    /// Record for a session that just reached a terminal phase
    pub fn from_session(session: &GameSession) -> Option<Self> {
        let outcome = match session.phase() {
            Phase::Completed => RoundOutcome::Completed,
            Phase::Failed => RoundOutcome::Failed,
            _ => return None,
        };
        Some(Self {
            finished_at: Local::now(),
            points: session.total_tokens(),
            elapsed_secs: session.elapsed(),
            outcome,
            autoplay: session.autoplay_assisted(),
        })
    }

    /// Completed without any autoplay clicks
    pub fn is_manual_clear(&self) -> bool {
        self.outcome == RoundOutcome::Completed && !self.autoplay
    }
}

/// Append-only CSV log of finished rounds
#[derive(Debug, Clone)]
pub struct HistoryLog {
    path: PathBuf,
}

impl HistoryLog {
    pub fn new() -> Option<Self> {
        AppDirs::history_path().map(|path| Self { path })
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn append(&self, record: &RoundRecord) -> Result<(), HistoryError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        // If the log doesn't exist yet we need to emit a header
        let needs_header = !self.path.exists();
        let file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(needs_header)
            .from_writer(file);
        writer.serialize(record)?;
        writer.flush()?;
        Ok(())
    }

    pub fn load(&self) -> Result<Vec<RoundRecord>, HistoryError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let mut reader = csv::Reader::from_path(&self.path)?;
        let records = reader.deserialize().collect::<Result<Vec<RoundRecord>, _>>()?;
        Ok(records)
    }
}

/// Aggregates for one point count
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistorySummary {
    pub rounds: usize,
    pub cleared: usize,
    pub best_secs: Option<f64>,
    pub worst_secs: Option<f64>,
    pub average_secs: Option<f64>,
}

pub fn summarize(records: &[RoundRecord], points: u32) -> HistorySummary {
    let matching = records.iter().filter(|r| r.points == points).collect_vec();
    let times = matching
        .iter()
        .filter(|r| r.is_manual_clear())
        .map(|r| r.elapsed_secs)
        .collect_vec();

    let (best_secs, worst_secs) = match times.iter().minmax_by(|a, b| a.total_cmp(b)) {
        MinMaxResult::NoElements => (None, None),
        MinMaxResult::OneElement(t) => (Some(*t), Some(*t)),
        MinMaxResult::MinMax(lo, hi) => (Some(*lo), Some(*hi)),
    };
    let average_secs =
        (!times.is_empty()).then(|| times.iter().sum::<f64>() / times.len() as f64);

    HistorySummary {
        rounds: matching.len(),
        cleared: times.len(),
        best_secs,
        worst_secs,
        average_secs,
    }
}
