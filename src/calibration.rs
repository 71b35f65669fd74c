use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::CalibrationError;
use crate::types::{Channel, FingerCurlSet};

/// Which end of the range a capture records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationMode {
    /// Open hand.
    Min,
    /// Closed hand.
    Max,
}

/// Captured curl bounds for one channel. Either side may still be missing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CalibrationEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f32>,
}

impl CalibrationEntry {
    pub fn new(min: f32, max: f32) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
        }
    }

    fn set(&mut self, mode: CalibrationMode, value: f32) {
        match mode {
            CalibrationMode::Min => self.min = Some(value),
            CalibrationMode::Max => self.max = Some(value),
        }
    }

    fn order(&mut self) {
        if let (Some(min), Some(max)) = (self.min, self.max) {
            if min > max {
                self.min = Some(max);
                self.max = Some(min);
            }
        }
    }
}

/// Per-channel calibration, owned by the host session.
///
/// Serialized as `{"thumb": {"min": 0.4, "max": 1.9}, ...}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct CalibrationTable {
    entries: BTreeMap<Channel, CalibrationEntry>,
}

/// Goes through [`CalibrationTable::insert`], so hand-edited or stale blobs
/// still come back with `min <= max`. Unknown channel names are skipped.
impl<'de> Deserialize<'de> for CalibrationTable {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = BTreeMap::<String, CalibrationEntry>::deserialize(deserializer)?;
        let mut table = CalibrationTable::new();
        for (key, entry) in raw {
            match key.parse::<Channel>() {
                Ok(channel) => table.insert(channel, entry),
                Err(e) => log::warn!("Skipping calibration entry: {}", e),
            }
        }
        Ok(table)
    }
}

impl CalibrationTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn get(&self, channel: Channel) -> Option<&CalibrationEntry> {
        self.entries.get(&channel)
    }

    pub fn insert(&mut self, channel: Channel, mut entry: CalibrationEntry) {
        entry.order();
        self.entries.insert(channel, entry);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Channel, &CalibrationEntry)> {
        self.entries.iter()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Records `curls` as the `mode` bound of every channel, then swaps any
    /// entry whose bounds ended up inverted so `min <= max` holds no matter
    /// which pose was captured first.
    pub fn calibrate(&mut self, curls: &FingerCurlSet, mode: CalibrationMode) {
        for (channel, value) in curls.iter() {
            self.entries.entry(channel).or_default().set(mode, *value);
        }
        for entry in self.entries.values_mut() {
            entry.order();
        }
    }
}

/// Flat JSON file holding the calibration table between runs.
#[derive(Debug, Clone)]
pub struct CalibrationStore {
    path: PathBuf,
}

impl CalibrationStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Never fails: a missing or unreadable blob is an empty table.
    pub fn load(&self) -> CalibrationTable {
        if !self.path.exists() {
            log::info!("No calibration at {}, starting uncalibrated", self.path.display());
            return CalibrationTable::new();
        }

        let content = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) => {
                log::warn!("Failed to read calibration {}: {}", self.path.display(), e);
                return CalibrationTable::new();
            }
        };

        match serde_json::from_str::<CalibrationTable>(&content) {
            Ok(table) => {
                log::info!(
                    "Loaded calibration for {} channels from {}",
                    table.len(),
                    self.path.display()
                );
                table
            }
            Err(e) => {
                log::warn!("Error parsing calibration: {}. Starting uncalibrated.", e);
                CalibrationTable::new()
            }
        }
    }

    pub fn save(&self, table: &CalibrationTable) -> Result<(), CalibrationError> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        let content = serde_json::to_string_pretty(table)?;
        fs::write(&self.path, content)?;
        log::info!("Saved calibration to {}", self.path.display());
        Ok(())
    }

    /// Clears `table` and removes the persisted blob. The in-memory table is
    /// cleared even if the file cannot be removed.
    pub fn reset(&self, table: &mut CalibrationTable) -> Result<(), CalibrationError> {
        table.clear();
        match fs::remove_file(&self.path) {
            Ok(()) => {
                log::info!("Removed calibration {}", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
