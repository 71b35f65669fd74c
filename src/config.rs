use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use anyhow::Result;

use crate::protocol::BAUD_RATE;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub camera: CameraConfig,
    pub tracker: TrackerConfig,
    pub serial: SerialConfig,
    pub calibration: CalibrationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub index: u32,
    // Frames are resized to this before detection
    pub width: u32,
    pub height: u32,
    pub warmup_frames: u32,
    pub ready_timeout_secs: u64,
    pub mirror: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub script: String,
    pub python: String,
    pub min_confidence: f32,
    pub max_hands: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    pub port: Option<String>,
    pub baud_rate: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    pub path: String,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            index: 0,
            width: 640,
            height: 480,
            warmup_frames: 10,
            ready_timeout_secs: 10,
            mirror: true,
        }
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            script: "hand_detect.py".to_string(),
            python: ".venv/bin/python".to_string(),
            min_confidence: 0.5,
            max_hands: 2,
        }
    }
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: None,
            baud_rate: BAUD_RATE,
        }
    }
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            path: "calibration.json".to_string(),
        }
    }
}

impl AppConfig {
    pub const PATH: &'static str = "config.json";

    pub fn load() -> Result<Self> {
        Self::load_from(Path::new(Self::PATH))
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let config = if path.exists() {
            let content = fs::read_to_string(path)?;
            // Missing fields fall back to Default thanks to #[serde(default)]
            match serde_json::from_str::<AppConfig>(&content) {
                Ok(c) => {
                    log::info!("Loaded configuration from {}", path.display());
                    c
                }
                Err(e) => {
                    log::warn!("Error parsing config: {}. Loading defaults.", e);
                    Self::default()
                }
            }
        } else {
            log::info!("Configuration file not found. Creating default at {}", path.display());
            Self::default()
        };

        // Save back so new fields show up in the file
        config.save_to(path)?;

        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }
}
