//! Hand landmark sources.
//!
//! The landmark model itself is external. [`SubprocessTracker`] runs a
//! MediaPipe hand landmarker in a Python child process and talks to it over
//! stdin/stdout; [`SimulatedTracker`] fabricates a hand that opens and closes
//! so the rest of the pipeline can run without a camera or model.

use anyhow::{bail, Context, Result};
use image::{ImageBuffer, Rgb};
use serde::Deserialize;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

use crate::config::TrackerConfig;
use crate::types::landmarks::*;
use crate::types::{Hand, Landmark, HAND_LANDMARK_COUNT};

pub trait LandmarkSource {
    fn name(&self) -> String;

    /// Hands found in `frame`. `timestamp_ms` must increase between calls.
    fn detect(&mut self, frame: &ImageBuffer<Rgb<u8>, Vec<u8>>, timestamp_ms: u64) -> Result<Vec<Hand>>;
}

#[derive(Deserialize, Debug)]
struct HandJson {
    #[serde(default)]
    handedness: Option<String>,
    #[serde(default = "default_score")]
    score: f32,
    landmarks: Vec<Landmark>,
}

fn default_score() -> f32 {
    1.0
}

#[derive(Deserialize, Debug)]
struct DetectionResult {
    #[serde(default)]
    hands: Vec<HandJson>,
    #[serde(default)]
    error: Option<String>,
}

/// Size of the per-frame header sent ahead of the pixels.
pub const FRAME_HEADER_LEN: usize = 20;

/// `width`, `height`, `channels` (u32 LE) then `timestamp_ms` (u64 LE).
pub fn frame_header(width: u32, height: u32, timestamp_ms: u64) -> [u8; FRAME_HEADER_LEN] {
    let mut header = [0u8; FRAME_HEADER_LEN];
    header[0..4].copy_from_slice(&width.to_le_bytes());
    header[4..8].copy_from_slice(&height.to_le_bytes());
    header[8..12].copy_from_slice(&3u32.to_le_bytes());
    header[12..20].copy_from_slice(&timestamp_ms.to_le_bytes());
    header
}

/// MediaPipe hand landmarker in a Python subprocess.
///
/// The bridge is `hand_detect.py` at the crate root (`tracker.script` in
/// config.json). It prints `READY` once the model is loaded. Per frame it
/// receives a [`frame_header`] and the raw RGB bytes, and answers with one
/// JSON line: `{"hands": [{"handedness": "Right", "score": 0.97,
/// "landmarks": [{"x": .., "y": .., "z": ..}, ...]}]}`, or
/// `{"hands": [], "error": ".."}`.
pub struct SubprocessTracker {
    process: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    min_confidence: f32,
}

impl SubprocessTracker {
    pub fn spawn(config: &TrackerConfig) -> Result<Self> {
        let script = Path::new(&config.script);
        let python = Path::new(&config.python);
        if !script.exists() {
            bail!(
                "Hand detection script not found at {:?}; point tracker.script at hand_detect.py",
                script
            );
        }
        if !python.exists() {
            bail!(
                "Python interpreter not found at {:?}. Run: python3 -m venv .venv && .venv/bin/pip install mediapipe numpy",
                python
            );
        }

        log::info!("Starting MediaPipe hand detector subprocess...");
        let mut process = Command::new(python)
            .arg(script)
            .arg("--max-hands")
            .arg(config.max_hands.to_string())
            .arg("--min-confidence")
            .arg(config.min_confidence.to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .context("Failed to start hand detector subprocess")?;

        let stdin = process.stdin.take().context("Failed to get detector stdin")?;
        let stdout = process.stdout.take().context("Failed to get detector stdout")?;
        let mut stdout = BufReader::new(stdout);

        let mut ready = String::new();
        stdout.read_line(&mut ready)?;
        if ready.trim() != "READY" {
            bail!("Hand detector did not signal ready, got: {:?}", ready);
        }
        log::info!("MediaPipe hand detector ready");

        Ok(Self {
            process,
            stdin,
            stdout,
            min_confidence: config.min_confidence.clamp(0.0, 1.0),
        })
    }
}

impl LandmarkSource for SubprocessTracker {
    fn name(&self) -> String {
        "MediaPipe (subprocess)".to_string()
    }

    fn detect(&mut self, frame: &ImageBuffer<Rgb<u8>, Vec<u8>>, timestamp_ms: u64) -> Result<Vec<Hand>> {
        self.stdin
            .write_all(&frame_header(frame.width(), frame.height(), timestamp_ms))?;
        self.stdin.write_all(frame.as_raw())?;
        self.stdin.flush()?;

        let mut response = String::new();
        if self.stdout.read_line(&mut response)? == 0 {
            bail!("Hand detector exited");
        }
        let result: DetectionResult = serde_json::from_str(&response)
            .with_context(|| format!("Failed to parse detector response: {}", response.trim()))?;

        if let Some(error) = result.error {
            log::warn!("Hand detector error: {}", error);
            return Ok(Vec::new());
        }

        Ok(hands_from_json(result.hands, self.min_confidence))
    }
}

fn hands_from_json(hands: Vec<HandJson>, min_confidence: f32) -> Vec<Hand> {
    hands
        .into_iter()
        .filter(|h| h.score >= min_confidence)
        .filter_map(|h| match Hand::try_from(h.landmarks.as_slice()) {
            Ok(mut hand) => {
                hand.handedness = h.handedness;
                hand.score = h.score;
                Some(hand)
            }
            Err(e) => {
                log::warn!("Dropping detected hand: {}", e);
                None
            }
        })
        .collect()
}

impl Drop for SubprocessTracker {
    fn drop(&mut self) {
        let _ = self.process.kill();
        let _ = self.process.wait();
    }
}

/// A right hand that slowly opens and closes.
pub struct SimulatedTracker {
    frame_count: u32,
}

impl SimulatedTracker {
    pub fn new() -> Self {
        Self { frame_count: 0 }
    }
}

impl Default for SimulatedTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl LandmarkSource for SimulatedTracker {
    fn name(&self) -> String {
        "Simulated hand".to_string()
    }

    fn detect(&mut self, _frame: &ImageBuffer<Rgb<u8>, Vec<u8>>, _timestamp_ms: u64) -> Result<Vec<Hand>> {
        self.frame_count += 1;
        let t = self.frame_count as f32 * 0.05;
        let openness = (t.sin() + 1.0) / 2.0;
        Ok(vec![simulated_hand(openness).with_handedness("Right", 1.0)])
    }
}

fn lerp(a: Landmark, b: Landmark, t: f32) -> Landmark {
    Landmark::new(
        a.x + (b.x - a.x) * t,
        a.y + (b.y - a.y) * t,
        a.z + (b.z - a.z) * t,
    )
}

/// Synthetic hand geometry. `openness` 1.0 is a flat open hand, 0.0 a fist.
pub fn simulated_hand(openness: f32) -> Hand {
    let openness = openness.clamp(0.0, 1.0);
    let mut pts = [Landmark::default(); HAND_LANDMARK_COUNT];

    pts[WRIST] = Landmark::flat(0.5, 0.9);
    pts[THUMB_CMC] = Landmark::flat(0.42, 0.82);
    pts[THUMB_MCP] = Landmark::flat(0.36, 0.75);
    let thumb_tucked = Landmark::new(0.52, 0.70, -0.02);
    let thumb_out = Landmark::flat(0.24, 0.60);
    pts[THUMB_TIP] = lerp(thumb_tucked, thumb_out, openness);
    pts[THUMB_IP] = lerp(pts[THUMB_MCP], pts[THUMB_TIP], 0.5);

    let columns = [
        (INDEX_FINGER_MCP, 0.44),
        (MIDDLE_FINGER_MCP, 0.50),
        (RING_FINGER_MCP, 0.56),
        (PINKY_MCP, 0.62),
    ];
    for (mcp, x) in columns {
        let base = Landmark::flat(x, 0.6);
        let curled = Landmark::new(x, 0.70, -0.03);
        let extended = Landmark::flat(x, 0.30);
        let tip = lerp(curled, extended, openness);
        pts[mcp] = base;
        pts[mcp + 1] = lerp(base, tip, 0.4);
        pts[mcp + 2] = lerp(base, tip, 0.7);
        pts[mcp + 3] = tip;
    }

    Hand::new(pts)
}
