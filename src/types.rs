use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Index, IndexMut};
use std::str::FromStr;

use crate::error::CurlError;

/// Number of landmarks in a tracked hand (MediaPipe hand model).
pub const HAND_LANDMARK_COUNT: usize = 21;

/// Landmark indices in the MediaPipe hand model.
#[allow(dead_code)]
pub mod landmarks {
    pub const WRIST: usize = 0;
    pub const THUMB_CMC: usize = 1;
    pub const THUMB_MCP: usize = 2;
    pub const THUMB_IP: usize = 3;
    pub const THUMB_TIP: usize = 4;
    pub const INDEX_FINGER_MCP: usize = 5;
    pub const INDEX_FINGER_PIP: usize = 6;
    pub const INDEX_FINGER_DIP: usize = 7;
    pub const INDEX_FINGER_TIP: usize = 8;
    pub const MIDDLE_FINGER_MCP: usize = 9;
    pub const MIDDLE_FINGER_PIP: usize = 10;
    pub const MIDDLE_FINGER_DIP: usize = 11;
    pub const MIDDLE_FINGER_TIP: usize = 12;
    pub const RING_FINGER_MCP: usize = 13;
    pub const RING_FINGER_PIP: usize = 14;
    pub const RING_FINGER_DIP: usize = 15;
    pub const RING_FINGER_TIP: usize = 16;
    pub const PINKY_MCP: usize = 17;
    pub const PINKY_PIP: usize = 18;
    pub const PINKY_DIP: usize = 19;
    pub const PINKY_TIP: usize = 20;
}

/// A single landmark in normalized image coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    /// Depth relative to the wrist. Detectors that only report 2D leave it at 0.
    #[serde(default)]
    pub z: f32,
}

impl Landmark {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn flat(x: f32, y: f32) -> Self {
        Self { x, y, z: 0.0 }
    }

    pub fn distance(&self, other: &Landmark) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

/// One tracked hand: exactly 21 landmarks plus what the detector said about it.
#[derive(Debug, Clone, PartialEq)]
pub struct Hand {
    pub landmarks: [Landmark; HAND_LANDMARK_COUNT],
    /// "Left" / "Right" as reported by the detector, if any.
    pub handedness: Option<String>,
    pub score: f32,
}

impl Hand {
    pub fn new(landmarks: [Landmark; HAND_LANDMARK_COUNT]) -> Self {
        Self {
            landmarks,
            handedness: None,
            score: 1.0,
        }
    }

    pub fn with_handedness(mut self, label: impl Into<String>, score: f32) -> Self {
        self.handedness = Some(label.into());
        self.score = score;
        self
    }

    pub fn label(&self) -> &str {
        self.handedness.as_deref().unwrap_or("Hand")
    }

    pub fn landmark(&self, index: usize) -> &Landmark {
        &self.landmarks[index]
    }
}

impl TryFrom<&[Landmark]> for Hand {
    type Error = CurlError;

    fn try_from(points: &[Landmark]) -> Result<Self, Self::Error> {
        let landmarks: [Landmark; HAND_LANDMARK_COUNT] =
            points.try_into().map_err(|_| CurlError::LandmarkCount {
                expected: HAND_LANDMARK_COUNT,
                found: points.len(),
            })?;
        Ok(Hand::new(landmarks))
    }
}

/// The six independently driven channels, in wire order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Thumb,
    Index,
    Middle,
    Ring,
    Pinky,
    ThumbRot,
}

impl Channel {
    pub const COUNT: usize = 6;

    /// Wire order: thumb, index, middle, ring, pinky, thumb_rot.
    pub const ALL: [Channel; Channel::COUNT] = [
        Channel::Thumb,
        Channel::Index,
        Channel::Middle,
        Channel::Ring,
        Channel::Pinky,
        Channel::ThumbRot,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Channel::Thumb => "thumb",
            Channel::Index => "index",
            Channel::Middle => "middle",
            Channel::Ring => "ring",
            Channel::Pinky => "pinky",
            Channel::ThumbRot => "thumb_rot",
        }
    }

    /// Position of this channel in a wire frame.
    pub fn wire_index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Channel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Channel::ALL
            .into_iter()
            .find(|c| c.name() == s)
            .ok_or_else(|| format!("unknown channel '{}'", s))
    }
}

/// Fixed-shape storage with one value per [`Channel`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ChannelSet<T> {
    values: [T; Channel::COUNT],
}

impl<T> ChannelSet<T> {
    pub fn from_array(values: [T; Channel::COUNT]) -> Self {
        Self { values }
    }

    pub fn from_fn(mut f: impl FnMut(Channel) -> T) -> Self {
        Self {
            values: Channel::ALL.map(&mut f),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Channel, &T)> {
        Channel::ALL.into_iter().zip(self.values.iter())
    }

    pub fn values(&self) -> &[T; Channel::COUNT] {
        &self.values
    }

    pub fn map<U>(&self, mut f: impl FnMut(Channel, &T) -> U) -> ChannelSet<U> {
        ChannelSet::from_fn(|c| f(c, &self.values[c.wire_index()]))
    }
}

impl<T> Index<Channel> for ChannelSet<T> {
    type Output = T;

    fn index(&self, channel: Channel) -> &T {
        &self.values[channel.wire_index()]
    }
}

impl<T> IndexMut<Channel> for ChannelSet<T> {
    fn index_mut(&mut self, channel: Channel) -> &mut T {
        &mut self.values[channel.wire_index()]
    }
}

/// Raw curl ratios for one frame. Never persisted.
pub type FingerCurlSet = ChannelSet<f32>;

/// Curls rescaled to [0, 1] against the calibration table.
pub type NormalizedCurlSet = ChannelSet<f32>;

impl fmt::Display for ChannelSet<f32> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "T:{:.2} I:{:.2} M:{:.2} R:{:.2} P:{:.2} TR:{:.2}",
            self[Channel::Thumb],
            self[Channel::Index],
            self[Channel::Middle],
            self[Channel::Ring],
            self[Channel::Pinky],
            self[Channel::ThumbRot],
        )
    }
}

/// Six 8-bit channel values in wire order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ControlMessage(pub [u8; Channel::COUNT]);

impl ControlMessage {
    pub fn get(&self, channel: Channel) -> u8 {
        self.0[channel.wire_index()]
    }
}
