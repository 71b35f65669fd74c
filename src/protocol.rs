//! Host side of the serial control protocol.
//!
//! One ASCII line per detection frame:
//!
//! ```text
//! <thumb>,<index>,<middle>,<ring>,<pinky>,<thumb_rot>\n
//! ```
//!
//! Each field is a decimal integer in [0, 255]. There is no acknowledgement;
//! every line supersedes the previous one. The line carries no length or
//! version field, so the controller tells a 5-channel frame from a 6-channel
//! one only by token count. Adding channels later needs an explicit count or
//! a new terminator to stay compatible.

use std::fmt;

use crate::calibration::CalibrationTable;
use crate::types::{Channel, ControlMessage, NormalizedCurlSet};

/// Both ends of the link run at this rate.
pub const BAUD_RATE: u32 = 115_200;

pub const FIELD_SEPARATOR: char = ',';
pub const LINE_TERMINATOR: char = '\n';

/// Normalized value to its 8-bit wire value.
pub fn to_pwm(value: f32) -> u8 {
    // `as u8` saturates, and maps NaN to 0.
    (value * 255.0).round().clamp(0.0, 255.0) as u8
}

impl ControlMessage {
    pub fn from_normalized(values: &NormalizedCurlSet) -> Self {
        ControlMessage(Channel::ALL.map(|c| to_pwm(values[c])))
    }

    /// The full wire line, terminator included.
    pub fn to_line(&self) -> String {
        format!("{}{}", self, LINE_TERMINATOR)
    }
}

impl fmt::Display for ControlMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, v) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "{}", FIELD_SEPARATOR)?;
            }
            write!(f, "{}", v)?;
        }
        Ok(())
    }
}

pub fn encode(values: &NormalizedCurlSet) -> String {
    ControlMessage::from_normalized(values).to_line()
}

/// The message to send this frame, if any.
///
/// Nothing is sent until at least one capture has populated the calibration
/// table; the hand stays undriven until the user has calibrated.
pub fn frame_message(table: &CalibrationTable, values: &NormalizedCurlSet) -> Option<ControlMessage> {
    if table.is_empty() {
        None
    } else {
        Some(ControlMessage::from_normalized(values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::CalibrationMode;
    use crate::types::ChannelSet;

    #[test]
    fn test_pwm_rounding_and_clamp() {
        assert_eq!(to_pwm(0.0), 0);
        assert_eq!(to_pwm(0.5), 128);
        assert_eq!(to_pwm(1.0), 255);
        assert_eq!(to_pwm(1.7), 255);
        assert_eq!(to_pwm(-0.2), 0);
        assert_eq!(to_pwm(f32::NAN), 0);
    }

    #[test]
    fn test_encode_wire_order() {
        let values = ChannelSet::from_array([0.0, 0.2, 0.4, 0.6, 0.8, 1.0]);
        assert_eq!(encode(&values), "0,51,102,153,204,255\n");
    }

    #[test]
    fn test_encode_always_six_tokens_in_range() {
        let samples = [-1.0, 0.0, 0.13, 0.5, 0.99, 1.0, 3.0];
        for &v in &samples {
            let line = encode(&ChannelSet::from_fn(|c| v * (c.wire_index() as f32 + 1.0) / 3.0));
            assert!(line.ends_with('\n'));
            let tokens: Vec<&str> = line.trim_end().split(',').collect();
            assert_eq!(tokens.len(), 6);
            for t in tokens {
                let n: i64 = t.parse().unwrap();
                assert!((0..=255).contains(&n));
            }
        }
    }

    #[test]
    fn test_nothing_sent_before_calibration() {
        let values = ChannelSet::from_fn(|_| 0.5);
        let mut table = CalibrationTable::new();
        assert_eq!(frame_message(&table, &values), None);

        table.calibrate(&ChannelSet::from_fn(|_| 1.0), CalibrationMode::Min);
        assert_eq!(frame_message(&table, &values), Some(ControlMessage([128; 6])));
    }
}
