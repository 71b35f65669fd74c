//! Finger curl metrics from the 21 hand landmarks.
//!
//! Every curl is a tip-to-base distance divided by palm width, so values are
//! independent of how far the hand is from the camera. Index, middle, ring and
//! pinky measure from the wrist; the thumb measures from its own MCP joint.
//! Thumb rotation is the distance from the thumb tip across to the pinky MCP.

use crate::error::CurlError;
use crate::types::landmarks::*;
use crate::types::{Channel, FingerCurlSet, Hand, Landmark};

/// Added to palm width so a collapsed palm never divides by zero.
pub const PALM_EPSILON: f32 = 1e-6;

/// (tip, base) landmark pairs for the five finger channels.
const FINGER_SEGMENTS: [(Channel, usize, usize); 5] = [
    (Channel::Thumb, THUMB_TIP, THUMB_MCP),
    (Channel::Index, INDEX_FINGER_TIP, WRIST),
    (Channel::Middle, MIDDLE_FINGER_TIP, WRIST),
    (Channel::Ring, RING_FINGER_TIP, WRIST),
    (Channel::Pinky, PINKY_TIP, WRIST),
];

pub fn palm_width(hand: &Hand) -> f32 {
    hand.landmark(INDEX_FINGER_MCP)
        .distance(hand.landmark(PINKY_MCP))
        + PALM_EPSILON
}

/// Computes all six curl values for a hand.
pub fn finger_curls(hand: &Hand) -> FingerCurlSet {
    let palm = palm_width(hand);
    let mut curls = FingerCurlSet::default();

    for (channel, tip, base) in FINGER_SEGMENTS {
        curls[channel] = hand.landmark(tip).distance(hand.landmark(base)) / palm;
    }
    curls[Channel::ThumbRot] = hand.landmark(THUMB_TIP).distance(hand.landmark(PINKY_MCP)) / palm;

    curls
}

/// Same as [`finger_curls`] for an unvalidated landmark list.
pub fn extract(points: &[Landmark]) -> Result<FingerCurlSet, CurlError> {
    let hand = Hand::try_from(points)?;
    Ok(finger_curls(&hand))
}
