use super::decoder::Frame;
use crate::types::Channel;

pub const SERVO_MAX_ANGLE: i32 = 180;

/// Order the finger servos are written in.
pub const MAIN_ORDER: [Channel; 5] = [
    Channel::Index,
    Channel::Middle,
    Channel::Ring,
    Channel::Pinky,
    Channel::Thumb,
];

/// Static mapping for one servo channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelConfig {
    pub channel: Channel,
    /// Mirror the angle (`180 - angle`) for servos mounted the other way round.
    pub reversed: bool,
    /// Trim in degrees, added after reversal.
    pub offset: i16,
    /// Wire values outside this range are clamped onto it before mapping.
    pub input_range: (u8, u8),
    pub output_range: (u8, u8),
}

impl ChannelConfig {
    const fn finger(channel: Channel, reversed: bool, offset: i16) -> Self {
        Self {
            channel,
            reversed,
            offset,
            input_range: (0, 255),
            output_range: (0, 180),
        }
    }

    /// Servo angle for a wire value.
    pub fn angle(&self, raw: u8) -> u8 {
        let (in_lo, in_hi) = (self.input_range.0 as i32, self.input_range.1 as i32);
        let (out_lo, out_hi) = (self.output_range.0 as i32, self.output_range.1 as i32);

        let raw = (raw as i32).clamp(in_lo, in_hi);
        let mut angle = map_range(raw, in_lo, in_hi, out_lo, out_hi);
        if self.reversed {
            angle = SERVO_MAX_ANGLE - angle;
        }
        angle += self.offset as i32;
        angle.clamp(0, SERVO_MAX_ANGLE) as u8
    }
}

/// Per-channel servo setup of the hand, in wire order.
pub const CHANNEL_CONFIG: [ChannelConfig; Channel::COUNT] = [
    ChannelConfig::finger(Channel::Thumb, true, 0),
    ChannelConfig::finger(Channel::Index, true, 0),
    ChannelConfig::finger(Channel::Middle, true, 0),
    ChannelConfig::finger(Channel::Ring, false, 0),
    ChannelConfig::finger(Channel::Pinky, true, 25),
    ChannelConfig {
        channel: Channel::ThumbRot,
        reversed: false,
        offset: 0,
        // Narrower than the wire range to keep the rotation joint off its stops.
        input_range: (30, 220),
        output_range: (0, 180),
    },
];

/// Linear map from `[in_lo, in_hi]` to `[out_lo, out_hi]`, rounded to the
/// nearest integer.
pub fn map_range(x: i32, in_lo: i32, in_hi: i32, out_lo: i32, out_hi: i32) -> i32 {
    let den = in_hi - in_lo;
    if den == 0 {
        return out_lo;
    }
    let num = (x - in_lo) * (out_hi - out_lo);
    let (num, den) = if den < 0 { (-num, -den) } else { (num, den) };
    (2 * num + den).div_euclid(2 * den) + out_lo
}

/// Output side of the controller: one servo per channel.
pub trait ServoBus {
    fn write_angle(&mut self, channel: Channel, angle: u8);
}

/// Which servos a frame drove.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actuation {
    /// Fewer than five values: nothing moved.
    None,
    /// The five finger servos.
    Main,
    /// Finger servos plus thumb rotation.
    MainAndRotation,
}

#[derive(Debug, Clone)]
pub struct ActuationMapper {
    config: [ChannelConfig; Channel::COUNT],
}

impl Default for ActuationMapper {
    fn default() -> Self {
        Self {
            config: CHANNEL_CONFIG,
        }
    }
}

impl ActuationMapper {
    /// Starts from [`CHANNEL_CONFIG`] and replaces the entry named by each
    /// override's `channel`, so overrides may come in any order. A later
    /// override for the same channel wins.
    pub fn new(overrides: impl IntoIterator<Item = ChannelConfig>) -> Self {
        let mut config = CHANNEL_CONFIG;
        for entry in overrides {
            config[entry.channel.wire_index()] = entry;
        }
        Self { config }
    }

    pub fn config(&self, channel: Channel) -> &ChannelConfig {
        &self.config[channel.wire_index()]
    }

    pub fn actuate<B: ServoBus + ?Sized>(&self, frame: &Frame, bus: &mut B) -> Actuation {
        if frame.len < MAIN_ORDER.len() {
            return Actuation::None;
        }
        for channel in MAIN_ORDER {
            let angle = self.config(channel).angle(frame.values[channel.wire_index()]);
            bus.write_angle(channel, angle);
        }

        match frame.get(Channel::ThumbRot) {
            Some(raw) => {
                let angle = self.config(Channel::ThumbRot).angle(raw);
                bus.write_angle(Channel::ThumbRot, angle);
                Actuation::MainAndRotation
            }
            None => Actuation::Main,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::firmware::parse_frame;

    #[derive(Default)]
    struct Recorder(Vec<(Channel, u8)>);

    impl ServoBus for Recorder {
        fn write_angle(&mut self, channel: Channel, angle: u8) {
            self.0.push((channel, angle));
        }
    }

    fn cfg(channel: Channel) -> ChannelConfig {
        CHANNEL_CONFIG[channel.wire_index()]
    }

    #[test]
    fn test_overrides_follow_their_channel_not_position() {
        let mut shuffled = CHANNEL_CONFIG;
        shuffled.reverse();
        shuffled[0].offset = -10; // thumb_rot after the reverse
        let mapper = ActuationMapper::new(shuffled);
        for c in Channel::ALL {
            assert_eq!(mapper.config(c).channel, c);
        }
        assert_eq!(mapper.config(Channel::ThumbRot).offset, -10);
        assert_eq!(mapper.config(Channel::Pinky).offset, 25);

        let partial = ActuationMapper::new([ChannelConfig::finger(Channel::Ring, true, 0)]);
        assert!(partial.config(Channel::Ring).reversed);
        assert_eq!(partial.config(Channel::Index), &cfg(Channel::Index));
    }

    #[test]
    fn test_map_range() {
        assert_eq!(map_range(0, 0, 255, 0, 180), 0);
        assert_eq!(map_range(255, 0, 255, 0, 180), 180);
        assert_eq!(map_range(128, 0, 255, 0, 180), 90);
        assert_eq!(map_range(125, 30, 220, 0, 180), 90);
        assert_eq!(map_range(5, 3, 3, 7, 9), 7);
    }

    #[test]
    fn test_reversed_full_scale_is_zero() {
        assert_eq!(cfg(Channel::Index).angle(255), 0);
        assert_eq!(cfg(Channel::Index).angle(0), 180);
    }

    #[test]
    fn test_midpoint_thumb() {
        // 128 -> 90 -> reversed 180 - 90.
        assert_eq!(cfg(Channel::Thumb).angle(128), 90);
    }

    #[test]
    fn test_pinky_offset_is_clamped() {
        let pinky = cfg(Channel::Pinky);
        assert_eq!(pinky.angle(255), 25);
        assert_eq!(pinky.angle(0), 180);
    }

    #[test]
    fn test_ring_is_not_reversed() {
        assert_eq!(cfg(Channel::Ring).angle(255), 180);
        assert_eq!(cfg(Channel::Ring).angle(0), 0);
    }

    #[test]
    fn test_rotation_sub_range() {
        let rot = cfg(Channel::ThumbRot);
        assert_eq!(rot.angle(10), 0);
        assert_eq!(rot.angle(30), 0);
        assert_eq!(rot.angle(220), 180);
        assert_eq!(rot.angle(255), 180);
    }

    #[test]
    fn test_token_count_gates_actuation() {
        let mapper = ActuationMapper::default();
        for line in ["", "1", "1,2", "1,2,3", "1,2,3,4"] {
            let mut bus = Recorder::default();
            if let Some(frame) = parse_frame(line) {
                assert_eq!(mapper.actuate(&frame, &mut bus), Actuation::None);
            }
            assert!(bus.0.is_empty(), "line {:?} moved servos", line);
        }

        let mut bus = Recorder::default();
        let frame = parse_frame("0,0,0,0,0").unwrap();
        assert_eq!(mapper.actuate(&frame, &mut bus), Actuation::Main);
        let order: Vec<Channel> = bus.0.iter().map(|(c, _)| *c).collect();
        assert_eq!(order, MAIN_ORDER.to_vec());

        let mut bus = Recorder::default();
        let frame = parse_frame("0,0,0,0,0,0,0").unwrap();
        assert_eq!(mapper.actuate(&frame, &mut bus), Actuation::MainAndRotation);
        assert_eq!(bus.0.len(), 6);
        assert_eq!(bus.0[5], (Channel::ThumbRot, 0));
    }

    #[test]
    fn test_angles_always_in_servo_range() {
        for c in CHANNEL_CONFIG {
            for raw in 0..=255u8 {
                assert!(c.angle(raw) <= 180);
            }
        }
    }
}
