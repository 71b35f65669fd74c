//! Controller side of the link: turns received lines into servo angles.
//!
//! Each line runs one cycle:
//!
//! 1. **Wait**: bytes accumulate in a [`LineAssembler`] until `\n`.
//! 2. **Parse**: [`parse_frame`] splits on `,` into at most six values, each
//!    clamped to [0, 255].
//! 3. **Actuate**: [`ActuationMapper`] drives the five finger servos once
//!    five values are present, and the thumb rotation servo once six are.
//!
//! Anything malformed is dropped without output. Servos keep their last
//! angle until a later frame moves them.
//!
//! Nothing here allocates; buffers are fixed-capacity `heapless` types.

mod actuation;
mod decoder;

pub use actuation::{
    map_range, ActuationMapper, Actuation, ChannelConfig, ServoBus, CHANNEL_CONFIG, MAIN_ORDER,
    SERVO_MAX_ANGLE,
};
pub use decoder::{parse_frame, Frame, LineAssembler, LINE_CAPACITY};

/// Decoder and mapper wired to a servo bus: the controller's polling loop body.
pub struct Controller<B: ServoBus> {
    assembler: LineAssembler,
    mapper: ActuationMapper,
    bus: B,
}

impl<B: ServoBus> Controller<B> {
    pub fn new(bus: B) -> Self {
        Self::with_mapper(bus, ActuationMapper::default())
    }

    pub fn with_mapper(bus: B, mapper: ActuationMapper) -> Self {
        Self {
            assembler: LineAssembler::new(),
            mapper,
            bus,
        }
    }

    /// Feeds one received byte. Returns what the completed line drove, if
    /// this byte finished one.
    pub fn poll_byte(&mut self, byte: u8) -> Option<Actuation> {
        let line = self.assembler.push(byte)?;
        let text = core::str::from_utf8(&line).ok()?;
        let frame = parse_frame(text)?;
        Some(self.mapper.actuate(&frame, &mut self.bus))
    }

    /// Feeds a chunk of bytes; returns how many frames moved at least one servo.
    pub fn poll(&mut self, bytes: &[u8]) -> usize {
        bytes
            .iter()
            .filter_map(|&b| self.poll_byte(b))
            .filter(|a| *a != Actuation::None)
            .count()
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Channel;

    #[derive(Default)]
    struct Recorder {
        writes: Vec<(Channel, u8)>,
    }

    impl ServoBus for Recorder {
        fn write_angle(&mut self, channel: Channel, angle: u8) {
            self.writes.push((channel, angle));
        }
    }

    #[test]
    fn test_controller_full_frame() {
        let mut ctl = Controller::new(Recorder::default());
        assert_eq!(ctl.poll(b"0,255,255,255,255,10\n"), 1);
        assert_eq!(
            ctl.bus().writes,
            vec![
                (Channel::Index, 0),
                (Channel::Middle, 0),
                (Channel::Ring, 180),
                (Channel::Pinky, 25),
                (Channel::Thumb, 180),
                (Channel::ThumbRot, 0),
            ]
        );
    }

    #[test]
    fn test_controller_split_chunks_and_garbage() {
        let mut ctl = Controller::new(Recorder::default());
        assert_eq!(ctl.poll(b"12,3"), 0);
        assert_eq!(ctl.poll(b"4\nnope\n\n1,2,3,4,5\r\n"), 1);
        assert_eq!(ctl.poll(b"1,2,3"), 0);
        assert_eq!(ctl.poll(b"\n"), 0);
        assert_eq!(ctl.bus().writes.len(), 5);
    }
}
