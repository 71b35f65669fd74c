use heapless::Vec;

use crate::types::Channel;

/// Longest line the controller buffers. A full frame is at most 23 bytes.
pub const LINE_CAPACITY: usize = 64;

/// Accumulates bytes until a newline.
///
/// A line that overflows the buffer is discarded up to and including its
/// newline; the next line starts clean.
#[derive(Debug, Default)]
pub struct LineAssembler {
    buf: Vec<u8, LINE_CAPACITY>,
    overflowed: bool,
}

impl LineAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the completed line (terminator stripped) when `byte` is `\n`.
    pub fn push(&mut self, byte: u8) -> Option<Vec<u8, LINE_CAPACITY>> {
        if byte == b'\n' {
            let line = core::mem::take(&mut self.buf);
            if core::mem::take(&mut self.overflowed) {
                return None;
            }
            return Some(line);
        }

        if !self.overflowed && self.buf.push(byte).is_err() {
            self.overflowed = true;
            self.buf.clear();
        }
        None
    }

    pub fn pending(&self) -> usize {
        self.buf.len()
    }
}

/// Values parsed from one line, in wire order. `len` is how many tokens the
/// line carried (1..=6); slots past `len` are zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    pub values: [u8; Channel::COUNT],
    pub len: usize,
}

impl Frame {
    pub fn get(&self, channel: Channel) -> Option<u8> {
        let i = channel.wire_index();
        (i < self.len).then(|| self.values[i])
    }
}

/// Parses one line into a frame.
///
/// Surrounding whitespace is trimmed and tokens after the sixth are ignored.
/// Every value is clamped to [0, 255]. Returns `None` for an empty line or
/// when any of the first six tokens is not an integer.
pub fn parse_frame(line: &str) -> Option<Frame> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let mut values = [0u8; Channel::COUNT];
    let mut len = 0;
    for token in line.split(',').take(Channel::COUNT) {
        let n: i64 = token.trim().parse().ok()?;
        values[len] = n.clamp(0, 255) as u8;
        len += 1;
    }

    Some(Frame { values, len })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(asm: &mut LineAssembler, bytes: &[u8]) -> std::vec::Vec<std::vec::Vec<u8>> {
        bytes
            .iter()
            .filter_map(|&b| asm.push(b))
            .map(|l| l.to_vec())
            .collect()
    }

    #[test]
    fn test_assembler_splits_lines() {
        let mut asm = LineAssembler::new();
        let lines = feed(&mut asm, b"1,2\n3,4\n5");
        assert_eq!(lines, vec![b"1,2".to_vec(), b"3,4".to_vec()]);
        assert_eq!(asm.pending(), 1);
    }

    #[test]
    fn test_assembler_drops_overlong_line() {
        let mut asm = LineAssembler::new();
        let long = [b'9'; LINE_CAPACITY + 10];
        assert!(feed(&mut asm, &long).is_empty());
        assert!(feed(&mut asm, b"\n").is_empty());
        assert_eq!(feed(&mut asm, b"7,7\n"), vec![b"7,7".to_vec()]);
    }

    #[test]
    fn test_parse_full_frame() {
        let f = parse_frame("  128,0,255,3,4,200\r").unwrap();
        assert_eq!(f.values, [128, 0, 255, 3, 4, 200]);
        assert_eq!(f.len, 6);
    }

    #[test]
    fn test_parse_clamps_out_of_range() {
        let f = parse_frame("-5,999,256,300,0").unwrap();
        assert_eq!(f.values, [0, 255, 255, 255, 0, 0]);
        assert_eq!(f.len, 5);
        assert_eq!(f.get(Channel::Pinky), Some(0));
        assert_eq!(f.get(Channel::ThumbRot), None);
    }

    #[test]
    fn test_parse_ignores_extra_tokens() {
        let f = parse_frame("1,2,3,4,5,6,7,oops").unwrap();
        assert_eq!(f.values, [1, 2, 3, 4, 5, 6]);
        assert_eq!(f.len, 6);
    }

    #[test]
    fn test_parse_partial_and_bad_lines() {
        assert_eq!(parse_frame("10,20").map(|f| f.len), Some(2));
        assert_eq!(parse_frame(""), None);
        assert_eq!(parse_frame("   "), None);
        assert_eq!(parse_frame("1,,3,4,5"), None);
        assert_eq!(parse_frame("1,2,x,4,5,6"), None);
        assert_eq!(parse_frame("99999999999999999999999"), None);
    }
}
