use bitvec::prelude::*;
use std::fmt;

/// One cache line as a flat little-endian bit buffer.
///
/// Beat `k` of a burst occupies bits `k * width .. (k + 1) * width`.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct LineData {
    bits: BitVec<u8, Lsb0>,
}

impl LineData {
    pub fn zeroed(line_bytes: u32) -> Self {
        Self {
            bits: bitvec![u8, Lsb0; 0; line_bytes as usize * 8],
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            bits: BitVec::from_slice(bytes),
        }
    }

    pub fn len_bytes(&self) -> usize {
        self.bits.len() / 8
    }

    /// Copy zero-padded or truncated to `line_bytes`.
    pub fn resized(&self, line_bytes: u32) -> Self {
        let mut bits = self.bits.clone();
        bits.resize(line_bytes as usize * 8, false);
        Self { bits }
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.bits.as_raw_slice()
    }

    /// Bus word `beat` of `width` bits.
    pub fn word(&self, beat: u32, width: u32) -> u32 {
        let start = (beat * width) as usize;
        self.bits[start..start + width as usize].load_le::<u32>()
    }

    pub fn set_word(&mut self, beat: u32, width: u32, value: u32) {
        let start = (beat * width) as usize;
        self.bits[start..start + width as usize].store_le::<u32>(value);
    }

    pub fn byte(&self, offset: u32) -> u8 {
        self.as_bytes()[offset as usize]
    }

    pub fn set_byte(&mut self, offset: u32, value: u8) {
        let start = offset as usize * 8;
        self.bits[start..start + 8].store_le::<u8>(value);
    }
}

impl fmt::Debug for LineData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Most significant byte first, like a hardware bit vector.
        write!(f, "0x")?;
        for byte in self.as_bytes().iter().rev() {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_words_are_little_endian_slices() {
        let mut line = LineData::zeroed(8);
        line.set_word(0, 16, 0x1234);
        line.set_word(3, 16, 0xbeef);
        assert_eq!(line.as_bytes(), &[0x34, 0x12, 0, 0, 0, 0, 0xef, 0xbe]);
        assert_eq!(line.word(0, 16), 0x1234);
        assert_eq!(line.word(1, 32), 0xbeef_0000);
        assert_eq!(line.byte(7), 0xbe);
    }

    #[test]
    fn test_set_byte_leaves_neighbours() {
        let mut line = LineData::from_bytes(&[0xff; 4]);
        line.set_byte(2, 0x00);
        assert_eq!(line.as_bytes(), &[0xff, 0xff, 0x00, 0xff]);
        assert_eq!(format!("{line:?}"), "0xff00ffff");
    }

    #[test]
    fn test_resized_pads_and_truncates() {
        let line = LineData::from_bytes(&[0x11, 0x22]);
        let padded = line.resized(4);
        assert_eq!(padded.len_bytes(), 4);
        assert_eq!(padded.as_bytes(), &[0x11, 0x22, 0, 0]);
        assert_eq!(padded.resized(1).as_bytes(), &[0x11]);
        assert_eq!(LineData::default().resized(32), LineData::zeroed(32));
    }
}
