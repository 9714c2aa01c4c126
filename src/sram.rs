//! Asynchronous SRAM behind the bus target.
//!
//! The device is word organised with one byte lane per data byte. Reads are
//! combinational; a write lands on the clock edge.

use std::io::{self, Write};

use crate::error::ConfigError;

/// Pins of the SRAM as seen from its controller, in positive logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SramPort {
    /// Word address.
    pub addr: u32,
    pub data: u32,
    pub chip_enable: bool,
    pub output_enable: bool,
    pub write_enable: bool,
    /// Bit `i` enables byte lane `i`.
    pub lanes: u8,
}

#[derive(Debug, Clone)]
pub struct Sram {
    word_bytes: u32,
    mem: Vec<u8>,
}

impl Sram {
    /// `word_bytes` is 2 for a 16-bit part (upper/lower lane) or 4 for a 32-bit part.
    pub fn new(size_bytes: u32, word_bytes: u32) -> Result<Self, ConfigError> {
        if !matches!(word_bytes, 2 | 4) {
            return Err(ConfigError::UnsupportedWidth {
                name: "SRAM word width",
                value: word_bytes * 8,
                allowed: &[16, 32],
            });
        }
        Ok(Self {
            word_bytes,
            mem: vec![0; size_bytes as usize],
        })
    }

    pub fn word_bytes(&self) -> u32 {
        self.word_bytes
    }

    pub fn size_bytes(&self) -> usize {
        self.mem.len()
    }

    fn lane_index(&self, word: u32, lane: u32) -> Option<usize> {
        let index = word as usize * self.word_bytes as usize + lane as usize;
        (index < self.mem.len()).then_some(index)
    }

    /// Data driven onto the bus this cycle. Disabled lanes and out-of-range words read zero.
    pub fn read(&self, port: &SramPort) -> u32 {
        if !port.chip_enable || !port.output_enable {
            return 0;
        }
        (0..self.word_bytes)
            .filter(|lane| port.lanes & (1 << lane) != 0)
            .filter_map(|lane| {
                self.lane_index(port.addr, lane)
                    .map(|i| (self.mem[i] as u32) << (lane * 8))
            })
            .fold(0, |word, byte| word | byte)
    }

    /// Commit a write on the clock edge. Out-of-range writes are dropped.
    pub fn posedge(&mut self, port: &SramPort) {
        if !port.chip_enable || !port.write_enable {
            return;
        }
        for lane in 0..self.word_bytes {
            if port.lanes & (1 << lane) == 0 {
                continue;
            }
            if let Some(i) = self.lane_index(port.addr, lane) {
                self.mem[i] = (port.data >> (lane * 8)) as u8;
            }
        }
    }

    /// Copy an image into the array from address zero. Returns the bytes taken.
    pub fn load(&mut self, image: &[u8]) -> usize {
        let len = image.len().min(self.mem.len());
        self.mem[..len].copy_from_slice(&image[..len]);
        len
    }

    pub fn bytes(&self) -> &[u8] {
        &self.mem
    }

    /// Write the first `len` bytes in the one-byte-per-line hex image format.
    pub fn dump_hex<W: Write>(&self, out: &mut W, len: usize) -> io::Result<()> {
        for byte in &self.mem[..len.min(self.mem.len())] {
            writeln!(out, "{byte:02x}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn port(addr: u32, data: u32, write: bool, lanes: u8) -> SramPort {
        SramPort {
            addr,
            data,
            chip_enable: true,
            output_enable: !write,
            write_enable: write,
            lanes,
        }
    }

    #[test]
    fn test_lane_masked_write() {
        let mut sram = Sram::new(16, 2).unwrap();
        sram.posedge(&port(1, 0xaabb, true, 0b11));
        sram.posedge(&port(1, 0x1122, true, 0b10));
        assert_eq!(sram.read(&port(1, 0, false, 0b11)), 0x11bb);
        assert_eq!(sram.bytes()[2..4], [0xbb, 0x11]);
    }

    #[test]
    fn test_disabled_lanes_read_zero() {
        let mut sram = Sram::new(16, 2).unwrap();
        sram.posedge(&port(0, 0xaabb, true, 0b11));
        assert_eq!(sram.read(&port(0, 0, false, 0b01)), 0x00bb);
        assert_eq!(sram.read(&port(0, 0, false, 0b10)), 0xaa00);
        assert_eq!(sram.read(&port(0, 0, false, 0b00)), 0);

        let mut idle = port(0, 0, false, 0b11);
        idle.output_enable = false;
        assert_eq!(sram.read(&idle), 0);
    }

    #[test]
    fn test_write_needs_chip_enable() {
        let mut sram = Sram::new(16, 4).unwrap();
        let mut write = port(0, 0xdead_beef, true, 0b1111);
        write.chip_enable = false;
        sram.posedge(&write);
        assert_eq!(sram.read(&port(0, 0, false, 0b1111)), 0);
    }

    #[test]
    fn test_out_of_range_is_ignored() {
        let mut sram = Sram::new(8, 4).unwrap();
        sram.posedge(&port(2, 0xffff_ffff, true, 0b1111));
        assert!(sram.bytes().iter().all(|&b| b == 0));
        assert_eq!(sram.read(&port(2, 0, false, 0b1111)), 0);
    }

    #[test]
    fn test_load_and_dump() {
        let mut sram = Sram::new(4, 2).unwrap();
        assert_eq!(sram.load(&[1, 2, 3, 4, 5, 6]), 4);
        let mut out = Vec::new();
        sram.dump_hex(&mut out, 2).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "01\n02\n");
    }

    #[test]
    fn test_rejects_unsupported_word_width() {
        assert!(matches!(
            Sram::new(16, 1),
            Err(ConfigError::UnsupportedWidth { value: 8, .. })
        ));
        assert!(Sram::new(16, 8).is_err());
        let sram = Sram::new(16, 4).unwrap();
        assert_eq!((sram.word_bytes(), sram.size_bytes()), (4, 16));
    }
}
