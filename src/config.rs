//! Cache and bus geometry, and the knobs of a bench run.
//!
//! Everything here is validated once by [`BenchConfig::geometry`] or
//! [`Geometry::new`]; the clocked components never re-check widths.

use crate::error::ConfigError;

/// Address split shared by the driver, monitor, BIU and software DUT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheAddress {
    pub tag: u32,
    pub index: u32,
    pub offset: u32,
}

/// Validated widths of the cache, the bus and the backing store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    addr_width: u32,
    data_width: u32,
    bus_width: u32,
    line_size: u32,
    cache_size: u32,
}

fn check_pow2(name: &'static str, value: u32) -> Result<(), ConfigError> {
    if value == 0 || !value.is_power_of_two() {
        return Err(ConfigError::NotPowerOfTwo { name, value });
    }
    Ok(())
}

impl Geometry {
    /// `line_size` and `cache_size` are in bytes, the widths in bits.
    pub fn new(
        addr_width: u32,
        data_width: u32,
        bus_width: u32,
        line_size: u32,
        cache_size: u32,
    ) -> Result<Self, ConfigError> {
        if !(1..=32).contains(&addr_width) {
            return Err(ConfigError::UnsupportedWidth {
                name: "address width",
                value: addr_width,
                allowed: &[32],
            });
        }
        if !matches!(data_width, 16 | 32) {
            return Err(ConfigError::UnsupportedWidth {
                name: "data width",
                value: data_width,
                allowed: &[16, 32],
            });
        }
        if !matches!(bus_width, 8 | 16 | 32) {
            return Err(ConfigError::UnsupportedWidth {
                name: "bus width",
                value: bus_width,
                allowed: &[8, 16, 32],
            });
        }
        check_pow2("line size", line_size)?;
        check_pow2("cache size", cache_size)?;

        let line_bits = line_size * 8;
        if line_bits % bus_width != 0 {
            return Err(ConfigError::BusWidthMismatch {
                line_bits,
                bus_bits: bus_width,
            });
        }
        if cache_size < line_size {
            return Err(ConfigError::CacheTooSmall {
                cache_size,
                line_size,
            });
        }

        let geometry = Self {
            addr_width,
            data_width,
            bus_width,
            line_size,
            cache_size,
        };
        if geometry.offset_width() + geometry.index_width() >= addr_width {
            return Err(ConfigError::NoTagBits {
                addr_width,
                index_width: geometry.index_width(),
                offset_width: geometry.offset_width(),
            });
        }
        Ok(geometry)
    }

    pub fn addr_width(&self) -> u32 {
        self.addr_width
    }

    /// Width of a cache-port load/store in bits.
    pub fn data_width(&self) -> u32 {
        self.data_width
    }

    pub fn data_bytes(&self) -> u32 {
        self.data_width / 8
    }

    pub fn bus_width(&self) -> u32 {
        self.bus_width
    }

    pub fn bus_bytes(&self) -> u32 {
        self.bus_width / 8
    }

    /// Line size in bytes.
    pub fn line_size(&self) -> u32 {
        self.line_size
    }

    pub fn line_bits(&self) -> u32 {
        self.line_size * 8
    }

    pub fn cache_size(&self) -> u32 {
        self.cache_size
    }

    /// Number of bus beats in one line transfer.
    pub fn total_beats(&self) -> u32 {
        self.line_bits() / self.bus_width
    }

    pub fn sets(&self) -> u32 {
        self.cache_size / self.line_size
    }

    pub fn offset_width(&self) -> u32 {
        self.line_size.trailing_zeros()
    }

    pub fn index_width(&self) -> u32 {
        self.sets().trailing_zeros()
    }

    pub fn tag_width(&self) -> u32 {
        self.addr_width - self.index_width() - self.offset_width()
    }

    /// Mask of the bits that fit in the address width.
    pub fn addr_mask(&self) -> u32 {
        low_mask(self.addr_width)
    }

    /// Byte-lane select with every lane of a bus word enabled.
    pub fn bus_sel(&self) -> u32 {
        low_mask(self.bus_bytes())
    }

    pub fn decompose(&self, addr: u32) -> CacheAddress {
        let addr = addr & self.addr_mask();
        let offset_width = self.offset_width();
        let index_width = self.index_width();
        CacheAddress {
            tag: (addr >> (offset_width + index_width)) & low_mask(self.tag_width()),
            index: (addr >> offset_width) & low_mask(index_width),
            offset: addr & low_mask(offset_width),
        }
    }

    pub fn compose(&self, parts: &CacheAddress) -> u32 {
        let offset_width = self.offset_width();
        let index_width = self.index_width();
        let tag = (parts.tag & low_mask(self.tag_width())) << (offset_width + index_width);
        let index = (parts.index & low_mask(index_width)) << offset_width;
        let offset = parts.offset & low_mask(offset_width);
        (tag | index | offset) & self.addr_mask()
    }

    /// Address with the line offset forced to zero.
    pub fn line_base(&self, addr: u32) -> u32 {
        addr & self.addr_mask() & !low_mask(self.offset_width())
    }
}

/// Lowest `bits` bits set; saturates at 32.
pub(crate) fn low_mask(bits: u32) -> u32 {
    if bits >= 32 {
        u32::MAX
    } else {
        (1u32 << bits) - 1
    }
}

/// Parameters of one bench run.
#[derive(Debug, Clone, PartialEq)]
pub struct BenchConfig {
    pub addr_width: u32,
    pub data_width: u32,
    pub bus_width: u32,
    pub line_size: u32,
    pub cache_size: u32,
    /// Size of the backing store in bytes.
    pub memory_bytes: u32,
    pub seed: u64,
    pub max_cycles: u64,
    pub reset_cycles: u64,
    /// Probability that the software bus target stalls a request beat.
    pub stall_rate: f64,
    /// Probability that the software bus target holds back an ack for a cycle.
    pub wait_rate: f64,
    /// Cycles the BIU may stay away from idle before the run is failed.
    pub watchdog_cycles: u64,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            addr_width: 32,
            data_width: 16,
            bus_width: 16,
            line_size: 32,
            cache_size: 256,
            memory_bytes: 1 << 21,
            seed: 0,
            max_cycles: 100_000,
            reset_cycles: 1,
            stall_rate: 0.0,
            wait_rate: 0.0,
            watchdog_cycles: 1_000,
        }
    }
}

impl BenchConfig {
    /// Random cache addresses are drawn from `0..=addr_span()`, twice the cache
    /// size so that every set sees conflicting tags.
    pub fn addr_span(&self) -> u32 {
        self.cache_size.saturating_mul(2)
    }

    /// A watchdog limit that one line transfer cannot reach at the configured
    /// backpressure. Never below the default limit.
    pub fn backpressure_watchdog(&self) -> u64 {
        let beats = (self.line_size.saturating_mul(8) / self.bus_width.max(1)).max(1) as f64;
        let accept = ((1.0 - self.stall_rate) * (1.0 - self.wait_rate)).max(f64::EPSILON);
        let expected = beats * (1.0 / accept + 2.0);
        ((expected * 10.0).ceil() as u64).max(Self::default().watchdog_cycles)
    }

    pub fn geometry(&self) -> Result<Geometry, ConfigError> {
        for (name, value) in [("stall rate", self.stall_rate), ("wait rate", self.wait_rate)] {
            if !(0.0..1.0).contains(&value) {
                return Err(ConfigError::RateOutOfRange { name, value });
            }
        }
        check_pow2("memory size", self.memory_bytes)?;
        let geometry = Geometry::new(
            self.addr_width,
            self.data_width,
            self.bus_width,
            self.line_size,
            self.cache_size,
        )?;

        // One full line and every byte the stimulus can touch must be backed.
        let stimulus_end = self.addr_span().saturating_add(geometry.data_bytes());
        let required = self.line_size.max(stimulus_end);
        if self.memory_bytes < required {
            return Err(ConfigError::MemoryTooSmall {
                memory_bytes: self.memory_bytes,
                required,
            });
        }
        Ok(geometry)
    }
}
