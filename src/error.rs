use thiserror::Error;

/// Rejected geometry or bench parameters.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{name} must be a non-zero power of two, got {value}")]
    NotPowerOfTwo { name: &'static str, value: u32 },

    #[error("bus width of {bus_bits} bits does not evenly divide the {line_bits}-bit line")]
    BusWidthMismatch { line_bits: u32, bus_bits: u32 },

    #[error("{name} must be one of {allowed:?} bits, got {value}")]
    UnsupportedWidth {
        name: &'static str,
        value: u32,
        allowed: &'static [u32],
    },

    #[error("address width {addr_width} leaves no room for a tag (index {index_width} + offset {offset_width})")]
    NoTagBits {
        addr_width: u32,
        index_width: u32,
        offset_width: u32,
    },

    #[error("cache of {cache_size} bytes cannot hold a single {line_size}-byte line")]
    CacheTooSmall { cache_size: u32, line_size: u32 },

    #[error("backing store of {memory_bytes} bytes is smaller than the {required} bytes the bench touches")]
    MemoryTooSmall { memory_bytes: u32, required: u32 },

    #[error("{name} must be in [0, 1), got {value}")]
    RateOutOfRange { name: &'static str, value: f64 },
}

/// Fatal verification outcomes. None of these are retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifyError {
    #[error(
        "cycle {cycle}: load from {addr:#010x} returned {observed:#06x}, expected {expected:#06x}"
    )]
    Mismatch {
        cycle: u64,
        addr: u32,
        expected: u32,
        observed: u32,
    },

    #[error("cycle {cycle}: line read back from {addr:#010x} differs from the line written")]
    LineMismatch {
        cycle: u64,
        addr: u32,
        written: Vec<u8>,
        read: Vec<u8>,
    },

    #[error("cycle {cycle}: bus transaction at {addr:#010x} still busy after {waited} cycles")]
    Watchdog { cycle: u64, addr: u32, waited: u64 },
}
