pub mod biu;
pub mod config;
pub mod driver;
pub mod dut;
pub mod error;
pub mod image;
pub mod line;
pub mod monitor;
pub mod roundtrip;
#[cfg(feature = "verilator")]
pub mod rtl;
pub mod simulator;
pub mod sram;
pub mod wishbone;

pub use biu::{Biu, BiuOutputs, BiuRequest, BiuState};
pub use config::{BenchConfig, CacheAddress, Geometry};
pub use driver::{CacheOp, Driver, DriverState, DriverStats, Stimulus};
pub use dut::{CacheRequest, CacheResponse, Dut, DutInputs, DutOutputs, ReferenceCache, SoftDut};
pub use error::{ConfigError, VerifyError};
pub use line::LineData;
pub use monitor::Monitor;
pub use simulator::*;
pub use sram::{Sram, SramPort};
pub use wishbone::{WbRequest, WbResponse, WbSramBridge};
