//! Port contract of the device under test and a software stand-in for it.
//!
//! The device exposes three independent port groups: the cache port driven by
//! the [`Driver`](crate::driver::Driver), a Wishbone slave port driven by the
//! [`Biu`](crate::biu::Biu), and SRAM controller pins wired to the backing
//! store. A bench only ever talks to the device through [`Dut`].

use crate::config::Geometry;
use crate::line::LineData;
use crate::sram::SramPort;
use crate::wishbone::{WbRequest, WbResponse, WbSramBridge};

/// Signals driven into the cache port.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CacheRequest {
    pub re: bool,
    pub we: bool,
    /// Fill enable: install `fdata` at `tag`/`index`.
    pub fe: bool,
    pub valid: bool,
    pub tag: u32,
    pub index: u32,
    pub offset: u32,
    pub wdata: u32,
    pub fdata: LineData,
}

/// Signals returned by the cache port.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CacheResponse {
    pub hit: bool,
    /// The line currently held at the requested index is dirty.
    pub dirty: bool,
    pub victim_tag: u32,
    pub rdata: u32,
    pub vdata: LineData,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DutInputs {
    pub reset: bool,
    pub cache: CacheRequest,
    pub bus: WbRequest,
    pub sram_rdata: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DutOutputs {
    pub cache: CacheResponse,
    pub bus: WbResponse,
    pub sram: SramPort,
}

/// A clocked device advanced one edge at a time.
pub trait Dut {
    /// Settle combinational outputs for the current cycle. Must not commit state.
    fn settle(&mut self, inputs: &DutInputs) -> DutOutputs;

    /// Rising clock edge with the inputs that were settled this cycle.
    fn posedge(&mut self, inputs: &DutInputs);
}

#[derive(Debug, Clone)]
struct Way {
    valid: bool,
    dirty: bool,
    tag: u32,
    data: LineData,
}

/// Direct-mapped write-back cache with the port behaviour the harness expects.
#[derive(Debug, Clone)]
pub struct ReferenceCache {
    geometry: Geometry,
    ways: Vec<Way>,
}

impl ReferenceCache {
    pub fn new(geometry: Geometry) -> Self {
        let way = Way {
            valid: false,
            dirty: false,
            tag: 0,
            data: LineData::zeroed(geometry.line_size()),
        };
        Self {
            geometry,
            ways: vec![way; geometry.sets() as usize],
        }
    }

    fn way(&self, index: u32) -> &Way {
        &self.ways[index as usize % self.ways.len()]
    }

    pub fn respond(&self, req: &CacheRequest) -> CacheResponse {
        let way = self.way(req.index);
        let hit = req.valid && (req.re || req.we) && way.valid && way.tag == req.tag;

        // Bytes past the end of the line are not part of the access.
        let rdata = if hit && req.re {
            (0..self.geometry.data_bytes())
                .take_while(|i| req.offset + i < self.geometry.line_size())
                .fold(0u32, |word, i| {
                    word | (way.data.byte(req.offset + i) as u32) << (8 * i)
                })
        } else {
            0
        };

        CacheResponse {
            hit,
            dirty: way.valid && way.dirty,
            victim_tag: way.tag,
            rdata,
            vdata: way.data.clone(),
        }
    }

    pub fn posedge(&mut self, req: &CacheRequest, reset: bool) {
        if reset {
            for way in &mut self.ways {
                way.valid = false;
                way.dirty = false;
            }
            return;
        }
        if !req.valid {
            return;
        }

        let hit = self.respond(req).hit;
        let line_size = self.geometry.line_size();
        let data_bytes = self.geometry.data_bytes();
        let slot = req.index as usize % self.ways.len();
        let way = &mut self.ways[slot];

        if req.fe {
            *way = Way {
                valid: true,
                dirty: false,
                tag: req.tag,
                data: req.fdata.clone(),
            };
        } else if req.we && hit {
            for i in (0..data_bytes).take_while(|i| req.offset + i < line_size) {
                way.data.set_byte(req.offset + i, (req.wdata >> (8 * i)) as u8);
            }
            way.dirty = true;
        }
    }
}

/// Software device: [`ReferenceCache`] on the cache port and [`WbSramBridge`]
/// on the bus and SRAM ports.
#[derive(Debug, Clone)]
pub struct SoftDut {
    cache: ReferenceCache,
    bridge: WbSramBridge,
}

impl SoftDut {
    pub fn new(geometry: Geometry, seed: u64, stall_rate: f64, wait_rate: f64) -> Self {
        Self {
            cache: ReferenceCache::new(geometry),
            bridge: WbSramBridge::new(geometry.bus_bytes(), seed, stall_rate, wait_rate),
        }
    }
}

impl Dut for SoftDut {
    fn settle(&mut self, inputs: &DutInputs) -> DutOutputs {
        DutOutputs {
            cache: self.cache.respond(&inputs.cache),
            bus: self.bridge.response(),
            sram: self.bridge.sram_port(),
        }
    }

    fn posedge(&mut self, inputs: &DutInputs) {
        self.cache.posedge(&inputs.cache, inputs.reset);
        self.bridge.posedge(&inputs.bus, inputs.sram_rdata, inputs.reset);
    }
}
