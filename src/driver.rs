//! Random cache traffic and the driver's own model of the fill lifecycle.

use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256StarStar;

use crate::biu::{BiuOutputs, BiuRequest};
use crate::config::{low_mask, CacheAddress, Geometry};
use crate::dut::{CacheRequest, CacheResponse};
use crate::line::LineData;

/// One randomly generated cache access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheOp {
    pub addr: u32,
    pub data: u32,
    pub write: bool,
}

/// Free-running generator, drawn once per clock edge.
#[derive(Debug, Clone)]
pub struct Stimulus {
    rng: Xoshiro256StarStar,
    addr_span: u32,
    data_mask: u32,
}

impl Stimulus {
    pub fn new(seed: u64, addr_span: u32, data_width: u32) -> Self {
        Self {
            rng: Xoshiro256StarStar::seed_from_u64(seed),
            addr_span,
            data_mask: low_mask(data_width),
        }
    }

    pub fn draw(&mut self) -> CacheOp {
        CacheOp {
            addr: self.rng.gen_range(0..=self.addr_span),
            data: self.rng.gen::<u32>() & self.data_mask,
            write: self.rng.gen_bool(0.5),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Idle,
    Miss,
    Fill,
    Victim,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DriverStats {
    pub issued: u64,
    pub hits: u64,
    pub misses: u64,
    pub fills: u64,
    pub victims: u64,
}

#[derive(Debug, Clone)]
pub struct DriverOutputs {
    pub cache: CacheRequest,
    pub biu: BiuRequest,
}

#[derive(Debug, Clone)]
pub struct Driver {
    geometry: Geometry,
    stimulus: Stimulus,
    state: DriverState,
    /// Latest draw, presented while idle.
    pending: CacheOp,
    /// Access being serviced once the driver has left idle.
    active: CacheOp,
    fill_data: LineData,
    victim_addr: u32,
    victim_data: LineData,
    stats: DriverStats,
}

impl Driver {
    pub fn new(geometry: Geometry, mut stimulus: Stimulus) -> Self {
        let pending = stimulus.draw();
        Self {
            geometry,
            stimulus,
            state: DriverState::Idle,
            pending,
            active: pending,
            fill_data: LineData::zeroed(geometry.line_size()),
            victim_addr: 0,
            victim_data: LineData::zeroed(geometry.line_size()),
            stats: DriverStats::default(),
        }
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn stats(&self) -> DriverStats {
        self.stats
    }

    /// The access the driver will present next while idle.
    pub fn pending(&self) -> CacheOp {
        self.pending
    }

    fn port(&self, addr: u32) -> CacheRequest {
        let CacheAddress { tag, index, offset } = self.geometry.decompose(addr);
        CacheRequest {
            valid: true,
            tag,
            index,
            offset,
            ..CacheRequest::default()
        }
    }

    fn idle_biu(&self) -> BiuRequest {
        BiuRequest {
            data: LineData::zeroed(self.geometry.line_size()),
            ..BiuRequest::default()
        }
    }

    pub fn outputs(&self) -> DriverOutputs {
        match self.state {
            DriverState::Idle => {
                let op = self.pending;
                let cache = CacheRequest {
                    re: !op.write,
                    we: op.write,
                    wdata: if op.write { op.data } else { 0 },
                    ..self.port(op.addr)
                };
                DriverOutputs {
                    cache,
                    biu: self.idle_biu(),
                }
            }
            DriverState::Miss => DriverOutputs {
                cache: CacheRequest::default(),
                biu: BiuRequest {
                    enable: true,
                    write: false,
                    addr: self.geometry.line_base(self.active.addr),
                    data: LineData::zeroed(self.geometry.line_size()),
                },
            },
            DriverState::Fill => DriverOutputs {
                cache: CacheRequest {
                    fe: true,
                    fdata: self.fill_data.clone(),
                    ..self.port(self.active.addr)
                },
                biu: self.idle_biu(),
            },
            DriverState::Victim => DriverOutputs {
                cache: CacheRequest::default(),
                biu: BiuRequest {
                    enable: true,
                    write: true,
                    addr: self.victim_addr,
                    data: self.victim_data.clone(),
                },
            },
        }
    }

    fn transition(&mut self, next: DriverState) {
        if next != self.state {
            log::debug!(
                "driver: {:?} -> {:?} ({:#010x})",
                self.state,
                next,
                self.active.addr
            );
        }
        self.state = next;
    }

    pub fn posedge(&mut self, cache: &CacheResponse, biu: &BiuOutputs, reset: bool) {
        let fresh = self.stimulus.draw();
        if reset {
            self.state = DriverState::Idle;
            self.pending = fresh;
            return;
        }

        match self.state {
            DriverState::Idle => {
                self.stats.issued += 1;
                if cache.hit {
                    self.stats.hits += 1;
                } else {
                    self.stats.misses += 1;
                    self.active = self.pending;
                    self.transition(DriverState::Miss);
                }
            }
            DriverState::Miss => {
                if biu.done {
                    self.fill_data = biu.read_data.clone();
                    self.transition(DriverState::Fill);
                }
            }
            DriverState::Fill => {
                self.stats.fills += 1;
                if cache.dirty {
                    // The victim tag is only valid while the fill is presented.
                    let index = self.geometry.decompose(self.active.addr).index;
                    self.victim_addr = self.geometry.compose(&CacheAddress {
                        tag: cache.victim_tag,
                        index,
                        offset: 0,
                    });
                    self.victim_data = cache.vdata.clone();
                    self.stats.victims += 1;
                    self.transition(DriverState::Victim);
                } else {
                    self.transition(DriverState::Idle);
                }
            }
            DriverState::Victim => {
                if biu.done {
                    self.transition(DriverState::Idle);
                }
            }
        }

        self.pending = fresh;
    }
}
