//! Pipelined Wishbone port types and a software bus target.

use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256StarStar;
use std::collections::VecDeque;

use crate::sram::SramPort;

/// Master-driven side of the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WbRequest {
    pub cyc: bool,
    pub stb: bool,
    pub we: bool,
    pub sel: u32,
    pub addr: u32,
    pub data: u32,
}

/// Target-driven side of the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WbResponse {
    pub ack: bool,
    /// Do not issue a new request beat this cycle.
    pub stall: bool,
    pub data: u32,
}

#[derive(Debug, Clone, Copy)]
struct Beat {
    we: bool,
    addr: u32,
    data: u32,
    sel: u32,
}

/// Wishbone slave in front of an SRAM, standing in for the RTL bus controller.
///
/// Accepted beats queue up and are served one per cycle, oldest first. Each
/// served beat drives the SRAM port for one cycle and is acknowledged on the
/// following cycle, so acks trail requests by at least two cycles. Random
/// stalls and wait states are drawn on every edge for the next cycle.
#[derive(Debug, Clone)]
pub struct WbSramBridge {
    word_bytes: u32,
    depth: usize,
    queue: VecDeque<Beat>,
    ack: bool,
    rdata: u32,
    rng: Xoshiro256StarStar,
    stall_rate: f64,
    wait_rate: f64,
    stall_now: bool,
    wait_now: bool,
}

impl WbSramBridge {
    pub const QUEUE_DEPTH: usize = 2;

    pub fn new(word_bytes: u32, seed: u64, stall_rate: f64, wait_rate: f64) -> Self {
        Self {
            word_bytes,
            depth: Self::QUEUE_DEPTH,
            queue: VecDeque::with_capacity(Self::QUEUE_DEPTH),
            ack: false,
            rdata: 0,
            rng: Xoshiro256StarStar::seed_from_u64(seed),
            stall_rate,
            wait_rate,
            stall_now: false,
            wait_now: false,
        }
    }

    pub fn response(&self) -> WbResponse {
        WbResponse {
            ack: self.ack,
            stall: self.stall_now || self.queue.len() >= self.depth,
            data: self.rdata,
        }
    }

    fn serving(&self) -> Option<&Beat> {
        self.queue.front().filter(|_| !self.wait_now)
    }

    /// SRAM pins driven this cycle.
    pub fn sram_port(&self) -> SramPort {
        match self.serving() {
            Some(beat) => SramPort {
                addr: beat.addr / self.word_bytes,
                data: beat.data,
                chip_enable: true,
                output_enable: !beat.we,
                write_enable: beat.we,
                lanes: beat.sel as u8,
            },
            None => SramPort::default(),
        }
    }

    pub fn posedge(&mut self, req: &WbRequest, sram_rdata: u32, reset: bool) {
        if reset {
            self.queue.clear();
            self.ack = false;
            self.rdata = 0;
            self.stall_now = false;
            self.wait_now = false;
            return;
        }

        let stall = self.response().stall;
        match self.serving().copied() {
            Some(beat) => {
                self.ack = true;
                self.rdata = if beat.we { 0 } else { sram_rdata };
                self.queue.pop_front();
                log::trace!(
                    "wb target: {} {:#010x} = {:#06x}",
                    if beat.we { "wrote" } else { "read" },
                    beat.addr,
                    if beat.we { beat.data } else { sram_rdata }
                );
            }
            None => {
                self.ack = false;
                self.rdata = 0;
            }
        }

        if req.cyc && req.stb && !stall {
            self.queue.push_back(Beat {
                we: req.we,
                addr: req.addr,
                data: req.data,
                sel: req.sel,
            });
        }

        self.stall_now = self.stall_rate > 0.0 && self.rng.gen_bool(self.stall_rate);
        self.wait_now = self.wait_rate > 0.0 && self.rng.gen_bool(self.wait_rate);
    }
}
