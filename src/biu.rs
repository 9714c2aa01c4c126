//! Wishbone bus interface unit.
//!
//! Turns one line-wide read or write into `total_beats` pipelined bus beats.
//! Requests and acknowledgements are counted independently: acks may start
//! arriving while later beats are still being requested, and a stalled beat
//! is re-driven until the target takes it.

use crate::config::Geometry;
use crate::line::LineData;
use crate::wishbone::{WbRequest, WbResponse};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BiuState {
    Idle,
    Requesting,
    Acknowledging,
    Done,
}

/// Caller-side inputs. `enable` is held until `done` is seen.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BiuRequest {
    pub enable: bool,
    pub write: bool,
    pub addr: u32,
    pub data: LineData,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BiuOutputs {
    pub bus: WbRequest,
    pub busy: bool,
    pub done: bool,
    /// Assembled line, only meaningful while `done` is high.
    pub read_data: LineData,
}

#[derive(Debug, Clone)]
pub struct Biu {
    geometry: Geometry,
    state: BiuState,
    write: bool,
    addr: u32,
    write_data: LineData,
    read_data: LineData,
    beats_sent: u32,
    beats_acked: u32,
    completed: u64,
}

impl Biu {
    pub fn new(geometry: Geometry) -> Self {
        Self {
            geometry,
            state: BiuState::Idle,
            write: false,
            addr: 0,
            write_data: LineData::zeroed(geometry.line_size()),
            read_data: LineData::zeroed(geometry.line_size()),
            beats_sent: 0,
            beats_acked: 0,
            completed: 0,
        }
    }

    pub fn state(&self) -> BiuState {
        self.state
    }

    pub fn beats_sent(&self) -> u32 {
        self.beats_sent
    }

    pub fn beats_acked(&self) -> u32 {
        self.beats_acked
    }

    /// Line transfers that have reached `Done` since construction.
    pub fn completed(&self) -> u64 {
        self.completed
    }

    pub fn outputs(&self) -> BiuOutputs {
        let idle_bus = WbRequest::default();
        match self.state {
            BiuState::Idle => BiuOutputs {
                bus: idle_bus,
                busy: false,
                done: false,
                read_data: LineData::zeroed(self.geometry.line_size()),
            },
            BiuState::Requesting => {
                let width = self.geometry.bus_width();
                BiuOutputs {
                    bus: WbRequest {
                        cyc: true,
                        stb: true,
                        we: self.write,
                        sel: self.geometry.bus_sel(),
                        addr: self
                            .addr
                            .wrapping_add(self.beats_sent * self.geometry.bus_bytes()),
                        data: if self.write {
                            self.write_data.word(self.beats_sent, width)
                        } else {
                            0
                        },
                    },
                    busy: true,
                    done: false,
                    read_data: LineData::zeroed(self.geometry.line_size()),
                }
            }
            BiuState::Acknowledging => BiuOutputs {
                bus: WbRequest {
                    cyc: true,
                    ..idle_bus
                },
                busy: true,
                done: false,
                read_data: LineData::zeroed(self.geometry.line_size()),
            },
            BiuState::Done => BiuOutputs {
                bus: idle_bus,
                busy: false,
                done: true,
                read_data: self.read_data.clone(),
            },
        }
    }

    fn enter_idle(&mut self) {
        self.state = BiuState::Idle;
        self.beats_sent = 0;
        self.beats_acked = 0;
    }

    /// Rising clock edge. `req` and `bus` are the values settled during the cycle.
    pub fn posedge(&mut self, req: &BiuRequest, bus: &WbResponse, reset: bool) {
        if reset {
            self.enter_idle();
            return;
        }

        match self.state {
            BiuState::Idle => {
                if req.enable {
                    self.write = req.write;
                    self.addr = self.geometry.line_base(req.addr);
                    // Short or long lines are fitted to the configured size.
                    self.write_data = if req.write {
                        req.data.resized(self.geometry.line_size())
                    } else {
                        LineData::zeroed(self.geometry.line_size())
                    };
                    self.read_data = LineData::zeroed(self.geometry.line_size());
                    self.state = BiuState::Requesting;
                    log::trace!(
                        "biu: {} line {:#010x}",
                        if self.write { "write" } else { "read" },
                        self.addr
                    );
                }
            }
            BiuState::Requesting | BiuState::Acknowledging => {
                let total = self.geometry.total_beats();
                let issued = self.state == BiuState::Requesting && !bus.stall;
                // A target may ack the beat it is accepting in the same cycle.
                let outstanding = self.beats_sent + u32::from(issued);

                if bus.ack {
                    if self.beats_acked < outstanding {
                        if !self.write {
                            self.read_data.set_word(
                                self.beats_acked,
                                self.geometry.bus_width(),
                                bus.data,
                            );
                        }
                        self.beats_acked += 1;
                    } else {
                        log::warn!(
                            "biu: ignoring ack with no beat outstanding ({}/{} acked)",
                            self.beats_acked,
                            self.beats_sent
                        );
                    }
                }
                if issued {
                    self.beats_sent += 1;
                }

                if self.beats_acked == total {
                    self.state = BiuState::Done;
                    self.completed += 1;
                    log::trace!("biu: line {:#010x} done", self.addr);
                } else if self.beats_sent == total {
                    self.state = BiuState::Acknowledging;
                }
            }
            BiuState::Done => {
                if !req.enable {
                    self.enter_idle();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BenchConfig;

    fn geometry() -> Geometry {
        BenchConfig::default().geometry().unwrap()
    }

    fn request(write: bool, addr: u32, data: LineData) -> BiuRequest {
        BiuRequest {
            enable: true,
            write,
            addr,
            data,
        }
    }

    #[test]
    fn test_idle_latches_line_aligned_address() {
        let mut biu = Biu::new(geometry());
        biu.posedge(
            &request(false, 0x1037, LineData::zeroed(32)),
            &WbResponse::default(),
            false,
        );
        assert_eq!(biu.state(), BiuState::Requesting);
        let out = biu.outputs();
        assert!(out.busy && out.bus.cyc && out.bus.stb && !out.bus.we);
        assert_eq!(out.bus.addr, 0x1020);
        assert_eq!(out.bus.sel, 0b11);
    }

    #[test]
    fn test_stall_holds_the_current_beat() {
        let mut biu = Biu::new(geometry());
        let mut line = LineData::zeroed(32);
        line.set_word(0, 16, 0xaaaa);
        line.set_word(1, 16, 0xbbbb);
        let req = request(true, 0x40, line);
        biu.posedge(&req, &WbResponse::default(), false);

        let stall = WbResponse {
            stall: true,
            ..WbResponse::default()
        };
        biu.posedge(&req, &stall, false);
        assert_eq!(biu.beats_sent(), 0);
        assert_eq!(biu.outputs().bus.data, 0xaaaa);

        biu.posedge(&req, &WbResponse::default(), false);
        assert_eq!(biu.beats_sent(), 1);
        let out = biu.outputs();
        assert_eq!(out.bus.addr, 0x42);
        assert_eq!(out.bus.data, 0xbbbb);
    }

    #[test]
    fn test_stalled_final_beat_is_not_skipped() {
        let mut biu = Biu::new(geometry());
        let req = request(true, 0, LineData::zeroed(32));
        biu.posedge(&req, &WbResponse::default(), false);
        for _ in 0..15 {
            biu.posedge(&req, &WbResponse::default(), false);
        }
        assert_eq!(biu.beats_sent(), 15);
        let stall = WbResponse {
            stall: true,
            ..WbResponse::default()
        };
        biu.posedge(&req, &stall, false);
        assert_eq!(biu.state(), BiuState::Requesting);
        biu.posedge(&req, &WbResponse::default(), false);
        assert_eq!(biu.state(), BiuState::Acknowledging);
        assert_eq!(biu.beats_sent(), 16);
    }

    #[test]
    fn test_spurious_ack_is_ignored() {
        let mut biu = Biu::new(geometry());
        let req = request(false, 0, LineData::zeroed(32));
        biu.posedge(&req, &WbResponse::default(), false);
        let ack_and_stall = WbResponse {
            ack: true,
            stall: true,
            data: 0x1111,
        };
        biu.posedge(&req, &ack_and_stall, false);
        assert_eq!(biu.beats_acked(), 0);
    }

    #[test]
    fn test_done_waits_for_enable_low() {
        let mut biu = Biu::new(geometry());
        let req = request(false, 0x100, LineData::zeroed(32));
        let ack = |data| WbResponse {
            ack: true,
            stall: false,
            data,
        };
        biu.posedge(&req, &WbResponse::default(), false);
        // Zero-latency target: every beat acked as it is taken.
        for beat in 0..16 {
            biu.posedge(&req, &ack(beat), false);
        }
        assert_eq!(biu.state(), BiuState::Done);
        let out = biu.outputs();
        assert!(out.done && !out.busy && !out.bus.cyc);
        assert_eq!(out.read_data.word(5, 16), 5);

        biu.posedge(&req, &WbResponse::default(), false);
        assert_eq!(biu.state(), BiuState::Done);
        biu.posedge(&BiuRequest::default(), &WbResponse::default(), false);
        assert_eq!(biu.state(), BiuState::Idle);
        assert_eq!((biu.beats_sent(), biu.beats_acked()), (0, 0));
        assert_eq!(biu.completed(), 1);
    }

    #[test]
    fn test_default_line_data_is_padded() {
        let mut biu = Biu::new(geometry());
        let req = BiuRequest {
            enable: true,
            write: true,
            ..BiuRequest::default()
        };
        biu.posedge(&req, &WbResponse::default(), false);
        for _ in 0..16 {
            assert_eq!(biu.outputs().bus.data, 0);
            biu.posedge(&req, &WbResponse::default(), false);
        }
        assert_eq!(biu.state(), BiuState::Acknowledging);
        assert_eq!(biu.beats_sent(), 16);
    }

    #[test]
    fn test_reset_clears_transfer() {
        let mut biu = Biu::new(geometry());
        let req = request(true, 0, LineData::zeroed(32));
        biu.posedge(&req, &WbResponse::default(), false);
        biu.posedge(&req, &WbResponse::default(), false);
        biu.posedge(&req, &WbResponse::default(), true);
        assert_eq!(biu.state(), BiuState::Idle);
        assert_eq!(biu.beats_sent(), 0);
    }
}
