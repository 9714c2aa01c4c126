use cache_tb::{
    BenchConfig, Biu, BiuRequest, BiuState, CacheBench, ConfigError, Geometry, LineBench,
    LineData, Sram, SramPort, WbSramBridge,
};
use proptest::prelude::*;

/// BIU wired to the software bus target and SRAM.
struct Harness {
    biu: Biu,
    bridge: WbSramBridge,
    sram: Sram,
}

impl Harness {
    fn new(seed: u64, stall_rate: f64, wait_rate: f64) -> Self {
        let geometry = BenchConfig::default().geometry().unwrap();
        Self {
            biu: Biu::new(geometry),
            bridge: WbSramBridge::new(geometry.bus_bytes(), seed, stall_rate, wait_rate),
            sram: Sram::new(1 << 16, geometry.bus_bytes()).unwrap(),
        }
    }

    fn step(&mut self, req: &BiuRequest) {
        let out = self.biu.outputs();
        let resp = self.bridge.response();
        let port = self.bridge.sram_port();
        let rdata = self.sram.read(&port);
        self.sram.posedge(&port);
        self.bridge.posedge(&out.bus, rdata, false);
        self.biu.posedge(req, &resp, false);
    }

    fn transfer(&mut self, write: bool, addr: u32, data: LineData) -> LineData {
        let req = BiuRequest {
            enable: true,
            write,
            addr,
            data,
        };
        for _ in 0..10_000 {
            let out = self.biu.outputs();
            if out.done {
                self.step(&BiuRequest::default());
                return out.read_data;
            }
            self.step(&req);
        }
        panic!("transfer to {addr:#x} never completed");
    }
}

/// Generate a random 32-byte line
fn line_data() -> impl Strategy<Value = LineData> {
    prop::collection::vec(any::<u8>(), 32).prop_map(|bytes| LineData::from_bytes(&bytes))
}

/// Probability of a stall or wait state from the bus target
fn backpressure() -> impl Strategy<Value = f64> {
    0.0..0.6f64
}

#[cfg(test)]
mod property_tests {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        /// Property: acked <= sent <= total at every edge, and done only once every beat is acked
        #[test]
        fn prop_beat_counters_stay_ordered(
            seed in any::<u64>(),
            stall_rate in 0.0..0.8f64,
            wait_rate in 0.0..0.8f64,
            write in any::<bool>(),
            addr in 0u32..0xffe0,
        ) {
            let mut h = Harness::new(seed, stall_rate, wait_rate);
            let req = BiuRequest {
                enable: true,
                write,
                addr,
                data: LineData::zeroed(32),
            };

            let (mut sent, mut acked) = (0, 0);
            for _ in 0..2_000 {
                h.step(&req);
                let biu = &h.biu;
                prop_assert!(biu.beats_acked() <= biu.beats_sent());
                prop_assert!(biu.beats_sent() <= 16);
                prop_assert!(biu.beats_sent() >= sent);
                prop_assert!(biu.beats_acked() >= acked);
                prop_assert_eq!(biu.outputs().done, biu.beats_acked() == 16);
                prop_assert_eq!(biu.outputs().busy, biu.state() != BiuState::Done);
                sent = biu.beats_sent();
                acked = biu.beats_acked();
                if biu.state() == BiuState::Done {
                    break;
                }
            }
            prop_assert_eq!(h.biu.state(), BiuState::Done);
        }

        /// Property: a line written through the BIU reads back unchanged
        #[test]
        fn prop_write_then_read_returns_line(
            seed in any::<u64>(),
            stall_rate in backpressure(),
            wait_rate in backpressure(),
            slot in 0u32..2048,
            data in line_data(),
        ) {
            let mut h = Harness::new(seed, stall_rate, wait_rate);
            let addr = slot * 32;
            h.transfer(true, addr, data.clone());
            prop_assert_eq!(&h.sram.bytes()[addr as usize..addr as usize + 32], data.as_bytes());
            prop_assert_eq!(h.transfer(false, addr, LineData::zeroed(32)), data);
        }

        /// Property: disabled byte lanes are never written and always read zero
        #[test]
        fn prop_sram_leaves_disabled_lanes(
            word in 0u32..8,
            value in any::<u32>(),
            lanes in 0u8..16,
            wide in any::<bool>(),
        ) {
            let word_bytes = if wide { 4 } else { 2 };
            let lanes = lanes & ((1 << word_bytes) - 1);
            let mut sram = Sram::new(64, word_bytes).unwrap();
            sram.load(&[0x5a; 64]);

            sram.posedge(&SramPort {
                addr: word,
                data: value,
                chip_enable: true,
                output_enable: false,
                write_enable: true,
                lanes,
            });

            let base = (word * word_bytes) as usize;
            for lane in 0..word_bytes as usize {
                let expected = if lanes & (1 << lane) != 0 {
                    (value >> (8 * lane)) as u8
                } else {
                    0x5a
                };
                prop_assert_eq!(sram.bytes()[base + lane], expected);
            }

            let read = sram.read(&SramPort {
                addr: word,
                data: 0,
                chip_enable: true,
                output_enable: true,
                write_enable: false,
                lanes,
            });
            for lane in 0..word_bytes as usize {
                let byte = (read >> (8 * lane)) as u8;
                if lanes & (1 << lane) == 0 {
                    prop_assert_eq!(byte, 0);
                } else {
                    prop_assert_eq!(byte, sram.bytes()[base + lane]);
                }
            }
        }

        /// Property: a geometry exists only when the bus width divides the line
        #[test]
        fn prop_bus_width_must_divide_line(
            line_shift in 0u32..8,
            bus_width in prop::sample::select(vec![8u32, 16, 32]),
        ) {
            let line_size = 1u32 << line_shift;
            let result = Geometry::new(32, 16, bus_width, line_size, line_size * 8);
            if (line_size * 8) % bus_width == 0 {
                let geometry = result.unwrap();
                prop_assert_eq!(geometry.total_beats() * bus_width, line_size * 8);
            } else {
                let rejected = matches!(result, Err(ConfigError::BusWidthMismatch { .. }));
                prop_assert!(rejected);
            }
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(12))]

        /// Property: the software device passes the cache bench for any seed and backpressure
        #[test]
        fn prop_cache_bench_passes_any_seed(
            seed in any::<u64>(),
            stall_rate in 0.0..0.5f64,
            wait_rate in 0.0..0.5f64,
            wide in any::<bool>(),
        ) {
            let config = BenchConfig {
                seed,
                stall_rate,
                wait_rate,
                data_width: if wide { 32 } else { 16 },
                max_cycles: 4_000,
                ..BenchConfig::default()
            };
            let report = CacheBench::soft(config).unwrap().run();
            prop_assert!(report.is_ok(), "{:?}", report);
        }

        /// Property: every line read back matches the line written
        #[test]
        fn prop_line_bench_passes_any_seed(
            seed in any::<u64>(),
            stall_rate in 0.0..0.5f64,
            wait_rate in 0.0..0.5f64,
        ) {
            let config = BenchConfig {
                seed,
                stall_rate,
                wait_rate,
                max_cycles: 2_000,
                ..BenchConfig::default()
            };
            let report = LineBench::soft(config).unwrap().run();
            prop_assert!(report.is_ok(), "{:?}", report);
        }
    }
}
