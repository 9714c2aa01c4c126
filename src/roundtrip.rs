//! Line round-trip traffic: write a random line through the BIU, read it back.

use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256StarStar;

use crate::biu::{BiuOutputs, BiuRequest};
use crate::config::Geometry;
use crate::error::VerifyError;
use crate::line::LineData;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinePhase {
    Write,
    Read,
}

/// Alternates a line write and a read of the same address, forever.
#[derive(Debug, Clone)]
pub struct LineDriver {
    geometry: Geometry,
    rng: Xoshiro256StarStar,
    memory_bytes: u32,
    phase: LinePhase,
    enable: bool,
    /// The request for `phase` has completed.
    finished: bool,
    addr: u32,
    data: LineData,
}

impl LineDriver {
    pub fn new(geometry: Geometry, memory_bytes: u32, seed: u64) -> Self {
        let mut driver = Self {
            geometry,
            rng: Xoshiro256StarStar::seed_from_u64(seed),
            memory_bytes,
            phase: LinePhase::Write,
            enable: false,
            finished: false,
            addr: 0,
            data: LineData::zeroed(geometry.line_size()),
        };
        driver.next_line();
        driver
    }

    fn next_line(&mut self) {
        self.addr = self.rng.gen_range(0..self.memory_bytes);
        let mut bytes = vec![0u8; self.geometry.line_size() as usize];
        self.rng.fill(bytes.as_mut_slice());
        self.data = LineData::from_bytes(&bytes);
    }

    pub fn phase(&self) -> LinePhase {
        self.phase
    }

    pub fn outputs(&self) -> BiuRequest {
        BiuRequest {
            enable: self.enable,
            write: self.enable && self.phase == LinePhase::Write,
            addr: if self.enable { self.addr } else { 0 },
            data: if self.enable && self.phase == LinePhase::Write {
                self.data.clone()
            } else {
                LineData::zeroed(self.geometry.line_size())
            },
        }
    }

    pub fn posedge(&mut self, biu: &BiuOutputs, reset: bool) {
        if reset {
            self.enable = false;
            self.finished = false;
            self.phase = LinePhase::Write;
            return;
        }

        if self.enable {
            if biu.done {
                self.enable = false;
                self.finished = true;
            }
        } else if !biu.done {
            // The BIU is back in idle, start the next request.
            if self.finished {
                match self.phase {
                    LinePhase::Write => self.phase = LinePhase::Read,
                    LinePhase::Read => {
                        log::debug!("line {:#010x} read back", self.geometry.line_base(self.addr));
                        self.next_line();
                        self.phase = LinePhase::Write;
                    }
                }
                self.finished = false;
            }
            self.enable = true;
        }
    }
}

/// Captures each line write and compares the following read against it.
#[derive(Debug, Clone, Default)]
pub struct LineChecker {
    expected: Option<(u32, LineData)>,
    checked: u64,
}

impl LineChecker {
    pub fn checked(&self) -> u64 {
        self.checked
    }

    pub fn observe(
        &mut self,
        cycle: u64,
        geometry: &Geometry,
        req: &BiuRequest,
        out: &BiuOutputs,
    ) -> Result<(), VerifyError> {
        if !req.enable {
            return Ok(());
        }
        let addr = geometry.line_base(req.addr);
        if req.write {
            self.expected = Some((addr, req.data.clone()));
            return Ok(());
        }
        if !out.done {
            return Ok(());
        }
        let Some((written_addr, written)) = &self.expected else {
            return Ok(());
        };
        if *written_addr != addr {
            return Ok(());
        }

        self.checked += 1;
        log::debug!(
            "cycle {cycle} - {:?} = {:?} from {addr:#010x}",
            out.read_data,
            written
        );
        if out.read_data != *written {
            log::error!("cycle {cycle}: line mismatch at {addr:#010x}");
            return Err(VerifyError::LineMismatch {
                cycle,
                addr,
                written: written.as_bytes().to_vec(),
                read: out.read_data.as_bytes().to_vec(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BenchConfig;
    use crate::wishbone::WbRequest;

    fn geometry() -> Geometry {
        BenchConfig::default().geometry().unwrap()
    }

    fn biu(done: bool, read_data: LineData) -> BiuOutputs {
        BiuOutputs {
            bus: WbRequest::default(),
            busy: !done,
            done,
            read_data,
        }
    }

    #[test]
    fn test_driver_alternates_write_and_read() {
        let g = geometry();
        let mut drv = LineDriver::new(g, 1 << 16, 5);
        let idle = biu(false, LineData::zeroed(32));
        let done = biu(true, LineData::zeroed(32));

        drv.posedge(&idle, false);
        let write = drv.outputs();
        assert!(write.enable && write.write);

        drv.posedge(&done, false);
        assert!(!drv.outputs().enable);
        // Held off while the BIU still reports done.
        drv.posedge(&done, false);
        assert!(!drv.outputs().enable);

        drv.posedge(&idle, false);
        let read = drv.outputs();
        assert_eq!(drv.phase(), LinePhase::Read);
        assert!(read.enable && !read.write);
        assert_eq!(read.addr, write.addr);
    }

    #[test]
    fn test_checker_flags_corrupt_line() {
        let g = geometry();
        let mut checker = LineChecker::default();
        let mut written = LineData::zeroed(32);
        written.set_byte(3, 0x77);

        let write = BiuRequest {
            enable: true,
            write: true,
            addr: 0x240,
            data: written.clone(),
        };
        checker
            .observe(0, &g, &write, &biu(false, LineData::zeroed(32)))
            .unwrap();

        let read = BiuRequest {
            enable: true,
            write: false,
            addr: 0x240,
            data: LineData::zeroed(32),
        };
        checker.observe(1, &g, &read, &biu(true, written)).unwrap();
        assert_eq!(checker.checked(), 1);

        let err = checker
            .observe(2, &g, &read, &biu(true, LineData::zeroed(32)))
            .unwrap_err();
        assert!(matches!(err, VerifyError::LineMismatch { addr: 0x240, .. }));
    }
}
