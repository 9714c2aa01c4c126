//! Independent checker of cache-port traffic.
//!
//! The monitor keeps its own byte array of what memory should hold and
//! never looks at the backing store the bus writes into.

use crate::config::{CacheAddress, Geometry};
use crate::dut::{CacheRequest, CacheResponse};
use crate::error::VerifyError;

#[derive(Debug, Clone)]
pub struct Monitor {
    geometry: Geometry,
    mem: Vec<u8>,
    stores: u64,
    loads: u64,
}

impl Monitor {
    pub fn new(geometry: Geometry, memory_bytes: u32) -> Self {
        Self {
            geometry,
            mem: vec![0; memory_bytes as usize],
            stores: 0,
            loads: 0,
        }
    }

    /// Seed the model with the same image the backing store was loaded from.
    pub fn preload(&mut self, image: &[u8]) {
        let len = image.len().min(self.mem.len());
        self.mem[..len].copy_from_slice(&image[..len]);
    }

    pub fn stores(&self) -> u64 {
        self.stores
    }

    /// Loads compared against the model.
    pub fn loads(&self) -> u64 {
        self.loads
    }

    /// Byte addresses taking part in an access at `addr`.
    ///
    /// Byte `i` joins only while no address `addr + 1 ..= addr + i` wraps to
    /// zero or starts a new line.
    fn lanes(&self, addr: u32) -> impl Iterator<Item = (u32, u32)> + '_ {
        let mask = self.geometry.addr_mask();
        let line = self.geometry.line_size();
        (0..self.geometry.data_bytes())
            .map(move |i| (i, addr.wrapping_add(i) & mask))
            .take_while(move |&(i, a)| i == 0 || (a != 0 && a % line != 0))
    }

    fn byte(&self, addr: u32) -> u8 {
        self.mem.get(addr as usize).copied().unwrap_or(0)
    }

    pub fn expected(&self, addr: u32) -> u32 {
        self.lanes(addr)
            .fold(0, |word, (i, a)| word | (self.byte(a) as u32) << (8 * i))
    }

    fn store(&mut self, addr: u32, data: u32) {
        let lanes: Vec<_> = self.lanes(addr).collect();
        for (i, a) in lanes {
            if let Some(byte) = self.mem.get_mut(a as usize) {
                *byte = (data >> (8 * i)) as u8;
            }
        }
    }

    /// Sample the cache port on a clock edge.
    pub fn observe(
        &mut self,
        cycle: u64,
        req: &CacheRequest,
        resp: &CacheResponse,
    ) -> Result<(), VerifyError> {
        let addr = self.geometry.compose(&CacheAddress {
            tag: req.tag,
            index: req.index,
            offset: req.offset,
        });

        if req.we && resp.hit {
            log::debug!("cycle {cycle} - STORE: {:#06x} to {addr:#010x}", req.wdata);
            self.store(addr, req.wdata);
            self.stores += 1;
        }

        if req.re && resp.hit {
            let expected = self.expected(addr);
            log::debug!(
                "cycle {cycle} - LOAD: {:#06x} = {expected:#06x} from {addr:#010x}",
                resp.rdata
            );
            self.loads += 1;
            if resp.rdata != expected {
                log::error!(
                    "cycle {cycle}: load mismatch at {addr:#010x}: dut {:#06x}, model {expected:#06x}",
                    resp.rdata
                );
                return Err(VerifyError::Mismatch {
                    cycle,
                    addr,
                    expected,
                    observed: resp.rdata,
                });
            }
        }
        Ok(())
    }
}
