//! Clocked benches wiring the driver, BIU, device, backing store and checkers.
//!
//! Every tick settles all outputs from the state left by the previous edge,
//! then commits every component from that snapshot. No component can see
//! another's next state within the same tick.

use crate::biu::{Biu, BiuState};
use crate::config::{BenchConfig, Geometry};
use crate::driver::{Driver, DriverStats, Stimulus};
use crate::dut::{CacheRequest, Dut, DutInputs, DutOutputs, SoftDut};
use crate::error::{ConfigError, VerifyError};
use crate::monitor::Monitor;
use crate::roundtrip::{LineChecker, LineDriver};
use crate::sram::Sram;

/// Combinational passes allowed for the SRAM read path to settle.
const SETTLE_PASSES: usize = 4;

/// Seed offset so the bus target's stalls do not mirror the stimulus stream.
const TARGET_SEED_SALT: u64 = 0x9e37_79b9_7f4a_7c15;

/// Evaluate the device until the SRAM pins and read data agree.
fn settle<D: Dut>(dut: &mut D, sram: &Sram, inputs: &mut DutInputs) -> DutOutputs {
    let mut outputs = dut.settle(inputs);
    for _ in 0..SETTLE_PASSES {
        let rdata = sram.read(&outputs.sram);
        if rdata == inputs.sram_rdata {
            break;
        }
        inputs.sram_rdata = rdata;
        outputs = dut.settle(inputs);
    }
    outputs
}

/// Software device seeded from the bench configuration.
pub fn soft_dut(config: &BenchConfig) -> Result<SoftDut, ConfigError> {
    let geometry = config.geometry()?;
    Ok(SoftDut::new(
        geometry,
        config.seed ^ TARGET_SEED_SALT,
        config.stall_rate,
        config.wait_rate,
    ))
}

/// Counts reported at the end of a passing run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BenchReport {
    pub cycles: u64,
    pub line_transfers: u64,
    pub driver: DriverStats,
    pub stores_checked: u64,
    pub loads_checked: u64,
    pub lines_checked: u64,
}

/// Tracks how long the BIU has been away from idle.
#[derive(Debug, Clone, Copy)]
struct Watchdog {
    limit: u64,
    busy_for: u64,
}

impl Watchdog {
    fn new(limit: u64) -> Self {
        Self { limit, busy_for: 0 }
    }

    fn check(&mut self, cycle: u64, biu: &Biu, addr: u32) -> Result<(), VerifyError> {
        if biu.state() == BiuState::Idle {
            self.busy_for = 0;
            return Ok(());
        }
        self.busy_for += 1;
        if self.busy_for > self.limit {
            log::error!("cycle {cycle}: bus transaction at {addr:#010x} never completed");
            return Err(VerifyError::Watchdog {
                cycle,
                addr,
                waited: self.busy_for,
            });
        }
        Ok(())
    }
}

/// Random cache traffic against a device, checked by the monitor.
pub struct CacheBench<D: Dut> {
    config: BenchConfig,
    geometry: Geometry,
    dut: D,
    sram: Sram,
    biu: Biu,
    driver: Driver,
    monitor: Monitor,
    watchdog: Watchdog,
    inputs: DutInputs,
    cycle: u64,
}

impl CacheBench<SoftDut> {
    pub fn soft(config: BenchConfig) -> Result<Self, ConfigError> {
        let dut = soft_dut(&config)?;
        Self::new(config, dut)
    }
}

impl<D: Dut> CacheBench<D> {
    pub fn new(config: BenchConfig, dut: D) -> Result<Self, ConfigError> {
        let geometry = config.geometry()?;
        let stimulus = Stimulus::new(config.seed, config.addr_span(), geometry.data_width());
        Ok(Self {
            sram: Sram::new(config.memory_bytes, geometry.bus_bytes())?,
            biu: Biu::new(geometry),
            driver: Driver::new(geometry, stimulus),
            monitor: Monitor::new(geometry, config.memory_bytes),
            watchdog: Watchdog::new(config.watchdog_cycles),
            inputs: DutInputs::default(),
            cycle: 0,
            config,
            geometry,
            dut,
        })
    }

    /// Load the backing store and the monitor's model from the same image.
    pub fn load_image(&mut self, image: &[u8]) -> usize {
        self.monitor.preload(image);
        self.sram.load(image)
    }

    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    pub fn driver(&self) -> &Driver {
        &self.driver
    }

    pub fn biu(&self) -> &Biu {
        &self.biu
    }

    pub fn monitor(&self) -> &Monitor {
        &self.monitor
    }

    pub fn sram(&self) -> &Sram {
        &self.sram
    }

    pub fn tick(&mut self) -> Result<(), VerifyError> {
        let reset = self.cycle < self.config.reset_cycles;

        let driver = self.driver.outputs();
        let biu = self.biu.outputs();
        self.inputs.reset = reset;
        self.inputs.cache = driver.cache.clone();
        self.inputs.bus = biu.bus;
        let outputs = settle(&mut self.dut, &self.sram, &mut self.inputs);

        if !reset {
            self.monitor.observe(self.cycle, &driver.cache, &outputs.cache)?;
        }
        self.sram.posedge(&outputs.sram);
        self.dut.posedge(&self.inputs);
        self.biu.posedge(&driver.biu, &outputs.bus, reset);
        self.driver.posedge(&outputs.cache, &biu, reset);
        self.watchdog.check(self.cycle, &self.biu, driver.biu.addr)?;

        self.cycle += 1;
        Ok(())
    }

    pub fn run_for(&mut self, cycles: u64) -> Result<(), VerifyError> {
        for _ in 0..cycles {
            self.tick()?;
        }
        Ok(())
    }

    /// Tick until `max_cycles` or the first verification failure.
    pub fn run(&mut self) -> Result<BenchReport, VerifyError> {
        log::info!(
            "cache bench: seed {:#x}, {} cycles",
            self.config.seed,
            self.config.max_cycles
        );
        while self.cycle < self.config.max_cycles {
            self.tick()?;
        }
        Ok(self.report())
    }

    pub fn report(&self) -> BenchReport {
        BenchReport {
            cycles: self.cycle,
            line_transfers: self.biu.completed(),
            driver: self.driver.stats(),
            stores_checked: self.monitor.stores(),
            loads_checked: self.monitor.loads(),
            lines_checked: 0,
        }
    }
}

/// Line write/read-back traffic straight through the BIU, no cache involved.
pub struct LineBench<D: Dut> {
    config: BenchConfig,
    geometry: Geometry,
    dut: D,
    sram: Sram,
    biu: Biu,
    driver: LineDriver,
    checker: LineChecker,
    watchdog: Watchdog,
    inputs: DutInputs,
    cycle: u64,
}

impl LineBench<SoftDut> {
    pub fn soft(config: BenchConfig) -> Result<Self, ConfigError> {
        let dut = soft_dut(&config)?;
        Self::new(config, dut)
    }
}

impl<D: Dut> LineBench<D> {
    pub fn new(config: BenchConfig, dut: D) -> Result<Self, ConfigError> {
        let geometry = config.geometry()?;
        Ok(Self {
            sram: Sram::new(config.memory_bytes, geometry.bus_bytes())?,
            biu: Biu::new(geometry),
            driver: LineDriver::new(geometry, config.memory_bytes, config.seed),
            checker: LineChecker::default(),
            watchdog: Watchdog::new(config.watchdog_cycles),
            inputs: DutInputs::default(),
            cycle: 0,
            config,
            geometry,
            dut,
        })
    }

    pub fn load_image(&mut self, image: &[u8]) -> usize {
        self.sram.load(image)
    }

    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    pub fn checker(&self) -> &LineChecker {
        &self.checker
    }

    pub fn sram(&self) -> &Sram {
        &self.sram
    }

    pub fn tick(&mut self) -> Result<(), VerifyError> {
        let reset = self.cycle < self.config.reset_cycles;

        let req = self.driver.outputs();
        let biu = self.biu.outputs();
        self.inputs.reset = reset;
        self.inputs.cache = CacheRequest::default();
        self.inputs.bus = biu.bus;
        let outputs = settle(&mut self.dut, &self.sram, &mut self.inputs);

        if !reset {
            self.checker.observe(self.cycle, &self.geometry, &req, &biu)?;
        }
        self.sram.posedge(&outputs.sram);
        self.dut.posedge(&self.inputs);
        self.biu.posedge(&req, &outputs.bus, reset);
        self.driver.posedge(&biu, reset);
        self.watchdog.check(self.cycle, &self.biu, req.addr)?;

        self.cycle += 1;
        Ok(())
    }

    pub fn run(&mut self) -> Result<BenchReport, VerifyError> {
        log::info!(
            "line bench: seed {:#x}, {} cycles",
            self.config.seed,
            self.config.max_cycles
        );
        while self.cycle < self.config.max_cycles {
            self.tick()?;
        }
        Ok(self.report())
    }

    pub fn report(&self) -> BenchReport {
        BenchReport {
            cycles: self.cycle,
            line_transfers: self.biu.completed(),
            lines_checked: self.checker.checked(),
            ..BenchReport::default()
        }
    }
}
