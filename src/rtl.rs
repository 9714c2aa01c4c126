//! Verilated RTL top bound through marlin.
//!
//! The top exposes the cache port, the Wishbone slave port and the SRAM
//! controller pins with the names below. Lines travel as 32-bit word arrays.

use camino::Utf8Path;
use eyre::Result;
use marlin::{
    verilator::{VerilatorRuntime, VerilatorRuntimeOptions},
    verilog::prelude::*,
};

use crate::dut::{CacheResponse, Dut, DutInputs, DutOutputs};
use crate::line::LineData;
use crate::sram::SramPort;
use crate::wishbone::WbResponse;

/// Words in a line port of the compiled top (256-bit lines).
pub const LINE_WORDS: usize = 8;

#[verilog(src = "rtl/dut.sv", name = "dut")]
pub struct CacheDutRtl;

/// Build a runtime for the top in `rtl/dut.sv` plus any extra sources.
pub fn create_dut_runtime(extra_sources: &[&Utf8Path]) -> Result<VerilatorRuntime> {
    let include_paths = [Utf8Path::new("rtl"), Utf8Path::new(".")];
    let mut src_files = vec![Utf8Path::new("rtl/dut.sv")];
    src_files.extend_from_slice(extra_sources);

    VerilatorRuntime::new(
        Utf8Path::new("artifacts"),
        &src_files,
        &include_paths,
        [],
        VerilatorRuntimeOptions::default_logging(),
    )
    .map_err(|e| eyre::eyre!("Failed to create runtime: {}", e))
}

fn line_words(line: &LineData) -> [u32; LINE_WORDS] {
    std::array::from_fn(|k| line.word(k as u32, 32))
}

fn words_line(words: &[u32; LINE_WORDS]) -> LineData {
    let mut line = LineData::zeroed((LINE_WORDS * 4) as u32);
    for (k, word) in words.iter().enumerate() {
        line.set_word(k as u32, 32, *word);
    }
    line
}

impl<'ctx> CacheDutRtl<'ctx> {
    fn drive(&mut self, inputs: &DutInputs) {
        let cache = &inputs.cache;
        self.n_rst = u8::from(!inputs.reset);
        self.i_cache_re = u8::from(cache.re);
        self.i_cache_we = u8::from(cache.we);
        self.i_cache_fe = u8::from(cache.fe);
        self.i_cache_valid = u8::from(cache.valid);
        self.i_cache_tag = cache.tag;
        self.i_cache_index = cache.index;
        self.i_cache_offset = cache.offset;
        self.i_cache_wdata = cache.wdata;
        self.i_cache_fdata = line_words(&cache.fdata);

        let bus = &inputs.bus;
        self.i_wb_cyc = u8::from(bus.cyc);
        self.i_wb_stb = u8::from(bus.stb);
        self.i_wb_we = u8::from(bus.we);
        self.i_wb_sel = bus.sel;
        self.i_wb_addr = bus.addr;
        self.i_wb_data = bus.data;

        self.i_sram_dq = inputs.sram_rdata;
    }

    fn sample(&self) -> DutOutputs {
        DutOutputs {
            cache: CacheResponse {
                hit: self.o_cache_hit != 0,
                dirty: self.o_cache_dirty != 0,
                victim_tag: self.o_cache_tag,
                rdata: self.o_cache_rdata,
                vdata: words_line(&self.o_cache_vdata),
            },
            bus: WbResponse {
                ack: self.o_wb_ack != 0,
                stall: self.o_wb_stall != 0,
                data: self.o_wb_data,
            },
            // SRAM control pins are active low on the device.
            sram: SramPort {
                addr: self.o_sram_addr,
                data: self.o_sram_dq,
                chip_enable: self.o_sram_ce_n == 0,
                output_enable: self.o_sram_oe_n == 0,
                write_enable: self.o_sram_we_n == 0,
                lanes: u8::from(self.o_sram_lb_n == 0) | (u8::from(self.o_sram_ub_n == 0) << 1),
            },
        }
    }
}

impl<'ctx> Dut for CacheDutRtl<'ctx> {
    fn settle(&mut self, inputs: &DutInputs) -> DutOutputs {
        self.drive(inputs);
        self.clk = 0;
        self.eval();
        self.sample()
    }

    fn posedge(&mut self, inputs: &DutInputs) {
        self.drive(inputs);

        // Rising edge
        self.clk = 1;
        self.eval();

        // Falling edge
        self.clk = 0;
        self.eval();
    }
}
