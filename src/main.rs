use camino::Utf8PathBuf;
use clap::{Parser, ValueEnum};
use eyre::{Result, WrapErr};
use std::io::{self, BufWriter};
use std::time::{SystemTime, UNIX_EPOCH};

use cache_tb::image::{load_image, ImageFormat};
use cache_tb::{BenchConfig, BenchReport, CacheBench, LineBench, VerifyError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Bench {
    /// Random cache loads/stores with miss, fill and victim handling.
    Cache,
    /// Line write then read-back straight through the bus interface unit.
    Line,
}

#[derive(Parser, Debug)]
#[command(name = "cache-tb", version, about = "Cycle-level cache and bus verification bench")]
struct Cli {
    #[arg(long, value_enum, default_value_t = Bench::Cache)]
    bench: Bench,

    /// Stimulus seed; taken from the clock when omitted.
    #[arg(long)]
    seed: Option<u64>,

    #[arg(long, default_value_t = 100_000)]
    cycles: u64,

    /// Memory image loaded into the backing store before the run.
    #[arg(long)]
    image: Option<Utf8PathBuf>,

    /// Image encoding; guessed from the extension when omitted.
    #[arg(long, value_enum)]
    format: Option<ImageFormat>,

    /// Cache-port load/store width in bits (16 or 32).
    #[arg(long, default_value_t = 16)]
    data_width: u32,

    #[arg(long, default_value_t = 0.0)]
    stall_rate: f64,

    #[arg(long, default_value_t = 0.0)]
    wait_rate: f64,

    /// Cycles a line transfer may stay busy; scaled from the stall and wait rates when omitted.
    #[arg(long)]
    watchdog_cycles: Option<u64>,

    /// Dump this many bytes of the backing store as hex after a passing run.
    #[arg(long)]
    dump: Option<usize>,

    /// Drive the Verilated RTL top instead of the software device.
    #[cfg(feature = "verilator")]
    #[arg(long)]
    rtl: bool,
}

fn clock_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or_default()
}

fn print_report(report: &BenchReport) {
    println!("📊 {} cycles, {} line transfers", report.cycles, report.line_transfers);
    let d = &report.driver;
    if d.issued > 0 {
        println!(
            "   {} ops: {} hits, {} misses, {} fills, {} victims",
            d.issued, d.hits, d.misses, d.fills, d.victims
        );
        println!(
            "   {} stores and {} loads checked",
            report.stores_checked, report.loads_checked
        );
    }
    if report.lines_checked > 0 {
        println!("   {} lines read back and checked", report.lines_checked);
    }
}

fn verdict(result: std::result::Result<BenchReport, VerifyError>) -> Result<BenchReport> {
    match result {
        Ok(report) => {
            println!("\n\n*********************************    PASS    *********************************");
            Ok(report)
        }
        Err(e) => {
            println!("\n\n*********************************    FAIL    *********************************");
            Err(e).wrap_err("Verification failed")
        }
    }
}

#[cfg(feature = "verilator")]
fn run_rtl(config: BenchConfig, image: Option<&[u8]>) -> Result<()> {
    let runtime = cache_tb::rtl::create_dut_runtime(&[])?;
    let dut = runtime
        .create_model_simple::<cache_tb::rtl::CacheDutRtl>()
        .map_err(|e| eyre::eyre!("Failed to create DUT model: {:?}", e))?;
    println!("✅ RTL model created!");

    let mut bench = CacheBench::new(config, dut)?;
    if let Some(image) = image {
        bench.load_image(image);
    }
    let report = verdict(bench.run())?;
    print_report(&report);
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let mut config = BenchConfig {
        data_width: cli.data_width,
        seed: cli.seed.unwrap_or_else(clock_seed),
        max_cycles: cli.cycles,
        stall_rate: cli.stall_rate,
        wait_rate: cli.wait_rate,
        ..BenchConfig::default()
    };
    config.watchdog_cycles = cli
        .watchdog_cycles
        .unwrap_or_else(|| config.backpressure_watchdog());
    let geometry = config.geometry().wrap_err("Invalid bench configuration")?;
    log::info!("seed {:#x}", config.seed);

    let image = match &cli.image {
        Some(path) => {
            let format = cli.format.unwrap_or_else(|| ImageFormat::from_path(path));
            Some(load_image(path, format, geometry.bus_bytes() as usize)?)
        }
        None => None,
    };

    println!("🚀 {:?} bench starting (seed {:#x})", cli.bench, config.seed);

    #[cfg(feature = "verilator")]
    {
        if cli.rtl {
            return run_rtl(config, image.as_deref());
        }
    }

    let stdout = io::stdout();
    match cli.bench {
        Bench::Cache => {
            let mut bench = CacheBench::soft(config)?;
            if let Some(image) = &image {
                bench.load_image(image);
            }
            let report = verdict(bench.run())?;
            print_report(&report);
            if let Some(len) = cli.dump {
                bench.sram().dump_hex(&mut BufWriter::new(stdout.lock()), len)?;
            }
        }
        Bench::Line => {
            let mut bench = LineBench::soft(config)?;
            if let Some(image) = &image {
                bench.load_image(image);
            }
            let report = verdict(bench.run())?;
            print_report(&report);
            if let Some(len) = cli.dump {
                bench.sram().dump_hex(&mut BufWriter::new(stdout.lock()), len)?;
            }
        }
    }

    Ok(())
}
