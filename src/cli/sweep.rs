//! Shared sweep arguments and progress reporting.
//!
//! This module contains the sweep parameters common to the `ber` and `ser`
//! subcommands, the live progress table rendered while a sweep runs, and
//! the CSV export of the completed error-rate curve with its theoretical
//! overlay.

use crate::rand::{Rng, SeedableRng};
use crate::simulation::{
    channel,
    sweep::{ErrorUnit, Report, Reporter, Statistics, SweepTestBuilder},
    theory,
};
use console::Term;
use std::{
    error::Error,
    fs::File,
    io::Write,
    sync::mpsc::{self, Receiver},
    time::Duration,
};

/// Sweep CLI arguments shared by the `ber` and `ser` subcommands.
#[derive(Debug, clap::Args)]
pub struct SweepArgs {
    /// Minimum Eb/N0 (dB)
    #[arg(long)]
    min_ebn0: f64,
    /// Maximum Eb/N0 (dB)
    #[arg(long)]
    max_ebn0: f64,
    /// Eb/N0 step (dB)
    #[arg(long)]
    step_ebn0: f64,
    /// Modulation order (a power of two in 2..=256)
    #[arg(long, default_value = "4")]
    order: u32,
    /// Carrier phase offset (radians)
    #[arg(long, default_value = "0.0")]
    phase_offset: f64,
    /// Symbols per trial block
    #[arg(long, default_value = "1000")]
    block_size: usize,
    /// Number of error events to collect per point
    #[arg(long, default_value = "100")]
    min_errors: u64,
    /// Maximum number of units (bits or symbols) to simulate per point
    #[arg(long, default_value = "10000000")]
    max_units: u64,
    /// RNG seed
    #[arg(long, default_value = "0")]
    seed: u64,
    /// Run the Eb/N0 points in parallel
    #[arg(long)]
    parallel: bool,
    /// Output file for simulation results (CSV)
    #[arg(long)]
    output_file: Option<String>,
}

impl SweepArgs {
    /// Runs the sweep, counting errors in the given unit.
    pub fn run(&self, error_unit: ErrorUnit) -> Result<(), Box<dyn Error>> {
        let ebn0s = ebn0_grid(self.min_ebn0, self.max_ebn0, self.step_ebn0)?;
        let (report_tx, report_rx) = mpsc::channel();
        let reporter = Reporter {
            tx: report_tx,
            interval: Duration::from_millis(500),
        };
        let test = SweepTestBuilder {
            order: self.order,
            phase_offset: self.phase_offset,
            error_unit,
            ebn0s_db: &ebn0s,
            block_size: self.block_size,
            min_error_events: self.min_errors,
            max_units: self.max_units,
            reporter: Some(reporter),
        }
        .build()?;
        self.write_details(std::io::stdout(), error_unit)?;
        for &ebn0 in &ebn0s {
            if channel::is_extreme_snr(test.esn0_db(ebn0)) {
                eprintln!(
                    "warning: Eb/N0 = {ebn0:.2} dB maps to an extreme Es/N0; \
                     results for this point are best-effort"
                );
            }
        }
        let output_file = if let Some(f) = &self.output_file {
            let mut f = File::create(f)?;
            self.write_details(&f, error_unit)?;
            writeln!(f, "ebn0_db,rate,theory,errors,units,stop")?;
            Some(f)
        } else {
            None
        };
        let mut progress = Progress::new(report_rx, error_unit, self.order, output_file);
        let progress = std::thread::spawn(move || progress.run());
        if self.parallel {
            test.run_parallel(self.seed)?;
        } else {
            let mut rng = Rng::seed_from_u64(self.seed);
            test.run(&mut rng)?;
        }
        // This block cannot actually be written with the ? operator
        #[allow(clippy::question_mark)]
        if let Err(e) = progress.join().unwrap() {
            return Err(e);
        }
        Ok(())
    }

    fn write_details<W: Write>(&self, mut f: W, error_unit: ErrorUnit) -> std::io::Result<()> {
        writeln!(f, "SWEEP PARAMETERS")?;
        writeln!(f, "----------------")?;
        writeln!(f, "Simulation:")?;
        writeln!(f, " - Error unit: {error_unit}")?;
        writeln!(f, " - Minimum Eb/N0: {:.2} dB", self.min_ebn0)?;
        writeln!(f, " - Maximum Eb/N0: {:.2} dB", self.max_ebn0)?;
        writeln!(f, " - Eb/N0 step: {:.2} dB", self.step_ebn0)?;
        writeln!(f, "Modulation:")?;
        writeln!(f, " - Order: {}-PSK", self.order)?;
        writeln!(f, " - Phase offset: {:.4} rad", self.phase_offset)?;
        writeln!(f, "Stopping rule:")?;
        writeln!(f, " - Error events to collect: {}", self.min_errors)?;
        writeln!(f, " - Maximum units: {}", self.max_units)?;
        writeln!(f, " - Block size: {} symbols", self.block_size)?;
        writeln!(f, "RNG:")?;
        writeln!(f, " - Seed: {}", self.seed)?;
        writeln!(f)?;
        Ok(())
    }
}

/// Builds the Eb/N0 grid `min, min + step, ..` up to and including `max`.
///
/// The endpoint count is nudged before flooring so that a `max` that lands
/// exactly on the grid is not dropped to floating-point representation
/// error (e.g. `0.3 / 0.1` evaluates just below 3).
fn ebn0_grid(min_ebn0: f64, max_ebn0: f64, step_ebn0: f64) -> Result<Vec<f64>, String> {
    if !min_ebn0.is_finite() {
        return Err(format!("min_ebn0 = {min_ebn0} is not finite"));
    }
    if !max_ebn0.is_finite() {
        return Err(format!("max_ebn0 = {max_ebn0} is not finite"));
    }
    if !(step_ebn0 > 0.0) || !step_ebn0.is_finite() {
        return Err(format!("step_ebn0 = {step_ebn0} is not positive"));
    }
    if min_ebn0 > max_ebn0 {
        return Err(format!(
            "min_ebn0 = {min_ebn0} is greater than max_ebn0 = {max_ebn0}"
        ));
    }
    let num_ebn0s = ((max_ebn0 - min_ebn0) / step_ebn0 + 1e-9).floor() as usize + 1;
    Ok((0..num_ebn0s)
        .map(|k| min_ebn0 + k as f64 * step_ebn0)
        .collect())
}

#[derive(Debug)]
struct Progress {
    rx: Receiver<Report>,
    term: Term,
    error_unit: ErrorUnit,
    order: u32,
    output_file: Option<File>,
}

impl Progress {
    fn new(
        rx: Receiver<Report>,
        error_unit: ErrorUnit,
        order: u32,
        output_file: Option<File>,
    ) -> Progress {
        Progress {
            rx,
            term: Term::stdout(),
            error_unit,
            order,
            output_file,
        }
    }

    fn run(&mut self) -> Result<(), Box<dyn Error + Send + Sync + 'static>> {
        ctrlc::set_handler({
            let term = self.term.clone();
            move || {
                let _ = term.write_line("");
                let _ = term.show_cursor();
                std::process::exit(0);
            }
        })?;

        let ret = self.work();
        self.term.write_line("")?;
        self.term.show_cursor()?;
        ret
    }

    fn work(&mut self) -> Result<(), Box<dyn Error + Send + Sync + 'static>> {
        self.term.set_title("psk-sim sweep");
        self.term.hide_cursor()?;
        self.term.write_line(Self::format_header())?;
        let mut last_ebn0 = None;
        loop {
            let report = match self.rx.recv() {
                Ok(report) => report,
                // The sweep aborted and dropped the sender; the error
                // surfaces on the main thread.
                Err(_) => return Ok(()),
            };
            let Report::Statistics(stats) = report else {
                return Ok(());
            };
            if last_ebn0 == Some(stats.ebn0_db) {
                self.term.move_cursor_up(1)?;
                self.term.clear_line()?;
            }
            self.term.write_line(&self.format_progress(&stats))?;
            last_ebn0 = Some(stats.ebn0_db);
            if stats.stop.is_some() {
                let line = self.format_csv(&stats);
                if let Some(f) = &mut self.output_file {
                    writeln!(f, "{line}")?;
                }
            }
        }
    }

    fn theory_rate(&self, ebn0_db: f64) -> f64 {
        match self.error_unit {
            ErrorUnit::Bit => theory::bit_error_rate(self.order, ebn0_db),
            ErrorUnit::Symbol => theory::symbol_error_rate(self.order, ebn0_db),
        }
        .unwrap_or(f64::NAN)
    }

    fn format_header() -> &'static str {
        "  Eb/N0 |   Blocks |   Errors |      Units |    Rate  |  Theory  |    Stop    | Throughp | Elapsed\n\
         --------|----------|----------|------------|----------|----------|------------|----------|----------"
    }

    fn format_progress(&self, stats: &Statistics) -> String {
        let stop = match stats.stop {
            Some(stop) => stop.to_string(),
            None => "running".to_string(),
        };
        format!(
            "{:7.2} | {:8} | {:8} | {:10} | {:8.2e} | {:8.2e} | {:^10} | {:8.3} | {}",
            stats.ebn0_db,
            stats.num_blocks,
            stats.num_errors,
            stats.num_units,
            stats.rate,
            self.theory_rate(stats.ebn0_db),
            stop,
            stats.throughput,
            humantime::format_duration(Duration::from_secs(stats.elapsed.as_secs()))
        )
    }

    fn format_csv(&self, stats: &Statistics) -> String {
        let stop = match stats.stop {
            Some(stop) => stop.to_string(),
            None => "running".to_string(),
        };
        format!(
            "{:.2},{:.10e},{:.10e},{},{},{}",
            stats.ebn0_db,
            stats.rate,
            self.theory_rate(stats.ebn0_db),
            stats.num_errors,
            stats.num_units,
            stop
        )
    }
}
