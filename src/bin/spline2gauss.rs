// Copyright 2024 Mikael Lund
//
// Licensed under the Apache license, version 2.0 (the "license");
// you may not use this file except in compliance with the license.
// You may obtain a copy of the license at
//
//     http://www.apache.org/licenses/license-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the license is distributed on an "as is" basis,
// without warranties or conditions of any kind, either express or implied.
// See the license for the specific language governing permissions and
// limitations under the license.

//! Command line front end for decomposing a spline into Gaussians.

use anyhow::{bail, Context, Result};
use clap::Parser;
use spline2gauss::fit::{
    decompose, BoundsPolicy, FitConfig, FitMode, FitResult, HardCoreCorrection, StageObserver,
    TracingObserver,
};
use spline2gauss::solver::LevenbergMarquardt;
use spline2gauss::spline::KnotSpline;
use tracing::{debug, info};
use tracing_subscriber::{filter::LevelFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    name = "spline2gauss",
    version,
    about = "Decompose a cubic spline pair potential into Gaussians using least squares"
)]
struct Cli {
    /// Cubic spline knots, e.g. '1,2,3' or '1 2 3'
    #[arg(short, long, value_name = "LIST", allow_hyphen_values = true)]
    knots: String,

    /// Cutoff distance
    #[arg(short, long = "cut", value_name = "FLOAT")]
    cutoff: f64,

    /// Number of Gaussians
    #[arg(short = 'n', long = "terms", default_value_t = 2)]
    terms: usize,

    /// Number of points used for fitting
    #[arg(short = 'N', long = "samples", default_value_t = 1000)]
    samples: usize,

    /// Fit all Gaussians at once, starting from --x0
    #[arg(long, requires = "x0")]
    nostage: bool,

    /// Initial Gaussian parameters, e.g. '1 0.5 -10 0.1'
    #[arg(long, value_name = "LIST", allow_hyphen_values = true)]
    x0: Option<String>,

    /// Do not cap repulsive amplitudes at the maximum of the potential
    #[arg(long)]
    unbounded_repulsion: bool,

    /// Hard-core threshold in units of kT
    #[arg(long, value_name = "FLOAT", default_value_t = 20.0)]
    max_energy_kt: f64,

    /// Fit the raw spline without replacing its hard core
    #[arg(long, conflicts_with = "max_energy_kt")]
    no_hard_core: bool,

    /// Reference temperature, in the unit matching kB = 1
    #[arg(long, value_name = "FLOAT", default_value_t = 1.0)]
    temperature: f64,

    /// Fail if any stage did not converge
    #[arg(long)]
    strict: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Silence all log output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

fn setup_logging(verbosity: u8, quiet: bool) {
    let level_filter = if quiet {
        LevelFilter::OFF
    } else {
        match verbosity {
            0 => LevelFilter::WARN,
            1 => LevelFilter::INFO,
            2 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        }
    };
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact();
    tracing_subscriber::registry()
        .with(level_filter)
        .with(stderr_layer)
        .init();
}

/// Parse numbers separated by spaces and/or commas
fn parse_list(list: &str) -> Result<Vec<f64>> {
    list.split([' ', ','])
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<f64>()
                .with_context(|| format!("cannot parse '{s}' as a number"))
        })
        .collect()
}

impl Cli {
    fn fit_config(&self) -> Result<FitConfig> {
        let mode = match (self.nostage, &self.x0) {
            (false, _) => FitMode::Staged,
            (true, Some(x0)) => FitMode::SingleShot {
                initial_guess: parse_list(x0).context("invalid initial guess")?,
            },
            (true, None) => bail!("need initial values of Gaussian parameters (--x0)"),
        };
        let bounds = if self.unbounded_repulsion {
            BoundsPolicy::UnboundedRepulsion
        } else {
            BoundsPolicy::CappedRepulsion
        };
        let max_energy_kt = if self.no_hard_core {
            f64::INFINITY
        } else {
            self.max_energy_kt
        };
        let hard_core = HardCoreCorrection {
            temperature: self.temperature,
            ..Default::default()
        }
        .with_max_pair_energy_kt(max_energy_kt);
        Ok(FitConfig::default()
            .with_terms(self.terms)
            .with_samples(self.samples)
            .with_bounds(bounds)
            .with_hard_core(hard_core)
            .with_mode(mode))
    }
}

/// Prints each stage to stdout and forwards it to the log
struct StagePrinter;

impl StageObserver for StagePrinter {
    fn on_stage(&mut self, result: &FitResult) {
        println!();
        println!("Initial guess: {:?}", result.initial_guess);
        println!(
            "Parameters from optimizing {} Gaussian(s):",
            result.n_terms()
        );
        println!("{:?}", result.params);
        println!("LSQ: {}", result.cost);
        TracingObserver.on_stage(result);
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose, cli.quiet);
    debug!("{:?}", cli);

    let knots = parse_list(&cli.knots).context("invalid spline knots")?;
    let config = cli.fit_config()?;
    let spline = KnotSpline::new(cli.cutoff, &knots).context("invalid spline")?;
    info!(
        "{} knots, cutoff {}, {} term(s), {} samples",
        knots.len(),
        cli.cutoff,
        config.n_terms,
        config.n_samples
    );

    let report = decompose(
        &spline,
        cli.cutoff,
        &config,
        &LevenbergMarquardt::default(),
        &mut StagePrinter,
    )
    .context("decomposition failed")?;

    let result = if cli.strict {
        report.require_converged()?
    } else {
        report.final_result()
    };
    println!();
    println!("Final parameters [B0, K0, B1, K1, ...]:");
    println!("{:?}", result.params);
    Ok(())
}
