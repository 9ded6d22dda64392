// Copyright (c) 2025-2026 brdigetrlol. All rights reserved.
// SPDX-License-Identifier: LicenseRef-Icarus-Proprietary
// See LICENSE in the repository root for full license terms.

//! Ridge readout benchmarks
//!
//! Measures:
//! 1. Linear recovery: sequential vs parallel accumulation, same solution
//! 2. Mackey-Glass one-step prediction through a small echo state reservoir
//!
//! Log verbosity follows `RUST_LOG` (e.g. `RUST_LOG=ridge_engine=debug`).

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{ensure, Context, Result};
use clap::Parser;
use nalgebra::{DMatrix, DVector};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing_subscriber::EnvFilter;

use ridge_engine::metrics::nmse;
use ridge_engine::{ReadoutTrainer, RidgeConfig, RidgeReadout, TrainingSession};

type Batch = (DMatrix<f64>, DMatrix<f64>);

/// Ridge readout benchmark CLI.
#[derive(Parser, Debug)]
#[command(
    name = "ridge-bench",
    about = "Incremental ridge readout benchmarks on synthetic data",
    version
)]
struct Cli {
    /// JSON file holding a readout config; flags below override it.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Regularization coefficient.
    #[arg(short, long)]
    ridge: Option<f64>,

    /// Leading timesteps dropped from every batch.
    #[arg(long)]
    transient: Option<usize>,

    /// Fit without an intercept.
    #[arg(long, default_value_t = false)]
    no_bias: bool,

    /// Total timesteps in the linear recovery dataset.
    #[arg(short = 'n', long, default_value_t = 20_000)]
    samples: usize,

    /// Number of batches the dataset is split into.
    #[arg(short, long, default_value_t = 64)]
    batches: usize,

    /// Input features of the linear recovery dataset.
    #[arg(long, default_value_t = 50)]
    inputs: usize,

    /// Output channels of the linear recovery dataset.
    #[arg(long, default_value_t = 3)]
    outputs: usize,

    /// Uniform noise amplitude added to the targets.
    #[arg(long, default_value_t = 0.01)]
    noise: f64,

    /// Worker threads for parallel accumulation (0 = all cores).
    #[arg(short, long, default_value_t = 0)]
    workers: usize,

    /// Reservoir units for the Mackey-Glass benchmark.
    #[arg(long, default_value_t = 100)]
    units: usize,

    /// RNG seed.
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

impl Cli {
    /// Base readout config: the JSON file if given, else a lightly
    /// regularized default, then command-line overrides.
    fn readout_config(&self) -> Result<RidgeConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("reading config {}", path.display()))?;
                serde_json::from_str(&text)
                    .with_context(|| format!("parsing config {}", path.display()))?
            }
            None => RidgeConfig::new(1e-6),
        };
        if let Some(ridge) = self.ridge {
            config.ridge = ridge;
        }
        if let Some(transient) = self.transient {
            config.transient = transient;
        }
        if self.no_bias {
            config.input_bias = false;
        }
        config.validate().context("invalid readout config")?;
        Ok(config)
    }

    fn trainer(&self) -> ReadoutTrainer {
        if self.workers == 0 {
            ReadoutTrainer::default()
        } else {
            ReadoutTrainer::new(self.workers)
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.readout_config()?;
    tracing::info!(?config, "ridge-bench v{}", env!("CARGO_PKG_VERSION"));

    println!("=== Ridge Readout Benchmarks ===\n");

    bench_linear_recovery(&cli, &config)?;
    bench_mackey_glass(&cli, &config)?;

    println!("=== All benchmarks complete ===");
    Ok(())
}

// ─── Benchmarks ──────────────────────────────────

fn bench_linear_recovery(cli: &Cli, config: &RidgeConfig) -> Result<()> {
    println!("Benchmark 1: Linear recovery, sequential vs parallel accumulation");
    ensure!(cli.batches > 0, "--batches must be positive");
    let rows = cli.samples / cli.batches;
    ensure!(
        rows > config.transient,
        "batches of {rows} rows leave nothing after a transient of {}",
        config.transient
    );

    let mut rng = StdRng::seed_from_u64(cli.seed);
    let w_true = DMatrix::from_fn(cli.inputs, cli.outputs, |_, _| rng.gen_range(-1.0..1.0));
    let b_true = DMatrix::from_fn(1, cli.outputs, |_, _| rng.gen_range(-0.5..0.5));
    let batches: Vec<Batch> = (0..cli.batches)
        .map(|_| linear_batch(&mut rng, rows, &w_true, &b_true, cli.noise))
        .collect();
    let (x_test, y_test) = linear_batch(&mut rng, 1000, &w_true, &b_true, 0.0);

    let session = TrainingSession::new("sequential");
    let mut sequential = RidgeReadout::new(config.clone().with_name("linear"))?;
    let start = Instant::now();
    let seq = sequential
        .fit(&session, &batches)
        .context("sequential fit")?;
    let seq_time = start.elapsed();

    let trainer = cli.trainer();
    let session = TrainingSession::new("parallel");
    let mut parallel = RidgeReadout::new(config.clone().with_name("linear"))?;
    let start = Instant::now();
    let par = trainer
        .fit(&mut parallel, &session, &batches)
        .context("parallel fit")?;
    let par_time = start.elapsed();

    let agreement = (&seq.wout - &par.wout).amax();
    let weight_error = (&par.wout - &w_true).amax();
    let pred = parallel.run((&x_test).into())?;
    let score = nmse(&pred, &y_test)?;

    println!(
        "  {} batches × {rows} rows, {} inputs → {} outputs",
        cli.batches, cli.inputs, cli.outputs
    );
    println!(
        "  Sequential: {:.2} ms | Parallel ({} workers): {:.2} ms | speedup {:.2}×",
        seq_time.as_secs_f64() * 1e3,
        trainer.workers,
        par_time.as_secs_f64() * 1e3,
        seq_time.as_secs_f64() / par_time.as_secs_f64().max(1e-12),
    );
    println!("  max |Wout_seq − Wout_par|: {agreement:.2e}");
    println!("  max |Wout − W_true|: {weight_error:.2e}");
    let pass = agreement < 1e-8 && score < 1e-2;
    println!(
        "  Test NMSE: {:.2e} (threshold < 1e-2) ... {}\n",
        score,
        if pass { "PASS" } else { "FAIL" }
    );
    Ok(())
}

fn bench_mackey_glass(cli: &Cli, config: &RidgeConfig) -> Result<()> {
    println!("Benchmark 2: Mackey-Glass one-step prediction");

    let washout = 200;
    let series = generate_mackey_glass(4000, cli.seed);
    let reservoir = EchoState::new(cli.units, 0.9, cli.seed.wrapping_add(1));
    let states = reservoir.harvest(&series);

    // Predict u(t+1) from the state after seeing u(t).
    let usable = series.len() - 1;
    let split = washout + (usable - washout) * 4 / 5;
    let chunk = 250;

    let mut batches = Vec::new();
    let mut start = washout;
    while start < split {
        let end = (start + chunk).min(split);
        let x = states.rows(start, end - start).into_owned();
        let y = DMatrix::from_fn(end - start, 1, |i, _| series[start + i + 1]);
        batches.push((x, y));
        start = end;
    }
    let x_test = states.rows(split, usable - split).into_owned();
    let y_test = DMatrix::from_fn(usable - split, 1, |i, _| series[split + i + 1]);

    // Per-batch transient would cut into the harvested states.
    let readout_config = config.clone().with_name("mackey-glass").with_transient(0);
    let session = TrainingSession::default();
    let mut readout = RidgeReadout::new(readout_config)?;
    let clock = Instant::now();
    cli.trainer()
        .fit(&mut readout, &session, &batches)
        .context("Mackey-Glass readout fit")?;
    let fit_time = clock.elapsed();

    let pred = readout.run((&x_test).into())?;
    let score = nmse(&pred, &y_test)?;
    let pass = score < 0.05;
    println!(
        "  {} units, {} training batches, fit in {:.2} ms",
        cli.units,
        batches.len(),
        fit_time.as_secs_f64() * 1e3
    );
    println!(
        "  Test NMSE: {:.2e} (threshold < 0.05) ... {}\n",
        score,
        if pass { "PASS" } else { "FAIL" }
    );
    Ok(())
}

// ─── Data generation ─────────────────────────────

fn linear_batch(
    rng: &mut StdRng,
    rows: usize,
    w: &DMatrix<f64>,
    b: &DMatrix<f64>,
    noise: f64,
) -> Batch {
    let x = DMatrix::from_fn(rows, w.nrows(), |_, _| rng.gen_range(-1.0..1.0));
    let mut y = &x * w;
    for t in 0..rows {
        for k in 0..w.ncols() {
            y[(t, k)] += b[(0, k)] + noise * rng.gen_range(-1.0..1.0);
        }
    }
    (x, y)
}

/// Generate Mackey-Glass time series.
///
/// dx/dt = β·x(t-τ)/(1+x(t-τ)^n) - γ·x(t)
/// Standard params: β=0.2, γ=0.1, n=10, τ=17
fn generate_mackey_glass(length: usize, seed: u64) -> Vec<f64> {
    let (tau, beta, gamma, n_exp) = (17usize, 0.2, 0.1, 10.0);
    let total = length + tau + 500;

    let mut rng = StdRng::seed_from_u64(seed);
    let mut x = vec![0.0f64; total];
    for v in x.iter_mut().take(tau + 1) {
        *v = 1.2 + (rng.gen::<f64>() - 0.5) * 0.1;
    }
    for t in tau..total - 1 {
        let x_tau = x[t - tau];
        x[t + 1] = x[t] + beta * x_tau / (1.0 + x_tau.powf(n_exp)) - gamma * x[t];
    }
    x.split_off(total - length)
}

/// Minimal echo state reservoir driven by a scalar input.
struct EchoState {
    w: DMatrix<f64>,
    w_in: DVector<f64>,
}

impl EchoState {
    fn new(units: usize, spectral_radius: f64, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let density = (10.0 / units.max(1) as f64).min(1.0);
        let mut w = DMatrix::from_fn(units, units, |_, _| {
            if rng.gen::<f64>() < density {
                rng.gen_range(-1.0..1.0)
            } else {
                0.0
            }
        });
        let radius = estimate_spectral_radius(&w, 100);
        if radius > 1e-12 {
            w *= spectral_radius / radius;
        }
        let w_in = DVector::from_fn(units, |_, _| rng.gen_range(-0.5..0.5));
        Self { w, w_in }
    }

    /// Time-major state matrix, row `t` being the state after input `t`.
    fn harvest(&self, inputs: &[f64]) -> DMatrix<f64> {
        let units = self.w.nrows();
        let mut states = DMatrix::zeros(inputs.len(), units);
        let mut s = DVector::zeros(units);
        for (t, &u) in inputs.iter().enumerate() {
            s = (&self.w * &s + &self.w_in * u).map(f64::tanh);
            states.set_row(t, &s.transpose());
        }
        states
    }
}

/// Power iteration on `WᵀW` gives the largest singular value, an upper
/// bound on the spectral radius that is good enough for scaling.
fn estimate_spectral_radius(w: &DMatrix<f64>, iterations: usize) -> f64 {
    let n = w.nrows();
    if n == 0 {
        return 0.0;
    }
    let mut v = DVector::from_element(n, 1.0 / (n as f64).sqrt());
    let mut sigma = 0.0;
    for _ in 0..iterations {
        let u = w.tr_mul(&(w * &v));
        let norm = u.norm();
        if norm < 1e-300 {
            return 0.0;
        }
        sigma = norm.sqrt();
        v = u / norm;
    }
    sigma
}
