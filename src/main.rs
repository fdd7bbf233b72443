//! Demo: generate MEIs for a synthetic linear-nonlinear neuron.
//!
//! Examples:
//!   featurevis
//!   featurevis method.json
//!   featurevis method.json --seed 7 --runs 4
//!
//! Results are printed to stdout as JSON; logs go to stderr (`RUST_LOG` controls verbosity).

use std::process;

use featurevis::prelude::*;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// `rate = tanh(<w, x>)` with a Gabor receptive field `w` spanning the last two axes.
struct LinearNonlinear {
    weights: Tensor,
}

impl LinearNonlinear {
    fn gabor(shape: &[usize], wavelength: f32, orientation: f32, sigma: f32) -> Self {
        let (rows, cols) = match shape.len() {
            0 => (1, 1),
            1 => (1, shape[0]),
            n => (shape[n - 2], shape[n - 1]),
        };
        let plane = rows * cols;
        let total: usize = shape.iter().product();

        let (cy, cx) = ((rows as f32 - 1.0) / 2.0, (cols as f32 - 1.0) / 2.0);
        let (sin, cos) = orientation.sin_cos();
        let mut field = Vec::with_capacity(plane);
        for r in 0..rows {
            for c in 0..cols {
                let (y, x) = (r as f32 - cy, c as f32 - cx);
                let along = x * cos + y * sin;
                let envelope = (-(x * x + y * y) / (2.0 * sigma * sigma)).exp();
                field.push(envelope * (2.0 * std::f32::consts::PI * along / wavelength).cos());
            }
        }

        let data = field.iter().copied().cycle().take(total).collect();
        // Shape and data length agree by construction.
        let weights = Tensor::from_vec(shape, data).unwrap_or_else(|_| Tensor::zeros(shape));
        Self { weights }
    }
}

impl Objective for LinearNonlinear {
    fn evaluate(&self, input: &Tensor) -> featurevis::Result<Evaluation> {
        let drive = self.weights.dot(input)?;
        let rate = drive.tanh();
        let slope = (1.0 - rate * rate) as f32;
        Ok(Evaluation::new(rate, self.weights.map(|w| w * slope)))
    }

    fn name(&self) -> &str {
        "linear-nonlinear"
    }
}

struct Args {
    config: Option<String>,
    seed: u64,
    runs: u64,
}

fn parse_args() -> Result<Args, String> {
    let mut args = Args {
        config: None,
        seed: 0,
        runs: 1,
    };
    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--seed" => {
                let v = it.next().ok_or("--seed needs a value")?;
                args.seed = v.parse().map_err(|e| format!("bad --seed {:?}: {}", v, e))?;
            }
            "--runs" => {
                let v = it.next().ok_or("--runs needs a value")?;
                args.runs = v.parse().map_err(|e| format!("bad --runs {:?}: {}", v, e))?;
            }
            _ if arg.starts_with("--") => return Err(format!("Unknown flag: {}", arg)),
            _ if args.config.is_none() => args.config = Some(arg),
            _ => return Err(format!("Unexpected argument: {}", arg)),
        }
    }
    Ok(args)
}

fn print_help() {
    println!("featurevis - MEI generation demo");
    println!();
    println!("Usage: featurevis [CONFIG.json] [--seed N] [--runs N]");
    println!();
    println!("  CONFIG.json  method config (defaults are used when omitted)");
    println!("  --seed N     first seed (default 0)");
    println!("  --runs N     number of independent runs, seeds N, N+1, ... (default 1)");
}

fn run(args: Args) -> featurevis::Result<()> {
    let config = match &args.config {
        Some(path) => {
            info!("Loading method config from {:?}", path);
            MethodConfig::from_path(path)?
        }
        None => MethodConfig::default(),
    };

    let neuron = LinearNonlinear::gabor(&config.input_shape, 6.0, 0.6, 3.0);
    let seeds: Vec<u64> = (args.seed..args.seed.saturating_add(args.runs)).collect();
    let results = generate_meis(&neuron, &config, &seeds)?;

    if let Some(best) = results.iter().max_by(|a, b| a.score.total_cmp(&b.score)) {
        info!("Best score {:.4} (seed {})", best.score, best.seed);
    }
    println!("{}", serde_json::to_string_pretty(&results)?);
    Ok(())
}

fn main() {
    if std::env::args().any(|a| a == "--help" || a == "-h") {
        print_help();
        return;
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = match parse_args() {
        Ok(args) => args,
        Err(msg) => {
            eprintln!("{}", msg);
            print_help();
            process::exit(2);
        }
    };

    if let Err(e) = run(args) {
        error!("MEI generation failed: {}", e);
        process::exit(1);
    }
}
