//! Fill depressions in a heightfield JSON file.
//!
//! Reads a `HeightField` (`data`, `width`, `height`, optional `spacing`),
//! fills its pits, and writes the filled surface, the per-node fill depth
//! and a run summary as JSON.
use std::fs;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use sinkfill_core::{
    FillConfig, FillReport, HeightField, HoleFiller, SEDIMENT_FILL_DEPTH_FIELD,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "sinkfill", about = "Remove closed depressions from a heightfield")]
struct Args {
    /// Path to a serialised HeightField JSON file.
    #[arg(short, long)]
    input: String,

    /// Output path; prints to stdout when omitted.
    #[arg(short, long)]
    output: Option<String>,

    /// Gradient down towards each lake outlet (e.g. 1e-6). Flat fill if omitted.
    #[arg(short, long)]
    slope: Option<f64>,

    /// FillConfig JSON file.
    #[arg(short, long)]
    config: Option<String>,

    /// Store the input under this field name instead of `topographic__elevation`.
    #[arg(long)]
    elevation_field: Option<String>,
}

#[derive(Serialize)]
struct FillOutput {
    heightfield: HeightField,
    sediment_fill_depth: Vec<f64>,
    report: FillReport,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => {
            let text = fs::read_to_string(path).with_context(|| format!("reading config {path}"))?;
            FillConfig::from_json(&text).with_context(|| format!("parsing config {path}"))?
        }
        None => FillConfig::default(),
    };

    let text = fs::read_to_string(&args.input)
        .with_context(|| format!("reading heightfield {}", args.input))?;
    let hf = HeightField::from_json(&text)
        .with_context(|| format!("parsing heightfield {}", args.input))?;
    let mut grid = hf.into_grid().context("heightfield data does not match its dimensions")?;

    if let Some(name) = &args.elevation_field {
        let elevation = grid.delete_field(sinkfill_core::ELEVATION_FIELD)?;
        grid.set_field(name, elevation)?;
        config.elevation_field = Some(name.clone());
    }

    let mut filler = HoleFiller::new(&mut grid, config)?;
    let report = filler
        .fill_pits(&mut grid, args.slope)
        .context("filling depressions")?;

    let output = FillOutput {
        heightfield: HeightField::from_field(&grid, filler.elevation_field())?,
        sediment_fill_depth: grid.float(SEDIMENT_FILL_DEPTH_FIELD)?.to_vec(),
        report,
    };
    let json = serde_json::to_string(&output)?;
    match &args.output {
        Some(path) => {
            fs::write(path, json).with_context(|| format!("writing {path}"))?;
            eprintln!("Filled {} lakes -> {path}", output.report.lakes);
        }
        None => println!("{json}"),
    }

    Ok(())
}
