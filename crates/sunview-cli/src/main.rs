use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use sunview_core::{diag, Resolved, Scenario};
use sunview_data::{AttitudeTimeline, SatelliteModel};
use sunview_render::{save_snapshot, Estimator, GpuContext};
use sunview_sim::{Command, SimState, SimulationDriver};

#[derive(Parser)]
#[command(name = "sunview")]
#[command(about = "Sunlit-area and solar-power estimation over an attitude timeline")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full timeline and write the area and power files
    Run {
        /// Scenario JSON
        #[arg(short, long)]
        scenario: PathBuf,

        /// Override the scenario's starting sample index
        #[arg(long)]
        start: Option<usize>,

        /// Stop after this many steps (buffered tail is still flushed)
        #[arg(long)]
        limit: Option<usize>,

        /// Measure without writing the output files
        #[arg(long, default_value = "false")]
        no_write: bool,
    },

    /// One-shot measurement at a single cursor position
    Inspect {
        /// Scenario JSON
        #[arg(short, long)]
        scenario: PathBuf,

        /// Sample index to measure
        #[arg(short, long, default_value = "0")]
        index: usize,
    },

    /// List the model's parts, triangle counts and display colors
    Parts {
        /// Scenario JSON
        #[arg(short, long)]
        scenario: PathBuf,
    },

    /// Render the shaded model to a PNG
    Snapshot {
        /// Scenario JSON
        #[arg(short, long)]
        scenario: PathBuf,

        /// Output PNG path
        #[arg(short, long)]
        out: PathBuf,

        /// Sun azimuth in degrees
        #[arg(long, default_value = "0")]
        az: f32,

        /// Sun elevation in degrees
        #[arg(long, default_value = "0")]
        el: f32,
    },
}

fn load_scenario(path: &PathBuf) -> Result<Resolved> {
    let scenario = Scenario::load(path)
        .with_context(|| format!("loading scenario {}", path.display()))?;
    Ok(scenario.resolve())
}

fn build_estimator(resolved: &Resolved, model: &mut SatelliteModel) -> Result<Estimator> {
    let ctx = pollster::block_on(GpuContext::new())?;
    let mut estimator = Estimator::new(ctx, resolved);
    estimator.upload(model);
    Ok(estimator)
}

fn print_report(report: &sunview_sim::InspectReport, names: &[String]) {
    println!(
        "{}  az {:.3}°  el {:.3}°  {}",
        report.timestamp,
        report.azimuth_deg,
        report.elevation_deg,
        if report.illuminated > 0.0 {
            "sunlit"
        } else {
            "eclipsed"
        }
    );
    for (i, area) in report.areas.iter().enumerate() {
        let name = names.get(i).map(String::as_str).unwrap_or("?");
        println!("  {:2}  {:<24} {:.6} m^2", i, name, area);
    }
    println!("  power: {:.6} W", report.power);
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run {
            scenario,
            start,
            limit,
            no_write,
        } => {
            let mut resolved = load_scenario(&scenario)?;
            if let Some(start) = start {
                resolved.scenario.start_index = start;
            }
            if no_write {
                resolved.scenario.write_data = false;
            }

            let mut model = SatelliteModel::load(&resolved.scenario.model_path, &resolved);
            if model.is_empty() {
                anyhow::bail!(
                    "no parts in {}",
                    resolved.scenario.model_path.display()
                );
            }
            let timeline = AttitudeTimeline::load(&resolved.attitude_file(), &resolved);
            if timeline.is_empty() {
                anyhow::bail!("no attitude samples in {}", resolved.attitude_file().display());
            }

            let names: Vec<String> =
                model.parts().iter().map(|p| p.name.clone()).collect();
            let estimator = build_estimator(&resolved, &mut model)?;
            let mut driver = SimulationDriver::new(estimator, timeline, names, &resolved)?;

            let total = driver.timeline().len() - driver.timeline().cursor();
            let bar = ProgressBar::new(total as u64);
            bar.set_style(
                ProgressStyle::default_bar()
                    .template("{bar:40} {pos}/{len} samples ({per_sec})")
                    .unwrap(),
            );

            let started = Instant::now();
            let mut steps = 0usize;
            driver.handle(Command::Start)?;
            while driver.state() == SimState::Running {
                driver.step()?;
                steps += 1;
                bar.inc(1);
                if limit.is_some_and(|l| steps >= l) {
                    driver.handle(Command::Stop)?;
                    driver.flush()?;
                }
            }
            bar.finish();

            let elapsed = started.elapsed().as_secs_f64();
            tracing::info!(
                "{} steps in {:.2} s ({:.1} steps/s), {} degraded inputs",
                steps,
                elapsed,
                steps as f64 / elapsed.max(1e-9),
                diag::count()
            );
            if driver.write_enabled() {
                println!("area file:  {}", driver.area_writer().path().display());
                println!("power file: {}", driver.power_writer().path().display());
            }
        }

        Commands::Inspect { scenario, index } => {
            let mut resolved = load_scenario(&scenario)?;
            resolved.scenario.start_index = index;
            resolved.scenario.write_data = false;

            let mut model = SatelliteModel::load(&resolved.scenario.model_path, &resolved);
            let timeline = AttitudeTimeline::load(&resolved.attitude_file(), &resolved);
            let names: Vec<String> =
                model.parts().iter().map(|p| p.name.clone()).collect();

            let estimator = build_estimator(&resolved, &mut model)?;
            let mut driver = SimulationDriver::new(estimator, timeline, names.clone(), &resolved)?;
            match driver.inspect()? {
                Some(report) => print_report(&report, &names),
                None => anyhow::bail!("no sample at index {}", index),
            }
        }

        Commands::Parts { scenario } => {
            let resolved = load_scenario(&scenario)?;
            let model = SatelliteModel::load(&resolved.scenario.model_path, &resolved);
            println!("{} parts:", model.part_count());
            for (i, part) in model.parts().iter().enumerate() {
                let cell = if resolved.scenario.solar_cell_parts.contains(&i) {
                    "solar cell"
                } else {
                    ""
                };
                println!(
                    "  {:2}  {:<24} {:5} triangles  color ({:.2}, {:.2}, {:.2})  {}",
                    i,
                    part.name,
                    part.triangle_count(),
                    part.color[0],
                    part.color[1],
                    part.color[2],
                    cell
                );
            }
        }

        Commands::Snapshot {
            scenario,
            out,
            az,
            el,
        } => {
            let resolved = load_scenario(&scenario)?;
            let model = SatelliteModel::load(&resolved.scenario.model_path, &resolved);
            if model.is_empty() {
                anyhow::bail!(
                    "no parts in {}",
                    resolved.scenario.model_path.display()
                );
            }
            let ctx = pollster::block_on(GpuContext::new())?;
            save_snapshot(&ctx, &model, &resolved, az, el, &out)?;
            println!("wrote {}", out.display());
        }
    }
    Ok(())
}
