use anyhow::Result;
use hifitime::Epoch;
use sunview_core::constants::AREA_DECIMALS;
use sunview_core::{diag, Resolved};
use sunview_data::{AttitudeTimeline, BlockWriter};

use crate::power::power_from_areas;

/// Anything that turns a sun orientation into per-part sunlit areas in
/// m^2. The GPU estimator implements this; driver tests script it.
pub trait AreaSource {
    fn part_count(&self) -> usize;
    fn measure(
        &mut self,
        azimuth_deg: f32,
        elevation_deg: f32,
        illuminated: f32,
    ) -> Result<Vec<f32>>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SimState {
    Idle,
    Running,
    Paused,
    Finished,
}

/// Discrete operator commands. Interactive sources (keyboard, scripts)
/// translate into these; the driver itself never polls anything.
#[derive(Debug)]
pub enum Command {
    Start,
    Pause,
    /// Manual step forward with a one-shot measurement
    Next,
    /// Manual step back with a one-shot measurement
    Previous,
    ToggleWrite,
    Stop,
    Reload(AttitudeTimeline),
}

/// One-shot measurement from manual stepping. Reported to the console
/// sink and never written to the output files.
#[derive(Clone, Debug)]
pub struct InspectReport {
    pub timestamp: String,
    pub azimuth_deg: f32,
    pub elevation_deg: f32,
    pub illuminated: f32,
    pub areas: Vec<f32>,
    pub power: f32,
}

/// Steps the timeline, orchestrates measurements, aggregates power and
/// batches the two output files. Single writer of the cursor and the
/// output buffers.
pub struct SimulationDriver<S: AreaSource> {
    source: S,
    timeline: AttitudeTimeline,
    part_names: Vec<String>,
    resolved: Resolved,
    state: SimState,
    write_enabled: bool,
    area_writer: BlockWriter,
    power_writer: BlockWriter,
}

impl<S: AreaSource> SimulationDriver<S> {
    pub fn new(
        source: S,
        timeline: AttitudeTimeline,
        part_names: Vec<String>,
        resolved: &Resolved,
    ) -> Result<Self> {
        let block = resolved.scenario.write_block_size;
        let mut driver = Self {
            area_writer: BlockWriter::new(resolved.area_file(), block),
            power_writer: BlockWriter::new(resolved.power_file(), block),
            source,
            timeline,
            part_names,
            resolved: resolved.clone(),
            state: SimState::Idle,
            write_enabled: resolved.scenario.write_data,
        };

        if driver.source.part_count() != driver.part_names.len() {
            diag::report(&format!(
                "area source measures {} parts but the model names {}",
                driver.source.part_count(),
                driver.part_names.len()
            ));
        }
        for &idx in &driver.resolved.scenario.solar_cell_parts {
            if idx >= driver.part_names.len() {
                diag::report(&format!(
                    "solar cell part index {} outside the {}-part model, ignored",
                    idx,
                    driver.part_names.len()
                ));
            }
        }

        driver.timeline.set_cursor(driver.resolved.scenario.start_index);
        if driver.timeline.is_empty() {
            driver.state = SimState::Finished;
        }
        if driver.write_enabled {
            driver.write_headers()?;
        }
        Ok(driver)
    }

    pub fn state(&self) -> SimState {
        self.state
    }

    pub fn timeline(&self) -> &AttitudeTimeline {
        &self.timeline
    }

    pub fn write_enabled(&self) -> bool {
        self.write_enabled
    }

    pub fn area_writer(&self) -> &BlockWriter {
        &self.area_writer
    }

    pub fn power_writer(&self) -> &BlockWriter {
        &self.power_writer
    }

    /// Apply one operator command. Manual steps return their measurement;
    /// everything else returns `None`. Commands that make no sense in the
    /// current state are ignored.
    pub fn handle(&mut self, command: Command) -> Result<Option<InspectReport>> {
        match command {
            Command::Start => {
                if matches!(self.state, SimState::Idle | SimState::Paused) {
                    self.state = SimState::Running;
                }
            }
            Command::Pause => {
                if self.state == SimState::Running {
                    self.state = SimState::Paused;
                }
            }
            Command::Next => {
                if matches!(self.state, SimState::Idle | SimState::Paused) {
                    self.timeline.advance();
                    return self.inspect();
                }
            }
            Command::Previous => {
                if matches!(self.state, SimState::Idle | SimState::Paused) {
                    self.timeline.retreat();
                    return self.inspect();
                }
            }
            Command::ToggleWrite => {
                self.write_enabled = !self.write_enabled;
                if self.write_enabled {
                    self.write_headers()?;
                } else {
                    self.area_writer.flush()?;
                    self.power_writer.flush()?;
                }
            }
            Command::Stop => {
                // Abort between steps. Buffered lines stay in memory and
                // are lost unless a flush is requested before shutdown.
                if matches!(self.state, SimState::Running | SimState::Paused) {
                    self.state = SimState::Idle;
                }
            }
            Command::Reload(timeline) => self.reload(timeline)?,
        }
        Ok(None)
    }

    /// One automated step: measure the current sample, append the output
    /// lines, advance. Entering the end of the timeline finishes the run
    /// and force-flushes both writers. A no-op outside `Running`.
    pub fn step(&mut self) -> Result<()> {
        if self.state != SimState::Running {
            return Ok(());
        }
        let Some(sample) = self.timeline.current().cloned() else {
            return self.finish();
        };

        let areas = self.source.measure(
            sample.azimuth_deg,
            sample.elevation_deg,
            sample.illuminated,
        )?;
        let power = power_from_areas(
            &areas,
            &self.resolved.scenario.solar_cell_parts,
            self.resolved.scenario.cell_efficiency,
        );

        if self.write_enabled {
            let mut line = sample.timestamp.clone();
            for area in &areas {
                line.push_str(&format!(";{:.prec$}", area, prec = AREA_DECIMALS));
            }
            self.area_writer.push(line)?;
            self.power_writer.push(format!(
                "{};{:.prec$}",
                sample.timestamp,
                power,
                prec = AREA_DECIMALS
            ))?;
        }

        self.timeline.advance();
        if self.timeline.is_finished() {
            self.finish()?;
        }
        Ok(())
    }

    /// Measure the sample under the cursor without touching the writers.
    /// `None` once the cursor is past the end.
    pub fn inspect(&mut self) -> Result<Option<InspectReport>> {
        let Some(sample) = self.timeline.current().cloned() else {
            return Ok(None);
        };
        let areas = self.source.measure(
            sample.azimuth_deg,
            sample.elevation_deg,
            sample.illuminated,
        )?;
        let power = power_from_areas(
            &areas,
            &self.resolved.scenario.solar_cell_parts,
            self.resolved.scenario.cell_efficiency,
        );
        Ok(Some(InspectReport {
            timestamp: sample.timestamp,
            azimuth_deg: sample.azimuth_deg,
            elevation_deg: sample.elevation_deg,
            illuminated: sample.illuminated,
            areas,
            power,
        }))
    }

    /// Swap in a fresh timeline. Pending lines are flushed first so the
    /// old run's tail is not lost; headers are rewritten for the new run.
    pub fn reload(&mut self, timeline: AttitudeTimeline) -> Result<()> {
        self.area_writer.flush()?;
        self.power_writer.flush()?;
        self.timeline = timeline;
        self.timeline.set_cursor(self.resolved.scenario.start_index);
        self.state = if self.timeline.is_empty() {
            SimState::Finished
        } else {
            SimState::Idle
        };
        if self.write_enabled {
            self.write_headers()?;
        }
        Ok(())
    }

    /// Explicit final flush. An aborted run loses buffered lines unless
    /// this is called before shutdown.
    pub fn flush(&mut self) -> Result<()> {
        self.area_writer.flush()?;
        self.power_writer.flush()
    }

    fn finish(&mut self) -> Result<()> {
        self.state = SimState::Finished;
        self.area_writer.flush()?;
        self.power_writer.flush()?;
        tracing::info!(
            "run finished, {} + {} flushes",
            self.area_writer.flushes(),
            self.power_writer.flushes()
        );
        Ok(())
    }

    fn write_headers(&mut self) -> Result<()> {
        let generated = Epoch::now()
            .map(|e| e.to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        let mut area_header = vec![
            format!("% File generated on {}", generated),
            "% 1: time [s]".to_string(),
        ];
        for (i, name) in self.part_names.iter().enumerate() {
            area_header.push(format!("% {}: {} [m^2]", i + 2, name));
        }
        self.area_writer.write_header(&area_header)?;

        let power_header = vec![
            format!("% File generated on {}", generated),
            "% 1: time [s]".to_string(),
            "% 2: power [W]".to_string(),
        ];
        self.power_writer.write_header(&power_header)?;
        Ok(())
    }
}
