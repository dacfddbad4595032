use std::path::{Path, PathBuf};
use serde::{Serialize, Deserialize};
use anyhow::Result;

use crate::constants::EARTH_RADIUS_KM;

/// A complete measurement scenario, loaded from JSON. Missing fields fall
/// back to the defaults below, so a minimal scenario file only names the
/// satellite and its mesh.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Scenario {
    /// Satellite name, used to derive the attitude file name
    pub name: String,
    /// Wavefront OBJ subset describing the satellite parts
    pub model_path: PathBuf,
    /// Attitude CSV; empty means `<name><suffix>_SunAngles.csv` beside the mesh
    pub attitude_path: PathBuf,
    /// Directory receiving the area and power output files
    pub output_dir: PathBuf,
    /// Suffix inserted into derived file names
    pub output_suffix: String,
    /// Render target edge length in pixels
    pub screen_size_px: u32,
    /// Orthographic view edge length in meters
    pub screen_size_m: f32,
    pub model_scale: f32,
    /// Conversion efficiency of the solar cells
    pub cell_efficiency: f32,
    /// Part indices that carry solar cells
    pub solar_cell_parts: Vec<usize>,
    /// Orbit altitude in kilometers, sets the eclipse threshold
    pub altitude_km: f64,
    /// Seconds between consecutive attitude samples
    pub time_step_s: f64,
    /// Cursor position at the start of a run
    pub start_index: usize,
    /// Whether output files are written at all
    pub write_data: bool,
    /// Buffered lines per output file before an automatic flush
    pub write_block_size: usize,
    pub azimuth_offset_deg: f32,
    pub elevation_offset_deg: f32,
    /// Grayscale ramp part colors instead of the RGB grid
    pub use_grayscale: bool,
}

impl Default for Scenario {
    fn default() -> Self {
        Self {
            name: "satellite".to_string(),
            model_path: PathBuf::from("satellite.obj"),
            attitude_path: PathBuf::new(),
            output_dir: PathBuf::from("."),
            output_suffix: String::new(),
            screen_size_px: 800,
            screen_size_m: 1.0,
            model_scale: 1.0,
            cell_efficiency: 0.3,
            solar_cell_parts: vec![0],
            altitude_km: 500.0,
            time_step_s: 1.0,
            start_index: 0,
            write_data: false,
            write_block_size: 10_000,
            azimuth_offset_deg: 0.0,
            elevation_offset_deg: 0.0,
            use_grayscale: true,
        }
    }
}

impl Scenario {
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }

    /// Derive the quantities every downstream component consumes. Done once;
    /// the result is never mutated afterwards.
    pub fn resolve(self) -> Resolved {
        let ratio = EARTH_RADIUS_KM / (EARTH_RADIUS_KM + self.altitude_km);
        let eclipse_threshold_deg = 90.0 + ratio.acos().to_degrees();
        let pixel_area_m2 = (self.screen_size_m * self.screen_size_m)
            / (self.screen_size_px as f32 * self.screen_size_px as f32);
        Resolved {
            eclipse_threshold_deg,
            pixel_area_m2,
            scenario: self,
        }
    }
}

/// Scenario plus its derived quantities
#[derive(Clone, Debug)]
pub struct Resolved {
    pub scenario: Scenario,
    /// Below this |eclipse angle| the satellite is in Earth's shadow, degrees
    pub eclipse_threshold_deg: f64,
    /// Area of one render-target pixel in m^2
    pub pixel_area_m2: f32,
}

impl Resolved {
    pub fn attitude_file(&self) -> PathBuf {
        if self.scenario.attitude_path.as_os_str().is_empty() {
            let dir = self.scenario.model_path.parent().unwrap_or(Path::new("."));
            dir.join(format!(
                "{}{}_SunAngles.csv",
                self.scenario.name, self.scenario.output_suffix
            ))
        } else {
            self.scenario.attitude_path.clone()
        }
    }

    pub fn area_file(&self) -> PathBuf {
        self.scenario
            .output_dir
            .join(format!("Out_AreaSunView{}.txt", self.scenario.output_suffix))
    }

    pub fn power_file(&self) -> PathBuf {
        self.scenario
            .output_dir
            .join(format!("Out_Power{}.txt", self.scenario.output_suffix))
    }
}
