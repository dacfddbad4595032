pub mod attitude;
pub mod mesh;
pub mod output;
pub mod palette;

pub use attitude::{AttitudeSample, AttitudeTimeline};
pub use mesh::{FlatVertex, Part, SatelliteModel};
pub use output::BlockWriter;
