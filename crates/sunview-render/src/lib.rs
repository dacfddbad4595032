//! GPU side of the sunlit-area measurement: headless device bootstrap,
//! the sun-direction orthographic camera, the occlusion-query area
//! estimator and PNG snapshots.

pub mod camera;
pub mod context;
pub mod error;
pub mod estimator;
pub mod gpu_types;
pub mod pipeline;
pub mod snapshot;

pub use camera::{CameraUniform, SunCamera};
pub use context::GpuContext;
pub use error::{RenderError, RenderResult};
pub use estimator::Estimator;
pub use snapshot::save_snapshot;
