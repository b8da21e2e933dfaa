pub mod error;

pub use error::{ConfigError, GeometryError, MotionError, SimError, SimResult};
