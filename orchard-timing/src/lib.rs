pub mod pacer;
pub mod timer;

pub use pacer::TickPacer;
pub use timer::{CalibrationStats, HighPrecisionTimer, ManualTimer, Timer};
