//! Acquisition side of the pipeline: resolving a named biosignal stream,
//! pulling whatever it has buffered, and cleaning up the timestamps.

pub mod correct;
pub mod error;
pub mod ingest;
pub mod inlet;
pub mod memory;
pub mod simulated;
pub mod tcp;

pub use correct::{correct_timestamps, CorrectionOptions};
pub use error::{StreamError, StreamResult};
pub use ingest::StreamIngestion;
pub use inlet::{Chunk, StreamInfo, StreamInlet, StreamResolver};
pub use memory::MemoryInlet;
pub use simulated::{SimulatedInlet, SimulatedResolver, SimulationOptions};
pub use tcp::{TcpInlet, TcpOutlet, TcpResolver};
