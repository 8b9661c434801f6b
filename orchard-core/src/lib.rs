pub mod epoch;
pub mod layout;
pub mod mode;
pub mod sample;
pub mod side;
pub mod trial;

pub use epoch::{Epoch, EpochMeta, FeatureVector};
pub use layout::{electrode_position, ChannelLayout};
pub use mode::{DecisionKind, SessionMode};
pub use sample::SampleWindow;
pub use side::{HandState, Hands, Side};
pub use trial::{TrialOutcome, TrialRecord};
