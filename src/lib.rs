// Vehicle Dynamics Estimator
// Per-corner load transfer and gear estimation from bus signals, published as
// an immutable snapshot for display and logging tasks.

pub mod can_frames;
pub mod error;
pub mod estimator;
pub mod live_status;
pub mod params;
pub mod physics;
pub mod sensors;
pub mod signals;
pub mod types;

// Re-export the types consumers touch most
pub use error::{EResult, EstimatorError};
pub use estimator::{EstimationsState, Estimator};
pub use params::{RpmDecoding, VehicleParams};
pub use signals::{BusState, SignalBus, Signals};
pub use types::{Estimations, Gear, LoadQuality, LoadTransfer};
