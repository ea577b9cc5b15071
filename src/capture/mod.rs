//! Media capture
//!
//! Platform-agnostic media handles, device acquisition and a simulated
//! platform for headless runs.

pub mod acquisition;
pub mod simulated;
pub mod traits;

pub use acquisition::{acquire_streams, AcquiredStreams, AcquisitionPolicy, RecordingMode};
pub use simulated::SimulatedPlatform;
pub use traits::{DeviceError, MediaDevices, MediaStream, MediaTrack, TrackKind, TrackState};
