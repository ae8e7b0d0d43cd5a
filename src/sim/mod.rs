//! Race simulation: the per-frame physics clock and the frame scheduler
//! that drives it.

pub mod clock;
pub mod scheduler;

pub use clock::{EngineSound, KinematicState, SimulationClock};
pub use scheduler::{FrameId, FrameLoop, FrameScheduler, VirtualScheduler};
