//! Race audio: the engine voice, the finish celebration, and the
//! context/parameter seams they are written against.

pub mod celebration;
pub mod context;
pub mod engine_node;
pub mod param;

pub use celebration::{CelebrationSchedule, CelebrationSynth};
pub use context::{AudioContext, ContextState, EngineParam, SoundEvent};
pub use engine_node::{AudioEngineNode, ContextFactory};
pub use param::{AudioParam, AutomatedParam, Automation};
