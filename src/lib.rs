//! Animated desktop companion: a state machine over sprite-sheet animations
//! with drag repositioning and move-towards stepping.

pub mod animation;
pub mod app;
pub mod config;
pub mod error;
pub mod frames;
pub mod host;
pub mod machine;
pub mod menu;
pub mod position;
pub mod state;
pub mod surface;
pub mod transition;

pub use animation::{AnimationState, MoveTo, TimerState};
pub use config::PetConfig;
pub use error::{Error, Result, SurfaceError};
pub use frames::{AnimationSpec, FrameFrom, FramePlayer, FrameTo, SheetGeometry, Step};
pub use host::{Host, MachineId};
pub use machine::{Machine, MachineBuilder};
pub use menu::{ContextMenu, MenuAction, PetContext};
pub use position::{DragChange, Pointer, PointerButton, PointerEvent, PointerPhase, Position};
pub use state::{Capability, State, StateContext, StateCore, StateOptions};
pub use surface::{Blit, Placement, RecordingSurface, RenderSurface};
pub use transition::Transition;

/// Key every default transition falls back to.
pub const IDLE: &str = "idle";

/// Sentinel accepted by [`Machine::play`] meaning "the state active right now".
pub const PREVIOUS: &str = "previous";
