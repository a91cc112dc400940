//! Core library for the bias input-handling engine.
//!
//! The crate maps abstract input events to application behaviour and keeps
//! frame-synchronized timers for the render loop that drives it. Each module
//! owns one piece of that pipeline (shortcuts, events, handler resolution,
//! binding and stage tables, the dispatching profile, timers) so hosts can use
//! the parts they need. Everything is single-threaded and poll-driven.

pub mod binding;
pub mod config;
pub mod error;
pub mod event;
pub mod handler;
pub mod interactive;
pub mod profile;
pub mod shortcut;
pub mod stage;
pub mod timing;

pub use binding::BindingTable;
pub use config::{BindingConfig, EngineConfig, StageConfig, TimingConfig};
pub use error::{BiasError, HandlerResult, Result};
pub use event::{Category, Event};
pub use handler::{HandlerRef, HandlerRegistry, Owner, Registration, Shape};
pub use interactive::InteractiveObject;
pub use profile::{Dispatch, Profile};
pub use shortcut::{Modifiers, Shortcut, ShortcutKind};
pub use stage::{Phase, Stage, StageTable};
pub use timing::{Clock, ManualClock, SeqTimer, SystemClock, TimerId, TimingHandler, TimingTask};
