//! Core of the press production workflow.
//!
//! Orders move through intake, review, manufacturing and printing. This crate
//! enforces the stage guards, the manufacturing checklist gate and the print
//! queue ordering, and records every successful operation in an append-only
//! timeline committed atomically with the change it describes.
//!
//! The entry point is [`WorkflowEngine`], usually built through
//! [`WorkflowBuilder`] from a loaded configuration.

pub mod builder;
pub mod checklist;
pub mod clock;
pub mod engine;
pub mod error;
pub mod handlers;
pub mod queue;
pub mod state;
pub mod timeline;

pub use builder::{BuilderError, WorkflowBuilder, WorkflowFactories};
pub use checklist::ChecklistGate;
pub use clock::{Clock, FixedClock, SystemClock};
pub use engine::{WorkflowEngine, WorkflowSettings};
pub use error::WorkflowError;
pub use handlers::{NewOrder, ReviewSubmission};
pub use queue::{PrintQueue, ReorderReport};
pub use state::OrderStateMachine;
pub use timeline::AuditTimeline;
