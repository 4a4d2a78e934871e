//! Operation handlers, grouped by the part of the pipeline they act on.
//!
//! Each handler method performs one attempt of an operation: load, check
//! guards, stage writes, commit. Retrying on conflicts is the engine's job.

pub mod admin;
pub mod intake;
pub mod manufacturing;
pub mod printing;
pub mod review;

pub use admin::AdminHandler;
pub use intake::{IntakeHandler, NewOrder};
pub use manufacturing::ManufacturingHandler;
pub use printing::PrintingHandler;
pub use review::{ReviewHandler, ReviewSubmission};
