//! Keystone Convention Dispatch
//!
//! Conventions are automatic inference passes that react to changes in the
//! schema graph. This crate defines what they react to and when they run.
//!
//! Responsibilities:
//! - Model events describing each structural change
//! - The batch dispatcher that queues events while batches are open
//! - The convention trait and the ordered convention set

mod convention;
mod dispatcher;
mod event;

pub use convention::{Convention, ConventionSet};
pub use dispatcher::{ConventionBatch, ConventionDispatcher};
pub use event::ModelEvent;
