//! Runtime plumbing shared by every part of the service.
//!
//! - [`EventBus`]: broadcast of model events

mod eventbus;

pub use eventbus::{EventBus, DEFAULT_CAPACITY};
