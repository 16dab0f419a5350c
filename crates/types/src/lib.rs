//! Shared type definitions for the YBA orchestration client.
//!
//! These types are plain data: the session every call borrows, the task
//! documents observed while polling, and the typed parameters fed to the
//! template engine.

pub mod params;
pub mod session;
pub mod task;

pub use params::{ParamValue, ParameterSet};
pub use session::SessionContext;
pub use task::{Task, TaskStatus, TaskStep};
