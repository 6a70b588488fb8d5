//! Session state for the labelling workflow.
//!
//! This module contains:
//! - The ordered, filterable image set
//! - The per-image annotation record and its geometry
//! - The session controller that drives the workflow

mod dataset;
mod record;
mod session;

pub use dataset::*;
pub use record::*;
pub use session::*;
