//! Progress classification and wire-level message types
//!
//! The deploy script emits unstructured text; [`classifier::classify`] maps
//! known marker lines onto structured [`ProgressEvent`]s. Everything the
//! browser receives travels as an [`OutboundMessage`].

pub mod classifier;
mod types;

pub use classifier::{classify, strip_ansi};
pub use types::{OutboundMessage, ProgressEvent, ProgressStatus, Stage};
