//! Document acquisition and release.

pub mod resource;

pub use resource::{DocumentError, DocumentHandle, DocumentLoader, DocumentSlot};
