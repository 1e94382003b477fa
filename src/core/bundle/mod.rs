//! Transaction bundle building
//!
//! Reads a job's artifacts, gives every record a bundle-local `urn:uuid:`
//! identity and orders entries by [`priority::DEPENDENCY_ORDER`].

pub mod builder;
pub mod priority;

pub use builder::{Bundle, BundleBuilder, BundleEntry, BundleRequest, LARGE_BUNDLE_ENTRIES};
pub use priority::{priority, DEPENDENCY_ORDER, UNMAPPED_PRIORITY};
