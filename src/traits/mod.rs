//! Trait definitions for resource operations.
//!
//! Each resource type implements the capability set the workflow needs,
//! encapsulating its storage and response differences in the
//! implementation.

mod update;

pub use update::UpdateResource;
