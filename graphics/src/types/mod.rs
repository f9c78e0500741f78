//! Common types and descriptors for graphics resources.
//!
//! This module contains format enums, bind flags, and descriptor structs
//! used throughout the graphics system.

mod common;
mod resource;
mod texture;

pub use common::{ClearValue, Extent2d, Extent3d};
pub use resource::ResourceDesc;
pub use texture::{BindFlags, ResourceFormat, ResourceKind};
