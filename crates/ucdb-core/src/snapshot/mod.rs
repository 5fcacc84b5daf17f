//! Offline inspection of recorded runtime state.
//!
//! A [`RuntimeImage`] describes clusters, processors and tasks as plain
//! data. [`SnapshotHost`] lays one out as simulated inferior memory and
//! serves it through [`crate::host::DebuggerHost`], so every query and
//! switch can run without a live debugger.

mod host;
mod image;

pub use host::SnapshotHost;
pub use image::{
    ClusterBuilder, ClusterImage, ContextImage, DEFAULT_SWITCH_ADDRESS, ImageBuilder, ImageError,
    ImageResult, ProcessorImage, RuntimeImage, TaskImage, TaskPath,
};
