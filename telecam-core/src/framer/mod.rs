//! Turn transport bytes into whole raw frames in a [`FrameStore`].
//!
//! [`FrameStore`]: crate::frame::FrameStore

pub mod counted;
pub mod sentinel;

pub use counted::{CountedSliceFramer, SlicePolicy};
pub use sentinel::{Extracted, SentinelFramer};
