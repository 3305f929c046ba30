pub mod alloc;
pub mod arch;
pub mod fs;
pub mod header;
pub mod strutil;

pub use alloc::{global, AllocError, LeakReport, TrackedBuffer, Tracker};
pub use arch::*;
