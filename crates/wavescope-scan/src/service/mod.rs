//! Long-running services built on the core.

mod scan_loop;

pub use scan_loop::{PublishedState, ScanHandle, ScanLoop, ScanStatus};
