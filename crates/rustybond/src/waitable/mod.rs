//! Blocking, timeout-bounded access to asynchronous results
//!
//! A [`Waitable`] resolves exactly once, either with a value or by timing
//! out. Pairing and scan completion are exposed through it so synchronous
//! callers can block their own thread without stalling event delivery.

mod core;
mod scan;
#[cfg(test)]
mod tests;

pub use self::core::{GenericWaitable, Notifier, Waitable};
pub use self::scan::ScanFinishedWaitable;
