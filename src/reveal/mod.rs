//! Weekly reveal of hidden contributions: when it happens, how it is applied,
//! and the background thread that triggers it.

pub mod executor;
pub mod poller;
pub mod schedule;
