//! Device drivers
//!
//! The lifecycle core needs exactly one device: somewhere to print.

pub mod console;

pub use console::ConsoleSink;
