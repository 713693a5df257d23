//! Invoice generator for IPTV resellers.
//!
//! Settings (businesses, packages, payment methods, currencies) and a single
//! draft invoice are kept as JSON records in a local data directory. The
//! composer builds and validates the draft, the renderer resolves it against
//! the current settings and produces a print-ready document.

pub mod catalog;
pub mod composer;
pub mod config;
pub mod error;
pub mod model;
pub mod render;
pub mod store;

pub use error::{Result, StreambillError, ValidationError};
