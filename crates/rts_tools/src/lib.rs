//! # RTS Development Tools
//!
//! Command-line tools for development:
//! - Asset converters
//! - Data validators
//! - Map editor (future)

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod validate;
