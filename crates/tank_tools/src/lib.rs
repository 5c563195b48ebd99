//! # Tank Arena Development Tools
//!
//! Command-line tools for development:
//! - Level layout validation

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod validate;
