//! # Warden Development Tools
//!
//! Command-line tools for development:
//! - Planning scenario loading and validation
//! - Offline build-order planning with either planner

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod planning;
pub mod scenario;
pub mod validate;
