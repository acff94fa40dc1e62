//! `pdfstamp`: place text and check markers on PDF pages from the shell
//!
//! The history lives in a JSON key-value file between invocations, so
//! entries added in one run are rendered by the next.

pub mod commands;
pub mod config;
pub mod raster;

pub use commands::{execute, Command, DraftArgs, Report};
pub use config::Config;
