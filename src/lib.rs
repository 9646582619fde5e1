// src/lib.rs

pub mod cleanup;
pub mod compare;
pub mod config;
pub mod constants;
pub mod driver;
pub mod layout;
pub mod listing;
pub mod pattern;
pub mod preflight;
pub mod report;
pub mod results_dir; // Results directory layout and run metadata
pub mod runner; // Timing runner seam (hyperfine)
pub mod seed;
pub mod store; // ObjectStore seam: S3 and in-memory backends

pub use config::BenchConfig;
pub use pattern::Pattern;
