//! rollcalld: Attendance daemon.
//!
//! Registers students from webcam snapshots and marks attendance when a
//! snapshot matches the gallery, at most once per dedup window.

pub mod api;
pub mod archive;
pub mod config;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod service;
pub mod store;

pub use config::Config;
pub use error::AppError;
pub use service::AttendanceService;
