//! Casework engine for housing-benefit (Wohngeld) applications: deadline lifecycle,
//! readiness evaluation, draft generation and the dashboard rollup.

pub mod casework;
pub mod config;
pub mod error;
pub mod telemetry;

pub use error::AppError;
