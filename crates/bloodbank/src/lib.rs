//! LifeCare blood bank: allocation engine, dispensation processing, and
//! donation intake, exposed as a library with an embeddable axum router.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
