pub mod config;
pub mod control;
pub mod extract;
pub mod logging;
pub mod telemetry;
pub mod transfer;
