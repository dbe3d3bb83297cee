pub mod controller;
pub mod modules;
pub mod reconcile;
pub mod telemetry;
pub mod utils;
