pub mod config;
pub mod connectivity;
pub mod history;
pub mod insight;
pub mod io;
pub mod lifecycle;
pub mod runtime;
pub mod telemetry;
pub mod types;
