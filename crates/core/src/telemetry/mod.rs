pub mod mirror;
pub mod source;

pub use mirror::{Simulator, TelemetryMirror};
pub use source::{PowerSupplySource, ScriptedSource, SysfsSource, TelemetryError, TelemetryReading, TelemetrySource};
