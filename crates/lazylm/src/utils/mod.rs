pub mod telemetry;

pub use telemetry::{TelemetryError, init_tracing, truncate};
