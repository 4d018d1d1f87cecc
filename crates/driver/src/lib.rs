pub mod config;
pub mod driver;
pub mod metrics;

pub use config::{ConfigError, ConsumerConfig};
pub use driver::{Driver, DriverError, DriverState, RunSummary};
pub use metrics::{MetricsSummary, RunMetrics};
