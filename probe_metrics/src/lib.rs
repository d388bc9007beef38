pub mod agent;
pub mod collector;
pub mod exporters;

pub use agent::AgentMetrics;
pub use collector::{families, ScrapeSnapshot, ServiceExporter};
