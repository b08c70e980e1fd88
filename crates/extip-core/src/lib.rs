pub mod config;
pub mod resource;

pub use config::{AgentSettings, ControllerSettings, ExtipConfig, QuotaSettings, parse_duration};
pub use resource::{ResourceDescriptor, ResourceKind};
