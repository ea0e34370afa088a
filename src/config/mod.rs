pub mod broker;
pub mod settings;

pub use broker::{BrokerConfig, BrokerConfigBuilder};
pub use settings::Settings;
