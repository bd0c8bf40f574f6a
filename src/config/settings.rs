use serde::Deserialize;

/// Top-level configuration settings for the broker process.
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub broker: BrokerSettings,
    pub log: LogSettings,
}

/// Where the WebSocket server binds.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

/// Broker behaviour: the kill switch, origin allow-list, and limits.
#[derive(Debug, Deserialize, Clone)]
pub struct BrokerSettings {
    pub enabled: bool,
    /// Always accepted; cannot be removed at runtime.
    pub host_origin: String,
    pub accepted_origins: Vec<String>,
    pub max_connections: usize,
    pub event_capacity: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogSettings {
    pub level: String,
}

/// Partial configuration settings loaded from files or environment.
///
/// Missing values are filled from `Settings::default()`.
#[derive(Debug, Deserialize)]
pub struct PartialSettings {
    pub server: Option<PartialServerSettings>,
    pub broker: Option<PartialBrokerSettings>,
    pub log: Option<PartialLogSettings>,
}

#[derive(Debug, Deserialize)]
pub struct PartialServerSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
}

#[derive(Debug, Deserialize)]
pub struct PartialBrokerSettings {
    pub enabled: Option<bool>,
    pub host_origin: Option<String>,
    pub accepted_origins: Option<Vec<String>>,
    pub max_connections: Option<usize>,
    pub event_capacity: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct PartialLogSettings {
    pub level: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerSettings::default(),
            broker: BrokerSettings::default(),
            log: LogSettings {
                level: "info".to_string(),
            },
        }
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            host_origin: "http://127.0.0.1:8080".to_string(),
            accepted_origins: Vec::new(),
            max_connections: 1000,
            event_capacity: 64,
        }
    }
}
