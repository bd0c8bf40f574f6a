mod settings;

use config::{Config, ConfigError, Environment, File};

use settings::PartialSettings;

pub use settings::{BrokerSettings, LogSettings, ServerSettings, Settings};

/// Prefix for environment overrides, e.g. `FRAMEBUS_SERVER__PORT=9000`.
pub const ENV_PREFIX: &str = "FRAMEBUS";

/// Loads the configuration from `config/default` and `FRAMEBUS_*`
/// environment variables, merged over `Settings::default()`.
///
/// `FRAMEBUS_BROKER__ACCEPTED_ORIGINS` takes a comma-separated list.
pub fn load_config() -> Result<Settings, ConfigError> {
    let builder = Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("broker.accepted_origins"),
        );

    let config = builder.build()?;

    // Try to deserialize what is available
    let partial: PartialSettings = config.try_deserialize()?;

    Ok(merge(partial, Settings::default()))
}

fn merge(partial: PartialSettings, default: Settings) -> Settings {
    let server = partial.server;
    let broker = partial.broker;
    let log = partial.log;

    Settings {
        server: ServerSettings {
            host: server
                .as_ref()
                .and_then(|s| s.host.clone())
                .unwrap_or(default.server.host),
            port: server
                .as_ref()
                .and_then(|s| s.port)
                .unwrap_or(default.server.port),
        },
        broker: BrokerSettings {
            enabled: broker
                .as_ref()
                .and_then(|b| b.enabled)
                .unwrap_or(default.broker.enabled),
            host_origin: broker
                .as_ref()
                .and_then(|b| b.host_origin.clone())
                .unwrap_or(default.broker.host_origin),
            accepted_origins: broker
                .as_ref()
                .and_then(|b| b.accepted_origins.clone())
                .unwrap_or(default.broker.accepted_origins),
            max_connections: broker
                .as_ref()
                .and_then(|b| b.max_connections)
                .unwrap_or(default.broker.max_connections),
            event_capacity: broker
                .as_ref()
                .and_then(|b| b.event_capacity)
                .unwrap_or(default.broker.event_capacity),
        },
        log: LogSettings {
            level: log
                .as_ref()
                .and_then(|l| l.level.clone())
                .unwrap_or(default.log.level),
        },
    }
}

#[cfg(test)]
mod tests;
