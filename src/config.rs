use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    /// Pending push messages a viewer may hold before it is evicted
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,
    #[serde(default = "default_cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            queue_capacity: default_queue_capacity(),
            keep_alive_secs: default_keep_alive_secs(),
            cleanup_interval_secs: default_cleanup_interval_secs(),
        }
    }
}

fn default_port() -> u16 {
    8080
}

fn default_queue_capacity() -> usize {
    mixboard::DEFAULT_QUEUE_CAPACITY
}

fn default_keep_alive_secs() -> u64 {
    10
}

fn default_cleanup_interval_secs() -> u64 {
    30
}

impl ServerConfig {
    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let config_path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.yaml".to_string());

        let mut config = if Path::new(&config_path).exists() {
            let content = std::fs::read_to_string(&config_path)?;
            serde_yaml::from_str(&content)?
        } else {
            Self::default()
        };

        // Environment overrides the file
        if let Some(port) = env_parse("PORT")? {
            config.server.port = port;
        }
        if let Some(capacity) = env_parse("QUEUE_CAPACITY")? {
            config.server.queue_capacity = capacity;
        }
        if let Some(secs) = env_parse("KEEP_ALIVE_SECS")? {
            config.server.keep_alive_secs = secs;
        }
        if let Some(secs) = env_parse("CLEANUP_INTERVAL_SECS")? {
            config.server.cleanup_interval_secs = secs;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> mixboard::Result<()> {
        if self.server.queue_capacity == 0 {
            return Err(mixboard::Error::Config("queue_capacity must be at least 1".into()));
        }
        if self.server.keep_alive_secs == 0 {
            return Err(mixboard::Error::Config("keep_alive_secs must be at least 1".into()));
        }
        if self.server.cleanup_interval_secs == 0 {
            return Err(mixboard::Error::Config("cleanup_interval_secs must be at least 1".into()));
        }
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> anyhow::Result<Option<T>> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| anyhow::anyhow!("{name} has an invalid value: {raw:?}")),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yaml_with_partial_server_section() {
        let config: AppConfig = serde_yaml::from_str("server:\n  port: 9000\n").unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.queue_capacity, mixboard::DEFAULT_QUEUE_CAPACITY);
        assert_eq!(config.server.keep_alive(), Duration::from_secs(10));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_yaml_uses_defaults() {
        let config: AppConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.cleanup_interval(), Duration::from_secs(30));
    }

    #[test]
    fn test_zero_queue_capacity_is_rejected() {
        let mut config = AppConfig::default();
        config.server.queue_capacity = 0;
        assert!(matches!(config.validate(), Err(mixboard::Error::Config(_))));
    }
}
