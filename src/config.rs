//! Server configuration from environment variables.

use std::net::SocketAddr;

// 8879 is ascii for "XO"
const DEFAULT_PORT: u16 = 8879;

/// Runtime configuration for the match service.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the HTTP server binds to.
    pub bind: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let port = std::env::var("PORT")
            .ok()
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(DEFAULT_PORT);

        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], port)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn default_port_applies_without_env() {
        std::env::remove_var("PORT");
        let config = ServerConfig::from_env();
        assert_eq!(config.bind.port(), DEFAULT_PORT);
    }

    #[test]
    #[serial]
    fn port_env_overrides_default() {
        std::env::set_var("PORT", "4321");
        let config = ServerConfig::from_env();
        assert_eq!(config.bind.port(), 4321);
        std::env::remove_var("PORT");
    }

    #[test]
    #[serial]
    fn unparsable_port_falls_back_to_default() {
        std::env::set_var("PORT", "not-a-port");
        let config = ServerConfig::from_env();
        assert_eq!(config.bind.port(), DEFAULT_PORT);
        std::env::remove_var("PORT");
    }
}
