//! gRPC server configuration.

use serde::Deserialize;

/// Default gRPC port for the ledger service.
pub const DEFAULT_PORT: u16 = 50061;

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to.
    pub host: String,
    /// Port for the ledger gRPC service.
    pub port: u16,
}

impl ServerConfig {
    /// Socket address string for the listener.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_config_default() {
        let server = ServerConfig::default();
        assert_eq!(server.port, DEFAULT_PORT);
        assert_eq!(server.host, "0.0.0.0");
        assert_eq!(server.bind_address(), "0.0.0.0:50061");
    }
}
