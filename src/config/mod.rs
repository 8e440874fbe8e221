use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub security: SecurityConfig,
    pub policy: PolicyConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Prefix prepended to endpoint URLs in the service banner, e.g.
    /// "https://api.minddrag.example". Empty for relative paths.
    pub host_prefix: String,
    pub port: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub backend: StoreBackend,
    pub max_connections: u32,
    pub connection_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Realm announced in the WWW-Authenticate challenge.
    pub auth_realm: String,
    pub enable_cors: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Require connected dragables to share a team. Off by default; the
    /// permissive behavior is the documented one.
    pub enforce_same_team_connections: bool,
    /// Deleting a team removes its dragables (and their annotations);
    /// deleting a dragable removes its annotations. With this off, deletes
    /// of non-empty parents are refused instead.
    pub cascade_delete: bool,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Server overrides
        if let Ok(v) = env::var("MINDDRAG_HOST_PREFIX") {
            self.server.host_prefix = v;
        }
        if let Ok(v) = env::var("MINDDRAG_API_PORT").or_else(|_| env::var("PORT")) {
            self.server.port = v.parse().unwrap_or(self.server.port);
        }

        // Database overrides
        if let Ok(v) = env::var("MINDDRAG_STORE") {
            self.database.backend = match v.to_ascii_lowercase().as_str() {
                "memory" => StoreBackend::Memory,
                _ => StoreBackend::Postgres,
            };
        }
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout =
                v.parse().unwrap_or(self.database.connection_timeout);
        }

        // Security overrides
        if let Ok(v) = env::var("MINDDRAG_AUTH_REALM") {
            self.security.auth_realm = v;
        }
        if let Ok(v) = env::var("SECURITY_ENABLE_CORS") {
            self.security.enable_cors = v.parse().unwrap_or(self.security.enable_cors);
        }

        // Policy overrides
        if let Ok(v) = env::var("MINDDRAG_ENFORCE_SAME_TEAM_CONNECTIONS") {
            self.policy.enforce_same_team_connections =
                v.parse().unwrap_or(self.policy.enforce_same_team_connections);
        }
        if let Ok(v) = env::var("MINDDRAG_CASCADE_DELETE") {
            self.policy.cascade_delete = v.parse().unwrap_or(self.policy.cascade_delete);
        }

        self
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig {
                host_prefix: String::new(),
                port: 3000,
            },
            database: DatabaseConfig {
                backend: StoreBackend::Postgres,
                max_connections: 10,
                connection_timeout: 30,
            },
            security: SecurityConfig {
                auth_realm: "Minddrag API".to_string(),
                enable_cors: true,
            },
            policy: PolicyConfig {
                enforce_same_team_connections: false,
                cascade_delete: true,
            },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            server: ServerConfig {
                host_prefix: "https://staging.minddrag.example".to_string(),
                port: 3000,
            },
            database: DatabaseConfig {
                backend: StoreBackend::Postgres,
                max_connections: 20,
                connection_timeout: 10,
            },
            security: SecurityConfig {
                auth_realm: "Minddrag API".to_string(),
                enable_cors: true,
            },
            policy: PolicyConfig {
                enforce_same_team_connections: false,
                cascade_delete: true,
            },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            server: ServerConfig {
                host_prefix: "https://minddrag.example".to_string(),
                port: 3000,
            },
            database: DatabaseConfig {
                backend: StoreBackend::Postgres,
                max_connections: 50,
                connection_timeout: 5,
            },
            security: SecurityConfig {
                auth_realm: "Minddrag API".to_string(),
                enable_cors: true,
            },
            policy: PolicyConfig {
                enforce_same_team_connections: false,
                cascade_delete: true,
            },
        }
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}
