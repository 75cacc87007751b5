//! Configuration loading and CLI argument parsing.
//!
//! Configuration is merged from three sources, later ones overriding
//! earlier ones:
//!
//! 1. **YAML config file** - base configuration (default: `config.yaml`,
//!    overridable via `-f` or `DEALGATE_CONFIG`)
//! 2. **Environment variables** - `DEALGATE_` prefix, `__` as the nesting
//!    separator (e.g. `DEALGATE_AUTH__ACCESS_TOKEN_TTL=30m`)
//! 3. **`DATABASE_URL`** - accepted bare for compatibility with common
//!    deployment tooling
//!
//! Durations use humantime syntax (`2h`, `30m`, `720h`).

use std::time::Duration;

use clap::{Parser, Subcommand};
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};

/// CLI arguments: config file location plus the subcommand to run.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "DEALGATE_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Validate configuration and exit without starting the server
    #[arg(long)]
    pub validate: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the HTTP server (the default when no subcommand is given)
    Serve,
    /// Create the initial admin account; refuses to run if one exists
    Init {
        /// Admin username
        #[arg(long, default_value = "admin")]
        username: String,
        /// Admin password; prompted for on stdin when omitted
        #[arg(long)]
        password: Option<String>,
    },
    /// Reset a user's password from the operator console
    ResetPassword {
        /// Username of the account to reset
        #[arg(long)]
        username: String,
        /// New password; prompted for on stdin when omitted
        #[arg(long)]
        password: Option<String>,
    },
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// HTTP server host to bind to
    pub host: String,
    /// HTTP server port to bind to
    pub port: u16,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    /// OAuth clients seeded into an empty client registry at first boot.
    /// They are never re-seeded once the registry has any rows; use the
    /// admin API after that.
    pub clients: Vec<ClientSeed>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            database: DatabaseConfig::default(),
            auth: AuthConfig::default(),
            clients: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,
    /// Connection pool size
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost:5432/dealgate".to_string(),
            max_connections: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuthConfig {
    /// Access token lifetime (default: 2h)
    #[serde(with = "humantime_serde")]
    pub access_token_ttl: Duration,
    /// Refresh token lifetime (default: 30 days)
    #[serde(with = "humantime_serde")]
    pub refresh_token_ttl: Duration,
    /// Minimum password length enforced at registration and resets
    pub password_min_length: usize,
    /// Argon2 memory cost in KiB
    pub hash_memory_kib: u32,
    /// Argon2 iteration count
    pub hash_iterations: u32,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            access_token_ttl: Duration::from_secs(2 * 60 * 60),
            refresh_token_ttl: Duration::from_secs(30 * 24 * 60 * 60),
            password_min_length: 8,
            hash_memory_kib: 19456,
            hash_iterations: 2,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct ClientSeed {
    pub id: String,
    pub secret: String,
    pub domain: String,
}

impl Config {
    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        let config: Self = Self::figment(args).extract()?;
        config.validate()?;
        Ok(config)
    }

    fn figment(args: &Args) -> Figment {
        Figment::new()
            .merge(Yaml::file(&args.config))
            .merge(Env::prefixed("DEALGATE_").split("__"))
            .merge(Env::raw().only(&["DATABASE_URL"]).map(|_| "database.url".into()))
    }

    fn validate(&self) -> Result<(), figment::Error> {
        if self.clients.iter().any(|c| c.id.is_empty()) {
            return Err(figment::Error::from("seed clients must have a non-empty id".to_string()));
        }
        if self.auth.access_token_ttl.is_zero() || self.auth.refresh_token_ttl.is_zero() {
            return Err(figment::Error::from("token lifetimes must be non-zero".to_string()));
        }
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    fn default_args() -> Args {
        Args {
            config: "config.yaml".to_string(),
            validate: false,
            command: None,
        }
    }

    #[test]
    fn test_defaults_without_config_file() {
        Jail::expect_with(|_jail| {
            let config = Config::load(&default_args()).unwrap();
            assert_eq!(config.port, 8080);
            assert_eq!(config.auth.password_min_length, 8);
            assert_eq!(config.auth.access_token_ttl, Duration::from_secs(7200));
            assert!(config.clients.is_empty());
            Ok(())
        });
    }

    #[test]
    fn test_yaml_file_with_env_override() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "config.yaml",
                r#"
                port: 9000
                auth:
                  access_token_ttl: 15m
                clients:
                  - id: web
                    secret: s3cret
                    domain: https://deals.example.com
                "#,
            )?;
            jail.set_env("DEALGATE_PORT", "9100");
            jail.set_env("DEALGATE_AUTH__PASSWORD_MIN_LENGTH", "12");

            let config = Config::load(&default_args()).unwrap();
            assert_eq!(config.port, 9100);
            assert_eq!(config.auth.access_token_ttl, Duration::from_secs(900));
            assert_eq!(config.auth.password_min_length, 12);
            assert_eq!(config.clients.len(), 1);
            assert_eq!(config.clients[0].id, "web");
            Ok(())
        });
    }

    #[test]
    fn test_bare_database_url_is_accepted() {
        Jail::expect_with(|jail| {
            jail.set_env("DATABASE_URL", "postgres://db.internal:5432/deals");
            let config = Config::load(&default_args()).unwrap();
            assert_eq!(config.database.url, "postgres://db.internal:5432/deals");
            Ok(())
        });
    }

    #[test]
    fn test_rejects_seed_client_with_empty_id() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "config.yaml",
                r#"
                clients:
                  - id: ""
                "#,
            )?;
            assert!(Config::load(&default_args()).is_err());
            Ok(())
        });
    }

    #[test]
    fn test_rejects_zero_token_lifetime() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "config.yaml",
                r#"
                auth:
                  access_token_ttl: 0s
                "#,
            )?;
            assert!(Config::load(&default_args()).is_err());
            Ok(())
        });
    }
}
