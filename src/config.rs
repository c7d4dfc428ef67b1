use std::{fmt, path::PathBuf, str::FromStr};

use anyhow::{Context, Result};
use tracing::{error, info};

/// Fallback shared secret used when `SAFEDRIVE_API_KEY` is not set.
pub const DEFAULT_API_KEY: &str = "safedrive_secret_key";

/// Variables whose absence is reported at startup. None of them is fatal.
const REPORTED_VARS: [&str; 3] = ["DATABASE_URL", "SAFEDRIVE_API_KEY", "APP_ENV"];

// ---------------------------------------------------------------------------
// Environment
// ---------------------------------------------------------------------------

/// Deployment mode, read from `APP_ENV`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    Production,
    #[default]
    Development,
    Test,
}

impl Environment {
    /// Whether unhandled error responses may carry the underlying message.
    pub fn exposes_error_details(self) -> bool {
        self == Self::Development
    }
}

impl FromStr for Environment {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "production" => Ok(Self::Production),
            "development" => Ok(Self::Development),
            "test" => Ok(Self::Test),
            other => Err(anyhow::anyhow!("unknown environment: {other:?}")),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Production => "production",
            Self::Development => "development",
            Self::Test => "test",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// StoreBackend
// ---------------------------------------------------------------------------

/// Which persistence implementation the process should construct.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres { url: String },
    Sqlite { path: PathBuf },
}

/// Postgres is only used in production, and only when a URL is configured.
/// Every other combination falls back to the embedded file store.
fn select_backend(
    environment: Environment,
    database_url: Option<&str>,
    sqlite_path: &str,
) -> StoreBackend {
    match (environment, database_url) {
        (Environment::Production, Some(url)) if !url.is_empty() => StoreBackend::Postgres {
            url: url.to_owned(),
        },
        _ => StoreBackend::Sqlite {
            path: PathBuf::from(sqlite_path),
        },
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct Config {
    pub environment: Environment,
    pub store: StoreBackend,
    /// Shared secret required on every write endpoint.
    pub api_key: String,
    pub db_max_connections: u32,
    /// Directory holding the prebuilt dashboard bundle.
    pub static_dir: PathBuf,
    pub server_host: String,
    pub server_port: u16,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("environment", &self.environment)
            .field("static_dir", &self.static_dir)
            .field("server_host", &self.server_host)
            .field("server_port", &self.server_port)
            .field("db_max_connections", &self.db_max_connections)
            .finish_non_exhaustive()
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let environment = match std::env::var("APP_ENV") {
            Ok(raw) => raw
                .trim()
                .parse()
                .context("APP_ENV must be one of production, development, test")?,
            Err(_) => Environment::default(),
        };
        let database_url = std::env::var("DATABASE_URL").ok();

        Ok(Self {
            environment,
            store: select_backend(
                environment,
                database_url.as_deref(),
                &optional("SQLITE_PATH", "./dev.sqlite3"),
            ),
            api_key: optional("SAFEDRIVE_API_KEY", DEFAULT_API_KEY),
            db_max_connections: optional("DB_MAX_CONNECTIONS", "5")
                .parse()
                .context("DB_MAX_CONNECTIONS must be a positive integer")?,
            static_dir: PathBuf::from(optional("STATIC_DIR", "../dashboard/build")),
            server_host: optional("SERVER_HOST", "0.0.0.0"),
            server_port: optional("SERVER_PORT", "8080")
                .parse()
                .context("SERVER_PORT must be a valid port number")?,
        })
    }

    /// Logs which of the expected environment variables are present.
    pub fn log_env_report() {
        for key in REPORTED_VARS {
            if std::env::var_os(key).is_some() {
                info!(var = key, "Environment variable is set");
            } else {
                error!(var = key, "Environment variable is not set");
            }
        }
    }
}

fn optional(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn environment_from_str_known_values() {
        assert_eq!(
            "production".parse::<Environment>().unwrap(),
            Environment::Production
        );
        assert_eq!(
            "development".parse::<Environment>().unwrap(),
            Environment::Development
        );
        assert_eq!("test".parse::<Environment>().unwrap(), Environment::Test);
    }

    #[test]
    fn environment_from_str_unknown_errors() {
        let err = "staging".parse::<Environment>().unwrap_err();
        assert!(err.to_string().contains("unknown environment"));
    }

    #[test]
    fn only_development_exposes_error_details() {
        assert!(Environment::Development.exposes_error_details());
        assert!(!Environment::Production.exposes_error_details());
        assert!(!Environment::Test.exposes_error_details());
    }

    #[test]
    fn production_with_url_selects_postgres() {
        let backend = select_backend(
            Environment::Production,
            Some("postgres://db/safedrive"),
            "./dev.sqlite3",
        );
        assert_eq!(
            backend,
            StoreBackend::Postgres {
                url: "postgres://db/safedrive".into()
            }
        );
    }

    #[test]
    fn production_without_url_selects_sqlite() {
        let backend = select_backend(Environment::Production, None, "./dev.sqlite3");
        assert_eq!(
            backend,
            StoreBackend::Sqlite {
                path: PathBuf::from("./dev.sqlite3")
            }
        );

        let backend = select_backend(Environment::Production, Some(""), "./dev.sqlite3");
        assert!(matches!(backend, StoreBackend::Sqlite { .. }));
    }

    #[test]
    fn development_ignores_database_url() {
        let backend = select_backend(
            Environment::Development,
            Some("postgres://db/safedrive"),
            "/tmp/local.sqlite3",
        );
        assert_eq!(
            backend,
            StoreBackend::Sqlite {
                path: PathBuf::from("/tmp/local.sqlite3")
            }
        );
    }
}
