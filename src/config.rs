use std::path::PathBuf;
use std::str::FromStr;

/// Process configuration, read once from `INNKEEP_*` environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub bind: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub password: String,
    pub max_connections: usize,
    /// WAL appends since the last compaction that trigger a new one.
    pub compact_threshold: u64,
    pub metrics_port: Option<u16>,
    pub tls: Option<TlsPaths>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsPaths {
    pub cert: PathBuf,
    pub key: PathBuf,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("both INNKEEP_TLS_CERT and INNKEEP_TLS_KEY must be set, or neither")]
    PartialTls,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Unparseable numbers fall back to the default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let tls = match (lookup("INNKEEP_TLS_CERT"), lookup("INNKEEP_TLS_KEY")) {
            (None, None) => None,
            (Some(cert), Some(key)) => Some(TlsPaths {
                cert: cert.into(),
                key: key.into(),
            }),
            _ => return Err(ConfigError::PartialTls),
        };

        Ok(Self {
            bind: lookup("INNKEEP_BIND").unwrap_or_else(|| "0.0.0.0".into()),
            port: parsed(&lookup, "INNKEEP_PORT").unwrap_or(5433),
            data_dir: lookup("INNKEEP_DATA_DIR").unwrap_or_else(|| "./data".into()).into(),
            password: lookup("INNKEEP_PASSWORD").unwrap_or_else(|| "innkeep".into()),
            max_connections: parsed(&lookup, "INNKEEP_MAX_CONNECTIONS").unwrap_or(256),
            compact_threshold: parsed(&lookup, "INNKEEP_COMPACT_THRESHOLD").unwrap_or(1000),
            metrics_port: parsed(&lookup, "INNKEEP_METRICS_PORT"),
            tls,
        })
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }

    pub fn wal_path(&self) -> PathBuf {
        self.data_dir.join("innkeep.wal")
    }
}

fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|s| s.trim().parse().ok())
}
