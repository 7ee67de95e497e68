use std::path::PathBuf;

use thiserror::Error;

/// Errors of the configuration store and settings model
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed configuration in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid {name} port range {low}-{high}")]
    InvalidPortRange {
        name: &'static str,
        low: u16,
        high: u16,
    },

    #[error("invalid {name} DSCP value {value}, expected 0-63")]
    InvalidDscp { name: &'static str, value: u8 },

    #[error("invalid {name} bandwidth {value} kbps")]
    InvalidBandwidth { name: &'static str, value: i32 },

    #[error("{0} must not be empty")]
    Empty(&'static str),

    #[error("invalid {name}: {value}")]
    InvalidValue { name: &'static str, value: String },
}

/// Errors reported by engine backends
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    #[error("engine creation failed: {0}")]
    Creation(String),

    #[error("engine is not running")]
    NotRunning,

    #[error("unknown call {0}")]
    UnknownCall(String),

    #[error("{0} is not supported by this engine")]
    Unsupported(&'static str),

    #[error("engine operation failed: {0}")]
    OperationFailed(String),
}

/// Errors of the single instance channel
#[derive(Debug, Error)]
pub enum InstanceError {
    #[error("instance socket {path}: {source}")]
    Socket {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to forward command to the running instance: {0}")]
    Forward(#[source] std::io::Error),
}

/// Errors while preparing application directories
#[derive(Debug, Error)]
pub enum PathsError {
    #[error("no {0} directory available on this platform")]
    MissingDirectory(&'static str),

    #[error("failed to create {path}: {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to migrate {from} to {to}: {source}")]
    Migrate {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
