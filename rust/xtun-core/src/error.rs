use thiserror::Error;

/// xTun session error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("Crypto init error: {message}")]
    CryptoInit { message: String },

    #[error("DNS init error: {message}")]
    DnsInit {
        message: String,
        path: Option<String>,
    },

    #[error("Engine config error: {message}")]
    EngineConfig { message: String },

    #[error("Engine start error: {message}")]
    EngineStart { message: String },

    #[error("Socket protect capability unavailable: {message}")]
    CapabilityUnavailable { message: String, fd: Option<i32> },

    #[error("Invalid session state: {message}")]
    InvalidState { message: String },

    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a new crypto init error
    pub fn crypto_init<S: Into<String>>(message: S) -> Self {
        Self::CryptoInit {
            message: message.into(),
        }
    }

    /// Create a new DNS init error
    pub fn dns_init<S: Into<String>>(message: S) -> Self {
        Self::DnsInit {
            message: message.into(),
            path: None,
        }
    }

    /// Create a new DNS init error naming the domain table that failed to load
    pub fn dns_init_with_path<S: Into<String>, P: Into<String>>(message: S, path: P) -> Self {
        Self::DnsInit {
            message: message.into(),
            path: Some(path.into()),
        }
    }

    pub fn engine_config<S: Into<String>>(message: S) -> Self {
        Self::EngineConfig {
            message: message.into(),
        }
    }

    pub fn engine_start<S: Into<String>>(message: S) -> Self {
        Self::EngineStart {
            message: message.into(),
        }
    }

    /// Create a capability error for a specific socket
    pub fn capability_unavailable<S: Into<String>>(message: S, fd: i32) -> Self {
        Self::CapabilityUnavailable {
            message: message.into(),
            fd: Some(fd),
        }
    }

    pub fn invalid_state<S: Into<String>>(message: S) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    /// Create a new configuration error with source
    pub fn config_with_source<S: Into<String>, E: std::error::Error + Send + Sync + 'static>(
        message: S,
        source: E,
    ) -> Self {
        Self::Config {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Get error code/category for external use
    pub fn code(&self) -> &'static str {
        match self {
            Self::CryptoInit { .. } => "CRYPTO_INIT",
            Self::DnsInit { .. } => "DNS_INIT",
            Self::EngineConfig { .. } => "ENGINE_CONFIG",
            Self::EngineStart { .. } => "ENGINE_START",
            Self::CapabilityUnavailable { .. } => "CAPABILITY_UNAVAILABLE",
            Self::InvalidState { .. } => "INVALID_STATE",
            Self::Config { .. } => "CONFIG",
            Self::Io(_) => "IO",
        }
    }
}
