use thiserror::Error;

use hap_core::ConnectionError;

/// Top-level server error.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The supplied `ServerRuntimeConfig` could not be used, e.g. an
    /// unparsable bind address.
    #[error("configuration error: {0}")]
    Config(String),

    /// Binding or accepting on the listening socket failed.
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// A connection's protocol engine reported an error.
    #[error("protocol error: {0}")]
    Protocol(#[from] ConnectionError),

    /// An internal invariant was violated.
    #[error("internal error: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn displays_config_error() {
        let error = ServerError::Config("bad bind address".to_string());
        assert_eq!(error.to_string(), "configuration error: bad bind address");
    }
}
