//! Error types shared by the reading source, the report generation and the startup code.
use thiserror::Error;

/// Failure to obtain readings from the backing database.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("TLS enabled but no TLS parameters specified")]
    MissingTlsParameters,
    #[error("could not set up TLS: {0}")]
    Tls(#[from] openssl::error::ErrorStack),
    #[error("could not establish database connection: {0}")]
    Connect(#[source] postgres::Error),
    #[error("could not query readings: {0}")]
    Query(#[source] postgres::Error),
}

/// Failure while serializing a report into a spreadsheet document.
#[derive(Debug, Error)]
#[error("could not generate spreadsheet: {0}")]
pub struct GenerationError(#[from] pub rust_xlsxwriter::XlsxError);

/// Failure that stops the http server thread.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("could not open http server on '{address}': {source}")]
    Bind {
        address: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },
    #[error("server cannot receive requests: {0}")]
    Receive(#[source] std::io::Error),
}

/// Failure to load the daemon configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read the configuration file '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot deserialize the configuration: {0}")]
    Parse(#[from] serde_yaml::Error),
}
