use thiserror::Error;

pub type Result<T> = std::result::Result<T, GatewayError>;

#[derive(Error, Debug)]
pub enum GatewayError {
    /// Malformed or partially specified trust material. Always fatal at
    /// startup, never recovered.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// An outbound channel could not be established at startup. Fatal;
    /// retry is left to deployment orchestration.
    #[error("failed to connect to {target}: {source}")]
    Connectivity {
        target: String,
        #[source]
        source: std::io::Error,
    },

    /// The edge listener could not bind its address.
    #[error("failed to bind listener on {address}: {source}")]
    ListenerBind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
