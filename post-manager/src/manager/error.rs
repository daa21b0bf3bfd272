/*!
Error type shared by the post manager components
*/

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("state storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Api(#[from] posts_api::ApiError),

    #[error("output {name} failed: {reason}")]
    Output { name: &'static str, reason: String },
}
