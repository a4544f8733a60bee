use thiserror::Error;

#[derive(Debug, Error)]
pub enum DefierError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("http error: {0}")]
    Http(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("provider error: {0}")]
    Provider(String),
    #[error("validation error: {0}")]
    Validation(String),
    #[error("request rejected in wallet: {0}")]
    SignerRejected(String),
    #[error("runtime error: {0}")]
    Runtime(String),
}

impl DefierError {
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}

pub use crate::Result;
