//! Error types shared by the dispatch engine and its collaborators.

use thiserror::Error;

/// Failure reported by a storage, distance or zone-detection collaborator.
///
/// The engine never retries; the error reaches the caller unchanged.
#[derive(Debug, Error)]
#[error(transparent)]
pub struct CollaboratorError(Box<dyn std::error::Error + Send + Sync>);

impl CollaboratorError {
    pub fn new(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self(Box::new(err))
    }

    /// Builds an error from a plain message.
    pub fn msg(message: impl Into<String>) -> Self {
        Self(message.into().into())
    }

    pub fn into_inner(self) -> Box<dyn std::error::Error + Send + Sync> {
        self.0
    }
}

impl From<reqwest::Error> for CollaboratorError {
    fn from(err: reqwest::Error) -> Self {
        Self::new(err)
    }
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("unknown sequencing algorithm `{0}`")]
    UnknownAlgorithm(String),
    #[error("unknown optimization strategy `{0}`")]
    UnknownStrategy(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),
}

pub type DispatchResult<T> = Result<T, DispatchError>;
