//! The unified error handling system for the application.

pub use provider::{DEFAULT_RETRY_AFTER_SECONDS, ErrorKind, ProviderError};
pub use types::ProxyError;

/// A unified `Result` type for the entire application.
pub type Result<T> = std::result::Result<T, ProxyError>;

/// Result type of every provider-facing operation.
pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

pub mod provider;
pub mod types;

/// Context trait for adding context to errors.
pub trait Context<T> {
    #[track_caller]
    fn context<C>(self, context: C) -> Result<T>
    where
        C: std::fmt::Display;
}

impl<T, E> Context<T> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    #[track_caller]
    fn context<C>(self, context: C) -> Result<T>
    where
        C: std::fmt::Display,
    {
        self.map_err(|error| ProxyError::internal_with_source(context.to_string(), error))
    }
}

#[cfg(test)]
mod tests;
