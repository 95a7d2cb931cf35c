//! services/juris/src/error.rs
//!
//! Defines the primary error type for the `juris` service.

use crate::config::ConfigError;
use juris_core::ports::PortError;

/// The primary error type for the `juris` service.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from one of the core service ports.
    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),

    /// Represents an error from the slot database.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    /// Represents an error from the HTTP client.
    #[error("HTTP Error: {0}")]
    Http(#[from] reqwest::Error),

    /// Represents a malformed JSON input file.
    #[error("JSON Error: {0}")]
    Json(#[from] serde_json::Error),

    /// Represents a standard Input/Output error (e.g., reading a case file).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

impl AppError {
    /// A message suitable for showing to the end user.
    pub fn user_message(&self) -> String {
        match self {
            AppError::Port(PortError::MissingCredential) => {
                "A chave da API de IA não está configurada. Defina GEMINI_API_KEY e tente novamente."
                    .to_string()
            }
            AppError::Port(PortError::RateLimited(_)) => {
                "O serviço de IA está sobrecarregado. Aguarde alguns instantes e tente novamente."
                    .to_string()
            }
            AppError::Port(PortError::Validation(message)) => message.clone(),
            AppError::Port(PortError::Unauthorized(message)) => message.clone(),
            _ => "Não foi possível concluir a operação. Tente novamente.".to_string(),
        }
    }
}
