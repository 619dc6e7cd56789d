use thiserror::Error;

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Unique constraint violated: {0}")]
    Conflict(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Invalid stored record: {0}")]
    InvalidRecord(String),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

impl DatabaseError {
    /// Failures where the storage backend was unreachable or overloaded and
    /// the request never took effect.
    pub fn is_transient(&self) -> bool {
        match self {
            DatabaseError::Transport(e) => e.is_connect() || e.is_timeout(),
            DatabaseError::Api { status, .. } => matches!(status, 502..=504),
            DatabaseError::Unavailable(_) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(DatabaseError::Api { status: 503, body: String::new() }.is_transient());
        assert!(DatabaseError::Unavailable("down".to_string()).is_transient());
        assert!(!DatabaseError::Api { status: 400, body: String::new() }.is_transient());
        assert!(!DatabaseError::Conflict("dup".to_string()).is_transient());
    }
}
