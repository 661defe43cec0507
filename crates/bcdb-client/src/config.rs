//! Client configuration.

use bcdb_core::ValidityWindow;
use serde::{Deserialize, Serialize};

/// Configuration for a [`Client`](crate::Client).
///
/// There is no `Default`: the header validity window must be chosen by the
/// caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// How long each signed header stays valid.
    pub validity: ValidityWindow,
    /// Reuse a signed header across calls until it expires.
    #[serde(default)]
    pub reuse_headers: bool,
    /// Peer id that should serve every call.
    #[serde(default)]
    pub route: Option<u64>,
}

impl ClientConfig {
    pub fn new(validity: ValidityWindow) -> Self {
        Self {
            validity,
            reuse_headers: false,
            route: None,
        }
    }

    pub fn reuse_headers(mut self, reuse: bool) -> Self {
        self.reuse_headers = reuse;
        self
    }

    pub fn route(mut self, peer: u64) -> Self {
        self.route = Some(peer);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validity_required() {
        assert!(serde_json::from_str::<ClientConfig>("{}").is_err());
        assert!(serde_json::from_str::<ClientConfig>(r#"{"validity": 0}"#).is_err());

        let config: ClientConfig = serde_json::from_str(r#"{"validity": 60}"#).unwrap();
        assert_eq!(config.validity.as_secs(), 60);
        assert!(!config.reuse_headers);
        assert_eq!(config.route, None);
    }

    #[test]
    fn test_builder() {
        let config = ClientConfig::new(ValidityWindow::from_secs(3).unwrap())
            .reuse_headers(true)
            .route(12);
        assert!(config.reuse_headers);
        assert_eq!(config.route, Some(12));
    }
}
