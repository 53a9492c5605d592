//! Secret backend implementations
//!
//! This module provides the backend abstraction and the Thycotic/Delinea
//! Secret Server client.

mod authorizer;
mod secret_backend;
mod thycotic;

pub use authorizer::Authorizer;
pub use secret_backend::{Secret, SecretBackend, SecretField, SecretLocator};
pub use thycotic::ThycoticClient;

/// Type alias for backend trait object
pub type Backend = Box<dyn SecretBackend>;

/// Best human-readable message from a failed backend response
pub(crate) async fn backend_error_message(response: reqwest::Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();

    serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|json| {
            json.get("message")
                .or_else(|| json.get("errorCode"))
                .and_then(|m| m.as_str())
                .map(String::from)
        })
        .or_else(|| {
            let body = body.trim();
            (!body.is_empty()).then(|| body.to_string())
        })
        .unwrap_or_else(|| format!("request failed with status {}", status))
}
