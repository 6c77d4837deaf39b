use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PushError {
    #[error("push service unavailable: {0}")]
    Unavailable(String),

    #[error("device token rejected: {0}")]
    InvalidToken(String),
}

/// Push delivery collaborator. Optional: without one, device tokens are
/// still recorded and notifications only show up in the in-app list.
#[async_trait]
pub trait PushNotifier: Send + Sync {
    /// Whether the device may receive pushes (authorized or provisional).
    async fn request_permission(&self, device_token: &str) -> Result<bool, PushError>;

    async fn register_token(&self, uid: &str, device_token: &str) -> Result<(), PushError>;
}
