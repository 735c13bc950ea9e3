/// Error taxonomy for the alert pipeline.
///
/// Variants map to the outcomes callers are expected to branch on:
/// `PermissionDenied` and `UnsupportedDevice` are terminal for the session,
/// `NotRegistered` is a benign no-op, and `Transient`/`Storage` are the
/// recoverable failures the repository and manager layers swallow into
/// empty/absent results.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Notification permission denied")]
    PermissionDenied,

    #[error("Push notifications require a physical device")]
    UnsupportedDevice,

    #[error("No device registration exists")]
    NotRegistered,

    #[error("Transient failure: {0}")]
    Transient(String),

    #[error("Local storage error: {0}")]
    Storage(String),

    #[error("Malformed notification event: {0}")]
    MalformedEvent(String),
}

impl AppError {
    /// Terminal errors end the current session's push flow: the caller must
    /// not retry without explicit user action (e.g. a settings surface).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AppError::PermissionDenied | AppError::UnsupportedDevice
        )
    }

    /// Benign outcomes mean "nothing to undo" and should not be surfaced
    /// loudly to the user.
    pub fn is_benign(&self) -> bool {
        matches!(self, AppError::NotRegistered)
    }
}

pub type AppResult<T> = Result<T, AppError>;
