use thiserror::Error;

#[derive(Error, Debug)]
pub enum FaceLinkError {
    #[error("Camera error: {0}")]
    Camera(String),

    #[error("Model error: {0}")]
    Model(String),

    #[error("Config error: {0}")]
    Config(String),

    /// Transport or service failure talking to the biometric index. Retryable.
    #[error("Biometric index unavailable: {0}")]
    IndexUnavailable(String),

    /// Transport or service failure talking to the record store. Retryable.
    #[error("Record store unavailable: {0}")]
    StoreUnavailable(String),

    /// The index refused the image (no usable face, unreadable data).
    #[error("Index rejected image: {0}")]
    Index(String),

    #[error("Reconciliation failed for face {face_id}: {reason}")]
    ReconciliationFailure { face_id: String, reason: String },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// The membership service could not be reached, timed out or answered 5xx.
    #[error("Membership service unavailable: {0}")]
    MembershipUnavailable(String),

    /// The membership service rejected the request or sent an unusable reply.
    #[error("Membership API error: {0}")]
    Membership(String),

    #[error("Blob store error: {0}")]
    Blob(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("ORT error: {0}")]
    Ort(#[from] ort::OrtError),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl FaceLinkError {
    /// Whether a caller may retry the same operation unchanged.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            FaceLinkError::IndexUnavailable(_)
                | FaceLinkError::StoreUnavailable(_)
                | FaceLinkError::MembershipUnavailable(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, FaceLinkError>;
