//! Image composition boundary.
//!
//! Rendering a scan payload into a 2-D barcode image is the job of an
//! external collaborator; the engine only supplies the payload string and
//! the descriptive text that may be printed alongside it. The payload is
//! the *only* ticket data that reaches the image; holder details never do,
//! so an intercepted image leaks nothing.

use thiserror::Error;

/// Descriptive fields a composer may print next to the barcode.
///
/// Display-only; none of this is scanned or used for authorization.
#[derive(Clone, Debug, Default)]
pub struct ImageCaption {
    /// The event the ticket admits to.
    pub event_ref: String,
    /// The ticket holder's display name.
    pub holder_name: String,
}

/// A rendered scan image.
#[derive(Clone, Debug)]
pub struct ComposedImage {
    /// Encoded image bytes.
    pub bytes: Vec<u8>,
    /// MIME type of `bytes` (e.g. `image/png`).
    pub content_type: String,
}

/// Errors from the composition collaborator.
#[derive(Error, Debug)]
pub enum ComposeError {
    /// The collaborator failed to render.
    #[error("image composition failed: {0}")]
    Failed(String),
}

/// External collaborator that renders a scan payload into an image.
pub trait ImageComposer: Send + Sync {
    /// Render `payload` (and optionally the caption) into an image.
    ///
    /// # Errors
    ///
    /// Returns [`ComposeError::Failed`] when rendering fails.
    fn compose(&self, payload: &str, caption: &ImageCaption)
    -> Result<ComposedImage, ComposeError>;
}
