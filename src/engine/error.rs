use thiserror::Error;

/// Errors surfaced by [`super::OptimizationEngine::run`].
///
/// Hardware faults during a run are deliberately absent here: a failed
/// write or acquisition costs that individual its evaluation and the run
/// moves on, so they never propagate out of the run loop.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine configuration failed validation.
    #[error("invalid engine configuration: {0}")]
    Config(String),

    /// An artifact file could not be created or written.
    #[error("artifact i/o failed: {0}")]
    Io(#[from] std::io::Error),

    /// A best-result image could not be encoded.
    #[error("image encoding failed: {0}")]
    Image(#[from] image::ImageError),
}
