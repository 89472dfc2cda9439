//! Error types for the inference pipelines.
//!
//! This module defines the error types that can occur while adapting inputs
//! for the inference engine and while post-processing its outputs, including
//! input validation errors, configuration errors, and engine-contract
//! violations. It also provides utility functions for creating these errors
//! with appropriate context.

use thiserror::Error;

/// Enum representing different stages of processing in a pipeline.
///
/// This enum is used to identify which stage of a pipeline an error occurred in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProcessingStage {
    /// Error occurred during input preprocessing.
    Preprocessing,
    /// Error occurred while decoding raw detection output.
    Decode,
    /// Error occurred during non-maximum suppression.
    Nms,
    /// Error occurred while scoring classification output.
    Scoring,
    /// Error occurred during batch splitting or joining.
    BatchProcessing,
    /// Generic processing error.
    Generic,
}

impl std::fmt::Display for ProcessingStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProcessingStage::Preprocessing => write!(f, "preprocessing"),
            ProcessingStage::Decode => write!(f, "decode"),
            ProcessingStage::Nms => write!(f, "non-maximum suppression"),
            ProcessingStage::Scoring => write!(f, "scoring"),
            ProcessingStage::BatchProcessing => write!(f, "batch processing"),
            ProcessingStage::Generic => write!(f, "processing"),
        }
    }
}

/// Enum representing the errors that can occur in the pipeline adapters.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Error occurred during a processing stage.
    #[error("{kind} failed: {context}")]
    Processing {
        /// The stage of processing where the error occurred.
        kind: ProcessingStage,
        /// Additional context about the error.
        context: String,
        /// The underlying error that caused this error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Error reported by the external inference engine.
    #[error("inference")]
    Inference(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Error indicating invalid user input.
    #[error("invalid input: {message}")]
    InvalidInput {
        /// A message describing the invalid input.
        message: String,
    },

    /// Error indicating a configuration problem.
    #[error("configuration: {message}")]
    ConfigError {
        /// A message describing the configuration error.
        message: String,
    },

    /// Error indicating the engine returned a tensor whose shape violates
    /// the pipeline contract. Shape mismatches are never silently reshaped.
    #[error("unexpected engine output shape: expected {expected}, got {actual}")]
    UnexpectedOutputShape {
        /// The shape the pipeline expected.
        expected: String,
        /// The shape actually returned by the engine.
        actual: String,
    },

    /// Error from tensor operations.
    #[error("tensor operation")]
    Tensor(#[from] ndarray::ShapeError),

    /// IO error.
    #[error("io")]
    Io(#[from] std::io::Error),
}

/// A convenient result alias for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

impl PipelineError {
    /// Creates a PipelineError for a processing stage.
    ///
    /// # Arguments
    ///
    /// * `kind` - The stage of processing where the error occurred.
    /// * `context` - Additional context about the error.
    /// * `error` - The underlying error that caused this error.
    ///
    /// # Returns
    ///
    /// A PipelineError instance.
    pub fn processing_error(
        kind: ProcessingStage,
        context: &str,
        error: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Processing {
            kind,
            context: context.to_string(),
            source: Box::new(error),
        }
    }

    /// Creates a PipelineError for inference engine failures.
    pub fn inference_error(error: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Inference(Box::new(error))
    }

    /// Creates a PipelineError for invalid input.
    ///
    /// # Arguments
    ///
    /// * `message` - A message describing the invalid input.
    ///
    /// # Returns
    ///
    /// A PipelineError instance.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Creates a PipelineError for configuration errors.
    ///
    /// # Arguments
    ///
    /// * `message` - A message describing the configuration error.
    ///
    /// # Returns
    ///
    /// A PipelineError instance.
    pub fn config_error(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    /// Creates a PipelineError for configuration errors with context.
    ///
    /// # Arguments
    ///
    /// * `field` - The field where the error occurred.
    /// * `value` - The value of the field.
    /// * `reason` - The reason for the error.
    ///
    /// # Returns
    ///
    /// A PipelineError instance.
    pub fn config_error_with_context(field: &str, value: &str, reason: &str) -> Self {
        Self::ConfigError {
            message: format!(
                "Configuration error in field '{}' with value '{}': {}",
                field, value, reason
            ),
        }
    }

    /// Creates a PipelineError for an engine output tensor with the wrong shape.
    ///
    /// # Arguments
    ///
    /// * `expected` - A description of the expected shape.
    /// * `actual` - A description of the actual shape.
    ///
    /// # Returns
    ///
    /// A PipelineError instance.
    pub fn unexpected_output_shape(
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self::UnexpectedOutputShape {
            expected: expected.into(),
            actual: actual.into(),
        }
    }
}

/// Implementation of From<serde_json::Error> for PipelineError.
///
/// Class-name maps are loaded from JSON files, so deserialization failures
/// surface as configuration errors.
impl From<serde_json::Error> for PipelineError {
    fn from(error: serde_json::Error) -> Self {
        Self::ConfigError {
            message: error.to_string(),
        }
    }
}
