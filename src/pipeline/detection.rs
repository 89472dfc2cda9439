//! YOLO-style object detection pipeline adapter.
//!
//! The adapter shapes images into engine input tensors, and routes raw
//! engine output through decode (when the model graph lacks an embedded
//! decoding layer) and non-maximum suppression into per-image detection
//! sets with human-readable labels.

use crate::core::engine::{EngineInput, InferenceEngine};
use crate::core::errors::{PipelineError, PipelineResult};
use crate::core::tensor::TensorD;
use crate::processors::decode::PreNmsDecoder;
use crate::processors::nms::{Detection, NonMaxSuppression, SuppressionScope, Thresholds};
use image::RgbImage;
use ndarray::{Array4, Ix3};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

/// Configuration for the detection pipeline, validated once at construction.
///
/// The mutable per-engine caches of typical runtime wrappers (image size,
/// quantization flag) are plain immutable fields here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Model input size as (width, height).
    pub image_size: (u32, u32),
    /// True when the model consumes raw `u8` image data.
    #[serde(default)]
    pub quantized: bool,
    /// True when the model graph embeds its own decoding layer. Determined
    /// externally by inspecting the graph once.
    #[serde(default)]
    pub embedded_postprocessing: bool,
    /// Optional map from stringified class id to class name. Absent ids are
    /// rendered as bare numbers.
    #[serde(default)]
    pub class_names: Option<HashMap<String, String>>,
    /// Suppression scope for NMS.
    #[serde(default)]
    pub suppression_scope: SuppressionScope,
}

impl DetectionConfig {
    /// Creates a configuration with the given model input size and defaults
    /// for everything else.
    pub fn new(image_size: (u32, u32)) -> Self {
        Self {
            image_size,
            quantized: false,
            embedded_postprocessing: false,
            class_names: None,
            suppression_scope: SuppressionScope::default(),
        }
    }

    /// Uses the built-in COCO class-name table.
    pub fn with_coco_class_names(mut self) -> Self {
        self.class_names = Some(super::classes::coco_class_names());
        self
    }

    /// Uses an explicit class-name map.
    pub fn with_class_names(mut self, class_names: HashMap<String, String>) -> Self {
        self.class_names = Some(class_names);
        self
    }

    /// Loads the class-name map from a JSON file of stringified class ids to
    /// names.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the JSON file.
    ///
    /// # Returns
    ///
    /// The updated configuration, or a configuration error if the file
    /// cannot be read or parsed.
    pub fn with_class_names_from_file(mut self, path: impl AsRef<Path>) -> PipelineResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        self.class_names = Some(serde_json::from_str(&contents)?);
        Ok(self)
    }

    /// Marks the model as quantized.
    pub fn quantized(mut self, quantized: bool) -> Self {
        self.quantized = quantized;
        self
    }

    /// Marks the model graph as embedding its own decoding layer.
    pub fn embedded_postprocessing(mut self, embedded: bool) -> Self {
        self.embedded_postprocessing = embedded;
        self
    }

    /// Sets the NMS suppression scope.
    pub fn suppression_scope(mut self, scope: SuppressionScope) -> Self {
        self.suppression_scope = scope;
        self
    }

    /// Validates the configuration.
    pub fn validate(&self) -> PipelineResult<()> {
        let (w, h) = self.image_size;
        if w == 0 || h == 0 {
            return Err(PipelineError::config_error_with_context(
                "image_size",
                &format!("({w}, {h})"),
                "both dimensions must be greater than 0",
            ));
        }
        Ok(())
    }
}

/// How raw engine output becomes decoded candidates, resolved once at
/// construction.
#[derive(Debug, Clone)]
enum DecodePath {
    /// The graph already decodes; the first engine output holds the
    /// candidate rows directly.
    Embedded,
    /// The graph emits raw per-anchor rows that need manual decoding.
    Manual(PreNmsDecoder),
}

/// One image's surviving detections after suppression, in
/// confidence-descending order.
#[derive(Debug, Clone, Serialize)]
pub struct ImageDetections {
    /// Bounding boxes in corner format.
    pub boxes: Vec<[f32; 4]>,
    /// Confidence per box.
    pub scores: Vec<f32>,
    /// Class id per box.
    pub class_ids: Vec<usize>,
    /// Class label per box; the stringified id when no name is mapped.
    pub labels: Vec<String>,
}

/// The YOLO detection pipeline adapter.
#[derive(Debug, Clone)]
pub struct YoloPipeline {
    config: DetectionConfig,
    decode: DecodePath,
    nms: NonMaxSuppression,
}

impl YoloPipeline {
    /// Creates a pipeline from the given configuration.
    ///
    /// # Arguments
    ///
    /// * `config` - The detection configuration.
    ///
    /// # Returns
    ///
    /// A new pipeline, or a configuration error.
    pub fn new(config: DetectionConfig) -> PipelineResult<Self> {
        config.validate()?;
        let decode = if config.embedded_postprocessing {
            DecodePath::Embedded
        } else {
            DecodePath::Manual(PreNmsDecoder::new())
        };
        debug!(
            embedded = config.embedded_postprocessing,
            quantized = config.quantized,
            "resolved detection decode path"
        );
        let nms = NonMaxSuppression::new(config.suppression_scope);
        Ok(Self {
            config,
            decode,
            nms,
        })
    }

    /// Returns the pipeline configuration.
    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    /// Shapes images into one engine input tensor.
    ///
    /// Images are resized to the model input size and transposed to NCHW.
    /// Float models receive values scaled by 1/255; quantized models receive
    /// the raw `u8` data.
    ///
    /// # Arguments
    ///
    /// * `images` - The RGB images to run detection on.
    ///
    /// # Returns
    ///
    /// The batched engine input.
    pub fn preprocess(&self, images: &[RgbImage]) -> PipelineResult<EngineInput> {
        if images.is_empty() {
            return Err(PipelineError::invalid_input(
                "detection requires at least one image",
            ));
        }
        let (width, height) = self.config.image_size;
        let (w, h) = (width as usize, height as usize);

        if self.config.quantized {
            let mut batch = Array4::<u8>::zeros((images.len(), 3, h, w));
            for (index, image) in images.iter().enumerate() {
                let resized = image::imageops::resize(
                    image,
                    width,
                    height,
                    image::imageops::FilterType::Triangle,
                );
                for (x, y, pixel) in resized.enumerate_pixels() {
                    for channel in 0..3 {
                        batch[[index, channel, y as usize, x as usize]] = pixel.0[channel];
                    }
                }
            }
            Ok(EngineInput::Uint8(batch.into_dyn()))
        } else {
            let mut batch = Array4::<f32>::zeros((images.len(), 3, h, w));
            for (index, image) in images.iter().enumerate() {
                let resized = image::imageops::resize(
                    image,
                    width,
                    height,
                    image::imageops::FilterType::Triangle,
                );
                for (x, y, pixel) in resized.enumerate_pixels() {
                    for channel in 0..3 {
                        batch[[index, channel, y as usize, x as usize]] =
                            pixel.0[channel] as f32 / 255.0;
                    }
                }
            }
            Ok(EngineInput::Float(batch.into_dyn()))
        }
    }

    /// Post-processes raw engine output into per-image detection sets.
    ///
    /// # Arguments
    ///
    /// * `engine_outputs` - The output tensors from the engine forward pass.
    /// * `thresholds` - Confidence and IoU thresholds for this request.
    ///
    /// # Returns
    ///
    /// Per-image detections in confidence-descending order.
    pub fn process_outputs(
        &self,
        engine_outputs: &[TensorD],
        thresholds: &Thresholds,
    ) -> PipelineResult<Vec<ImageDetections>> {
        thresholds.validate()?;
        let first = engine_outputs.first().ok_or_else(|| {
            PipelineError::unexpected_output_shape(
                "at least one output tensor",
                "an empty output list",
            )
        })?;
        let batch = first
            .view()
            .into_dimensionality::<Ix3>()
            .map_err(|_| {
                PipelineError::unexpected_output_shape(
                    "(batch, num_candidates, row_width)",
                    format!("{:?}", first.shape()),
                )
            })?;

        let per_image: Vec<Vec<Detection>> = match &self.decode {
            DecodePath::Embedded => self.nms.apply(batch, thresholds)?,
            DecodePath::Manual(decoder) => {
                let decoded = decoder.decode_batch(batch)?;
                decoded
                    .into_iter()
                    .map(|candidates| self.nms.suppress(candidates, thresholds))
                    .collect()
            }
        };

        Ok(per_image
            .into_iter()
            .map(|detections| self.assemble(detections))
            .collect())
    }

    /// Runs the full pipeline: preprocess, engine forward pass, postprocess.
    ///
    /// # Arguments
    ///
    /// * `engine` - The inference engine to run.
    /// * `images` - The RGB images to run detection on.
    /// * `thresholds` - Confidence and IoU thresholds for this request.
    ///
    /// # Returns
    ///
    /// Per-image detections in confidence-descending order.
    pub fn detect<E: InferenceEngine>(
        &self,
        engine: &E,
        images: &[RgbImage],
        thresholds: &Thresholds,
    ) -> PipelineResult<Vec<ImageDetections>> {
        let input = self.preprocess(images)?;
        let outputs = engine.run(vec![input])?;
        self.process_outputs(&outputs, thresholds)
    }

    /// Assembles one image's surviving detections into the output schema.
    fn assemble(&self, detections: Vec<Detection>) -> ImageDetections {
        let mut boxes = Vec::with_capacity(detections.len());
        let mut scores = Vec::with_capacity(detections.len());
        let mut class_ids = Vec::with_capacity(detections.len());
        let mut labels = Vec::with_capacity(detections.len());
        for detection in detections {
            boxes.push(detection.rect.to_array());
            scores.push(detection.confidence);
            labels.push(self.class_label(detection.class_id));
            class_ids.push(detection.class_id);
        }
        ImageDetections {
            boxes,
            scores,
            class_ids,
            labels,
        }
    }

    /// Maps a class id to its label, falling back to the bare number.
    fn class_label(&self, class_id: usize) -> String {
        match &self.config.class_names {
            Some(names) => names
                .get(&class_id.to_string())
                .cloned()
                .unwrap_or_else(|| class_id.to_string()),
            None => class_id.to_string(),
        }
    }
}
