//! Zero-shot text classification pipeline adapter for MNLI-style models.
//!
//! Each sequence is paired with one hypothesis per candidate label, so the
//! engine runs num_sequences * num_labels forward passes. The adapter builds
//! those (premise, hypothesis) pairs for the external tokenizer and engine,
//! then scores the returned entailment logits and ranks labels per sequence.

use crate::core::errors::{PipelineError, PipelineResult};
use crate::core::schema::{Joinable, Splittable};
use crate::core::tensor::{Tensor3D, TensorD};
use crate::processors::zero_shot::EntailmentScorer;
use ndarray::Ix3;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

/// The default hypothesis template.
pub const DEFAULT_HYPOTHESIS_TEMPLATE: &str = "This text is about {}";

/// Configuration for the zero-shot pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ZeroShotConfig {
    /// A formattable template wrapping each candidate label into an MNLI
    /// hypothesis sentence. Must contain a `{}` substitution slot.
    pub hypothesis_template: String,
    /// Index of the entailment logit in the model output.
    pub entailment_index: usize,
    /// Index of the contradiction logit in the model output.
    pub contradiction_index: usize,
    /// True if class probabilities are independent.
    pub multi_class: bool,
}

impl Default for ZeroShotConfig {
    fn default() -> Self {
        Self {
            hypothesis_template: DEFAULT_HYPOTHESIS_TEMPLATE.to_string(),
            entailment_index: 0,
            contradiction_index: 2,
            multi_class: false,
        }
    }
}

impl ZeroShotConfig {
    /// Validates the configuration.
    pub fn validate(&self) -> PipelineResult<()> {
        if !template_has_slot(&self.hypothesis_template) {
            return Err(PipelineError::config_error_with_context(
                "hypothesis_template",
                &self.hypothesis_template,
                "must include a {} slot where the label goes",
            ));
        }
        if self.entailment_index == self.contradiction_index {
            return Err(PipelineError::config_error(format!(
                "entailment_index and contradiction_index must differ, both are {}",
                self.entailment_index
            )));
        }
        Ok(())
    }
}

/// Candidate labels as accepted on the wire: either a single
/// comma-separated string or a list of labels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LabelSet {
    /// A comma-separated label string.
    Text(String),
    /// An explicit label list.
    List(Vec<String>),
}

impl LabelSet {
    /// Parses into a trimmed, non-empty, duplicate-free label list.
    ///
    /// # Returns
    ///
    /// The label list, or a validation error when no usable labels remain
    /// or a label appears twice.
    pub fn parse(&self) -> PipelineResult<Vec<String>> {
        let labels: Vec<String> = match self {
            LabelSet::Text(text) => text
                .split(',')
                .map(str::trim)
                .filter(|label| !label.is_empty())
                .map(String::from)
                .collect(),
            LabelSet::List(list) => list
                .iter()
                .map(|label| label.trim())
                .filter(|label| !label.is_empty())
                .map(String::from)
                .collect(),
        };
        if labels.is_empty() {
            return Err(PipelineError::invalid_input(
                "candidate labels must contain at least one non-empty label",
            ));
        }
        let mut seen = HashSet::new();
        for label in &labels {
            if !seen.insert(label.as_str()) {
                return Err(PipelineError::invalid_input(format!(
                    "candidate label '{}' appears more than once",
                    label
                )));
            }
        }
        Ok(labels)
    }
}

/// Input schema for the zero-shot pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZeroShotInput {
    /// The sequences to classify.
    pub sequences: Vec<String>,
    /// Dynamic candidate labels. Must be absent when the pipeline holds
    /// static labels.
    #[serde(default)]
    pub labels: Option<LabelSet>,
    /// Per-request override of the configured hypothesis template.
    #[serde(default)]
    pub hypothesis_template: Option<String>,
    /// Per-request override of the configured multi_class flag.
    #[serde(default)]
    pub multi_class: Option<bool>,
}

impl ZeroShotInput {
    /// Creates an input from sequences and dynamic labels.
    pub fn new(sequences: Vec<String>, labels: LabelSet) -> Self {
        Self {
            sequences,
            labels: Some(labels),
            hypothesis_template: None,
            multi_class: None,
        }
    }

    /// Creates an input with sequences only, for pipelines holding static
    /// labels.
    pub fn from_sequences(sequences: Vec<String>) -> Self {
        Self {
            sequences,
            labels: None,
            hypothesis_template: None,
            multi_class: None,
        }
    }
}

impl Splittable for ZeroShotInput {
    /// Splits into one input per (sequence, label) pair, each of batch
    /// size 1.
    fn split(self) -> PipelineResult<Vec<Self>> {
        let labels = self
            .labels
            .as_ref()
            .ok_or_else(|| {
                PipelineError::invalid_input(
                    "splitting requires dynamic labels on the input",
                )
            })?
            .parse()?;
        let mut parts = Vec::with_capacity(self.sequences.len() * labels.len());
        for sequence in &self.sequences {
            for label in &labels {
                parts.push(ZeroShotInput {
                    sequences: vec![sequence.clone()],
                    labels: Some(LabelSet::List(vec![label.clone()])),
                    hypothesis_template: self.hypothesis_template.clone(),
                    multi_class: self.multi_class,
                });
            }
        }
        Ok(parts)
    }
}

impl Joinable for ZeroShotInput {
    /// Joins batch-size-1 parts produced by [`Splittable::split`] back into
    /// one batched input, restoring the original sequence ordering and label
    /// set.
    fn join(parts: Vec<Self>) -> PipelineResult<Self> {
        if parts.is_empty() {
            return Err(PipelineError::invalid_input("cannot join zero inputs"));
        }

        let mut flat = Vec::with_capacity(parts.len());
        let hypothesis_template = parts[0].hypothesis_template.clone();
        let multi_class = parts[0].multi_class;
        for part in &parts {
            if part.sequences.len() != 1 {
                return Err(PipelineError::invalid_input(
                    "join expects batch-size-1 parts with exactly one sequence each",
                ));
            }
            let labels = part
                .labels
                .as_ref()
                .ok_or_else(|| {
                    PipelineError::invalid_input("join expects parts carrying dynamic labels")
                })?
                .parse()?;
            if labels.len() != 1 {
                return Err(PipelineError::invalid_input(
                    "join expects batch-size-1 parts with exactly one label each",
                ));
            }
            if part.hypothesis_template != hypothesis_template
                || part.multi_class != multi_class
            {
                return Err(PipelineError::invalid_input(
                    "join expects parts sharing the same template and multi_class overrides",
                ));
            }
            flat.push((part.sequences[0].clone(), labels.into_iter().next().unwrap_or_default()));
        }

        // The label cycle length is where the first label repeats; parts
        // are sequence-major, so every block of that length shares one
        // sequence.
        let cycle = flat
            .iter()
            .skip(1)
            .position(|(_, label)| *label == flat[0].1)
            .map(|index| index + 1)
            .unwrap_or(flat.len());
        if flat.len() % cycle != 0 {
            return Err(PipelineError::invalid_input(format!(
                "cannot join {} parts into cycles of {} labels",
                flat.len(),
                cycle
            )));
        }
        let labels: Vec<String> = flat[..cycle].iter().map(|(_, label)| label.clone()).collect();

        let mut sequences = Vec::with_capacity(flat.len() / cycle);
        for block in flat.chunks(cycle) {
            let sequence = &block[0].0;
            for (index, (part_sequence, label)) in block.iter().enumerate() {
                if part_sequence != sequence || *label != labels[index] {
                    return Err(PipelineError::invalid_input(
                        "parts are not a sequence-major split over one label set",
                    ));
                }
            }
            sequences.push(sequence.clone());
        }

        Ok(ZeroShotInput {
            sequences,
            labels: Some(LabelSet::List(labels)),
            hypothesis_template,
            multi_class,
        })
    }
}

/// One (premise, hypothesis) pair to tokenize and run through the engine.
pub type SequencePair = [String; 2];

/// Values carried from input processing to output processing.
#[derive(Debug, Clone)]
pub struct ScoringContext {
    /// The original sequences, in request order.
    pub sequences: Vec<String>,
    /// The resolved candidate labels, in request order.
    pub candidate_labels: Vec<String>,
    /// The resolved multi_class flag.
    pub multi_class: bool,
}

/// Output schema: per-sequence labels sorted by descending score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZeroShotOutput {
    /// The original sequences.
    pub sequences: Vec<String>,
    /// Per-sequence labels, sorted by descending score.
    pub labels: Vec<Vec<String>>,
    /// Per-sequence scores matching `labels`.
    pub scores: Vec<Vec<f32>>,
}

/// The zero-shot classification pipeline adapter.
#[derive(Debug, Clone)]
pub struct ZeroShotPipeline {
    config: ZeroShotConfig,
    scorer: EntailmentScorer,
    static_labels: Option<Vec<String>>,
    batch_size: Option<usize>,
}

impl ZeroShotPipeline {
    /// Creates a pipeline.
    ///
    /// A static batch size is only meaningful together with static labels,
    /// and must then be divisible by the label count so each engine batch
    /// holds whole sequences.
    ///
    /// # Arguments
    ///
    /// * `config` - The pipeline configuration.
    /// * `static_labels` - Labels fixed at construction; requests must then
    ///   omit dynamic labels.
    /// * `batch_size` - The engine's static batch size, if any.
    ///
    /// # Returns
    ///
    /// A new pipeline, or a configuration error.
    pub fn new(
        config: ZeroShotConfig,
        static_labels: Option<LabelSet>,
        batch_size: Option<usize>,
    ) -> PipelineResult<Self> {
        config.validate()?;
        let static_labels = static_labels.map(|labels| labels.parse()).transpose()?;
        match (&static_labels, batch_size) {
            (Some(labels), Some(batch)) if batch % labels.len() != 0 => {
                return Err(PipelineError::config_error(format!(
                    "with static labels, batch size {} must be divisible by the number of labels {}",
                    batch,
                    labels.len()
                )));
            }
            (None, Some(_)) => {
                return Err(PipelineError::config_error(
                    "a batch size requires static labels; provide labels at construction or drop the batch size",
                ));
            }
            _ => {}
        }
        let scorer = EntailmentScorer::new(config.entailment_index, config.contradiction_index)?;
        Ok(Self {
            config,
            scorer,
            static_labels,
            batch_size,
        })
    }

    /// Creates a pipeline with the default configuration and dynamic labels.
    pub fn with_defaults() -> PipelineResult<Self> {
        Self::new(ZeroShotConfig::default(), None, None)
    }

    /// Returns the pipeline configuration.
    pub fn config(&self) -> &ZeroShotConfig {
        &self.config
    }

    /// Returns the static labels, if any.
    pub fn static_labels(&self) -> Option<&[String]> {
        self.static_labels.as_deref()
    }

    /// Resolves the candidate labels for one request.
    fn resolve_labels(&self, input: &ZeroShotInput) -> PipelineResult<Vec<String>> {
        match (&self.static_labels, &input.labels) {
            (None, None) => Err(PipelineError::invalid_input(
                "provide either static labels at pipeline creation or dynamic labels at request time",
            )),
            (Some(_), Some(_)) => Err(PipelineError::invalid_input(
                "found both static labels and dynamic labels; provide only one",
            )),
            (Some(labels), None) => Ok(labels.clone()),
            (None, Some(labels)) => labels.parse(),
        }
    }

    /// Validates a request and builds the (premise, hypothesis) pairs for
    /// the external tokenizer and engine, in sequence-major order.
    ///
    /// All validation, including the hypothesis template check, happens
    /// before any tensor work.
    ///
    /// # Arguments
    ///
    /// * `input` - The request input.
    ///
    /// # Returns
    ///
    /// The sequence pairs and the context needed to post-process the engine
    /// output.
    pub fn process_inputs(
        &self,
        input: &ZeroShotInput,
    ) -> PipelineResult<(Vec<SequencePair>, ScoringContext)> {
        if input.sequences.is_empty() {
            return Err(PipelineError::invalid_input(
                "at least one sequence is required",
            ));
        }
        let labels = self.resolve_labels(input)?;

        if let (Some(static_labels), Some(batch_size)) = (&self.static_labels, self.batch_size) {
            let expected = batch_size / static_labels.len();
            if input.sequences.len() != expected {
                return Err(PipelineError::invalid_input(format!(
                    "with static labels, the number of sequences {} must equal batch size divided by the number of labels {}",
                    input.sequences.len(),
                    expected
                )));
            }
        }

        let template = input
            .hypothesis_template
            .as_deref()
            .unwrap_or(&self.config.hypothesis_template);
        if format_hypothesis(template, &labels[0]) == template {
            return Err(PipelineError::invalid_input(format!(
                "the hypothesis template '{}' was not changed by formatting with a label; include a {{}} slot where the label goes",
                template
            )));
        }
        let multi_class = input.multi_class.unwrap_or(self.config.multi_class);

        let mut pairs = Vec::with_capacity(input.sequences.len() * labels.len());
        for sequence in &input.sequences {
            for label in &labels {
                pairs.push([sequence.clone(), format_hypothesis(template, label)]);
            }
        }
        debug!(
            sequences = input.sequences.len(),
            labels = labels.len(),
            multi_class,
            "built zero-shot sequence pairs"
        );

        let context = ScoringContext {
            sequences: input.sequences.clone(),
            candidate_labels: labels,
            multi_class,
        };
        Ok((pairs, context))
    }

    /// Post-processes engine logits into ranked per-sequence labels.
    ///
    /// Accepts either flat (num_sequences * num_labels, num_outputs) logits
    /// or an already-reshaped (num_sequences, num_labels, num_outputs)
    /// tensor; anything else violates the engine contract.
    ///
    /// # Arguments
    ///
    /// * `logits` - The engine output logits.
    /// * `context` - The context returned by [`Self::process_inputs`].
    ///
    /// # Returns
    ///
    /// The output schema with labels sorted by descending score per
    /// sequence.
    pub fn process_engine_outputs(
        &self,
        logits: &TensorD,
        context: &ScoringContext,
    ) -> PipelineResult<ZeroShotOutput> {
        let num_sequences = context.sequences.len();
        let num_labels = context.candidate_labels.len();
        let shape_error = || {
            PipelineError::unexpected_output_shape(
                format!("({num_sequences} * {num_labels}, num_outputs)"),
                format!("{:?}", logits.shape()),
            )
        };

        let reshaped: Tensor3D = match logits.ndim() {
            2 if logits.shape()[0] == num_sequences * num_labels => {
                let num_outputs = logits.shape()[1];
                logits
                    .to_owned()
                    .into_shape_with_order((num_sequences, num_labels, num_outputs))
                    .map_err(|_| shape_error())?
            }
            3 if logits.shape()[0] == num_sequences && logits.shape()[1] == num_labels => logits
                .to_owned()
                .into_dimensionality::<Ix3>()
                .map_err(|_| shape_error())?,
            _ => return Err(shape_error()),
        };

        let scores = self.scorer.score(reshaped.view(), context.multi_class)?;

        let mut sorted_labels = Vec::with_capacity(num_sequences);
        let mut sorted_scores = Vec::with_capacity(num_sequences);
        for row in scores.rows() {
            let row: Vec<f32> = row.to_vec();
            let order = self.scorer.rank(&row);
            sorted_labels.push(
                order
                    .iter()
                    .map(|&index| context.candidate_labels[index].clone())
                    .collect::<Vec<_>>(),
            );
            sorted_scores.push(order.iter().map(|&index| row[index]).collect::<Vec<_>>());
        }

        Ok(ZeroShotOutput {
            sequences: context.sequences.clone(),
            labels: sorted_labels,
            scores: sorted_scores,
        })
    }
}

/// Substitutes a label into the hypothesis template.
fn format_hypothesis(template: &str, label: &str) -> String {
    template.replace("{}", label)
}

/// Returns true when the template contains a substitution slot.
fn template_has_slot(template: &str) -> bool {
    template.contains("{}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn labels(names: &[&str]) -> LabelSet {
        LabelSet::List(names.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn test_label_parsing_from_comma_string() {
        let parsed = LabelSet::Text("sports, politics , science,".to_string())
            .parse()
            .unwrap();
        assert_eq!(parsed, vec!["sports", "politics", "science"]);
    }

    #[test]
    fn test_duplicate_labels_are_rejected() {
        assert!(LabelSet::Text("a, b, a".to_string()).parse().is_err());
        assert!(labels(&[]).parse().is_err());
    }

    #[test]
    fn test_batch_size_must_divide_by_label_count() {
        let err = ZeroShotPipeline::new(
            ZeroShotConfig::default(),
            Some(labels(&["a", "b", "c"])),
            Some(4),
        )
        .unwrap_err();
        assert!(matches!(err, PipelineError::ConfigError { .. }));

        assert!(ZeroShotPipeline::new(
            ZeroShotConfig::default(),
            Some(labels(&["a", "b", "c"])),
            Some(6),
        )
        .is_ok());
    }

    #[test]
    fn test_batch_size_without_static_labels_is_rejected() {
        let err = ZeroShotPipeline::new(ZeroShotConfig::default(), None, Some(4)).unwrap_err();
        assert!(matches!(err, PipelineError::ConfigError { .. }));
    }

    #[test]
    fn test_config_template_without_slot_is_rejected() {
        let config = ZeroShotConfig {
            hypothesis_template: "This text is about something".to_string(),
            ..ZeroShotConfig::default()
        };
        assert!(ZeroShotPipeline::new(config, None, None).is_err());
    }

    #[test]
    fn test_absent_and_conflicting_labels() {
        let pipeline = ZeroShotPipeline::with_defaults().unwrap();
        let input = ZeroShotInput::from_sequences(vec!["hello".to_string()]);
        assert!(matches!(
            pipeline.process_inputs(&input).unwrap_err(),
            PipelineError::InvalidInput { .. }
        ));

        let static_pipeline = ZeroShotPipeline::new(
            ZeroShotConfig::default(),
            Some(labels(&["a", "b"])),
            None,
        )
        .unwrap();
        let dynamic_input =
            ZeroShotInput::new(vec!["hello".to_string()], labels(&["c"]));
        assert!(matches!(
            static_pipeline.process_inputs(&dynamic_input).unwrap_err(),
            PipelineError::InvalidInput { .. }
        ));
    }

    #[test]
    fn test_sequence_count_must_fill_static_batch() {
        let pipeline = ZeroShotPipeline::new(
            ZeroShotConfig::default(),
            Some(labels(&["a", "b"])),
            Some(4),
        )
        .unwrap();
        // Batch size 4 over 2 labels means exactly 2 sequences.
        let input = ZeroShotInput::from_sequences(vec!["one".to_string()]);
        assert!(pipeline.process_inputs(&input).is_err());

        let input =
            ZeroShotInput::from_sequences(vec!["one".to_string(), "two".to_string()]);
        assert!(pipeline.process_inputs(&input).is_ok());
    }

    #[test]
    fn test_template_override_without_slot_fails_before_tensor_work() {
        let pipeline = ZeroShotPipeline::with_defaults().unwrap();
        let input = ZeroShotInput {
            hypothesis_template: Some("no slot here".to_string()),
            ..ZeroShotInput::new(vec!["hello".to_string()], labels(&["a"]))
        };
        let err = pipeline.process_inputs(&input).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidInput { .. }));
    }

    #[test]
    fn test_sequence_pairs_are_sequence_major() {
        let pipeline = ZeroShotPipeline::with_defaults().unwrap();
        let input = ZeroShotInput::new(
            vec!["s1".to_string(), "s2".to_string()],
            labels(&["sports", "politics"]),
        );
        let (pairs, context) = pipeline.process_inputs(&input).unwrap();

        assert_eq!(pairs.len(), 4);
        assert_eq!(
            pairs[0],
            ["s1".to_string(), "This text is about sports".to_string()]
        );
        assert_eq!(
            pairs[1],
            ["s1".to_string(), "This text is about politics".to_string()]
        );
        assert_eq!(pairs[2][0], "s2");
        assert_eq!(context.candidate_labels, vec!["sports", "politics"]);
    }

    #[test]
    fn test_engine_outputs_ranked_and_normalized() {
        // One sequence, two labels, entailment index 0: label 1 has the
        // larger entailment logit and comes first; scores sum to one.
        let pipeline = ZeroShotPipeline::with_defaults().unwrap();
        let input =
            ZeroShotInput::new(vec!["hello".to_string()], labels(&["cats", "dogs"]));
        let (_, context) = pipeline.process_inputs(&input).unwrap();

        let mut logits = Array2::<f32>::zeros((2, 3));
        logits[[0, 0]] = 1.0;
        logits[[1, 0]] = 2.0;
        let output = pipeline
            .process_engine_outputs(&logits.into_dyn(), &context)
            .unwrap();

        assert_eq!(output.labels[0], vec!["dogs", "cats"]);
        let sum: f32 = output.scores[0].iter().sum();
        assert!((sum - 1.0).abs() < 1e-6);
        assert!(output.scores[0][0] > output.scores[0][1]);
    }

    #[test]
    fn test_multi_class_scores_have_no_sum_constraint() {
        let pipeline = ZeroShotPipeline::new(
            ZeroShotConfig {
                multi_class: true,
                ..ZeroShotConfig::default()
            },
            None,
            None,
        )
        .unwrap();
        let input =
            ZeroShotInput::new(vec!["hello".to_string()], labels(&["cats", "dogs"]));
        let (_, context) = pipeline.process_inputs(&input).unwrap();

        let mut logits = Array2::<f32>::zeros((2, 3));
        // Both labels strongly entailed.
        logits[[0, 0]] = 4.0;
        logits[[0, 2]] = -4.0;
        logits[[1, 0]] = 4.0;
        logits[[1, 2]] = -4.0;
        let output = pipeline
            .process_engine_outputs(&logits.into_dyn(), &context)
            .unwrap();

        for &score in &output.scores[0] {
            assert!((0.0..=1.0).contains(&score));
            assert!(score > 0.9);
        }
    }

    #[test]
    fn test_wrong_logit_row_count_is_a_contract_violation() {
        let pipeline = ZeroShotPipeline::with_defaults().unwrap();
        let input =
            ZeroShotInput::new(vec!["hello".to_string()], labels(&["a", "b"]));
        let (_, context) = pipeline.process_inputs(&input).unwrap();

        let logits = Array2::<f32>::zeros((3, 3));
        let err = pipeline
            .process_engine_outputs(&logits.into_dyn(), &context)
            .unwrap_err();
        assert!(matches!(err, PipelineError::UnexpectedOutputShape { .. }));
    }

    #[test]
    fn test_split_join_round_trip() {
        let input = ZeroShotInput::new(
            vec!["s1".to_string(), "s2".to_string()],
            labels(&["a", "b", "c"]),
        );
        let parts = input.clone().split().unwrap();
        assert_eq!(parts.len(), 6);
        for part in &parts {
            assert_eq!(part.sequences.len(), 1);
        }

        let joined = ZeroShotInput::join(parts).unwrap();
        assert_eq!(joined.sequences, vec!["s1", "s2"]);
        assert_eq!(
            joined.labels.unwrap().parse().unwrap(),
            vec!["a", "b", "c"]
        );
    }

    #[test]
    fn test_join_preserves_duplicate_sequences() {
        let input = ZeroShotInput::new(
            vec!["same".to_string(), "same".to_string()],
            labels(&["a", "b"]),
        );
        let parts = input.split().unwrap();
        let joined = ZeroShotInput::join(parts).unwrap();
        assert_eq!(joined.sequences, vec!["same", "same"]);
    }

    #[test]
    fn test_join_rejects_inconsistent_parts() {
        assert!(ZeroShotInput::join(vec![]).is_err());

        let part = |sequence: &str, label: &str| {
            ZeroShotInput::new(vec![sequence.to_string()], labels(&[label]))
        };
        // Label cycle of length 2, but the second block starts with a
        // different label order.
        let parts = vec![
            part("s1", "a"),
            part("s1", "b"),
            part("s2", "b"),
            part("s2", "a"),
        ];
        assert!(ZeroShotInput::join(parts).is_err());
    }
}
