//! Wire models for the evaluation backend.
//!
//! Field names follow the JSON the backend emits: goldens are camelCase,
//! datasets and evaluation records are mostly snake_case. Timestamps stay
//! strings on the wire and are parsed where they are compared.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value as JsonValue;

use crate::error::{Error, Result};

/// Decode an explicit `null` as the field type's default.
///
/// `#[serde(default)]` alone only covers absent fields.
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

// =============================================================================
// DATASETS
// =============================================================================

/// Named collection of goldens scoped to a usecase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub alias: String,
    #[serde(rename = "numGoldens", default, deserialize_with = "null_as_default")]
    pub num_goldens: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub created_at: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub updated_at: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub user: String,
}

/// Body of `POST .../datasets`.
#[derive(Debug, Clone, Serialize)]
pub struct CreateDatasetRequest<'a> {
    pub alias: &'a str,
}

// =============================================================================
// GOLDENS
// =============================================================================

/// One input/expected-output evaluation example.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Golden {
    pub id: String,
    pub input: String,
    pub expected_output: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_output: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub context: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub retrieval_context: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub count: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
}

/// A golden that has not been assigned an id yet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewGolden {
    pub input: String,
    pub expected_output: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_output: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub context: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub retrieval_context: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub count: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
}

impl NewGolden {
    /// Golden with the two required fields and defaults for the rest.
    pub fn new(input: impl Into<String>, expected_output: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            expected_output: expected_output.into(),
            ..Default::default()
        }
    }

    /// Name of the first required field that is missing or blank.
    pub fn missing_field(&self) -> Option<&'static str> {
        if self.input.trim().is_empty() {
            Some("input")
        } else if self.expected_output.trim().is_empty() {
            Some("expectedOutput")
        } else {
            None
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self.missing_field() {
            Some(field) => Err(Error::InvalidInput(format!(
                "golden is missing required field '{}'",
                field
            ))),
            None => Ok(()),
        }
    }
}

/// Partial golden: only present fields are sent.
///
/// Used for updates and as the seed of content generation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoldenPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retrieval_context: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

impl GoldenPatch {
    pub fn with_input(mut self, input: impl Into<String>) -> Self {
        self.input = Some(input.into());
        self
    }

    pub fn with_expected_output(mut self, expected: impl Into<String>) -> Self {
        self.expected_output = Some(expected.into());
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = Some(tags);
        self
    }

    pub fn is_empty(&self) -> bool {
        self == &GoldenPatch::default()
    }

    /// Required fields may be left out of a patch but never blanked.
    pub fn validate_update(&self) -> Result<()> {
        for (name, value) in [
            ("input", &self.input),
            ("expectedOutput", &self.expected_output),
        ] {
            if matches!(value, Some(v) if v.trim().is_empty()) {
                return Err(Error::InvalidInput(format!(
                    "golden field '{}' must not be empty",
                    name
                )));
            }
        }
        Ok(())
    }

    /// Content generation needs at least an input to start from.
    pub fn validate_seed(&self) -> Result<()> {
        match self.input.as_deref() {
            Some(input) if !input.trim().is_empty() => Ok(()),
            _ => Err(Error::InvalidInput(
                "golden is missing required field 'input'".into(),
            )),
        }
    }
}

// =============================================================================
// EVALUATIONS
// =============================================================================

/// Lifecycle of an evaluation run.
///
/// Moves forward only: `pending -> running -> completed | failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvaluationStatus {
    Pending,
    Running,
    Completed,
    Failed,
    /// A status string this client does not know.
    #[serde(other)]
    Unknown,
}

impl EvaluationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Unknown => "unknown",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Position in the lifecycle; `Unknown` carries no progress information.
    fn rank(&self) -> u8 {
        match self {
            Self::Unknown => 0,
            Self::Pending => 1,
            Self::Running => 2,
            Self::Completed | Self::Failed => 3,
        }
    }

    /// Combine a previously observed status with a newly reported one.
    ///
    /// Returns the furthest of the two. A terminal status is kept even if the
    /// other terminal status is reported later.
    pub fn advance(self, reported: EvaluationStatus) -> EvaluationStatus {
        if self.is_terminal() {
            return self;
        }
        if reported.rank() >= self.rank() {
            reported
        } else {
            self
        }
    }
}

impl std::fmt::Display for EvaluationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Free-form name/value pair passed to the evaluation job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationParameter {
    pub name: String,
    pub value: String,
}

impl EvaluationParameter {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Body of `POST .../evaluations`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRequest {
    pub evaluation_name: String,
    pub dataset_id: String,
    pub model_id: String,
    /// Sampling temperature as a decimal string.
    pub temperature: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub parameters: Vec<EvaluationParameter>,
}

impl EvaluationRequest {
    pub fn new(
        evaluation_name: impl Into<String>,
        dataset_id: impl Into<String>,
        model_id: impl Into<String>,
        temperature: f64,
    ) -> Self {
        Self {
            evaluation_name: evaluation_name.into(),
            dataset_id: dataset_id.into(),
            model_id: model_id.into(),
            temperature: temperature.to_string(),
            parameters: Vec::new(),
        }
    }

    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.push(EvaluationParameter::new(name, value));
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.dataset_id.trim().is_empty() || self.model_id.trim().is_empty() {
            return Err(Error::InvalidInput(
                "both dataset and model must be selected".into(),
            ));
        }
        if self.evaluation_name.trim().is_empty() {
            return Err(Error::InvalidInput("evaluation name is required".into()));
        }
        let temperature: f64 = self.temperature.trim().parse().map_err(|_| {
            Error::InvalidInput(format!("temperature '{}' is not a number", self.temperature))
        })?;
        if !temperature.is_finite() || !(0.0..=1.0).contains(&temperature) {
            return Err(Error::InvalidInput(format!(
                "temperature {} is outside [0, 1]",
                temperature
            )));
        }
        if let Some(p) = self.parameters.iter().find(|p| p.name.trim().is_empty()) {
            return Err(Error::InvalidInput(format!(
                "parameter with value '{}' has no name",
                p.value
            )));
        }
        Ok(())
    }
}

/// One evaluation run as recorded by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationHistory {
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub evaluation_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub dataset_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub model_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub temperature: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub parameters: Vec<EvaluationParameter>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub usecase_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub created_at: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub updated_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_at: Option<String>,
    pub status: EvaluationStatus,
    #[serde(default)]
    pub result: JsonValue,
    #[serde(default)]
    pub error: Option<String>,
}

impl EvaluationHistory {
    /// Terminal timestamp, whichever of `completed_at` / `failed_at` is set.
    pub fn finished_at(&self) -> Option<&str> {
        self.completed_at
            .as_deref()
            .filter(|s| !s.is_empty())
            .or_else(|| self.failed_at.as_deref().filter(|s| !s.is_empty()))
    }
}

/// Progress of one golden inside a running evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GoldenProgress {
    Pending,
    Processing,
    Completed,
    Failed,
}

/// Golden currently being scored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentGolden {
    pub id: String,
    pub input: String,
    pub status: GoldenProgress,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationStatusDetails {
    #[serde(default, deserialize_with = "null_as_default")]
    pub total_goldens: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub processed_goldens: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub start_time: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_time_remaining: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_golden: Option<CurrentGolden>,
}

/// Response of `GET .../evaluations/{id}/status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationStatusReport {
    pub status: EvaluationStatus,
    #[serde(default, deserialize_with = "null_as_default")]
    pub progress: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub message: String,
    pub details: EvaluationStatusDetails,
}

// =============================================================================
// MODELS
// =============================================================================

/// Models the dashboard offers, as (id, display name).
pub const KNOWN_MODELS: &[(&str, &str)] = &[
    ("gemini_pro_2_0", "Gemini Pro 2.0"),
    ("gemini_flash_2_0", "Gemini Flash 2.0"),
    ("google_dialog_flow", "Dialog Flow"),
];

/// Display name of a model id, falling back to the id itself.
pub fn model_display_name(model_id: &str) -> &str {
    KNOWN_MODELS
        .iter()
        .find(|(id, _)| *id == model_id)
        .map(|(_, name)| *name)
        .unwrap_or(model_id)
}

/// Parse an RFC 3339 timestamp, `None` when absent or malformed.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
