//! Evaluation history as displayed: rows joined with dataset aliases and
//! sorted by a selectable column.

use std::cmp::Ordering;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use tachyon_core::{
    parse_timestamp, Dataset, Error, EvaluationHistory, EvaluationParameter, EvaluationStatus,
};

/// One evaluation run prepared for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRow {
    pub id: String,
    pub evaluation_name: String,
    pub dataset_id: String,
    /// Alias of the dataset, or its id when the dataset is unknown.
    pub dataset_name: String,
    pub model_id: String,
    pub temperature: String,
    pub status: EvaluationStatus,
    pub start_time: String,
    pub end_time: Option<String>,
    pub parameters: Vec<EvaluationParameter>,
    pub usecase_id: String,
}

impl HistoryRow {
    pub fn project(record: &EvaluationHistory, datasets: &[Dataset]) -> Self {
        let dataset_name = datasets
            .iter()
            .find(|d| d.id == record.dataset_id)
            .map(|d| d.alias.clone())
            .filter(|alias| !alias.is_empty())
            .unwrap_or_else(|| record.dataset_id.clone());

        Self {
            id: record.id.clone(),
            evaluation_name: record.evaluation_name.clone(),
            dataset_id: record.dataset_id.clone(),
            dataset_name,
            model_id: record.model_id.clone(),
            temperature: record.temperature.clone(),
            status: record.status,
            start_time: record.created_at.clone(),
            end_time: record.finished_at().map(str::to_string),
            parameters: record.parameters.clone(),
            usecase_id: record.usecase_id.clone(),
        }
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.start_time)
    }

    /// Run time; zero while running or when a timestamp does not parse.
    pub fn duration(&self) -> Duration {
        let end = self.end_time.as_deref().and_then(parse_timestamp);
        match (self.started_at(), end) {
            (Some(start), Some(end)) => end - start,
            _ => Duration::zero(),
        }
    }
}

/// Project every record, joining dataset aliases.
pub fn project_rows(records: &[EvaluationHistory], datasets: &[Dataset]) -> Vec<HistoryRow> {
    records
        .iter()
        .map(|r| HistoryRow::project(r, datasets))
        .collect()
}

/// Sortable columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    Status,
    DatasetName,
    ModelId,
    StartTime,
    Duration,
    EvaluationName,
}

impl FromStr for SortField {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "status" => Ok(Self::Status),
            "dataset_name" | "dataset" => Ok(Self::DatasetName),
            "model_id" | "model" => Ok(Self::ModelId),
            "start_time" | "start" => Ok(Self::StartTime),
            "duration" => Ok(Self::Duration),
            "evaluation_name" | "name" => Ok(Self::EvaluationName),
            other => Err(Error::InvalidInput(format!("unknown sort field '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn flipped(self) -> Self {
        match self {
            Self::Asc => Self::Desc,
            Self::Desc => Self::Asc,
        }
    }
}

/// Current column and direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortState {
    pub field: SortField,
    pub order: SortOrder,
}

impl Default for SortState {
    /// Newest runs first.
    fn default() -> Self {
        Self {
            field: SortField::StartTime,
            order: SortOrder::Desc,
        }
    }
}

impl SortState {
    pub fn new(field: SortField, order: SortOrder) -> Self {
        Self { field, order }
    }

    /// Column header click: the active column flips direction, another
    /// column becomes active in ascending order.
    pub fn toggle(&mut self, field: SortField) {
        if field == self.field {
            self.order = self.order.flipped();
        } else {
            self.field = field;
            self.order = SortOrder::Asc;
        }
    }
}

fn compare_text(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

fn compare(a: &HistoryRow, b: &HistoryRow, field: SortField) -> Ordering {
    match field {
        SortField::Status => a.status.as_str().cmp(b.status.as_str()),
        SortField::DatasetName => compare_text(&a.dataset_name, &b.dataset_name),
        SortField::ModelId => compare_text(&a.model_id, &b.model_id),
        SortField::StartTime => a.started_at().cmp(&b.started_at()),
        SortField::Duration => a.duration().cmp(&b.duration()),
        SortField::EvaluationName => compare_text(&a.evaluation_name, &b.evaluation_name),
    }
}

/// Sorted copy of `rows`.
///
/// The sort is stable in both directions: rows with equal keys keep their
/// input order, so re-sorting the same input after toggling the order
/// twice yields the same sequence.
pub fn sort_rows(rows: &[HistoryRow], state: SortState) -> Vec<HistoryRow> {
    let mut sorted = rows.to_vec();
    sorted.sort_by(|a, b| {
        let ordering = compare(a, b, state.field);
        match state.order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    });
    sorted
}
