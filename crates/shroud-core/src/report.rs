//! Serializable result of one analysis, consumed by masking layers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dialect::Dialect;
use crate::field::SensitiveField;

/// Sensitivity of every output column of one statement.
/// Matches `schemas/SensitivityReport.schema.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityReport {
    pub report_id: Uuid,
    pub analyzed_at: DateTime<Utc>,
    pub dialect: Dialect,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub current_database: String,
    pub statement: String,
    pub fields: Vec<SensitiveField>,
    pub sensitive_count: usize,
}

impl SensitivityReport {
    pub fn new(
        dialect: Dialect,
        current_database: impl Into<String>,
        statement: impl Into<String>,
        fields: Vec<SensitiveField>,
    ) -> Self {
        let sensitive_count = fields.iter().filter(|f| f.sensitive).count();
        Self {
            report_id: Uuid::new_v4(),
            analyzed_at: Utc::now(),
            dialect,
            current_database: current_database.into(),
            statement: statement.into(),
            fields,
            sensitive_count,
        }
    }

    /// Positions of the columns a masking layer must redact.
    pub fn masked_positions(&self) -> Vec<usize> {
        self.fields
            .iter()
            .enumerate()
            .filter(|(_, f)| f.sensitive)
            .map(|(i, _)| i)
            .collect()
    }

    pub fn has_sensitive(&self) -> bool {
        self.sensitive_count > 0
    }
}
