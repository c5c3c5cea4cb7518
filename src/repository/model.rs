//! Case documents and their field sets
//!
//! The `cases` collection holds several document kinds told apart by
//! `documentType`: synced cases plus transfer, consolidation and audit
//! events.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::document_fields;

/// `documentType` of a synced case
pub const SYNCED_CASE: &str = "SYNCED_CASE";
/// `documentType` of a consolidation member reference
pub const CONSOLIDATION_TO: &str = "CONSOLIDATION_TO";
/// `documentType` prefix of transfer events
pub const TRANSFER_PREFIX: &str = "^TRANSFER_";
/// `documentType` prefix of consolidation events
pub const CONSOLIDATION_PREFIX: &str = "^CONSOLIDATION_";
/// `documentType` prefix of audit history
pub const AUDIT_PREFIX: &str = "^AUDIT_";

document_fields! {
    /// Fields of a synced case
    pub enum SyncedCaseField {
        DocumentType => "documentType",
        CaseId => "caseId",
        CaseNumber => "caseNumber",
        CaseTitle => "caseTitle",
        Chapter => "chapter",
        CourtDivisionCode => "courtDivisionCode",
        DateFiled => "dateFiled",
        ClosedDate => "closedDate",
        ReopenedDate => "reopenedDate",
        Assignments => "assignments",
        KeywordsVector => "keywordsVector",
    }
}

document_fields! {
    /// Fields shared by every case event
    pub enum CaseEventField {
        DocumentType => "documentType",
        CaseId => "caseId",
    }
}

document_fields! {
    /// Fields of a case assignment
    pub enum AssignmentField {
        CaseId => "caseId",
        Name => "name",
        UnassignedOn => "unassignedOn",
    }
}

document_fields! {
    /// Intermediate fields of the unassigned-case aggregation
    pub enum AssignmentScratchField {
        AllAssignments => "allAssignments",
        MatchingAssignments => "matchingAssignments",
    }
}

fn synced_case_type() -> String {
    SYNCED_CASE.to_string()
}

/// A case mirrored from the court system
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncedCase {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default = "synced_case_type")]
    pub document_type: String,
    pub case_id: String,
    pub case_number: String,
    #[serde(default)]
    pub case_title: String,
    pub chapter: String,
    pub court_division_code: String,
    pub date_filed: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closed_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reopened_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keywords_vector: Option<Vec<f64>>,
}

/// A transfer, consolidation or audit event attached to a case
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub document_type: String,
    pub case_id: String,
    /// Event-specific payload
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

impl CaseEvent {
    pub fn new(document_type: impl Into<String>, case_id: impl Into<String>) -> Self {
        Self {
            id: None,
            document_type: document_type.into(),
            case_id: case_id.into(),
            details: Map::new(),
        }
    }

    /// Same event with `key` set in its payload
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }
}
