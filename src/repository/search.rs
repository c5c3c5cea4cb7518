//! Case search composition
//!
//! Pure pipeline builders behind [`CasesRepository::search_cases`]. They do
//! no I/O, so the composition policy is testable on its own.
//!
//! [`CasesRepository::search_cases`]: super::CasesRepository::search_cases

use serde_json::Value;

use crate::config::StoreConfig;
use crate::error::{QueryError, QueryResult};
use crate::pipeline::{
    add_fields, additional_field, exclude, join, match_stage, paginate, pipeline, sort,
    vector_search, Pipeline,
};
use crate::query::{and, descending, or, source, unsourced, using, Expr, Field, SortedField};

use super::model::{AssignmentField, AssignmentScratchField, SyncedCaseField, SYNCED_CASE};
use super::predicate::{non_empty, CasesSearchPredicate};

const ASSIGNMENTS_COLLECTION: &str = "assignments";
const CASES_COLLECTION: &str = "cases";

/// Structured conditions of a case search
pub fn search_conditions(predicate: &CasesSearchPredicate) -> Vec<Expr> {
    let doc = using::<SyncedCaseField>();
    let mut conditions: Vec<Expr> = vec![doc
        .field(SyncedCaseField::DocumentType)
        .equals(SYNCED_CASE)
        .into()];

    if let Some(case_number) = predicate.case_number.as_deref().filter(|n| !n.is_empty()) {
        conditions.push(doc.field(SyncedCaseField::CaseNumber).equals(case_number).into());
    }
    if let Some(case_ids) = &predicate.case_ids {
        conditions.push(doc.field(SyncedCaseField::CaseId).contains(case_ids.as_slice()).into());
    }
    if let Some(chapters) = non_empty(&predicate.chapters) {
        conditions.push(doc.field(SyncedCaseField::Chapter).contains(chapters).into());
    }
    if let Some(division_codes) = non_empty(&predicate.division_codes) {
        conditions.push(
            doc.field(SyncedCaseField::CourtDivisionCode)
                .contains(division_codes)
                .into(),
        );
    }
    if predicate.exclude_member_consolidations == Some(true) {
        if let Some(excluded) = non_empty(&predicate.excluded_case_ids) {
            conditions.push(doc.field(SyncedCaseField::CaseId).not_contains(excluded).into());
        }
    }
    if predicate.exclude_closed_cases == Some(true) {
        let [closed, reopened] =
            doc.fields([SyncedCaseField::ClosedDate, SyncedCaseField::ReopenedDate]);
        conditions.push(
            or([
                Expr::from(closed.not_exists()),
                and([
                    closed.exists(),
                    reopened.exists(),
                    reopened.greater_than_or_equal(&closed),
                ])
                .into(),
            ])
            .into(),
        );
    }

    conditions
}

/// Candidate pool size for a page of `limit` results
pub fn vector_candidates(limit: u64, config: &StoreConfig) -> u32 {
    u32::try_from(limit.saturating_mul(2))
        .unwrap_or(u32::MAX)
        .max(config.min_vector_candidates)
}

/// Compose the case search pipeline.
///
/// `[match, vectorSearch?, sort, paginate]`; the vector stage is added only
/// for a non-empty `query_vector`.
pub fn build_search_pipeline(
    predicate: &CasesSearchPredicate,
    query_vector: Option<Vec<f64>>,
    config: &StoreConfig,
) -> QueryResult<Pipeline> {
    let (offset, limit) = require_page(predicate)?;

    let mut spec = pipeline([match_stage(and(search_conditions(predicate)))]);
    if let Some(vector) = query_vector.filter(|v| !v.is_empty()) {
        spec.push(vector_search(
            vector,
            &Field::new(config.vector_path.as_str()),
            vector_candidates(limit, config),
            config.vector_similarity,
        ));
    }
    spec.push(sort(tie_break()));
    spec.push(paginate(offset, limit));
    Ok(spec)
}

/// Compose the search for cases with no active assignment.
///
/// Assignments are joined onto each case, narrowed to the active ones, and
/// only cases left with none are kept. When the predicate names assignees
/// the first one also fills `matchingAssignments`.
pub fn build_unassigned_pipeline(predicate: &CasesSearchPredicate) -> QueryResult<Pipeline> {
    let (offset, limit) = require_page(predicate)?;

    let initial = CasesSearchPredicate {
        assignments: None,
        ..predicate.clone()
    };
    let initial_match = and(search_conditions(&initial));

    let assignment_docs = source::<AssignmentField>(ASSIGNMENTS_COLLECTION);
    let [assignment_case_id, assignment_name, unassigned_on] = assignment_docs.fields([
        AssignmentField::CaseId,
        AssignmentField::Name,
        AssignmentField::UnassignedOn,
    ]);

    let case_docs = source::<SyncedCaseField>(CASES_COLLECTION);
    let [case_id, assignments] =
        case_docs.fields([SyncedCaseField::CaseId, SyncedCaseField::Assignments]);

    let [all_assignments, matching_assignments] = unsourced::<AssignmentScratchField>().fields([
        AssignmentScratchField::AllAssignments,
        AssignmentScratchField::MatchingAssignments,
    ]);

    let assignee_filter = match predicate.assignments.as_deref().and_then(|a| a.first()) {
        Some(assignee) => and([assignment_name.equals(assignee.name.as_str())]),
        None => and(Vec::<Expr>::new()),
    };

    Ok(pipeline([
        match_stage(initial_match),
        join(&assignment_case_id)
            .onto(&case_id)
            .as_field(&all_assignments),
        add_fields([
            additional_field(&matching_assignments, &all_assignments, assignee_filter),
            additional_field(&assignments, &all_assignments, unassigned_on.not_exists()),
        ]),
        match_stage(assignments.equals(Vec::<Value>::new())),
        exclude([all_assignments, matching_assignments]),
        sort(tie_break()),
        paginate(offset, limit),
    ]))
}

fn tie_break() -> [SortedField; 2] {
    let [date_filed, case_number] = unsourced::<SyncedCaseField>()
        .fields([SyncedCaseField::DateFiled, SyncedCaseField::CaseNumber]);
    [descending(&date_filed), descending(&case_number)]
}

pub(crate) fn require_page(predicate: &CasesSearchPredicate) -> QueryResult<(u64, u64)> {
    predicate.page().ok_or_else(|| {
        QueryError::malformed(
            "Case Search requires a pagination predicate with a valid limit and offset",
        )
    })
}
