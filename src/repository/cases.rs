//! Cases repository
//!
//! Case search and case event storage over the `cases` collection. The
//! renderer follows the configured engine; free-text searches use vector
//! search when the engine has it and an embedder answers, and the
//! structured search otherwise.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::adapter::{CollectionAdapter, PaginationResponse};
use crate::config::StoreConfig;
use crate::error::{QueryError, QueryResult};
use crate::query::{and, or, using, Expr};
use crate::render::{renderer_for, AggregateRenderer, Engine};

use super::client::ClientHandle;
use super::embedding::{Embedder, EmbeddingError};
use super::model::{
    CaseEvent, CaseEventField, SyncedCase, SyncedCaseField, AUDIT_PREFIX, CONSOLIDATION_PREFIX,
    CONSOLIDATION_TO, SYNCED_CASE, TRANSFER_PREFIX,
};
use super::predicate::{non_empty, CasesSearchPredicate};
use super::search::{build_search_pipeline, build_unassigned_pipeline, require_page};

const MODULE_NAME: &str = "CASES-REPOSITORY";
const COLLECTION_NAME: &str = "cases";

type CasesAdapter<T> = CollectionAdapter<T, Box<dyn AggregateRenderer>>;

/// Repository over the `cases` collection
pub struct CasesRepository {
    client: ClientHandle,
    config: StoreConfig,
    embedder: Option<Arc<dyn Embedder>>,
}

impl CasesRepository {
    /// Create a repository sharing `client`
    pub fn new(
        client: ClientHandle,
        config: StoreConfig,
        embedder: Option<Arc<dyn Embedder>>,
    ) -> QueryResult<Self> {
        config.validate()?;
        Ok(Self {
            client,
            config,
            embedder,
        })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    fn adapter<T>(&self) -> CasesAdapter<T> {
        let default_page_limit = match self.config.engine {
            Engine::Base => None,
            Engine::Atlas | Engine::Cosmos => Some(self.config.default_page_limit),
        };
        CollectionAdapter::with_renderer(
            MODULE_NAME,
            self.client
                .collection(&self.config.database, COLLECTION_NAME),
            renderer_for(self.config.engine, &self.config),
            default_page_limit,
        )
    }

    /// Search synced cases.
    ///
    /// Requires `limit` and `offset`. A non-blank `name` asks the embedder
    /// for a query vector; without one the structured search runs.
    pub async fn search_cases(
        &self,
        predicate: &CasesSearchPredicate,
    ) -> QueryResult<PaginationResponse<SyncedCase>> {
        if predicate.include_only_unassigned == Some(true) {
            return self.search_unassigned_cases(predicate).await;
        }
        require_page(predicate)?;

        let query_vector = match predicate.search_name() {
            Some(name) => self.query_vector(name).await,
            None => {
                debug!(module = MODULE_NAME, "structured search, no name provided");
                None
            }
        };

        let spec = build_search_pipeline(predicate, query_vector, &self.config)?;
        self.adapter::<SyncedCase>().paginate(&spec).await
    }

    /// Synced cases with no active assignment
    pub async fn search_unassigned_cases(
        &self,
        predicate: &CasesSearchPredicate,
    ) -> QueryResult<PaginationResponse<SyncedCase>> {
        let spec = build_unassigned_pipeline(predicate)?;
        self.adapter::<SyncedCase>().paginate(&spec).await
    }

    async fn query_vector(&self, name: &str) -> Option<Vec<f64>> {
        if !self.config.engine.supports_vector_search() {
            debug!(
                module = MODULE_NAME,
                engine = self.config.engine.as_str(),
                "engine has no vector search, using structured search"
            );
            return None;
        }
        let Some(embedder) = &self.embedder else {
            warn!(
                module = MODULE_NAME,
                "no embedder configured, falling back to structured search"
            );
            return None;
        };

        info!(module = MODULE_NAME, query_name = name, "vector search requested");
        match embedder.embed(name).await {
            Ok(vector) if !vector.is_empty() => {
                info!(module = MODULE_NAME, dimensions = vector.len(), "query vector generated");
                Some(vector)
            }
            Ok(_) => {
                warn!(
                    module = MODULE_NAME,
                    error = %EmbeddingError::EmptyVector,
                    "falling back to structured search"
                );
                None
            }
            Err(e) => {
                warn!(module = MODULE_NAME, error = %e, "falling back to structured search");
                None
            }
        }
    }

    /// The synced copy of `case_id`
    pub async fn get_synced_case(&self, case_id: &str) -> QueryResult<SyncedCase> {
        let doc = using::<SyncedCaseField>();
        let query = and([
            doc.field(SyncedCaseField::CaseId).equals(case_id),
            doc.field(SyncedCaseField::DocumentType).equals(SYNCED_CASE),
        ]);
        self.adapter::<SyncedCase>().find_one(&query.into()).await
    }

    /// Insert or replace the synced copy of a case
    pub async fn sync_case(&self, case: &SyncedCase) -> QueryResult<String> {
        let doc = using::<SyncedCaseField>();
        let query = and([
            doc.field(SyncedCaseField::CaseId)
                .equals(case.case_id.as_str()),
            doc.field(SyncedCaseField::DocumentType).equals(SYNCED_CASE),
        ]);
        let id = self
            .adapter::<SyncedCase>()
            .replace_one(&query.into(), case, true)
            .await?;
        debug!(module = MODULE_NAME, case_id = %case.case_id, "synced case");
        Ok(id)
    }

    /// Audit history of a case
    pub async fn get_case_history(&self, case_id: &str) -> QueryResult<Vec<CaseEvent>> {
        self.find_events(AUDIT_PREFIX, case_id).await
    }

    /// Transfers in and out of a case
    pub async fn get_transfers(&self, case_id: &str) -> QueryResult<Vec<CaseEvent>> {
        self.find_events(TRANSFER_PREFIX, case_id).await
    }

    /// Consolidation events of a case
    pub async fn get_consolidation(&self, case_id: &str) -> QueryResult<Vec<CaseEvent>> {
        self.find_events(CONSOLIDATION_PREFIX, case_id).await
    }

    async fn find_events(&self, type_pattern: &str, case_id: &str) -> QueryResult<Vec<CaseEvent>> {
        let doc = using::<CaseEventField>();
        let query = and([
            doc.field(CaseEventField::DocumentType).regex(type_pattern),
            doc.field(CaseEventField::CaseId).equals(case_id),
        ]);
        self.adapter::<CaseEvent>().find(&query.into(), None).await
    }

    /// Case ids of consolidation members matching the predicate's case ids
    /// and division codes
    pub async fn get_consolidation_member_case_ids(
        &self,
        predicate: &CasesSearchPredicate,
    ) -> QueryResult<Vec<String>> {
        let doc = using::<CaseEventField>();
        let case_id = doc.field(CaseEventField::CaseId);

        let mut conditions: Vec<Expr> = vec![doc
            .field(CaseEventField::DocumentType)
            .equals(CONSOLIDATION_TO)
            .into()];
        if let Some(case_ids) = non_empty(&predicate.case_ids) {
            conditions.push(case_id.contains(case_ids).into());
        }
        if let Some(division_codes) = non_empty(&predicate.division_codes) {
            conditions.push(
                or(division_codes
                    .iter()
                    .map(|code| case_id.regex(format!("^{}", code))))
                .into(),
            );
        }

        let members = self
            .adapter::<CaseEvent>()
            .find(&and(conditions).into(), None)
            .await?;
        Ok(members.into_iter().map(|member| member.case_id).collect())
    }

    /// Record an audit entry
    pub async fn create_case_history(&self, history: &CaseEvent) -> QueryResult<CaseEvent> {
        let created = self.create_event(history, AUDIT_PREFIX).await?;
        debug!(module = MODULE_NAME, case_id = %history.case_id, "created case history");
        Ok(created)
    }

    /// Record a transfer event
    pub async fn create_transfer(&self, transfer: &CaseEvent) -> QueryResult<CaseEvent> {
        self.create_event(transfer, TRANSFER_PREFIX).await
    }

    /// Record a consolidation event
    pub async fn create_consolidation(&self, consolidation: &CaseEvent) -> QueryResult<CaseEvent> {
        self.create_event(consolidation, CONSOLIDATION_PREFIX).await
    }

    async fn create_event(&self, event: &CaseEvent, type_pattern: &str) -> QueryResult<CaseEvent> {
        let prefix = type_pattern.trim_start_matches('^');
        if !event.document_type.starts_with(prefix) {
            return Err(QueryError::malformed(format!(
                "document type {} is not a {}* event",
                event.document_type, prefix
            )));
        }
        let id = self.adapter::<CaseEvent>().insert_one(event).await?;
        Ok(CaseEvent {
            id: Some(id),
            ..event.clone()
        })
    }
}
