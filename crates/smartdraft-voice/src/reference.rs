//! Reference-material collaborators.
//!
//! Before connecting, the session optionally pulls two kinds of context for
//! the system instruction: similar previously-uploaded documents and the
//! department's blank template. Both lookups are narrow trait seams; a failed
//! or empty lookup is never fatal. The session connects without reference
//! material and logs the miss.

use crate::error::{SessionError, SessionResult};
use crate::instruction::DocumentType;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{info, warn};

/// One similar-document record from the data store.
#[derive(Debug, Clone, Deserialize)]
pub struct ReferenceRecord {
    /// The document body.
    pub content: String,
    /// Optional RAG context description attached at upload time.
    pub context: Option<String>,
}

/// Source of reference documents and templates, scoped by department.
#[async_trait]
pub trait ReferenceSource: Send + Sync {
    /// Up to `limit` documents similar to `query` for this department and
    /// document type.
    async fn search_similar(
        &self,
        department: &str,
        query: &str,
        document_type: DocumentType,
        limit: usize,
    ) -> SessionResult<Vec<ReferenceRecord>>;

    /// The department's blank template for this document type, if one was
    /// uploaded. Absence is not an error.
    async fn fetch_template(
        &self,
        department: &str,
        document_type: DocumentType,
    ) -> SessionResult<Option<String>>;
}

/// A source with nothing in it. Used when no department is configured.
#[derive(Debug, Default)]
pub struct NullReferenceSource;

#[async_trait]
impl ReferenceSource for NullReferenceSource {
    async fn search_similar(
        &self,
        _department: &str,
        _query: &str,
        _document_type: DocumentType,
        _limit: usize,
    ) -> SessionResult<Vec<ReferenceRecord>> {
        Ok(Vec::new())
    }

    async fn fetch_template(
        &self,
        _department: &str,
        _document_type: DocumentType,
    ) -> SessionResult<Option<String>> {
        Ok(None)
    }
}

/// Supabase-style REST source: PostgREST filters over the
/// `department_datasets` and `department_templates` tables.
pub struct RestReferenceSource {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct DatasetRow {
    file_content: Option<String>,
    detailed_context: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TemplateRow {
    content: Option<String>,
}

impl RestReferenceSource {
    /// Build from environment: `SMARTDRAFT_DB_URL` and `SMARTDRAFT_DB_KEY`.
    pub fn from_env() -> SessionResult<Self> {
        let base_url = std::env::var("SMARTDRAFT_DB_URL").map_err(|_| {
            SessionError::Config("reference source requires SMARTDRAFT_DB_URL".to_string())
        })?;
        let api_key = std::env::var("SMARTDRAFT_DB_KEY").map_err(|_| {
            SessionError::Config("reference source requires SMARTDRAFT_DB_KEY".to_string())
        })?;
        Ok(Self::new(base_url, api_key))
    }

    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            client: reqwest::Client::new(),
        }
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url.trim_end_matches('/'), table)
    }
}

#[async_trait]
impl ReferenceSource for RestReferenceSource {
    async fn search_similar(
        &self,
        department: &str,
        _query: &str,
        document_type: DocumentType,
        limit: usize,
    ) -> SessionResult<Vec<ReferenceRecord>> {
        let rows: Vec<DatasetRow> = self
            .client
            .get(self.table_url("department_datasets"))
            .bearer_auth(&self.api_key)
            .header("apikey", &self.api_key)
            .query(&[
                ("select", "file_content,detailed_context".to_string()),
                ("department", format!("eq.{department}")),
                ("document_type", format!("eq.{}", document_type.as_str())),
                ("limit", limit.to_string()),
            ])
            .send()
            .await
            .map_err(|e| SessionError::Reference(e.to_string()))?
            .error_for_status()
            .map_err(|e| SessionError::Reference(e.to_string()))?
            .json()
            .await
            .map_err(|e| SessionError::Reference(e.to_string()))?;

        Ok(rows
            .into_iter()
            .filter_map(|row| {
                row.file_content.map(|content| ReferenceRecord {
                    content,
                    context: row.detailed_context,
                })
            })
            .collect())
    }

    async fn fetch_template(
        &self,
        department: &str,
        document_type: DocumentType,
    ) -> SessionResult<Option<String>> {
        let rows: Vec<TemplateRow> = self
            .client
            .get(self.table_url("department_templates"))
            .bearer_auth(&self.api_key)
            .header("apikey", &self.api_key)
            .query(&[
                ("select", "content".to_string()),
                ("department", format!("eq.{department}")),
                ("document_type", format!("eq.{}", document_type.as_str())),
                ("limit", "1".to_string()),
            ])
            .send()
            .await
            .map_err(|e| SessionError::Reference(e.to_string()))?
            .error_for_status()
            .map_err(|e| SessionError::Reference(e.to_string()))?
            .json()
            .await
            .map_err(|e| SessionError::Reference(e.to_string()))?;

        Ok(rows.into_iter().next().and_then(|row| row.content))
    }
}

/// Fetch and compose the reference block embedded into the system
/// instruction. Every failure is logged and treated as "no reference
/// material"; this runs on the connect path and must never abort it.
pub async fn fetch_reference_block(
    source: &dyn ReferenceSource,
    department: &str,
    document_type: DocumentType,
) -> String {
    let mut block = String::new();
    let query = format!("{document_type} template");

    match source
        .search_similar(department, &query, document_type, 3)
        .await
    {
        Ok(records) if !records.is_empty() => {
            info!(
                "reference: found {} similar document(s) for {}",
                records.len(),
                document_type
            );
            for record in records {
                block.push_str(&format!(
                    "--- SIMILAR DATABASE DOCUMENT ---\nCONTEXT: {}\nCONTENT:\n{}\n--------------------------\n\n",
                    record.context.as_deref().unwrap_or("No specific context"),
                    record.content
                ));
            }
        }
        Ok(_) => {}
        Err(e) => warn!("reference: similar-document lookup failed: {}", e),
    }

    match source.fetch_template(department, document_type).await {
        Ok(Some(template)) => {
            block.push_str(&format!(
                "--- UPLOADED TEMPLATE ---\nCONTENT:\n{template}\n--------------------------\n"
            ));
        }
        Ok(None) => {}
        Err(e) => warn!("reference: template lookup failed: {}", e),
    }

    block
}
