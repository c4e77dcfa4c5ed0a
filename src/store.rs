/// Snippet store collaborator.
///
/// The store service owns persistence and the embedding index; this client
/// only speaks its JSON interface. Wire field names are camelCase to match
/// the service.
use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::errors::QueryError;

// ── Domain types ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Snippet {
    pub id: String,
    pub title: String,
    pub problem: String,
    pub solution: Option<String>,
    pub code: Option<String>,
    pub code_language: Option<String>,
    pub reference_url: Option<String>,
    #[serde(default)]
    pub tags: Vec<Tag>,
    pub created_at: String,
    pub updated_at: String,
    pub is_favorite: bool,
    pub is_deleted: bool,
    pub deleted_at: Option<String>,
    pub last_accessed_at: Option<String>,
}

/// Listing/search projection — code trimmed to a preview.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SnippetSummary {
    pub id: String,
    pub title: String,
    pub problem: String,
    pub code_language: Option<String>,
    pub code_preview: Option<String>,
    #[serde(default)]
    pub tags: Vec<Tag>,
    pub created_at: String,
    pub is_favorite: bool,
    pub is_deleted: bool,
    pub deleted_at: Option<String>,
    pub last_accessed_at: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSnippetInput {
    pub title: String,
    pub problem: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub solution: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_url: Option<String>,
    pub tag_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSnippetInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub problem: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub solution: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag_ids: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_accessed_at: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnippetFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    pub favorites_only: bool,
    pub trash_only: bool,
    pub recent_first: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub snippet: SnippetSummary,
    pub score: f64,
}

/// Application settings held by the store service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub theme: String,
    pub ollama_base_url: String,
    pub llm_model: String,
    pub embedding_model: String,
    pub search_limit: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            theme: "dark".to_string(),
            ollama_base_url: "http://localhost:11434".to_string(),
            llm_model: "llama3.2".to_string(),
            embedding_model: "nomic-embed-text".to_string(),
            search_limit: 10,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSettingsInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ollama_base_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding_model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_limit: Option<u32>,
}

// ── Client ────────────────────────────────────────────────────────────────────

pub struct StoreClient {
    http: reqwest::Client,
    base_url: String,
}

impl StoreClient {
    pub fn new(base_url: String) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn check(resp: reqwest::Response) -> Result<reqwest::Response> {
        if resp.status().is_success() {
            Ok(resp)
        } else {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            Err(anyhow!("store error {status}: {body}"))
        }
    }

    // ── Snippets ──────────────────────────────────────────────────────────────

    pub async fn list_snippets(&self, filter: &SnippetFilter) -> Result<Vec<SnippetSummary>> {
        let resp = self
            .http
            .get(self.url("/snippets"))
            .query(&[
                ("language", filter.language.clone().unwrap_or_default()),
                ("search", filter.search.clone().unwrap_or_default()),
                ("favoritesOnly", filter.favorites_only.to_string()),
                ("trashOnly", filter.trash_only.to_string()),
                ("recentFirst", filter.recent_first.to_string()),
            ])
            .send()
            .await?;
        Ok(Self::check(resp).await?.json().await?)
    }

    pub async fn get_snippet(&self, id: &str) -> Result<Snippet> {
        let resp = self.http.get(self.url(&format!("/snippets/{id}"))).send().await?;
        Ok(Self::check(resp).await?.json().await?)
    }

    pub async fn create_snippet(&self, input: &CreateSnippetInput) -> Result<Snippet> {
        let resp = self.http.post(self.url("/snippets")).json(input).send().await?;
        Ok(Self::check(resp).await?.json().await?)
    }

    pub async fn update_snippet(&self, id: &str, input: &UpdateSnippetInput) -> Result<Snippet> {
        let resp = self
            .http
            .patch(self.url(&format!("/snippets/{id}")))
            .json(input)
            .send()
            .await?;
        Ok(Self::check(resp).await?.json().await?)
    }

    /// Soft delete: moves the snippet to the trash folder.
    pub async fn delete_snippet(&self, id: &str) -> Result<()> {
        let resp = self.http.delete(self.url(&format!("/snippets/{id}"))).send().await?;
        Self::check(resp).await?;
        Ok(())
    }

    pub async fn restore_snippet(&self, id: &str) -> Result<Snippet> {
        let resp = self
            .http
            .post(self.url(&format!("/snippets/{id}/restore")))
            .send()
            .await?;
        Ok(Self::check(resp).await?.json().await?)
    }

    /// Permanent delete — only valid for snippets already in the trash.
    pub async fn purge_snippet(&self, id: &str) -> Result<()> {
        let resp = self
            .http
            .delete(self.url(&format!("/snippets/{id}/purge")))
            .send()
            .await?;
        Self::check(resp).await?;
        Ok(())
    }

    pub async fn toggle_favorite(&self, id: &str) -> Result<Snippet> {
        let resp = self
            .http
            .post(self.url(&format!("/snippets/{id}/favorite")))
            .send()
            .await?;
        Ok(Self::check(resp).await?.json().await?)
    }

    /// Record that the user viewed a snippet (drives "recent" ordering).
    pub async fn mark_accessed(&self, id: &str) -> Result<Snippet> {
        let input = UpdateSnippetInput {
            last_accessed_at: Some(chrono::Utc::now().to_rfc3339()),
            ..Default::default()
        };
        self.update_snippet(id, &input).await
    }

    // ── Tags ──────────────────────────────────────────────────────────────────

    pub async fn list_tags(&self) -> Result<Vec<Tag>> {
        let resp = self.http.get(self.url("/tags")).send().await?;
        Ok(Self::check(resp).await?.json().await?)
    }

    pub async fn create_tag(&self, name: &str) -> Result<Tag> {
        let resp = self
            .http
            .post(self.url("/tags"))
            .json(&serde_json::json!({ "name": name }))
            .send()
            .await?;
        Ok(Self::check(resp).await?.json().await?)
    }

    pub async fn delete_tag(&self, id: &str) -> Result<()> {
        let resp = self.http.delete(self.url(&format!("/tags/{id}"))).send().await?;
        Self::check(resp).await?;
        Ok(())
    }

    // ── Settings ──────────────────────────────────────────────────────────────

    pub async fn get_settings(&self) -> Result<Settings> {
        let resp = self.http.get(self.url("/settings")).send().await?;
        Ok(Self::check(resp).await?.json().await?)
    }

    pub async fn update_settings(&self, input: &UpdateSettingsInput) -> Result<Settings> {
        let resp = self.http.patch(self.url("/settings")).json(input).send().await?;
        Ok(Self::check(resp).await?.json().await?)
    }

    // ── Semantic search ───────────────────────────────────────────────────────

    /// Ranked search over the store's embedding index. Returns a typed error
    /// so the query coordinator can distinguish "unreachable" from a service
    /// failure.
    pub async fn semantic_search(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SearchResult>, QueryError> {
        let resp = self
            .http
            .get(self.url("/search"))
            .query(&[("q", query.to_string()), ("limit", limit.to_string())])
            .send()
            .await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(QueryError::Service(format!("search failed ({status}): {body}")));
        }
        resp.json().await.map_err(QueryError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snippet_deserializes_from_store_wire_format() {
        let raw = r#"{
            "id": "s1",
            "title": "Fix Docker DNS",
            "problem": "Container cannot resolve hostnames",
            "solution": "Set dns in daemon.json",
            "code": "{\"dns\": [\"8.8.8.8\"]}",
            "codeLanguage": "json",
            "referenceUrl": null,
            "tags": [{"id": "t1", "name": "docker"}],
            "createdAt": "2026-02-09T10:00:00Z",
            "updatedAt": "2026-02-09T10:00:00Z",
            "isFavorite": true,
            "isDeleted": false,
            "deletedAt": null,
            "lastAccessedAt": null
        }"#;
        let snippet: Snippet = serde_json::from_str(raw).unwrap();
        assert_eq!(snippet.id, "s1");
        assert_eq!(snippet.code_language.as_deref(), Some("json"));
        assert!(snippet.is_favorite);
        assert_eq!(snippet.tags[0].name, "docker");
    }

    #[test]
    fn update_input_serializes_only_present_fields() {
        let input = UpdateSnippetInput {
            title: Some("New title".to_string()),
            ..Default::default()
        };
        let json = serde_json::to_value(&input).unwrap();
        assert_eq!(json, serde_json::json!({ "title": "New title" }));
    }

    #[test]
    fn search_result_round_trips() {
        let raw = r#"{"snippet": {
            "id": "s1", "title": "t", "problem": "p",
            "codeLanguage": null, "codePreview": null, "tags": [],
            "createdAt": "2026-01-01", "isFavorite": false,
            "isDeleted": false, "deletedAt": null, "lastAccessedAt": null
        }, "score": 0.87}"#;
        let result: SearchResult = serde_json::from_str(raw).unwrap();
        assert!((result.score - 0.87).abs() < 1e-9);
        assert_eq!(result.snippet.id, "s1");
    }

    #[test]
    fn base_url_trailing_slash_is_normalized() {
        let client = StoreClient::new("http://localhost:7171/".to_string());
        assert_eq!(client.url("/snippets"), "http://localhost:7171/snippets");
    }
}
