/// Ollama client: connectivity probe, model listing, and the three
/// generation calls the app exposes (solution drafts, tag suggestions,
/// grounded chat).
use std::time::Duration;

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::QueryError;
use crate::store::{SearchResult, StoreClient};

const TAG_SUGGESTION_CAP: usize = 5;
const CHAT_SOURCE_LIMIT: usize = 3;

// ── Wire types ────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct TagsResponse {
    models: Vec<ModelEntry>,
}

#[derive(Deserialize)]
struct ModelEntry {
    name: String,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

/// Snippet the user is viewing when they ask a question; folded into the
/// chat prompt so answers can reference it directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnippetContext {
    pub title: String,
    pub problem: String,
    pub solution: Option<String>,
    pub code: Option<String>,
}

/// One knowledge-base entry cited by a chat answer.
#[derive(Debug, Clone, PartialEq)]
pub struct SnippetSource {
    pub id: String,
    pub title: String,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatReply {
    pub answer: String,
    pub sources: Vec<SnippetSource>,
}

// ── Client ────────────────────────────────────────────────────────────────────

pub struct OllamaClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
}

impl OllamaClient {
    pub fn new(base_url: String, model: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
        }
    }

    /// Quick reachability probe. Never errors: an unreachable daemon is a
    /// normal state the UI reports, not a failure.
    pub async fn check_connection(&self) -> bool {
        match self
            .http
            .get(format!("{}/api/tags", self.base_url))
            .timeout(Duration::from_secs(3))
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    pub async fn list_models(&self) -> Result<Vec<String>> {
        let response = self
            .http
            .get(format!("{}/api/tags", self.base_url))
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .map_err(|e| anyhow!("ollama connection failed: {e}"))?;

        if !response.status().is_success() {
            return Err(anyhow!("ollama returned status {}", response.status()));
        }

        let tags: TagsResponse = response.json().await?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    async fn generate(&self, prompt: &str) -> Result<String, QueryError> {
        debug!(model = %self.model, prompt_len = prompt.len(), "ollama generate");
        let response = self
            .http
            .post(format!("{}/api/generate", self.base_url))
            .timeout(Duration::from_secs(30))
            .json(&GenerateRequest {
                model: &self.model,
                prompt,
                stream: false,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(QueryError::Service(format!(
                "ollama returned status {}",
                response.status()
            )));
        }

        let body: GenerateResponse = response.json().await.map_err(QueryError::from)?;
        Ok(body.response.trim().to_string())
    }

    /// Draft a solution for the problem text in the snippet form.
    pub async fn generate_solution(&self, problem: &str) -> Result<String, QueryError> {
        let prompt = format!(
            "You are a concise technical assistant. Suggest a practical solution \
             for the following problem. Answer in plain prose with a short code \
             example only if essential.\n\nProblem:\n{problem}"
        );
        self.generate(&prompt).await
    }

    /// Suggest up to five lowercase tags for the given snippet text.
    pub async fn suggest_tags(&self, content: &str) -> Result<Vec<String>, QueryError> {
        let prompt = format!(
            "Suggest short topical tags for the following note. Reply with a \
             single comma-separated list of at most {TAG_SUGGESTION_CAP} \
             lowercase tags and nothing else.\n\n{content}"
        );
        let raw = self.generate(&prompt).await?;
        Ok(parse_tag_list(&raw))
    }

    /// Answer a question grounded in the knowledge base. Retrieves related
    /// snippets from the store first and cites them as sources.
    pub async fn chat(
        &self,
        store: &StoreClient,
        message: &str,
        context: Option<&SnippetContext>,
    ) -> Result<ChatReply, QueryError> {
        let related = store.semantic_search(message, CHAT_SOURCE_LIMIT).await?;

        let mut prompt = String::from(
            "You are the assistant for a personal knowledge base of troubleshooting \
             notes. Answer using the notes below when relevant; say so plainly when \
             they do not cover the question.\n",
        );
        if let Some(ctx) = context {
            prompt.push_str("\nThe user is currently viewing this note:\n");
            prompt.push_str(&format!("Title: {}\nProblem: {}\n", ctx.title, ctx.problem));
            if let Some(solution) = &ctx.solution {
                prompt.push_str(&format!("Solution: {solution}\n"));
            }
            if let Some(code) = &ctx.code {
                prompt.push_str(&format!("Code:\n{code}\n"));
            }
        }
        for (i, result) in related.iter().enumerate() {
            prompt.push_str(&format!(
                "\nNote {n}: {title}\nProblem: {problem}\n",
                n = i + 1,
                title = result.snippet.title,
                problem = result.snippet.problem,
            ));
        }
        prompt.push_str(&format!("\nQuestion: {message}\nAnswer:"));

        let answer = self.generate(&prompt).await?;
        Ok(ChatReply {
            answer,
            sources: related.iter().map(source_from_result).collect(),
        })
    }
}

fn source_from_result(result: &SearchResult) -> SnippetSource {
    SnippetSource {
        id: result.snippet.id.clone(),
        title: result.snippet.title.clone(),
        score: result.score,
    }
}

fn parse_tag_list(raw: &str) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for part in raw.split(',') {
        let tag = part
            .trim()
            .trim_matches(|c: char| c == '"' || c == '.' || c == '#')
            .to_lowercase();
        if !tag.is_empty() && !tags.contains(&tag) {
            tags.push(tag);
        }
        if tags.len() == TAG_SUGGESTION_CAP {
            break;
        }
    }
    tags
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_list_is_trimmed_lowercased_and_deduped() {
        let tags = parse_tag_list("Docker, DNS , docker, networking.");
        assert_eq!(tags, vec!["docker", "dns", "networking"]);
    }

    #[test]
    fn tag_list_is_capped_at_five() {
        let tags = parse_tag_list("a, b, c, d, e, f, g");
        assert_eq!(tags.len(), 5);
        assert_eq!(tags.last().map(String::as_str), Some("e"));
    }

    #[test]
    fn tag_list_ignores_empty_segments() {
        let tags = parse_tag_list(", ,rust,,");
        assert_eq!(tags, vec!["rust"]);
    }

    #[test]
    fn base_url_trailing_slash_is_normalized() {
        let client = OllamaClient::new("http://localhost:11434/".to_string(), "m".to_string());
        assert_eq!(client.base_url, "http://localhost:11434");
    }

    #[tokio::test]
    async fn check_connection_is_false_when_nothing_listens() {
        // Port 1 is never an Ollama daemon.
        let client = OllamaClient::new("http://127.0.0.1:1".to_string(), "m".to_string());
        assert!(!client.check_connection().await);
    }
}
