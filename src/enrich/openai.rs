//! OpenAI-compatible enrichment provider
//!
//! Classification, translation and summarization go through the chat
//! completions endpoint in JSON mode. Abstracts are looked up by DOI on
//! Crossref, then Semantic Scholar; when neither has one and a key is
//! configured, the model writes one from the title.

use super::abstracts::AbstractSource;
use super::service::{EnrichmentError, EnrichmentService, FetchedAbstract};
use crate::config::ProviderConfig;
use crate::feed::{strip_markup, Entry};
use async_trait::async_trait;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::debug;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const CROSSREF_WORKS: &str = "https://api.crossref.org/works";
const SEMANTIC_SCHOLAR_PAPER: &str = "https://api.semanticscholar.org/graph/v1/paper";

const CLASSIFY_SYSTEM: &str = "You are an academic librarian. You classify paper titles and only output JSON.";
const TRANSLATE_SYSTEM: &str = "You are a professional academic translator. You only output JSON.";
const SUMMARIZE_SYSTEM: &str = "You condense academic abstracts. You only output JSON.";

/// Production enrichment provider.
pub struct OpenAiService {
    client: reqwest::Client,
    api_key: Option<String>,
    endpoint: String,
    model: String,
}

impl OpenAiService {
    pub fn new(provider: &ProviderConfig, timeout: Duration) -> Result<Self, EnrichmentError> {
        let mut builder = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("paperfeed/", env!("CARGO_PKG_VERSION")));
        if let Some(proxy) = &provider.proxy {
            builder = builder.proxy(reqwest::Proxy::all(proxy)?);
        }
        let base = provider
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/');

        Ok(Self {
            client: builder.build()?,
            api_key: provider.api_key.clone(),
            endpoint: format!("{}/chat/completions", base),
            model: provider.model.clone().unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        })
    }

    fn key(&self) -> Result<&str, EnrichmentError> {
        self.api_key
            .as_deref()
            .ok_or_else(|| EnrichmentError::Unavailable("no API key configured".to_string()))
    }

    async fn chat_json(&self, system: &str, prompt: &str) -> Result<Value, EnrichmentError> {
        #[derive(Serialize)]
        struct ChatMessage<'a> {
            role: &'a str,
            content: &'a str,
        }

        #[derive(Serialize)]
        struct ChatRequest<'a> {
            model: &'a str,
            messages: Vec<ChatMessage<'a>>,
            response_format: Value,
        }

        #[derive(Deserialize)]
        struct ChatChoice {
            message: ChatMessageResponse,
        }

        #[derive(Deserialize)]
        struct ChatMessageResponse {
            #[serde(default)]
            content: Option<String>,
        }

        #[derive(Deserialize)]
        struct ChatResponse {
            choices: Vec<ChatChoice>,
        }

        let key = self.key()?;
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            response_format: json!({"type": "json_object"}),
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(key)
            .json(&request)
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(EnrichmentError::Request(format!("chat API error {}: {}", status, body)));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| EnrichmentError::Parse(e.to_string()))?;
        let content = chat
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| EnrichmentError::Parse("empty response from chat API".to_string()))?;

        extract_json(&content)
            .ok_or_else(|| EnrichmentError::Parse(format!("no JSON object in response: {}", truncate(&content, 200))))
    }

    async fn get_json(&self, url: &str) -> Result<Option<Value>, EnrichmentError> {
        let response = self.client.get(url).send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(EnrichmentError::Request(format!("{} returned {}", url, response.status())));
        }
        let value = response
            .json::<Value>()
            .await
            .map_err(|e| EnrichmentError::Parse(e.to_string()))?;
        Ok(Some(value))
    }

    async fn crossref_abstract(&self, doi: &str) -> Result<Option<String>, EnrichmentError> {
        let body = self.get_json(&format!("{}/{}", CROSSREF_WORKS, doi)).await?;
        Ok(body
            .as_ref()
            .and_then(|b| b.pointer("/message/abstract"))
            .and_then(Value::as_str)
            .map(strip_markup)
            .filter(|t| !t.is_empty()))
    }

    async fn semantic_scholar_abstract(&self, doi: &str) -> Result<Option<String>, EnrichmentError> {
        let body = self
            .get_json(&format!("{}/DOI:{}?fields=abstract", SEMANTIC_SCHOLAR_PAPER, doi))
            .await?;
        Ok(body
            .as_ref()
            .and_then(|b| b.get("abstract"))
            .and_then(Value::as_str)
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty()))
    }

    async fn generate_abstract(&self, entry: &Entry) -> Result<Option<String>, EnrichmentError> {
        let prompt = format!(
            "Write a concise academic abstract (at most 120 words) for the paper below. \
             Return {{\"abstract\": \"...\"}}.\n\nTitle: {}\nJournal: {}\nNotice: {}",
            entry.title,
            entry.journal,
            truncate(&strip_markup(&entry.summary), 1000)
        );
        let value = self.chat_json(SUMMARIZE_SYSTEM, &prompt).await?;
        Ok(value
            .get("abstract")
            .and_then(Value::as_str)
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty()))
    }
}

#[async_trait]
impl EnrichmentService for OpenAiService {
    async fn is_available(&self) -> bool {
        self.api_key.is_some()
    }

    async fn classify(&self, titles: &[String]) -> Result<HashMap<String, Value>, EnrichmentError> {
        let prompt = format!(
            "Classify each paper title below. For each title return an object with: \
             \"index\" (the number shown), \"translated_title\" (Chinese translation), \
             \"methods\" and \"topics\" (lists of {{\"name\", \"confidence\"}} with confidence in [0,1]), \
             \"theories\", \"contexts\", \"subjects\" (lists of strings) and \"novelty_score\" (integer 1-5). \
             Return {{\"results\": [...]}} in the same order.\n\nTitles:\n{}",
            numbered(titles)
        );
        let value = self.chat_json(CLASSIFY_SYSTEM, &prompt).await?;
        let results = first_list(&value, "results");
        if results.len() != titles.len() {
            return Err(EnrichmentError::CountMismatch {
                expected: titles.len(),
                actual: results.len(),
            });
        }

        let mut out = HashMap::with_capacity(titles.len());
        for (position, result) in results.into_iter().enumerate() {
            let index = result
                .get("index")
                .and_then(Value::as_u64)
                .and_then(|i| usize::try_from(i).ok())
                .filter(|i| (1..=titles.len()).contains(i))
                .map(|i| i - 1)
                .unwrap_or(position);
            out.insert(titles[index].clone(), result);
        }
        if out.len() != titles.len() {
            return Err(EnrichmentError::CountMismatch {
                expected: titles.len(),
                actual: out.len(),
            });
        }
        Ok(out)
    }

    async fn translate(&self, titles: &[String]) -> Result<HashMap<String, String>, EnrichmentError> {
        let prompt = format!(
            "Translate the following paper titles into Chinese. Keep it academic and concise. \
             Return {{\"translations\": [...]}} as strings in the same order.\n\nTitles:\n{}",
            numbered(titles)
        );
        let value = self.chat_json(TRANSLATE_SYSTEM, &prompt).await?;
        let translations: Vec<String> = first_list(&value, "translations")
            .into_iter()
            .filter_map(|v| v.as_str().map(|s| s.trim().to_string()))
            .collect();
        if translations.len() != titles.len() {
            return Err(EnrichmentError::CountMismatch {
                expected: titles.len(),
                actual: translations.len(),
            });
        }
        Ok(titles.iter().cloned().zip(translations).collect())
    }

    async fn fetch_abstract(&self, entry: &Entry) -> Result<Option<FetchedAbstract>, EnrichmentError> {
        let doi = extract_doi(&entry.identity)
            .or_else(|| extract_doi(&entry.link))
            .or_else(|| extract_doi(&entry.summary));

        if let Some(doi) = &doi {
            match self.crossref_abstract(doi).await {
                Ok(Some(text)) => {
                    return Ok(Some(FetchedAbstract {
                        text,
                        source: AbstractSource::Crossref,
                    }))
                }
                Ok(None) => {}
                Err(e) => debug!(doi = %doi, error = %e, "crossref lookup failed"),
            }
            match self.semantic_scholar_abstract(doi).await {
                Ok(Some(text)) => {
                    return Ok(Some(FetchedAbstract {
                        text,
                        source: AbstractSource::SemanticScholar,
                    }))
                }
                Ok(None) => {}
                Err(e) => debug!(doi = %doi, error = %e, "semantic scholar lookup failed"),
            }
        }

        if self.api_key.is_none() {
            return Ok(None);
        }
        Ok(self.generate_abstract(entry).await?.map(|text| FetchedAbstract {
            text,
            source: AbstractSource::GptGenerated,
        }))
    }

    async fn summarize(&self, title: &str, text: &str) -> Result<Option<String>, EnrichmentError> {
        if text.trim().is_empty() {
            return Ok(None);
        }
        let prompt = format!(
            "Summarize the abstract below in at most three sentences. \
             Return {{\"summary\": \"...\"}}.\n\nTitle: {}\nAbstract: {}",
            title, text
        );
        let value = self.chat_json(SUMMARIZE_SYSTEM, &prompt).await?;
        Ok(value
            .get("summary")
            .and_then(Value::as_str)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty()))
    }
}

fn numbered(titles: &[String]) -> String {
    titles
        .iter()
        .enumerate()
        .map(|(i, t)| format!("{}. {}", i + 1, t))
        .collect::<Vec<_>>()
        .join("\n")
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// The list under `key`, else the first list-valued field of the object.
fn first_list(value: &Value, key: &str) -> Vec<Value> {
    if let Some(Value::Array(items)) = value.get(key) {
        return items.clone();
    }
    value
        .as_object()
        .and_then(|obj| obj.values().find_map(|v| v.as_array().cloned()))
        .unwrap_or_default()
}

/// Extract a JSON object from model output.
///
/// Tries direct parse, then a fenced code block, then the outermost braces.
pub fn extract_json(text: &str) -> Option<Value> {
    let trimmed = text.trim();

    if let Ok(v) = serde_json::from_str::<Value>(trimmed) {
        if v.is_object() {
            return Some(v);
        }
    }

    let fenced = if let Some(start) = trimmed.find("```json") {
        let after = &trimmed[start + 7..];
        after.find("```").map(|end| &after[..end])
    } else if let Some(start) = trimmed.find("```\n") {
        let after = &trimmed[start + 4..];
        after.find("```").map(|end| &after[..end])
    } else {
        None
    };
    if let Some(block) = fenced {
        if let Ok(v) = serde_json::from_str::<Value>(block.trim()) {
            if v.is_object() {
                return Some(v);
            }
        }
    }

    let (start, end) = (trimmed.find('{')?, trimmed.rfind('}')?);
    if start < end {
        if let Ok(v) = serde_json::from_str::<Value>(&trimmed[start..=end]) {
            if v.is_object() {
                return Some(v);
            }
        }
    }
    None
}

fn doi_pattern() -> Option<&'static Regex> {
    static DOI: OnceLock<Option<Regex>> = OnceLock::new();
    DOI.get_or_init(|| Regex::new(r#"10\.\d{4,9}/[^\s"'<>?#&]+"#).ok()).as_ref()
}

/// First DOI found in `text`, trailing punctuation removed.
pub fn extract_doi(text: &str) -> Option<String> {
    let found = doi_pattern()?.find(text)?;
    let doi = found.as_str().trim_end_matches(['.', ',', ';', ')', ']']);
    Some(doi.to_string())
}
