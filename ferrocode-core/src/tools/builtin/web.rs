//! URL fetching.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{Value, json};

use crate::tools::builtin::file_ops::required_str;
use crate::tools::traits::Tool;

const FETCH_CHAR_CAP: usize = 10_000;

/// Fetch a URL and return the response body as text.
pub struct FetchTool {
    http: reqwest::Client,
}

impl FetchTool {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }
}

impl Default for FetchTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for FetchTool {
    fn name(&self) -> &str {
        "fetch"
    }

    fn description(&self) -> &str {
        "Fetch a URL over HTTP(S) and return the body text, capped at 10000 characters."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "url": {"type": "string", "description": "URL to fetch"}
            },
            "required": ["url"]
        })
    }

    fn permission_target(&self, args: &Value) -> Option<String> {
        args.get("url").and_then(Value::as_str).map(str::to_owned)
    }

    async fn execute(&self, args: Value) -> Result<Value> {
        let url = required_str(&args, "url")?;
        let response = self
            .http
            .get(url)
            .header("User-Agent", "ferrocode/0.1")
            .send()
            .await
            .with_context(|| format!("fetching {url}"))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .with_context(|| format!("reading body from {url}"))?;

        let mut text = if body.chars().count() > FETCH_CHAR_CAP {
            let capped: String = body.chars().take(FETCH_CHAR_CAP).collect();
            format!("{capped}\n[content truncated at {FETCH_CHAR_CAP} characters]")
        } else {
            body
        };
        if !status.is_success() {
            text = format!("HTTP {status}\n{text}");
        }
        Ok(Value::String(text))
    }
}
