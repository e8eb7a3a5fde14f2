use anyhow::{Context, Result, bail};
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};

use tempo_core::TextGenerator;

use crate::config::Config;

/// Gemini `generateContent` over HTTP. Unconfigured when there is no API key.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    temperature: f32,
}

impl GeminiClient {
    pub fn from_config(cfg: &Config) -> Self {
        let api_key = if cfg.llm.provider.eq_ignore_ascii_case("gemini") {
            cfg.api_key()
        } else {
            tracing::warn!(provider = %cfg.llm.provider, "unsupported llm provider; running offline");
            None
        };
        Self {
            client: reqwest::Client::new(),
            base_url: cfg.llm.base_url.trim_end_matches('/').to_string(),
            model: cfg.llm.model.clone(),
            api_key,
            temperature: cfg.llm.temperature,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model)
    }
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Req<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Deserialize)]
struct Resp {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<RespContent>,
}

#[derive(Deserialize)]
struct RespContent {
    #[serde(default)]
    parts: Vec<RespPart>,
}

#[derive(Deserialize)]
struct RespPart {
    text: Option<String>,
}

fn request_body(prompt: &str, temperature: f32) -> Req<'_> {
    Req {
        contents: vec![Content {
            role: "user",
            parts: vec![Part { text: prompt }],
        }],
        generation_config: GenerationConfig { temperature },
    }
}

/// Concatenated text of the first candidate.
fn reply_text(resp: Resp) -> Result<String> {
    let content = resp
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .ok_or_else(|| anyhow::anyhow!("gemini returned no candidates"))?;
    let text: String = content.parts.into_iter().filter_map(|p| p.text).collect();
    if text.trim().is_empty() {
        bail!("gemini returned an empty reply");
    }
    Ok(text.trim().to_string())
}

impl TextGenerator for GeminiClient {
    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let key = self
            .api_key
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("missing Gemini API key; set [llm].api_key or TEMPO_GEMINI_API_KEY"))?;

        let resp = self
            .client
            .post(self.endpoint())
            .query(&[("key", key)])
            .header(CONTENT_TYPE, "application/json")
            .json(&request_body(prompt, self.temperature))
            .send()
            .await
            .context("gemini request")?;

        let status = resp.status();
        if !status.is_success() {
            let txt = resp.text().await.unwrap_or_default();
            bail!("gemini error: {status} {txt}");
        }

        let out: Resp = resp.json().await.context("parse gemini response")?;
        reply_text(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_shape() {
        let v = serde_json::to_value(request_body("hi", 0.5)).unwrap();
        assert_eq!(v["contents"][0]["parts"][0]["text"], "hi");
        assert_eq!(v["contents"][0]["role"], "user");
        assert_eq!(v["generationConfig"]["temperature"], 0.5);
    }

    #[test]
    fn reply_joins_parts() {
        let resp: Resp = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"text":"Hello "},{"text":"there. "}]}}]}"#,
        )
        .unwrap();
        assert_eq!(reply_text(resp).unwrap(), "Hello there.");
    }

    #[test]
    fn blocked_reply_is_an_error() {
        let resp: Resp = serde_json::from_str(r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#).unwrap();
        assert!(reply_text(resp).is_err());
    }

    #[test]
    fn unconfigured_without_key() {
        let mut cfg = Config::default();
        cfg.llm.provider = "other".into();
        cfg.llm.api_key = Some("k".into());
        assert!(!GeminiClient::from_config(&cfg).is_configured());

        cfg.llm.provider = "gemini".into();
        let c = GeminiClient::from_config(&cfg);
        assert!(c.is_configured());
        assert!(c.endpoint().ends_with("/v1beta/models/gemini-1.5-flash:generateContent"));
    }
}
