use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::history::{ChatMessage, ChatRole};

const BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const TEMPERATURE: f64 = 0.7;

/// Outcome of one completion call. Every variant is terminal for that
/// submission; the Display string is what gets rendered in the reply slot.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Rate limit reached. The daily request quota is used up; try again tomorrow.")]
    RateLimited,

    #[error("The request was rejected. Check that your API key is valid.")]
    BadRequest,

    #[error("Access denied. Check that your API key has permission to use this model.")]
    Forbidden,

    #[error("The model service is temporarily unavailable. Try again in a moment.")]
    Unavailable,

    #[error("Could not reach the server. Check your internet connection.")]
    Network(#[source] reqwest::Error),

    #[error("The request failed (HTTP {status}): {body}")]
    Api { status: u16, body: String },
}

impl ChatError {
    fn from_status(status: u16, body: String) -> Self {
        match status {
            429 => ChatError::RateLimited,
            400 => ChatError::BadRequest,
            403 => ChatError::Forbidden,
            500 | 502 | 503 => ChatError::Unavailable,
            status => ChatError::Api { status, body },
        }
    }
}

#[derive(Serialize, Debug, Clone)]
pub struct Content {
    pub role: String,
    pub parts: Vec<Part>,
}

#[derive(Serialize, Debug, Clone)]
pub struct Part {
    pub text: String,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: &'a [Content],
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f64,
}

#[derive(Deserialize)]
struct GenerateResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    parts: Option<Vec<ResponsePart>>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

/// Map the conversation into the wire payload: assistant turns become the
/// `model` role, user turns stay `user`, one text part each. The persona
/// instruction, when configured, is sent as the leading entry but is never
/// part of the stored history.
pub fn build_contents(system_prompt: Option<&str>, messages: &[ChatMessage]) -> Vec<Content> {
    let mut contents = Vec::with_capacity(messages.len() + 1);

    if let Some(prompt) = system_prompt {
        contents.push(Content {
            role: "user".to_string(),
            parts: vec![Part { text: prompt.to_string() }],
        });
    }

    for message in messages {
        let role = match message.role {
            ChatRole::User => "user",
            ChatRole::Assistant => "model",
        };
        contents.push(Content {
            role: role.to_string(),
            parts: vec![Part { text: message.content.clone() }],
        });
    }

    contents
}

#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: String,
}

impl GeminiClient {
    pub fn new(api_key: &str) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.to_string(),
        }
    }

    pub async fn generate(&self, model: &str, contents: Vec<Content>) -> Result<String, ChatError> {
        let url = format!("{}/{}:generateContent", BASE_URL, model);
        let request = GenerateRequest {
            contents: &contents,
            generation_config: GenerationConfig { temperature: TEMPERATURE },
        };

        let response = self.client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&request)
            .send()
            .await
            .map_err(ChatError::Network)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ChatError::from_status(status.as_u16(), body));
        }

        let response: GenerateResponse = response.json().await.map_err(ChatError::Network)?;
        Ok(extract_text(response))
    }
}

/// Concatenate the text parts of the first candidate. Anything structurally
/// missing or empty falls back to the literal "No response".
fn extract_text(response: GenerateResponse) -> String {
    let text = response
        .candidates
        .unwrap_or_default()
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
        .and_then(|content| content.parts)
        .map(|parts| parts.into_iter().filter_map(|p| p.text).collect::<String>())
        .unwrap_or_default();

    if text.is_empty() {
        "No response".to_string()
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(role: ChatRole, content: &str) -> ChatMessage {
        ChatMessage { role, content: content.to_string() }
    }

    #[test]
    fn maps_roles_to_gemini_vocabulary() {
        let history = vec![
            message(ChatRole::User, "Hello"),
            message(ChatRole::Assistant, "Hi there"),
        ];

        let contents = build_contents(None, &history);
        assert_eq!(contents.len(), 2);
        assert_eq!(contents[0].role, "user");
        assert_eq!(contents[0].parts[0].text, "Hello");
        assert_eq!(contents[1].role, "model");
        assert_eq!(contents[1].parts[0].text, "Hi there");
    }

    #[test]
    fn persona_leads_the_payload() {
        let history = vec![message(ChatRole::User, "Status report")];

        let contents = build_contents(Some("You are J.A.R.V.I.S."), &history);
        assert_eq!(contents.len(), 2);
        assert_eq!(contents[0].role, "user");
        assert_eq!(contents[0].parts[0].text, "You are J.A.R.V.I.S.");
        assert_eq!(contents[1].parts[0].text, "Status report");
    }

    #[test]
    fn request_serializes_with_generation_config() {
        let contents = build_contents(None, &[message(ChatRole::User, "Hi")]);
        let request = GenerateRequest {
            contents: &contents,
            generation_config: GenerationConfig { temperature: TEMPERATURE },
        };

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["contents"][0]["role"], "user");
        assert_eq!(value["contents"][0]["parts"][0]["text"], "Hi");
        assert_eq!(value["generationConfig"]["temperature"], 0.7);
    }

    #[test]
    fn extracts_and_concatenates_candidate_parts() {
        let raw = r#"{
            "candidates": [
                {"content": {"parts": [{"text": "Hi "}, {"text": "there"}], "role": "model"}}
            ]
        }"#;
        let response: GenerateResponse = serde_json::from_str(raw).unwrap();

        assert_eq!(extract_text(response), "Hi there");
    }

    #[test]
    fn only_the_first_candidate_is_used() {
        let raw = r#"{
            "candidates": [
                {"content": {"parts": [{"text": "first"}]}},
                {"content": {"parts": [{"text": "second"}]}}
            ]
        }"#;
        let response: GenerateResponse = serde_json::from_str(raw).unwrap();

        assert_eq!(extract_text(response), "first");
    }

    #[test]
    fn missing_candidates_fall_back_to_no_response() {
        let response: GenerateResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(extract_text(response), "No response");
    }

    #[test]
    fn empty_parts_fall_back_to_no_response() {
        let raw = r#"{"candidates": [{"content": {"parts": [{"text": ""}]}}]}"#;
        let response: GenerateResponse = serde_json::from_str(raw).unwrap();

        assert_eq!(extract_text(response), "No response");
    }

    #[test]
    fn partless_parts_are_skipped() {
        let raw = r#"{"candidates": [{"content": {"parts": [{}, {"text": "ok"}]}}]}"#;
        let response: GenerateResponse = serde_json::from_str(raw).unwrap();

        assert_eq!(extract_text(response), "ok");
    }

    #[test]
    fn classifies_status_codes() {
        assert!(matches!(ChatError::from_status(429, String::new()), ChatError::RateLimited));
        assert!(matches!(ChatError::from_status(400, String::new()), ChatError::BadRequest));
        assert!(matches!(ChatError::from_status(403, String::new()), ChatError::Forbidden));
        assert!(matches!(ChatError::from_status(500, String::new()), ChatError::Unavailable));
        assert!(matches!(ChatError::from_status(502, String::new()), ChatError::Unavailable));
        assert!(matches!(ChatError::from_status(503, String::new()), ChatError::Unavailable));
        assert!(matches!(
            ChatError::from_status(418, "teapot".to_string()),
            ChatError::Api { status: 418, .. }
        ));
    }

    #[test]
    fn error_messages_name_the_remedy() {
        assert!(ChatError::RateLimited.to_string().contains("quota"));
        assert!(ChatError::BadRequest.to_string().contains("API key"));
        assert!(ChatError::Forbidden.to_string().contains("permission"));
        assert!(ChatError::Unavailable.to_string().contains("Try again"));
        assert!(ChatError::from_status(418, String::new()).to_string().contains("418"));
    }
}
