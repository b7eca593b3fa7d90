//! Speech-to-text and subtitle translation over the OpenAI HTTP API.

use crate::config::SpeechConfig;
use crate::domain::jobs::Language;
use crate::error::{PipelineError, PipelineResult};
use crate::ports::speech::SpeechPort;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

const TRANSCRIPTION_MODEL: &str = "whisper-1";
const TRANSLATION_MODEL: &str = "gpt-4-turbo";
const TRANSLATOR_PROMPT: &str = "Pretend you are an expert language translator for subtitles.";

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    n: u8,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    content: String,
}

#[derive(Clone)]
pub struct OpenAiSpeech {
    client: Client,
    base_url: String,
    api_key: String,
}

impl OpenAiSpeech {
    pub fn new(config: &SpeechConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

fn translation_prompt(vtt: &str, language: Language) -> String {
    format!(
        "Translate the following VTT to {}. Do not include any explanations, only provide a RFC8216 compliant VTT file without deviation.\n\n{}",
        language.code(),
        vtt
    )
}

async fn check(response: reqwest::Response, what: &str) -> PipelineResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(PipelineError::speech(format!("{} returned {}: {}", what, status, body)))
}

#[async_trait]
impl SpeechPort for OpenAiSpeech {
    async fn transcribe(&self, audio: &Path) -> PipelineResult<String> {
        let bytes = tokio::fs::read(audio).await?;
        let file_name = audio
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| String::from("audio.mp3"));
        debug!(file = %file_name, size = bytes.len(), "Transcribing");

        let form = Form::new()
            .text("model", TRANSCRIPTION_MODEL)
            .text("response_format", "vtt")
            .part("file", Part::bytes(bytes).file_name(file_name));

        let response = self
            .client
            .post(self.url("/audio/transcriptions"))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| PipelineError::speech(e.to_string()))?;

        check(response, "transcription")
            .await?
            .text()
            .await
            .map_err(|e| PipelineError::speech(e.to_string()))
    }

    async fn translate(&self, vtt: &str, language: Language) -> PipelineResult<String> {
        let request = ChatRequest {
            model: TRANSLATION_MODEL,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: TRANSLATOR_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: translation_prompt(vtt, language),
                },
            ],
            n: 1,
        };

        let response = self
            .client
            .post(self.url("/chat/completions"))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| PipelineError::speech(e.to_string()))?;

        let reply: ChatResponse = check(response, "translation")
            .await?
            .json()
            .await
            .map_err(|e| PipelineError::speech(e.to_string()))?;

        reply
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| PipelineError::speech("translation returned no choices"))
    }
}
