//! Client for the hosted language model.
//!
//! The risk narrative is delegated to a Groq-hosted model behind an
//! OpenAI-compatible chat-completions endpoint. This module only builds the
//! requests and unwraps the first choice of the responses.

use std::{thread::sleep, time::Duration};

use anyhow::{anyhow, Context, Result};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use crate::{print_warning, Config};

/// Path of the chat-completions endpoint, relative to the base URL.
const CHAT_ENDPOINT: &str = "/openai/v1/chat/completions";

#[derive(Debug, Serialize)]
struct ChatRequest<'r> {
    model: &'r str,
    messages: Vec<Message<'r>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct Message<'r> {
    role: &'r str,
    content: &'r str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: String,
}

/// Client for the chat-completions endpoint.
pub struct LlmClient {
    /// Underlying HTTP client.
    client: Client,
    /// Base URL of the API, without a trailing slash.
    base_url: String,
    /// API key, sent as a bearer token.
    api_key: String,
    /// Model requested from the endpoint.
    model: String,
    /// Attempts per request.
    retries: usize,
}

impl LlmClient {
    /// Creates a client for the endpoint in the given configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.get_request_timeout())
            .build()
            .context("could not create the HTTP client for the language model")?;

        Ok(Self {
            client,
            base_url: config.get_groq_url().to_owned(),
            api_key: config.get_groq_api_key().to_owned(),
            model: config.get_groq_model().to_owned(),
            retries: config.get_llm_retries(),
        })
    }

    /// Sends a single-message completion request, with retries.
    ///
    /// The endpoint rate-limits aggressively, so failed attempts back off
    /// exponentially (1 s, 2 s, 4 s…).
    pub fn complete(&self, prompt: &str, temperature: f32, max_tokens: u32) -> Result<String> {
        let mut delay = Duration::from_secs(1);
        let mut last_error = None;
        for attempt in 1..=self.retries {
            match self.request(prompt, temperature, max_tokens) {
                Ok(content) => return Ok(content),
                Err(e) => {
                    if attempt < self.retries {
                        print_warning(format!(
                            "language model request failed (attempt {}/{}): {}",
                            attempt, self.retries, e
                        ));
                        sleep(delay);
                        delay *= 2;
                    }
                    last_error = Some(e);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| anyhow!("no completion was attempted"))
            .context(format!(
                "the language model request failed after {} attempts",
                self.retries
            )))
    }

    fn request(&self, prompt: &str, temperature: f32, max_tokens: u32) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
            temperature,
            max_tokens,
        };

        let response: ChatResponse = self
            .client
            .post(&format!("{}{}", self.base_url, CHAT_ENDPOINT))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .context("could not connect to the language model endpoint")?
            .error_for_status()
            .context("the completion request was rejected")?
            .json()
            .context("could not parse the completion response")?;

        response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| anyhow!("the completion response contained no choices"))
    }
}
