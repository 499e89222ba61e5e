// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use reqwest::StatusCode;
use reqwest::blocking::Client as HttpClient;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use verdant_app::ChatMessage;

pub const GREETING: &str = "Kia ora! I'm your Plant Assistant. How can I help?";
pub const FALLBACK_REPLY: &str = "Error: Could not connect to assistant.";
pub const EMPTY_REPLY: &str = "Okay.";

/// Anything that can answer a single plant-care question.
pub trait Assistant {
    fn reply(&self, message: &str) -> Result<String>;
}

/// Blocking client for the assistant's `/chat` endpoint.
#[derive(Debug, Clone)]
pub struct Client {
    base_url: String,
    timeout: Duration,
    http: HttpClient,
}

impl Client {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = base_url.trim_end_matches('/').to_owned();
        if base_url.is_empty() {
            bail!("chat.base_url must not be empty");
        }

        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .context("build HTTP client")?;

        Ok(Self {
            base_url,
            timeout,
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn send(&self, message: &str) -> Result<String> {
        tracing::debug!(chars = message.len(), "sending chat message");
        let response = self
            .http
            .post(format!("{}/chat", self.base_url))
            .json(&ChatRequest { message })
            .send()
            .map_err(|error| connection_error(&self.base_url, error))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(clean_error_response(status, &body));
        }

        let parsed: ChatResponse = response.json().context("decode chat response")?;
        Ok(parsed
            .reply
            .filter(|reply| !reply.trim().is_empty())
            .unwrap_or_else(|| EMPTY_REPLY.to_owned()))
    }
}

impl Assistant for Client {
    fn reply(&self, message: &str) -> Result<String> {
        self.send(message)
    }
}

/// A chat transcript that opens with a greeting and never surfaces
/// transport errors to the reader.
pub struct Conversation<'a> {
    assistant: &'a dyn Assistant,
    messages: Vec<ChatMessage>,
}

impl<'a> Conversation<'a> {
    pub fn open(assistant: &'a dyn Assistant) -> Self {
        Self {
            assistant,
            messages: vec![ChatMessage::assistant(GREETING)],
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Sends `input` and returns the assistant's answer. Blank input is
    /// ignored and returns `None`.
    pub fn send(&mut self, input: &str) -> Option<&ChatMessage> {
        let input = input.trim();
        if input.is_empty() {
            return None;
        }
        self.messages.push(ChatMessage::user(input));

        let reply = match self.assistant.reply(input) {
            Ok(reply) => reply,
            Err(error) => {
                tracing::warn!("assistant request failed: {error:#}");
                FALLBACK_REPLY.to_owned()
            }
        };
        self.messages.push(ChatMessage::assistant(&reply));
        self.messages.last()
    }
}

fn connection_error(base_url: &str, error: reqwest::Error) -> anyhow::Error {
    anyhow!(
        "cannot reach {} -- check [chat].base_url ({})",
        base_url,
        error
    )
}

fn clean_error_response(status: StatusCode, body: &str) -> anyhow::Error {
    if let Ok(parsed) = serde_json::from_str::<ErrorEnvelope>(body)
        && let Some(error) = parsed.error.or(parsed.message)
        && !error.is_empty()
    {
        return anyhow!("server error ({}): {}", status.as_u16(), error);
    }

    if body.len() < 100 && !body.contains('{') && !body.trim().is_empty() {
        return anyhow!("server error ({}): {}", status.as_u16(), body.trim());
    }

    anyhow!("server returned {}", status.as_u16())
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    message: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    reply: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: Option<String>,
    message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::{
        Assistant, Client, Conversation, FALLBACK_REPLY, GREETING, clean_error_response,
    };
    use anyhow::{Result, bail};
    use reqwest::StatusCode;
    use std::cell::RefCell;
    use std::time::Duration;
    use verdant_app::{ChatMessage, ChatSender};

    struct Scripted {
        replies: RefCell<Vec<Result<String>>>,
        seen: RefCell<Vec<String>>,
    }

    impl Scripted {
        fn new(replies: Vec<Result<String>>) -> Self {
            Self {
                replies: RefCell::new(replies),
                seen: RefCell::new(Vec::new()),
            }
        }
    }

    impl Assistant for Scripted {
        fn reply(&self, message: &str) -> Result<String> {
            self.seen.borrow_mut().push(message.to_owned());
            let mut replies = self.replies.borrow_mut();
            if replies.is_empty() {
                bail!("no scripted reply left");
            }
            replies.remove(0)
        }
    }

    #[test]
    fn conversation_opens_with_greeting() {
        let assistant = Scripted::new(Vec::new());
        let conversation = Conversation::open(&assistant);
        assert_eq!(conversation.messages(), &[ChatMessage::assistant(GREETING)]);
    }

    #[test]
    fn blank_input_is_ignored() {
        let assistant = Scripted::new(Vec::new());
        let mut conversation = Conversation::open(&assistant);
        assert!(conversation.send("   ").is_none());
        assert_eq!(conversation.messages().len(), 1);
        assert!(assistant.seen.borrow().is_empty());
    }

    #[test]
    fn replies_follow_trimmed_user_messages() {
        let assistant = Scripted::new(vec![Ok("Water deeply once a week.".to_owned())]);
        let mut conversation = Conversation::open(&assistant);
        let reply = conversation
            .send("  How often should I water tomatoes? ")
            .cloned()
            .expect("reply expected");
        assert_eq!(reply.sender, ChatSender::Assistant);
        assert_eq!(reply.text, "Water deeply once a week.");
        assert_eq!(
            conversation.messages()[1],
            ChatMessage::user("How often should I water tomatoes?")
        );
        assert_eq!(
            assistant.seen.borrow().as_slice(),
            &["How often should I water tomatoes?".to_owned()]
        );
    }

    #[test]
    fn failures_become_the_fallback_reply() {
        let assistant = Scripted::new(Vec::new());
        let mut conversation = Conversation::open(&assistant);
        let reply = conversation.send("hello").cloned().expect("reply expected");
        assert_eq!(reply.text, FALLBACK_REPLY);
        assert_eq!(conversation.messages().len(), 3);
    }

    #[test]
    fn client_requires_base_url() {
        assert!(Client::new("", Duration::from_secs(1)).is_err());
        let client = Client::new("http://localhost:8000/", Duration::from_secs(1))
            .expect("client should initialize");
        assert_eq!(client.base_url(), "http://localhost:8000");
    }

    #[test]
    fn error_bodies_are_summarized() {
        let error = clean_error_response(StatusCode::BAD_REQUEST, r#"{"error":"message required"}"#);
        assert_eq!(error.to_string(), "server error (400): message required");
        let opaque = clean_error_response(StatusCode::INTERNAL_SERVER_ERROR, "");
        assert_eq!(opaque.to_string(), "server returned 500");
    }
}
