//! Conversation plumbing: the rolling history sent to the chat service, the
//! speech bubbles shown on screen, and the HTTP client for the service itself.

use crate::stats::Stats;
use crate::Millis;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

pub(crate) const HISTORY_CAP: usize = 20;
pub(crate) const FALLBACK_REPLY: &str = "... (error)";
pub(crate) const EMPTY_REPLY: &str = "...";

pub(crate) const USER_BUBBLE_MS: Millis = 20_000;
pub(crate) const PET_BUBBLE_MS: Millis = 30_000;
pub(crate) const BUBBLE_FADE_MS: Millis = 1_000;
pub(crate) const MAX_USER_BUBBLES: usize = 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum ChatRole {
    User,
    Model,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct ChatEntry {
    #[serde(rename = "type")]
    pub(crate) role: ChatRole,
    pub(crate) text: String,
}

/// Bounded FIFO of the most recent exchanges.
#[derive(Clone, Debug)]
pub(crate) struct ChatHistory {
    entries: VecDeque<ChatEntry>,
    cap: usize,
}

impl Default for ChatHistory {
    fn default() -> Self {
        Self::with_capacity(HISTORY_CAP)
    }
}

impl ChatHistory {
    pub(crate) fn with_capacity(cap: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(cap + 1),
            cap,
        }
    }

    pub(crate) fn push(&mut self, role: ChatRole, text: impl Into<String>) {
        self.entries.push_back(ChatEntry {
            role,
            text: text.into(),
        });
        while self.entries.len() > self.cap {
            self.entries.pop_front();
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &ChatEntry> {
        self.entries.iter()
    }

    pub(crate) fn snapshot(&self) -> Vec<ChatEntry> {
        self.entries.iter().cloned().collect()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Speaker {
    User,
    Pet,
}

#[derive(Clone, Debug)]
pub(crate) struct Bubble {
    pub(crate) speaker: Speaker,
    pub(crate) text: String,
    pub(crate) shown_at: Millis,
}

impl Bubble {
    fn lifetime(&self) -> Millis {
        match self.speaker {
            Speaker::User => USER_BUBBLE_MS,
            Speaker::Pet => PET_BUBBLE_MS,
        }
    }

    pub(crate) fn is_fading(&self, now: Millis) -> bool {
        now >= self.shown_at + self.lifetime()
    }

    fn is_gone(&self, now: Millis) -> bool {
        now >= self.shown_at + self.lifetime() + BUBBLE_FADE_MS
    }
}

/// What is currently "said" on screen. The pet keeps a single bubble; the
/// user keeps the last two.
#[derive(Clone, Debug, Default)]
pub(crate) struct BubbleBoard {
    bubbles: Vec<Bubble>,
}

impl BubbleBoard {
    pub(crate) fn say(&mut self, speaker: Speaker, text: impl Into<String>, now: Millis) {
        if speaker == Speaker::Pet {
            self.bubbles.retain(|b| b.speaker != Speaker::Pet);
        }
        self.bubbles.push(Bubble {
            speaker,
            text: text.into(),
            shown_at: now,
        });
        if speaker == Speaker::User {
            let users = self
                .bubbles
                .iter()
                .filter(|b| b.speaker == Speaker::User)
                .count();
            if users > MAX_USER_BUBBLES {
                if let Some(i) = self.bubbles.iter().position(|b| b.speaker == Speaker::User) {
                    self.bubbles.remove(i);
                }
            }
        }
    }

    pub(crate) fn prune(&mut self, now: Millis) {
        self.bubbles.retain(|b| !b.is_gone(now));
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &Bubble> {
        self.bubbles.iter()
    }

    #[cfg(test)]
    pub(crate) fn last_pet(&self) -> Option<&Bubble> {
        self.bubbles.iter().rev().find(|b| b.speaker == Speaker::Pet)
    }
}

/// Body of `POST /api/chat`.
#[derive(Clone, Debug, Serialize)]
pub(crate) struct ChatRequest {
    pub(crate) message: String,
    pub(crate) history: Vec<ChatEntry>,
    pub(crate) stats: Stats,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    response: Option<String>,
}

/// Body of `GET /api/status`.
#[derive(Clone, Debug, Deserialize)]
pub(crate) struct ServiceStatus {
    pub(crate) status: String,
    #[serde(default)]
    pub(crate) model: Option<String>,
    #[serde(default)]
    pub(crate) api_configured: bool,
}

#[derive(Debug, Error)]
pub(crate) enum ChatError {
    #[error("chat service disabled")]
    Offline,

    #[error("chat request failed: {0}")]
    Transport(String),

    #[error("chat service returned HTTP {0}")]
    Status(StatusCode),

    #[error("chat reply was not valid JSON: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for ChatError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ChatError::Decode(err.to_string())
        } else {
            ChatError::Transport(err.to_string())
        }
    }
}

#[derive(Clone, Debug)]
pub(crate) struct ChatClient {
    http: Client,
    base_url: Option<String>,
    timeout: Duration,
}

impl ChatClient {
    pub(crate) fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let base = base_url.into();
        Self {
            http: Client::new(),
            base_url: Some(base.trim_end_matches('/').to_string()),
            timeout,
        }
    }

    /// A client with no backend. Every call fails, which the pet turns into
    /// the fallback reply.
    pub(crate) fn offline() -> Self {
        Self {
            http: Client::new(),
            base_url: None,
            timeout: Duration::ZERO,
        }
    }

    pub(crate) async fn send(&self, req: &ChatRequest) -> Result<String, ChatError> {
        let base = self.base_url.as_deref().ok_or(ChatError::Offline)?;
        let url = format!("{base}/api/chat");
        debug!(history = req.history.len(), "POST {url}");

        let resp = self
            .http
            .post(&url)
            .json(req)
            .timeout(self.timeout)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            warn!("chat service returned {status}");
            return Err(ChatError::Status(status));
        }

        let reply: ChatReply = resp.json().await?;
        Ok(reply
            .response
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| EMPTY_REPLY.to_string()))
    }

    pub(crate) async fn status(&self) -> Result<ServiceStatus, ChatError> {
        let base = self.base_url.as_deref().ok_or(ChatError::Offline)?;
        let resp = self
            .http
            .get(format!("{base}/api/status"))
            .timeout(self.timeout)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(ChatError::Status(resp.status()));
        }
        Ok(resp.json().await?)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use proptest::prelude::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serves exactly one HTTP exchange and hands back the request body.
    pub(crate) async fn serve_once(
        status_line: &'static str,
        body: &'static str,
    ) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut raw = Vec::new();
            let mut buf = [0u8; 4096];
            let body_start = loop {
                let n = sock.read(&mut buf).await.unwrap();
                raw.extend_from_slice(&buf[..n]);
                if let Some(i) = raw.windows(4).position(|w| w == b"\r\n\r\n") {
                    break i + 4;
                }
                if n == 0 {
                    break raw.len();
                }
            };
            let head = String::from_utf8_lossy(&raw[..body_start]).to_lowercase();
            let want = head
                .lines()
                .find_map(|l| l.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            while raw.len() < body_start + want {
                let n = sock.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                raw.extend_from_slice(&buf[..n]);
            }
            let reply = format!(
                "{status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            sock.write_all(reply.as_bytes()).await.unwrap();
            sock.shutdown().await.ok();
            String::from_utf8_lossy(&raw[body_start..]).to_string()
        });
        (format!("http://{addr}"), handle)
    }

    #[test]
    fn history_keeps_latest_twenty_in_order() {
        let mut h = ChatHistory::default();
        for i in 0..25 {
            h.push(ChatRole::User, format!("m{i}"));
        }
        assert_eq!(h.len(), 20);
        let texts: Vec<_> = h.iter().map(|e| e.text.clone()).collect();
        let expected: Vec<_> = (5..25).map(|i| format!("m{i}")).collect();
        assert_eq!(texts, expected);
    }

    #[test]
    fn history_entries_use_type_field_on_the_wire() {
        let e = ChatEntry {
            role: ChatRole::Model,
            text: "hola".into(),
        };
        let v = serde_json::to_value(&e).unwrap();
        assert_eq!(v, serde_json::json!({ "type": "model", "text": "hola" }));
    }

    #[test]
    fn pet_bubble_replaces_previous_pet_bubble() {
        let mut b = BubbleBoard::default();
        b.say(Speaker::Pet, "uno", 0);
        b.say(Speaker::User, "hey", 10);
        b.say(Speaker::Pet, "dos", 20);
        let pets: Vec<_> = b.iter().filter(|x| x.speaker == Speaker::Pet).collect();
        assert_eq!(pets.len(), 1);
        assert_eq!(pets[0].text, "dos");
        assert_eq!(b.iter().count(), 2);
    }

    #[test]
    fn at_most_two_user_bubbles() {
        let mut b = BubbleBoard::default();
        for (i, t) in ["a", "b", "c"].iter().enumerate() {
            b.say(Speaker::User, *t, i as Millis);
        }
        let texts: Vec<_> = b.iter().map(|x| x.text.as_str()).collect();
        assert_eq!(texts, vec!["b", "c"]);
    }

    #[test]
    fn bubbles_fade_then_disappear() {
        let mut b = BubbleBoard::default();
        b.say(Speaker::User, "yo", 0);
        b.say(Speaker::Pet, "tu", 0);
        b.prune(USER_BUBBLE_MS);
        assert_eq!(b.iter().count(), 2);
        assert!(b.iter().find(|x| x.speaker == Speaker::User).unwrap().is_fading(USER_BUBBLE_MS));
        b.prune(USER_BUBBLE_MS + BUBBLE_FADE_MS);
        assert_eq!(b.iter().count(), 1);
        b.prune(PET_BUBBLE_MS + BUBBLE_FADE_MS);
        assert!(b.last_pet().is_none());
    }

    #[tokio::test]
    async fn offline_client_fails_without_network() {
        let c = ChatClient::offline();
        let req = ChatRequest {
            message: "hola".into(),
            history: vec![],
            stats: Stats::default(),
        };
        assert!(matches!(c.send(&req).await, Err(ChatError::Offline)));
    }

    #[tokio::test]
    async fn send_posts_message_history_and_stats() {
        let (url, server) = serve_once("HTTP/1.1 200 OK", r#"{"response":"¡Hola!"}"#).await;
        let c = ChatClient::new(url, Duration::from_secs(5));
        let req = ChatRequest {
            message: "hola".into(),
            history: vec![ChatEntry {
                role: ChatRole::User,
                text: "hola".into(),
            }],
            stats: Stats::default(),
        };
        let reply = c.send(&req).await.unwrap();
        assert_eq!(reply, "¡Hola!");

        let sent: serde_json::Value = serde_json::from_str(&server.await.unwrap()).unwrap();
        assert_eq!(sent["message"], "hola");
        assert_eq!(sent["history"][0]["type"], "user");
        assert_eq!(sent["stats"]["happiness"], 98.0);
    }

    #[tokio::test]
    async fn missing_response_field_becomes_ellipsis() {
        let (url, _server) = serve_once("HTTP/1.1 200 OK", "{}").await;
        let c = ChatClient::new(url, Duration::from_secs(5));
        let req = ChatRequest {
            message: "x".into(),
            history: vec![],
            stats: Stats::default(),
        };
        assert_eq!(c.send(&req).await.unwrap(), EMPTY_REPLY);
    }

    #[tokio::test]
    async fn error_status_is_reported() {
        let (url, _server) =
            serve_once("HTTP/1.1 503 Service Unavailable", r#"{"error":"API Key missing","fallback":true}"#)
                .await;
        let c = ChatClient::new(url, Duration::from_secs(5));
        let req = ChatRequest {
            message: "x".into(),
            history: vec![],
            stats: Stats::default(),
        };
        match c.send(&req).await {
            Err(ChatError::Status(s)) => assert_eq!(s, StatusCode::SERVICE_UNAVAILABLE),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn status_probe_reads_model() {
        let (url, _server) = serve_once(
            "HTTP/1.1 200 OK",
            r#"{"status":"online","model":"llama-3.3-70b-versatile","api_configured":true}"#,
        )
        .await;
        let c = ChatClient::new(url, Duration::from_secs(5));
        let st = c.status().await.unwrap();
        assert_eq!(st.status, "online");
        assert_eq!(st.model.as_deref(), Some("llama-3.3-70b-versatile"));
        assert!(st.api_configured);
    }

    proptest! {
        #[test]
        fn history_never_exceeds_capacity(n in 0usize..80) {
            let mut h = ChatHistory::default();
            for i in 0..n {
                let role = if i % 2 == 0 { ChatRole::User } else { ChatRole::Model };
                h.push(role, i.to_string());
            }
            prop_assert_eq!(h.len(), n.min(HISTORY_CAP));
            if n > 0 {
                prop_assert_eq!(h.iter().last().map(|e| e.text.clone()), Some((n - 1).to_string()));
                let first = n.saturating_sub(HISTORY_CAP);
                prop_assert_eq!(h.iter().next().map(|e| e.text.clone()), Some(first.to_string()));
            }
        }
    }
}
