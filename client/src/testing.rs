// client/src/testing.rs
// Scripted transport for unit tests.
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

use crate::api::{HttpRequest, HttpResponse, HttpTransport};
use crate::error::{ClientError, Result};

type Responder = Box<dyn Fn(&HttpRequest) -> (u16, String) + Send + Sync>;

pub fn response(status: u16, body: &str) -> HttpResponse {
    HttpResponse {
        status,
        status_text: reqwest::StatusCode::from_u16(status)
            .ok()
            .and_then(|s| s.canonical_reason())
            .unwrap_or_default()
            .to_string(),
        body: body.to_string(),
    }
}

/// Answers queued responses in order, then falls back to the responder.
#[derive(Default)]
pub struct ScriptedTransport {
    queue: Mutex<VecDeque<HttpResponse>>,
    responder: Option<Responder>,
    sent: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_responder<F>(responder: F) -> Self
    where
        F: Fn(&HttpRequest) -> (u16, String) + Send + Sync + 'static,
    {
        Self {
            responder: Some(Box::new(responder)),
            ..Self::default()
        }
    }

    pub fn push(&self, status: u16, body: &str) {
        self.queue.lock().unwrap().push_back(response(status, body));
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.sent.lock().unwrap().clone()
    }

    pub fn count_path(&self, suffix: &str) -> usize {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.url.ends_with(suffix))
            .count()
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let queued = self.queue.lock().unwrap().pop_front();
        let reply = match queued {
            Some(reply) => reply,
            None => match &self.responder {
                Some(responder) => {
                    let (status, body) = responder(&request);
                    response(status, &body)
                }
                None => {
                    return Err(ClientError::Transport(format!("no scripted response for {}", request.url)))
                }
            },
        };
        self.sent.lock().unwrap().push(request);
        Ok(reply)
    }
}
