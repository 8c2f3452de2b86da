//! Scripted transport for tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use reqwest::Url;
use serde_json::Value;
use tokio::sync::Semaphore;

use super::{ApiError, HttpResponse, Transport};

#[derive(Debug, Clone)]
pub(crate) struct FakeRequest {
    pub method: &'static str,
    pub url: Url,
    pub body: Option<String>,
}

impl FakeRequest {
    pub fn param(&self, name: &str) -> Option<String> {
        self.url
            .query_pairs()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.into_owned())
    }

    pub fn json_body(&self) -> Value {
        serde_json::from_str(self.body.as_deref().unwrap_or("null")).unwrap()
    }
}

type Handler = Box<dyn Fn(&FakeRequest) -> HttpResponse + Send + Sync>;

pub(crate) struct FakeTransport {
    handler: Handler,
    requests: Mutex<Vec<FakeRequest>>,
    gate: Option<Arc<Semaphore>>,
}

impl FakeTransport {
    pub fn new(handler: impl Fn(&FakeRequest) -> HttpResponse + Send + Sync + 'static) -> Self {
        Self {
            handler: Box::new(handler),
            requests: Mutex::new(Vec::new()),
            gate: None,
        }
    }

    /// Hold every response until a permit is added to the returned semaphore.
    pub fn gated(mut self) -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        self.gate = Some(gate.clone());
        (self, gate)
    }

    pub fn requests(&self) -> Vec<FakeRequest> {
        self.requests.lock().unwrap().clone()
    }

    async fn respond(&self, request: FakeRequest) -> Result<HttpResponse, ApiError> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(gate) = &self.gate {
            gate.acquire().await.expect("gate closed").forget();
        }
        Ok((self.handler)(&request))
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn get(&self, url: Url) -> Result<HttpResponse, ApiError> {
        self.respond(FakeRequest {
            method: "GET",
            url,
            body: None,
        })
        .await
    }

    async fn post_text(&self, url: Url, body: String) -> Result<HttpResponse, ApiError> {
        self.respond(FakeRequest {
            method: "POST",
            url,
            body: Some(body),
        })
        .await
    }
}

pub(crate) fn ok_json(value: Value) -> HttpResponse {
    HttpResponse {
        status: 200,
        body: value.to_string(),
    }
}

pub(crate) fn status(code: u16) -> HttpResponse {
    HttpResponse {
        status: code,
        body: "Service Unavailable".to_string(),
    }
}
