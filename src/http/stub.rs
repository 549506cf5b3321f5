//! Scripted gateway for unit tests

use super::gateway::{Gateway, GatewayRequest};
use crate::error::{Error, Result};
use crate::types::{JsonValue, Method};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

/// A call observed by [`StubGateway`]
#[derive(Debug, Clone)]
pub(crate) struct RecordedCall {
    pub method: Method,
    pub path: String,
    pub request: GatewayRequest,
}

/// Replays queued responses in order and records every call
#[derive(Default)]
pub(crate) struct StubGateway {
    script: Mutex<VecDeque<Result<JsonValue>>>,
    calls: Mutex<Vec<RecordedCall>>,
    delay: Option<Duration>,
}

impl StubGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold every call for `delay` before answering
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn respond(&self, body: JsonValue) -> &Self {
        self.script.lock().unwrap().push_back(Ok(body));
        self
    }

    pub fn fail(&self, error: Error) -> &Self {
        self.script.lock().unwrap().push_back(Err(error));
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Gateway for StubGateway {
    async fn call(
        &self,
        method: Method,
        path: &str,
        request: GatewayRequest,
    ) -> Result<JsonValue> {
        self.calls.lock().unwrap().push(RecordedCall {
            method,
            path: path.to_string(),
            request,
        });

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Error::Other(format!("no scripted response for {path}"))))
    }
}
