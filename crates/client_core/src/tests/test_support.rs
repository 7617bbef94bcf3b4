use std::{collections::VecDeque, sync::Mutex};

use async_trait::async_trait;
use serde_json::Value;

use crate::{error::Result, Transport};

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Call {
    pub method: &'static str,
    pub path: String,
    pub body: Option<Value>,
    pub content_type: Option<String>,
    pub params: Vec<(String, String)>,
}

/// Transport double that records every call and answers from a queue.
/// An empty queue answers `null`.
#[derive(Default)]
pub(crate) struct FakeTransport {
    calls: Mutex<Vec<Call>>,
    answers: Mutex<VecDeque<Result<Value>>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn answer(self, value: Value) -> Self {
        self.answers.lock().expect("answers lock").push_back(Ok(value));
        self
    }

    pub fn fail(self, err: crate::DspError) -> Self {
        self.answers.lock().expect("answers lock").push_back(Err(err));
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().expect("calls lock").clone()
    }

    fn next(&self, call: Call) -> Result<Value> {
        self.calls.lock().expect("calls lock").push(call);
        self.answers
            .lock()
            .expect("answers lock")
            .pop_front()
            .unwrap_or(Ok(Value::Null))
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn get(&self, path: &str) -> Result<Value> {
        self.next(Call {
            method: "GET",
            path: path.to_string(),
            body: None,
            content_type: None,
            params: Vec::new(),
        })
    }

    async fn post(&self, path: &str, body: Option<&Value>) -> Result<Value> {
        self.next(Call {
            method: "POST",
            path: path.to_string(),
            body: body.cloned(),
            content_type: None,
            params: Vec::new(),
        })
    }

    async fn put(
        &self,
        path: &str,
        body: Option<&Value>,
        content_type: Option<&str>,
    ) -> Result<Value> {
        self.next(Call {
            method: "PUT",
            path: path.to_string(),
            body: body.cloned(),
            content_type: content_type.map(str::to_string),
            params: Vec::new(),
        })
    }

    async fn delete(&self, path: &str, params: &[(&str, String)]) -> Result<Value> {
        self.next(Call {
            method: "DELETE",
            path: path.to_string(),
            body: None,
            content_type: None,
            params: params
                .iter()
                .map(|(key, value)| (key.to_string(), value.clone()))
                .collect(),
        })
    }
}
