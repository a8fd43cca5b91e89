//! Shared test doubles.

use std::collections::VecDeque;
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::client::{InvokeOptions, ModelInvoker, PromptPart};

/// Invoker that pops a pre-scripted response per call and records the first
/// text part of every prompt it sees.
pub(crate) struct ScriptedInvoker {
    responses: Mutex<VecDeque<Result<String, String>>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedInvoker {
    pub fn new(responses: Vec<Result<String, String>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Append a response to the end of the script.
    pub fn push_response(&self, response: Result<String, String>) {
        self.responses
            .lock()
            .unwrap()
            .push_back(response);
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    #[allow(dead_code)]
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelInvoker for ScriptedInvoker {
    async fn invoke(
        &self,
        parts: &[PromptPart],
        _model: &str,
        _opts: &InvokeOptions,
    ) -> Result<String> {
        let first_text = parts
            .iter()
            .find_map(|p| match p {
                PromptPart::Text(t) => Some(t.clone()),
                PromptPart::Inline { .. } => None,
            })
            .unwrap_or_default();
        self.calls.lock().unwrap().push(first_text);

        match self.responses.lock().unwrap().pop_front() {
            Some(Ok(response)) => Ok(response),
            Some(Err(message)) => Err(anyhow!(message)),
            None => Err(anyhow!("scripted invoker exhausted")),
        }
    }
}
