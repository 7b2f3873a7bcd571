//! Test utilities for generation clients.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::error::{GenerateError, Result};
use crate::{Generation, GenerationClient, GenerationRequest, with_timeout};

/// One scripted backend response
#[derive(Debug, Clone)]
pub enum Step {
    /// Answer immediately
    Reply(String),
    /// Answer after a delay
    ReplyAfter(Duration, String),
    /// Fail with the given error
    Fail(GenerateError),
    /// Never answer; the caller's timeout fires
    Hang,
}

/// Backend double that plays back scripted responses and counts calls.
///
/// Steps are consumed in order. Requests whose user message has its own
/// script (see [`ScriptedClient::script_for`]) draw from that script
/// instead of the shared one. When a script runs out the fallback reply is
/// used, or a backend error if there is none.
#[derive(Debug, Default)]
pub struct ScriptedClient {
    shared: Mutex<VecDeque<Step>>,
    by_user: Mutex<HashMap<String, VecDeque<Step>>>,
    fallback: Option<String>,
    calls: AtomicUsize,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedClient {
    /// Always replies with `text`
    pub fn replying(text: impl Into<String>) -> Self {
        Self {
            fallback: Some(text.into()),
            ..Self::default()
        }
    }

    /// Plays `steps` in order, then fails
    pub fn with_script(steps: impl IntoIterator<Item = Step>) -> Self {
        Self {
            shared: Mutex::new(steps.into_iter().collect()),
            ..Self::default()
        }
    }

    /// Gives requests with this exact user message their own script
    pub fn script_for(self, user: impl Into<String>, steps: impl IntoIterator<Item = Step>) -> Self {
        self.by_user
            .lock()
            .unwrap()
            .insert(user.into(), steps.into_iter().collect());
        self
    }

    /// Sets the reply used once a script is exhausted
    pub fn with_fallback(mut self, text: impl Into<String>) -> Self {
        self.fallback = Some(text.into());
        self
    }

    /// Number of `generate` calls so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every request received, in arrival order
    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn next_step(&self, request: &GenerationRequest) -> Option<Step> {
        let mut by_user = self.by_user.lock().unwrap();
        if let Some(script) = by_user.get_mut(&request.user) {
            return script.pop_front();
        }
        drop(by_user);
        self.shared.lock().unwrap().pop_front()
    }
}

#[async_trait]
impl GenerationClient for ScriptedClient {
    async fn generate(&self, request: &GenerationRequest, timeout: Duration) -> Result<Generation> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());

        let step = self.next_step(request);
        let fallback = self.fallback.clone();

        with_timeout(timeout, async move {
            let text = match step {
                Some(Step::Reply(text)) => text,
                Some(Step::ReplyAfter(delay, text)) => {
                    tokio::time::sleep(delay).await;
                    text
                }
                Some(Step::Fail(error)) => return Err(error),
                Some(Step::Hang) => std::future::pending().await,
                None => fallback.ok_or_else(|| GenerateError::backend("script exhausted"))?,
            };

            Ok(Generation { text, usage: None })
        })
        .await
    }
}
