use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use super::client::{CompletionClient, TransportError};
use crate::types::llm_data::{CompletionRequest, RawCompletionPayload};

/// Deterministic client for tests and offline runs.
///
/// Replies registered for a specific user input take precedence; anything
/// else is served from the queue in order. The last queued reply repeats.
#[derive(Default)]
pub struct ScriptedCompletionClient {
    by_input: HashMap<String, Result<String, TransportError>>,
    queue: Mutex<VecDeque<Result<String, TransportError>>>,
    calls: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedCompletionClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply_to(mut self, user_input: &str, text: &str) -> Self {
        self.by_input.insert(user_input.to_string(), Ok(text.to_string()));
        self
    }

    pub fn fail_on(mut self, user_input: &str, error: TransportError) -> Self {
        self.by_input.insert(user_input.to_string(), Err(error));
        self
    }

    pub fn then_reply(self, text: &str) -> Self {
        self.queue_lock().push_back(Ok(text.to_string()));
        self
    }

    pub fn then_fail(self, error: TransportError) -> Self {
        self.queue_lock().push_back(Err(error));
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls_lock().len()
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.calls_lock().clone()
    }

    /// User inputs of every call made so far, in call order.
    pub fn user_inputs(&self) -> Vec<String> {
        self.calls_lock().iter().map(|c| c.user_input.clone()).collect()
    }

    fn queue_lock(&self) -> std::sync::MutexGuard<'_, VecDeque<Result<String, TransportError>>> {
        self.queue.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn calls_lock(&self) -> std::sync::MutexGuard<'_, Vec<CompletionRequest>> {
        self.calls.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl CompletionClient for ScriptedCompletionClient {
    fn complete(&self, request: &CompletionRequest) -> Result<RawCompletionPayload, TransportError> {
        self.calls_lock().push(request.clone());

        let reply = match self.by_input.get(&request.user_input) {
            Some(reply) => reply.clone(),
            None => {
                let mut queue = self.queue_lock();
                match queue.len() {
                    0 => Err(TransportError::EmptyResponse),
                    1 => queue[0].clone(),
                    _ => queue.pop_front().unwrap_or(Err(TransportError::EmptyResponse)),
                }
            }
        };
        reply.map(RawCompletionPayload::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(input: &str) -> CompletionRequest {
        CompletionRequest::new("system", input)
    }

    #[test]
    fn keyed_replies_win_over_queue() {
        let client = ScriptedCompletionClient::new()
            .reply_to("Rust", "a language")
            .then_reply("queued");

        assert_eq!(client.complete(&request("Rust")).unwrap().text, "a language");
        assert_eq!(client.complete(&request("other")).unwrap().text, "queued");
        assert_eq!(client.call_count(), 2);
    }

    #[test]
    fn queue_pops_then_repeats_last() {
        let client = ScriptedCompletionClient::new()
            .then_reply("first")
            .then_fail(TransportError::RateLimited);

        assert_eq!(client.complete(&request("a")).unwrap().text, "first");
        assert_eq!(client.complete(&request("b")), Err(TransportError::RateLimited));
        assert_eq!(client.complete(&request("c")), Err(TransportError::RateLimited));
        assert_eq!(client.user_inputs(), vec!["a", "b", "c"]);
    }

    #[test]
    fn empty_script_reports_empty_response() {
        let client = ScriptedCompletionClient::new();
        assert_eq!(client.complete(&request("x")), Err(TransportError::EmptyResponse));
    }
}
