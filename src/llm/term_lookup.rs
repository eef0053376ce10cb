use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

use super::client::CompletionClient;
use crate::prompts::TERM_DESCRIPTION_PROMPT;
use crate::types::llm_data::{CompletionRequest, TermDescription};

pub const DEFAULT_TERM_CONCURRENCY: usize = 4;
pub const DEFAULT_MIN_REQUEST_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupOptions {
    /// Upper bound on calls in flight at once.
    pub concurrency: usize,
    /// Minimum spacing between the start of two calls.
    pub min_interval: Duration,
}

impl Default for LookupOptions {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_TERM_CONCURRENCY,
            min_interval: DEFAULT_MIN_REQUEST_INTERVAL,
        }
    }
}

/// Spaces out request starts across all workers.
struct Throttle {
    min_interval: Duration,
    next_start: Mutex<Option<Instant>>,
}

impl Throttle {
    fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            next_start: Mutex::new(None),
        }
    }

    fn wait(&self) {
        if self.min_interval.is_zero() {
            return;
        }
        let now = Instant::now();
        let start = {
            let mut next = self.next_start.lock().unwrap_or_else(|p| p.into_inner());
            let start = match *next {
                Some(reserved) if reserved > now => reserved,
                _ => now,
            };
            *next = Some(start + self.min_interval);
            start
        };
        if start > now {
            thread::sleep(start - now);
        }
    }
}

/// Asks for a short description of every term.
///
/// The returned list follows `terms` order no matter which call finishes
/// first. A failed call only marks its own entry.
pub fn describe_terms(
    client: &dyn CompletionClient,
    terms: &[String],
    options: &LookupOptions,
) -> Vec<TermDescription> {
    if terms.is_empty() {
        return Vec::new();
    }

    let workers = options.concurrency.clamp(1, terms.len());
    let next = &AtomicUsize::new(0);
    let throttle = &Throttle::new(options.min_interval);
    let mut slots: Vec<Option<TermDescription>> = vec![None; terms.len()];

    tracing::info!(terms = terms.len(), workers, "looking up term descriptions");

    thread::scope(|scope| {
        let handles: Vec<_> = (0..workers)
            .map(|_| {
                scope.spawn(move || {
                    let mut done = Vec::new();
                    loop {
                        let idx = next.fetch_add(1, Ordering::Relaxed);
                        let Some(term) = terms.get(idx) else { break };
                        throttle.wait();
                        done.push((idx, describe_one(client, term)));
                    }
                    done
                })
            })
            .collect();

        for handle in handles {
            match handle.join() {
                Ok(done) => {
                    for (idx, description) in done {
                        slots[idx] = Some(description);
                    }
                }
                Err(_) => tracing::error!("term lookup worker panicked"),
            }
        }
    });

    slots
        .into_iter()
        .zip(terms)
        .map(|(slot, term)| {
            slot.unwrap_or_else(|| TermDescription {
                term: term.clone(),
                outcome: Err("lookup did not complete".to_string()),
            })
        })
        .collect()
}

fn describe_one(client: &dyn CompletionClient, term: &str) -> TermDescription {
    let request = CompletionRequest::new(TERM_DESCRIPTION_PROMPT, term);
    let outcome = match client.complete(&request) {
        Ok(payload) => Ok(payload.text.trim().to_string()),
        Err(e) => {
            tracing::warn!(term, error = %e, "term description failed");
            Err(e.to_string())
        }
    };
    TermDescription {
        term: term.to_string(),
        outcome,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::client::TransportError;
    use crate::llm::scripted::ScriptedCompletionClient;
    use crate::types::llm_data::RawCompletionPayload;

    fn terms(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn fast() -> LookupOptions {
        LookupOptions {
            concurrency: 4,
            min_interval: Duration::ZERO,
        }
    }

    /// Earlier terms answer more slowly, so completion order is reversed.
    struct SlowFirstClient;

    impl CompletionClient for SlowFirstClient {
        fn complete(
            &self,
            request: &CompletionRequest,
        ) -> Result<RawCompletionPayload, TransportError> {
            let delay = match request.user_input.as_str() {
                "Alpha" => 60,
                "Beta" => 40,
                "Gamma" => 20,
                _ => 0,
            };
            thread::sleep(Duration::from_millis(delay));
            Ok(RawCompletionPayload::new(format!(
                "  about {}\n",
                request.user_input
            )))
        }
    }

    #[test]
    fn results_follow_input_order() {
        let input = terms(&["Alpha", "Beta", "Gamma", "Delta"]);
        let results = describe_terms(&SlowFirstClient, &input, &fast());

        let names: Vec<_> = results.iter().map(|d| d.term.as_str()).collect();
        assert_eq!(names, vec!["Alpha", "Beta", "Gamma", "Delta"]);
        assert_eq!(results[0].outcome, Ok("about Alpha".to_string()));
        assert_eq!(results[3].outcome, Ok("about Delta".to_string()));
    }

    #[test]
    fn one_failure_does_not_stop_the_rest() {
        let client = ScriptedCompletionClient::new()
            .reply_to("Japan", "An island country.")
            .fail_on("Is", TransportError::RateLimited)
            .reply_to("Tokyo", "Capital of Japan.");
        let input = terms(&["Is", "Japan", "Tokyo"]);

        let results = describe_terms(&client, &input, &fast());

        assert_eq!(client.call_count(), 3);
        assert_eq!(
            results[0].outcome,
            Err("rate limited by the completion service".to_string())
        );
        assert_eq!(results[1].outcome, Ok("An island country.".to_string()));
        assert_eq!(results[2].outcome, Ok("Capital of Japan.".to_string()));
    }

    #[test]
    fn sequential_lookup_calls_in_term_order() {
        let client = ScriptedCompletionClient::new().then_reply("desc");
        let input = terms(&["One", "Two"]);
        let sequential = LookupOptions {
            concurrency: 1,
            min_interval: Duration::ZERO,
        };

        describe_terms(&client, &input, &sequential);

        assert_eq!(client.user_inputs(), vec!["One", "Two"]);
    }

    #[test]
    fn throttle_spaces_request_starts() {
        let client = ScriptedCompletionClient::new().then_reply("desc");
        let input = terms(&["A", "B", "C", "D"]);
        let throttled = LookupOptions {
            concurrency: 4,
            min_interval: Duration::from_millis(20),
        };

        let started = Instant::now();
        describe_terms(&client, &input, &throttled);

        assert!(started.elapsed() >= Duration::from_millis(60));
    }

    #[test]
    fn no_terms_means_no_calls() {
        let client = ScriptedCompletionClient::new();
        assert!(describe_terms(&client, &[], &LookupOptions::default()).is_empty());
        assert_eq!(client.call_count(), 0);
    }

    #[test]
    fn zero_concurrency_still_runs_one_worker() {
        let client = ScriptedCompletionClient::new().then_reply("desc");
        let options = LookupOptions {
            concurrency: 0,
            min_interval: Duration::ZERO,
        };
        let results = describe_terms(&client, &terms(&["Solo"]), &options);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].outcome, Ok("desc".to_string()));
    }
}
