/// Debounced, cancellation-safe query coordinator.
///
/// One `QueryChannel` per live-search use site (global search, duplicate
/// detection, chat). Each submission restarts the channel's debounce window
/// and stamps a monotonically increasing sequence number; results arriving
/// for anything but the newest sequence are dropped, so overlapping calls
/// can never commit out of order no matter how service latency interleaves.
///
/// Cancellation is best-effort: aborting the pending task stops us listening
/// for the result, it does not abort the remote call. The sequence check is
/// the authoritative filter either way.
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::errors::QueryError;
use crate::store::SearchResult;

// ── Policy ────────────────────────────────────────────────────────────────────

/// Per-channel tuning. The three call sites differ only by configuration,
/// never by code path.
#[derive(Debug, Clone, Copy)]
pub struct ChannelPolicy {
    /// Name used in trace output.
    pub name: &'static str,
    /// Quiet period between the last submission and the collaborator call.
    pub debounce: Duration,
    /// Queries shorter than this clear existing results instead of firing.
    pub min_len: usize,
}

impl ChannelPolicy {
    pub const SEARCH: Self = Self {
        name: "search",
        debounce: Duration::from_millis(300),
        min_len: 3,
    };

    pub const DUPLICATES: Self = Self {
        name: "duplicates",
        debounce: Duration::from_millis(500),
        min_len: 5,
    };

    /// Chat fires immediately but still obeys the single-in-flight discard
    /// rule, so a rapid double-submit cannot show an out-of-order answer.
    pub const CHAT: Self = Self {
        name: "chat",
        debounce: Duration::ZERO,
        min_len: 1,
    };
}

/// Relevance floor for duplicate detection; results below it are noise.
pub const DUPLICATE_MIN_SCORE: f64 = 0.5;

// ── Outcomes ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Payload<T> {
    Results(T),
    /// The query fell below the channel's minimum length — existing results
    /// should be dropped without a collaborator call.
    Cleared,
    /// Collaborator failure. Distinct from zero results so the UI can show
    /// "service unreachable" rather than "no matches".
    Error(QueryError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Outcome<T> {
    pub seq: u64,
    pub payload: Payload<T>,
}

// ── Channel ───────────────────────────────────────────────────────────────────

pub struct QueryChannel<T> {
    policy: ChannelPolicy,
    /// Highest sequence number issued. Shared with in-flight tasks so they
    /// can detect supersession before delivering.
    issued: Arc<AtomicU64>,
    /// Highest sequence number committed to UI state.
    accepted: u64,
    pending: Option<JoinHandle<()>>,
    tx: UnboundedSender<Outcome<T>>,
}

impl<T: Send + 'static> QueryChannel<T> {
    pub fn new(policy: ChannelPolicy) -> (Self, UnboundedReceiver<Outcome<T>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                policy,
                issued: Arc::new(AtomicU64::new(0)),
                accepted: 0,
                pending: None,
                tx,
            },
            rx,
        )
    }

    /// Submit a query. `query_len` is the trigger-length of the input text;
    /// `call` performs the collaborator request once the debounce window
    /// elapses. Any previously pending submission on this channel is
    /// superseded immediately.
    pub fn submit<F>(&mut self, query_len: usize, call: F)
    where
        F: Future<Output = Result<T, QueryError>> + Send + 'static,
    {
        if let Some(task) = self.pending.take() {
            task.abort();
        }
        // Stamp before the length check: a short query also supersedes any
        // in-flight request, so its late result cannot resurface.
        let seq = self.issued.fetch_add(1, Ordering::SeqCst) + 1;

        if query_len < self.policy.min_len {
            trace!(channel = self.policy.name, seq, "below minimum length, clearing");
            let _ = self.tx.send(Outcome { seq, payload: Payload::Cleared });
            return;
        }

        debug!(channel = self.policy.name, seq, "submitting after debounce");
        let issued = Arc::clone(&self.issued);
        let tx = self.tx.clone();
        let debounce = self.policy.debounce;
        let name = self.policy.name;
        self.pending = Some(tokio::spawn(async move {
            if !debounce.is_zero() {
                tokio::time::sleep(debounce).await;
            }
            let result = call.await;
            // Superseded while in flight — discard results and errors alike
            if issued.load(Ordering::SeqCst) != seq {
                trace!(channel = name, seq, "stale result discarded");
                return;
            }
            let payload = match result {
                Ok(value) => Payload::Results(value),
                Err(e) => Payload::Error(e),
            };
            let _ = tx.send(Outcome { seq, payload });
        }));
    }

    /// Gate on the receiving side: true iff this outcome belongs to the
    /// newest issued request and advances the accepted watermark. Result
    /// application is monotonic in sequence number per channel.
    pub fn accept(&mut self, seq: u64) -> bool {
        if seq == self.issued.load(Ordering::SeqCst) && seq > self.accepted {
            self.accepted = seq;
            true
        } else {
            trace!(channel = self.policy.name, seq, "rejected stale outcome");
            false
        }
    }

    /// Drop interest in whatever is in flight. Idempotent; canceling an
    /// already-completed or already-canceled request is a no-op.
    pub fn cancel(&mut self) {
        if let Some(task) = self.pending.take() {
            task.abort();
        }
        self.issued.fetch_add(1, Ordering::SeqCst);
    }
}

// ── Result filtering (duplicate detection) ────────────────────────────────────

/// Duplicate detection accepts only results above a relevance floor and
/// never surfaces the record currently being edited as its own duplicate.
pub fn filter_results(
    results: Vec<SearchResult>,
    min_score: f64,
    exclude_id: Option<&str>,
) -> Vec<SearchResult> {
    results
        .into_iter()
        .filter(|r| r.score >= min_score)
        .filter(|r| exclude_id != Some(r.snippet.id.as_str()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SnippetSummary;

    fn summary(id: &str) -> SnippetSummary {
        SnippetSummary {
            id: id.to_string(),
            title: format!("snippet {id}"),
            problem: String::new(),
            code_language: None,
            code_preview: None,
            tags: vec![],
            created_at: String::new(),
            is_favorite: false,
            is_deleted: false,
            deleted_at: None,
            last_accessed_at: None,
        }
    }

    fn result(id: &str, score: f64) -> SearchResult {
        SearchResult { snippet: summary(id), score }
    }

    /// Drain one outcome, panicking if none is ready.
    async fn recv<T>(rx: &mut UnboundedReceiver<Outcome<T>>) -> Outcome<T> {
        rx.recv().await.expect("channel closed")
    }

    #[tokio::test(start_paused = true)]
    async fn short_query_clears_without_calling_collaborator() {
        let (mut ch, mut rx) = QueryChannel::<Vec<String>>::new(ChannelPolicy::SEARCH);

        // "ab" is below the 3-char minimum — the collaborator must not run
        ch.submit(2, async {
            panic!("collaborator called for sub-threshold query");
            #[allow(unreachable_code)]
            Ok(vec![])
        });

        let out = recv(&mut rx).await;
        assert_eq!(out.payload, Payload::Cleared);
        assert!(ch.accept(out.seq));
    }

    #[tokio::test(start_paused = true)]
    async fn query_fires_once_after_debounce_window() {
        let (mut ch, mut rx) = QueryChannel::new(ChannelPolicy::SEARCH);

        ch.submit(3, async { Ok("abc-results".to_string()) });

        // Nothing before the window elapses
        tokio::task::yield_now().await;
        assert!(rx.try_recv().is_err());

        tokio::time::sleep(Duration::from_millis(301)).await;
        let out = recv(&mut rx).await;
        assert!(ch.accept(out.seq));
        assert_eq!(out.payload, Payload::Results("abc-results".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn resubmission_restarts_the_debounce_window() {
        let (mut ch, mut rx) = QueryChannel::new(ChannelPolicy::SEARCH);

        ch.submit(3, async { Ok("first") });
        tokio::time::sleep(Duration::from_millis(200)).await;
        ch.submit(4, async { Ok("second") });

        // 200ms + 150ms: past the first deadline, inside the restarted one
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(rx.try_recv().is_err());

        tokio::time::sleep(Duration::from_millis(200)).await;
        let out = recv(&mut rx).await;
        assert!(ch.accept(out.seq));
        assert_eq!(out.payload, Payload::Results("second"));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn overlapping_submits_deliver_only_the_later_result() {
        // Chat semantics: no debounce, but "A" resolving after "B" must not
        // surface. "A" sleeps past "B"'s completion to force the reorder.
        let (mut ch, mut rx) = QueryChannel::new(ChannelPolicy::CHAT);

        ch.submit(1, async {
            tokio::time::sleep(Duration::from_millis(500)).await;
            Ok("answer A")
        });
        ch.submit(1, async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok("answer B")
        });

        tokio::time::sleep(Duration::from_millis(600)).await;
        let out = recv(&mut rx).await;
        assert!(ch.accept(out.seq));
        assert_eq!(out.payload, Payload::Results("answer B"));

        // Nothing else arrives — A was superseded
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn stale_error_is_discarded_too() {
        let (mut ch, mut rx) = QueryChannel::new(ChannelPolicy::CHAT);

        ch.submit(1, async {
            tokio::time::sleep(Duration::from_millis(300)).await;
            Err::<&str, _>(QueryError::Unreachable)
        });
        ch.submit(1, async { Ok("fresh") });

        tokio::time::sleep(Duration::from_millis(400)).await;
        let out = recv(&mut rx).await;
        assert_eq!(out.payload, Payload::Results("fresh"));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn error_on_current_request_is_delivered() {
        let (mut ch, mut rx) = QueryChannel::new(ChannelPolicy::CHAT);

        ch.submit(1, async { Err::<(), _>(QueryError::Unreachable) });
        let out = recv(&mut rx).await;
        assert!(ch.accept(out.seq));
        assert_eq!(out.payload, Payload::Error(QueryError::Unreachable));
    }

    #[tokio::test(start_paused = true)]
    async fn accept_is_monotonic_per_channel() {
        let (mut ch, mut rx) = QueryChannel::new(ChannelPolicy::CHAT);

        ch.submit(1, async { Ok(1u32) });
        let first = recv(&mut rx).await;
        assert!(ch.accept(first.seq));
        // Double-accepting the same sequence is refused
        assert!(!ch.accept(first.seq));

        ch.submit(1, async { Ok(2u32) });
        let second = recv(&mut rx).await;
        assert!(second.seq > first.seq);
        assert!(ch.accept(second.seq));
    }

    #[tokio::test(start_paused = true)]
    async fn already_queued_result_is_rejected_once_superseded() {
        // "A" completes and its outcome sits in the queue before "B" is
        // submitted — the accept gate must still refuse it.
        let (mut ch, mut rx) = QueryChannel::new(ChannelPolicy::CHAT);

        ch.submit(1, async { Ok("A") });
        tokio::time::sleep(Duration::from_millis(1)).await; // let A's task deliver
        ch.submit(1, async { Ok("B") });
        tokio::time::sleep(Duration::from_millis(1)).await;

        let a = recv(&mut rx).await;
        assert_eq!(a.payload, Payload::Results("A"));
        assert!(!ch.accept(a.seq), "superseded outcome must not be committed");

        let b = recv(&mut rx).await;
        assert!(ch.accept(b.seq));
        assert_eq!(b.payload, Payload::Results("B"));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_is_idempotent_and_supersedes_in_flight_work() {
        let (mut ch, mut rx) = QueryChannel::new(ChannelPolicy::CHAT);

        ch.submit(1, async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            Ok("late")
        });
        ch.cancel();
        ch.cancel(); // no-op

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn short_query_supersedes_in_flight_request() {
        let (mut ch, mut rx) = QueryChannel::new(ChannelPolicy::SEARCH);

        ch.submit(5, async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok("stale results")
        });
        tokio::time::sleep(Duration::from_millis(310)).await; // call now in flight
        ch.submit(1, async { Ok("unused") }); // user deleted back to 1 char

        tokio::time::sleep(Duration::from_millis(500)).await;
        let out = recv(&mut rx).await;
        assert_eq!(out.payload, Payload::Cleared);
        assert!(ch.accept(out.seq));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn duplicate_filter_drops_low_scores_and_own_record() {
        let results = vec![result("a", 0.9), result("b", 0.3), result("self", 0.95)];
        let kept = filter_results(results, DUPLICATE_MIN_SCORE, Some("self"));
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].snippet.id, "a");
    }

    #[test]
    fn duplicate_filter_without_exclusion_keeps_all_above_threshold() {
        let results = vec![result("a", 0.9), result("b", 0.5)];
        let kept = filter_results(results, DUPLICATE_MIN_SCORE, None);
        assert_eq!(kept.len(), 2);
    }
}
