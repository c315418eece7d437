//! Fetch, parse and persist, with bounded retries.
//!
//! One [`SyncOrchestrator`] runs at most one pass at a time. A call to
//! [`SyncOrchestrator::synchronize`] while a pass is in flight returns
//! [`SyncOutcome::AlreadyRunning`] immediately; the running pass writes to
//! the same book, so the caller gets its rates anyway.
//!
//! Transient fetch faults (timeouts, I/O, 5xx) are retried after a fixed
//! delay up to the policy ceiling. Anything else fails the pass at once.
//! Cancellation, from [`cancel`](SyncOrchestrator::cancel) or
//! [`shutdown`](SyncOrchestrator::shutdown), interrupts both a fetch and a
//! retry delay, and drops the request with its connection.

mod sleeper;
mod state;

pub use sleeper::{RetryPolicy, Sleeper, TokioSleeper};
pub use state::{SyncOutcome, SyncReport, SyncState};

use crate::core::book::RateBook;
use crate::core::currency::CurrencyCode;
use crate::error::{FetchError, StoreError, SyncError};
use crate::providers::fetcher::RateFetcher;
use crate::providers::request::RateQuery;
use crate::providers::wire::{decoder_for, parse_pairs};
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

pub struct SyncOrchestrator<F, B> {
    fetcher: F,
    book: Arc<Mutex<B>>,
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
    staleness: Duration,
    in_flight: AtomicBool,
    state: watch::Sender<SyncState>,
    shutdown: CancellationToken,
    current_pass: Mutex<Option<CancellationToken>>,
    last_success: Mutex<Option<DateTime<Utc>>>,
}

// Clears the in-flight markers however the pass ends.
struct PassGuard<'a> {
    in_flight: &'a AtomicBool,
    current_pass: &'a Mutex<Option<CancellationToken>>,
}

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut current) = self.current_pass.lock() {
            *current = None;
        }
        self.in_flight.store(false, Ordering::Release);
    }
}

impl<F, B> SyncOrchestrator<F, B>
where
    F: RateFetcher,
    B: RateBook + Send + 'static,
{
    pub fn new(fetcher: F, book: B, policy: RetryPolicy) -> Self {
        Self::with_shared_book(fetcher, Arc::new(Mutex::new(book)), policy)
    }

    pub fn with_shared_book(fetcher: F, book: Arc<Mutex<B>>, policy: RetryPolicy) -> Self {
        let (state, _) = watch::channel(SyncState::Idle);
        Self {
            fetcher,
            book,
            policy,
            sleeper: Arc::new(TokioSleeper),
            staleness: Duration::from_secs(24 * 60 * 60),
            in_flight: AtomicBool::new(false),
            state,
            shutdown: CancellationToken::new(),
            current_pass: Mutex::new(None),
            last_success: Mutex::new(None),
        }
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn with_staleness(mut self, staleness: Duration) -> Self {
        self.staleness = staleness;
        self
    }

    /// The book passes write into, shared with readers.
    pub fn book(&self) -> Arc<Mutex<B>> {
        Arc::clone(&self.book)
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    pub fn subscribe(&self) -> watch::Receiver<SyncState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> SyncState {
        self.state.borrow().clone()
    }

    pub fn is_syncing(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Completion time of the last successful pass, from this orchestrator
    /// or as recorded by the book in an earlier run.
    pub fn last_success(&self) -> Option<DateTime<Utc>> {
        if let Ok(last) = self.last_success.lock()
            && last.is_some()
        {
            return *last;
        }
        self.lock_book()
            .ok()
            .and_then(|book| book.last_sync().ok().flatten())
    }

    /// Whether cached rates are older than the staleness interval at `now`.
    /// Rates that were never synchronized are stale.
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        match self.last_success() {
            Some(last) => now
                .signed_duration_since(last)
                .to_std()
                .map_or(false, |age| age >= self.staleness),
            None => true,
        }
    }

    /// Aborts the pass in flight, if any. It ends as a failure.
    pub fn cancel(&self) {
        if let Ok(current) = self.current_pass.lock()
            && let Some(token) = current.as_ref()
        {
            debug!("Cancelling synchronization pass");
            token.cancel();
        }
    }

    /// Aborts the pass in flight and every later one.
    pub fn shutdown(&self) {
        info!("Shutting down synchronization");
        self.shutdown.cancel();
    }

    fn set_state(&self, state: SyncState) {
        debug!(?state, "Sync state");
        self.state.send_replace(state);
    }

    fn lock_book(&self) -> Result<MutexGuard<'_, B>, StoreError> {
        self.book
            .lock()
            .map_err(|_| StoreError::Unavailable("rate book lock poisoned".to_string()))
    }

    /// Runs one synchronization pass for `codes`.
    #[instrument(name = "Synchronize", skip(self, codes), fields(currencies = codes.len()))]
    pub async fn synchronize(&self, codes: &[CurrencyCode]) -> SyncOutcome {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Synchronization already in flight, ignoring request");
            return SyncOutcome::AlreadyRunning;
        }

        let token = self.shutdown.child_token();
        if let Ok(mut current) = self.current_pass.lock() {
            *current = Some(token.clone());
        }
        let _guard = PassGuard {
            in_flight: &self.in_flight,
            current_pass: &self.current_pass,
        };

        match self.run_pass(codes, &token).await {
            Ok(report) => {
                info!(
                    pairs = report.pairs_stored,
                    attempts = report.attempts,
                    "Synchronization succeeded"
                );
                self.set_state(SyncState::Done { succeeded: true });
                SyncOutcome::Success(report)
            }
            Err(e) => {
                warn!(error = %e, "Synchronization failed");
                self.set_state(SyncState::Done { succeeded: false });
                SyncOutcome::Failure(e)
            }
        }
    }

    async fn run_pass(
        &self,
        codes: &[CurrencyCode],
        token: &CancellationToken,
    ) -> Result<SyncReport, SyncError> {
        let query = RateQuery::for_currencies(codes);
        if query.is_empty() {
            return Err(SyncError::NothingToRequest);
        }

        let (body, attempts) = self.fetch_with_retry(&query, token).await?;

        self.set_state(SyncState::Parsing);
        let with_reciprocals = self.lock_book()?.wants_reciprocals();
        let decoder = decoder_for(self.fetcher.format());
        let pairs = parse_pairs(decoder.as_ref(), &body, with_reciprocals)?;
        drop(body);

        if token.is_cancelled() {
            return Err(SyncError::Cancelled);
        }

        self.set_state(SyncState::Persisting);
        let completed_at = Utc::now();
        let pairs_stored = pairs.len();
        let book = Arc::clone(&self.book);
        tokio::task::spawn_blocking(move || -> Result<(), StoreError> {
            let mut book = book
                .lock()
                .map_err(|_| StoreError::Unavailable("rate book lock poisoned".to_string()))?;
            book.record_sync(&pairs, completed_at)
        })
        .await
        .map_err(|e| StoreError::Unavailable(format!("persist task failed: {e}")))??;

        if let Ok(mut last) = self.last_success.lock() {
            *last = Some(completed_at);
        }

        Ok(SyncReport {
            pairs_stored,
            attempts,
            completed_at,
        })
    }

    async fn fetch_with_retry(
        &self,
        query: &RateQuery,
        token: &CancellationToken,
    ) -> Result<(Vec<u8>, u32), SyncError> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            self.set_state(SyncState::Fetching { attempt });

            let result = tokio::select! {
                biased;
                _ = token.cancelled() => Err(FetchError::Cancelled),
                result = self.fetcher.fetch(query) => result,
            };

            let err = match result {
                Ok(body) => return Ok((body, attempt)),
                Err(FetchError::Cancelled) => return Err(SyncError::Cancelled),
                Err(e) if e.is_transient() => e,
                Err(e) => return Err(SyncError::Fetch(e)),
            };

            if attempt > self.policy.retry_ceiling {
                return Err(SyncError::RetriesExhausted {
                    attempts: attempt,
                    last: err,
                });
            }

            let delay = self.policy.retry_interval;
            warn!(
                attempt,
                max_attempts = self.policy.max_attempts(),
                error = %err,
                "Transient fetch failure, retrying in {:?}",
                delay
            );
            self.set_state(SyncState::Retrying { attempt, delay });

            tokio::select! {
                biased;
                _ = token.cancelled() => return Err(SyncError::Cancelled),
                _ = self.sleeper.sleep(delay) => {}
            }
        }
    }
}
