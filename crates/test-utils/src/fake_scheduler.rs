use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use jobwait::errors::{JobwaitError, Result};
use jobwait::exec::{
    BackendFuture, Listing, SchedulerBackend, Submission, SubmitError, SubmitRequest,
};

/// Scripted stand-in for the batch scheduler.
///
/// - status queries replay a queue of listings; the last one repeats forever;
/// - submissions hand out increasing job ids unless a failure was scripted;
/// - every call is recorded for assertions.
#[derive(Debug, Default)]
pub struct FakeScheduler {
    inner: Mutex<Inner>,
    queries: AtomicUsize,
    submit_attempts: AtomicUsize,
}

#[derive(Debug, Default)]
struct Inner {
    listings: VecDeque<Listing>,
    query_failures: u32,
    query_delay: Duration,
    submit_script: VecDeque<std::result::Result<Submission, SubmitError>>,
    always_transient: bool,
    next_id: u64,
    cluster: Option<String>,
    submits: Vec<SubmitRequest>,
    cancels: Vec<(String, Option<String>)>,
}

/// Listing from `(job id, raw state)` pairs.
pub fn listing(entries: &[(&str, &str)]) -> Listing {
    entries
        .iter()
        .map(|(id, state)| (id.to_string(), state.to_string()))
        .collect()
}

impl FakeScheduler {
    pub fn new() -> Self {
        let fake = Self::default();
        fake.inner.lock().unwrap().next_id = 1001;
        fake
    }

    /// First job id handed out by `submit`.
    pub fn with_next_id(self, id: u64) -> Self {
        self.inner.lock().unwrap().next_id = id;
        self
    }

    /// Cluster reported with every accepted submission.
    pub fn with_cluster(self, cluster: &str) -> Self {
        self.inner.lock().unwrap().cluster = Some(cluster.to_string());
        self
    }

    /// Queue a listing for a later status query.
    pub fn push_listing(&self, listing: Listing) {
        self.inner.lock().unwrap().listings.push_back(listing);
    }

    /// Make the next `n` status queries fail.
    pub fn fail_queries(&self, n: u32) {
        self.inner.lock().unwrap().query_failures = n;
    }

    /// Delay every status query, so concurrent callers overlap.
    pub fn set_query_delay(&self, delay: Duration) {
        self.inner.lock().unwrap().query_delay = delay;
    }

    /// Script the outcome of the next submission attempt.
    pub fn push_submit_outcome(&self, outcome: std::result::Result<Submission, SubmitError>) {
        self.inner.lock().unwrap().submit_script.push_back(outcome);
    }

    /// Every submission attempt fails with a transient error.
    pub fn always_transient(&self) {
        self.inner.lock().unwrap().always_transient = true;
    }

    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    pub fn submit_attempts(&self) -> usize {
        self.submit_attempts.load(Ordering::SeqCst)
    }

    /// Accepted submissions, in order.
    pub fn submits(&self) -> Vec<SubmitRequest> {
        self.inner.lock().unwrap().submits.clone()
    }

    pub fn cancels(&self) -> Vec<(String, Option<String>)> {
        self.inner.lock().unwrap().cancels.clone()
    }

    fn next_listing(&self) -> Result<(Listing, Duration)> {
        let mut inner = self.inner.lock().unwrap();
        if inner.query_failures > 0 {
            inner.query_failures -= 1;
            return Err(JobwaitError::QueryFailure("scripted query failure".into()));
        }
        let listing = if inner.listings.len() > 1 {
            inner.listings.pop_front().unwrap_or_default()
        } else {
            inner.listings.front().cloned().unwrap_or_default()
        };
        Ok((listing, inner.query_delay))
    }

    fn next_submission(&self, request: &SubmitRequest) -> std::result::Result<Submission, SubmitError> {
        self.submit_attempts.fetch_add(1, Ordering::SeqCst);
        let mut inner = self.inner.lock().unwrap();
        if inner.always_transient {
            return Err(SubmitError::Transient("Socket timed out".into()));
        }
        let outcome = match inner.submit_script.pop_front() {
            Some(outcome) => outcome,
            None => {
                let job_id = inner.next_id.to_string();
                inner.next_id += 1;
                Ok(Submission {
                    job_id,
                    cluster: inner.cluster.clone(),
                })
            }
        };
        if outcome.is_ok() {
            inner.submits.push(request.clone());
        }
        outcome
    }
}

impl SchedulerBackend for FakeScheduler {
    fn query<'a>(
        &'a self,
        _cluster: Option<&'a str>,
        _lookback: Duration,
    ) -> BackendFuture<'a, Result<Listing>> {
        Box::pin(async move {
            self.queries.fetch_add(1, Ordering::SeqCst);
            let (listing, delay) = self.next_listing()?;
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            Ok(listing)
        })
    }

    fn submit<'a>(
        &'a self,
        request: &'a SubmitRequest,
    ) -> BackendFuture<'a, std::result::Result<Submission, SubmitError>> {
        Box::pin(async move { self.next_submission(request) })
    }

    fn cancel<'a>(
        &'a self,
        job_id: &'a str,
        cluster: Option<&'a str>,
    ) -> BackendFuture<'a, Result<()>> {
        Box::pin(async move {
            self.inner
                .lock()
                .unwrap()
                .cancels
                .push((job_id.to_string(), cluster.map(str::to_string)));
            Ok(())
        })
    }

    fn cancel_command(&self, job_id: &str, cluster: Option<&str>) -> String {
        match cluster {
            Some(cluster) => format!("scancel -M {cluster} {job_id}"),
            None => format!("scancel {job_id}"),
        }
    }
}
