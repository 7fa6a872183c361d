//! Terminal-state polling
//!
//! After a mutating call the remote object converges in the background.
//! [`poll_until_terminal`] re-fetches its status at a fixed interval until the
//! status lands in the success or failure set, or the attempt/time budget of
//! the [`PollSpec`] runs out.
//!
//! Intervals are constant: no backoff and no jitter. Remote rate limits are
//! tuned against the fixed 30s/1s cadences.
//!
//! The wait between attempts is the only suspension point. It is raced
//! against the caller's [`OperationContext`], so a user abort or an enclosing
//! deadline unwinds the loop within one interval instead of running the
//! poll's own budget to exhaustion.

use crate::error::{CloudError, RemoteError, Result};
use cloudngfw_config::PollProfile;
use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::time::Duration;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Cancellation signal and overall deadline of a caller-level operation
#[derive(Debug, Clone, Default)]
pub struct OperationContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl OperationContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Abort once `timeout` has elapsed from now
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            cancel: CancellationToken::new(),
            deadline: Some(Instant::now() + timeout),
        }
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Share an existing token (e.g. one cancelled on Ctrl-C)
    pub fn with_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    fn deadline_passed(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Resolves when the caller deadline passes; never resolves without one
    async fn deadline_reached(&self) {
        match self.deadline {
            Some(deadline) => sleep_until(deadline).await,
            None => std::future::pending::<()>().await,
        }
    }
}

/// Interval, budget and status classification for one poll loop
#[derive(Debug, Clone)]
pub struct PollSpec<S> {
    pub interval: Duration,
    /// Maximum number of status fetches (`None` = no cap)
    pub max_attempts: Option<u32>,
    /// Budget measured from the first fetch (`None` = no cap)
    pub timeout: Option<Duration>,
    /// Statuses meaning the operation succeeded
    pub terminal: HashSet<S>,
    /// Statuses meaning the operation failed
    pub failure: HashSet<S>,
}

impl<S: Eq + Hash> PollSpec<S> {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            max_attempts: None,
            timeout: None,
            terminal: HashSet::new(),
            failure: HashSet::new(),
        }
    }

    /// Interval and budget from a configured profile
    pub fn from_profile(profile: &PollProfile) -> Self {
        let mut spec = Self::new(profile.interval());
        spec.max_attempts = profile.max_attempts;
        spec.timeout = profile.timeout();
        spec
    }

    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn terminal(mut self, statuses: impl IntoIterator<Item = S>) -> Self {
        self.terminal.extend(statuses);
        self
    }

    pub fn failure(mut self, statuses: impl IntoIterator<Item = S>) -> Self {
        self.failure.extend(statuses);
        self
    }
}

/// How a poll loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    Succeeded,
    /// The object reached a recognized failure status
    Failed,
    /// Budget exhausted while the status was still in progress
    TimedOut,
}

impl fmt::Display for PollOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PollOutcome::Succeeded => write!(f, "succeeded"),
            PollOutcome::Failed => write!(f, "failed"),
            PollOutcome::TimedOut => write!(f, "timed out"),
        }
    }
}

/// Final observation of a poll loop
#[derive(Debug, Clone)]
pub struct PollReport<S, R> {
    pub resource: String,
    pub outcome: PollOutcome,
    /// Last observed status
    pub status: S,
    /// Response that carried `status`
    pub response: R,
    pub attempts: u32,
}

impl<S: fmt::Display, R> PollReport<S, R> {
    pub fn is_success(&self) -> bool {
        self.outcome == PollOutcome::Succeeded
    }

    /// `Failed` becomes `TerminalFailure`, `TimedOut` becomes `PollTimedOut`
    pub fn into_result(self) -> Result<R> {
        match self.outcome {
            PollOutcome::Succeeded => Ok(self.response),
            PollOutcome::Failed => Err(CloudError::TerminalFailure {
                resource: self.resource,
                status: self.status.to_string(),
            }),
            PollOutcome::TimedOut => Err(CloudError::PollTimedOut {
                resource: self.resource,
                last_status: self.status.to_string(),
                attempts: self.attempts,
            }),
        }
    }
}

/// Fetch status until it is terminal or the budget runs out.
///
/// A fetch error is returned immediately as `RemoteFetch`; it is not
/// retried. Failure statuses are checked before success statuses. At least
/// one fetch is issued unless the context is already cancelled or past its
/// deadline. Cancellation and the caller deadline also abandon an in-flight
/// fetch.
pub async fn poll_until_terminal<S, R, F, Fut>(
    resource: &str,
    spec: &PollSpec<S>,
    ctx: &OperationContext,
    mut fetch: F,
) -> Result<PollReport<S, R>>
where
    S: Eq + Hash + fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<(S, R), RemoteError>>,
{
    let budget_end = spec.timeout.map(|t| Instant::now() + t);
    let mut attempts = 0u32;

    loop {
        if ctx.is_cancelled() {
            return Err(CloudError::Cancelled(resource.to_string()));
        }
        if ctx.deadline_passed() {
            return Err(CloudError::DeadlineExceeded(resource.to_string()));
        }

        attempts += 1;
        let fetched = tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => {
                return Err(CloudError::Cancelled(resource.to_string()));
            }
            _ = ctx.deadline_reached() => {
                return Err(CloudError::DeadlineExceeded(resource.to_string()));
            }
            fetched = fetch() => fetched,
        };
        let (status, response) = fetched.map_err(|source| CloudError::RemoteFetch {
            resource: resource.to_string(),
            source,
        })?;

        let outcome = if spec.failure.contains(&status) {
            Some(PollOutcome::Failed)
        } else if spec.terminal.contains(&status) {
            Some(PollOutcome::Succeeded)
        } else {
            let next = Instant::now() + spec.interval;
            let out_of_attempts = spec.max_attempts.is_some_and(|max| attempts >= max);
            let out_of_time = budget_end.is_some_and(|end| next > end);
            if out_of_attempts || out_of_time {
                Some(PollOutcome::TimedOut)
            } else {
                debug!(
                    resource = %resource,
                    attempt = attempts,
                    status = %status,
                    "Not terminal yet, waiting"
                );

                tokio::select! {
                    biased;
                    _ = ctx.cancel.cancelled() => {
                        return Err(CloudError::Cancelled(resource.to_string()));
                    }
                    _ = ctx.deadline_reached() => {
                        return Err(CloudError::DeadlineExceeded(resource.to_string()));
                    }
                    _ = sleep_until(next) => {}
                }
                None
            }
        };

        if let Some(outcome) = outcome {
            return Ok(PollReport {
                resource: resource.to_string(),
                outcome,
                status,
                response,
                attempts,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RemoteErrorKind;
    use crate::model::CommitStatus;
    use std::future::{Ready, ready};
    use std::sync::atomic::{AtomicU32, Ordering};

    type Fetched = std::result::Result<(CommitStatus, u32), RemoteError>;

    /// Replays `statuses`, repeating the last one once exhausted
    fn scripted(
        statuses: Vec<CommitStatus>,
        calls: &AtomicU32,
    ) -> impl FnMut() -> Ready<Fetched> + '_ {
        let mut script = statuses.into_iter();
        let mut last = CommitStatus::Pending;
        move || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some(next) = script.next() {
                last = next;
            }
            ready(Ok((last, n)))
        }
    }

    fn commit_spec() -> PollSpec<CommitStatus> {
        PollSpec::new(Duration::from_millis(5))
            .terminal([CommitStatus::Success])
            .failure([CommitStatus::Failed])
    }

    #[tokio::test]
    async fn test_succeeds_on_third_fetch() {
        let calls = AtomicU32::new(0);
        let fetch = scripted(
            vec![
                CommitStatus::Pending,
                CommitStatus::Pending,
                CommitStatus::Success,
            ],
            &calls,
        );

        let report = poll_until_terminal("rs1", &commit_spec(), &OperationContext::new(), fetch)
            .await
            .unwrap();

        assert_eq!(report.outcome, PollOutcome::Succeeded);
        assert_eq!(report.status, CommitStatus::Success);
        assert_eq!(report.response, 3);
        assert_eq!(report.attempts, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(report.into_result().unwrap(), 3);
    }

    #[tokio::test]
    async fn test_times_out_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let fetch = scripted(vec![CommitStatus::Pending], &calls);
        let spec = commit_spec().max_attempts(3);

        let report = poll_until_terminal("rs1", &spec, &OperationContext::new(), fetch)
            .await
            .unwrap();

        assert_eq!(report.outcome, PollOutcome::TimedOut);
        assert!(!report.is_success());
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        match report.into_result() {
            Err(CloudError::PollTimedOut {
                resource,
                last_status,
                attempts,
            }) => {
                assert_eq!(resource, "rs1");
                assert_eq!(last_status, "Pending");
                assert_eq!(attempts, 3);
            }
            other => panic!("Expected PollTimedOut, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_failure_is_distinct_from_timeout() {
        let calls = AtomicU32::new(0);
        let fetch = scripted(vec![CommitStatus::Pending, CommitStatus::Failed], &calls);
        let spec = commit_spec().max_attempts(10);

        let report = poll_until_terminal("rs1", &spec, &OperationContext::new(), fetch)
            .await
            .unwrap();

        assert_eq!(report.outcome, PollOutcome::Failed);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(matches!(
            report.into_result(),
            Err(CloudError::TerminalFailure { ref status, .. }) if status == "Failed"
        ));
    }

    #[tokio::test]
    async fn test_failure_checked_before_success() {
        let calls = AtomicU32::new(0);
        let fetch = scripted(vec![CommitStatus::Failed], &calls);
        let spec = PollSpec::new(Duration::from_millis(5))
            .terminal([CommitStatus::Failed, CommitStatus::Success])
            .failure([CommitStatus::Failed]);

        let report = poll_until_terminal("rs1", &spec, &OperationContext::new(), fetch)
            .await
            .unwrap();
        assert_eq!(report.outcome, PollOutcome::Failed);
    }

    #[tokio::test]
    async fn test_fetch_error_is_not_retried() {
        let calls = AtomicU32::new(0);
        let fetch = || {
            calls.fetch_add(1, Ordering::SeqCst);
            ready(Err::<(CommitStatus, ()), _>(RemoteError::from_status(
                503,
                "unavailable",
            )))
        };

        let err = poll_until_terminal("rs1", &commit_spec(), &OperationContext::new(), fetch)
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        match err {
            CloudError::RemoteFetch { resource, source } => {
                assert_eq!(resource, "rs1");
                assert_eq!(source.kind, RemoteErrorKind::Transient);
            }
            other => panic!("Expected RemoteFetch, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_uncapped_poll_runs_until_terminal() {
        let calls = AtomicU32::new(0);
        let mut statuses = vec![CommitStatus::Pending; 20];
        statuses.push(CommitStatus::Success);
        let fetch = scripted(statuses, &calls);
        let spec = PollSpec::new(Duration::from_millis(1))
            .terminal([CommitStatus::Success, CommitStatus::Failed]);

        let report = poll_until_terminal("rs1", &spec, &OperationContext::new(), fetch)
            .await
            .unwrap();
        assert_eq!(report.attempts, 21);
        assert!(report.is_success());
    }

    #[tokio::test]
    async fn test_time_budget() {
        let calls = AtomicU32::new(0);
        let fetch = scripted(vec![CommitStatus::Pending], &calls);
        let spec = PollSpec::new(Duration::from_millis(20))
            .timeout(Duration::from_millis(50))
            .terminal([CommitStatus::Success]);

        let report = poll_until_terminal("rs1", &spec, &OperationContext::new(), fetch)
            .await
            .unwrap();
        assert_eq!(report.outcome, PollOutcome::TimedOut);
        assert!(report.attempts >= 1 && report.attempts <= 3);
    }

    #[tokio::test]
    async fn test_cancel_interrupts_sleep() {
        let calls = AtomicU32::new(0);
        let fetch = scripted(vec![CommitStatus::Pending], &calls);
        let spec = PollSpec::new(Duration::from_secs(30)).terminal([CommitStatus::Success]);
        let ctx = OperationContext::new();

        let token = ctx.token().clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            token.cancel();
        });

        let started = std::time::Instant::now();
        let err = poll_until_terminal("rs1", &spec, &ctx, fetch)
            .await
            .unwrap_err();

        assert!(matches!(err, CloudError::Cancelled(ref r) if r == "rs1"));
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_caller_deadline_interrupts_sleep() {
        let calls = AtomicU32::new(0);
        let fetch = scripted(vec![CommitStatus::Pending], &calls);
        let spec = PollSpec::new(Duration::from_secs(30))
            .max_attempts(120)
            .terminal([CommitStatus::Success]);
        let ctx = OperationContext::with_timeout(Duration::from_millis(30));

        let started = std::time::Instant::now();
        let err = poll_until_terminal("fw1", &spec, &ctx, fetch)
            .await
            .unwrap_err();

        assert!(matches!(err, CloudError::DeadlineExceeded(_)));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_cancel_interrupts_hung_fetch() {
        let spec = PollSpec::new(Duration::from_secs(30)).terminal([CommitStatus::Success]);
        let ctx = OperationContext::new();

        let token = ctx.token().clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            token.cancel();
        });

        let err = poll_until_terminal("rs1", &spec, &ctx, || {
            std::future::pending::<std::result::Result<(CommitStatus, ()), RemoteError>>()
        })
        .await
        .unwrap_err();

        assert!(matches!(err, CloudError::Cancelled(ref r) if r == "rs1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_caller_deadline_interrupts_hung_fetch() {
        let spec = PollSpec::new(Duration::from_secs(30)).terminal([CommitStatus::Success]);
        let ctx = OperationContext::with_timeout(Duration::from_secs(5));

        let err = poll_until_terminal("fw1", &spec, &ctx, || {
            std::future::pending::<std::result::Result<(CommitStatus, ()), RemoteError>>()
        })
        .await
        .unwrap_err();

        assert!(matches!(err, CloudError::DeadlineExceeded(ref r) if r == "fw1"));
    }

    #[tokio::test]
    async fn test_cancelled_context_issues_no_fetch() {
        let calls = AtomicU32::new(0);
        let fetch = scripted(vec![CommitStatus::Success], &calls);
        let ctx = OperationContext::new();
        ctx.cancel();

        let err = poll_until_terminal("rs1", &commit_spec(), &ctx, fetch)
            .await
            .unwrap_err();
        assert!(matches!(err, CloudError::Cancelled(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_spec_from_profile() {
        let spec: PollSpec<CommitStatus> = PollSpec::from_profile(&PollProfile::fixed(30, 10));
        assert_eq!(spec.interval, Duration::from_secs(30));
        assert_eq!(spec.max_attempts, Some(10));
        assert_eq!(spec.timeout, None);
        assert!(spec.terminal.is_empty());
    }
}
