use std::future::Future;
use std::time::Duration;

use tracing::info;

/// Poll at a fixed interval until a value shows up or the budget runs out.
///
/// Each unsuccessful poll charges one interval against the budget; the loop
/// gives up as soon as the remaining budget is not positive, so it makes at
/// most `ceil(budget / interval)` polls.
#[derive(Debug, Clone, Copy)]
pub struct PollPolicy {
    pub interval_secs: u64,
    pub budget_secs: u64,
}

#[derive(Debug, PartialEq, Eq)]
pub enum PollError<E> {
    Exhausted { polls: u32 },
    Failed(E),
}

impl PollPolicy {
    pub fn new(interval_secs: u64, budget_secs: u64) -> Self {
        Self {
            interval_secs,
            budget_secs,
        }
    }

    pub async fn run<T, E, F, Fut>(&self, what: &str, mut probe: F) -> Result<T, PollError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Option<T>, E>>,
    {
        let mut remaining = self.budget_secs;
        let mut polls = 0u32;

        loop {
            polls += 1;
            if let Some(value) = probe().await.map_err(PollError::Failed)? {
                return Ok(value);
            }

            remaining = remaining.saturating_sub(self.interval_secs);
            if remaining == 0 {
                return Err(PollError::Exhausted { polls });
            }

            info!(what, polls, remaining_secs = remaining, "waiting another {} seconds", self.interval_secs);
            tokio::time::sleep(Duration::from_secs(self.interval_secs)).await;
        }
    }
}

/// Retry an operation while it fails with a transient error.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub attempts: u32,
    pub delay: Duration,
}

#[derive(Debug, PartialEq, Eq)]
pub enum RetryError<E> {
    Exhausted { attempts: u32 },
    Failed(E),
}

impl RetryPolicy {
    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self { attempts, delay }
    }

    pub async fn run<T, E, F, Fut>(
        &self,
        what: &str,
        is_transient: impl Fn(&E) -> bool,
        mut op: F,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let bound = self.attempts.max(1);
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if is_transient(&e) => {
                    if attempt >= bound {
                        return Err(RetryError::Exhausted { attempts: attempt });
                    }
                    info!(what, attempt, "not ready, waiting another {} seconds", self.delay.as_secs());
                    tokio::time::sleep(self.delay).await;
                }
                Err(e) => return Err(RetryError::Failed(e)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn first_hit_returns_immediately() {
        let start = tokio::time::Instant::now();
        let out: Result<u8, PollError<()>> = PollPolicy::new(30, 1200).run("test", || async { Ok(Some(7)) }).await;
        assert_eq!(out, Ok(7));
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_after_budget_over_interval_polls() {
        let polls = Cell::new(0u32);
        let out: Result<(), PollError<()>> = PollPolicy::new(30, 1200)
            .run("test", || {
                polls.set(polls.get() + 1);
                async { Ok(None) }
            })
            .await;

        assert_eq!(out, Err(PollError::Exhausted { polls: 40 }));
        assert_eq!(polls.get(), 40);
    }

    #[tokio::test(start_paused = true)]
    async fn partial_interval_rounds_up() {
        let out: Result<(), PollError<()>> = PollPolicy::new(30, 50).run("test", || async { Ok(None) }).await;
        assert_eq!(out, Err(PollError::Exhausted { polls: 2 }));
    }

    #[tokio::test(start_paused = true)]
    async fn oversized_interval_spends_whole_budget() {
        let out: Result<(), PollError<()>> =
            PollPolicy::new(u64::MAX, 1200).run("test", || async { Ok(None) }).await;
        assert_eq!(out, Err(PollError::Exhausted { polls: 1 }));
    }

    #[tokio::test(start_paused = true)]
    async fn probe_error_stops_polling() {
        let polls = Cell::new(0u32);
        let out: Result<(), PollError<&str>> = PollPolicy::new(30, 1200)
            .run("test", || {
                polls.set(polls.get() + 1);
                async { Err("boom") }
            })
            .await;
        assert_eq!(out, Err(PollError::Failed("boom")));
        assert_eq!(polls.get(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_succeeds_after_transient_failures() {
        let attempts = Cell::new(0u32);
        let out: Result<u32, RetryError<&str>> = RetryPolicy::new(5, Duration::from_secs(15))
            .run("test", |e: &&str| *e == "later", || {
                attempts.set(attempts.get() + 1);
                let n = attempts.get();
                async move { if n < 5 { Err("later") } else { Ok(n) } }
            })
            .await;
        assert_eq!(out, Ok(5));
    }

    #[tokio::test(start_paused = true)]
    async fn retry_bound_is_total_attempts() {
        let attempts = Cell::new(0u32);
        let out: Result<(), RetryError<&str>> = RetryPolicy::new(5, Duration::from_secs(15))
            .run("test", |e: &&str| *e == "later", || {
                attempts.set(attempts.get() + 1);
                async { Err("later") }
            })
            .await;
        assert_eq!(out, Err(RetryError::Exhausted { attempts: 5 }));
        assert_eq!(attempts.get(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn fatal_error_is_not_retried() {
        let attempts = Cell::new(0u32);
        let out: Result<(), RetryError<&str>> = RetryPolicy::new(5, Duration::from_secs(15))
            .run("test", |e: &&str| *e == "later", || {
                attempts.set(attempts.get() + 1);
                async { Err("broken") }
            })
            .await;
        assert_eq!(out, Err(RetryError::Failed("broken")));
        assert_eq!(attempts.get(), 1);
    }
}
