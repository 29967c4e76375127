use rand::{thread_rng, Rng};
use std::time::{Duration, Instant};

/// Delay schedule shared by the commit-conflict retries in deployment tasks
/// and the compensating cleanup loop. Every pause is the same base delay,
/// optionally jittered; the schedule ends after `max_attempts` or when the
/// next pause would overrun the wall-clock budget.
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    max_attempts: usize,
    delay: Duration,
    jitter_fraction: f64,
    time_budget: Option<Duration>,
}

impl RetryPolicy {
    pub fn fixed(max_attempts: usize, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
            jitter_fraction: 0.0,
            time_budget: None,
        }
    }

    /// Fixed delay between attempts, bounded only by the wall-clock budget.
    /// A zero budget leaves room for the first attempt alone.
    pub fn until_deadline(delay: Duration, budget: Duration) -> Self {
        if budget.is_zero() {
            return Self::fixed(1, delay);
        }
        let mut policy = Self::fixed(usize::MAX, delay);
        policy.time_budget = Some(budget);
        policy
    }

    /// Spreads each pause uniformly over `delay * (1 ± fraction)`.
    pub fn with_jitter(mut self, fraction: f64) -> Self {
        self.jitter_fraction = fraction.clamp(0.0, 1.0);
        self
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    pub fn time_budget(&self) -> Option<Duration> {
        self.time_budget
    }

    /// Starts a schedule whose budget runs from now.
    pub fn handle(&self) -> RetryHandle {
        let started = Instant::now();
        RetryHandle {
            policy: self.clone(),
            attempts: 0,
            deadline: self
                .time_budget
                .and_then(|budget| started.checked_add(budget)),
        }
    }

    fn pause(&self) -> Duration {
        if self.delay.is_zero() || self.jitter_fraction == 0.0 {
            return self.delay;
        }
        let spread = thread_rng().gen_range(1.0 - self.jitter_fraction..=1.0 + self.jitter_fraction);
        self.delay.mul_f64(spread)
    }
}

/// One run through a [`RetryPolicy`].
#[derive(Debug)]
pub struct RetryHandle {
    policy: RetryPolicy,
    attempts: usize,
    deadline: Option<Instant>,
}

impl RetryHandle {
    /// Pause before the next attempt, or `None` once the attempts or the
    /// budget are used up.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.attempts.saturating_add(1) >= self.policy.max_attempts {
            return None;
        }
        let pause = self.policy.pause();
        if let Some(deadline) = self.deadline {
            let resume_at = Instant::now().checked_add(pause)?;
            if resume_at > deadline {
                return None;
            }
        }
        self.attempts += 1;
        Some(pause)
    }

    /// Retries granted so far; the attempt count is one more.
    pub fn attempts(&self) -> usize {
        self.attempts
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }
}
