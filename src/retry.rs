//! Retry policy for moves that hit a busy file
//!
//! The delay between attempts is constant. Only the busy classification in
//! [`crate::error::is_busy`] consumes the budget; every other error ends the
//! move on the spot.

use std::time::Duration;

pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_BACKOFF: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
	/// Retries allowed after the first attempt
	pub max_retries: u32,
	/// Fixed wait before each retry
	pub backoff: Duration,
}

impl Default for RetryPolicy {
	fn default() -> Self {
		Self { max_retries: DEFAULT_MAX_RETRIES, backoff: DEFAULT_BACKOFF }
	}
}

impl RetryPolicy {
	pub fn new(max_retries: u32, backoff: Duration) -> Self {
		Self { max_retries, backoff }
	}

	/// Total attempts including the first one
	pub fn max_attempts(&self) -> u32 {
		self.max_retries.saturating_add(1)
	}

	/// Upper bound on time spent sleeping before a move gives up
	pub fn worst_case_wait(&self) -> Duration {
		self.backoff.saturating_mul(self.max_retries)
	}
}

/// A builder for creating retry policies
#[derive(Debug)]
pub struct RetryPolicyBuilder {
	policy: RetryPolicy,
}

impl RetryPolicyBuilder {
	/// Create a new builder with default configuration
	pub fn new() -> Self {
		Self { policy: RetryPolicy::default() }
	}

	/// Set the maximum number of retry attempts
	pub fn max_retries(mut self, max_retries: u32) -> Self {
		self.policy.max_retries = max_retries;
		self
	}

	/// Set the delay between attempts
	pub fn backoff(mut self, delay: Duration) -> Self {
		self.policy.backoff = delay;
		self
	}

	pub fn build(self) -> RetryPolicy {
		self.policy
	}
}

impl Default for RetryPolicyBuilder {
	fn default() -> Self {
		Self::new()
	}
}
