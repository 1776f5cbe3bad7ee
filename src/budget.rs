//! Token accounting and budget enforcement for one invocation.

use serde::{Deserialize, Serialize};

use crate::signals::Signal;

/// Token usage accumulated over one invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    /// Tracked for diagnostics; never counted against the ceiling.
    pub cache_read_tokens: u64,
}

impl TokenUsage {
    pub fn new(input_tokens: u64, output_tokens: u64, cache_read_tokens: u64) -> Self {
        Self {
            input_tokens,
            output_tokens,
            cache_read_tokens,
        }
    }

    /// Input plus output. Cache reads are excluded.
    pub fn total_tokens(&self) -> u64 {
        self.input_tokens.saturating_add(self.output_tokens)
    }

    pub fn is_zero(&self) -> bool {
        self.input_tokens == 0 && self.output_tokens == 0 && self.cache_read_tokens == 0
    }

    pub fn add(&mut self, other: &TokenUsage) {
        self.input_tokens = self.input_tokens.saturating_add(other.input_tokens);
        self.output_tokens = self.output_tokens.saturating_add(other.output_tokens);
        self.cache_read_tokens = self.cache_read_tokens.saturating_add(other.cache_read_tokens);
    }
}

type CancelFn = Box<dyn FnOnce() + Send>;

/// Accumulates usage and trips once the total reaches the ceiling.
///
/// Tripping synthesizes a `BAILOUT` signal and fires the cancel callback.
/// Both happen at most once per tracker.
pub struct TokenBudget {
    ceiling: u64,
    usage: TokenUsage,
    terminated: bool,
    samples: usize,
    on_exceed: Option<CancelFn>,
}

impl TokenBudget {
    pub fn new(ceiling: u64) -> Self {
        Self {
            ceiling,
            usage: TokenUsage::default(),
            terminated: false,
            samples: 0,
            on_exceed: None,
        }
    }

    /// Attach the callback invoked when the ceiling is reached.
    pub fn with_cancel(mut self, on_exceed: impl FnOnce() + Send + 'static) -> Self {
        self.on_exceed = Some(Box::new(on_exceed));
        self
    }

    /// Add one usage snapshot. Returns the bailout signal the first time the
    /// ceiling is met or exceeded.
    pub fn record(&mut self, snapshot: &TokenUsage) -> Option<Signal> {
        self.samples += 1;
        self.usage.add(snapshot);

        if self.terminated || self.usage.total_tokens() < self.ceiling {
            return None;
        }

        self.terminated = true;
        tracing::info!(
            total = self.usage.total_tokens(),
            ceiling = self.ceiling,
            "token ceiling reached, terminating invocation"
        );
        if let Some(cancel) = self.on_exceed.take() {
            cancel();
        }
        Some(Signal::token_limit_bailout())
    }

    pub fn usage(&self) -> TokenUsage {
        self.usage
    }

    pub fn ceiling(&self) -> u64 {
        self.ceiling
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Whether any usage-bearing event was recorded.
    pub fn has_samples(&self) -> bool {
        self.samples > 0
    }
}

impl std::fmt::Debug for TokenBudget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenBudget")
            .field("ceiling", &self.ceiling)
            .field("usage", &self.usage)
            .field("terminated", &self.terminated)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signals::SignalKind;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_budget(ceiling: u64) -> (TokenBudget, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let budget = TokenBudget::new(ceiling).with_cancel(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        (budget, calls)
    }

    #[test]
    fn test_exceeding_ceiling_terminates_once() {
        let (mut budget, calls) = counting_budget(1000);
        let signal = budget.record(&TokenUsage::new(800, 300, 0));

        assert_eq!(budget.usage().total_tokens(), 1100);
        assert!(budget.is_terminated());
        let signal = signal.unwrap();
        assert_eq!(signal.kind, SignalKind::Bailout);
        assert_eq!(signal.detail.as_deref(), Some("token limit exceeded"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        assert!(budget.record(&TokenUsage::new(10, 10, 0)).is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_below_ceiling_does_not_terminate() {
        let (mut budget, calls) = counting_budget(100_000);
        assert!(budget.record(&TokenUsage::new(30_000, 600, 0)).is_none());
        assert!(budget.record(&TokenUsage::new(20_000, 400, 0)).is_none());

        assert_eq!(budget.usage().input_tokens, 50_000);
        assert_eq!(budget.usage().output_tokens, 1_000);
        assert!(!budget.is_terminated());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_exact_ceiling_terminates() {
        let (mut budget, _) = counting_budget(1000);
        assert!(budget.record(&TokenUsage::new(600, 400, 0)).is_some());
    }

    #[test]
    fn test_cache_reads_do_not_count() {
        let (mut budget, calls) = counting_budget(1000);
        assert!(budget.record(&TokenUsage::new(100, 100, 50_000)).is_none());
        assert_eq!(budget.usage().cache_read_tokens, 50_000);
        assert_eq!(budget.usage().total_tokens(), 200);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_no_samples_reports_zero() {
        let budget = TokenBudget::new(1000);
        assert!(!budget.has_samples());
        assert!(budget.usage().is_zero());
    }

    #[test]
    fn test_without_callback_still_terminates() {
        let mut budget = TokenBudget::new(10);
        assert!(budget.record(&TokenUsage::new(5, 5, 0)).is_some());
        assert!(budget.is_terminated());
    }
}
