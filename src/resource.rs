//! Resource limits, cancellation, and the `ResourceTracker` trait (§5).
//!
//! A `ResourceTracker` trait with a `NoLimitTracker`/`LimitedTracker`
//! split, narrowed to the hooks this evaluator actually calls: §5 bounds
//! member force, method call, and external read as suspension points, so
//! `on_force` is the one allocation-like hook and there is no byte-level
//! heap-usage tracking.

use std::fmt;
use std::time::{Duration, Instant};

/// A resource limit was exceeded, or the evaluation was cancelled (§5, §7).
#[derive(Debug, Clone)]
pub enum ResourceError {
    MembersForced { limit: usize, count: usize },
    Time { limit: Duration, elapsed: Duration },
    Recursion { limit: usize, depth: usize },
    Cancelled,
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MembersForced { limit, count } => {
                write!(f, "member-force limit exceeded: {count} > {limit}")
            }
            Self::Time { limit, elapsed } => write!(f, "time limit exceeded: {elapsed:?} > {limit:?}"),
            Self::Recursion { limit, depth } => write!(f, "recursion limit exceeded: {depth} > {limit}"),
            Self::Cancelled => write!(f, "evaluation was cancelled"),
        }
    }
}

impl std::error::Error for ResourceError {}

impl From<ResourceError> for crate::errors::EvalError {
    fn from(err: ResourceError) -> Self {
        match err {
            ResourceError::Cancelled => Self::Cancelled,
            ResourceError::Time { .. } => Self::Timeout,
            ResourceError::MembersForced { .. } | ResourceError::Recursion { limit: _, depth: _ } => {
                Self::Eval { message: err.to_string() }
            }
        }
    }
}

/// Hooked at every suspension point named in §5: member force, method call,
/// external read.
pub trait ResourceTracker: fmt::Debug {
    /// Called before forcing a member. Implementations that count forced
    /// members enforce `max_members_forced` here.
    fn on_force(&mut self) -> Result<(), ResourceError>;

    /// Called between AST node reductions and at every suspension point
    /// (§5 "Cancellation"). Checks both the cancellation flag and the
    /// wall-clock deadline.
    fn check_time(&mut self) -> Result<(), ResourceError>;

    /// Called before pushing a new evaluation frame (method/function call,
    /// or a nested amend/new).
    fn check_recursion_depth(&self, current_depth: usize) -> Result<(), ResourceError>;

    /// Requests cancellation of the current top-level evaluation. The next
    /// `check_time` call observes it and unwinds with `Cancelled`.
    fn cancel(&mut self);

    fn members_forced(&self) -> Option<usize> {
        None
    }
}

/// Persistent limits an embedder configures once (§6 `EvaluatorOptions`).
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct ResourceLimits {
    pub max_members_forced: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_duration: Option<Duration>,
    pub max_recursion_depth: Option<usize>,
}

/// Recommended recursion depth if the embedder doesn't configure one.
pub const DEFAULT_MAX_RECURSION_DEPTH: usize = 1000;

impl ResourceLimits {
    #[must_use]
    pub fn new() -> Self {
        Self { max_recursion_depth: Some(DEFAULT_MAX_RECURSION_DEPTH), ..Default::default() }
    }

    #[must_use]
    pub fn max_members_forced(mut self, limit: usize) -> Self {
        self.max_members_forced = Some(limit);
        self
    }

    #[must_use]
    pub fn max_duration(mut self, limit: Duration) -> Self {
        self.max_duration = Some(limit);
        self
    }

    #[must_use]
    pub fn max_recursion_depth(mut self, limit: Option<usize>) -> Self {
        self.max_recursion_depth = limit;
        self
    }
}

/// Unrestricted tracker, used when an embedder configures no limits at all
/// (§5 default behavior for a one-shot `evaluate()` call with no deadline).
#[derive(Debug, Clone, Default)]
pub struct NoLimitTracker {
    cancelled: bool,
}

impl NoLimitTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ResourceTracker for NoLimitTracker {
    fn on_force(&mut self) -> Result<(), ResourceError> {
        Ok(())
    }

    fn check_time(&mut self) -> Result<(), ResourceError> {
        if self.cancelled {
            return Err(ResourceError::Cancelled);
        }
        Ok(())
    }

    fn check_recursion_depth(&self, _current_depth: usize) -> Result<(), ResourceError> {
        Ok(())
    }

    fn cancel(&mut self) {
        self.cancelled = true;
    }
}

/// A tracker enforcing the configured `ResourceLimits` (§5, §6).
#[derive(Debug)]
pub struct LimitedTracker {
    limits: ResourceLimits,
    start_time: Instant,
    members_forced: usize,
    cancelled: bool,
}

impl LimitedTracker {
    #[must_use]
    pub fn new(limits: ResourceLimits) -> Self {
        Self { limits, start_time: Instant::now(), members_forced: 0, cancelled: false }
    }
}

impl ResourceTracker for LimitedTracker {
    fn on_force(&mut self) -> Result<(), ResourceError> {
        if let Some(max) = self.limits.max_members_forced {
            if self.members_forced >= max {
                return Err(ResourceError::MembersForced { limit: max, count: self.members_forced + 1 });
            }
        }
        self.members_forced += 1;
        Ok(())
    }

    fn check_time(&mut self) -> Result<(), ResourceError> {
        if self.cancelled {
            return Err(ResourceError::Cancelled);
        }
        if let Some(max) = self.limits.max_duration {
            let elapsed = self.start_time.elapsed();
            if elapsed > max {
                return Err(ResourceError::Time { limit: max, elapsed });
            }
        }
        Ok(())
    }

    fn check_recursion_depth(&self, current_depth: usize) -> Result<(), ResourceError> {
        if let Some(max) = self.limits.max_recursion_depth {
            if current_depth >= max {
                return Err(ResourceError::Recursion { limit: max, depth: current_depth + 1 });
            }
        }
        Ok(())
    }

    fn cancel(&mut self) {
        self.cancelled = true;
    }

    fn members_forced(&self) -> Option<usize> {
        Some(self.members_forced)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn members_forced_limit_is_enforced() {
        let mut tracker = LimitedTracker::new(ResourceLimits::new().max_members_forced(1));
        assert!(tracker.on_force().is_ok());
        assert!(tracker.on_force().is_err());
    }

    #[test]
    fn cancel_is_observed_on_next_check() {
        let mut tracker = NoLimitTracker::new();
        assert!(tracker.check_time().is_ok());
        tracker.cancel();
        assert!(matches!(tracker.check_time(), Err(ResourceError::Cancelled)));
    }

    #[test]
    fn recursion_limit_is_enforced() {
        let tracker = LimitedTracker::new(ResourceLimits::new().max_recursion_depth(Some(2)));
        assert!(tracker.check_recursion_depth(1).is_ok());
        assert!(tracker.check_recursion_depth(2).is_err());
    }
}
