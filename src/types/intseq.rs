//! `IntSeq` value: a lazily-stepped integer range (§3).

/// `start..end` stepped by `step`. Immutable once constructed; iterated
/// lazily by callers rather than materialized, matching how for-generators
/// consume it (§4.D).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct IntSeqData {
    pub start: i64,
    pub end: i64,
    pub step: i64,
}

impl IntSeqData {
    #[must_use]
    pub fn new(start: i64, end: i64, step: i64) -> Self {
        Self { start, end, step }
    }

    /// Iterates the sequence's elements. A non-positive `step` (other than
    /// the canonical forward case) simply yields nothing, matching the
    /// "no hang" spirit of §5's cancellation guarantees: this never loops
    /// forever even if `step` is zero.
    pub fn iter(self) -> impl Iterator<Item = i64> {
        let Self { start, end, step } = self;
        let mut current = start;
        let mut count: i64 = 0;
        let total = if step == 0 {
            0
        } else if step > 0 {
            if end < start { 0 } else { (end - start) / step + 1 }
        } else if end > start {
            0
        } else {
            (start - end) / (-step) + 1
        };
        std::iter::from_fn(move || {
            if count >= total {
                return None;
            }
            let v = current;
            current += step;
            count += 1;
            Some(v)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_range_is_inclusive() {
        let seq = IntSeqData::new(1, 5, 2);
        assert_eq!(seq.iter().collect::<Vec<_>>(), vec![1, 3, 5]);
    }

    #[test]
    fn zero_step_never_hangs() {
        let seq = IntSeqData::new(1, 5, 0);
        assert_eq!(seq.iter().collect::<Vec<_>>(), Vec::<i64>::new());
    }
}
