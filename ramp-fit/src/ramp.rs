//! Ramp segment indexing.

use std::fmt;
use std::ops::RangeInclusive;

use crate::dq::DqFlags;

/// Closed index range `[start, end]` into a pixel's resultants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RampIndex {
    pub start: usize,
    pub end: usize,
}

impl RampIndex {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Number of resultants covered; zero for an inverted range.
    pub fn len(&self) -> usize {
        if self.end >= self.start {
            self.end - self.start + 1
        } else {
            0
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, index: usize) -> bool {
        (self.start..=self.end).contains(&index)
    }

    pub fn range(&self) -> RangeInclusive<usize> {
        self.start..=self.end
    }

    /// Split after `at`, giving `[start, at]` and `[at + 1, end]`.
    ///
    /// `at` must satisfy `start <= at < end` so both halves are non-empty.
    pub fn split_after(&self, at: usize) -> (RampIndex, RampIndex) {
        debug_assert!(self.start <= at && at < self.end);
        (RampIndex::new(self.start, at), RampIndex::new(at + 1, self.end))
    }
}

impl fmt::Display for RampIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.start, self.end)
    }
}

/// Initial ramp segments: maximal runs of resultants whose DQ is clear.
///
/// Any flagged resultant terminates the current run and is itself excluded.
pub fn init_ramps(dq: &[DqFlags]) -> Vec<RampIndex> {
    let mut ramps = Vec::new();
    let mut start: Option<usize> = None;

    for (index, flags) in dq.iter().enumerate() {
        match (start, flags.is_good()) {
            (None, true) => start = Some(index),
            (Some(s), false) => {
                ramps.push(RampIndex::new(s, index - 1));
                start = None;
            }
            _ => {}
        }
    }

    if let Some(s) = start {
        ramps.push(RampIndex::new(s, dq.len() - 1));
    }

    ramps
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_len_and_split() {
        let ramp = RampIndex::new(2, 6);
        assert_eq!(ramp.len(), 5);
        assert!(ramp.contains(6));
        assert!(!ramp.contains(7));

        let (left, right) = ramp.split_after(3);
        assert_eq!(left, RampIndex::new(2, 3));
        assert_eq!(right, RampIndex::new(4, 6));
        assert_eq!(left.len() + right.len(), ramp.len());
    }

    #[test]
    fn test_inverted_range_is_empty() {
        assert!(RampIndex::new(4, 3).is_empty());
    }

    #[test]
    fn test_init_ramps_all_good() {
        let dq = vec![DqFlags::empty(); 5];
        assert_eq!(init_ramps(&dq), vec![RampIndex::new(0, 4)]);
    }

    #[test]
    fn test_init_ramps_splits_on_flags() {
        let dq = vec![
            DqFlags::DO_NOT_USE,
            DqFlags::empty(),
            DqFlags::empty(),
            DqFlags::SATURATED,
            DqFlags::empty(),
            DqFlags::DO_NOT_USE,
            DqFlags::DO_NOT_USE,
        ];
        assert_eq!(
            init_ramps(&dq),
            vec![RampIndex::new(1, 2), RampIndex::new(4, 4)]
        );
    }

    #[test]
    fn test_init_ramps_all_flagged() {
        let dq = vec![DqFlags::SATURATED; 3];
        assert!(init_ramps(&dq).is_empty());
    }
}
