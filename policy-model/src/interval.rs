//! Time intervals for time-based rules.

use serde::{Deserialize, Serialize};

/// A weekly time interval: a days-of-week bitmask (bit 0 = Monday) and a
/// start/end time in minutes from midnight. The zero-days, zero-width
/// interval is never authored; "any time" is expressed by leaving the
/// rule's `when` element empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interval {
    pub days: u8,
    pub start_minute: u16,
    pub end_minute: u16,
}

impl Interval {
    /// True if the two intervals share at least one day and their daily
    /// windows overlap.
    pub fn overlaps(&self, other: &Interval) -> bool {
        self.days & other.days != 0
            && self.start_minute <= other.end_minute
            && other.start_minute <= self.end_minute
    }

    /// Common sub-interval, if any.
    pub fn intersection(&self, other: &Interval) -> Option<Interval> {
        if !self.overlaps(other) {
            return None;
        }
        Some(Interval {
            days: self.days & other.days,
            start_minute: self.start_minute.max(other.start_minute),
            end_minute: self.end_minute.min(other.end_minute),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::Interval;

    #[test]
    fn disjoint_days_do_not_overlap() {
        let weekdays = Interval { days: 0b0001_1111, start_minute: 540, end_minute: 1020 };
        let weekend = Interval { days: 0b0110_0000, start_minute: 0, end_minute: 1439 };
        assert!(!weekdays.overlaps(&weekend));
        assert!(weekdays.intersection(&weekend).is_none());
    }

    #[test]
    fn intersection_narrows_both_fields() {
        let a = Interval { days: 0b0000_0111, start_minute: 480, end_minute: 1080 };
        let b = Interval { days: 0b0000_0110, start_minute: 600, end_minute: 1200 };
        let c = a.intersection(&b).expect("overlap");
        assert_eq!(c.days, 0b0000_0110);
        assert_eq!((c.start_minute, c.end_minute), (600, 1080));
    }
}
