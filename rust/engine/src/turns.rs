/// Next seat after `from` walking clockwise, skipping seats for which
/// `is_active` is false.
///
/// Each seat is visited at most once, so the walk always terminates. When
/// `from` is the only active seat it is returned; when no seat is active the
/// result is `None`.
///
/// ```
/// use cardtable_engine::turns::next_active;
///
/// let folded = [false, true, false];
/// assert_eq!(next_active(3, 0, |i| !folded[i]), Some(2));
/// assert_eq!(next_active(3, 2, |i| !folded[i]), Some(0));
/// ```
pub fn next_active(len: usize, from: usize, is_active: impl Fn(usize) -> bool) -> Option<usize> {
    if len == 0 {
        return None;
    }
    (1..=len).map(|step| (from + step) % len).find(|&i| is_active(i))
}

/// Count of seats for which `is_active` holds.
pub fn active_count(len: usize, is_active: impl Fn(usize) -> bool) -> usize {
    (0..len).filter(|&i| is_active(i)).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_around_the_table() {
        assert_eq!(next_active(4, 3, |_| true), Some(0));
        assert_eq!(next_active(4, 1, |_| true), Some(2));
    }

    #[test]
    fn sole_survivor_is_returned() {
        let alive = [false, false, true, false];
        assert_eq!(next_active(4, 2, |i| alive[i]), Some(2));
        assert_eq!(next_active(4, 0, |i| alive[i]), Some(2));
    }

    #[test]
    fn nobody_active_yields_none() {
        assert_eq!(next_active(3, 1, |_| false), None);
        assert_eq!(next_active(0, 0, |_| true), None);
    }

    #[test]
    fn counts_active_seats() {
        let alive = [true, false, true];
        assert_eq!(active_count(3, |i| alive[i]), 2);
    }
}
