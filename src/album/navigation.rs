//! Paging links for the single item view.
//!
//! Around the item being viewed we show at most seven strip thumbnails and,
//! for longer directories, a "Prev N" / "Next N" pair that jumps up to seven
//! items at a time.

const RADIUS: usize = 3;
const JUMP_CAP: usize = 7;
/// Lists longer than this get a sliding strip instead of the full list.
const STRIP_LIMIT: usize = 2 * RADIUS + 1;
/// Lists whose last index exceeds this get jump links.
const JUMP_MIN_LAST_INDEX: usize = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Jump {
    /// Index of the item the link points at.
    pub target: usize,
    /// Count shown on the link.
    pub step: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationWindow {
    pub current: usize,
    pub prev_jump: Option<Jump>,
    pub next_jump: Option<Jump>,
    /// First strip index, inclusive.
    pub lower: usize,
    /// Last strip index, inclusive.
    pub upper: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StripEntry<'a, T> {
    pub index: usize,
    pub item: &'a T,
    pub is_current: bool,
}

impl NavigationWindow {
    /// Window for the item at `current` in a list of `len` siblings.
    /// `len` must be non-zero and `current < len`.
    pub fn compute(len: usize, current: usize) -> Self {
        debug_assert!(current < len, "current index {} out of {}", current, len);
        let last = len.saturating_sub(1);
        let current = current.min(last);

        let (prev_jump, next_jump) = if last > JUMP_MIN_LAST_INDEX {
            (prev_jump(current, last), next_jump(current, last))
        } else {
            (None, None)
        };
        let (lower, upper) = strip_bounds(len, current);

        Self {
            current,
            prev_jump,
            next_jump,
            lower,
            upper,
        }
    }

    pub fn strip_len(&self) -> usize {
        self.upper - self.lower + 1
    }

    /// The strip as entries of `items`, which must be the list the window
    /// was computed for.
    pub fn entries<'a, T>(&self, items: &'a [T]) -> Vec<StripEntry<'a, T>> {
        (self.lower..=self.upper)
            .filter_map(|index| {
                items.get(index).map(|item| StripEntry {
                    index,
                    item,
                    is_current: index == self.current,
                })
            })
            .collect()
    }
}

fn prev_jump(current: usize, last: usize) -> Option<Jump> {
    if current <= RADIUS {
        return None;
    }
    let step = (current - RADIUS).min(JUMP_CAP);
    // Near the end the strip is pushed back, so jump past its lower edge.
    let shift = current.saturating_sub(last.saturating_sub(RADIUS));
    Some(Jump {
        target: current.saturating_sub(step + shift),
        step,
    })
}

fn next_jump(current: usize, last: usize) -> Option<Jump> {
    if current + RADIUS >= last {
        return None;
    }
    let step = (last - RADIUS - current).min(JUMP_CAP);
    // Near the start the strip is pushed forward, so jump past its upper edge.
    let shift = if current < RADIUS { RADIUS } else { 0 };
    Some(Jump {
        target: (current + step + shift).min(last),
        step,
    })
}

fn strip_bounds(len: usize, current: usize) -> (usize, usize) {
    let last = len.saturating_sub(1);
    if len <= STRIP_LIMIT {
        return (0, last);
    }

    let mut lower = 0;
    let mut upper = last;
    let mut extra = 0;

    if current > RADIUS {
        lower = current - RADIUS;
    } else {
        extra = RADIUS - current;
    }

    if last - current > RADIUS {
        upper = current + RADIUS + extra;
    } else {
        lower = lower.saturating_sub(RADIUS - (last - current));
    }

    (lower, upper.min(last))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_list_has_no_jumps_and_full_strip() {
        let window = NavigationWindow::compute(5, 2);
        assert_eq!(window.prev_jump, None);
        assert_eq!(window.next_jump, None);
        assert_eq!((window.lower, window.upper), (0, 4));
    }

    #[test]
    fn test_middle_of_long_list() {
        let window = NavigationWindow::compute(20, 10);
        assert_eq!(window.prev_jump, Some(Jump { target: 3, step: 7 }));
        // last - 3 - current = 19 - 3 - 10 = 6
        assert_eq!(window.next_jump, Some(Jump { target: 16, step: 6 }));
        assert_eq!((window.lower, window.upper), (7, 13));
        assert_eq!(window.strip_len(), 7);
    }

    #[test]
    fn test_start_of_long_list() {
        let window = NavigationWindow::compute(20, 0);
        assert_eq!(window.prev_jump, None);
        assert_eq!(window.next_jump, Some(Jump { target: 10, step: 7 }));
        assert_eq!((window.lower, window.upper), (0, 6));
    }

    #[test]
    fn test_end_of_long_list() {
        let window = NavigationWindow::compute(20, 19);
        assert_eq!(window.prev_jump, Some(Jump { target: 9, step: 7 }));
        assert_eq!(window.next_jump, None);
        assert_eq!((window.lower, window.upper), (13, 19));
    }

    #[test]
    fn test_eight_items_slide_without_jumps() {
        let window = NavigationWindow::compute(8, 7);
        assert_eq!(window.prev_jump, None);
        assert_eq!(window.next_jump, None);
        assert_eq!((window.lower, window.upper), (1, 7));

        let window = NavigationWindow::compute(8, 2);
        assert_eq!((window.lower, window.upper), (0, 6));
    }

    #[test]
    fn test_small_jumps_near_edges() {
        // current 4 in 10 items: one step back, nothing to shift
        let window = NavigationWindow::compute(10, 4);
        assert_eq!(window.prev_jump, Some(Jump { target: 3, step: 1 }));
        // last - 3 - current = 9 - 3 - 4 = 2
        assert_eq!(window.next_jump, Some(Jump { target: 6, step: 2 }));

        let window = NavigationWindow::compute(10, 1);
        assert_eq!(window.prev_jump, None);
        assert_eq!(window.next_jump, Some(Jump { target: 9, step: 5 }));
    }

    #[test]
    fn test_window_invariants_for_every_position() {
        for len in 1..40 {
            for current in 0..len {
                let window = NavigationWindow::compute(len, current);
                assert!(window.lower <= current && current <= window.upper);
                assert!(window.upper < len);
                assert_eq!(window.strip_len(), len.min(7), "len {} current {}", len, current);
                if let Some(jump) = window.prev_jump {
                    assert!(jump.target < current);
                    assert!(jump.step <= 7);
                }
                if let Some(jump) = window.next_jump {
                    assert!(jump.target > current && jump.target < len);
                    assert!(jump.step <= 7);
                }
            }
        }
    }

    #[test]
    fn test_entries_mark_current() {
        let items: Vec<String> = (0..12).map(|i| format!("img{:02}.jpg", i)).collect();
        let window = NavigationWindow::compute(items.len(), 5);
        let entries = window.entries(&items);

        assert_eq!(entries.len(), 7);
        assert_eq!(entries[0].item, "img02.jpg");
        let current: Vec<_> = entries.iter().filter(|e| e.is_current).collect();
        assert_eq!(current.len(), 1);
        assert_eq!(current[0].index, 5);
    }
}
