//! Slot-based commitment floor.
//!
//! The block is cut into slots of `delta = max(d_min_up, d_min_down)` hours
//! and every hour of a slot gets the largest rounded-up guide value found in
//! that slot. All `delta` alignments are tried; the one adding the fewest
//! unit-hours wins, the lowest offset on ties. With offset `o > 0` the hours
//! before `o` form a shorter leading slot, and the last slot is cut by the
//! end of the block.

use tracing::debug;

/// Slot schedule for one alignment.
pub fn slot_schedule(ceil_guide: &[u32], upper: &[u32], delta: usize, offset: usize) -> Vec<u32> {
    let len = ceil_guide.len();
    let mut out = vec![0; len];
    let mut bounds = Vec::new();
    if offset > 0 {
        bounds.push(0..offset.min(len));
    }
    let mut start = offset;
    while start < len {
        let end = (start + delta.max(1)).min(len);
        bounds.push(start..end);
        start = end;
    }
    for slot in bounds {
        let peak = ceil_guide[slot.clone()].iter().copied().max().unwrap_or(0);
        for t in slot {
            out[t] = peak.min(upper.get(t).copied().unwrap_or(u32::MAX));
        }
    }
    out
}

/// Best slot schedule over every alignment, and the offset it uses.
pub fn fast_schedule(ceil_guide: &[u32], upper: &[u32], delta: usize) -> (Vec<u32>, usize) {
    if delta <= 1 || ceil_guide.is_empty() {
        return (slot_schedule(ceil_guide, upper, 1, 0), 0);
    }
    let mut best: Option<(u64, usize, Vec<u32>)> = None;
    for offset in 0..delta.min(ceil_guide.len()) {
        let candidate = slot_schedule(ceil_guide, upper, delta, offset);
        let total: u64 = candidate.iter().map(|&v| u64::from(v)).sum();
        if best.as_ref().map_or(true, |(b, _, _)| total < *b) {
            best = Some((total, offset, candidate));
        }
    }
    match best {
        Some((total, offset, schedule)) => {
            debug!(delta, offset, unit_hours = total, "slot alignment selected");
            (schedule, offset)
        }
        None => (ceil_guide.to_vec(), 0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_schedule_alignment() {
        let guide = vec![1, 1, 2, 1, 1, 1];
        let upper = vec![3; 6];
        assert_eq!(slot_schedule(&guide, &upper, 3, 0), vec![2, 2, 2, 1, 1, 1]);
        assert_eq!(slot_schedule(&guide, &upper, 3, 1), vec![1, 2, 2, 2, 1, 1]);
        assert_eq!(slot_schedule(&guide, &upper, 3, 2), vec![1, 1, 2, 2, 2, 1]);
    }

    #[test]
    fn test_peak_capped_by_upper_bound() {
        let guide = vec![1, 3, 1];
        let upper = vec![2, 3, 3];
        assert_eq!(slot_schedule(&guide, &upper, 3, 0), vec![2, 3, 3]);
    }

    #[test]
    fn test_best_offset_minimises_unit_hours() {
        // two peaks 3 hours apart fit in one slot only with offset 1
        let guide = vec![0, 1, 0, 1, 0, 0, 0, 0];
        let upper = vec![5; 8];
        let (schedule, offset) = fast_schedule(&guide, &upper, 3);
        assert_eq!(offset, 1);
        assert_eq!(schedule, vec![0, 1, 1, 1, 0, 0, 0, 0]);
    }

    #[test]
    fn test_ties_keep_lowest_offset() {
        let mut guide = vec![2; 168];
        guide[13] = 3;
        let upper = vec![3; 168];
        let (schedule, offset) = fast_schedule(&guide, &upper, 10);
        assert_eq!(offset, 0);
        for (t, &v) in schedule.iter().enumerate() {
            let expected = if (10..20).contains(&t) { 3 } else { 2 };
            assert_eq!(v, expected, "hour {t}");
        }
    }

    #[test]
    fn test_unit_delta_returns_guide() {
        let guide = vec![0, 2, 1];
        assert_eq!(fast_schedule(&guide, &[3, 3, 3], 1), (guide.clone(), 0));
    }
}
