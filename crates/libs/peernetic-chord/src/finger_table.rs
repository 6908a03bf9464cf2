//! Chord's finger table (spec §3, §4.10): an ordered array of `bit_count`
//! entries, each tracking the peer expected to own a particular position
//! on the identifier ring. No teacher analogue exists for a DHT routing
//! table — this is grounded directly in spec.md's fully worked example
//! (base id 0, bit count 6, insert 16/2/8/4 → final ids
//! `[2, 2, 4, 8, 16, 0]`) and its stated invariants.

use std::fmt;

/// Signed ring distance from `base` to `a` versus `base` to `b`: positive
/// when `a` sits farther around the ring (rooted at `base`) than `b`,
/// negative when closer, zero when equal. Used for every "after"/"closer"
/// comparison in this module instead of raw id comparison, since ids wrap.
pub fn compare_position(ring_size: u64, base: u64, a: u64, b: u64) -> i128 {
    position(ring_size, base, a) as i128 - position(ring_size, base, b) as i128
}

fn position(ring_size: u64, base: u64, id: u64) -> u64 {
    id.wrapping_sub(base) % ring_size
}

#[derive(Clone, Debug)]
struct FingerEntry<T> {
    expected_id: u64,
    current_id: u64,
    current_value: T,
}

/// Chord's per-node routing table: `bit_count` entries, entry `i`
/// responsible for expected id `base + 2^i (mod 2^bit_count)`.
///
/// `T` is whatever a caller attaches to a ring id — typically a
/// [`peernetic_core::Address`] to route to. `bit_count` must be `< 64` so
/// every expected id fits in a `u64`.
#[derive(Clone)]
pub struct FingerTable<T> {
    base_id: u64,
    bit_count: u32,
    ring_size: u64,
    self_value: T,
    entries: Vec<FingerEntry<T>>,
}

impl<T: Clone> FingerTable<T> {
    /// Builds a table with every entry initially pointing to `self_value`
    /// (spec §3: "entries pointing to self form a contiguous tail" — the
    /// whole table is that tail before anything is known).
    pub fn new(base_id: u64, bit_count: u32, self_value: T) -> Self {
        assert!(bit_count < 64, "bit_count must fit a u64 ring");
        let ring_size = 1u64 << bit_count;
        let base_id = base_id % ring_size;
        let entries = (0..bit_count)
            .map(|i| FingerEntry {
                expected_id: (base_id + (1u64 << i)) % ring_size,
                current_id: base_id,
                current_value: self_value.clone(),
            })
            .collect();
        FingerTable {
            base_id,
            bit_count,
            ring_size,
            self_value,
            entries,
        }
    }

    pub fn bit_count(&self) -> u32 {
        self.bit_count
    }

    pub fn ring_size(&self) -> u64 {
        self.ring_size
    }

    /// The base id this table is rooted at (spec §4.10's `getRouterId`).
    pub fn router_id(&self) -> u64 {
        self.base_id
    }

    fn position(&self, id: u64) -> u64 {
        position(self.ring_size, self.base_id, id)
    }

    fn compare(&self, a: u64, b: u64) -> i128 {
        compare_position(self.ring_size, self.base_id, a, b)
    }

    /// Current ids of every entry, in index order — exactly the form the
    /// spec's worked example compares against (`[2, 2, 4, 8, 16, 0]`).
    pub fn current_ids(&self) -> Vec<u64> {
        self.entries.iter().map(|e| e.current_id).collect()
    }

    pub fn entry(&self, index: usize) -> Option<(u64, &T)> {
        self.entries
            .get(index)
            .map(|e| (e.current_id, &e.current_value))
    }

    fn first_index_covering(&self, id: u64) -> usize {
        let pos = self.position(id);
        self.entries
            .iter()
            .position(|e| self.position(e.expected_id) >= pos)
            .unwrap_or(self.entries.len() - 1)
    }

    /// Inserts `id`/`value` at the smallest entry whose expected id is `>=
    /// id` (in ring order), then propagates backwards, overwriting
    /// neighbours that either still point to self or are farther from
    /// `id` than `id` itself — stopping at the first neighbour already
    /// closer (spec §3 `put`).
    pub fn put(&mut self, id: u64, value: T) {
        let idx = self.first_index_covering(id);
        self.entries[idx].current_id = id;
        self.entries[idx].current_value = value.clone();
        for j in (0..idx).rev() {
            let current = self.entries[j].current_id;
            let still_self = current == self.base_id;
            let is_farther = self.compare(current, id) > 0;
            if still_self || is_farther {
                self.entries[j].current_id = id;
                self.entries[j].current_value = value.clone();
            } else {
                break;
            }
        }
    }

    /// Directly overwrites a single entry slot with `id`/`value`, with no
    /// backward propagation (spec §4.10 `replace` — used to correct one
    /// known-stale entry without touching its neighbours, unlike `put`).
    pub fn replace(&mut self, index: usize, id: u64, value: T) {
        if let Some(entry) = self.entries.get_mut(index) {
            entry.current_id = id;
            entry.current_value = value;
        }
    }

    /// Removes `id` from the table: finds its highest-index occurrence,
    /// takes the value from the slot immediately after it (or self, past
    /// the last slot), and overwrites backwards until a slot that did not
    /// hold `id` is reached (spec §3 `remove`).
    pub fn remove(&mut self, id: u64) {
        let Some(top) = self.entries.iter().rposition(|e| e.current_id == id) else {
            return;
        };
        let (next_id, next_value) = if top + 1 < self.entries.len() {
            let next = &self.entries[top + 1];
            (next.current_id, next.current_value.clone())
        } else {
            (self.base_id, self.self_value.clone())
        };
        for j in (0..=top).rev() {
            if self.entries[j].current_id == id {
                self.entries[j].current_id = next_id;
                self.entries[j].current_value = next_value.clone();
            } else {
                break;
            }
        }
    }

    /// Resets to self every entry whose current pointer sits at or beyond
    /// `id` in ring order (spec §4.10 `clearBefore` — used when a remove
    /// invalidates everything our knowledge of the ring claimed past that
    /// point). Because the table is monotone in ring position, this is
    /// always a suffix of the entries, which keeps the self-pointing tail
    /// invariant intact.
    pub fn clear_before(&mut self, id: u64) {
        let pos = self.position(id);
        let ring_size = self.ring_size;
        let base_id = self.base_id;
        let self_value = self.self_value.clone();
        for entry in self.entries.iter_mut() {
            if entry.current_id != base_id && position(ring_size, base_id, entry.current_id) >= pos {
                entry.current_id = base_id;
                entry.current_value = self_value.clone();
            }
        }
    }

    /// Scans entries from the highest index down and returns the first
    /// whose id lies strictly within the open ring interval `(base, id)`
    /// and is not in `ignored`; falls back to self if none qualify
    /// (spec §3 `findClosestPreceding`).
    pub fn find_closest_preceding(&self, id: u64, ignored: &[u64]) -> (u64, T) {
        let target_pos = self.position(id);
        for entry in self.entries.iter().rev() {
            let candidate = entry.current_id;
            if candidate == self.base_id {
                continue;
            }
            if ignored.contains(&candidate) {
                continue;
            }
            let candidate_pos = self.position(candidate);
            if candidate_pos > 0 && candidate_pos < target_pos {
                return (candidate, entry.current_value.clone());
            }
        }
        (self.base_id, self.self_value.clone())
    }

    /// The highest-index entry not pointing to self, i.e. the farthest
    /// peer currently known (spec §4.10 `getMaximumNonBase`).
    pub fn maximum_non_base(&self) -> Option<(u64, &T)> {
        self.entries
            .iter()
            .rev()
            .find(|e| e.current_id != self.base_id)
            .map(|e| (e.current_id, &e.current_value))
    }
}

impl<T> fmt::Debug for FingerTable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FingerTable")
            .field("base_id", &self.base_id)
            .field("bit_count", &self.bit_count)
            .field("current_ids", &self.entries.iter().map(|e| e.current_id).collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Finger-table construction (spec §8): base id 0, bit count 6,
    /// insert 16, 2, 8, 4 → final ids `[2, 2, 4, 8, 16, 0]`.
    #[test]
    fn worked_example_from_the_spec() {
        let mut table = FingerTable::new(0, 6, "self");
        table.put(16, "p16");
        table.put(2, "p2");
        table.put(8, "p8");
        table.put(4, "p4");
        assert_eq!(table.current_ids(), vec![2, 2, 4, 8, 16, 0]);
    }

    /// Finger-table tail (testable property 2): the set of self-pointing
    /// indices is always a contiguous suffix.
    #[test]
    fn self_pointing_entries_stay_a_contiguous_tail() {
        let mut table = FingerTable::new(0, 6, "self");
        table.put(16, "p16");
        let ids = table.current_ids();
        let first_self = ids.iter().position(|&id| id == 0).unwrap();
        assert!(ids[first_self..].iter().all(|&id| id == 0));
        assert!(ids[..first_self].iter().all(|&id| id != 0));
    }

    /// Finger-table monotonicity (testable property 3): after put(p),
    /// findClosestPreceding(p+1) returns p or something closer to p than
    /// anything previously reachable.
    #[test]
    fn put_improves_closest_preceding() {
        let mut table = FingerTable::new(0, 6, "self");
        table.put(16, "p16");
        let (before, _) = table.find_closest_preceding(17, &[]);
        assert_eq!(before, 16);
        // A farther peer lands past the existing tail and does not
        // overwrite the closer entries already discovered.
        table.put(20, "p20");
        assert_eq!(table.current_ids(), vec![16, 16, 16, 16, 16, 20]);
        let (still_16, _) = table.find_closest_preceding(17, &[]);
        assert_eq!(still_16, 16);
        let (now_20, _) = table.find_closest_preceding(21, &[]);
        assert_eq!(now_20, 20);
    }

    #[test]
    fn remove_falls_back_to_the_next_slot() {
        let mut table = FingerTable::new(0, 6, "self");
        table.put(16, "p16");
        table.put(2, "p2");
        assert_eq!(table.current_ids(), vec![2, 2, 16, 16, 16, 0]);
        table.remove(16);
        assert_eq!(table.current_ids(), vec![2, 2, 0, 0, 0, 0]);
    }

    #[test]
    fn remove_of_absent_id_is_a_no_op() {
        let mut table = FingerTable::new(0, 6, "self");
        table.put(16, "p16");
        let before = table.current_ids();
        table.remove(99);
        assert_eq!(table.current_ids(), before);
    }

    #[test]
    fn find_closest_preceding_honors_ignored_list() {
        let mut table = FingerTable::new(0, 6, "self");
        table.put(16, "p16");
        table.put(2, "p2");
        let (id, _) = table.find_closest_preceding(17, &[16]);
        assert_eq!(id, 2);
    }

    #[test]
    fn find_closest_preceding_falls_back_to_self_when_nothing_qualifies() {
        let table = FingerTable::new(0, 6, "self");
        let (id, value) = table.find_closest_preceding(5, &[]);
        assert_eq!(id, 0);
        assert_eq!(value, "self");
    }

    #[test]
    fn maximum_non_base_is_the_farthest_known_peer() {
        let mut table = FingerTable::new(0, 6, "self");
        table.put(16, "p16");
        table.put(2, "p2");
        let (id, _) = table.maximum_non_base().unwrap();
        assert_eq!(id, 16);
    }

    #[test]
    fn clear_before_resets_the_suffix_and_keeps_the_tail_invariant() {
        let mut table = FingerTable::new(0, 6, "self");
        table.put(16, "p16");
        table.put(2, "p2");
        table.put(8, "p8");
        table.clear_before(10);
        let ids = table.current_ids();
        assert_eq!(ids, vec![2, 2, 8, 8, 0, 0]);
    }

    #[test]
    fn replace_overwrites_a_single_slot_without_propagating() {
        let mut table = FingerTable::new(0, 6, "self");
        table.put(16, "p16");
        table.replace(2, 40, "p40");
        assert_eq!(table.current_ids(), vec![16, 16, 40, 16, 16, 0]);
    }

    #[test]
    fn router_id_is_the_base() {
        let table: FingerTable<&str> = FingerTable::new(7, 6, "self");
        assert_eq!(table.router_id(), 7);
    }
}
