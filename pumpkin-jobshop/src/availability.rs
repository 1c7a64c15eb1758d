/// Tracks, for every slice, the earliest time at which operations of the next decomposition group
/// may use it.
///
/// The earliest start of a slice never decreases: occupying a slice until a time which lies before
/// its current earliest start leaves it untouched. This is what guarantees that a group can never
/// conflict with the operations committed by the groups solved before it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Availability {
    earliest_start: Box<[i32]>,
}

impl Availability {
    /// Every slice is available from time 0.
    pub fn new(num_slices: usize) -> Self {
        Availability {
            earliest_start: vec![0; num_slices].into_boxed_slice(),
        }
    }

    pub fn num_slices(&self) -> usize {
        self.earliest_start.len()
    }

    pub fn earliest_start(&self, slice: usize) -> i32 {
        self.earliest_start[slice]
    }

    /// The earliest time at which any slice is available (0 if there are no slices).
    pub fn min_earliest_start(&self) -> i32 {
        self.earliest_start.iter().copied().min().unwrap_or(0)
    }

    /// The earliest time at which all slices are available (0 if there are no slices).
    pub fn max_earliest_start(&self) -> i32 {
        self.earliest_start.iter().copied().max().unwrap_or(0)
    }

    /// Record that `slice` is in use until `until`.
    pub fn occupy(&mut self, slice: usize, until: i32) {
        let earliest_start = &mut self.earliest_start[slice];
        *earliest_start = (*earliest_start).max(until);
    }

    pub fn as_slice(&self) -> &[i32] {
        &self.earliest_start
    }

    /// Returns true if no slice becomes available later in `self` than in `other`.
    pub fn is_dominated_by(&self, other: &Availability) -> bool {
        self.num_slices() == other.num_slices()
            && self
                .earliest_start
                .iter()
                .zip(other.earliest_start.iter())
                .all(|(ours, theirs)| ours <= theirs)
    }
}
