//! Communication policy: the collective operations the engine needs
//!
//! The engine only ever blocks in two places, both of which live behind this
//! trait: the all-reduce MIN used once at startup to size the communication
//! interval, and the all-to-all-v spike gather at each epoch boundary. Every
//! implementation must be collective: each rank participates exactly once per
//! call, in matching order.

use crate::error::Result;
use crate::types::Spike;

/// Result of an all-to-all gather: the flat concatenation of every rank's
/// contribution plus the partition offsets, such that
/// `values[offsets[r]..offsets[r+1]]` is rank `r`'s part.
#[derive(Debug, Clone, PartialEq)]
pub struct GatheredVector<T> {
    values: Vec<T>,
    offsets: Vec<u32>,
}

impl<T> GatheredVector<T> {
    /// Assemble from values and per-rank offsets.
    ///
    /// Offsets must be non-decreasing, start at zero and end at
    /// `values.len()`.
    pub fn new(values: Vec<T>, offsets: Vec<u32>) -> Self {
        debug_assert!(offsets.first() == Some(&0));
        debug_assert!(offsets.last().copied() == Some(values.len() as u32));
        debug_assert!(offsets.windows(2).all(|w| w[0] <= w[1]));
        Self { values, offsets }
    }

    /// All values in rank order.
    pub fn values(&self) -> &[T] {
        &self.values
    }

    /// Partition offsets; `offsets()[nranks]` equals `values().len()`.
    pub fn offsets(&self) -> &[u32] {
        &self.offsets
    }

    /// Number of participating ranks.
    pub fn num_ranks(&self) -> usize {
        self.offsets.len() - 1
    }

    /// The slice contributed by rank `r`.
    pub fn values_for_rank(&self, r: usize) -> &[T] {
        &self.values[self.offsets[r] as usize..self.offsets[r + 1] as usize]
    }

    /// Total number of gathered values.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Is the gather empty?
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Collective operations over all participating ranks.
pub trait CommunicationPolicy: Send + Sync {
    /// Index of the calling rank.
    fn id(&self) -> usize;

    /// Number of participating ranks.
    fn size(&self) -> usize;

    /// All-reduce minimum of `x` over all ranks.
    fn min(&self, x: f64) -> Result<f64>;

    /// All-to-all-v gather of spikes. Every rank receives the identical
    /// gathered vector; contributions appear in rank order and each rank's
    /// input order is preserved within its slice.
    fn gather_spikes(&self, spikes: Vec<Spike>) -> Result<GatheredVector<Spike>>;
}

/// Single-rank policy: every collective is the identity.
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialPolicy;

impl CommunicationPolicy for SerialPolicy {
    fn id(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn min(&self, x: f64) -> Result<f64> {
        Ok(x)
    }

    fn gather_spikes(&self, spikes: Vec<Spike>) -> Result<GatheredVector<Spike>> {
        let n = spikes.len() as u32;
        Ok(GatheredVector::new(spikes, vec![0, n]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CellMember;

    #[test]
    fn serial_gather_preserves_order_and_offsets() {
        let policy = SerialPolicy;
        let spikes = vec![
            Spike::new(CellMember::new(3, 0), 0.5),
            Spike::new(CellMember::new(1, 0), 0.25),
        ];
        let gathered = policy.gather_spikes(spikes.clone()).unwrap();

        assert_eq!(gathered.values(), spikes.as_slice());
        assert_eq!(gathered.offsets(), &[0, 2]);
        assert_eq!(gathered.num_ranks(), 1);
        assert_eq!(gathered.values_for_rank(0), spikes.as_slice());
    }

    #[test]
    fn serial_min_is_identity() {
        let policy = SerialPolicy;
        assert_eq!(policy.min(12.5).unwrap(), 12.5);
        assert_eq!(policy.id(), 0);
        assert_eq!(policy.size(), 1);
    }
}
