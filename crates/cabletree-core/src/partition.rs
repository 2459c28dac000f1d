//! Domain decomposition: gids to ranks and local cell groups
//!
//! The dense gid space `[0, num_cells)` is cut into contiguous,
//! near-equal-sized blocks, one per rank; the local block is further divided
//! into cell groups of `group_size` gids each (the last group may be
//! shorter).

use crate::error::{CoreError, Result};
use crate::types::CellGid;

/// Block partition of the gid space for one rank.
#[derive(Debug, Clone)]
pub struct DomainDecomposition {
    num_cells: CellGid,
    num_ranks: usize,
    rank: usize,
    /// rank boundaries, length `num_ranks + 1`
    rank_divisions: Vec<CellGid>,
    /// local group boundaries, covering exactly the local block
    group_divisions: Vec<CellGid>,
}

impl DomainDecomposition {
    /// Partition `num_cells` gids over `num_ranks` ranks and split the block
    /// owned by `rank` into groups of `group_size`.
    pub fn new(
        num_cells: CellGid,
        num_ranks: usize,
        rank: usize,
        group_size: CellGid,
    ) -> Result<Self> {
        if num_ranks == 0 || rank >= num_ranks {
            return Err(CoreError::invalid_parameter(
                "rank",
                rank,
                format!("< num_ranks = {}", num_ranks),
            ));
        }
        if group_size < 1 {
            return Err(CoreError::invalid_parameter("group_size", group_size, ">= 1"));
        }

        let rank_divisions: Vec<CellGid> = (0..=num_ranks as CellGid)
            .map(|r| num_cells * r / num_ranks as CellGid)
            .collect();

        let first = rank_divisions[rank];
        let last = rank_divisions[rank + 1];
        let mut group_divisions: Vec<CellGid> =
            (first..last).step_by(group_size as usize).collect();
        group_divisions.push(last);

        Ok(Self {
            num_cells,
            num_ranks,
            rank,
            rank_divisions,
            group_divisions,
        })
    }

    /// Total number of cells in the model.
    pub fn num_cells(&self) -> CellGid {
        self.num_cells
    }

    /// Number of participating ranks.
    pub fn num_ranks(&self) -> usize {
        self.num_ranks
    }

    /// The calling rank.
    pub fn rank(&self) -> usize {
        self.rank
    }

    /// Half-open gid range owned by this rank.
    pub fn local_range(&self) -> (CellGid, CellGid) {
        (
            self.rank_divisions[self.rank],
            self.rank_divisions[self.rank + 1],
        )
    }

    /// Is `gid` owned by this rank?
    pub fn is_local(&self, gid: CellGid) -> bool {
        let (first, last) = self.local_range();
        gid >= first && gid < last
    }

    /// Rank owning `gid`.
    pub fn rank_of(&self, gid: CellGid) -> Option<usize> {
        if gid >= self.num_cells {
            return None;
        }
        // first boundary strictly above gid, minus one
        Some(self.rank_divisions.partition_point(|&b| b <= gid) - 1)
    }

    /// Number of local cell groups.
    pub fn num_local_groups(&self) -> usize {
        self.group_divisions.len() - 1
    }

    /// Half-open gid range of local group `i`.
    pub fn group_range(&self, i: usize) -> (CellGid, CellGid) {
        (self.group_divisions[i], self.group_divisions[i + 1])
    }

    /// Index of the local group owning `gid`.
    pub fn group_index(&self, gid: CellGid) -> Option<usize> {
        if !self.is_local(gid) {
            return None;
        }
        Some(self.group_divisions.partition_point(|&b| b <= gid) - 1)
    }
}
