// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Splits the rows of an image into one contiguous strip per worker.
//!
//! Every worker can compute any worker's strip from nothing but the
//! row count, the group size and a rank, so no worker ever has to ask
//! another where its rows begin.  The remainder of an uneven split goes
//! one row apiece to the lowest ranks.

use std::ops::Range;

use crate::errors::{JuliaError, Result};

/// A half-open range of image rows, `start..end`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RowRange {
    /// First row, inclusive
    pub start: u32,
    /// Last row, exclusive
    pub end: u32,
}

impl RowRange {
    /// Number of rows in the strip.  May be zero when there are more
    /// workers than rows.
    pub fn len(&self) -> u32 {
        self.end - self.start
    }

    /// True for a strip with no rows.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// The rows, for iteration.
    pub fn rows(&self) -> Range<u32> {
        self.start..self.end
    }
}

/// The strip belonging to `rank` when `total_rows` rows are split among
/// `workers` workers.
pub fn partition(total_rows: u32, workers: usize, rank: usize) -> Result<RowRange> {
    if total_rows == 0 || workers == 0 || rank >= workers {
        return Err(JuliaError::InvalidPartition {
            rows: total_rows,
            rank,
            workers,
        });
    }

    let rows = u64::from(total_rows);
    let (workers, rank) = (workers as u64, rank as u64);
    let base = rows / workers;
    let remainder = rows % workers;

    let start = base * rank + rank.min(remainder);
    let end = start + base + if rank < remainder { 1 } else { 0 };
    Ok(RowRange {
        start: start as u32,
        end: end as u32,
    })
}

/// Every rank's strip, in rank order.
pub fn partitions(total_rows: u32, workers: usize) -> Result<Vec<RowRange>> {
    if workers == 0 {
        return Err(JuliaError::InvalidPartition {
            rows: total_rows,
            rank: 0,
            workers,
        });
    }
    (0..workers)
        .map(|rank| partition(total_rows, workers, rank))
        .collect()
}
