// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The one error type shared by every stage of a render.  Nothing in
//! this crate is retried, so every variant is fatal for the whole run;
//! the variants only exist so the binary can say *why*.

use failure::Fail;
use std::io;
use std::path::PathBuf;

/// Everything that can go wrong while rendering and assembling an image.
#[derive(Debug, Fail)]
pub enum JuliaError {
    /// The user asked for something we cannot render: a non-positive
    /// height, zero workers, a negative tint, and so on.
    #[fail(display = "Invalid input: {}", _0)]
    InvalidInput(String),

    /// The pixel renderer was handed a coordinate outside the image.
    /// Given a correct partition this is unreachable.
    #[fail(
        display = "Invalid ({},{}) pixel coordinates in a {} x {} image",
        x, y, width, height
    )]
    CoordinateOutOfRange {
        /// Column requested
        x: i64,
        /// Row requested
        y: i64,
        /// Width of the image
        width: u32,
        /// Height of the image
        height: u32,
    },

    /// The partitioner was asked for a rank it cannot describe.
    #[fail(
        display = "Cannot partition {} rows for rank {} of {} workers",
        rows, rank, workers
    )]
    InvalidPartition {
        /// Rows being split
        rows: u32,
        /// Rank asked about
        rank: usize,
        /// Size of the group
        workers: usize,
    },

    /// The complex viewport is inside-out or empty.
    #[fail(display = "Invalid viewport: {}", _0)]
    InvalidViewport(String),

    /// The designated participant could not create the output or write
    /// its header.
    #[fail(display = "Could not write bitmap header to {:?}: {}", path, cause)]
    HeaderIo {
        /// Where we tried to write
        path: PathBuf,
        /// What the OS said
        #[fail(cause)]
        cause: io::Error,
    },

    /// A participant could not take part in the ordered write.
    #[fail(display = "Ordered write failed for rank {}: {}", rank, reason)]
    CollectiveWrite {
        /// The participant that noticed the failure
        rank: usize,
        /// What went wrong
        reason: String,
    },

    /// The shared output could not be written or flushed.
    #[fail(display = "I/O failure during ordered write for rank {}: {}", rank, cause)]
    CollectiveIo {
        /// The participant holding the token when the write failed
        rank: usize,
        /// What the OS said
        #[fail(cause)]
        cause: io::Error,
    },

    /// The assembled image could not be moved into place.
    #[fail(display = "Could not publish the image at {:?}: {}", path, cause)]
    PublishIo {
        /// The destination
        path: PathBuf,
        /// What the OS said
        #[fail(cause)]
        cause: io::Error,
    },

    /// The OS refused to start a worker thread.
    #[fail(display = "Could not start worker {}: {}", rank, cause)]
    WorkerSpawn {
        /// The rank that never started
        rank: usize,
        /// What the OS said
        #[fail(cause)]
        cause: io::Error,
    },

    /// A worker thread unwound instead of returning.
    #[fail(display = "Worker {} panicked", _0)]
    WorkerPanicked(usize),
}

impl JuliaError {
    /// True for errors that merely report that *another* participant
    /// failed first.  When collecting worker results we prefer to report
    /// the first real failure.
    pub fn is_abort(&self) -> bool {
        match self {
            JuliaError::CollectiveWrite { reason, .. } => reason.starts_with(ABORTED),
            _ => false,
        }
    }
}

pub(crate) const ABORTED: &str = "aborted by rank";

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, JuliaError>;
