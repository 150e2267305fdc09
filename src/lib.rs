#![deny(missing_docs)]
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Julia strips renderer
//!
//! Draws a Julia set by cutting the image into horizontal strips, one
//! per worker.  Each worker renders its strip on its own, knowing
//! nothing but its rank and the size of the group, and then the strips
//! are appended to a single bitmap strictly in rank order.
//!
//! The point of all this care is that the file does not depend on how
//! the work was divided: one worker or a hundred, finishing in any
//! order, the bytes on disk are the same.
//!
//! The pieces, from the bottom up:
//!
//! * [`julia`] colors one pixel,
//! * [`partition`] decides which rows belong to which rank,
//! * [`block`] renders a rank's rows into bytes,
//! * [`bitmap`] describes the file and writes its header,
//! * [`collective`] appends every rank's bytes in rank order,
//! * [`render`] runs the group.

extern crate crossbeam;
extern crate failure;
extern crate itertools;
#[macro_use]
extern crate log;
extern crate num;
extern crate num_cpus;
extern crate tempfile;

pub mod bitmap;
pub mod block;
pub mod collective;
pub mod config;
pub mod errors;
pub mod julia;
pub mod partition;
pub mod planes;
pub mod render;

pub use bitmap::{BmpHeader, ImageSpec};
pub use block::{build_block, PixelBuffer};
pub use collective::{OrderedAppend, Participant, TokenPassingWriter};
pub use config::RenderConfig;
pub use errors::{JuliaError, Result};
pub use julia::{JuliaParams, JuliaRenderer, PixelRenderer, Precision};
pub use partition::{partition, partitions, RowRange};
pub use render::{assemble, render, render_to_vec, RenderSummary};
