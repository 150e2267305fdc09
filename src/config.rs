// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! What to render, where to put it, and how many workers to use.

use std::path::PathBuf;

use crate::bitmap::ImageSpec;
use crate::errors::{JuliaError, Result};
use crate::julia::JuliaParams;

/// Where the image goes unless told otherwise.
pub const DEFAULT_OUTPUT: &str = "out_julia.bmp";

/// Tint bias used for every pixel unless told otherwise.
pub const DEFAULT_TINT: f64 = 1.0;

/// Largest worker group we will try to start.  Every worker is a thread
/// holding a whole strip in memory.
pub const MAX_WORKERS: usize = 1024;

/// A complete description of one run.
#[derive(Clone, Debug)]
pub struct RenderConfig {
    /// Image height; the width is twice this
    pub height: u32,
    /// Size of the worker group
    pub workers: usize,
    /// Destination file, replaced on success
    pub output: PathBuf,
    /// Tint bias handed to the pixel renderer
    pub tint_bias: f64,
    /// Renderer constants
    pub julia: JuliaParams,
}

impl RenderConfig {
    /// The defaults for an image `height` rows high: one worker per
    /// CPU, the default output file and tint.
    pub fn new(height: u32) -> Self {
        RenderConfig {
            height,
            workers: num_cpus::get().min(MAX_WORKERS),
            output: PathBuf::from(DEFAULT_OUTPUT),
            tint_bias: DEFAULT_TINT,
            julia: JuliaParams::default(),
        }
    }

    /// Use `workers` workers.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Write to `output`.
    pub fn with_output<P: Into<PathBuf>>(mut self, output: P) -> Self {
        self.output = output.into();
        self
    }

    /// Use tint bias `tint_bias`.
    pub fn with_tint(mut self, tint_bias: f64) -> Self {
        self.tint_bias = tint_bias;
        self
    }

    /// Use different renderer constants.
    pub fn with_params(mut self, julia: JuliaParams) -> Self {
        self.julia = julia;
        self
    }

    /// Check everything that can be checked before any work starts,
    /// returning the image the run will produce.
    pub fn validate(&self) -> Result<ImageSpec> {
        if self.workers == 0 {
            return Err(JuliaError::InvalidInput(
                "at least one worker is needed".to_string(),
            ));
        }
        if self.workers > MAX_WORKERS {
            return Err(JuliaError::InvalidInput(format!(
                "{} workers is more than the limit of {}",
                self.workers, MAX_WORKERS
            )));
        }
        if !self.tint_bias.is_finite() || self.tint_bias < 0.0 {
            return Err(JuliaError::InvalidInput(format!(
                "the tint bias must be a non-negative number, not {}",
                self.tint_bias
            )));
        }
        ImageSpec::from_height(self.height)
    }
}
