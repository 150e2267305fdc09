// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Runs a whole render: one scoped thread per rank, each rendering its
//! own strip and then taking its turn in the ordered write.
//!
//! Rank 0 is the designated participant.  Its duties, writing the
//! header before anyone starts and publishing the file after everyone
//! is done, are carried out on the launching thread, which bounds the
//! lives of all the workers.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::{Builder, NamedTempFile};

use crate::bitmap::{write_header, ImageSpec};
use crate::block::build_block;
use crate::collective::{OrderedAppend, Participant, Ticket, TokenPassingWriter};
use crate::config::RenderConfig;
use crate::errors::{JuliaError, Result};
use crate::julia::{JuliaRenderer, PixelRenderer};
use crate::partition::{partition, RowRange};

/// What one worker did.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct WorkerReport {
    /// The worker's rank
    pub rank: usize,
    /// The rows it rendered
    pub rows: RowRange,
    /// The bytes it appended
    pub bytes: usize,
}

/// What a successful run produced.
#[derive(Clone, Debug)]
pub struct RenderSummary {
    /// The image
    pub spec: ImageSpec,
    /// Where it was written
    pub output: PathBuf,
    /// Size of the file
    pub bytes: u64,
    /// One report per worker, in rank order
    pub workers: Vec<WorkerReport>,
}

fn run_worker<R, A>(
    me: Participant,
    renderer: &R,
    spec: &ImageSpec,
    tint_bias: f64,
    writer: &A,
) -> Result<WorkerReport>
where
    R: PixelRenderer + ?Sized,
    A: OrderedAppend + ?Sized,
{
    let ticket = Ticket::new(writer, me.rank);
    let rows = partition(spec.height, me.size, me.rank)?;
    info!(
        "Worker {}/{}: computing rows {} to {}, {} bytes",
        me.rank,
        me.size,
        rows.start,
        rows.end,
        spec.strip_bytes(rows.len())
    );
    let block = build_block(renderer, spec, rows, tint_bias)?;
    ticket.append(block.as_bytes())?;
    Ok(WorkerReport {
        rank: me.rank,
        rows,
        bytes: block.len(),
    })
}

// When several workers fail, most of them are only reporting that
// someone else failed first.  Report the first real cause.
fn first_cause(errors: Vec<JuliaError>) -> JuliaError {
    let mut fallback = None;
    for e in errors {
        if !e.is_abort() {
            return e;
        }
        if fallback.is_none() {
            fallback = Some(e);
        }
    }
    fallback.unwrap_or(JuliaError::WorkerPanicked(0))
}

/// Render the strips of `spec` with `workers` workers and append them,
/// in rank order, to `sink`.  Whatever `sink` already holds, normally
/// the header, stays in front.
pub fn assemble<R, W>(
    renderer: &R,
    spec: &ImageSpec,
    workers: usize,
    tint_bias: f64,
    sink: W,
) -> Result<(W, Vec<WorkerReport>)>
where
    R: PixelRenderer + ?Sized,
    W: Write + Send,
{
    let writer = TokenPassingWriter::for_image(sink, spec, workers)?;

    let results = crossbeam::scope(|spawner| {
        let writer = &writer;
        let mut handles = Vec::with_capacity(workers);
        let mut refused = None;
        for me in Participant::group(workers) {
            let started = spawner
                .builder()
                .name(format!("rank-{}", me.rank))
                .spawn(move |_| run_worker(me, renderer, spec, tint_bias, writer));
            match started {
                Ok(handle) => handles.push(handle),
                Err(cause) => {
                    // The ordered write can never complete without this rank.
                    writer.abort(me.rank);
                    refused = Some(JuliaError::WorkerSpawn {
                        rank: me.rank,
                        cause,
                    });
                    break;
                }
            }
        }
        let mut results = handles
            .into_iter()
            .enumerate()
            .map(|(rank, handle)| {
                handle
                    .join()
                    .unwrap_or(Err(JuliaError::WorkerPanicked(rank)))
            })
            .collect::<Vec<_>>();
        results.extend(refused.map(Err));
        results
    })
    .map_err(|_| JuliaError::WorkerPanicked(0))?;

    let mut reports = Vec::with_capacity(workers);
    let mut errors = Vec::new();
    for result in results {
        match result {
            Ok(report) => reports.push(report),
            Err(e) => errors.push(e),
        }
    }
    if !errors.is_empty() {
        let cause = first_cause(errors);
        error!("Render failed: {}", cause);
        return Err(cause);
    }

    Ok((writer.finish()?, reports))
}

/// Render the whole file into memory.
pub fn render_to_vec(config: &RenderConfig) -> Result<Vec<u8>> {
    let spec = config.validate()?;
    let renderer = JuliaRenderer::new(config.julia.clone())?;
    let mut sink = Vec::with_capacity(spec.file_bytes() as usize);
    write_header(&spec, &mut sink).map_err(|cause| JuliaError::HeaderIo {
        path: PathBuf::from("<memory>"),
        cause,
    })?;
    let (sink, _) = assemble(&renderer, &spec, config.workers, config.tint_bias, sink)?;
    Ok(sink)
}

fn staging_dir(output: &Path) -> &Path {
    match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

// Staged files are created with the mode a plain create would give,
// rather than the owner-only mode of a temporary file.
fn staging_file(output: &Path) -> io::Result<NamedTempFile> {
    let mut builder = Builder::new();
    builder.prefix(".julia").suffix(".bmp");
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(fs::Permissions::from_mode(0o666));
    }
    builder.tempfile_in(staging_dir(output))
}

// A file being replaced keeps its permissions.
fn keep_destination_mode(staged: &NamedTempFile, output: &Path) -> io::Result<()> {
    match fs::metadata(output) {
        Ok(meta) if meta.is_file() => staged.as_file().set_permissions(meta.permissions()),
        _ => Ok(()),
    }
}

/// Render to `config.output`.  The image is built in a temporary file
/// beside the destination and only renamed into place once every strip
/// is written and synced; a failed run leaves the destination as it
/// was.
pub fn render(config: &RenderConfig) -> Result<RenderSummary> {
    let spec = config.validate()?;
    let renderer = JuliaRenderer::new(config.julia.clone())?;
    let header_error = |cause| JuliaError::HeaderIo {
        path: config.output.clone(),
        cause,
    };

    info!(
        "Rendering a {} x {} image with {} workers",
        spec.width, spec.height, config.workers
    );

    let mut staged = staging_file(&config.output).map_err(header_error)?;
    write_header(&spec, staged.as_file_mut()).map_err(header_error)?;

    let shared = staged
        .as_file()
        .try_clone()
        .map_err(|cause| JuliaError::CollectiveIo { rank: 0, cause })?;
    let (shared, workers) = assemble(&renderer, &spec, config.workers, config.tint_bias, shared)?;
    shared
        .sync_all()
        .map_err(|cause| JuliaError::CollectiveIo { rank: 0, cause })?;
    drop(shared);

    let publish_error = |cause| JuliaError::PublishIo {
        path: config.output.clone(),
        cause,
    };
    keep_destination_mode(&staged, &config.output).map_err(publish_error)?;
    staged
        .persist(&config.output)
        .map_err(|e| publish_error(e.error))?;
    info!("Wrote {} bytes to {:?}", spec.file_bytes(), config.output);

    Ok(RenderSummary {
        spec,
        output: config.output.clone(),
        bytes: spec.file_bytes(),
        workers,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitmap::{BmpHeader, HEADER_BYTES};
    use crate::julia::Rgb;

    #[test]
    fn in_memory_render_has_the_right_shape() {
        let config = RenderConfig::new(5).with_workers(3);
        let bytes = render_to_vec(&config).unwrap();
        let spec = config.validate().unwrap();
        assert_eq!(bytes.len() as u64, spec.file_bytes());
        let header = BmpHeader::parse(&bytes).unwrap();
        assert_eq!(header.file_size as usize, bytes.len());
        assert_eq!((header.width, header.height), (10, 5));
    }

    #[test]
    fn worker_count_does_not_change_the_image() {
        let one = render_to_vec(&RenderConfig::new(9).with_workers(1)).unwrap();
        for workers in 2..12 {
            let many = render_to_vec(&RenderConfig::new(9).with_workers(workers)).unwrap();
            assert!(one == many, "{} workers changed the image", workers);
        }
    }

    #[test]
    fn reports_cover_every_row() {
        let spec = ImageSpec::from_height(10).unwrap();
        let (bytes, reports) =
            assemble(&JuliaRenderer::default(), &spec, 3, 1.0, Vec::new()).unwrap();
        assert_eq!(bytes.len() as u64, spec.image_bytes());
        let rows: Vec<(u32, u32)> = reports.iter().map(|r| (r.rows.start, r.rows.end)).collect();
        assert_eq!(rows, vec![(0, 4), (4, 7), (7, 10)]);
        assert_eq!(reports[0].bytes, spec.strip_bytes(4));
    }

    // Fails on one row, to exercise a worker error mid-run.
    struct FailsOnRow(i64);

    impl PixelRenderer for FailsOnRow {
        fn render(&self, x: i64, y: i64, width: u32, height: u32, _: f64) -> Result<Rgb> {
            if y == self.0 {
                Err(JuliaError::CoordinateOutOfRange {
                    x,
                    y,
                    width,
                    height,
                })
            } else {
                Ok([0, 0, 0])
            }
        }
    }

    #[test]
    fn a_failing_worker_fails_the_run_with_its_own_error() {
        let spec = ImageSpec::from_height(8).unwrap();
        match assemble(&FailsOnRow(5), &spec, 4, 1.0, Vec::new()) {
            Err(JuliaError::CoordinateOutOfRange { y, .. }) => assert_eq!(y, 5),
            other => panic!("expected CoordinateOutOfRange, got {:?}", other.map(|_| ())),
        }
    }

    struct Panics;

    impl PixelRenderer for Panics {
        fn render(&self, _: i64, y: i64, _: u32, _: u32, _: f64) -> Result<Rgb> {
            if y == 0 {
                panic!("renderer blew up");
            }
            Ok([1, 1, 1])
        }
    }

    #[test]
    fn a_panicking_worker_does_not_hang_the_group() {
        let spec = ImageSpec::from_height(4).unwrap();
        match assemble(&Panics, &spec, 2, 1.0, Vec::new()) {
            Err(JuliaError::WorkerPanicked(rank)) => assert_eq!(rank, 0),
            other => panic!("expected WorkerPanicked, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn staging_happens_beside_the_output() {
        assert_eq!(staging_dir(Path::new("out.bmp")), Path::new("."));
        assert_eq!(staging_dir(Path::new("a/b/out.bmp")), Path::new("a/b"));
    }

    #[test]
    fn header_comes_first() {
        let bytes = render_to_vec(&RenderConfig::new(2).with_workers(2)).unwrap();
        assert_eq!(&bytes[0..2], b"BM");
        assert_eq!(bytes.len(), HEADER_BYTES + 2 * 12);
    }
}
