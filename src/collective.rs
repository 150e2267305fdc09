// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Ordered collective write
//!
//! Every worker in a group hands over exactly one strip, and the strips
//! must land in the output one after another in rank order, however the
//! workers happen to finish.  The group passes a token: the writer
//! remembers which rank is due next, and a worker that arrives early
//! sleeps until the ranks ahead of it have written and flushed.
//!
//! A worker that fails poisons the group.  Everyone waiting wakes up
//! with an error instead of waiting forever for a strip that will never
//! come, and `finish` refuses to hand back a sink that is missing any.

use std::io::{self, Write};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use crate::bitmap::ImageSpec;
use crate::errors::{JuliaError, Result, ABORTED};
use crate::partition::partitions;

/// One member of a group of `size` workers.  This is all a worker
/// knows about the group.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Participant {
    /// Position in the group, from 0
    pub rank: usize,
    /// Number of workers in the group
    pub size: usize,
}

impl Participant {
    /// Every member of a group of `size`, in rank order.
    pub fn group(size: usize) -> impl Iterator<Item = Participant> {
        (0..size).map(move |rank| Participant { rank, size })
    }
}

/// The one collective operation the workers share.
pub trait OrderedAppend: Sync {
    /// Append `bytes` as `rank`'s contribution.  Blocks until every
    /// lower rank has appended, then writes and flushes.  Each rank
    /// calls this exactly once.
    fn append_ordered(&self, rank: usize, bytes: &[u8]) -> Result<()>;

    /// Give up on behalf of `rank`.  Every pending and future append
    /// fails.
    fn abort(&self, rank: usize);
}

/// A rank's promise to take part in the ordered write.  If it is
/// dropped without appending, because the worker returned an error or
/// panicked, the whole group is aborted.
pub struct Ticket<'a, A: OrderedAppend + ?Sized> {
    writer: &'a A,
    rank: usize,
    spent: bool,
}

impl<'a, A: OrderedAppend + ?Sized> Ticket<'a, A> {
    /// Take a ticket for `rank`.
    pub fn new(writer: &'a A, rank: usize) -> Self {
        Ticket {
            writer,
            rank,
            spent: false,
        }
    }

    /// Spend the ticket on this rank's strip.
    pub fn append(mut self, bytes: &[u8]) -> Result<()> {
        self.spent = true;
        self.writer.append_ordered(self.rank, bytes)
    }
}

impl<'a, A: OrderedAppend + ?Sized> Drop for Ticket<'a, A> {
    fn drop(&mut self) {
        if !self.spent {
            self.writer.abort(self.rank);
        }
    }
}

struct Turn<W> {
    next: usize,
    sink: W,
    written: u64,
    aborted_by: Option<usize>,
}

/// Serializes the group's strips into one sink, lowest rank first.
/// The sink must already hold whatever precedes the strips.
pub struct TokenPassingWriter<W> {
    expected: Vec<usize>,
    turn: Mutex<Turn<W>>,
    changed: Condvar,
}

impl<W: Write + Send> TokenPassingWriter<W> {
    /// A writer for a group whose rank `i` will append exactly
    /// `expected[i]` bytes.
    pub fn new(sink: W, expected: Vec<usize>) -> Self {
        TokenPassingWriter {
            expected,
            turn: Mutex::new(Turn {
                next: 0,
                sink,
                written: 0,
                aborted_by: None,
            }),
            changed: Condvar::new(),
        }
    }

    /// A writer for `workers` strips of `spec`, their lengths worked out
    /// from the same partition the workers use.
    pub fn for_image(sink: W, spec: &ImageSpec, workers: usize) -> Result<Self> {
        let expected = partitions(spec.height, workers)?
            .iter()
            .map(|rows| spec.strip_bytes(rows.len()))
            .collect();
        Ok(TokenPassingWriter::new(sink, expected))
    }

    /// Number of ranks in the group.
    pub fn size(&self) -> usize {
        self.expected.len()
    }

    /// Bytes appended so far.
    pub fn bytes_written(&self) -> u64 {
        self.lock().written
    }

    /// Hand back the sink once every rank has appended.
    pub fn finish(self) -> Result<W> {
        let turn = self
            .turn
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(culprit) = turn.aborted_by {
            return Err(aborted(turn.next, culprit));
        }
        if turn.next != self.expected.len() {
            return Err(JuliaError::CollectiveWrite {
                rank: turn.next,
                reason: "never appended its strip".to_string(),
            });
        }
        Ok(turn.sink)
    }

    // Nothing ever panics while holding the lock except a panicking
    // sink, and that worker's ticket aborts the group on the way out.
    fn lock(&self) -> MutexGuard<Turn<W>> {
        self.turn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn poison(&self, turn: &mut Turn<W>, rank: usize) {
        if turn.aborted_by.is_none() {
            error!("Rank {} aborted the ordered write", rank);
            turn.aborted_by = Some(rank);
        }
        self.changed.notify_all();
    }
}

impl<W: Write + Send> OrderedAppend for TokenPassingWriter<W> {
    fn append_ordered(&self, rank: usize, bytes: &[u8]) -> Result<()> {
        let expected = match self.expected.get(rank) {
            Some(&expected) => expected,
            None => {
                let reason = format!("rank is outside a group of {}", self.size());
                self.abort(rank);
                return Err(JuliaError::CollectiveWrite { rank, reason });
            }
        };

        let mut turn = self.lock();
        if bytes.len() != expected {
            self.poison(&mut turn, rank);
            return Err(JuliaError::CollectiveWrite {
                rank,
                reason: format!("expected {} bytes, got {}", expected, bytes.len()),
            });
        }

        while turn.next < rank && turn.aborted_by.is_none() {
            debug!("Rank {} waiting for rank {}", rank, turn.next);
            turn = self
                .changed
                .wait(turn)
                .unwrap_or_else(PoisonError::into_inner);
        }

        if let Some(culprit) = turn.aborted_by {
            return Err(aborted(rank, culprit));
        }
        if turn.next > rank {
            self.poison(&mut turn, rank);
            return Err(JuliaError::CollectiveWrite {
                rank,
                reason: "already appended".to_string(),
            });
        }

        if let Err(cause) = write_through(&mut turn.sink, bytes) {
            self.poison(&mut turn, rank);
            return Err(JuliaError::CollectiveIo { rank, cause });
        }
        debug!(
            "Rank {} appended {} bytes at strip offset {}",
            rank,
            bytes.len(),
            turn.written
        );
        turn.written += bytes.len() as u64;
        turn.next += 1;
        self.changed.notify_all();
        Ok(())
    }

    fn abort(&self, rank: usize) {
        let mut turn = self.lock();
        self.poison(&mut turn, rank);
    }
}

fn write_through<W: Write>(sink: &mut W, bytes: &[u8]) -> io::Result<()> {
    sink.write_all(bytes)?;
    sink.flush()
}

fn aborted(rank: usize, culprit: usize) -> JuliaError {
    JuliaError::CollectiveWrite {
        rank,
        reason: format!("{} {}", ABORTED, culprit),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    fn strip(rank: usize, len: usize) -> Vec<u8> {
        vec![rank as u8; len]
    }

    #[test]
    fn strips_land_in_rank_order_whatever_the_arrival_order() {
        let writer = TokenPassingWriter::new(Vec::new(), vec![2, 3, 1, 2]);
        crossbeam::scope(|s| {
            let writer = &writer;
            for rank in (0..4).rev() {
                s.spawn(move |_| {
                    // Higher ranks arrive first.
                    thread::sleep(Duration::from_millis(10 * (4 - rank as u64)));
                    let len = writer.expected[rank];
                    writer.append_ordered(rank, &strip(rank, len)).unwrap();
                });
            }
        })
        .unwrap();
        assert_eq!(writer.bytes_written(), 8);
        assert_eq!(writer.finish().unwrap(), vec![0, 0, 1, 1, 1, 2, 3, 3]);
    }

    #[test]
    fn existing_sink_contents_are_kept() {
        let writer = TokenPassingWriter::new(b"BM".to_vec(), vec![1]);
        writer.append_ordered(0, &[9]).unwrap();
        assert_eq!(writer.finish().unwrap(), b"BM\x09".to_vec());
    }

    #[test]
    fn empty_strips_still_take_their_turn() {
        let writer = TokenPassingWriter::new(Vec::new(), vec![1, 0, 0]);
        writer.append_ordered(0, &[7]).unwrap();
        writer.append_ordered(1, &[]).unwrap();
        writer.append_ordered(2, &[]).unwrap();
        assert_eq!(writer.finish().unwrap(), vec![7]);
    }

    #[test]
    fn wrong_length_is_refused_and_aborts() {
        let writer = TokenPassingWriter::new(Vec::new(), vec![2, 2]);
        assert!(writer.append_ordered(0, &[1]).is_err());
        let err = writer.append_ordered(1, &[1, 1]).unwrap_err();
        assert!(err.is_abort());
        assert!(writer.finish().is_err());
    }

    #[test]
    fn second_append_from_a_rank_is_refused() {
        let writer = TokenPassingWriter::new(Vec::new(), vec![1, 1]);
        writer.append_ordered(0, &[1]).unwrap();
        let err = writer.append_ordered(0, &[1]).unwrap_err();
        assert!(!err.is_abort());
    }

    #[test]
    fn rank_outside_the_group_is_refused() {
        let writer = TokenPassingWriter::new(Vec::new(), vec![1]);
        assert!(writer.append_ordered(3, &[1]).is_err());
    }

    #[test]
    fn abort_wakes_waiting_ranks() {
        let writer = TokenPassingWriter::new(Vec::new(), vec![1, 1, 1]);
        let results = crossbeam::scope(|s| {
            let writer = &writer;
            let waiting: Vec<_> = (1..3)
                .map(|rank| s.spawn(move |_| writer.append_ordered(rank, &[rank as u8])))
                .collect();
            thread::sleep(Duration::from_millis(20));
            writer.abort(0);
            waiting
                .into_iter()
                .map(|h| h.join().unwrap())
                .collect::<Vec<_>>()
        })
        .unwrap();
        for result in results {
            assert!(result.unwrap_err().is_abort());
        }
        assert!(writer.finish().is_err());
    }

    #[test]
    fn dropped_ticket_aborts_the_group() {
        let writer = TokenPassingWriter::new(Vec::new(), vec![1, 1]);
        {
            let _unused = Ticket::new(&writer, 0);
        }
        assert!(writer.append_ordered(1, &[1]).unwrap_err().is_abort());
    }

    #[test]
    fn spent_ticket_does_not_abort() {
        let writer = TokenPassingWriter::new(Vec::new(), vec![1]);
        Ticket::new(&writer, 0).append(&[5]).unwrap();
        assert_eq!(writer.finish().unwrap(), vec![5]);
    }

    #[test]
    fn finish_before_everyone_appended_fails() {
        let writer = TokenPassingWriter::new(Vec::new(), vec![1, 1]);
        writer.append_ordered(0, &[1]).unwrap();
        match writer.finish() {
            Err(JuliaError::CollectiveWrite { rank, .. }) => assert_eq!(rank, 1),
            other => panic!("expected CollectiveWrite, got {:?}", other.map(|_| ())),
        }
    }

    struct FullDisk;

    impl Write for FullDisk {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::Other, "disk full"))
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn io_failure_is_reported_and_poisons_the_group() {
        let writer = TokenPassingWriter::new(FullDisk, vec![1, 1]);
        match writer.append_ordered(0, &[1]) {
            Err(JuliaError::CollectiveIo { rank, .. }) => assert_eq!(rank, 0),
            other => panic!("expected CollectiveIo, got {:?}", other),
        }
        assert!(writer.append_ordered(1, &[1]).unwrap_err().is_abort());
    }

    #[test]
    fn layout_follows_the_partition() {
        let spec = ImageSpec::from_height(3).unwrap();
        let writer = TokenPassingWriter::for_image(Vec::new(), &spec, 2).unwrap();
        assert_eq!(writer.expected, vec![40, 20]);
        assert_eq!(
            Participant::group(2).collect::<Vec<_>>(),
            vec![
                Participant { rank: 0, size: 2 },
                Participant { rank: 1, size: 2 }
            ]
        );
    }
}
