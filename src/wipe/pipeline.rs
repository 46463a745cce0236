//! Bounded producer/consumer pipeline.
//!
//! Block generation is CPU-bound and device writes are I/O-bound, so
//! the two run on separate threads joined by a bounded channel. The
//! channel is the only shared state:
//!
//! - a slow consumer blocks the producer once `depth` blocks are queued,
//!   capping buffered memory at `depth * block_size`
//! - a slow producer blocks the consumer on receive
//! - the producer dropping its sender is the end-of-stream signal
//! - the consumer dropping its receiver (on error) stops the producer
//!   at its next send

use std::sync::mpsc;
use std::thread;

/// Runs `produce` on a worker thread and `consume` on the calling one.
///
/// `produce(i)` is called for `i` in `0..total`, in order; each block is
/// handed to `consume(i, block)` in the same order. Returns the number of
/// blocks consumed, which is less than `total` only if the producer
/// stopped early. The first consumer error ends the pipeline.
pub fn run_pipeline<P, C, E>(total: u64, depth: usize, mut produce: P, mut consume: C) -> Result<u64, E>
where
    P: FnMut(u64) -> Vec<u8> + Send,
    C: FnMut(u64, Vec<u8>) -> Result<(), E>,
{
    thread::scope(|scope| {
        let (tx, rx) = mpsc::sync_channel::<Vec<u8>>(depth);

        scope.spawn(move || {
            for index in 0..total {
                let block = produce(index);
                if tx.send(block).is_err() {
                    tracing::debug!(index, "Consumer hung up, producer stopping");
                    return;
                }
            }
        });

        // `rx` is owned by this closure, so an early return drops it before
        // the scope joins the producer and a blocked send wakes with an error.
        let mut consumed = 0u64;
        for block in rx.iter() {
            consume(consumed, block)?;
            consumed += 1;
        }
        Ok(consumed)
    })
}
