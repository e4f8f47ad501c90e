//! Fixed-width worker pool
//!
//! The pool fans CPU-bound work out over `max(1, cores − free_cores)`
//! workers. A batch splits its items into contiguous chunks of
//! `⌈n / width⌉` (the last chunk may be shorter), runs one worker per
//! non-empty chunk, and returns the per-chunk outputs in chunk index
//! order, so a batch result never depends on scheduling.
//!
//! Work inside a chunk is serial; all parallelism comes from the chunk
//! fan-out. Callers that need cancellation pass a [`CancelToken`] into
//! their chunk closure and observe it between items.
//!
//! [`CancelToken`]: crate::CancelToken

use std::num::NonZeroUsize;
use std::thread;
use tracing::debug;

/// A fixed-width parallel executor for CPU-bound batches
#[derive(Debug, Clone)]
pub struct WorkerPool {
    width: usize,
}

impl WorkerPool {
    /// Create a pool sized from the machine, keeping `free_cores` free
    ///
    /// The width is `max(1, available cores − free_cores)`, so the pool
    /// always makes progress even on over-reserved machines.
    pub fn new(free_cores: usize) -> Self {
        let cores = thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(1);
        Self {
            width: cores.saturating_sub(free_cores).max(1),
        }
    }

    /// Create a pool with an explicit width (floored at one worker)
    pub fn with_width(width: usize) -> Self {
        Self {
            width: width.max(1),
        }
    }

    /// Number of workers the pool runs per batch
    pub fn width(&self) -> usize {
        self.width
    }

    /// Size of the contiguous chunks a batch of `item_count` is split into
    pub fn chunk_size(&self, item_count: usize) -> usize {
        ((item_count + self.width - 1) / self.width).max(1)
    }

    /// Run `work` over the contiguous chunks of `items`
    ///
    /// `work` receives the chunk index and the chunk slice; the returned
    /// vector holds one output per non-empty chunk, in chunk index order.
    /// A panic in any worker is resumed on the calling thread.
    pub fn map<T, R, F>(&self, items: &[T], work: F) -> Vec<R>
    where
        T: Sync,
        R: Send,
        F: Fn(usize, &[T]) -> R + Sync,
    {
        if items.is_empty() {
            return Vec::new();
        }

        let chunk_size = self.chunk_size(items.len());
        let chunks: Vec<&[T]> = items.chunks(chunk_size).collect();
        debug!(
            items = items.len(),
            workers = chunks.len(),
            chunk_size, "dispatching a batch over the worker pool"
        );

        if chunks.len() == 1 {
            return vec![work(0, chunks[0])];
        }

        thread::scope(|scope| {
            let mut handles = Vec::with_capacity(chunks.len());
            for (chunk_index, chunk) in chunks.into_iter().enumerate() {
                let work = &work;
                let handle = thread::Builder::new()
                    .name(format!("fpselect-worker-{chunk_index}"))
                    .spawn_scoped(scope, move || work(chunk_index, chunk))
                    .expect("failed to spawn worker thread");
                handles.push(handle);
            }
            handles
                .into_iter()
                .map(|handle| match handle.join() {
                    Ok(output) => output,
                    Err(panic) => std::panic::resume_unwind(panic),
                })
                .collect()
        })
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CancelToken;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_width_is_floored_at_one() {
        assert_eq!(WorkerPool::with_width(0).width(), 1);
        assert_eq!(WorkerPool::with_width(4).width(), 4);
        assert!(WorkerPool::new(usize::MAX).width() >= 1);
    }

    #[test]
    fn test_chunk_size_is_the_ceiling() {
        let pool = WorkerPool::with_width(4);
        assert_eq!(pool.chunk_size(10), 3);
        assert_eq!(pool.chunk_size(8), 2);
        assert_eq!(pool.chunk_size(3), 1);
        assert_eq!(pool.chunk_size(0), 1);
    }

    #[test]
    fn test_map_preserves_chunk_order() {
        let pool = WorkerPool::with_width(3);
        let items: Vec<u32> = (0..10).collect();
        let outputs = pool.map(&items, |chunk_index, chunk| {
            (chunk_index, chunk.iter().sum::<u32>())
        });
        // 10 items over 3 workers: chunks of 4, 4, 2
        assert_eq!(outputs, vec![(0, 6), (1, 22), (2, 17)]);
    }

    #[test]
    fn test_map_on_empty_batch() {
        let pool = WorkerPool::with_width(4);
        let outputs: Vec<usize> = pool.map(&[] as &[u32], |_, chunk| chunk.len());
        assert!(outputs.is_empty());
    }

    #[test]
    fn test_map_runs_every_item_exactly_once() {
        let pool = WorkerPool::with_width(4);
        let items: Vec<usize> = (0..101).collect();
        let visited = AtomicUsize::new(0);
        let outputs = pool.map(&items, |_, chunk| {
            visited.fetch_add(chunk.len(), Ordering::Relaxed);
            chunk.to_vec()
        });
        assert_eq!(visited.load(Ordering::Relaxed), 101);
        let flattened: HashSet<usize> = outputs.into_iter().flatten().collect();
        assert_eq!(flattened.len(), 101);
    }

    #[test]
    fn test_single_worker_runs_on_the_calling_thread() {
        let pool = WorkerPool::with_width(1);
        let caller = std::thread::current().id();
        let outputs = pool.map(&[1, 2, 3], |_, _| std::thread::current().id());
        assert_eq!(outputs, vec![caller]);
    }

    #[test]
    fn test_cancellation_at_item_boundaries() {
        let pool = WorkerPool::with_width(2);
        let token = CancelToken::new();
        token.cancel();
        let items: Vec<u32> = (0..100).collect();
        let outputs = pool.map(&items, |_, chunk| {
            let mut processed = 0;
            for _ in chunk {
                if token.is_cancelled() {
                    break;
                }
                processed += 1;
            }
            processed
        });
        assert_eq!(outputs.iter().sum::<u32>(), 0);
    }
}
