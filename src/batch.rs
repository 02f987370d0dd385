//! Worker pool for independent per-image runs.
//!
//! Each item is processed exactly once by one of `jobs` scoped worker
//! threads. Results flow back over a channel and are handed to the caller's
//! `report` closure on the calling thread, in completion order.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::thread;

/// Number of workers to use when the caller does not say.
pub fn available_parallelism() -> usize {
    thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
}

/// Run `work` over every item on up to `jobs` threads.
pub fn for_each<T, R, F, G>(items: &[T], jobs: usize, work: F, mut report: G)
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> R + Sync,
    G: FnMut(R),
{
    let jobs = jobs.clamp(1, items.len().max(1));
    if jobs == 1 {
        for item in items {
            report(work(item));
        }
        return;
    }

    let next = AtomicUsize::new(0);
    let (tx, rx) = mpsc::channel();
    thread::scope(|scope| {
        for _ in 0..jobs {
            let tx = tx.clone();
            let (next, work) = (&next, &work);
            scope.spawn(move || {
                loop {
                    let index = next.fetch_add(1, Ordering::Relaxed);
                    let Some(item) = items.get(index) else { break };
                    if tx.send(work(item)).is_err() {
                        break;
                    }
                }
            });
        }
        drop(tx);

        for result in rx {
            report(result);
        }
    });
}
