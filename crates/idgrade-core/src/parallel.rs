//! Bounded fan-out over scoped threads.
//!
//! Scoring one worker, or comparing one pair of workers, is independent of
//! every other item, so work is spread across at most `width` threads that pull
//! indices from a shared counter. Results come back in input order.

use std::{
    num::NonZeroUsize,
    sync::atomic::{AtomicUsize, Ordering},
    thread,
};

/// Number of threads to use when the caller does not configure one.
#[must_use]
pub fn default_width() -> usize {
    thread::available_parallelism().map_or(1, NonZeroUsize::get)
}

/// Applies `f` to every item using at most `width` threads.
///
/// The output is in the same order as `items`, regardless of which thread
/// computed which element.
pub fn map_bounded<T, R, F>(items: &[T], width: usize, f: F) -> Vec<R>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> R + Sync,
{
    let width = width.clamp(1, items.len().max(1));
    if width == 1 {
        return items.iter().map(f).collect();
    }

    let next = AtomicUsize::new(0);
    let mut indexed = thread::scope(|s| {
        let handles = (0..width)
            .map(|_| {
                s.spawn(|| {
                    let mut out = vec![];
                    loop {
                        let i = next.fetch_add(1, Ordering::Relaxed);
                        let Some(item) = items.get(i) else {
                            break;
                        };
                        out.push((i, f(item)));
                    }
                    out
                })
            })
            .collect::<Vec<_>>();
        handles
            .into_iter()
            .flat_map(|h| h.join().unwrap_or_else(|e| std::panic::resume_unwind(e)))
            .collect::<Vec<_>>()
    });

    indexed.sort_by_key(|(i, _)| *i);
    indexed.into_iter().map(|(_, r)| r).collect()
}
