use std::num::NonZeroUsize;
use std::panic;
use std::thread;

use tracing::trace;

/// Provides a worker count and a way to run independent work items across that many threads.
///
/// Work items are not load balanced dynamically. Each item carries an estimated cost and items are
/// assigned up front, largest first, to the least loaded worker. Every system that dispatches through
/// this type already knows the size of its items (branch body counts, body chunk lengths), so
/// the static assignment is close to optimal and requires no synchronization between workers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ThreadDispatcher {
    thread_count: usize,
}

impl Default for ThreadDispatcher {
    fn default() -> Self {
        Self::with_available_parallelism()
    }
}

impl ThreadDispatcher {
    /// Creates a dispatcher that uses at most `thread_count` workers.
    ///
    /// # Panics
    ///
    /// Panics if `thread_count` is zero.
    pub fn new(thread_count: usize) -> Self {
        assert!(thread_count > 0, "A dispatcher needs at least one worker.");
        Self { thread_count }
    }

    /// Creates a dispatcher sized to the parallelism reported by the platform.
    pub fn with_available_parallelism() -> Self {
        let thread_count = thread::available_parallelism().map_or(1, NonZeroUsize::get);
        Self { thread_count }
    }

    /// Gets the number of workers available in the thread dispatcher.
    #[inline(always)]
    pub fn thread_count(&self) -> usize {
        self.thread_count
    }

    /// Runs `worker_body` over every item and returns the results in item order.
    ///
    /// # Arguments
    ///
    /// * `items` - Independent work items. Each is moved to exactly one worker.
    /// * `cost` - Estimated cost of an item, used to balance the static assignment.
    /// * `worker_body` - Function invoked once per item.
    pub fn dispatch<I, R, C, F>(&self, items: Vec<I>, cost: C, worker_body: F) -> Vec<R>
    where
        I: Send,
        R: Send,
        C: Fn(&I) -> usize,
        F: Fn(I) -> R + Sync,
    {
        let item_count = items.len();
        let worker_count = self.thread_count.min(item_count);
        if worker_count <= 1 {
            return items.into_iter().map(worker_body).collect();
        }

        let assignments = assign_largest_first(&items, &cost, worker_count);
        let mut slots: Vec<Option<I>> = items.into_iter().map(Some).collect();
        let buckets: Vec<Vec<(usize, I)>> = assignments
            .into_iter()
            .map(|indices| {
                indices
                    .into_iter()
                    .filter_map(|index| slots[index].take().map(|item| (index, item)))
                    .collect()
            })
            .collect();
        trace!(item_count, worker_count, "dispatching work items");

        let worker_body = &worker_body;
        let worker_results = crossbeam_utils::thread::scope(|s| {
            let handles: Vec<_> = buckets
                .into_iter()
                .map(|bucket| {
                    s.spawn(move |_| {
                        bucket
                            .into_iter()
                            .map(|(index, item)| (index, worker_body(item)))
                            .collect::<Vec<_>>()
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|handle| match handle.join() {
                    Ok(results) => results,
                    Err(payload) => panic::resume_unwind(payload),
                })
                .collect::<Vec<_>>()
        })
        .unwrap_or_else(|payload| panic::resume_unwind(payload));

        let mut ordered: Vec<Option<R>> = (0..item_count).map(|_| None).collect();
        for (index, result) in worker_results.into_iter().flatten() {
            ordered[index] = Some(result);
        }
        debug_assert!(
            ordered.iter().all(Option::is_some),
            "Every dispatched item must produce a result."
        );
        ordered.into_iter().flatten().collect()
    }
}

/// Longest-processing-time-first assignment of item indices to `worker_count` workers.
fn assign_largest_first<I, C>(items: &[I], cost: &C, worker_count: usize) -> Vec<Vec<usize>>
where
    C: Fn(&I) -> usize,
{
    let mut order: Vec<(usize, usize)> = items
        .iter()
        .enumerate()
        .map(|(index, item)| (cost(item), index))
        .collect();
    // Largest first; ties keep item order so the assignment is deterministic.
    order.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));

    let mut loads = vec![0usize; worker_count];
    let mut assignments = vec![Vec::new(); worker_count];
    for (item_cost, index) in order {
        let mut target = 0;
        for worker in 1..worker_count {
            if loads[worker] < loads[target] {
                target = worker;
            }
        }
        loads[target] += item_cost.max(1);
        assignments[target].push(index);
    }
    assignments
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn results_come_back_in_item_order() {
        let dispatcher = ThreadDispatcher::new(4);
        let items: Vec<usize> = (0..37).collect();
        let results = dispatcher.dispatch(items, |item| *item, |item| item * 3);
        assert_eq!(results, (0..37).map(|i| i * 3).collect::<Vec<_>>());
    }

    #[test]
    fn single_worker_runs_inline() {
        let dispatcher = ThreadDispatcher::new(1);
        let caller = thread::current().id();
        let ids = dispatcher.dispatch(vec![(); 3], |_| 1, |_| thread::current().id());
        assert!(ids.into_iter().all(|id| id == caller));
    }

    #[test]
    fn mutable_slices_can_be_dispatched() {
        let mut values = vec![1u32; 100];
        let chunks: Vec<&mut [u32]> = values.chunks_mut(7).collect();
        let dispatcher = ThreadDispatcher::new(3);
        let sums = dispatcher.dispatch(chunks, |chunk| chunk.len(), |chunk| {
            for value in chunk.iter_mut() {
                *value += 1;
            }
            chunk.iter().sum::<u32>()
        });
        assert_eq!(sums.iter().sum::<u32>(), 200);
        assert!(values.iter().all(|&v| v == 2));
    }

    #[test]
    fn largest_items_are_spread_across_workers() {
        let costs = [100usize, 90, 10, 10, 5];
        let assignments = assign_largest_first(&costs, &|c: &usize| *c, 2);
        assert_eq!(assignments[0], vec![0, 3]);
        assert_eq!(assignments[1], vec![1, 2, 4]);
    }

    #[test]
    #[should_panic(expected = "at least one worker")]
    fn zero_workers_is_rejected() {
        let _ = ThreadDispatcher::new(0);
    }
}
