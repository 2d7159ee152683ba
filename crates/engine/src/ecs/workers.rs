//! Fixed worker pool that runs one system's slices in parallel.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::debug;

use super::error::EcsError;

pub struct WorkerPool {
    pool: ThreadPool,
    workers: usize,
    in_flight: AtomicUsize,
}

impl WorkerPool {
    pub fn new(workers: usize) -> Result<Self, EcsError> {
        let workers = workers.max(1);
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|index| format!("strategos-worker-{index}"))
            .build()
            .map_err(|error| EcsError::WorkerPool(error.to_string()))?;
        debug!(workers, "worker_pool_started");
        Ok(Self {
            pool,
            workers,
            in_flight: AtomicUsize::new(0),
        })
    }

    pub fn worker_count(&self) -> usize {
        self.workers
    }

    /// Slices dispatched but not yet finished. Zero whenever no dispatch is running.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Runs `job` once per slice on the pool and blocks until every slice is done.
    /// Returns the first slice error after all slices have finished.
    pub fn dispatch<T, F>(&self, slices: Vec<&mut [T]>, job: F) -> Result<(), EcsError>
    where
        T: Send,
        F: Fn(&mut [T]) -> Result<(), EcsError> + Sync,
    {
        let first_error: Mutex<Option<EcsError>> = Mutex::new(None);
        self.in_flight.store(slices.len(), Ordering::Release);

        self.pool.scope(|scope| {
            for slice in slices {
                let job = &job;
                let first_error = &first_error;
                let in_flight = &self.in_flight;
                scope.spawn(move |_| {
                    if let Err(error) = job(slice) {
                        let mut guard = first_error
                            .lock()
                            .unwrap_or_else(|poisoned| poisoned.into_inner());
                        guard.get_or_insert(error);
                    }
                    in_flight.fetch_sub(1, Ordering::Release);
                });
            }
        });

        debug_assert_eq!(self.in_flight.load(Ordering::Acquire), 0);
        match first_error
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
        {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("workers", &self.workers)
            .field("in_flight", &self.in_flight())
            .finish()
    }
}

/// Near-equal slice lengths for `len` items over `workers` slices. Lengths differ
/// by at most one and sum to `len`.
pub fn partition_sizes(len: usize, workers: usize) -> Vec<usize> {
    let workers = workers.max(1);
    let base = len / workers;
    let remainder = len % workers;
    (0..workers)
        .map(|index| base + usize::from(index < remainder))
        .collect()
}

pub(crate) fn split_by_sizes<'a, T>(items: &'a mut [T], sizes: &[usize]) -> Vec<&'a mut [T]> {
    let mut rest = items;
    let mut slices = Vec::with_capacity(sizes.len());
    for &size in sizes {
        let size = size.min(rest.len());
        let (head, tail) = std::mem::take(&mut rest).split_at_mut(size);
        slices.push(head);
        rest = tail;
    }
    slices
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partition_sizes_are_near_equal_and_cover_every_item() {
        for (len, workers) in [(0, 3), (1, 4), (10, 3), (1000, 4), (7, 7), (5, 1)] {
            let sizes = partition_sizes(len, workers);
            assert_eq!(sizes.len(), workers);
            assert_eq!(sizes.iter().sum::<usize>(), len);
            let max = sizes.iter().copied().max().unwrap_or(0);
            let min = sizes.iter().copied().min().unwrap_or(0);
            assert!(max - min <= 1, "uneven split for {len} over {workers}");
        }
    }

    #[test]
    fn split_by_sizes_yields_disjoint_slices_in_order() {
        let mut items = (0..10).collect::<Vec<u32>>();
        let sizes = partition_sizes(items.len(), 3);
        let slices = split_by_sizes(&mut items, &sizes);
        let lengths = slices.iter().map(|slice| slice.len()).collect::<Vec<_>>();
        assert_eq!(lengths, vec![4, 3, 3]);
        assert_eq!(slices[1][0], 4);
    }

    #[test]
    fn dispatch_runs_every_slice_and_resets_counter() {
        let pool = WorkerPool::new(4).expect("pool");
        let mut values = vec![0u32; 1000];
        let sizes = partition_sizes(values.len(), pool.worker_count());
        let slices = split_by_sizes(&mut values, &sizes);

        pool.dispatch(slices, |slice| {
            for value in slice.iter_mut() {
                *value += 1;
            }
            Ok(())
        })
        .expect("dispatch");

        assert!(values.iter().all(|value| *value == 1));
        assert_eq!(pool.in_flight(), 0);
    }

    #[test]
    fn dispatch_returns_slice_error_after_barrier() {
        let pool = WorkerPool::new(2).expect("pool");
        let mut values = vec![0u32; 8];
        let sizes = partition_sizes(values.len(), 2);
        let slices = split_by_sizes(&mut values, &sizes);

        let result = pool.dispatch(slices, |slice| {
            for value in slice.iter_mut() {
                *value = 9;
            }
            if slice.len() == 4 {
                return Err(EcsError::system_failed("probe", "slice refused"));
            }
            Ok(())
        });

        assert!(matches!(result, Err(EcsError::SystemFailed { .. })));
        assert!(values.iter().all(|value| *value == 9));
        assert_eq!(pool.in_flight(), 0);
    }
}
