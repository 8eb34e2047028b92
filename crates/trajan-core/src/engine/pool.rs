use super::config::BuildConfig;
use super::error::EngineError;
use rayon::prelude::*;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

/// A dedicated rayon pool that runs one closure per unit of work and joins.
///
/// Every dispatch blocks until all units have completed. Closures receive the
/// index of the worker they run on, in `0..thread_count()`.
pub struct WorkerPool {
    pool: rayon::ThreadPool,
}

impl WorkerPool {
    pub fn new(threads: usize) -> Result<Self, EngineError> {
        let threads = threads.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("trajan-worker-{i}"))
            .build()
            .map_err(|e| EngineError::WorkerPool(e.to_string()))?;
        debug!(threads, "Worker pool created.");
        Ok(Self { pool })
    }

    pub fn from_config(config: &BuildConfig) -> Result<Self, EngineError> {
        Self::new(config.worker_count())
    }

    pub fn thread_count(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Runs `f(worker, index)` for every index in `0..n`.
    pub fn run_on_each_index<F>(&self, n: usize, f: F)
    where
        F: Fn(usize, usize) + Send + Sync,
    {
        self.pool.install(|| {
            (0..n).into_par_iter().for_each(|index| f(current_worker(), index));
        });
    }

    /// Splits `data` into rows of `width` values and runs `f(worker, row, values)`
    /// on each. With `width == 0` every row is empty and `rows` says how many
    /// units to dispatch.
    pub fn run_on_each_row<F>(&self, data: &mut [f64], rows: usize, width: usize, f: F)
    where
        F: Fn(usize, usize, &mut [f64]) + Send + Sync,
    {
        if width == 0 {
            self.run_on_each_index(rows, |worker, row| f(worker, row, &mut []));
            return;
        }
        self.pool.install(|| {
            data.par_chunks_mut(width)
                .take(rows)
                .enumerate()
                .for_each(|(row, values)| f(current_worker(), row, values));
        });
    }
}

#[inline]
fn current_worker() -> usize {
    rayon::current_thread_index().unwrap_or(0)
}

/// Per-worker scratch slots, one per pool thread.
///
/// A slot is only locked by the thread whose index it carries, so the mutex is
/// never contended. The closure passed to [`WorkerArena::with`] must not
/// dispatch new work onto the pool while it holds the slot.
pub struct WorkerArena<T> {
    slots: Vec<Mutex<T>>,
}

impl<T> WorkerArena<T> {
    pub fn new(workers: usize, mut init: impl FnMut() -> T) -> Self {
        Self {
            slots: (0..workers.max(1)).map(|_| Mutex::new(init())).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn with<R>(&self, worker: usize, f: impl FnOnce(&mut T) -> R) -> R {
        let slot = &self.slots[worker % self.slots.len()];
        let mut guard = lock(slot);
        f(&mut guard)
    }

    pub fn into_inner(self) -> Vec<T> {
        self.slots
            .into_iter()
            .map(|slot| slot.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner()))
            .collect()
    }
}

/// Locks a mutex, recovering the data if a panicking worker poisoned it.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn run_on_each_index_dispatches_every_unit_once() {
        let pool = WorkerPool::new(4).unwrap();
        let hits: Vec<AtomicUsize> = (0..100).map(|_| AtomicUsize::new(0)).collect();
        pool.run_on_each_index(100, |worker, i| {
            assert!(worker < 4);
            hits[i].fetch_add(1, Ordering::Relaxed);
        });
        assert!(hits.iter().all(|h| h.load(Ordering::Relaxed) == 1));
    }

    #[test]
    fn run_on_each_row_writes_into_its_own_row() {
        let pool = WorkerPool::new(3).unwrap();
        let mut data = vec![0.0; 10 * 2];
        pool.run_on_each_row(&mut data, 10, 2, |_, row, values| {
            values[0] = row as f64;
            values[1] = -(row as f64);
        });
        for row in 0..10 {
            assert_eq!(data[row * 2], row as f64);
            assert_eq!(data[row * 2 + 1], -(row as f64));
        }
    }

    #[test]
    fn zero_width_rows_still_dispatch_every_unit() {
        let pool = WorkerPool::new(2).unwrap();
        let count = AtomicUsize::new(0);
        pool.run_on_each_row(&mut [], 7, 0, |_, _, values| {
            assert!(values.is_empty());
            count.fetch_add(1, Ordering::Relaxed);
        });
        assert_eq!(count.load(Ordering::Relaxed), 7);
    }

    #[test]
    fn arena_collects_per_worker_state() {
        let pool = WorkerPool::new(4).unwrap();
        let arena = WorkerArena::new(pool.thread_count(), || 0usize);
        pool.run_on_each_index(50, |worker, _| arena.with(worker, |count| *count += 1));
        assert_eq!(arena.into_inner().into_iter().sum::<usize>(), 50);
    }

    #[test]
    fn single_threaded_pool_reports_one_worker() {
        let pool = WorkerPool::new(0).unwrap();
        assert_eq!(pool.thread_count(), 1);
    }
}
