//! Fork-join parallel execution primitive.
//!
//! [`ParallelExecutor`] partitions a unit count into contiguous `[start, end)`
//! shards and fans the shards out across a rayon thread pool, blocking the
//! caller until every shard has finished. Workers receive disjoint mutable
//! chunks of the output, so no synchronization is needed in the hot loop;
//! each shard records its own outcome and a single-threaded reduction after
//! the join produces the aggregate status. A failing shard does not stop
//! siblings that are already dispatched.

use std::sync::OnceLock;

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::debug;

use crate::error::{KernelError, Result};

/// Configuration for a [`ParallelExecutor`].
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Number of worker threads (`None` = auto-detect from CPU cores).
    pub thread_count: Option<usize>,
    /// Worker thread name prefix, for debugging.
    pub pool_name: String,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            thread_count: None,
            pool_name: "tenko".to_string(),
        }
    }
}

impl ExecutorConfig {
    /// Set an explicit worker thread count.
    pub fn with_thread_count(mut self, threads: usize) -> Self {
        self.thread_count = Some(threads);
        self
    }

    /// Set the worker thread name prefix.
    pub fn with_pool_name(mut self, name: impl Into<String>) -> Self {
        self.pool_name = name.into();
        self
    }
}

/// Fork-join executor over a dedicated thread pool.
pub struct ParallelExecutor {
    pool: ThreadPool,
}

impl ParallelExecutor {
    /// Create an executor with the default configuration.
    pub fn new() -> Result<Self> {
        Self::with_config(ExecutorConfig::default())
    }

    /// Create an executor with a custom configuration.
    pub fn with_config(config: ExecutorConfig) -> Result<Self> {
        let thread_count = config.thread_count.unwrap_or_else(|| {
            // Leave one core for the calling thread.
            (num_cpus::get() - 1).max(1)
        });
        let pool_name = config.pool_name.clone();
        let pool = ThreadPoolBuilder::new()
            .num_threads(thread_count)
            .thread_name(move |i| format!("{}-worker-{}", pool_name, i))
            .build()
            .map_err(|e| KernelError::Inner(format!("failed to create thread pool: {}", e)))?;

        debug!(threads = thread_count, "created kernel thread pool");
        Ok(Self { pool })
    }

    /// Number of worker threads in the pool.
    pub fn thread_count(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Partition `out` into contiguous shards and run `worker` on each.
    ///
    /// `granularity` is the smallest number of elements a shard may be split
    /// at; shard boundaries are always multiples of it. The worker receives
    /// the element offset of its shard within `out` together with the shard
    /// slice, and must be independently correct given only that range.
    /// Returns after every shard has completed; the first recorded shard
    /// error becomes the aggregate result.
    pub fn parallel_for<T, F>(&self, out: &mut [T], granularity: usize, worker: F) -> Result<()>
    where
        T: Send,
        F: Fn(usize, &mut [T]) -> Result<()> + Send + Sync,
    {
        if out.is_empty() {
            return Ok(());
        }
        let chunk = shard_elems(out.len(), granularity, self.thread_count());
        if chunk >= out.len() {
            return worker(0, out);
        }
        let results: Vec<Result<()>> = self.pool.install(|| {
            out.par_chunks_mut(chunk)
                .enumerate()
                .map(|(shard, slice)| worker(shard * chunk, slice))
                .collect()
        });
        results.into_iter().collect()
    }

    /// Row-partitioned variant for kernels that write two outputs with a
    /// fixed per-row stride each (e.g. values and indices).
    ///
    /// Rows are the partition unit, one row per unit. The worker receives
    /// the index of its first row and the matching chunks of both outputs.
    pub fn parallel_for_rows<A, B, F>(
        &self,
        a: &mut [A],
        b: &mut [B],
        a_stride: usize,
        b_stride: usize,
        worker: F,
    ) -> Result<()>
    where
        A: Send,
        B: Send,
        F: Fn(usize, &mut [A], &mut [B]) -> Result<()> + Send + Sync,
    {
        if a_stride == 0 || b_stride == 0 {
            return Err(KernelError::Inner(
                "row stride must be non-zero".to_string(),
            ));
        }
        if a.len() % a_stride != 0 || b.len() % b_stride != 0 || a.len() / a_stride != b.len() / b_stride
        {
            return Err(KernelError::Inner(format!(
                "mismatched row partitions: {} / {} vs {} / {}",
                a.len(),
                a_stride,
                b.len(),
                b_stride
            )));
        }
        let rows = a.len() / a_stride;
        if rows == 0 {
            return Ok(());
        }
        let rows_per_shard = shard_elems(rows, 1, self.thread_count());
        if rows_per_shard >= rows {
            return worker(0, a, b);
        }
        let results: Vec<Result<()>> = self.pool.install(|| {
            a.par_chunks_mut(rows_per_shard * a_stride)
                .zip(b.par_chunks_mut(rows_per_shard * b_stride))
                .enumerate()
                .map(|(shard, (ac, bc))| worker(shard * rows_per_shard, ac, bc))
                .collect()
        });
        results.into_iter().collect()
    }
}

/// Shard size in elements: enough units per shard to cover the pool, with
/// boundaries aligned to `granularity`.
fn shard_elems(total: usize, granularity: usize, threads: usize) -> usize {
    let granularity = granularity.max(1);
    let units = total.div_ceil(granularity);
    let shards = units.min(threads).max(1);
    units.div_ceil(shards) * granularity
}

static GLOBAL_EXECUTOR: OnceLock<ParallelExecutor> = OnceLock::new();

/// Shared executor used by kernels that do not carry their own.
///
/// Built lazily with the default configuration on first use; see
/// [`init_executor`] to configure it explicitly at startup.
pub fn global_executor() -> &'static ParallelExecutor {
    GLOBAL_EXECUTOR.get_or_init(|| {
        ParallelExecutor::new().expect("failed to build the global kernel thread pool")
    })
}

/// Install a custom-configured global executor.
///
/// Must be called before the first kernel runs; fails once the global pool
/// exists.
pub fn init_executor(config: ExecutorConfig) -> Result<()> {
    let executor = ParallelExecutor::with_config(config)?;
    GLOBAL_EXECUTOR
        .set(executor)
        .map_err(|_| KernelError::Inner("global executor already initialized".to_string()))
}
