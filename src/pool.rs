use crate::error::AppError;
use crate::extractor::{self, Extraction};
use crate::walker::WalkedFile;
use chrono::{DateTime, Utc};
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::collections::HashMap;
use std::thread::JoinHandle;

struct Job {
    id: u64,
    bytes: Vec<u8>,
    fallback_modified: DateTime<Utc>,
}

struct Reply {
    id: u64,
    worker: usize,
    result: Result<Extraction, AppError>,
}

/// Fixed set of extraction worker threads fed over per-worker channels.
///
/// Dispatch takes an idle worker off a blocking queue, sends the job with a
/// correlation id, and matches the reply on a shared channel; a worker whose
/// job failed goes back into the idle queue like any other. Pending files are
/// processed in batches of `min(pool_size, max_in_flight)`, the whole batch
/// completing before the next is dispatched. The pool is owned by whoever
/// constructs it; dropping it closes the job channels and joins the threads.
pub struct WorkerPool {
    job_txs: Vec<Sender<Job>>,
    reply_rx: Receiver<Reply>,
    idle_tx: Sender<usize>,
    idle_rx: Receiver<usize>,
    handles: Vec<JoinHandle<()>>,
    batch_size: usize,
}

impl WorkerPool {
    pub fn new(pool_size: usize, max_in_flight: usize, max_size: u32, quality: u8) -> Self {
        let pool_size = pool_size.max(1);
        let batch_size = pool_size.min(max_in_flight.max(1));
        log::info!(
            "Starting worker pool: {} workers, {} in flight per round",
            pool_size,
            batch_size
        );

        let (reply_tx, reply_rx) = unbounded::<Reply>();
        let (idle_tx, idle_rx) = unbounded::<usize>();
        let mut job_txs = Vec::with_capacity(pool_size);
        let mut handles = Vec::with_capacity(pool_size);

        for worker in 0..pool_size {
            let (job_tx, job_rx) = unbounded::<Job>();
            let reply_tx = reply_tx.clone();
            let handle = std::thread::spawn(move || {
                for job in job_rx.iter() {
                    log::trace!("Worker {} picked up job {}", worker, job.id);
                    let result =
                        extractor::extract(&job.bytes, job.fallback_modified, max_size, quality);
                    if reply_tx
                        .send(Reply {
                            id: job.id,
                            worker,
                            result,
                        })
                        .is_err()
                    {
                        break;
                    }
                }
                log::debug!("Worker {} shutting down", worker);
            });
            job_txs.push(job_tx);
            handles.push(handle);
            // every worker starts idle
            idle_tx.send(worker).expect("idle queue open at startup");
        }

        WorkerPool {
            job_txs,
            reply_rx,
            idle_tx,
            idle_rx,
            handles,
            batch_size,
        }
    }

    /// Runs every pending file through a worker, in dispatch order, one batch
    /// at a time. Returns one result per input, aligned with `pending`;
    /// per-file failures are entries, never an abort. `progress` fires after
    /// each individual completion with (completed, total).
    pub fn process<F>(
        &self,
        pending: &[&WalkedFile],
        mut progress: F,
    ) -> Result<Vec<Result<Extraction, AppError>>, AppError>
    where
        F: FnMut(usize, usize),
    {
        let total = pending.len();
        let mut results: Vec<Option<Result<Extraction, AppError>>> =
            (0..total).map(|_| None).collect();
        let mut completed = 0usize;
        let mut next_id = 0u64;

        for batch_start in (0..total).step_by(self.batch_size) {
            let batch_end = (batch_start + self.batch_size).min(total);
            let mut in_flight: HashMap<u64, usize> = HashMap::new();

            for index in batch_start..batch_end {
                let file = pending[index];
                let bytes = match std::fs::read(&file.absolute_path) {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        // an unreadable original is a per-file failure, not a dispatch
                        results[index] = Some(Err(e.into()));
                        completed += 1;
                        progress(completed, total);
                        continue;
                    }
                };
                let worker = self.idle_rx.recv()?;
                let id = next_id;
                next_id += 1;
                log::trace!(
                    "Dispatching {} as job {} to worker {}",
                    file.relative_path,
                    id,
                    worker
                );
                in_flight.insert(id, index);
                self.job_txs[worker].send(Job {
                    id,
                    bytes,
                    fallback_modified: file.last_modified,
                })?;
            }

            while !in_flight.is_empty() {
                let reply = self.reply_rx.recv()?;
                self.idle_tx.send(reply.worker)?;
                if let Some(index) = in_flight.remove(&reply.id) {
                    results[index] = Some(reply.result);
                    completed += 1;
                    progress(completed, total);
                }
            }
        }

        Ok(results
            .into_iter()
            .map(|r| r.unwrap_or_else(|| Err(AppError::Generic("worker produced no reply".into()))))
            .collect())
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // closing the job channels ends the worker loops
        self.job_txs.clear();
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }
}
