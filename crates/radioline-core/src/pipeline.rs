//! Producer/consumer pipeline over a bounded task queue.
//!
//! One producer thread drives a [`TaskSource`]; N worker threads each own a
//! [`TaskProcessor`] instance and pull from the shared queue. End of stream
//! is signaled explicitly by closing the queue when the source returns —
//! the idle timeout is only a safety net against a wedged producer.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use anyhow::Result;

use crate::queue::{Recv, TaskQueue};

/// Producer-side collaborator: emits a finite (or empty) sequence of tasks.
///
/// The source must return for the pipeline to finish; returning without
/// emitting anything is the empty-sequence case.
pub trait TaskSource<T>: Send {
    fn run(&mut self, out: &Emitter<T>) -> Result<()>;
}

impl<T, F> TaskSource<T> for F
where
    F: FnMut(&Emitter<T>) -> Result<()> + Send,
{
    fn run(&mut self, out: &Emitter<T>) -> Result<()> {
        self(out)
    }
}

/// Consumer-side collaborator: handles one task, side effects only.
///
/// Errors are logged by the worker loop and never terminate the worker.
pub trait TaskProcessor<T>: Send {
    fn process(&mut self, task: T) -> Result<()>;
}

impl<T, F> TaskProcessor<T> for F
where
    F: FnMut(T) -> Result<()> + Send,
{
    fn process(&mut self, task: T) -> Result<()> {
        self(task)
    }
}

/// The pipeline stopped while the source was still emitting. Sources
/// should propagate this and return; the producer thread treats it as a
/// clean truncation, not a failure.
#[derive(Debug, PartialEq, Eq)]
pub struct PipelineStopped;

impl std::fmt::Display for PipelineStopped {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "pipeline stopped before the task source finished")
    }
}

impl std::error::Error for PipelineStopped {}

/// Handle given to a [`TaskSource`] for emitting tasks and applying
/// voluntary backpressure between batches.
pub struct Emitter<T> {
    queue: Arc<TaskQueue<T>>,
    produced: AtomicUsize,
}

impl<T> Emitter<T> {
    /// Enqueue one task, blocking while the queue is at capacity.
    ///
    /// Fails once the queue is closed under the source — the workers'
    /// exit on the cooperative-stop flag — so a source blocked against a
    /// full queue can never outlive its workers.
    pub fn send(&self, task: T) -> Result<(), PipelineStopped> {
        self.queue.put(task).map_err(|_| PipelineStopped)?;
        self.produced.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Block until the queue has drained to at most `threshold` tasks.
    /// A sync point for sources that enumerate far faster than workers
    /// consume.
    pub fn drain_below(&self, threshold: usize) {
        self.queue.wait_drained_below(threshold);
    }

    /// Approximate queue occupancy.
    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }
}

/// Counters from one pipeline run.
#[derive(Debug)]
pub struct Summary {
    pub produced: usize,
    pub consumed: usize,
    pub failed: usize,
    pub elapsed: Duration,
}

impl Summary {
    pub fn log(&self, stage: &str) {
        log::info!(
            "{stage}: {} tasks produced, {} consumed ({} failed) in {:.1}s",
            self.produced,
            self.consumed,
            self.failed,
            self.elapsed.as_secs_f64()
        );
    }
}

/// Pipeline wiring: queue capacity, worker pool size, idle timeout, and a
/// cooperative stop flag checked by every worker between tasks.
pub struct Pipeline {
    pub queue_capacity: usize,
    pub workers: usize,
    pub idle_timeout: Duration,
    pub stop: Arc<AtomicBool>,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self {
            queue_capacity: 2048,
            workers: 8,
            idle_timeout: Duration::from_secs(30),
            stop: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl Pipeline {
    /// Run the source to completion against a pool of workers, each built
    /// by `make_processor` so it owns its own client/sink handles.
    ///
    /// Per-task processor failures are logged and counted, never fatal.
    /// A source failure truncates the stream (logged, workers drain what
    /// was already queued). Setting the stop flag makes each worker exit
    /// after its current task and close the queue, which in turn rejects
    /// the source's next send. Returns once every thread has stopped.
    pub fn run<T, S, P>(
        &self,
        mut source: S,
        mut make_processor: impl FnMut(usize) -> Result<P>,
    ) -> Result<Summary>
    where
        T: Send,
        S: TaskSource<T>,
        P: TaskProcessor<T> + Send,
    {
        let start = Instant::now();
        let queue = Arc::new(TaskQueue::new(self.queue_capacity));
        let emitter = Emitter {
            queue: queue.clone(),
            produced: AtomicUsize::new(0),
        };
        let consumed = AtomicUsize::new(0);
        let failed = AtomicUsize::new(0);

        // Build every processor up front so a construction failure aborts
        // the run before any thread starts.
        let mut processors = Vec::with_capacity(self.workers);
        for worker_id in 0..self.workers {
            processors.push(make_processor(worker_id)?);
        }

        std::thread::scope(|scope| {
            let producer_queue = &queue;
            let producer_emitter = &emitter;
            let producer_stop = &self.stop;
            scope.spawn(move || {
                let result = source.run(producer_emitter);
                // Explicit end-of-stream: workers stop on Closed, not on
                // wall-clock silence.
                producer_queue.close();
                if let Err(e) = result {
                    if producer_stop.load(Ordering::Relaxed) {
                        log::info!("producer: stop requested, task source truncated");
                    } else {
                        log::error!("producer: task source failed: {e:#}");
                    }
                }
            });

            for (worker_id, mut processor) in processors.into_iter().enumerate() {
                let queue = &queue;
                let consumed = &consumed;
                let failed = &failed;
                let stop = &self.stop;
                let idle_timeout = self.idle_timeout;
                scope.spawn(move || {
                    loop {
                        match queue.get(idle_timeout) {
                            Recv::Task(task) => match processor.process(task) {
                                Ok(()) => {
                                    consumed.fetch_add(1, Ordering::Relaxed);
                                }
                                Err(e) => {
                                    failed.fetch_add(1, Ordering::Relaxed);
                                    log::error!("worker {worker_id}: task failed: {e:#}");
                                }
                            },
                            Recv::Closed => break,
                            Recv::TimedOut => {
                                log::warn!(
                                    "worker {worker_id}: no task within {:.0}s and queue not \
                                     closed, giving up on the producer",
                                    idle_timeout.as_secs_f64()
                                );
                                break;
                            }
                        }
                        if stop.load(Ordering::Relaxed) {
                            log::info!("worker {worker_id}: stop requested, exiting");
                            // Unblock a producer stuck on a full queue:
                            // its pending sends come back rejected.
                            queue.close();
                            break;
                        }
                    }
                });
            }
        });

        Ok(Summary {
            produced: emitter.produced.load(Ordering::Relaxed),
            consumed: consumed.load(Ordering::Relaxed),
            failed: failed.load(Ordering::Relaxed),
            elapsed: start.elapsed(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Mutex;

    #[test]
    fn empty_source_finishes_immediately() {
        let pipeline = Pipeline {
            workers: 2,
            idle_timeout: Duration::from_secs(30),
            ..Pipeline::default()
        };
        let start = Instant::now();
        let summary = pipeline
            .run(
                |_out: &Emitter<u32>| -> Result<()> { Ok(()) },
                |_| Ok(|_task: u32| -> Result<()> { Ok(()) }),
            )
            .unwrap();
        assert_eq!(summary.produced, 0);
        assert_eq!(summary.consumed, 0);
        // Workers must stop on close, not wait out the idle timeout.
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn every_task_consumed_exactly_once() {
        let pipeline = Pipeline {
            queue_capacity: 16,
            workers: 4,
            idle_timeout: Duration::from_secs(10),
            ..Pipeline::default()
        };
        let seen = Arc::new(Mutex::new(Vec::new()));
        let summary = pipeline
            .run(
                |out: &Emitter<u32>| -> Result<()> {
                    for i in 0..200 {
                        out.send(i)?;
                    }
                    Ok(())
                },
                |_| {
                    let seen = seen.clone();
                    Ok(move |task: u32| -> Result<()> {
                        seen.lock().unwrap().push(task);
                        Ok(())
                    })
                },
            )
            .unwrap();

        assert_eq!(summary.produced, 200);
        assert_eq!(summary.consumed, 200);
        assert_eq!(summary.failed, 0);
        let mut tasks = seen.lock().unwrap().clone();
        tasks.sort_unstable();
        assert_eq!(tasks, (0..200).collect::<Vec<_>>());
    }

    #[test]
    fn processor_failures_are_counted_not_fatal() {
        let pipeline = Pipeline {
            workers: 2,
            idle_timeout: Duration::from_secs(10),
            ..Pipeline::default()
        };
        let summary = pipeline
            .run(
                |out: &Emitter<u32>| -> Result<()> {
                    for i in 0..10 {
                        out.send(i)?;
                    }
                    Ok(())
                },
                |_| {
                    Ok(|task: u32| -> Result<()> {
                        if task % 2 == 0 {
                            anyhow::bail!("even task rejected")
                        }
                        Ok(())
                    })
                },
            )
            .unwrap();
        assert_eq!(summary.consumed, 5);
        assert_eq!(summary.failed, 5);
    }

    #[test]
    fn source_error_truncates_but_drains() {
        let pipeline = Pipeline {
            workers: 2,
            idle_timeout: Duration::from_secs(10),
            ..Pipeline::default()
        };
        let seen = Arc::new(Mutex::new(HashSet::new()));
        let summary = pipeline
            .run(
                |out: &Emitter<u32>| -> Result<()> {
                    out.send(1)?;
                    out.send(2)?;
                    anyhow::bail!("source blew up")
                },
                |_| {
                    let seen = seen.clone();
                    Ok(move |task: u32| -> Result<()> {
                        seen.lock().unwrap().insert(task);
                        Ok(())
                    })
                },
            )
            .unwrap();
        // Tasks emitted before the failure are still processed.
        assert_eq!(summary.consumed, 2);
        assert_eq!(seen.lock().unwrap().len(), 2);
    }

    #[test]
    fn stop_flag_unblocks_producer_and_workers() {
        // Tiny queue, one worker, flag pre-set, and a source with far more
        // tasks than the queue holds: the worker finishes its current task
        // and closes the queue, which must bounce the producer's blocked
        // send instead of leaving it wedged against a dead pool.
        let stop = Arc::new(AtomicBool::new(true));
        let pipeline = Pipeline {
            queue_capacity: 2,
            workers: 1,
            idle_timeout: Duration::from_secs(10),
            stop: stop.clone(),
        };
        let start = Instant::now();
        let summary = pipeline
            .run(
                |out: &Emitter<u32>| -> Result<()> {
                    for i in 0..100 {
                        out.send(i)?;
                    }
                    Ok(())
                },
                |_| Ok(|_task: u32| -> Result<()> { Ok(()) }),
            )
            .unwrap();
        assert!(start.elapsed() < Duration::from_secs(5), "pipeline hung on stop");
        assert!(summary.consumed >= 1);
        assert!(summary.produced < 100);
    }

    #[test]
    fn drain_below_backpressure_caps_occupancy() {
        let pipeline = Pipeline {
            queue_capacity: 1024,
            workers: 2,
            idle_timeout: Duration::from_secs(10),
            ..Pipeline::default()
        };
        let summary = pipeline
            .run(
                |out: &Emitter<u32>| -> Result<()> {
                    for i in 0..50 {
                        out.send(i)?;
                    }
                    out.drain_below(0);
                    assert_eq!(out.queue_len(), 0);
                    for i in 100..150 {
                        out.send(i)?;
                    }
                    Ok(())
                },
                |_| Ok(|_task: u32| -> Result<()> { Ok(()) }),
            )
            .unwrap();
        assert_eq!(summary.produced, 100);
        assert_eq!(summary.consumed, 100);
    }
}
