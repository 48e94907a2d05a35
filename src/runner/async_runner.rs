use arc_swap::ArcSwapOption;
use crossbeam::queue::SegQueue;
use crossbeam::utils::Backoff;
use parking_lot::Mutex;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use super::dispatcher::Dispatcher;
use super::idle::{IdleAction, IdlePhase};
use super::{MessagePool, Runner};
use crate::config::{LogConfig, PoolExhaustionPolicy};
use crate::error::{ConfigError, Result};
use crate::message::LogMessage;
use crate::registry::TypeRegistry;

const THREAD_NAME: &str = "segment-logger";

/// State shared between producers and the background thread.
struct Shared {
    pool: MessagePool,
    queue: SegQueue<Box<LogMessage>>,
    pending_config: ArcSwapOption<LogConfig>,
    accepting_config: AtomicBool,
}

/// Hands messages to a dedicated background thread.
///
/// Producers push onto an unbounded lock-free queue and return at once.
/// The background thread dispatches messages in the order they were
/// queued, across all producer threads, and puts each record back in the
/// pool before taking the next one.
///
/// When the queue runs dry the thread spins, then yields; it never blocks.
/// The first idle tick after a burst flushes the appenders, and a later one
/// applies any configuration published through
/// [`update_config`](Runner::update_config).
///
/// # Shutdown
///
/// [`shutdown`](Runner::shutdown) stops new configuration, clears the
/// running flag and joins the thread. The thread keeps draining the queue
/// until it is empty, so every message submitted before the flag flipped is
/// delivered. It then flushes and disposes the appenders.
///
/// Dropping the runner shuts it down too. With
/// `background_thread_is_daemon` set, the drop only signals the thread
/// and does not wait for it.
///
/// # Failures
///
/// A panic inside the background thread (from an appender, usually) is
/// caught at the thread root, reported through `tracing` and stderr, and
/// stops the runner. It never takes down the process.
pub struct AsyncRunner {
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
    daemon: bool,
}

impl AsyncRunner {
    pub fn new(config: LogConfig) -> Result<Self> {
        Self::with_registry(config, TypeRegistry::global())
    }

    pub fn with_registry(config: LogConfig, registry: Arc<TypeRegistry>) -> Result<Self> {
        let pool = MessagePool::new(&config, registry)?;
        let dispatcher = Dispatcher::new(&config, &pool)?;

        let shared = Arc::new(Shared {
            pool,
            queue: SegQueue::new(),
            pending_config: ArcSwapOption::from(None),
            accepting_config: AtomicBool::new(true),
        });

        let worker_shared = Arc::clone(&shared);
        let worker = thread::Builder::new()
            .name(THREAD_NAME.to_string())
            .spawn(move || consumer_thread(worker_shared, dispatcher))
            .map_err(|err| ConfigError::ThreadSpawn(err.to_string()))?;

        Ok(Self {
            shared,
            worker: Mutex::new(Some(worker)),
            daemon: config.background_thread_is_daemon,
        })
    }

    /// Messages waiting for the background thread.
    pub fn queued(&self) -> usize {
        self.shared.queue.len()
    }

    fn signal_stop(&self) {
        self.shared.accepting_config.store(false, Ordering::Release);
        self.shared.pool.stop();
    }
}

impl Runner for AsyncRunner {
    fn try_acquire_log_message(&self) -> Option<Box<LogMessage>> {
        self.shared.pool.try_acquire()
    }

    fn allocate_log_message(&self) -> Box<LogMessage> {
        self.shared.pool.allocate()
    }

    #[inline]
    fn submit(&self, message: Box<LogMessage>) {
        if self.shared.pool.is_running() {
            self.shared.queue.push(message);
        }
    }

    fn notify_dropped(&self) {
        self.shared.pool.notify_dropped();
    }

    fn exhaustion_policy(&self) -> PoolExhaustionPolicy {
        self.shared.pool.policy()
    }

    fn update_config(&self, config: LogConfig) -> Result<()> {
        config.validate()?;
        if !self.shared.accepting_config.load(Ordering::Acquire) {
            return Err(ConfigError::RunnerStopped);
        }
        self.shared.pending_config.store(Some(Arc::new(config)));
        Ok(())
    }

    fn shutdown(&self) {
        self.signal_stop();

        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            if worker.thread().id() == thread::current().id() {
                return;
            }
            if worker.join().is_err() {
                tracing::error!("log consumer thread exited abnormally");
            }
        }
    }

    fn is_running(&self) -> bool {
        self.shared.pool.is_running()
    }
}

impl Drop for AsyncRunner {
    fn drop(&mut self) {
        if self.daemon {
            self.signal_stop();
        } else {
            self.shutdown();
        }
    }
}

fn consumer_thread(shared: Arc<Shared>, mut dispatcher: Dispatcher) {
    let result = panic::catch_unwind(AssertUnwindSafe(|| run(&shared, &mut dispatcher)));

    match result {
        Ok(()) => {
            dispatcher.close(&shared.pool);
            tracing::debug!("log consumer thread stopped");
        }
        Err(payload) => {
            let reason = panic_reason(payload.as_ref());
            tracing::error!(%reason, "log consumer thread failed; shutting the runner down");
            eprintln!("segment_logger: log consumer thread failed: {reason}");

            shared.accepting_config.store(false, Ordering::Release);
            shared.pool.stop();
            while shared.queue.pop().is_some() {}

            if panic::catch_unwind(AssertUnwindSafe(|| dispatcher.close(&shared.pool))).is_err() {
                tracing::error!("appenders failed to close after consumer failure");
            }
        }
    }

    shared.pool.dispose();
}

/// Dispatch loop. Returns once the runner has stopped and the queue is empty.
fn run(shared: &Shared, dispatcher: &mut Dispatcher) {
    let backoff = Backoff::new();
    let mut phase = IdlePhase::default();

    loop {
        if let Some(message) = shared.queue.pop() {
            dispatcher.dispatch(&message);
            shared.pool.release(message);
            phase = phase.on_work();
            backoff.reset();
            continue;
        }

        if !shared.pool.is_running() {
            // A producer may have pushed between the pop and the flag check
            if shared.queue.is_empty() {
                return;
            }
            continue;
        }

        let (action, next) = phase.on_idle(shared.pending_config.load().is_some());
        phase = next;
        match action {
            IdleAction::Flush => dispatcher.flush(&shared.pool),
            IdleAction::ApplyConfig => {
                if let Some(config) = shared.pending_config.swap(None) {
                    dispatcher.apply(&config, &shared.pool);
                }
            }
            IdleAction::Snooze => backoff.snooze(),
        }
    }
}

fn panic_reason(payload: &(dyn Any + Send)) -> &str {
    if let Some(text) = payload.downcast_ref::<&'static str>() {
        text
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text
    } else {
        "unknown panic"
    }
}
