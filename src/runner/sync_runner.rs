use parking_lot::Mutex;
use std::sync::Arc;

use super::dispatcher::Dispatcher;
use super::{MessagePool, Runner};
use crate::config::{LogConfig, PoolExhaustionPolicy};
use crate::error::{ConfigError, Result};
use crate::message::LogMessage;
use crate::registry::TypeRegistry;

/// Formats and writes each message on the thread that submits it.
///
/// Submissions are serialized by one lock, so lines come out in the order
/// the lock was taken. Appenders are flushed after every message.
pub struct SyncRunner {
    pool: MessagePool,
    dispatcher: Mutex<Option<Dispatcher>>,
}

impl SyncRunner {
    pub fn new(config: LogConfig) -> Result<Self> {
        Self::with_registry(config, TypeRegistry::global())
    }

    pub fn with_registry(config: LogConfig, registry: Arc<TypeRegistry>) -> Result<Self> {
        let pool = MessagePool::new(&config, registry)?;
        let dispatcher = Dispatcher::new(&config, &pool)?;
        Ok(Self {
            pool,
            dispatcher: Mutex::new(Some(dispatcher)),
        })
    }
}

impl Runner for SyncRunner {
    fn try_acquire_log_message(&self) -> Option<Box<LogMessage>> {
        self.pool.try_acquire()
    }

    fn allocate_log_message(&self) -> Box<LogMessage> {
        self.pool.allocate()
    }

    fn submit(&self, message: Box<LogMessage>) {
        {
            let mut guard = self.dispatcher.lock();
            if let Some(dispatcher) = guard.as_mut() {
                dispatcher.dispatch(&message);
                dispatcher.flush(&self.pool);
            }
        }
        self.pool.release(message);
    }

    fn notify_dropped(&self) {
        self.pool.notify_dropped();
    }

    fn exhaustion_policy(&self) -> PoolExhaustionPolicy {
        self.pool.policy()
    }

    fn update_config(&self, config: LogConfig) -> Result<()> {
        config.validate()?;
        let mut guard = self.dispatcher.lock();
        match guard.as_mut() {
            Some(dispatcher) => {
                dispatcher.apply(&config, &self.pool);
                Ok(())
            }
            None => Err(ConfigError::RunnerStopped),
        }
    }

    fn shutdown(&self) {
        let dispatcher = {
            let mut guard = self.dispatcher.lock();
            self.pool.stop();
            guard.take()
        };

        if let Some(mut dispatcher) = dispatcher {
            dispatcher.close(&self.pool);
            self.pool.dispose();
            tracing::debug!("sync runner stopped");
        }
    }

    fn is_running(&self) -> bool {
        self.pool.is_running()
    }
}

impl Drop for SyncRunner {
    fn drop(&mut self) {
        self.shutdown();
    }
}
