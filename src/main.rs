use std::sync::Arc;
use std::thread;

use segment_logger::{
    create_runner, impl_log_enum, log_message, ConfigError, LogConfig, LogLevel, Logger, SharedAppender,
    TypeRegistry, WriterAppender,
};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy)]
#[repr(u8)]
enum OrderState {
    Pending,
    Filled,
    Cancelled,
}

impl_log_enum!(OrderState as u8 { Pending, Filled, Cancelled });

fn main() -> Result<(), ConfigError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    TypeRegistry::global().register_enum::<OrderState>();

    let runner = create_runner(LogConfig {
        pool_size: 256,
        background_thread_is_daemon: false,
        appenders: vec![SharedAppender::new("stdout", WriterAppender::stdout())],
        ..LogConfig::default()
    })?;

    let workers: Vec<_> = (0..4u32)
        .map(|worker| {
            let logger = Logger::new("orders", LogLevel::Info, Arc::clone(&runner));
            thread::spawn(move || {
                for order in 0..3u64 {
                    let state = if order % 2 == 0 { OrderState::Filled } else { OrderState::Pending };
                    logger
                        .info()
                        .append("order ")
                        .append(order)
                        .append(" is ")
                        .append_enum(state)
                        .append_key_value("worker", worker)
                        .append_key_value("price", 101.25f64)
                        .log();
                }
            })
        })
        .collect();

    for worker in workers {
        let _ = worker.join();
    }

    let logger = Logger::new("main", LogLevel::Debug, Arc::clone(&runner));
    log_message!(logger, LogLevel::Warn, "cancelled: ", OrderState::Cancelled as u8, " orders");

    runner.shutdown();
    Ok(())
}
