/// What the consumer thread does when the queue is empty.
///
/// After a burst of work the first idle tick flushes the appenders and the
/// next one applies a pending configuration. Configuration published while
/// nothing is being logged is picked up on the next idle tick.
///
/// ```text
///            work                    tick                tick
/// (any) ─────────► FlushPending ─────────► ConfigPending ─────────► Idle
///                    (Flush)               (ApplyConfig)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum IdlePhase {
    #[default]
    Idle,
    FlushPending,
    ConfigPending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum IdleAction {
    Flush,
    ApplyConfig,
    Snooze,
}

impl IdlePhase {
    /// A message was dispatched.
    #[inline]
    pub(crate) fn on_work(self) -> IdlePhase {
        IdlePhase::FlushPending
    }

    /// The queue was found empty.
    pub(crate) fn on_idle(self, config_published: bool) -> (IdleAction, IdlePhase) {
        match self {
            IdlePhase::FlushPending => (IdleAction::Flush, IdlePhase::ConfigPending),
            IdlePhase::ConfigPending => (IdleAction::ApplyConfig, IdlePhase::Idle),
            IdlePhase::Idle if config_published => (IdleAction::ApplyConfig, IdlePhase::Idle),
            IdlePhase::Idle => (IdleAction::Snooze, IdlePhase::Idle),
        }
    }
}
