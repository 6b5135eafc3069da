//! Recurring channel timers.
//!
//! A `text` timer sends its content on the passive connection every interval.
//! A `command` timer parses its content once when started and dispatches that
//! same invocation on every tick. Ticks are spawned, so a slow handler can
//! overlap with the next tick of the same timer.

use std::future::pending;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use castbot_common::models::TimerDefinition;

use crate::Error;
use crate::services::command_service::Invocation;
use crate::session::ChannelSession;

/// Interval given to timers configured without one. Such a timer never fires.
pub const NO_INTERVAL_MS: u64 = 9_007_199_254_740_991;

const MS_PER_MINUTE: f64 = 60_000.0;

/// Minutes to milliseconds; a missing or non-positive value gives [`NO_INTERVAL_MS`].
pub fn interval_from_minutes(minutes: Option<f64>) -> u64 {
    match minutes {
        Some(m) if m.is_finite() && m > 0.0 => {
            let ms = (m * MS_PER_MINUTE).round();
            if ms >= NO_INTERVAL_MS as f64 { NO_INTERVAL_MS } else { (ms as u64).max(1) }
        }
        _ => NO_INTERVAL_MS,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerKind {
    Text,
    Command,
    Unknown(String),
}

impl TimerKind {
    fn parse(kind: Option<&str>) -> Self {
        match kind.map(str::to_lowercase).as_deref() {
            Some("text") => TimerKind::Text,
            Some("command") => TimerKind::Command,
            Some(other) => TimerKind::Unknown(other.to_string()),
            None => TimerKind::Unknown(String::new()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            TimerKind::Text => "text",
            TimerKind::Command => "command",
            TimerKind::Unknown(s) => s,
        }
    }
}

#[derive(Debug)]
pub struct Timer {
    pub id: Option<i64>,
    pub name: String,
    pub kind: TimerKind,
    pub content: String,
    pub interval_ms: u64,
    /// Carried from configuration; no ordering between timers is enforced.
    pub sequential: bool,
    handle: Option<JoinHandle<()>>,
}

impl Timer {
    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    fn stop(&mut self) -> bool {
        match self.handle.take() {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }
}

impl From<TimerDefinition> for Timer {
    fn from(def: TimerDefinition) -> Self {
        Self {
            id: def.id,
            name: def.name.unwrap_or_default(),
            kind: TimerKind::parse(def.kind.as_deref()),
            content: def.content.unwrap_or_default(),
            interval_ms: interval_from_minutes(def.interval),
            sequential: def.sequential,
            handle: None,
        }
    }
}

/// Read-only view of a registered timer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimerInfo {
    pub id: Option<i64>,
    pub name: String,
    pub kind: String,
    pub interval_ms: u64,
    pub sequential: bool,
    pub running: bool,
}

#[derive(Debug, Default)]
pub struct TimerScheduler {
    timers: Mutex<Vec<Timer>>,
}

impl TimerScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a timer and returns the number of registered timers.
    pub fn register(&self, def: TimerDefinition) -> usize {
        let timer = Timer::from(def);
        debug!("[Timers] registered '{}' every {} ms", timer.name, timer.interval_ms);
        let mut timers = self.timers.lock();
        timers.push(timer);
        timers.len()
    }

    pub fn len(&self) -> usize {
        self.timers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.lock().is_empty()
    }

    /// Starts every timer that has no schedule yet; returns how many started.
    pub fn start_all(&self, session: &ChannelSession) -> usize {
        let mut timers = self.timers.lock();
        let mut started = 0;
        for timer in timers.iter_mut().filter(|t| !t.is_running()) {
            match schedule(timer, session) {
                Ok(()) => started += 1,
                Err(e) => warn!("[Timers] could not start '{}': {}", timer.name, e),
            }
        }
        info!("[Timers] started {} timer(s) for {}", started, session.channel());
        started
    }

    pub fn start(&self, session: &ChannelSession, index: usize) -> Result<(), Error> {
        let mut timers = self.timers.lock();
        let timer = timers
            .get_mut(index)
            .ok_or_else(|| Error::NotFound(format!("timer #{}", index)))?;
        timer.stop();
        schedule(timer, session)
    }

    /// Cancels one timer's schedule; returns whether it was running.
    pub fn stop(&self, index: usize) -> bool {
        self.timers.lock().get_mut(index).map(Timer::stop).unwrap_or(false)
    }

    /// Cancels every running timer; returns how many were stopped.
    pub fn stop_all(&self) -> usize {
        let stopped = self
            .timers
            .lock()
            .iter_mut()
            .map(Timer::stop)
            .filter(|s| *s)
            .count();
        if stopped > 0 {
            info!("[Timers] stopped {} timer(s)", stopped);
        }
        stopped
    }

    pub fn clear(&self) {
        let mut timers = self.timers.lock();
        for timer in timers.iter_mut() {
            timer.stop();
        }
        timers.clear();
    }

    pub fn snapshot(&self) -> Vec<TimerInfo> {
        self.timers
            .lock()
            .iter()
            .map(|t| TimerInfo {
                id: t.id,
                name: t.name.clone(),
                kind: t.kind.as_str().to_string(),
                interval_ms: t.interval_ms,
                sequential: t.sequential,
                running: t.is_running(),
            })
            .collect()
    }
}

fn schedule(timer: &mut Timer, session: &ChannelSession) -> Result<(), Error> {
    let period = timer.interval_ms;
    let weak = session.downgrade_handle();
    let handle = match &timer.kind {
        TimerKind::Text => {
            let content = timer.content.clone();
            let name = timer.name.clone();
            tokio::spawn(run_every(period, move || {
                let Some(session) = weak.upgrade() else {
                    return false;
                };
                if let Err(e) = session.passive_sink().send_message(&content) {
                    warn!("[Timers] '{}' could not send: {}", name, e);
                }
                true
            }))
        }
        TimerKind::Command => {
            let invocation = Invocation::parse(&timer.content, session.bot_sender(), session.passive_sink())
                .ok_or_else(|| Error::Parse(format!("timer '{}' has no command", timer.name)))?;
            tokio::spawn(run_every(period, move || {
                let Some(session) = weak.upgrade() else {
                    return false;
                };
                let invocation = invocation.clone();
                tokio::spawn(async move {
                    let command = invocation.command.clone();
                    if let Err(e) = session.dispatch(invocation).await {
                        error!("[Timers] command '{}' failed: {}", command, e);
                    }
                });
                true
            }))
        }
        TimerKind::Unknown(kind) => {
            return Err(Error::Parse(format!("unknown timer type '{}'", kind)));
        }
    };
    timer.handle = Some(handle);
    Ok(())
}

/// Calls `tick` every `period_ms` until it returns `false`.
async fn run_every<F>(period_ms: u64, mut tick: F)
where
    F: FnMut() -> bool + Send + 'static,
{
    let period = Duration::from_millis(period_ms);
    let first = match Instant::now().checked_add(period) {
        Some(at) if period_ms < NO_INTERVAL_MS => at,
        _ => return pending().await,
    };

    let mut ticker = interval_at(first, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        if !tick() {
            debug!("[Timers] session gone, timer task exits");
            break;
        }
    }
}
