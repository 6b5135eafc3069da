pub mod timer_scheduler;

pub use timer_scheduler::{interval_from_minutes, Timer, TimerInfo, TimerKind, TimerScheduler, NO_INTERVAL_MS};
