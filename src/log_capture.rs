//! Process-wide `log` collector for tests.
//!
//! Records are tagged with the thread that emitted them, so tests running in
//! parallel only see their own output.

use log::{Level, LevelFilter, Log, Metadata, Record};
use std::sync::{Mutex, Once, PoisonError};
use std::thread::{self, ThreadId};

struct Entry {
    thread: ThreadId,
    level: Level,
    message: String,
}

struct LogCollector {
    entries: Mutex<Vec<Entry>>,
}

impl Log for LogCollector {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Entry {
                thread: thread::current().id(),
                level: record.level(),
                message: record.args().to_string(),
            });
    }

    fn flush(&self) {}
}

static COLLECTOR: LogCollector = LogCollector {
    entries: Mutex::new(Vec::new()),
};
static INSTALL: Once = Once::new();

/// Handle on the records the current thread logs from now on.
pub struct CapturedLogs {
    thread: ThreadId,
    start: usize,
}

pub fn capture() -> CapturedLogs {
    INSTALL.call_once(|| {
        if log::set_logger(&COLLECTOR).is_ok() {
            log::set_max_level(LevelFilter::Trace);
        }
    });
    let start = COLLECTOR
        .entries
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .len();
    CapturedLogs {
        thread: thread::current().id(),
        start,
    }
}

impl CapturedLogs {
    /// Whether a record at `level` containing `needle` was logged.
    pub fn contains(&self, level: Level, needle: &str) -> bool {
        let entries = COLLECTOR
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        entries[self.start..]
            .iter()
            .any(|e| e.thread == self.thread && e.level == level && e.message.contains(needle))
    }
}
