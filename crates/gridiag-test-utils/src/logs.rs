//! Capturing `log` output in tests.
//!
//! [`capture_logs`] installs a process-wide logger the first time it is
//! called. Records are buffered per thread, so tests running in parallel
//! only see what their own thread logged.

use std::cell::RefCell;
use std::sync::Once;

use log::{Level, LevelFilter, Log, Metadata, Record};

/// One captured log record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CapturedLog {
    pub level: Level,
    pub target: String,
    pub message: String,
}

thread_local! {
    static CAPTURED: RefCell<Option<Vec<CapturedLog>>> = const { RefCell::new(None) };
}

struct ThreadCapture;

impl Log for ThreadCapture {
    fn enabled(&self, _metadata: &Metadata<'_>) -> bool {
        true
    }

    fn log(&self, record: &Record<'_>) {
        CAPTURED.with(|captured| {
            if let Some(buf) = captured.borrow_mut().as_mut() {
                buf.push(CapturedLog {
                    level: record.level(),
                    target: record.target().to_string(),
                    message: record.args().to_string(),
                });
            }
        });
    }

    fn flush(&self) {}
}

static LOGGER: ThreadCapture = ThreadCapture;
static INSTALL: Once = Once::new();

/// Run `f`, returning its result and everything it logged on this thread.
///
/// If some other logger was installed first, nothing is captured.
pub fn capture_logs<R>(f: impl FnOnce() -> R) -> (R, Vec<CapturedLog>) {
    INSTALL.call_once(|| {
        if log::set_logger(&LOGGER).is_ok() {
            log::set_max_level(LevelFilter::Trace);
        }
    });
    CAPTURED.with(|captured| *captured.borrow_mut() = Some(Vec::new()));
    let out = f();
    let logs = CAPTURED
        .with(|captured| captured.borrow_mut().take())
        .unwrap_or_default();
    (out, logs)
}

/// Messages logged at exactly `level`.
pub fn messages_at(logs: &[CapturedLog], level: Level) -> Vec<&str> {
    logs.iter()
        .filter(|l| l.level == level)
        .map(|l| l.message.as_str())
        .collect()
}
