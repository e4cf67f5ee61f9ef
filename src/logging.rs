//! Logging (§4.9, ambient): tracing-subscriber initialization to stderr, an
//! optional log file, and optional syslog. The teacher's own newer modules
//! (`test_hooks.rs`) already reach for `tracing` over the CLI's old `fern`
//! setup; this generalizes that into the one logging entry point every
//! session worker goes through.

use std::ffi::CString;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use anyhow::Context;
use tracing::{field::Visit, Event, Level, Subscriber};
use tracing_subscriber::layer::{Context as LayerContext, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

use crate::config::GatewayConfig;

/// `-v`/`--verbose` repeat count the same way the teacher project's CLI
/// reads it (0 = info, 1 = debug, 2+ = trace), overridden by `--debug`.
pub fn init(config: &GatewayConfig) -> anyhow::Result<()> {
    let level = if config.debug {
        Level::DEBUG
    } else {
        match config.verbosity {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };
    let filter = EnvFilter::try_new(format!("cachegate={}", level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let writer = build_writer(config)?;
    let fmt_layer = fmt::layer().with_writer(move || writer.clone()).with_target(false);

    let registry = tracing_subscriber::registry().with(filter).with(fmt_layer);

    if config.syslog {
        init_syslog();
        registry.with(SyslogLayer).init();
    } else {
        registry.init();
    }

    Ok(())
}

fn build_writer(config: &GatewayConfig) -> anyhow::Result<DualWriter> {
    let file = match &config.log_file {
        Some(path) => {
            let f = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("opening log file {:?}", path))?;
            Some(Arc::new(Mutex::new(f)))
        }
        None => None,
    };
    Ok(DualWriter { file })
}

#[derive(Clone)]
struct DualWriter {
    file: Option<Arc<Mutex<std::fs::File>>>,
}

impl Write for DualWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::stderr().write_all(buf)?;
        if let Some(file) = &self.file {
            file.lock().unwrap().write_all(buf)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()?;
        if let Some(file) = &self.file {
            file.lock().unwrap().flush()?;
        }
        Ok(())
    }
}

/// syslog wiring is a thin collaborator (§1, §4.9): this hands already
/// formatted records to libc's syslog(3) rather than reimplementing syslog
/// transport.
fn init_syslog() {
    unsafe {
        let ident = CString::new("cachegate").expect("static ident has no interior NUL");
        // openlog retains this pointer for the life of the process.
        libc::openlog(ident.into_raw(), libc::LOG_PID | libc::LOG_CONS, libc::LOG_DAEMON);
    }
}

struct SyslogLayer;

impl<S: Subscriber> Layer<S> for SyslogLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: LayerContext<'_, S>) {
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        let priority = match *event.metadata().level() {
            Level::ERROR => libc::LOG_ERR,
            Level::WARN => libc::LOG_WARNING,
            Level::INFO => libc::LOG_INFO,
            Level::DEBUG => libc::LOG_DEBUG,
            Level::TRACE => libc::LOG_DEBUG,
        };

        if let Ok(c_line) = CString::new(visitor.message) {
            // Passed as an argument to a fixed "%s" format string, never as
            // the format string itself, since log content is not trusted
            // input.
            let fmt = CString::new("%s").expect("static format string has no interior NUL");
            unsafe {
                libc::syslog(priority, fmt.as_ptr(), c_line.as_ptr());
            }
        }
    }
}

#[derive(Default)]
struct MessageVisitor {
    message: String,
}

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        }
    }
}
