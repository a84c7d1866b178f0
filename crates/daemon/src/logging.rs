// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scheduler log setup.
//!
//! The log file format is part of the external contract:
//! `<timestamp> <LEVEL> - <message>` with levels
//! `{DEBUG, INFO, WARNING, ERROR}`. Verbosity is runtime-switchable via
//! the `set-verbosity` command through a reloadable filter.

use std::fmt;
use std::path::Path;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::reload;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry};

/// `<timestamp> <LEVEL> - <message>`
pub struct SchedulerLogFormat;

fn level_name(level: Level) -> &'static str {
    match level {
        Level::ERROR => "ERROR",
        Level::WARN => "WARNING",
        Level::INFO => "INFO",
        Level::DEBUG | Level::TRACE => "DEBUG",
    }
}

impl<S, N> FormatEvent<S, N> for SchedulerLogFormat
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> fmt::Result {
        let timestamp = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
        let level = level_name(*event.metadata().level());
        write!(writer, "{timestamp} {level} - ")?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// Handle for runtime verbosity changes; holds the appender guard.
pub struct LogHandle {
    reload: reload::Handle<EnvFilter, Registry>,
    _guard: WorkerGuard,
}

impl LogHandle {
    /// Apply one of the accepted levels. The caller validates against
    /// [`gyre_engine::runtime`]'s level set before this point.
    pub fn set_verbosity(&self, level: &str) -> Result<(), String> {
        let directive = match level {
            "DEBUG" => "debug",
            "INFO" => "info",
            "WARNING" => "warn",
            "ERROR" => "error",
            other => return Err(format!("illegal verbosity level: {other:?}")),
        };
        self.reload
            .reload(EnvFilter::new(directive))
            .map_err(|e| e.to_string())
    }
}

/// Install the scheduler log writing to `<log_dir>/log`.
pub fn init(log_dir: &Path) -> std::io::Result<LogHandle> {
    std::fs::create_dir_all(log_dir)?;
    let appender = tracing_appender::rolling::never(log_dir, "log");
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let (filter, handle) = reload::Layer::new(filter);

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .event_format(SchedulerLogFormat)
                .with_writer(writer)
                .with_ansi(false),
        )
        .init();

    Ok(LogHandle { reload: handle, _guard: guard })
}
