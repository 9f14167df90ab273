//! Compact terminal log format for the command-line front-end.
//!
//! Default tracing format: `TIMESTAMP LEVEL span1:span2: target: message`
//! This format:            `LEVEL target: span1{fields}: message`
//!
//! Output goes to stderr so that command results on stdout stay pipeable.

use std::fmt;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::{FmtContext, FormattedFields};
use tracing_subscriber::fmt::format::{self, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;

/// Event formatter that puts the target first and colours the level when `ansi` is set
pub struct CliLogFormat {
    pub ansi: bool,
}

impl CliLogFormat {
    pub fn new(ansi: bool) -> Self {
        Self { ansi }
    }

    fn level_colour(level: &Level) -> &'static str {
        match *level {
            Level::ERROR => "\x1b[31m",
            Level::WARN => "\x1b[33m",
            Level::INFO => "\x1b[32m",
            Level::DEBUG => "\x1b[34m",
            Level::TRACE => "\x1b[35m",
        }
    }
}

impl<S, N> FormatEvent<S, N> for CliLogFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: format::Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let metadata = event.metadata();
        let level = metadata.level();

        if self.ansi {
            write!(writer, "{}{:>5}\x1b[0m ", Self::level_colour(level), level)?;
        } else {
            write!(writer, "{:>5} ", level)?;
        }

        write!(writer, "{}: ", metadata.target())?;

        // Spans with their recorded fields, e.g. `fetch{method=GET path="/courses"}`
        if let Some(scope) = ctx.event_scope() {
            let mut wrote_any = false;
            for span in scope.from_root() {
                if wrote_any {
                    write!(writer, ":")?;
                }
                write!(writer, "{}", span.name())?;
                let extensions = span.extensions();
                if let Some(fields) = extensions.get::<FormattedFields<N>>()
                    && !fields.is_empty()
                {
                    write!(writer, "{{{}}}", fields)?;
                }
                wrote_any = true;
            }
            if wrote_any {
                write!(writer, ": ")?;
            }
        }

        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}
