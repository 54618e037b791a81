use tracing::Subscriber;
use tracing_subscriber::{
    fmt::{FormatEvent, FormatFields},
    registry::LookupSpan,
};

/// Compact event format: level, then the fields. This tool creates no
/// spans, so there is nothing else worth printing.
pub(crate) struct Formatter;
impl<S, N> FormatEvent<S, N> for Formatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &tracing_subscriber::fmt::FmtContext<'_, S, N>,
        writer: &mut dyn std::fmt::Write,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        write!(writer, "{:>5}: ", event.metadata().level())?;
        ctx.field_format().format_fields(writer, event)?;
        writeln!(writer)
    }
}
