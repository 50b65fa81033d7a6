use std::io::{self, Write};
use std::str::FromStr;
use tokio::sync::mpsc::UnboundedSender;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, Layer};

struct ChannelWriter {
    tx: UnboundedSender<String>,
}

impl Write for ChannelWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let s = String::from_utf8_lossy(buf).to_string();
        let _ = self.tx.send(s);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Parses a configured level name, falling back to INFO.
pub fn parse_level(level: &str) -> LevelFilter {
    LevelFilter::from_str(level.trim()).unwrap_or(LevelFilter::INFO)
}

/// Initialize logging at the given level. If a channel is provided, log output
/// is forwarded to the channel instead of standard output.
pub fn init_logging(level: &str, forward: Option<UnboundedSender<String>>) {
    let level = parse_level(level);
    if let Some(tx) = forward {
        let layer = fmt::layer()
            .with_ansi(false)
            .with_writer(move || ChannelWriter { tx: tx.clone() });
        tracing_subscriber::registry().with(layer.with_filter(level)).init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_filter(level))
            .init();
    }
}
