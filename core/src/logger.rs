use tracing::{debug, level_filters::LevelFilter};
use tracing_subscriber::{
    fmt::format::{Format, Writer},
    EnvFilter,
};

struct CustomTimer;

impl tracing_subscriber::fmt::time::FormatTime for CustomTimer {
    fn format_time(&self, writer: &mut Writer<'_>) -> std::fmt::Result {
        let now = chrono::Local::now();
        write!(writer, "{} - {}", now.format("%d %B"), now.format("%H:%M:%S%.3f"))
    }
}

/// Maps the number of `-v` flags given on the command line to a level.
pub fn log_level_from_verbosity(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::INFO,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

/// `RUST_LOG` still applies on top of `log_level`. Connection chatter from the postgres
/// driver and the http stack stays at warn unless asked for explicitly.
pub fn setup_logger(log_level: LevelFilter) {
    let mut filter = EnvFilter::from_default_env().add_directive(log_level.into());
    for noisy in ["tokio_postgres=warn", "hyper_util=warn", "reqwest=warn"] {
        if let Ok(directive) = noisy.parse() {
            filter = filter.add_directive(directive);
        }
    }

    let format = Format::default().with_timer(CustomTimer).with_level(true).with_target(false);

    let subscriber =
        tracing_subscriber::fmt().with_env_filter(filter).event_format(format).finish();

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        debug!("Logger has already been set up, continuing...");
    }
}

pub fn setup_info_logger() {
    setup_logger(LevelFilter::INFO);
}
