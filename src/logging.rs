use std::io;
use tracing::Level;
use tracing_appender::rolling;
use tracing_subscriber::filter::FilterFn;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

pub fn configure_logging() {
    // Custom filter to ignore specific warnings
    let custom_filter = FilterFn::new(|metadata| {
        // Exclude noisy serializer warnings from the HTML stripper's parser
        !(metadata.level() == &Level::WARN && metadata.target() == "html5ever::serialize")
    });

    // Stdout log configuration
    let stdout_log = fmt::layer()
        .with_writer(io::stdout)
        .with_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,web_request=info,db_query=warn,sqlx=off")),
        )
        .with_filter(custom_filter);

    // File log configuration
    let file_appender = rolling::daily("logs", "newsdiff.log");
    let file_log = fmt::layer()
        .with_writer(file_appender)
        .with_filter(EnvFilter::new("debug,sqlx=info"));

    tracing_subscriber::Registry::default()
        .with(stdout_log)
        .with(file_log)
        .init();
}
