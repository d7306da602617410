use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "portal_cache_hit_total",
            Unit::Count,
            "Total number of cache lookups that returned a stored entry."
        );
        describe_counter!(
            "portal_cache_miss_total",
            Unit::Count,
            "Total number of cache lookups that found nothing."
        );
        describe_counter!(
            "portal_cache_write_failed_total",
            Unit::Count,
            "Total number of cache writes that did not persist."
        );
        describe_histogram!(
            "portal_resolver_ms",
            Unit::Milliseconds,
            "Resolver operation latency in milliseconds, by operation."
        );
        describe_counter!(
            "portal_sync_records_total",
            Unit::Count,
            "Total number of characters upserted by sync runs."
        );
        describe_histogram!(
            "portal_sync_ms",
            Unit::Milliseconds,
            "Sync run latency in milliseconds, by outcome."
        );
    });
}
