use std::sync::Once;

use metrics::{Unit, describe_counter, describe_gauge};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::{
    cache::{
        METRIC_FRAGMENT_ENTRIES, METRIC_FRAGMENT_EVICT, METRIC_FRAGMENT_HIT,
        METRIC_FRAGMENT_INVALIDATE, METRIC_FRAGMENT_MISS,
    },
    config::{LogFormat, LoggingSettings},
};

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
            METRIC_FRAGMENT_HIT,
            Unit::Count,
            "Total number of rendered fragments served from the cache."
        );
        describe_counter!(
            METRIC_FRAGMENT_MISS,
            Unit::Count,
            "Total number of fragment lookups that had to render."
        );
        describe_counter!(
            METRIC_FRAGMENT_EVICT,
            Unit::Count,
            "Total number of fragments evicted due to capacity."
        );
        describe_counter!(
            METRIC_FRAGMENT_INVALIDATE,
            Unit::Count,
            "Total number of full cache clears triggered by writes."
        );
        describe_gauge!(
            METRIC_FRAGMENT_ENTRIES,
            Unit::Count,
            "Current number of cached fragments."
        );
    });
}
