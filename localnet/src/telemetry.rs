//! Log subscriber and optional OTLP trace export.
//!
//! [`Telemetry`] always installs a console subscriber filtered by `RUST_LOG`.
//! With the `telemetry` feature enabled and any `OTEL_EXPORTER_OTLP_*`
//! variable set, spans are additionally exported over OTLP.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[cfg(feature = "telemetry")]
use opentelemetry::trace::TracerProvider;
#[cfg(feature = "telemetry")]
use opentelemetry::{KeyValue, Value};
#[cfg(feature = "telemetry")]
use opentelemetry_sdk::{
    Resource,
    trace::{RandomIdGenerator, Sampler, SdkTracerProvider},
};
#[cfg(feature = "telemetry")]
use opentelemetry_semantic_conventions::{
    SCHEMA_URL,
    attribute::{DEPLOYMENT_ENVIRONMENT_NAME, SERVICE_VERSION},
};
#[cfg(feature = "telemetry")]
use tracing_opentelemetry::OpenTelemetryLayer;

/// Supported OTLP transport protocols.
#[cfg(feature = "telemetry")]
#[derive(Debug, Clone, Copy)]
enum OtlpProtocol {
    Http,
    Grpc,
}

/// Detects the OTLP protocol from the environment; `None` when OTLP is not
/// configured.
#[cfg(feature = "telemetry")]
fn detect_protocol() -> Option<OtlpProtocol> {
    let configured = ["ENDPOINT", "HEADERS", "PROTOCOL"]
        .iter()
        .any(|suffix| std::env::var(format!("OTEL_EXPORTER_OTLP_{suffix}")).is_ok());
    configured.then(|| match std::env::var("OTEL_EXPORTER_OTLP_PROTOCOL").as_deref() {
        Ok("grpc") => OtlpProtocol::Grpc,
        _ => OtlpProtocol::Http,
    })
}

/// Non-empty env var, or the programmatic fallback.
#[cfg(feature = "telemetry")]
fn resolve_env(key: &str, fallback: Option<&str>) -> Option<Value> {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .or_else(|| fallback.map(str::to_owned))
        .map(Value::from)
}

/// Service identity and log level for the process-wide subscriber.
///
/// `OTEL_SERVICE_NAME`, `OTEL_SERVICE_VERSION` and `OTEL_SERVICE_DEPLOYMENT`
/// override the programmatic values.
#[derive(Debug, Default)]
#[cfg_attr(not(feature = "telemetry"), allow(dead_code))]
pub struct Telemetry {
    name: Option<String>,
    version: Option<String>,
    log_level: Option<String>,
}

impl Telemetry {
    /// Creates an empty configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the service name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the service version.
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Sets the filter used when `RUST_LOG` is unset, e.g. `"localnet=debug"`.
    #[must_use]
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = Some(level.into());
        self
    }

    #[cfg(feature = "telemetry")]
    fn resource(&self) -> Resource {
        let mut builder = Resource::builder();
        if let Some(name) = resolve_env("OTEL_SERVICE_NAME", self.name.as_deref()) {
            builder = builder.with_service_name(name);
        }
        let mut attributes = Vec::<KeyValue>::with_capacity(2);
        if let Some(version) = resolve_env("OTEL_SERVICE_VERSION", self.version.as_deref()) {
            attributes.push(KeyValue::new(SERVICE_VERSION, version));
        }
        if let Some(deployment) = resolve_env("OTEL_SERVICE_DEPLOYMENT", None) {
            attributes.push(KeyValue::new(DEPLOYMENT_ENVIRONMENT_NAME, deployment));
        }
        if !attributes.is_empty() {
            builder = builder.with_schema_url(attributes, SCHEMA_URL);
        }
        builder.build()
    }

    #[cfg(feature = "telemetry")]
    fn init_tracer(&self, protocol: OtlpProtocol) -> Option<SdkTracerProvider> {
        let exporter = match protocol {
            OtlpProtocol::Http => opentelemetry_otlp::SpanExporter::builder()
                .with_http()
                .build(),
            OtlpProtocol::Grpc => opentelemetry_otlp::SpanExporter::builder()
                .with_tonic()
                .build(),
        };
        let exporter = exporter.ok()?;

        Some(
            SdkTracerProvider::builder()
                .with_sampler(Sampler::ParentBased(Box::new(Sampler::AlwaysOn)))
                .with_id_generator(RandomIdGenerator::default())
                .with_resource(self.resource())
                .with_batch_exporter(exporter)
                .build(),
        )
    }

    /// Installs the global subscriber.
    ///
    /// Returns a [`TelemetryGuard`] that flushes exported spans on drop.
    pub fn register(self) -> TelemetryGuard {
        let fallback = self.log_level.as_deref().unwrap_or("info");
        let registry = tracing_subscriber::registry()
            .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| fallback.into()))
            .with(tracing_subscriber::fmt::layer());

        #[cfg(feature = "telemetry")]
        let tracer_provider = detect_protocol().and_then(|p| self.init_tracer(p));
        #[cfg(feature = "telemetry")]
        let registry = registry.with(
            tracer_provider
                .as_ref()
                .map(|tp| OpenTelemetryLayer::new(tp.tracer("localnet"))),
        );
        registry.init();

        #[cfg(feature = "telemetry")]
        {
            if tracer_provider.is_some() {
                tracing::info!("OpenTelemetry span export enabled");
            } else {
                tracing::debug!("OpenTelemetry is not configured, console logging only");
            }
        }

        TelemetryGuard {
            #[cfg(feature = "telemetry")]
            tracer_provider,
        }
    }
}

/// Flushes and shuts down span export on drop.
#[derive(Debug)]
pub struct TelemetryGuard {
    #[cfg(feature = "telemetry")]
    tracer_provider: Option<SdkTracerProvider>,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        #[cfg(feature = "telemetry")]
        {
            if let Some(ref tp) = self.tracer_provider
                && let Err(err) = tp.shutdown()
            {
                tracing::error!(?err, "tracer provider shutdown error");
            }
        }
    }
}

#[cfg(all(test, feature = "telemetry"))]
mod tests {
    use super::*;

    #[test]
    fn programmatic_identity_is_the_fallback() {
        assert_eq!(
            resolve_env("LOCALNET_TEST_UNSET_SERVICE_NAME", Some("localnet")),
            Some(Value::from("localnet"))
        );
        assert_eq!(resolve_env("LOCALNET_TEST_UNSET_SERVICE_NAME", None), None);
    }
}
