use once_cell::sync::Lazy;
use opentelemetry::{KeyValue, trace::TracerProvider as _};
use opentelemetry_otlp::{Protocol, WithExportConfig, WithTonicConfig};
use opentelemetry_sdk::{
    Resource,
    trace::{RandomIdGenerator, Sampler, SdkTracerProvider},
};
use opentelemetry_semantic_conventions::{
    SCHEMA_URL,
    attribute::{SERVICE_NAME, SERVICE_VERSION},
    resource::DEPLOYMENT_ENVIRONMENT_NAME,
};
use rocket::{
    Data, Orbit, Request, Response, Rocket,
    fairing::{Fairing, Info, Kind},
};
use std::sync::Mutex;
use std::time::Instant;
use tonic::metadata::MetadataMap;
use tracing::{field::Empty, info_span};
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::AppConfig;
use crate::error::AppError;

pub static TELEMETRY_GUARD: Lazy<Mutex<Option<OtelGuard>>> = Lazy::new(|| Mutex::new(None));

pub struct TelemetryFairing;

/// Per-request span and start time, kept in Rocket's request-local cache.
struct RequestTiming {
    span: tracing::Span,
    started: Instant,
}

#[rocket::async_trait]
impl Fairing for TelemetryFairing {
    fn info(&self) -> Info {
        Info {
            name: "Request telemetry",
            kind: Kind::Request | Kind::Response | Kind::Shutdown,
        }
    }

    async fn on_request(&self, request: &mut Request<'_>, _: &mut Data<'_>) {
        let method = request.method().to_string();
        let path = request.uri().path().to_string();

        let span = info_span!(
            "http_request",
            otel.name = format!("{} {}", method, path),
            http.method = method,
            http.uri = path,
            http.route = Empty,
            http.status_code = Empty,
            http.duration_ms = Empty,
            error = Empty,
            error.message = Empty,
        );

        request.local_cache(|| RequestTiming {
            span,
            started: Instant::now(),
        });
    }

    async fn on_response<'r>(&self, request: &'r Request<'_>, response: &mut Response<'r>) {
        let timing = request.local_cache(|| RequestTiming {
            span: info_span!("http_request"),
            started: Instant::now(),
        });

        let elapsed_ms = timing.started.elapsed().as_millis();
        let status = response.status();

        // Templates such as `/<owner>/tasks/<id>` keep span names low-cardinality.
        if let Some(route) = request.route() {
            let template = route.uri.to_string();
            let name = format!("{} {}", request.method(), template);
            timing.span.record("otel.name", name.as_str());
            timing.span.record("http.route", template.as_str());
        }
        timing.span.record("http.status_code", status.code);
        timing.span.record("http.duration_ms", elapsed_ms as i64);

        let _entered = timing.span.enter();
        if status.code >= 500 {
            tracing::error!("Request failed after {}ms with status {}", elapsed_ms, status.code);
        } else {
            tracing::info!("Completed request in {}ms with status {}", elapsed_ms, status.code);
        }
    }

    async fn on_shutdown(&self, _rocket: &Rocket<Orbit>) {
        shutdown_telemetry();
    }
}

fn resource(environment: &str) -> Resource {
    Resource::builder()
        .with_schema_url(
            [
                KeyValue::new(SERVICE_NAME, env!("CARGO_PKG_NAME")),
                KeyValue::new(SERVICE_VERSION, env!("CARGO_PKG_VERSION")),
                KeyValue::new(DEPLOYMENT_ENVIRONMENT_NAME, environment.to_string()),
            ],
            SCHEMA_URL,
        )
        .build()
}

fn init_tracer_provider(
    endpoint: &str,
    api_key: Option<&str>,
    environment: &str,
) -> Result<SdkTracerProvider, AppError> {
    let mut metadata = MetadataMap::new();
    if let Some(key) = api_key {
        let value = key
            .parse()
            .map_err(|_| AppError::Internal("HONEYCOMB_API_KEY is not a valid header".into()))?;
        metadata.insert("x-honeycomb-team", value);
    }

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .with_protocol(Protocol::Grpc)
        .with_metadata(metadata)
        .build()
        .map_err(|e| AppError::Internal(format!("Failed to build span exporter: {}", e)))?;

    let tracer_provider = SdkTracerProvider::builder()
        .with_sampler(Sampler::AlwaysOn)
        .with_id_generator(RandomIdGenerator::default())
        .with_resource(resource(environment))
        .with_batch_exporter(exporter)
        .build();

    Ok(tracer_provider)
}

pub struct OtelGuard {
    tracer_provider: SdkTracerProvider,
}

impl Drop for OtelGuard {
    fn drop(&mut self) {
        if let Err(err) = self.tracer_provider.shutdown() {
            eprintln!("Failed to shut down tracer provider: {:?}", err);
        }
    }
}

/// Installs the global subscriber. Spans are exported over OTLP only when an
/// endpoint is configured; otherwise logs go to stdout alone.
pub fn init_tracing(config: &AppConfig) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let (otel_layer, guard) = match config.otlp_endpoint.as_deref() {
        Some(endpoint) => match init_tracer_provider(
            endpoint,
            config.honeycomb_api_key.as_deref(),
            &config.deployment_environment,
        ) {
            Ok(provider) => {
                let tracer = provider.tracer(env!("CARGO_PKG_NAME"));
                (
                    Some(OpenTelemetryLayer::new(tracer)),
                    Some(OtelGuard {
                        tracer_provider: provider,
                    }),
                )
            }
            Err(e) => {
                eprintln!("Telemetry export disabled: {}", e);
                (None, None)
            }
        },
        None => (None, None),
    };

    let initialised = tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .with(otel_layer)
        .try_init()
        .is_ok();

    if initialised {
        if let Ok(mut slot) = TELEMETRY_GUARD.lock() {
            *slot = guard;
        }
    }
}

pub fn shutdown_telemetry() {
    let guard = match TELEMETRY_GUARD.lock() {
        Ok(mut slot) => slot.take(),
        Err(_) => None,
    };

    if guard.is_some() {
        println!("Shutting down telemetry...");
    }
    drop(guard);
}
