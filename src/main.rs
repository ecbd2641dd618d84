use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use axum_prometheus::PrometheusMetricLayer;
use chrono::{Duration, Utc};
use clap::{Args, Parser, Subcommand};
use cleanmatch::config::AppConfig;
use cleanmatch::engine::{
    AddOnId, Address, AvailabilityPolicy, CustomerId, Discount, MatchingConfig, MemoryDirectory,
    MemoryStore, OfferDispatcher, PriceBreakdown, PricingConfig, PricingEngine, PromoCode,
    Property, PropertyId, Provider, ProviderId, ProviderStatus, ServiceCatalog, ServiceTypeId,
    TracingNotifier,
};
use cleanmatch::error::AppError;
use cleanmatch::telemetry;
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
struct AppState {
    readiness: Arc<AtomicBool>,
    metrics: PrometheusHandle,
}

#[derive(Parser, Debug)]
#[command(
    name = "CleanMatch Fulfillment",
    about = "Run the booking fulfillment service or price a demo quote from the command line",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Price a quote against the standard demo catalog
    Quote(QuoteArgs),
}

#[derive(Args, Debug, Default)]
struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    port: Option<u16>,
    /// Seed the in-memory store with demo properties, providers, and a
    /// promo code
    #[arg(long)]
    seed_demo: bool,
}

#[derive(Args, Debug)]
struct QuoteArgs {
    /// Property square footage
    #[arg(long)]
    sqft: u32,
    /// Property city, used for the metro multiplier lookup
    #[arg(long, default_value = "Des Moines")]
    city: String,
    /// Service type id from the standard catalog
    #[arg(long, default_value = "standard")]
    service: String,
    /// Add-on ids from the standard catalog (repeatable)
    #[arg(long = "add-on")]
    add_ons: Vec<String>,
    /// Apply the pet surcharge
    #[arg(long)]
    pets: bool,
}

#[tokio::main]
async fn main() {
    if let Err(err) = run_cli().await {
        eprintln!("application error: {err}");
        std::process::exit(1);
    }
}

async fn run_cli() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => run_server(args).await,
        Command::Quote(args) => run_quote(args),
    }
}

async fn run_server(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let state = AppState {
        readiness: readiness_flag.clone(),
        metrics: prometheus_handle,
    };

    let store = Arc::new(MemoryStore::new());
    let directory = Arc::new(MemoryDirectory::new());
    if args.seed_demo {
        seed_demo(&store, &directory)?;
        info!("demo data seeded");
    }

    let mut pricing_config = PricingConfig::standard();
    pricing_config.tax_rate_bps = config.engine.tax_rate_bps;
    pricing_config.pet_surcharge_cents = config.engine.pet_surcharge_cents;

    let dispatcher = Arc::new(OfferDispatcher::new(
        store,
        directory,
        Arc::new(TracingNotifier),
        PricingEngine::new(ServiceCatalog::standard(), pricing_config),
        MatchingConfig::default(),
        AvailabilityPolicy::new(config.engine.availability_horizon_days),
        config.engine.offer_expiry_minutes,
    ));

    let app = Router::new()
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
        .with_state(state)
        .merge(cleanmatch::engine::fulfillment_router(dispatcher))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "booking fulfillment service ready");

    axum::serve(listener, app).await?;
    Ok(())
}

fn run_quote(args: QuoteArgs) -> Result<(), AppError> {
    let engine = PricingEngine::new(ServiceCatalog::standard(), PricingConfig::standard());
    let property = demo_property(args.sqft, &args.city, args.pets);
    let service_type_id = ServiceTypeId(args.service.clone());
    let add_on_ids: Vec<AddOnId> = args.add_ons.iter().cloned().map(AddOnId).collect();

    let breakdown = engine.quote(&property, &service_type_id, &add_on_ids, None, Utc::now())?;
    render_quote(&args, &breakdown);

    Ok(())
}

fn demo_property(square_feet: u32, city: &str, has_pets: bool) -> Property {
    Property {
        id: PropertyId("demo-property".to_string()),
        owner_id: CustomerId("demo-customer".to_string()),
        square_feet,
        bedrooms: 3,
        bathrooms: 2,
        has_pets,
        address: Address {
            street: "123 Demo St".to_string(),
            city: city.to_string(),
            state: "IA".to_string(),
            zip: "50309".to_string(),
            lat: 41.5868,
            lng: -93.6250,
        },
    }
}

fn render_quote(args: &QuoteArgs, breakdown: &PriceBreakdown) {
    println!("Quote demo");
    println!(
        "{} sqft '{}' clean in {}{}",
        args.sqft,
        args.service,
        args.city,
        if args.pets { " (with pets)" } else { "" }
    );

    println!(
        "\nBase: {} (metro multiplier {:.2})",
        dollars(breakdown.base_cents),
        breakdown.metro_multiplier
    );
    if breakdown.pet_surcharge_cents > 0 {
        println!("  includes pet surcharge {}", dollars(breakdown.pet_surcharge_cents));
    }
    for line in &breakdown.add_ons {
        println!("Add-on {}: {}", line.add_on_id.0, dollars(line.amount_cents));
    }
    println!("Subtotal: {}", dollars(breakdown.subtotal_cents));
    println!("Tax: {}", dollars(breakdown.tax_cents));
    println!("Total: {}", dollars(breakdown.total_cents));
}

fn dollars(cents: u32) -> String {
    format!("${}.{:02}", cents / 100, cents % 100)
}

/// Populate the in-memory directory and store so the served API has
/// something to match against out of the box.
fn seed_demo(store: &MemoryStore, directory: &MemoryDirectory) -> Result<(), AppError> {
    use cleanmatch::engine::FulfillmentStore;

    directory.upsert_property(demo_property(2_000, "Des Moines", false))?;

    let base = [
        ("cleaner-ann", 41.60, -93.61, 15.0, 4.9),
        ("cleaner-bo", 41.55, -93.70, 20.0, 4.4),
        ("cleaner-cay", 41.70, -93.50, 10.0, 4.7),
    ];
    for (id, lat, lng, radius, rating) in base {
        directory.upsert_provider(Provider {
            id: ProviderId(id.to_string()),
            user_id: format!("user-{id}"),
            status: ProviderStatus::Active,
            base_lat: lat,
            base_lng: lng,
            service_radius_miles: radius,
            service_type_ids: vec![
                ServiceTypeId("standard".to_string()),
                ServiceTypeId("deep".to_string()),
            ],
            rating,
        })?;
    }

    store.upsert_promo(PromoCode {
        code: "WELCOME10".to_string(),
        discount: Discount::Percentage(10),
        minimum_order_cents: 10_000,
        expires_at: Utc::now() + Duration::days(90),
        max_uses: 500,
        used: 0,
    })?;

    Ok(())
}

async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn readiness_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

async fn metrics_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dollars_formats_cents() {
        assert_eq!(dollars(21_600), "$216.00");
        assert_eq!(dollars(5), "$0.05");
        assert_eq!(dollars(1_230), "$12.30");
    }

    #[test]
    fn quote_command_matches_worked_example() {
        let engine = PricingEngine::new(ServiceCatalog::standard(), PricingConfig::standard());
        let property = demo_property(2_000, "Des Moines", false);

        let breakdown = engine
            .quote(
                &property,
                &ServiceTypeId("standard".to_string()),
                &[],
                None,
                Utc::now(),
            )
            .expect("demo quote prices");

        assert_eq!(breakdown.base_cents, 20_000);
        assert_eq!(breakdown.tax_cents, 1_600);
        assert_eq!(breakdown.total_cents, 21_600);
    }
}
