use skybook_api::{
    app,
    metrics::Metrics,
    state::{AppState, AuthConfig, RateRules},
};
use skybook_booking::intake::OrderIntake;
use skybook_booking::issue::TicketIssuer;
use skybook_booking::rate_limit::RateLimiter;
use skybook_booking::reconcile::ReconciliationSync;
use skybook_booking::reference::ReferenceGenerator;
use skybook_booking::repository::BookingStore;
use skybook_booking::tokenize::TokenizationGate;
use skybook_booking::vault::CardVault;
use skybook_core::notify::Notifier;
use skybook_core::provider::ProviderApi;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "skybook_api=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = skybook_store::app_config::Config::load().expect("Failed to load config");
    tracing::info!("Starting Skybook API on port {}", config.server.port);

    // Database
    let db = skybook_store::DbClient::new(&config.database.url, config.database.max_connections)
        .await
        .expect("Failed to connect to Postgres");
    db.migrate().await.expect("Failed to run migrations");
    let store: Arc<dyn BookingStore> = Arc::new(skybook_store::PgBookingStore::new(db.pool.clone()));

    // Kafka notification producer
    let notifier: Arc<dyn Notifier> = Arc::new(
        skybook_store::EventProducer::new(&config.kafka.brokers)
            .expect("Failed to create Kafka producer"),
    );

    // Provider client
    let provider: Arc<dyn ProviderApi> = Arc::new(
        skybook_store::DuffelClient::new(&config.duffel.base_url, &config.duffel.api_token)
            .expect("Failed to build provider client"),
    );

    let vault = CardVault::new(&config.vault.key).expect("Invalid vault key");
    let references = ReferenceGenerator::new(&config.business_rules.reference_prefix);

    let intake = Arc::new(OrderIntake::new(
        provider.clone(),
        store.clone(),
        notifier,
        vault.clone(),
        references,
    ));
    let gate = Arc::new(TokenizationGate::new(
        provider.clone(),
        store.clone(),
        vault.clone(),
        Duration::from_secs(config.duffel.tokenize_timeout_secs),
    ));
    let issuer = Arc::new(TicketIssuer::new(provider.clone(), store.clone(), vault));
    let reconciler = Arc::new(ReconciliationSync::new(
        provider,
        store.clone(),
        config.business_rules.reconcile_fan_out,
    ));

    let app_state = AppState {
        store,
        intake,
        gate,
        issuer,
        reconciler,
        limiter: Arc::new(RateLimiter::with_default_window()),
        auth: AuthConfig {
            secret: config.auth.jwt_secret.clone(),
            expiration: config.auth.jwt_expiration_seconds,
        },
        rules: RateRules {
            booking_per_minute: config.business_rules.booking_requests_per_minute,
            payment_per_minute: config.business_rules.payment_requests_per_minute,
        },
        metrics: Arc::new(Metrics::new()),
    };

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .unwrap();
}
