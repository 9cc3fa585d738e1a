use coin_stream_api::api::AppState;
use coin_stream_api::fanout::{ConnectionRegistry, PushEngine};
use coin_stream_api::muxer::{PriceChannelWorker, StreamMultiplexer, TradeStreamWorker};
use coin_stream_api::notify::IngestNotifier;
use coin_stream_api::pipeline::{DailyStatBuilder, FrameRouter, WindowAggregator};
use coin_stream_api::profiles::{InMemoryProfileStore, ProfileStore};
use coin_stream_api::sink::{LoggingStatSink, StatForwarder, StatSink};
use coin_stream_api::sources::{BinanceTickSource, TickSource};
use coin_stream_api::transport::{InMemoryPriceBus, PriceBus, SnapshotPublisher};
use coin_stream_api::{create_router, AppConfig, ShutdownCoordinator};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // Load environment variables from .env file (if present)
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "coin_stream_api=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env();
    let coordinator = ShutdownCoordinator::new();
    let tracker = coordinator.tracker().clone();

    // Pipeline channels, all bounded
    let (raw_tx, raw_rx) = mpsc::channel(config.raw_queue_size);
    let (trade_tx, trade_rx) = mpsc::channel(config.trade_queue_size);
    let (ticker_tx, ticker_rx) = mpsc::channel(config.ticker_queue_size);
    let (snapshot_tx, snapshot_rx) = mpsc::channel(config.snapshot_queue_size);
    let (stat_tx, stat_rx) = mpsc::channel(config.stat_queue_size);
    let (update_tx, update_rx) = mpsc::channel(config.update_queue_size);

    // Pub/sub transport; single-binary wiring uses the in-process bus
    let bus: Arc<dyn PriceBus> = Arc::new(InMemoryPriceBus::new(config.bus_channel_capacity));

    // Ingest side: exchange feed streams on demand
    let source: Arc<dyn TickSource> = Arc::new(BinanceTickSource::new(config.feed_ws_url.clone()));
    let ingest = StreamMultiplexer::new(
        "ingest",
        TradeStreamWorker::new(Arc::clone(&source), raw_tx.clone()),
        coordinator.child_token(),
        tracker.clone(),
    );

    // All-market overview stream feeds the same raw channel
    {
        let source = Arc::clone(&source);
        let raw_tx = raw_tx.clone();
        let cancel = coordinator.child_token();
        tracker.spawn(async move {
            if let Err(e) = source.stream_mini_tickers(cancel, raw_tx).await {
                tracing::error!(error = %e, "mini-ticker overview stream ended with error");
            }
        });
    }

    // Aggregation pipeline stages
    tracker.spawn(
        FrameRouter::new(raw_rx, trade_tx, ticker_tx, coordinator.child_token()).run(),
    );
    tracker.spawn(
        WindowAggregator::new(
            trade_rx,
            snapshot_tx,
            config.sample_window,
            coordinator.child_token(),
        )
        .run(),
    );
    tracker.spawn(DailyStatBuilder::new(ticker_rx, stat_tx, coordinator.child_token()).run());

    // Sampled snapshots go to the pub/sub bus; daily stats to the persisted
    // queue boundary
    tracker.spawn(
        SnapshotPublisher::new(snapshot_rx, Arc::clone(&bus), coordinator.child_token()).run(),
    );
    let sink: Arc<dyn StatSink> = Arc::new(LoggingStatSink);
    tracker.spawn(StatForwarder::new(stat_rx, sink, coordinator.child_token()).run());

    // Fan-out side: pub/sub channel streams on demand, pushed to clients
    let fanout = StreamMultiplexer::new(
        "fanout",
        PriceChannelWorker::new(Arc::clone(&bus), update_tx),
        coordinator.child_token(),
        tracker.clone(),
    );
    let notifier = Arc::new(IngestNotifier::new(
        config.ingest_notify_url.clone(),
        config.notify_timeout,
    ));
    let registry = Arc::new(ConnectionRegistry::new(fanout.clone(), notifier));
    tracker.spawn(
        PushEngine::new(
            update_rx,
            fanout,
            Arc::clone(&registry),
            coordinator.child_token(),
        )
        .run(),
    );

    // Profile boundary (in-memory for the single-binary deployment)
    let profiles = Arc::new(InMemoryProfileStore::new());
    if let Some(user_id) = profiles.seed_from_env() {
        tracing::info!(%user_id, "demo profile available on /ws");
    }
    let profiles: Arc<dyn ProfileStore> = profiles;

    let state = Arc::new(AppState {
        ingest,
        registry,
        profiles,
        config: config.clone(),
        shutdown: coordinator.child_token(),
        tracker: tracker.clone(),
    });
    let app = create_router(state);

    let listener = match tokio::net::TcpListener::bind(&config.server_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(addr = %config.server_addr, error = %e, "failed to bind listener");
            std::process::exit(1);
        }
    };

    tracing::info!("🚀 Coin Stream API running on http://{}", config.server_addr);
    tracing::info!("📚 Swagger UI: http://{}/swagger-ui", config.server_addr);
    tracing::info!("🔌 Portfolio stream: ws://{}/ws?user_id=<uuid>", config.server_addr);
    tracing::info!(
        "📡 Subscriptions: GET/DELETE http://{}/coin?symbol=btcusdt&id=<subscriber>",
        config.server_addr
    );

    // Serve until the shutdown signal; stop accepting, then let in-flight
    // requests finish within the grace period
    let shutdown_signal = coordinator.child_token();
    let server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown_signal.cancelled().await })
            .await
    });

    coordinator.wait_for_interrupt().await;
    coordinator.trigger();

    match tokio::time::timeout(config.server_grace, server).await {
        Ok(Ok(Ok(()))) => tracing::info!("✅ HTTP server stopped gracefully"),
        Ok(Ok(Err(e))) => tracing::error!(error = %e, "HTTP server error"),
        Ok(Err(e)) => tracing::error!(error = %e, "HTTP server task panicked"),
        Err(_) => tracing::warn!("HTTP server did not stop within the grace period"),
    }

    coordinator.drain(config.drain_timeout).await;
    tracing::info!("🏁 shutdown complete");
}
