// ██████╗ ██╗███████╗██████╗ ██╗   ██╗████████╗███████╗
// ██╔══██╗██║██╔════╝██╔══██╗██║   ██║╚══██╔══╝██╔════╝
// ██║  ██║██║███████╗██████╔╝██║   ██║   ██║   █████╗
// ██║  ██║██║╚════██║██╔═══╝ ██║   ██║   ██║   ██╔══╝
// ██████╔╝██║███████║██║     ╚██████╔╝   ██║   ███████╗
// ╚═════╝ ╚═╝╚══════╝╚═╝      ╚═════╝    ╚═╝   ╚══════╝
//
// ██████╗  ██████╗  ██████╗ ███╗   ███╗
// ██╔══██╗██╔═══██╗██╔═══██╗████╗ ████║
// ██║  ██║██║   ██║██║   ██║██╔████╔██║
// ██║  ██║██║   ██║██║   ██║██║╚██╔╝██║
// ██████╔╝╚██████╔╝╚██████╔╝██║ ╚═╝ ██║
// ╚═════╝  ╚═════╝  ╚═════╝ ╚═╝     ╚═╝
//
// E N G I N E
//
// The most overkill FCRA compliance daemon ever conceived.
// Rust + Tokio + Crossbeam + Bloom Filters + SIMD + Statutory Dread
// All to notice that a credit bureau ignored a consumer for 31 days.

use std::sync::Arc;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{self, fmt, EnvFilter};

use chrono::Utc;
use dispute_doom_engine::analytics;
use dispute_doom_engine::config::Config;
use dispute_doom_engine::followup::StandardFollowUpBuilder;
use dispute_doom_engine::guard::EscalationGuard;
use dispute_doom_engine::models::EscalationEvent;
use dispute_doom_engine::publisher::RedisPublisher;
use dispute_doom_engine::repository::{DisputeRepository, MemoryRepository};
use dispute_doom_engine::scheduler::EscalationScheduler;
use dispute_doom_engine::state_machine::DisputeEngine;

fn print_banner() {
    let banner = r#"

    ╔══════════════════════════════════════════════════════════════════╗
    ║                                                                  ║
    ║   ██████╗ ██╗███████╗██████╗ ██╗   ██╗████████╗███████╗          ║
    ║   ██╔══██╗██║██╔════╝██╔══██╗██║   ██║╚══██╔══╝██╔════╝          ║
    ║   ██║  ██║██║███████╗██████╔╝██║   ██║   ██║   █████╗            ║
    ║   ██║  ██║██║╚════██║██╔═══╝ ██║   ██║   ██║   ██╔══╝            ║
    ║   ██████╔╝██║███████║██║     ╚██████╔╝   ██║   ███████╗          ║
    ║   ╚═════╝ ╚═╝╚══════╝╚═╝      ╚═════╝    ╚═╝   ╚══════╝          ║
    ║                                                                  ║
    ║           ██████╗  ██████╗  ██████╗ ███╗   ███╗                  ║
    ║           ██╔══██╗██╔═══██╗██╔═══██╗████╗ ████║                  ║
    ║           ██║  ██║██║   ██║██║   ██║██╔████╔██║                  ║
    ║           ██║  ██║██║   ██║██║   ██║██║╚██╔╝██║                  ║
    ║           ██████╔╝╚██████╔╝╚██████╔╝██║ ╚═╝ ██║                  ║
    ║           ╚═════╝  ╚═════╝  ╚═════╝ ╚═╝     ╚═╝                  ║
    ║                                                                  ║
    ║        ⚖️  STATUTORY DEADLINE ENFORCEMENT ENGINE ⚖️               ║
    ║                                                                  ║
    ║   Clocks:   FCRA §611 | FCRA §605 | FDCPA §809 | CFPB            ║
    ║   Guard:    Bloom Filter + LRU Cache Hybrid                      ║
    ║   Speed:    SIMD-Accelerated Aho-Corasick Letter Scanning        ║
    ║   Channels: Lock-Free Crossbeam                                  ║
    ║                                                                  ║
    ║   "The bureau gets 30 days. On day 31, we get to work."          ║
    ║                                                                  ║
    ╚══════════════════════════════════════════════════════════════════╝

    "#;
    println!("{}", banner);
}

#[tokio::main(flavor = "multi_thread", worker_threads = 8)]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(true)
        .init();

    print_banner();

    info!("⚖️ DISPUTE DOOM ENGINE initializing...");

    // Load configuration
    let config = Arc::new(Config::from_env());
    info!("✅ Configuration loaded: redis_url={}", config.redis_url);

    // Load the dispute corpus
    let repo = Arc::new(MemoryRepository::load_snapshot(&config.snapshot_path)?);
    info!("✅ Repository loaded: {} disputes on file", repo.len());

    // Lock-free crossbeam outbox for escalation events (capacity: 10,000)
    let (event_tx, event_rx) = crossbeam_channel::bounded::<EscalationEvent>(10_000);
    info!("✅ Lock-free outbox channel created (capacity: 10,000)");

    // Escalation guard: Bloom filter + LRU cache
    let guard = Arc::new(EscalationGuard::new(
        config.guard_expected_items,
        config.guard_false_positive_rate,
        config.guard_lru_size,
        config.guard_rotation_interval.as_secs(),
    ));
    info!("✅ Escalation guard online");

    // The state machine and the sweep that drives it
    let engine = DisputeEngine::new(repo.clone() as Arc<dyn DisputeRepository>, config.clone());
    let scheduler = EscalationScheduler::new(
        repo.clone() as Arc<dyn DisputeRepository>,
        engine,
        guard.clone(),
        Arc::new(StandardFollowUpBuilder),
        config.consumer.clone(),
        Some(event_tx),
    );
    info!("✅ Escalation scheduler armed");

    // Shutdown signal
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // ═══════════════════════════════════════════
    // SPAWN ESCALATION TICK LOOP
    // ═══════════════════════════════════════════
    let tick_repo = repo.clone();
    let tick_config = config.clone();
    let mut tick_shutdown = shutdown_rx.clone();
    let scheduler_handle = tokio::spawn(async move {
        info!("⏰ Escalation tick loop: ONLINE");
        let mut interval = tokio::time::interval(tick_config.tick_interval);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let escalated = scheduler.tick(Utc::now());
                    if !escalated.is_empty() {
                        if let Err(e) = tick_repo.save_snapshot(&tick_config.snapshot_path) {
                            error!(error = %e, "Failed to save repository snapshot after escalations");
                        }
                    }
                }
                _ = tick_shutdown.changed() => break,
            }
        }
        // Dropping the scheduler here drops the outbox sender, which is
        // how the publisher learns the party is over.
        info!("⏰ Escalation tick loop: OFFLINE");
    });

    // ═══════════════════════════════════════════
    // SPAWN REDIS PUBLISHER
    // ═══════════════════════════════════════════
    let pub_config = config.clone();
    let pub_shutdown = shutdown_rx.clone();
    let (publisher, _pub_stats) = RedisPublisher::new(pub_config, event_rx, pub_shutdown);
    let publisher_handle = tokio::spawn(async move {
        info!("📤 Redis Publisher: ONLINE");
        if let Err(e) = publisher.run().await {
            error!("📤 Redis Publisher error: {}", e);
        }
        info!("📤 Redis Publisher: OFFLINE");
    });

    // ═══════════════════════════════════════════
    // SPAWN ANALYTICS HTTP SERVER
    // ═══════════════════════════════════════════
    let analytics_repo = repo.clone() as Arc<dyn DisputeRepository>;
    let analytics_guard = guard.clone();
    let analytics_port = config.analytics_port;
    let mut analytics_shutdown = shutdown_rx.clone();
    let analytics_handle = tokio::spawn(async move {
        info!("📊 Analytics server starting on port {}...", analytics_port);
        analytics::run_analytics_server(
            analytics_repo,
            analytics_guard,
            analytics_port,
            &mut analytics_shutdown,
        )
        .await;
        info!("📊 Analytics server: OFFLINE");
    });

    info!("═══════════════════════════════════════════════════════");
    info!("  🟢 ALL SYSTEMS ONLINE - DISPUTE DOOM ENGINE ACTIVE");
    info!("  ⏰ Sweeping every {:?}", config.tick_interval);
    info!("  📤 Publishing to Redis at {}", config.redis_url);
    info!("  📊 Analytics at http://0.0.0.0:{}", config.analytics_port);
    info!("  ⚡ Press Ctrl+C for graceful shutdown");
    info!("═══════════════════════════════════════════════════════");

    // Wait for shutdown signal
    match signal::ctrl_c().await {
        Ok(()) => {
            warn!("🛑 Shutdown signal received!");
            let _ = shutdown_tx.send(true);
        }
        Err(err) => {
            error!("❌ Signal listener error: {}", err);
            let _ = shutdown_tx.send(true);
        }
    }

    info!("⏳ Waiting for tasks to complete (timeout: 10s)...");
    let _ = tokio::time::timeout(std::time::Duration::from_secs(10), async {
        let _ = tokio::join!(scheduler_handle, publisher_handle, analytics_handle);
    })
    .await;

    // One last snapshot so nothing escalated this session is forgotten.
    if let Err(e) = repo.save_snapshot(&config.snapshot_path) {
        error!(error = %e, "Failed to save final repository snapshot");
    } else {
        info!("💾 Final repository snapshot saved");
    }

    info!("💀 DISPUTE DOOM ENGINE: OFFLINE");
    Ok(())
}
