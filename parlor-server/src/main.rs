use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use parlor_server::config::Config;
use parlor_server::current_room::InMemoryCurrentRooms;
use parlor_server::http::{self, AppState};
use parlor_server::minis::StaticMinis;
use parlor_server::notifications::{NoFollowers, RoomJoinNotificationHandler};
use parlor_server::query::RoomQuery;
use parlor_server::room::{
    Auth, ChannelBus, ElectionPolicy, FirstSeen, LowestId, Repository, ServiceHooks,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = Config::parse();
    info!("rooms server starting on {}", config.listen);

    let repository = Arc::new(Repository::new());
    let auth = Arc::new(Auth::new(Arc::clone(&repository)));
    let query = RoomQuery::new(Arc::clone(&repository));

    let current_rooms = Arc::new(InMemoryCurrentRooms::new());
    let (bus, mut facts) = ChannelBus::new();
    let hooks = Arc::new(ServiceHooks::new(current_rooms, bus.clone()));

    let election: Arc<dyn ElectionPolicy> = if config.deterministic_election {
        Arc::new(LowestId)
    } else {
        Arc::new(FirstSeen)
    };

    // Drain bus facts into the notification-relevance adapter.
    let notifier = RoomJoinNotificationHandler::new(query, Arc::new(NoFollowers));
    tokio::spawn(async move {
        while let Some(fact) = facts.recv().await {
            match notifier.build(&fact).await {
                Ok(push) => match notifier.targets(&fact).await {
                    Ok(targets) => {
                        info!("push {:?} for {} target(s)", push.alert.key, targets.len())
                    }
                    Err(e) => warn!("target lookup failed: {}", e),
                },
                Err(e) => info!("fact skipped: {}", e),
            }
        }
    });

    let state = AppState {
        repository,
        auth,
        minis: Arc::new(StaticMinis::default()),
        hooks,
        bus,
        election,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = http::router(state).layer(cors);

    let listener = tokio::net::TcpListener::bind(config.listen)
        .await
        .context("failed to bind listen address")?;

    axum::serve(listener, app).await.context("server exited")?;

    Ok(())
}
