use std::{net::SocketAddr, sync::Arc};

use mongodb::Client;

use rustalerts::{
    config::{self, StorageBackend},
    routes,
    services::{db_init, MemoryStore, MongoStore, PersistenceGateway},
    AppState,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let settings = config::load();

    let gateway: Arc<dyn PersistenceGateway> = match settings.storage {
        StorageBackend::Mongo => {
            let client = Client::with_uri_str(&settings.mongodb_uri).await?;
            let db = client.database(&settings.mongodb_db);
            db_init::ensure_indexes(&db).await?;
            Arc::new(MongoStore::new(db))
        }
        StorageBackend::Memory => {
            tracing::warn!("STORAGE=memory: subscriptions will not survive a restart");
            Arc::new(MemoryStore::new())
        }
    };

    let state = AppState::bootstrap(settings.clone(), gateway).await?;
    state.requests.verify().await?;

    let app = routes::app(state);

    let addr = SocketAddr::from((settings.host.parse::<std::net::IpAddr>()?, settings.port));
    tracing::info!("listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
