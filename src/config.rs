use std::env;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Mongo,
    Memory,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub storage: StorageBackend,
    pub mongodb_uri: String,
    pub mongodb_db: String,
    pub host: String,
    pub port: u16,
}

impl Settings {
    /// In-memory settings, handy for tests and local poking around.
    pub fn memory() -> Self {
        Self {
            storage: StorageBackend::Memory,
            mongodb_uri: String::new(),
            mongodb_db: String::new(),
            host: "127.0.0.1".to_string(),
            port: 0,
        }
    }
}

fn parse_storage(raw: &str) -> StorageBackend {
    match raw.trim().to_ascii_lowercase().as_str() {
        "memory" | "mem" => StorageBackend::Memory,
        _ => StorageBackend::Mongo,
    }
}

pub fn load() -> Settings {
    // Loads .env if present (no crash if missing)
    dotenvy::dotenv().ok();

    let storage = env::var("STORAGE")
        .map(|s| parse_storage(&s))
        .unwrap_or(StorageBackend::Mongo);

    let mongodb_uri = env::var("MONGODB_URI")
        .unwrap_or_else(|_| "mongodb://localhost:27017".to_string());

    let mongodb_db = env::var("MONGODB_DB")
        .unwrap_or_else(|_| "rustalerts".to_string());

    let host = env::var("HOST")
        .unwrap_or_else(|_| "127.0.0.1".to_string());

    let port = env::var("PORT")
        .ok()
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(3000);

    Settings {
        storage,
        mongodb_uri,
        mongodb_db,
        host,
        port,
    }
}
