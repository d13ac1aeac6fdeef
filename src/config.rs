use std::env;
use std::sync::OnceLock;

static CONFIG: OnceLock<Config> = OnceLock::new();

// --- CONFIG AGGREGATOR ---

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub inspector: InspectorConfig,
    pub cluster: ClusterConfig,
}

impl Config {
    pub fn global() -> &'static Config {
        CONFIG.get_or_init(Self::load)
    }

    fn load() -> Self {
        dotenv::dotenv().ok();
        Self {
            server: ServerConfig::load(),
            inspector: InspectorConfig::load(),
            cluster: ClusterConfig::load(),
        }
    }
}

// --- MODULES ---

// SERVER
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub log_level: String,
}

impl ServerConfig {
    fn load() -> Self {
        Self {
            host:      get_env("SERVER_HOST", "127.0.0.1"),
            port:      get_env("SERVER_PORT", "8080"),
            log_level: get_env("TOPICLENS_LOG", "info"),
        }
    }
}

// INSPECTOR (historical fetch + live tail)
#[derive(Debug, Clone)]
pub struct InspectorConfig {
    pub live_buffer_capacity: usize,
    pub default_fetch_count: usize,
    pub max_fetch_count: usize,
}

impl InspectorConfig {
    fn load() -> Self {
        Self {
            live_buffer_capacity: get_env("LIVE_BUFFER_CAPACITY", "100"),
            default_fetch_count:  get_env("FETCH_DEFAULT_COUNT", "10"),
            max_fetch_count:      get_env("FETCH_MAX_COUNT", "500"),
        }
    }
}

impl Default for InspectorConfig {
    fn default() -> Self {
        Self {
            live_buffer_capacity: 100,
            default_fetch_count: 10,
            max_fetch_count: 500,
        }
    }
}

// CLUSTER (bundled in-memory log store)
#[derive(Debug, Clone)]
pub struct ClusterConfig {
    pub default_partitions: u32,
    pub max_partitions: u32,
    pub max_scan_floor: usize,
    pub scan_multiplier: usize,
    pub live_batch_limit: usize,
    pub live_poll_interval_ms: u64,
    pub live_channel_capacity: usize,
}

impl ClusterConfig {
    fn load() -> Self {
        Self {
            default_partitions: get_env("CLUSTER_PARTITIONS", "3"),
            max_partitions:     get_env("CLUSTER_MAX_PARTITIONS", "128"),
            max_scan_floor:     get_env("CLUSTER_MAX_SCAN_FLOOR", "1000"),
            scan_multiplier:    get_env("CLUSTER_SCAN_MULTIPLIER", "100"),
            live_batch_limit:   get_env("CLUSTER_LIVE_BATCH_LIMIT", "500"),
            live_poll_interval_ms: get_env("CLUSTER_LIVE_POLL_MS", "1000"),
            live_channel_capacity: get_env("CLUSTER_LIVE_CHAN_CAP", "256"),
        }
    }
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            default_partitions: 3,
            max_partitions: 128,
            max_scan_floor: 1000,
            scan_multiplier: 100,
            live_batch_limit: 500,
            live_poll_interval_ms: 1000,
            live_channel_capacity: 256,
        }
    }
}

// --- PRIVATE HELPER ---

fn get_env<T: std::str::FromStr>(key: &str, default: &str) -> T {
    let raw = env::var(key).unwrap_or_else(|_| default.to_string());
    match raw.parse() {
        Ok(value) => value,
        Err(_) => panic!("Config error: {} must be valid (got '{}')", key, raw),
    }
}
