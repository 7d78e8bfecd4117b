pub const DEFAULT_NAMESPACE: &str = "graph";
pub const DEFAULT_SCAN_PAGE_SIZE: u32 = 128;
pub const DEFAULT_MAX_DEPTH: usize = 32;

const PD_ENDPOINTS_ENV: &str = "KV_GRAPH_PD_ENDPOINTS";
const NAMESPACE_ENV: &str = "KV_GRAPH_NAMESPACE";

#[derive(Clone, Debug)]
pub struct Config {
    /// TiKV placement driver endpoints.
    pub pd_endpoints: Vec<String>,
    /// Leading key element of every record written by this store.
    pub namespace: String,
    pub scan_page_size: u32,
    /// Bound on nested writes and nested projections.
    pub max_depth: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pd_endpoints: vec!["127.0.0.1:2379".to_string()],
            namespace: DEFAULT_NAMESPACE.to_string(),
            scan_page_size: DEFAULT_SCAN_PAGE_SIZE,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl Config {
    /// Defaults overridden by `KV_GRAPH_PD_ENDPOINTS` (comma separated) and
    /// `KV_GRAPH_NAMESPACE`.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(endpoints) = std::env::var(PD_ENDPOINTS_ENV) {
            let endpoints = parse_endpoints(&endpoints);
            if !endpoints.is_empty() {
                config.pd_endpoints = endpoints;
            }
        }
        if let Ok(namespace) = std::env::var(NAMESPACE_ENV) {
            if !namespace.is_empty() {
                config.namespace = namespace;
            }
        }
        config
    }

    pub fn with_pd_endpoints(mut self, endpoints: Vec<String>) -> Self {
        self.pd_endpoints = endpoints;
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn with_scan_page_size(mut self, size: u32) -> Self {
        self.scan_page_size = size.max(1);
        self
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }
}

fn parse_endpoints(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
