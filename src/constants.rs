//! Global Constants
//!
//! Centralized constants for configuration and tuning.
//! All magic numbers should be defined here with documentation.

/// Backend endpoint constants
pub mod backend {
    /// Default backend base URL
    pub const DEFAULT_BASE_URL: &str = "http://localhost:8001";

    /// Environment variable overriding the backend base URL
    pub const BASE_URL_ENV: &str = "SERVER_BASE_URL";

    /// WebSocket chat path
    pub const WS_CHAT_PATH: &str = "/ws/chat";

    /// Streaming HTTP chat path
    pub const HTTP_CHAT_PATH: &str = "/chat/completions/stream";

    pub const WIKI_CACHE_PATH: &str = "/api/wiki_cache";
    pub const PROCESSED_PROJECTS_PATH: &str = "/api/processed_projects";
    pub const EXPORT_PATH: &str = "/export/wiki";
    pub const MODELS_CONFIG_PATH: &str = "/models/config";
    pub const AUTH_STATUS_PATH: &str = "/auth/status";
    pub const AUTH_VALIDATE_PATH: &str = "/auth/validate";
    pub const LOCAL_STRUCTURE_PATH: &str = "/local_repo/structure";
}

/// Network timing constants
pub mod network {
    /// WebSocket open timeout for wiki structure and pages (seconds)
    pub const WS_CONNECT_TIMEOUT_SECS: u64 = 5;

    /// WebSocket open timeout for slide and workshop calls (seconds)
    pub const WS_SLIDE_CONNECT_TIMEOUT_SECS: u64 = 10;

    /// Whole-request timeout for host/backend JSON calls (seconds)
    pub const REQUEST_TIMEOUT_SECS: u64 = 60;

    /// User agent for host API calls
    pub const USER_AGENT: &str = concat!("deepwiki/", env!("CARGO_PKG_VERSION"));
}

/// Generation constants
pub mod generation {
    /// Maximum concurrent page generations
    pub const DEFAULT_CONCURRENCY: usize = 3;

    /// Placeholder shown while a page streams
    pub const LOADING_PLACEHOLDER: &str = "Loading...";

    /// Prefix for content recorded when a page fails
    pub const PAGE_ERROR_PREFIX: &str = "Error generating content: ";

    /// Content used in exports for pages that never generated
    pub const NOT_GENERATED: &str = "Content not generated";

    /// Branches probed on GitHub, in order
    pub const DEFAULT_BRANCHES: &[&str] = &["main", "master"];

    /// Page count guidance for the planner
    pub const COMPREHENSIVE_PAGES: &str = "8-12";
    pub const CONCISE_PAGES: &str = "4-6";
}

/// Wiki digest constants (context for slides and workshops)
pub mod digest {
    /// Maximum characters of wiki content sent as context
    pub const MAX_CHARS: usize = 30_000;

    /// Summary used when a page has no extractable first paragraph
    pub const NO_SUMMARY: &str = "No summary available";
}

/// Deep research constants
pub mod research {
    /// Maximum research iterations before a conclusion is forced
    pub const MAX_ITERATIONS: usize = 5;

    /// Prefix marking deep-research messages
    pub const TAG: &str = "[DEEP RESEARCH] ";
}

/// Host API constants
pub mod hosts {
    pub const GITHUB_API: &str = "https://api.github.com";
    pub const GITLAB_URL: &str = "https://gitlab.com";
    pub const BITBUCKET_API: &str = "https://api.bitbucket.org/2.0";

    /// Page size for paginated tree listings
    pub const PER_PAGE: u32 = 100;

    /// Upper bound on GitLab/Bitbucket tree pages followed
    pub const MAX_TREE_PAGES: u32 = 200;
}

/// Cache constants
pub mod cache {
    /// Key prefix shared with the browser UI's local storage
    pub const KEY_PREFIX: &str = "deepwiki_cache";

    /// Local cache directory name under the project data dir
    pub const DIR_NAME: &str = "cache";
}

/// Progress channel constants
pub mod progress {
    /// Broadcast channel capacity for run events
    pub const CHANNEL_CAPACITY: usize = 256;
}
