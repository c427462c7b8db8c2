//! Generation Orchestrator
//!
//! Drives one wiki run end to end:
//!
//! ```text
//! Idle → FetchingRepoMeta → PlanningStructure → GeneratingPages → Complete
//!              └──────────────────┴──────────────────┴──→ Error
//! ```
//!
//! A run is described by a [`GenerationRun`] context. The context owns the
//! run's page store and its "in progress" flag, so two runs never share
//! state and a second invocation of the same run is rejected.

use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::broadcast;
use tracing::{debug, info, instrument, warn};

use super::cache::LocalCache;
use super::prompts;
use super::store::PageStore;
use crate::backend::{BackendClient, CacheQuery, CachedWiki};
use crate::config::{Config, ConfigLoader, GenerationConfig};
use crate::constants::progress::CHANNEL_CAPACITY;
use crate::extract::{clean_markdown_fence, extract_structure};
use crate::host::{HostFactory, RepoHost};
use crate::queue::{BoundedTaskQueue, QueueProgress};
use crate::transport::{
    ChatRequest, EndpointConfig, SharedTransport, TimeoutConfig, TransportFactory,
    collect_stream_with_restart, fetch_text,
};
use crate::types::{
    GeneratedPage, Language, PageMap, PagePlan, PageStatus, RepositorySpec, Result, RunId,
    StructurePlan, WikiError,
};

// =============================================================================
// Run State
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunPhase {
    #[default]
    Idle,
    FetchingRepoMeta,
    PlanningStructure,
    GeneratingPages,
    Complete,
    Error,
}

impl std::fmt::Display for RunPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::FetchingRepoMeta => write!(f, "fetching repository"),
            Self::PlanningStructure => write!(f, "planning structure"),
            Self::GeneratingPages => write!(f, "generating pages"),
            Self::Complete => write!(f, "complete"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Progress notifications broadcast while a run executes
#[derive(Debug, Clone)]
pub enum RunEvent {
    Phase(RunPhase),
    CacheHit {
        pages: usize,
    },
    StructureReady {
        title: String,
        pages: usize,
    },
    PageStarted {
        id: String,
        title: String,
    },
    PageChunk {
        id: String,
        chunk: String,
    },
    PageFinished {
        id: String,
        ok: bool,
        completed: usize,
        total: usize,
    },
    Complete {
        from_cache: bool,
        failed: usize,
    },
    Failed {
        message: String,
    },
}

/// Context for one generation run
#[derive(Debug)]
pub struct GenerationRun {
    id: RunId,
    repo: RepositorySpec,
    language: Language,
    comprehensive: bool,
    force: bool,
    active: AtomicBool,
    phase: RwLock<RunPhase>,
    structure: RwLock<Option<StructurePlan>>,
    store: PageStore,
}

impl GenerationRun {
    pub fn new(repo: RepositorySpec, language: Language, comprehensive: bool) -> Self {
        Self {
            id: RunId::generate(),
            repo,
            language,
            comprehensive,
            force: false,
            active: AtomicBool::new(false),
            phase: RwLock::new(RunPhase::Idle),
            structure: RwLock::new(None),
            store: PageStore::new(),
        }
    }

    /// Skip the cache probe and delete the cached entry first
    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn id(&self) -> &RunId {
        &self.id
    }

    pub fn repo(&self) -> &RepositorySpec {
        &self.repo
    }

    pub fn language(&self) -> &Language {
        &self.language
    }

    pub fn phase(&self) -> RunPhase {
        *self.phase.read().unwrap_or_else(|p| p.into_inner())
    }

    pub fn store(&self) -> &PageStore {
        &self.store
    }

    pub fn structure(&self) -> Option<StructurePlan> {
        self.structure
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    fn set_phase(&self, phase: RunPhase) {
        *self.phase.write().unwrap_or_else(|p| p.into_inner()) = phase;
    }

    fn set_structure(&self, structure: StructurePlan) {
        *self.structure.write().unwrap_or_else(|p| p.into_inner()) = Some(structure);
    }

    fn cache_query(&self) -> CacheQuery {
        CacheQuery::new(&self.repo, &self.language, self.comprehensive)
    }

    /// Mark the run active, failing if it already is
    fn claim(&self) -> Result<ActiveRun<'_>> {
        self.active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| WikiError::RunInProgress(self.repo.key()))?;
        Ok(ActiveRun { flag: &self.active })
    }
}

/// Clears the run's active flag on drop
struct ActiveRun<'a> {
    flag: &'a AtomicBool,
}

impl Drop for ActiveRun<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Outcome of a finished run
#[derive(Debug, Clone)]
pub struct WikiRunReport {
    pub run_id: RunId,
    pub repo: RepositorySpec,
    pub language: Language,
    pub comprehensive: bool,
    pub structure: StructurePlan,
    pub pages: PageMap,
    pub from_cache: bool,
    pub failed: Vec<String>,
    pub completed: usize,
    pub total: usize,
    pub cache_saved: bool,
}

impl WikiRunReport {
    /// Fraction of pages settled, 1.0 for an empty plan
    pub fn progress(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.completed as f64 / self.total as f64
        }
    }

    /// Pages in plan order
    pub fn ordered_pages(&self) -> impl Iterator<Item = &GeneratedPage> {
        self.structure
            .pages
            .iter()
            .filter_map(|plan| self.pages.get(&plan.id))
    }
}

// =============================================================================
// Generator
// =============================================================================

pub struct WikiGenerator {
    generation: GenerationConfig,
    transport: SharedTransport,
    host: Box<dyn RepoHost>,
    backend: Option<BackendClient>,
    local_cache: Option<LocalCache>,
    events: broadcast::Sender<RunEvent>,
}

impl WikiGenerator {
    pub fn new(
        generation: GenerationConfig,
        transport: SharedTransport,
        host: Box<dyn RepoHost>,
    ) -> Self {
        let (events, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            generation,
            transport,
            host,
            backend: None,
            local_cache: None,
            events,
        }
    }

    /// Generator wired to the configured backend, host and local cache
    pub fn from_config(config: &Config, repo: &RepositorySpec) -> Result<Self> {
        let timeouts = TimeoutConfig::from(&config.backend);
        let endpoint = EndpointConfig::from_backend(&config.backend, timeouts.connect);
        let transport = TransportFactory::build(
            &endpoint,
            TransportFactory::streaming_client(timeouts.connect)?,
        );
        let host = HostFactory::build(repo.host_type, config, HostFactory::client(config)?)?;

        let mut generator = Self::new(config.generation.clone(), transport, host)
            .with_backend(BackendClient::from_config(&config.backend)?);
        if config.cache.enabled {
            generator = generator.with_local_cache(LocalCache::new(ConfigLoader::cache_dir(config)));
        }
        Ok(generator)
    }

    pub fn with_backend(mut self, backend: BackendClient) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn with_local_cache(mut self, cache: LocalCache) -> Self {
        self.local_cache = Some(cache);
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RunEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: RunEvent) {
        let _ = self.events.send(event);
    }

    fn enter(&self, run: &GenerationRun, phase: RunPhase) {
        debug!("[{}] phase: {}", run.id.short(), phase);
        run.set_phase(phase);
        self.emit(RunEvent::Phase(phase));
    }

    /// Execute a run to completion.
    ///
    /// Returns `RunInProgress` without side effects when the same run is
    /// already executing.
    #[instrument(skip_all, fields(run = %run.id.short(), repo = %run.repo.key()))]
    pub async fn run(&self, run: &GenerationRun) -> Result<WikiRunReport> {
        let _active = run.claim()?;
        info!(
            "Generating {} wiki ({})",
            if run.comprehensive { "comprehensive" } else { "concise" },
            run.language
        );

        if run.force {
            self.invalidate_cache(run).await;
        } else if let Some(report) = self.probe_cache(run).await {
            return Ok(report);
        }

        match self.generate(run).await {
            Ok(report) => Ok(report),
            Err(err) => {
                warn!("Run failed: {}", err);
                self.enter(run, RunPhase::Error);
                self.emit(RunEvent::Failed {
                    message: err.to_string(),
                });
                Err(err)
            }
        }
    }

    async fn generate(&self, run: &GenerationRun) -> Result<WikiRunReport> {
        self.enter(run, RunPhase::FetchingRepoMeta);
        let snapshot = self.host.fetch(&run.repo).await?;
        debug!("Repository has {} files", snapshot.file_count());

        self.enter(run, RunPhase::PlanningStructure);
        let prompt =
            prompts::structure_prompt(&run.repo, &snapshot, &run.language, run.comprehensive);
        let request = ChatRequest::new(&run.repo, prompt).with_generation(&self.generation, &run.language);
        let text = fetch_text(self.transport.as_ref(), &request).await?;
        let structure = extract_structure(&text, run.comprehensive)?;
        info!(
            "Planned \"{}\" with {} pages",
            structure.title,
            structure.pages.len()
        );

        run.store.load_plan(&structure);
        run.set_structure(structure.clone());
        self.emit(RunEvent::StructureReady {
            title: structure.title.clone(),
            pages: structure.pages.len(),
        });

        self.enter(run, RunPhase::GeneratingPages);
        let ids = structure.pages.iter().map(|p| p.id.clone()).collect();
        let queue = BoundedTaskQueue::new(self.generation.concurrency);
        let state = queue
            .run(
                ids,
                |id| {
                    let plan = structure.page(&id).cloned();
                    async move {
                        match plan {
                            Some(plan) => self.generate_page(run, &plan).await,
                            None => false,
                        }
                    }
                },
                |progress| {
                    if let QueueProgress::Settled { id, ok, state } = progress {
                        self.emit(RunEvent::PageFinished {
                            id: id.to_string(),
                            ok,
                            completed: state.completed().len(),
                            total: state.total(),
                        });
                    }
                },
            )
            .await;

        self.enter(run, RunPhase::Complete);
        let failed = run.store.failed_ids();
        let cache_saved = if run.store.all_clean() {
            self.save_caches(run, &structure).await
        } else {
            info!("Skipping cache save: {} pages failed", failed.len());
            false
        };

        self.emit(RunEvent::Complete {
            from_cache: false,
            failed: failed.len(),
        });
        info!(
            "Run complete: {}/{} pages, {} failed",
            state.completed().len(),
            state.total(),
            failed.len()
        );

        Ok(WikiRunReport {
            run_id: run.id.clone(),
            repo: run.repo.clone(),
            language: run.language.clone(),
            comprehensive: run.comprehensive,
            structure,
            pages: run.store.snapshot(),
            from_cache: false,
            failed,
            completed: state.completed().len(),
            total: state.total(),
            cache_saved,
        })
    }

    /// Generate one page into the run's store.
    ///
    /// Pages that already have content, or that another task is generating,
    /// are skipped. Failures are recorded on the page and never propagate.
    pub async fn generate_page(&self, run: &GenerationRun, page: &PagePlan) -> bool {
        if run.store.has_content(&page.id) {
            debug!("Skipping page {}: already has content", page.id);
            return run
                .store
                .get(&page.id)
                .is_some_and(|p| p.status != PageStatus::Error);
        }
        let Some(_claim) = run.store.try_begin(&page.id) else {
            debug!("Skipping page {}: already in flight", page.id);
            return true;
        };
        if !run.store.start(&page.id) {
            return false;
        }

        self.emit(RunEvent::PageStarted {
            id: page.id.clone(),
            title: page.title.clone(),
        });
        debug!("Generating page {} ({})", page.id, page.title);

        let request = ChatRequest::new(&run.repo, prompts::page_prompt(page, &run.language))
            .with_generation(&self.generation, &run.language);
        let outcome = match self.transport.send(&request).await {
            Ok(stream) => collect_stream_with_restart(
                stream,
                |chunk| {
                    run.store.append(&page.id, chunk);
                    self.emit(RunEvent::PageChunk {
                        id: page.id.clone(),
                        chunk: chunk.to_string(),
                    });
                },
                || run.store.restart(&page.id),
            )
            .await
            .into_result(),
            Err(err) => Err(err),
        };

        match outcome {
            Ok(text) => {
                let content = clean_markdown_fence(&text);
                if content.trim().is_empty() {
                    warn!("Page {} returned no content", page.id);
                    run.store.fail(&page.id, "No content was generated");
                    false
                } else {
                    run.store.complete(&page.id, content)
                }
            }
            Err(err) => {
                warn!("Page {} failed: {}", page.id, err);
                run.store.fail(&page.id, &err.to_string());
                false
            }
        }
    }

    // -------------------------------------------------------------------------
    // Caches
    // -------------------------------------------------------------------------

    async fn probe_cache(&self, run: &GenerationRun) -> Option<WikiRunReport> {
        let query = run.cache_query();
        let mut cached = None;

        if let Some(backend) = &self.backend {
            match backend.get_cached_wiki(&query).await {
                Ok(found) => cached = found.filter(CachedWiki::is_usable),
                Err(err) => warn!("Cache lookup failed: {}", err),
            }
        }
        if cached.is_none()
            && let Some(cache) = &self.local_cache
        {
            match cache.load(&query).await {
                Ok(entry) => cached = entry.map(|e| e.wiki).filter(CachedWiki::is_usable),
                Err(err) => warn!("Local cache lookup failed: {}", err),
            }
        }

        let mut wiki = cached?;
        wiki.mark_loaded();
        wiki.wiki_structure.synthesize_sections();
        info!("Loaded {} pages from cache", wiki.generated_pages.len());

        let total = wiki.generated_pages.len();
        run.store.load(wiki.generated_pages);
        run.set_structure(wiki.wiki_structure.clone());
        self.emit(RunEvent::CacheHit { pages: total });
        self.enter(run, RunPhase::Complete);
        let failed = run.store.failed_ids();
        self.emit(RunEvent::Complete {
            from_cache: true,
            failed: failed.len(),
        });

        Some(WikiRunReport {
            run_id: run.id.clone(),
            repo: run.repo.clone(),
            language: run.language.clone(),
            comprehensive: run.comprehensive,
            structure: wiki.wiki_structure,
            pages: run.store.snapshot(),
            from_cache: true,
            failed,
            completed: total,
            total,
            cache_saved: false,
        })
    }

    async fn invalidate_cache(&self, run: &GenerationRun) {
        let query = run.cache_query().with_generation(&self.generation);
        if let Some(backend) = &self.backend
            && let Err(err) = backend.delete_cached_wiki(&query).await
        {
            warn!("Failed to delete cached wiki: {}", err);
        }
        if let Some(cache) = &self.local_cache
            && let Err(err) = cache.invalidate(&query).await
        {
            warn!("Failed to delete local cache entry: {}", err);
        }
    }

    async fn save_caches(&self, run: &GenerationRun, structure: &StructurePlan) -> bool {
        let wiki = CachedWiki::new(&run.cache_query(), structure.clone(), run.store.snapshot());
        let mut saved = false;

        if let Some(backend) = &self.backend {
            match backend.save_cached_wiki(&wiki).await {
                Ok(()) => {
                    info!("Saved wiki to backend cache");
                    saved = true;
                }
                Err(err) => warn!("Failed to save wiki to cache: {}", err),
            }
        }
        if let Some(cache) = &self.local_cache
            && let Err(err) = cache.save(&wiki).await
        {
            warn!("Failed to write local cache: {}", err);
        }
        saved
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{GithubHost, RepoSnapshot};
    use crate::test_support::{self, ChatBackend, Reply, ScriptedTransport};
    use crate::transport::{FallbackTransport, HttpTransport, WebSocketTransport};
    use crate::types::{HostType, Importance};
    use async_trait::async_trait;
    use axum::extract::State;
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::{Json, Router};
    use std::sync::atomic::AtomicUsize;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    struct StaticHost;

    #[async_trait]
    impl RepoHost for StaticHost {
        fn name(&self) -> &'static str {
            "static"
        }

        async fn fetch(&self, _repo: &RepositorySpec) -> Result<RepoSnapshot> {
            Ok(RepoSnapshot {
                file_tree: "src/lib.rs\nsrc/queue.rs".into(),
                readme: "# Engine".into(),
            })
        }
    }

    fn structure_xml(pages: usize) -> String {
        let body: String = (1..=pages)
            .map(|i| {
                format!(
                    r#"<page id="page-{i}"><title>Page {i}</title><importance>high</importance><relevant_files><file_path>src/lib.rs</file_path></relevant_files></page>"#
                )
            })
            .collect();
        format!(
            "<wiki_structure><title>Engine</title><description>An engine</description><pages>{}</pages></wiki_structure>",
            body
        )
    }

    fn is_planning(request: &ChatRequest) -> bool {
        request.messages[0].content.contains("<file_tree>")
    }

    fn scripted(pages: usize, delay: Duration) -> Arc<ScriptedTransport> {
        let xml = structure_xml(pages);
        ScriptedTransport::new(move |request| {
            if is_planning(request) {
                return Reply::text(&xml);
            }
            let mut reply = Reply::chunks(vec!["```markdown\n# Page\n", "Body text\n```"]);
            reply.delay = delay;
            reply
        })
    }

    fn generator(transport: Arc<ScriptedTransport>, concurrency: usize) -> WikiGenerator {
        let generation = GenerationConfig {
            concurrency,
            ..Default::default()
        };
        WikiGenerator::new(generation, transport, Box::new(StaticHost))
    }

    fn run() -> GenerationRun {
        GenerationRun::new(
            RepositorySpec::new("octo", "engine", HostType::Github),
            Language::default(),
            true,
        )
    }

    fn plan(id: &str) -> PagePlan {
        PagePlan {
            id: id.into(),
            title: "Overview".into(),
            importance: Importance::High,
            file_paths: vec!["src/lib.rs".into()],
            related_pages: vec![],
        }
    }

    fn load_pending(run: &GenerationRun, page: &PagePlan) {
        let mut pages = PageMap::new();
        pages.insert(page.id.clone(), GeneratedPage::pending(page.clone()));
        run.store.load(pages);
    }

    #[derive(Default)]
    struct FakeCache {
        cached: Mutex<Option<CachedWiki>>,
        posts: AtomicUsize,
        deletes: AtomicUsize,
    }

    fn cache_router(fake: Arc<FakeCache>) -> Router {
        Router::new()
            .route(
                "/api/wiki_cache",
                get(|State(fake): State<Arc<FakeCache>>| async move {
                    Json(fake.cached.lock().unwrap().clone())
                })
                .post(
                    |State(fake): State<Arc<FakeCache>>, Json(wiki): Json<CachedWiki>| async move {
                        fake.posts.fetch_add(1, Ordering::SeqCst);
                        *fake.cached.lock().unwrap() = Some(wiki);
                        StatusCode::OK
                    },
                )
                .delete(|State(fake): State<Arc<FakeCache>>| async move {
                    fake.deletes.fetch_add(1, Ordering::SeqCst);
                    fake.cached.lock().unwrap().take();
                    StatusCode::OK
                }),
            )
            .with_state(fake)
    }

    async fn backend(fake: &Arc<FakeCache>) -> BackendClient {
        let addr = test_support::spawn(cache_router(Arc::clone(fake))).await;
        BackendClient::new(reqwest::Client::new(), format!("http://{}", addr))
    }

    #[tokio::test]
    async fn test_run_generates_every_page() {
        let transport = scripted(4, Duration::ZERO);
        let fake = Arc::new(FakeCache::default());
        let generator = generator(Arc::clone(&transport), 3).with_backend(backend(&fake).await);
        let mut events = generator.subscribe();
        let run = run();

        let report = generator.run(&run).await.unwrap();

        assert!(!report.from_cache);
        assert_eq!(report.total, 4);
        assert_eq!(report.completed, 4);
        assert!(report.failed.is_empty());
        assert_eq!(report.progress(), 1.0);
        assert!(report.cache_saved);
        assert_eq!(fake.posts.load(Ordering::SeqCst), 1);
        assert_eq!(transport.calls(), 5);
        for page in report.ordered_pages() {
            assert_eq!(page.status, PageStatus::Done);
            assert_eq!(page.content, "# Page\nBody text");
        }
        assert_eq!(run.phase(), RunPhase::Complete);

        let mut finished = 0;
        let mut completes = 0;
        while let Ok(event) = events.try_recv() {
            match event {
                RunEvent::PageFinished { .. } => finished += 1,
                RunEvent::Complete { from_cache, .. } => {
                    assert!(!from_cache);
                    completes += 1;
                }
                _ => {}
            }
        }
        assert_eq!(finished, 4);
        assert_eq!(completes, 1);
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let transport = scripted(6, Duration::from_millis(20));
        let generator = generator(Arc::clone(&transport), 3);

        let report = generator.run(&run()).await.unwrap();
        assert_eq!(report.completed, 6);
        assert!(transport.peak_concurrency() <= 3);
        assert!(transport.peak_concurrency() >= 2);
    }

    #[tokio::test]
    async fn test_concurrent_generate_page_calls_once() {
        let transport = scripted(1, Duration::from_millis(30));
        let generator = generator(Arc::clone(&transport), 3);
        let run = run();
        let page = plan("page-1");
        load_pending(&run, &page);

        let (first, second) = tokio::join!(
            generator.generate_page(&run, &page),
            generator.generate_page(&run, &page)
        );
        assert!(first && second);
        assert_eq!(transport.calls(), 1);
        assert!(!run.store.is_in_flight("page-1"));

        // Done pages are not regenerated
        assert!(generator.generate_page(&run, &page).await);
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn test_websocket_timeout_falls_back_once() {
        let silent = test_support::spawn_silent().await;
        let chat = ChatBackend::replying(vec!["```markdown\n# Overview\n", "Decoded body\n```"]);
        let http = test_support::spawn(chat.http_router()).await;
        let transport = Arc::new(FallbackTransport::new(
            WebSocketTransport::new(format!("ws://{}/ws/chat", silent), Duration::from_millis(200)),
            HttpTransport::new(reqwest::Client::new(), format!("http://{}/chat/completions/stream", http)),
        ));
        let generator = WikiGenerator::new(GenerationConfig::default(), transport, Box::new(StaticHost));
        let run = run();
        let page = plan("page-1");
        load_pending(&run, &page);

        assert!(generator.generate_page(&run, &page).await);
        assert_eq!(chat.http_calls(), 1);
        assert_eq!(
            run.store.get("page-1").unwrap().content,
            "# Overview\nDecoded body"
        );
    }

    #[tokio::test]
    async fn test_broken_socket_page_keeps_only_http_output() {
        let chat = ChatBackend::replying(vec!["# Overview\n", "Full body"])
            .dropping_websocket_after(vec!["# Overview\n", "Half"]);
        let addr = test_support::spawn(chat.router()).await;
        let transport = Arc::new(FallbackTransport::new(
            WebSocketTransport::new(format!("ws://{}/ws/chat", addr), Duration::from_secs(5)),
            HttpTransport::new(reqwest::Client::new(), format!("http://{}/chat/completions/stream", addr)),
        ));
        let generator = WikiGenerator::new(GenerationConfig::default(), transport, Box::new(StaticHost));
        let run = run();
        let page = plan("page-1");
        load_pending(&run, &page);

        assert!(generator.generate_page(&run, &page).await);
        assert_eq!(chat.ws_calls(), 1);
        assert_eq!(chat.http_calls(), 1);
        let stored = run.store.get("page-1").unwrap();
        assert_eq!(stored.status, PageStatus::Done);
        assert_eq!(stored.content, "# Overview\nFull body");
    }

    #[tokio::test]
    async fn test_duplicate_run_is_rejected() {
        let transport = scripted(1, Duration::ZERO);
        let generator = generator(Arc::clone(&transport), 3);
        let run = run();

        let _active = run.claim().unwrap();
        let err = generator.run(&run).await.unwrap_err();
        assert!(matches!(err, WikiError::RunInProgress(ref key) if key.contains("engine")));
        assert_eq!(transport.calls(), 0);
        assert_eq!(run.phase(), RunPhase::Idle);
    }

    #[tokio::test]
    async fn test_page_failure_does_not_stop_run() {
        let xml = structure_xml(3);
        let transport = ScriptedTransport::new(move |request| {
            if is_planning(request) {
                Reply::text(&xml)
            } else if request.messages[0].content.contains("# Page 2") {
                Reply {
                    status: 500,
                    chunks: vec!["model exploded".into()],
                    delay: Duration::ZERO,
                }
            } else {
                Reply::text("# Fine")
            }
        });
        let fake = Arc::new(FakeCache::default());
        let generator = generator(Arc::clone(&transport), 3).with_backend(backend(&fake).await);

        let report = generator.run(&run()).await.unwrap();
        assert_eq!(report.completed, 3);
        assert_eq!(report.failed, vec!["page-2".to_string()]);
        let broken = &report.pages["page-2"];
        assert_eq!(broken.status, PageStatus::Error);
        assert!(broken.content.starts_with("Error generating content: "));
        assert!(broken.content.contains("model exploded"));
        assert_eq!(report.pages["page-1"].content, "# Fine");
        assert!(!report.cache_saved);
        assert_eq!(fake.posts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_malformed_structure_ends_in_error() {
        let transport = ScriptedTransport::new(|_| Reply::text("I cannot help with that"));
        let generator = generator(Arc::clone(&transport), 3);
        let mut events = generator.subscribe();
        let run = run();

        let err = generator.run(&run).await.unwrap_err();
        assert!(matches!(err, WikiError::MalformedStructure(_)));
        assert_eq!(run.phase(), RunPhase::Error);
        assert_eq!(transport.calls(), 1);

        let mut failed = false;
        while let Ok(event) = events.try_recv() {
            failed |= matches!(event, RunEvent::Failed { .. });
        }
        assert!(failed);
    }

    #[tokio::test]
    async fn test_cache_hit_skips_generation() {
        let run = run();
        let page = plan("page-1");
        let mut pages = PageMap::new();
        pages.insert(
            "page-1".into(),
            GeneratedPage {
                plan: page.clone(),
                content: "# Cached".into(),
                status: PageStatus::InProgress,
            },
        );
        let structure = StructurePlan {
            title: "Engine".into(),
            description: "cached".into(),
            pages: vec![page],
            ..Default::default()
        };
        let fake = Arc::new(FakeCache::default());
        *fake.cached.lock().unwrap() = Some(CachedWiki::new(&run.cache_query(), structure, pages));

        let transport = scripted(1, Duration::ZERO);
        let generator = generator(Arc::clone(&transport), 3).with_backend(backend(&fake).await);

        let report = generator.run(&run).await.unwrap();
        assert!(report.from_cache);
        assert_eq!(transport.calls(), 0);
        assert_eq!(report.pages["page-1"].status, PageStatus::Done);
        assert_eq!(report.structure.sections[0].id, "section-overview");
        assert_eq!(report.structure.root_sections, vec!["section-overview".to_string()]);
    }

    #[tokio::test]
    async fn test_force_deletes_cache_and_regenerates() {
        let fake = Arc::new(FakeCache::default());
        let seed = run();
        *fake.cached.lock().unwrap() = Some(CachedWiki::new(
            &seed.cache_query(),
            StructurePlan::default(),
            PageMap::from([("page-1".to_string(), GeneratedPage::pending(plan("page-1")))]),
        ));

        let transport = scripted(2, Duration::ZERO);
        let generator = generator(Arc::clone(&transport), 3).with_backend(backend(&fake).await);

        let report = generator.run(&run().force(true)).await.unwrap();
        assert!(!report.from_cache);
        assert_eq!(fake.deletes.load(Ordering::SeqCst), 1);
        assert_eq!(transport.calls(), 3);
        assert_eq!(fake.posts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_github_master_fallback_feeds_planning() {
        let router = Router::new()
            .route(
                "/repos/{owner}/{repo}/git/trees/main",
                get(|| async { (StatusCode::NOT_FOUND, "Not Found") }),
            )
            .route(
                "/repos/{owner}/{repo}/git/trees/master",
                get(|| async {
                    Json(serde_json::json!({
                        "tree": [{"path": "cmd/server.go", "type": "blob"}]
                    }))
                }),
            )
            .route(
                "/repos/{owner}/{repo}/readme",
                // "# From master"
                get(|| async { Json(serde_json::json!({"content": "IyBGcm9tIG1hc3Rlcg=="})) }),
            );
        let addr = test_support::spawn(router).await;
        let host = GithubHost::new(
            reqwest::Client::new(),
            &format!("http://{}", addr),
            vec!["main".into(), "master".into()],
        );
        let transport = scripted(1, Duration::ZERO);
        let generator =
            WikiGenerator::new(GenerationConfig::default(), transport.clone(), Box::new(host));

        generator.run(&run()).await.unwrap();
        let planning = &transport.requests()[0].messages[0].content;
        assert!(planning.contains("cmd/server.go"));
        assert!(planning.contains("# From master"));
    }

    #[tokio::test]
    async fn test_local_cache_written_on_clean_run() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let transport = scripted(2, Duration::ZERO);
        let generator = generator(Arc::clone(&transport), 2)
            .with_local_cache(LocalCache::new(temp_dir.path()));
        let run = run();

        generator.run(&run).await.unwrap();
        let entry = LocalCache::new(temp_dir.path())
            .load(&run.cache_query())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(entry.metadata.page_count, 2);

        // A second run is served from the local cache
        let again = generator.run(&self::run()).await.unwrap();
        assert!(again.from_cache);
        assert_eq!(transport.calls(), 3);
    }
}
