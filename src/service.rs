//! Async document service
//!
//! [`XmlService`] owns two single-flight caches: analyses keyed by file and
//! fetched schemas keyed by schema location. An analysis is reused only
//! while its sequence equals the buffer's current sequence. Schemas stay
//! cached until [`XmlService::invalidate_schema`] drops them.

use crate::analysis::{Analysis, Diagnostic, DiagnosticsSink};
use crate::cache::TaskCache;
use crate::completion::ui::GiIntrospection;
use crate::completion::{CompletionProvider, Proposal};
use crate::error::{Error, Result};
use crate::limits::Limits;
use crate::loaders::Loader;
use crate::locations::Location;
use crate::parser::DocumentParser;
use crate::position::Position;
use crate::schema::{self, SchemaCacheEntry};
use crate::symbol::SymbolTree;
use crate::tree_builder::validate;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Service configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Limits for documents and schemas
    pub limits: Limits,
    /// Directory with the bundled GtkBuilder grammars
    pub bundled_schemas: Option<PathBuf>,
    /// Age after which finished analyses are dropped, `None` keeps them
    pub eviction_interval: Option<Duration>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            limits: Limits::default(),
            bundled_schemas: None,
            eviction_interval: Some(Duration::from_secs(60)),
        }
    }
}

impl ServiceConfig {
    /// Set the limits
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Set the bundled grammar directory
    pub fn with_bundled_schemas(mut self, dir: impl Into<PathBuf>) -> Self {
        self.bundled_schemas = Some(dir.into());
        self
    }

    /// Set the eviction interval
    pub fn with_eviction_interval(mut self, interval: Option<Duration>) -> Self {
        self.eviction_interval = interval;
        self
    }
}

/// Source of document contents
#[async_trait]
pub trait BufferProvider: Send + Sync {
    /// Current content of `file` and its change sequence
    async fn file_bytes(&self, file: &Location) -> Result<(Arc<[u8]>, i64)>;

    /// Whether `file` is still being loaded
    fn is_loading(&self, file: &Location) -> bool;

    /// Resolves once `file` is loaded
    async fn wait_loaded(&self, file: &Location);
}

/// In-memory buffers, each `set` bumping the sequence
#[derive(Debug, Default)]
pub struct MemoryBuffers {
    buffers: Mutex<HashMap<Location, (Arc<[u8]>, i64)>>,
    loading: Mutex<HashSet<Location>>,
    loaded: Notify,
}

impl MemoryBuffers {
    /// No buffers
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the content of `file`, returning its new sequence
    pub fn set(&self, file: Location, content: impl Into<Arc<[u8]>>) -> i64 {
        let mut buffers = self.buffers.lock();
        let sequence = buffers.get(&file).map_or(1, |(_, seq)| seq + 1);
        buffers.insert(file, (content.into(), sequence));
        sequence
    }

    /// Mark `file` as loading or loaded
    pub fn set_loading(&self, file: &Location, loading: bool) {
        if loading {
            self.loading.lock().insert(file.clone());
        } else {
            self.loading.lock().remove(file);
            self.loaded.notify_waiters();
        }
    }
}

#[async_trait]
impl BufferProvider for MemoryBuffers {
    async fn file_bytes(&self, file: &Location) -> Result<(Arc<[u8]>, i64)> {
        self.buffers
            .lock()
            .get(file)
            .cloned()
            .ok_or_else(|| Error::Resource(format!("no buffer for '{}'", file)))
    }

    fn is_loading(&self, file: &Location) -> bool {
        self.loading.lock().contains(file)
    }

    async fn wait_loaded(&self, file: &Location) {
        loop {
            let notified = self.loaded.notified();
            if !self.is_loading(file) {
                return;
            }
            notified.await;
        }
    }
}

/// Analyses, positions and completion for open documents
pub struct XmlService {
    config: ServiceConfig,
    loader: Loader,
    parser: DocumentParser,
    buffers: Arc<dyn BufferProvider>,
    analyses: TaskCache<Location, Analysis>,
    schemas: Arc<TaskCache<Location, SchemaCacheEntry>>,
    completion: CompletionProvider,
}

impl std::fmt::Debug for XmlService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("XmlService")
            .field("config", &self.config)
            .field("analyses", &self.analyses)
            .field("schemas", &self.schemas)
            .finish()
    }
}

impl XmlService {
    /// Service reading documents from `buffers`
    pub fn new(config: ServiceConfig, buffers: Arc<dyn BufferProvider>) -> Self {
        let loader = Loader::new().with_limits(config.limits.clone());
        let mut parser = DocumentParser::new().with_limits(config.limits.clone());
        if let Some(dir) = &config.bundled_schemas {
            parser = parser.with_bundled_schemas(dir);
        }
        Self {
            config,
            loader,
            parser,
            buffers,
            analyses: TaskCache::new("analyses"),
            schemas: Arc::new(TaskCache::new("schemas")),
            completion: CompletionProvider::new(),
        }
    }

    /// Complete GtkBuilder property, signal and package names through `gi`
    pub fn with_gi(mut self, gi: Arc<dyn GiIntrospection>) -> Self {
        self.completion = CompletionProvider::with_gi(gi);
        self
    }

    /// Configuration in use
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Analysis of the current content of `file`
    pub async fn get_analysis(&self, file: &Location, token: &CancellationToken) -> Result<Arc<Analysis>> {
        self.analysis_with_text(file, token).await.map(|(analysis, _)| analysis)
    }

    async fn analysis_with_text(
        &self,
        file: &Location,
        token: &CancellationToken,
    ) -> Result<(Arc<Analysis>, Arc<[u8]>)> {
        if file.is_remote() {
            return Err(Error::Unsupported("File must be saved locally to parse.".to_string()));
        }

        if self.buffers.is_loading(file) {
            tracing::debug!(%file, "waiting for buffer to load");
            tokio::select! {
                _ = token.cancelled() => return Err(Error::Cancelled),
                _ = self.buffers.wait_loaded(file) => {}
            }
        }

        let mut last = None;
        for _ in 0..2 {
            let (content, sequence) = self.buffers.file_bytes(file).await?;
            if let Some(cached) = self.analyses.peek(file) {
                if cached.sequence == sequence {
                    return Ok((cached, content));
                }
                self.analyses.evict(file);
            }

            let build = self.build_task(file.clone(), content.clone(), sequence);
            let analysis = self.analyses.get_or_build(file.clone(), token, || build).await?;
            if analysis.sequence == sequence {
                return Ok((analysis, content));
            }

            // an older build was still in flight
            tracing::debug!(%file, expected = sequence, got = analysis.sequence, "stale analysis");
            self.analyses.evict(file);
            last = Some((analysis, content));
        }
        last.ok_or_else(|| Error::Other("no analysis".to_string()))
    }

    fn build_task(
        &self,
        file: Location,
        content: Arc<[u8]>,
        sequence: i64,
    ) -> impl std::future::Future<Output = Result<Analysis>> + Send + 'static {
        let parser = self.parser.clone();
        let loader = self.loader.clone();
        let schemas = self.schemas.clone();

        async move {
            let parse_file = file.clone();
            let mut analysis =
                tokio::task::spawn_blocking(move || parser.parse(Some(&parse_file), &content, sequence))
                    .await
                    .map_err(|e| Error::Other(format!("parser task failed: {}", e)))??;

            // documents sharing a schema must not cancel its load
            let schema_token = CancellationToken::new();
            for entry in analysis.schemas.iter_mut() {
                let Some(location) = entry.file.clone() else {
                    continue;
                };
                let kind = entry.kind;
                let fetch_loader = loader.clone();
                let fetch_location = location.clone();
                let fetched = schemas
                    .get_or_build(location, &schema_token, move || async move {
                        Ok(schema::fetch(&fetch_loader, &fetch_location, kind).await)
                    })
                    .await;
                match fetched {
                    Ok(cached) => entry.merge_from(&cached),
                    Err(e) => tracing::warn!(%file, error = %e, "schema fetch failed"),
                }
            }

            validate(&mut analysis);
            tracing::debug!(
                %file,
                sequence,
                diagnostics = analysis.diagnostics.len(),
                "analysis built"
            );
            Ok(analysis)
        }
    }

    /// Symbol tree of the current content of `file`
    pub async fn get_root_node(&self, file: &Location, token: &CancellationToken) -> Result<Arc<SymbolTree>> {
        Ok(self.get_analysis(file, token).await?.tree.clone())
    }

    /// Symbol tree of an analysis at least as new as `min_sequence`
    ///
    /// A cached analysis with a sequence of `min_sequence` or later is
    /// returned as is, even if the buffer has moved on since. A
    /// `min_sequence` of 0 asks for the current content.
    pub async fn get_root_node_since(
        &self,
        file: &Location,
        min_sequence: i64,
        token: &CancellationToken,
    ) -> Result<Arc<SymbolTree>> {
        if min_sequence > 0 {
            if let Some(cached) = self.analyses.peek(file) {
                if cached.sequence >= min_sequence {
                    return Ok(cached.tree.clone());
                }
            }
        }
        self.get_root_node(file, token).await
    }

    /// Symbol tree of the last finished analysis, whatever its sequence
    pub fn get_cached_root_node(&self, file: &Location) -> Option<Arc<SymbolTree>> {
        self.analyses.peek(file).map(|analysis| analysis.tree.clone())
    }

    /// Diagnostics of the current content of `file`
    pub async fn get_diagnostics(&self, file: &Location, token: &CancellationToken) -> Result<Vec<Diagnostic>> {
        Ok(self.get_analysis(file, token).await?.diagnostics.clone())
    }

    /// Send the diagnostics of `file` to a sink
    pub async fn publish_diagnostics(
        &self,
        file: &Location,
        sink: &dyn DiagnosticsSink,
        token: &CancellationToken,
    ) -> Result<()> {
        self.get_analysis(file, token).await?.report(file, sink);
        Ok(())
    }

    /// What sits at a 1-based cursor in `file`
    pub async fn get_position_from_cursor(
        &self,
        file: &Location,
        line: u32,
        col: u32,
        token: &CancellationToken,
    ) -> Result<Position> {
        let (analysis, content) = self.analysis_with_text(file, token).await?;
        Ok(Position::resolve(analysis, &content, line, col))
    }

    /// Completion proposals at a 1-based cursor in `file`
    pub async fn complete(
        &self,
        file: &Location,
        line: u32,
        col: u32,
        token: &CancellationToken,
    ) -> Result<Vec<Proposal>> {
        let position = self.get_position_from_cursor(file, line, col, token).await?;
        Ok(self.completion.populate(&position))
    }

    /// Fetched schemas, shared by every document
    pub fn schemas_cache(&self) -> &TaskCache<Location, SchemaCacheEntry> {
        &self.schemas
    }

    /// Drop a cached schema and the analyses that may hold it
    pub fn invalidate_schema(&self, location: &Location) -> bool {
        let removed = self.schemas.evict(location);
        if removed {
            self.analyses.clear();
        }
        removed
    }

    /// Drop finished analyses older than the eviction interval
    pub fn evict_expired(&self) -> usize {
        match self.config.eviction_interval {
            Some(ttl) => self.analyses.evict_expired(ttl),
            None => 0,
        }
    }

    /// Run [`XmlService::evict_expired`] periodically until `token` is cancelled
    pub fn spawn_eviction(self: &Arc<Self>, token: CancellationToken) -> Option<JoinHandle<()>> {
        let period = self.config.eviction_interval?;
        let service = Arc::downgrade(self);
        Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = interval.tick() => {
                        let Some(service) = service.upgrade() else {
                            break;
                        };
                        service.evict_expired();
                    }
                }
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::Severity;
    use crate::position::PositionKind;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    fn service(buffers: Arc<MemoryBuffers>) -> XmlService {
        XmlService::new(ServiceConfig::default(), buffers)
    }

    #[tokio::test]
    async fn test_analysis_follows_sequence() {
        let buffers = Arc::new(MemoryBuffers::new());
        let file = Location::Path(PathBuf::from("/tmp/doc.xml"));
        buffers.set(file.clone(), b"<a><b/></a>".to_vec());
        let service = service(buffers.clone());
        let token = CancellationToken::new();

        let first = service.get_analysis(&file, &token).await.unwrap();
        let again = service.get_analysis(&file, &token).await.unwrap();
        assert!(Arc::ptr_eq(&first, &again));
        assert_eq!(first.sequence, 1);

        buffers.set(file.clone(), b"<a><c/></a>".to_vec());
        let tree = service.get_root_node(&file, &token).await.unwrap();
        assert_eq!(tree.outline(), "a (1:1-1:3)\n  c (1:4-1:7)\n");
        assert_eq!(service.get_cached_root_node(&file).unwrap().outline(), tree.outline());
    }

    #[tokio::test]
    async fn test_root_node_since_accepts_newer_analysis() {
        let buffers = Arc::new(MemoryBuffers::new());
        let file = Location::Path(PathBuf::from("/tmp/since.xml"));
        buffers.set(file.clone(), b"<a/>".to_vec());
        let service = service(buffers.clone());
        let token = CancellationToken::new();
        service.get_analysis(&file, &token).await.unwrap();

        buffers.set(file.clone(), b"<b/>".to_vec());
        let old = service.get_root_node_since(&file, 1, &token).await.unwrap();
        assert_eq!(old.outline(), "a (1:1-1:4)\n");
        let current = service.get_root_node_since(&file, 2, &token).await.unwrap();
        assert_eq!(current.outline(), "b (1:1-1:4)\n");
    }

    #[tokio::test]
    async fn test_remote_files_unsupported() {
        let buffers = Arc::new(MemoryBuffers::new());
        let service = service(buffers);
        let file = Location::from_str("https://example.org/doc.xml").unwrap();
        let err = service
            .get_analysis(&file, &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "unsupported: File must be saved locally to parse.");
    }

    #[tokio::test]
    async fn test_waits_for_loading_buffer() {
        let buffers = Arc::new(MemoryBuffers::new());
        let file = Location::Path(PathBuf::from("/tmp/late.xml"));
        buffers.set_loading(&file, true);
        let service = Arc::new(service(buffers.clone()));

        let task = {
            let service = service.clone();
            let file = file.clone();
            tokio::spawn(async move { service.get_diagnostics(&file, &CancellationToken::new()).await })
        };
        tokio::task::yield_now().await;
        buffers.set(file.clone(), b"<a>".to_vec());
        buffers.set_loading(&file, false);

        let diagnostics = task.await.unwrap().unwrap();
        assert!(diagnostics.iter().any(|d| d.severity >= Severity::Error));
    }

    #[tokio::test]
    async fn test_cancelled_wait() {
        let buffers = Arc::new(MemoryBuffers::new());
        let file = Location::Path(PathBuf::from("/tmp/never.xml"));
        buffers.set_loading(&file, true);
        let service = service(buffers);

        let token = CancellationToken::new();
        token.cancel();
        let err = service.get_analysis(&file, &token).await.unwrap_err();
        assert!(err.is_cancelled());
    }

    #[tokio::test]
    async fn test_schema_shared_between_documents() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("s.rng"),
            r#"<element name="a" xmlns="http://relaxng.org/ns/structure/1.0"><empty/></element>"#,
        )
        .unwrap();

        let buffers = Arc::new(MemoryBuffers::new());
        let one = Location::Path(dir.path().join("one.xml"));
        let two = Location::Path(dir.path().join("two.xml"));
        buffers.set(one.clone(), b"<?xml-model href=\"s.rng\"?>\n<a/>".to_vec());
        buffers.set(two.clone(), b"<?xml-model href=\"s.rng\"?>\n<a><b/></a>".to_vec());
        let service = service(buffers);
        let token = CancellationToken::new();

        assert!(service.get_diagnostics(&one, &token).await.unwrap().is_empty());
        let diagnostics = service.get_diagnostics(&two, &token).await.unwrap();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].message, "Element 'b' is not allowed here");
        assert_eq!(service.schemas_cache().len(), 1);

        assert!(service.invalidate_schema(&Location::Path(dir.path().join("s.rng"))));
        assert!(service.schemas_cache().is_empty());
    }

    #[tokio::test]
    async fn test_position_and_completion() {
        let buffers = Arc::new(MemoryBuffers::new());
        let file = Location::Path(PathBuf::from("/tmp/pos.xml"));
        buffers.set(file.clone(), b"<a>\n  \n</a>".to_vec());
        let service = service(buffers);
        let token = CancellationToken::new();

        let position = service.get_position_from_cursor(&file, 2, 3, &token).await.unwrap();
        assert_eq!(position.kind, PositionKind::InContent);
        assert!(service.complete(&file, 2, 3, &token).await.unwrap().is_empty());
    }
}
