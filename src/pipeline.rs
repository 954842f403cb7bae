//! End-to-end analysis of a project directory.
//!
//! Discovery walks the tree, Pass 1 extracts every file in parallel, and
//! once all tables are collected the [`Resolver`] links them.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context;
use globset::GlobSet;
use rayon::prelude::*;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::Config;
use crate::extract::get_extractor;
use crate::semantic::{FileAnalysis, ResolutionSummary, Resolver, SemanticGraph, StrategyRegistry};

/// Directories never descended into.
const SKIPPED_DIRS: &[&str] = &[
    "node_modules",
    "vendor",
    "__pycache__",
    "dist",
    "build",
    "target",
    "venv",
];

/// Directories holding tests, skipped unless tests are included.
const TEST_DIRS: &[&str] = &["tests", "test", "__tests__", "__test__", "testdata", "test_data"];

/// Result of one pipeline run.
#[derive(Debug)]
pub struct PipelineOutput {
    pub graph: SemanticGraph,
    pub summary: ResolutionSummary,
    pub files_discovered: usize,
    /// Files that could not be read or parsed.
    pub failed_files: Vec<PathBuf>,
}

/// Discovery, Pass 1 and Pass 2 for one project.
pub struct Pipeline {
    root: PathBuf,
    config: Config,
    jobs: Option<usize>,
}

impl Pipeline {
    /// `root` is canonicalized; a single file analyzes just that file with
    /// its directory as the project root.
    pub fn new(root: impl AsRef<Path>, config: Config) -> anyhow::Result<Self> {
        let root = root
            .as_ref()
            .canonicalize()
            .with_context(|| format!("cannot access path {}", root.as_ref().display()))?;
        Ok(Self {
            root,
            config,
            jobs: None,
        })
    }

    /// Worker count; overrides `max_workers` from the config.
    pub fn jobs(mut self, jobs: Option<usize>) -> Self {
        self.jobs = jobs;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn project_root(&self) -> anyhow::Result<PathBuf> {
        let root = match &self.config.project_root {
            Some(configured) if configured.is_absolute() => configured.clone(),
            Some(configured) => self.search_root().join(configured),
            None => self.search_root().to_path_buf(),
        };
        root.canonicalize()
            .with_context(|| format!("cannot access project root {}", root.display()))
    }

    fn search_root(&self) -> &Path {
        if self.root.is_file() {
            self.root.parent().unwrap_or(&self.root)
        } else {
            &self.root
        }
    }

    fn strategies(&self) -> StrategyRegistry {
        let mut registry = StrategyRegistry::with_defaults();
        if !self.config.languages.is_empty() {
            registry.retain(&self.config.languages);
        }
        registry
    }

    /// Run both passes.
    pub fn run(&self) -> anyhow::Result<PipelineOutput> {
        let started = Instant::now();
        let files = if self.root.is_file() {
            vec![self.root.clone()]
        } else {
            discover_files(&self.root, &self.config)?
        };
        info!(files = files.len(), root = %self.root.display(), "discovered source files");

        let resolver = Resolver::new(self.project_root()?, self.strategies())?;
        let workers = self.jobs.or(self.config.max_workers);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers.unwrap_or(0))
            .build()
            .context("failed to build worker pool")?;

        let (graph, summary, failed_files) = pool.install(|| {
            let (analyses, failed) = extract_files(&files, &self.config);
            let mut graph = SemanticGraph::from_analyses(
                resolver.project_root().to_string_lossy().into_owned(),
                analyses,
            );
            let summary = resolver.resolve_graph(&mut graph);
            (graph, summary, failed)
        });

        let mut graph = graph;
        graph.statistics.analysis_time_ms = started.elapsed().as_millis() as u64;
        info!(
            files = graph.statistics.total_files,
            symbols = graph.statistics.total_symbols,
            resolved = graph.statistics.resolved_calls,
            unresolved = graph.statistics.unresolved_calls,
            elapsed_ms = graph.statistics.analysis_time_ms,
            "analysis complete"
        );

        Ok(PipelineOutput {
            graph,
            summary,
            files_discovered: files.len(),
            failed_files,
        })
    }
}

/// Collect files with a registered extractor under `root`, sorted by path.
pub fn discover_files(root: &Path, config: &Config) -> anyhow::Result<Vec<PathBuf>> {
    let exclusions = config.exclusions()?;
    let include_tests = config.should_include_test_files();
    let mut files = Vec::new();

    for entry in WalkDir::new(root)
        .follow_links(config.should_follow_links())
        .into_iter()
        .filter_entry(|e| {
            e.depth() == 0
                || !e.file_type().is_dir()
                || descend_into(&e.file_name().to_string_lossy(), include_tests)
        })
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if !is_candidate(path, config, &exclusions, include_tests) {
            continue;
        }
        files.push(path.to_path_buf());
    }

    files.sort();
    Ok(files)
}

fn descend_into(name: &str, include_tests: bool) -> bool {
    if name.starts_with('.') || SKIPPED_DIRS.contains(&name) {
        return false;
    }
    include_tests || !TEST_DIRS.contains(&name)
}

fn is_candidate(path: &Path, config: &Config, exclusions: &GlobSet, include_tests: bool) -> bool {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    let Some(extractor) = get_extractor(ext) else {
        return false;
    };
    if !config.language_enabled(extractor.language_id()) {
        return false;
    }
    if exclusions.is_match(path) {
        debug!(path = %path.display(), "excluded by config");
        return false;
    }
    if !include_tests {
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
        if is_test_file_name(name) {
            return false;
        }
    }
    true
}

/// `test_x.py`, `x_test.py`, `x.test.ts`, `x.spec.js`, `conftest.py`
fn is_test_file_name(name: &str) -> bool {
    let stem = name.split('.').next().unwrap_or(name);
    name.starts_with("test_")
        || stem.ends_with("_test")
        || name == "conftest.py"
        || name.contains(".test.")
        || name.contains(".spec.")
}

/// Pass 1 over `paths` on the current rayon pool. Failures are logged and
/// returned; results are sorted by path.
pub fn extract_files(paths: &[PathBuf], config: &Config) -> (Vec<FileAnalysis>, Vec<PathBuf>) {
    let results: Vec<_> = paths
        .par_iter()
        .map(|path| (path, analyze_file(path, config)))
        .collect();

    let mut analyses = Vec::new();
    let mut failed = Vec::new();
    for (path, result) in results {
        match result {
            Ok(Some(analysis)) => analyses.push(analysis),
            Ok(None) => {}
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to analyze file");
                failed.push(path.clone());
            }
        }
    }

    analyses.sort_by(|a, b| a.file_path.cmp(&b.file_path));
    (analyses, failed)
}

/// Pass 1 for one file. `None` when no extractor handles it.
pub fn analyze_file(path: &Path, config: &Config) -> anyhow::Result<Option<FileAnalysis>> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    let Some(extractor) = get_extractor(ext) else {
        return Ok(None);
    };
    if !config.language_enabled(extractor.language_id()) {
        return Ok(None);
    }

    let source = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let parsed = extractor.parse(path, &source)?;
    let analysis = extractor
        .extract(&parsed)
        .with_context(|| format!("failed to extract {}", path.display()))?;
    if analysis.has_parse_errors {
        debug!(path = %path.display(), "file has syntax errors; partial results kept");
    }
    Ok(Some(analysis))
}
