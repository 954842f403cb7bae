//! Pass 2: links imports to files and call sites to declarations.
//!
//! Resolution runs per file in parallel. Each job only reads the symbol
//! tables and returns `(call index, callee id)` pairs; the results are
//! applied afterwards by a single writer, which also rebuilds the call graph
//! and statistics.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rayon::prelude::*;
use tracing::{debug, info, trace, warn};

use super::error::{ResolveError, SemanticError};
use super::facts::{CallSite, DependencyInfo, FileAnalysis, ImportKind, DEFAULT_EXPORT};
use super::graph::SemanticGraph;
use super::strategy::{
    normalize_path, AliasedSymbol, ImportScope, LanguageStrategy, ResolutionContext,
    StrategyRegistry,
};
use super::symbol::{base_type_name, Symbol, SymbolId, ID_SEPARATOR};
use super::table::{module_name_of, scope_chain, SymbolTable};

/// Receiver names that refer to the enclosing class instance.
const RECEIVER_NAMES: &[&str] = &["self", "cls", "this"];

/// Which step of the chain produced a resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Tactic {
    Builtin,
    LocalScope,
    FileScope,
    ImportedSymbol,
    MemberAccess,
    TypeInference,
}

impl fmt::Display for Tactic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Tactic::Builtin => "builtin",
            Tactic::LocalScope => "local_scope",
            Tactic::FileScope => "file_scope",
            Tactic::ImportedSymbol => "imported_symbol",
            Tactic::MemberAccess => "member_access",
            Tactic::TypeInference => "type_inference",
        };
        f.write_str(name)
    }
}

/// What a resolution run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolutionSummary {
    pub files_resolved: usize,
    /// Files without a symbol table or a registered strategy.
    pub files_skipped: usize,
    pub resolved_calls: usize,
    pub by_tactic: BTreeMap<String, usize>,
    /// Set when the run stopped early because of cancellation.
    pub cancelled: bool,
}

enum FileOutcome {
    Resolved(Vec<(usize, SymbolId, Tactic)>),
    Skipped,
    Cancelled,
}

/// Whole-project resolver.
pub struct Resolver {
    project_root: PathBuf,
    strategies: StrategyRegistry,
    cancelled: Arc<AtomicBool>,
}

impl Resolver {
    /// Create a resolver for `project_root`, which must be an existing
    /// directory.
    pub fn new(
        project_root: impl AsRef<Path>,
        strategies: StrategyRegistry,
    ) -> Result<Self, SemanticError> {
        let root = project_root.as_ref();
        if !root.is_dir() {
            return Err(SemanticError::InvalidProjectRoot(root.to_path_buf()));
        }
        let root = if root.is_absolute() {
            root.to_path_buf()
        } else {
            std::env::current_dir()?.join(root)
        };
        Ok(Self {
            project_root: normalize_path(&root),
            strategies,
            cancelled: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn with_defaults(project_root: impl AsRef<Path>) -> Result<Self, SemanticError> {
        Self::new(project_root, StrategyRegistry::with_defaults())
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn strategies(&self) -> &StrategyRegistry {
        &self.strategies
    }

    /// Flag that stops resolution before the next file starts.
    pub fn cancellation_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Build a graph from Pass 1 output and resolve it.
    pub fn resolve(&self, analyses: Vec<FileAnalysis>) -> SemanticGraph {
        let mut graph = SemanticGraph::from_analyses(
            self.project_root.to_string_lossy().into_owned(),
            analyses,
        );
        self.resolve_graph(&mut graph);
        graph
    }

    /// Resolve imports, then call sites. Safe to call repeatedly.
    pub fn resolve_graph(&self, graph: &mut SemanticGraph) -> ResolutionSummary {
        self.build_dependency_graph(graph);
        self.resolve_call_sites(graph)
    }

    /// Resolve every raw import of every file into the dependency graph.
    pub fn build_dependency_graph(&self, graph: &mut SemanticGraph) {
        let edges: Vec<(String, Vec<String>)> = graph
            .file_symbol_tables
            .par_iter()
            .filter_map(|(path, table)| {
                if self.is_cancelled() {
                    return None;
                }
                let Some(strategy) = self.strategies.get(&table.language) else {
                    debug!(file = %path, language = %table.language, "no strategy, skipping imports");
                    return None;
                };
                let targets = self.resolve_imports(path, table, strategy.as_ref());
                Some((path.clone(), targets))
            })
            .collect();

        graph.dependency_graph = edges
            .into_iter()
            .filter(|(_, targets)| !targets.is_empty())
            .collect();
    }

    fn resolve_imports(
        &self,
        path: &str,
        table: &SymbolTable,
        strategy: &dyn LanguageStrategy,
    ) -> Vec<String> {
        let mut targets: Vec<String> = Vec::new();
        for import in &table.dependencies {
            match strategy.resolve_import(import, Path::new(path), &self.project_root) {
                Ok(target) => {
                    let target = target.to_string_lossy().into_owned();
                    if !targets.contains(&target) {
                        targets.push(target);
                    }
                }
                Err(ResolveError::ExternalModule(module)) => {
                    debug!(file = %path, module = %module, "external import");
                }
                Err(err) => warn!(file = %path, "{err}"),
            }
        }
        targets
    }

    /// Resolve every call site of the graph.
    pub fn resolve_call_sites(&self, graph: &mut SemanticGraph) -> ResolutionSummary {
        for call in &mut graph.call_sites {
            call.reset();
        }

        let outcomes: Vec<FileOutcome> = {
            let shared: &SemanticGraph = graph;
            let mut calls_by_file: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
            for (index, call) in shared.call_sites.iter().enumerate() {
                calls_by_file
                    .entry(call.location.file_path.as_str())
                    .or_default()
                    .push(index);
            }
            let mut deps_by_file: BTreeMap<&str, Vec<&DependencyInfo>> = BTreeMap::new();
            for dependency in &shared.dependencies {
                deps_by_file
                    .entry(dependency.source_file.as_str())
                    .or_default()
                    .push(dependency);
            }

            calls_by_file
                .par_iter()
                .map(|(file, indices)| {
                    let deps = deps_by_file.get(file).map(Vec::as_slice).unwrap_or_default();
                    self.resolve_file(file, indices, deps, shared)
                })
                .collect()
        };

        let mut summary = ResolutionSummary::default();
        for outcome in outcomes {
            match outcome {
                FileOutcome::Resolved(resolved) => {
                    summary.files_resolved += 1;
                    for (index, callee, tactic) in resolved {
                        graph.call_sites[index].resolve(callee);
                        summary.resolved_calls += 1;
                        *summary.by_tactic.entry(tactic.to_string()).or_insert(0) += 1;
                    }
                }
                FileOutcome::Skipped => summary.files_skipped += 1,
                FileOutcome::Cancelled => summary.cancelled = true,
            }
        }

        graph.rebuild_call_graph();
        graph.recompute_statistics();

        if summary.cancelled {
            warn!("resolution cancelled before all files were processed");
        }
        info!(
            resolved = graph.statistics.resolved_calls,
            unresolved = graph.statistics.unresolved_calls,
            "call site resolution finished"
        );
        summary
    }

    fn resolve_file(
        &self,
        file: &str,
        indices: &[usize],
        dependencies: &[&DependencyInfo],
        graph: &SemanticGraph,
    ) -> FileOutcome {
        if self.is_cancelled() {
            return FileOutcome::Cancelled;
        }
        let Some(table) = graph.symbol_table(file) else {
            debug!(file = %file, "call sites without a symbol table");
            return FileOutcome::Skipped;
        };
        let Some(strategy) = self.strategies.get(&table.language) else {
            debug!(file = %file, language = %table.language, "no strategy, leaving calls unresolved");
            return FileOutcome::Skipped;
        };

        let imports = self.import_scope(file, dependencies, strategy.as_ref(), graph);
        let ctx = ResolutionContext::new(
            table,
            &imports,
            &graph.dependency_graph,
            &graph.file_symbol_tables,
        );

        let resolved = indices
            .iter()
            .filter_map(|&index| {
                let call = &graph.call_sites[index];
                let (callee, tactic) = self.resolve_call(call, strategy.as_ref(), ctx)?;
                trace!(callee = %call.callee_name, id = %callee, %tactic, "resolved");
                Some((index, callee, tactic))
            })
            .collect();
        FileOutcome::Resolved(resolved)
    }

    /// Tables reachable from `file`, keyed by module name and import alias.
    fn import_scope<'g>(
        &self,
        file: &str,
        dependencies: &[&'g DependencyInfo],
        strategy: &dyn LanguageStrategy,
        graph: &'g SemanticGraph,
    ) -> ImportScope<'g> {
        let mut scope = ImportScope::default();
        if let Some(targets) = graph.dependency_graph.get(file) {
            for target in targets {
                if let Some(table) = graph.file_symbol_tables.get(target) {
                    scope.modules.entry(module_name_of(target)).or_insert(table);
                }
            }
        }

        for dependency in dependencies {
            let Ok(target) =
                strategy.resolve_import(&dependency.target_module, Path::new(file), &self.project_root)
            else {
                continue;
            };
            let Some(table) = graph.file_symbol_tables.get(target.to_string_lossy().as_ref()) else {
                continue;
            };
            // `import pkg.a` binds `pkg.a.fa()` as written.
            if dependency.import_kind == ImportKind::Import && dependency.imported_symbols.is_empty() {
                scope
                    .modules
                    .entry(dependency.target_module.clone())
                    .or_insert(table);
            }
            if let Some(alias) = &dependency.import_alias {
                scope.modules.insert(alias.clone(), table);
            }
            for (original, alias) in &dependency.symbol_aliases {
                let original = match original.as_str() {
                    DEFAULT_EXPORT => match table.default_export.as_deref() {
                        Some(name) => name,
                        None => continue,
                    },
                    name => name,
                };
                scope
                    .aliased_symbols
                    .insert(alias.clone(), AliasedSymbol { table, original });
            }
        }
        scope
    }

    /// Run the tactic chain for one call site. First success wins.
    pub fn resolve_call(
        &self,
        call: &CallSite,
        strategy: &dyn LanguageStrategy,
        ctx: ResolutionContext<'_>,
    ) -> Option<(SymbolId, Tactic)> {
        let name = call.callee_name.trim();
        if name.is_empty() {
            return None;
        }
        let ctx = ctx.within(call.caller_id.scope_label(ctx.current_file));

        if let Some(id) = resolve_builtin(name, strategy, &ctx) {
            return Some((id, Tactic::Builtin));
        }
        if let Some(local) = ctx.local_symbol(name) {
            return Some((local.id.clone(), Tactic::LocalScope));
        }
        if let Some(symbol) = ctx.file_symbols.get_symbol(name) {
            return Some((symbol.id.clone(), Tactic::FileScope));
        }
        if let Some(id) = resolve_imported(name, &ctx) {
            return Some((id, Tactic::ImportedSymbol));
        }
        if let Some(id) = resolve_member_access(name, strategy, &ctx) {
            return Some((id, Tactic::MemberAccess));
        }
        if let Some(id) = resolve_by_type(name, strategy, &ctx) {
            return Some((id, Tactic::TypeInference));
        }
        None
    }
}

impl fmt::Debug for Resolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("project_root", &self.project_root)
            .field("strategies", &self.strategies)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// `print` → `<builtin>::print`; `console.log` → `<builtin>::console.log`.
///
/// An exact builtin name always wins. A qualified name only counts when
/// its head is not bound in the file: `filter.matches()` on a parameter
/// called `filter` is a member access.
fn resolve_builtin(
    name: &str,
    strategy: &dyn LanguageStrategy,
    ctx: &ResolutionContext<'_>,
) -> Option<SymbolId> {
    if let Some(id) = strategy.builtin_symbol_id(name) {
        return Some(id);
    }
    let (head, _) = name.split_once('.')?;
    let bound = RECEIVER_NAMES.contains(&head)
        || ctx.visible_symbol(head).is_some()
        || ctx.imported_module(head).is_some()
        || ctx.variable_type(head).is_some();
    (!bound && strategy.is_builtin_symbol(head)).then(|| SymbolId::builtin(name))
}

fn resolve_imported(name: &str, ctx: &ResolutionContext<'_>) -> Option<SymbolId> {
    for (module, table) in ctx.imported_symbols {
        if let Some(symbol) = table.get_symbol(name) {
            return Some(symbol.id.clone());
        }
        if module == name {
            return Some(SymbolId::module(&table.file_path));
        }
    }
    ctx.aliased_symbols
        .get(name)
        .and_then(|alias| alias.table.get_symbol(alias.original))
        .map(|symbol| symbol.id.clone())
}

fn resolve_member_access(
    name: &str,
    strategy: &dyn LanguageStrategy,
    ctx: &ResolutionContext<'_>,
) -> Option<SymbolId> {
    if let Some(id) = resolve_module_path(name, strategy, ctx) {
        return Some(id);
    }
    match name.split_once('.') {
        Some((head, member)) => {
            let container = resolve_container(head, strategy, ctx)?;
            member_of(&container, member, strategy, ctx)
                .or_else(|| walk_member_chain(container, member, strategy, ctx))
        }
        // Bare call inside a method: try a sibling member of the class.
        None => {
            let class = enclosing_class(ctx)?;
            member_of(class, name, strategy, ctx)
        }
    }
}

/// `pkg.a.fa` after `import pkg.a`: the longest dotted module path the
/// callee starts with.
fn resolve_module_path(
    name: &str,
    strategy: &dyn LanguageStrategy,
    ctx: &ResolutionContext<'_>,
) -> Option<SymbolId> {
    let mut end = name.len();
    while let Some(dot) = name[..end].rfind('.') {
        let module = &name[..dot];
        if module.contains('.') {
            if let Some(table) = ctx.imported_module(module) {
                let container = Cow::Owned(table.module_symbol());
                let member = &name[dot + 1..];
                return member_of(&container, member, strategy, ctx)
                    .or_else(|| walk_member_chain(container, member, strategy, ctx));
            }
        }
        end = dot;
    }
    None
}

/// The symbol a qualifier refers to, dereferencing values to their class.
fn resolve_container<'a>(
    head: &str,
    strategy: &dyn LanguageStrategy,
    ctx: &ResolutionContext<'a>,
) -> Option<Cow<'a, Symbol>> {
    if RECEIVER_NAMES.contains(&head) {
        return enclosing_class(ctx).map(Cow::Borrowed);
    }
    match ctx.visible_symbol(head) {
        Some(symbol) if symbol.kind.is_container() => Some(Cow::Borrowed(symbol)),
        Some(symbol) if symbol.kind.is_value() => {
            value_type(symbol, Some(head), strategy, ctx).map(Cow::Borrowed)
        }
        Some(_) => None,
        None => ctx
            .imported_module(head)
            .map(|table| Cow::Owned(table.module_symbol())),
    }
}

/// Innermost class enclosing the caller. Functions nested in a method
/// (`Class::method::inner`) still see `Class`.
fn enclosing_class<'a>(ctx: &ResolutionContext<'a>) -> Option<&'a Symbol> {
    scope_chain(ctx.local_scope).skip(1).find_map(|label| {
        let symbol = match label.rsplit_once(ID_SEPARATOR) {
            Some((parent, name)) => ctx.file_symbols.member(parent, name),
            None => ctx.file_symbols.type_symbol(label),
        }?;
        symbol.kind.is_container().then_some(symbol)
    })
}

/// Class symbol of the value held by `symbol`.
fn value_type<'a>(
    symbol: &Symbol,
    name: Option<&str>,
    strategy: &dyn LanguageStrategy,
    ctx: &ResolutionContext<'a>,
) -> Option<&'a Symbol> {
    let type_name = match symbol.declared_type() {
        Some(declared) => declared.to_string(),
        None => strategy.infer_type(name?, ctx).ok()?,
    };
    ctx.find_type_symbol(&type_name)
}

/// Tables `container`'s members may live in, each once.
fn candidate_tables<'a>(container: &Symbol, ctx: &ResolutionContext<'a>) -> Vec<&'a SymbolTable> {
    let owner = ctx.table_of(container);
    if container.id.is_module() {
        return owner.into_iter().collect();
    }
    let mut tables = vec![ctx.file_symbols];
    for table in ctx.imported_symbols.values().copied().chain(owner) {
        if !tables.iter().any(|t| t.file_path == table.file_path) {
            tables.push(table);
        }
    }
    tables
}

fn member_of(
    container: &Symbol,
    member: &str,
    strategy: &dyn LanguageStrategy,
    ctx: &ResolutionContext<'_>,
) -> Option<SymbolId> {
    candidate_tables(container, ctx)
        .into_iter()
        .find_map(|table| strategy.resolve_member_access(container, member, table).ok())
}

/// `a.b.c`: resolve `b` in `a`, take its type, resolve `c` in that.
fn walk_member_chain<'a>(
    container: Cow<'a, Symbol>,
    chain: &str,
    strategy: &dyn LanguageStrategy,
    ctx: &ResolutionContext<'a>,
) -> Option<SymbolId> {
    let segments: Vec<&str> = chain.split('.').collect();
    let (last, path) = segments.split_last()?;
    if path.is_empty() {
        return None;
    }

    let mut current = container;
    for segment in path {
        let id = member_of(&current, segment, strategy, ctx)?;
        let symbol = candidate_tables(&current, ctx)
            .into_iter()
            .find_map(|table| table.find_by_id(&id))?;
        current = if symbol.kind.is_container() {
            Cow::Borrowed(symbol)
        } else if symbol.kind.is_value() {
            Cow::Borrowed(value_type(symbol, None, strategy, ctx)?)
        } else {
            return None;
        };
    }
    member_of(&current, last, strategy, ctx)
}

/// Find a callable named like the callee whose return type, or owning
/// class, matches the inferred type of the receiver.
fn resolve_by_type(
    name: &str,
    strategy: &dyn LanguageStrategy,
    ctx: &ResolutionContext<'_>,
) -> Option<SymbolId> {
    let (subject, target, qualified) = match name.rsplit_once('.') {
        Some((receiver, member)) => (receiver, member, true),
        None => (name, name, false),
    };
    let inferred = strategy.infer_type(subject, ctx).ok()?;
    let wanted = base_type_name(&inferred);
    if wanted.is_empty() && !inferred.is_empty() {
        return None;
    }

    ctx.all_symbol_tables
        .values()
        .flat_map(|table| table.declarations())
        .filter(|symbol| symbol.name == target && symbol.kind.is_callable())
        .find(|symbol| {
            if inferred.is_empty() {
                return true;
            }
            let returns = symbol.metadata.return_type.as_deref().map(base_type_name);
            let owner = symbol.scope.rsplit(ID_SEPARATOR).next();
            returns == Some(wanted) || (qualified && owner == Some(wanted))
        })
        .map(|symbol| symbol.id.clone())
}
