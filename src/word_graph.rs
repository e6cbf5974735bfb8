//! Search coordinator over a word graph store.
//!
//! [`ArabicWordGraph`] turns search requests into store [`Query`]s, assembles
//! the returned records into a [`ResultSet`] and, for vocalized Arabic
//! queries, narrows the hits down to the words whose stored vocalization is
//! compatible with the query.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::config::{get_shabaka_dir, load_config, save_config, ShabakaConfig};
use crate::db::{Database, FetchedRecords, GraphStore, Query, Selector};
use crate::errors::{Result, ShabakaError};
use crate::graph::ResultSet;
use crate::types::*;
use crate::vocalization::{is_vocalized, is_vocalized_like, strip_tashkeel};

/// Search coordinator. Holds no per-request state, so one instance can serve
/// concurrent requests from several threads.
pub struct ArabicWordGraph<S: GraphStore> {
    store: S,
    config: ShabakaConfig,
}

impl<S: GraphStore> ArabicWordGraph<S> {
    pub fn new(store: S, config: ShabakaConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &ShabakaConfig {
        &self.config
    }

    /// Looks `key` up in a label index.
    ///
    /// Primary results are the records the index lookup hit. Without a
    /// fetch plan or subgraph expansion the store returns the hits
    /// themselves instead of index artifacts.
    pub fn search_index(
        &self,
        key: &str,
        index: LabelIndex,
        limit: usize,
        fetch_plan: FetchPlan,
        expand_subgraph: bool,
    ) -> Result<ResultSet> {
        let key = key.to_string();
        let selector = if fetch_plan.expands() || expand_subgraph {
            Selector::Index { index, key }
        } else {
            Selector::IndexTargets { index, key }
        };
        let query = Query::new(selector)
            .with_limit(limit)
            .with_fetch_plan(fetch_plan)
            .with_subgraph(expand_subgraph);

        let fetched = self.run(&query)?;
        Ok(self.assemble_index_hits(fetched))
    }

    /// Searches Arabic words by surface form.
    ///
    /// Unvocalized queries are a single lookup in the unvocalized label
    /// index. Vocalized queries first look up the stripped form, keep the
    /// hits whose stored label is vocalization-compatible with the query and
    /// fetch those with the requested plan; when no hit is compatible, all
    /// hits are fetched instead.
    pub fn search_arabic(
        &self,
        query: &str,
        expand_subgraph: bool,
        limit: usize,
        fetch_plan: FetchPlan,
    ) -> Result<ResultSet> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(ResultSet::empty());
        }

        if !is_vocalized(query) {
            return self.search_index(
                query,
                LabelIndex::UnvocalizedLabel,
                limit,
                fetch_plan,
                expand_subgraph,
            );
        }

        let stripped = strip_tashkeel(query);
        let narrow = self.search_index(
            &stripped,
            LabelIndex::UnvocalizedLabel,
            limit,
            FetchPlan::depth(1),
            false,
        )?;

        let hits: Vec<(RecordId, bool)> = narrow
            .primary_results()
            .filter_map(|r| r.as_node())
            .map(|node| {
                let compatible =
                    is_vocalized_like(node.label(), query, self.config.ignore_shaddas);
                (node.id(), compatible)
            })
            .collect();

        if hits.is_empty() {
            debug!(query = %query, "no hits for vocalized query");
            return Ok(ResultSet::empty());
        }

        let compatible: Vec<RecordId> = hits
            .iter()
            .filter(|(_, compatible)| *compatible)
            .map(|(id, _)| *id)
            .collect();

        let ids = if compatible.is_empty() {
            info!(
                query = %query,
                hits = hits.len(),
                "no vocalization-compatible hits, falling back to all hits"
            );
            hits.iter().map(|(id, _)| *id).collect()
        } else {
            info!(
                query = %query,
                hits = hits.len(),
                compatible = compatible.len(),
                "filtered hits by vocalization"
            );
            compatible
        };

        self.fetch_records(&ids, expand_subgraph, fetch_plan)
    }

    /// Finds the nodes that translate to `query`.
    ///
    /// The result holds the nodes carrying an information edge to a foreign
    /// node labelled `query`, not the foreign nodes themselves.
    pub fn search_foreign(&self, query: &str) -> Result<ResultSet> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(ResultSet::empty());
        }

        let q = Query::new(Selector::ForeignOrigins {
            label: query.to_string(),
        })
        .with_limit(self.config.default_limit)
        .with_fetch_plan(FetchPlan::NONE);

        let fetched = self.run(&q)?;
        let direct_ids = direct_ids(&fetched, |_| false);
        Ok(ResultSet::new(fetched.direct, fetched.expanded, |r| {
            direct_ids.contains(&r.id)
        }))
    }

    /// Fetches nodes by id. The requested ids are the primary results.
    pub fn get_nodes(&self, ids: &[RecordId], expand_subgraph: bool) -> Result<ResultSet> {
        if ids.is_empty() {
            return Ok(ResultSet::empty());
        }
        let fetch_plan = self.config.fetch_plan_for(expand_subgraph)?;
        self.fetch_records(ids, expand_subgraph, fetch_plan)
    }

    fn fetch_records(
        &self,
        ids: &[RecordId],
        expand_subgraph: bool,
        fetch_plan: FetchPlan,
    ) -> Result<ResultSet> {
        let query = Query::new(Selector::Records(ids.to_vec()))
            .with_limit(ids.len())
            .with_fetch_plan(fetch_plan)
            .with_subgraph(expand_subgraph);

        let fetched = self.run(&query)?;
        let requested: HashSet<RecordId> = ids.iter().copied().collect();
        Ok(ResultSet::new(fetched.direct, fetched.expanded, |r| {
            r.record_id().is_some_and(|id| requested.contains(&id))
        }))
    }

    fn assemble_index_hits(&self, fetched: FetchedRecords) -> ResultSet {
        let direct_ids = direct_ids(&fetched, |r| self.store.is_index_artifact(r));
        ResultSet::with_index_artifacts(
            fetched.direct,
            fetched.expanded,
            |r| self.store.is_index_artifact(r),
            |r| direct_ids.contains(&r.id),
        )
    }

    fn run(&self, query: &Query) -> Result<FetchedRecords> {
        debug!(
            sql = %query.to_sql(),
            limit = query.limit,
            fetch_plan = %query.fetch_plan,
            "issuing query"
        );
        self.store.execute(query)
    }
}

/// Ids of the direct records that are not index artifacts.
fn direct_ids<A>(fetched: &FetchedRecords, is_artifact: A) -> HashSet<String>
where
    A: Fn(&RawRecord) -> bool,
{
    fetched
        .direct
        .iter()
        .filter(|r| !is_artifact(r))
        .map(|r| r.id.clone())
        .collect()
}

// ---------------------------------------------------------------------------
// Projects
// ---------------------------------------------------------------------------

impl ArabicWordGraph<Database> {
    /// Initializes a project at `project_root`: writes the default
    /// configuration and creates an empty database.
    pub fn init(project_root: &Path) -> Result<Self> {
        let config = ShabakaConfig::default();
        save_config(project_root, &config)?;
        let db = Database::initialize(&config.database_path(project_root))?;
        Ok(Self::new(db, config))
    }

    /// Opens an existing project.
    pub fn open(project_root: &Path) -> Result<Self> {
        let config = load_config(project_root)?;
        let db_path = config.database_path(project_root);

        if !db_path.exists() {
            return Err(ShabakaError::Config {
                message: format!(
                    "no word graph database found at '{}'; run 'shabaka init' first",
                    db_path.display()
                ),
            });
        }

        let db = Database::open(&db_path)?;
        Ok(Self::new(db, config))
    }

    /// Returns `true` if a project has been initialized at `project_root`.
    pub fn is_initialized(project_root: &Path) -> bool {
        load_config(project_root)
            .map(|config| config.database_path(project_root).exists())
            .unwrap_or(false)
    }

    /// The project directory holding configuration and database.
    pub fn project_dir(project_root: &Path) -> PathBuf {
        get_shabaka_dir(project_root)
    }
}
