//! Per-table pipeline: introspect, build, extract, merge, render, store.
//!
//! Each table is an independent unit of work. A batch runs tables
//! concurrently up to a worker limit; one table failing never stops the rest.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use domainsmith_core::{CanonicalDomainConfig, IntrospectionError, TableDescriptor, TableRef};
use domainsmith_introspect::{AssociationSet, RelationshipResolver, SchemaIntrospector};

use crate::builder::{BuildContext, build_config};
use crate::errors::{PipelineError, Result};
use crate::extract::extract;
use crate::merge::merge;
use crate::options::GenerateOptions;
use crate::render::render;

/// File name of the artifact generated for `table`.
pub fn artifact_file_name(table: &str) -> String {
    format!("{table}_domain.toml")
}

/// Where prior artifacts are read from and new ones written to.
///
/// `store` must be all-or-nothing: a reader never observes a partially
/// written artifact.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn load(&self, file_name: &str) -> std::io::Result<Option<String>>;
    async fn store(&self, file_name: &str, contents: &str) -> std::io::Result<()>;
}

/// Artifact store kept in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    files: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, file_name: impl Into<String>, contents: impl Into<String>) -> Self {
        self.files
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(file_name.into(), contents.into());
        self
    }

    pub fn get(&self, file_name: &str) -> Option<String> {
        self.files().get(file_name).cloned()
    }

    pub fn file_names(&self) -> Vec<String> {
        self.files().keys().cloned().collect()
    }

    /// Lock the map, recovering it from a holder that panicked.
    fn files(&self) -> MutexGuard<'_, BTreeMap<String, String>> {
        self.files.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl ArtifactStore for MemoryStore {
    async fn load(&self, file_name: &str) -> std::io::Result<Option<String>> {
        Ok(self.get(file_name))
    }

    async fn store(&self, file_name: &str, contents: &str) -> std::io::Result<()> {
        self.files()
            .insert(file_name.to_string(), contents.to_string());
        Ok(())
    }
}

/// Output of one table's run.
#[derive(Debug, Clone)]
pub struct GeneratedDomain {
    pub table: TableRef,
    pub file_name: String,
    pub config: CanonicalDomainConfig,
    pub rendered: String,
    /// Number of customizations carried over from the prior artifact.
    pub preserved: usize,
}

/// Runs the pipeline against one schema source.
#[derive(Clone)]
pub struct DomainGenerator {
    introspector: Arc<dyn SchemaIntrospector>,
    options: Arc<GenerateOptions>,
}

impl DomainGenerator {
    pub fn new(introspector: Arc<dyn SchemaIntrospector>, options: GenerateOptions) -> Self {
        Self {
            introspector,
            options: Arc::new(options),
        }
    }

    pub fn options(&self) -> &GenerateOptions {
        &self.options
    }

    pub fn introspector(&self) -> &dyn SchemaIntrospector {
        self.introspector.as_ref()
    }

    /// Generate one domain from the live schema and the prior artifact text.
    pub async fn generate(
        &self,
        table: &TableRef,
        existing: Option<&str>,
    ) -> Result<GeneratedDomain> {
        let (descriptor, relationships) = self.introspect(table).await?;

        let context = BuildContext {
            render: &self.options.render,
            source_kind: self.introspector.source_kind(),
            expansion_depth: self.options.expansion_depth,
        };
        let generated = build_config(&descriptor, relationships, &context);
        let preserved = extract(existing);
        let preserved_count = preserved.len();
        let config = merge(generated, preserved);
        let rendered = render(&config);

        Ok(GeneratedDomain {
            table: table.clone(),
            file_name: artifact_file_name(&table.table_name),
            config,
            rendered,
            preserved: preserved_count,
        })
    }

    /// Generate one domain, reading and replacing its artifact in `store`.
    pub async fn run_table(
        &self,
        table: &TableRef,
        store: &dyn ArtifactStore,
    ) -> Result<GeneratedDomain> {
        let file_name = artifact_file_name(&table.table_name);
        let existing = store
            .load(&file_name)
            .await
            .map_err(|source| PipelineError::Store {
                file: file_name.clone(),
                source,
            })?;

        let domain = self.generate(table, existing.as_deref()).await?;

        if existing.as_deref() == Some(domain.rendered.as_str()) {
            tracing::info!(event = "domain_unchanged", table = %table, file = %file_name);
            return Ok(domain);
        }

        store
            .store(&file_name, &domain.rendered)
            .await
            .map_err(|source| PipelineError::Store {
                file: file_name.clone(),
                source,
            })?;

        tracing::info!(
            event = "domain_generated",
            table = %table,
            file = %file_name,
            preserved = domain.preserved,
            conflicts = domain.config.conflicts.len()
        );
        Ok(domain)
    }

    /// Run every table with at most `concurrency` tables in flight.
    pub async fn run_batch(
        &self,
        tables: Vec<TableRef>,
        store: Arc<dyn ArtifactStore>,
        concurrency: usize,
    ) -> BatchReport {
        let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
        let mut pending: BTreeSet<String> = BTreeSet::new();
        let mut join_set = JoinSet::new();

        for table in tables {
            pending.insert(table.to_string());
            let generator = self.clone();
            let store = Arc::clone(&store);
            let semaphore = Arc::clone(&semaphore);
            join_set.spawn(async move {
                let result = match semaphore.acquire_owned().await {
                    Ok(_permit) => generator.run_table(&table, store.as_ref()).await,
                    Err(err) => Err(PipelineError::Aborted(err.to_string())),
                };
                (table, result)
            });
        }

        let mut outcomes = Vec::new();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((table, result)) => {
                    pending.remove(&table.to_string());
                    outcomes.push(TableOutcome::from_result(&table, result));
                }
                Err(err) => {
                    tracing::error!(event = "table_task_failed", error = %err);
                }
            }
        }

        // Tasks that panicked or were cancelled never reported their table.
        for table in pending {
            outcomes.push(TableOutcome {
                table,
                status: TableStatus::Failed {
                    error: PipelineError::Aborted("task did not complete".to_string()).to_string(),
                },
            });
        }

        outcomes.sort_by(|left, right| left.table.cmp(&right.table));
        BatchReport { outcomes }
    }

    async fn introspect(&self, table: &TableRef) -> Result<(TableDescriptor, AssociationSet)> {
        let resolve_options = self.options.resolve_options();
        let work = async {
            let descriptor = self.introspector.introspect(table).await?;
            let relationships = RelationshipResolver::new(self.introspector.as_ref(), &resolve_options)
                .resolve(&descriptor)
                .await?;
            Ok::<_, IntrospectionError>((descriptor, relationships))
        };

        let outcome = match self.options.introspect_timeout {
            Some(limit) => tokio::time::timeout(limit, work).await.unwrap_or_else(|_| {
                Err(IntrospectionError::Timeout {
                    table: table.to_string(),
                    seconds: limit.as_secs(),
                })
            }),
            None => work.await,
        };
        outcome.map_err(PipelineError::from)
    }
}

/// Result of one table in a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TableStatus {
    Written {
        file: String,
        preserved: usize,
        conflicts: usize,
    },
    Failed {
        error: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableOutcome {
    pub table: String,
    #[serde(flatten)]
    pub status: TableStatus,
}

impl TableOutcome {
    fn from_result(table: &TableRef, result: Result<GeneratedDomain>) -> Self {
        let status = match result {
            Ok(domain) => TableStatus::Written {
                file: domain.file_name,
                preserved: domain.preserved,
                conflicts: domain.config.conflicts.len(),
            },
            Err(err) => {
                tracing::error!(event = "table_failed", table = %table, error = %err);
                TableStatus::Failed {
                    error: err.to_string(),
                }
            }
        };
        Self {
            table: table.to_string(),
            status,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.status, TableStatus::Written { .. })
    }
}

/// Per-table summary of a batch run, sorted by table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub outcomes: Vec<TableOutcome>,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|outcome| outcome.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    pub fn has_failures(&self) -> bool {
        self.failed() > 0
    }

    pub fn outcome(&self, table: &str) -> Option<&TableOutcome> {
        self.outcomes.iter().find(|outcome| outcome.table == table)
    }
}
