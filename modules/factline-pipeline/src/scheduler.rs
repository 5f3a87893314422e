// Timer-driven stage scheduling. Each stage runs on its own period, but a
// tick only proceeds after atomically acquiring that stage's lease in the
// store — a long run spanning several periods is skipped, not doubled.
// Bare timer callbacks with no overlap guard are exactly the failure mode
// this replaces.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use factline_common::FactlineError;
use factline_store::Store;

use crate::cluster::ClusterStage;
use crate::extract::ExtractStage;
use crate::ingest::IngestStage;
use crate::refine::RefineStage;
use crate::verify::VerifyStage;

/// Stage lease names, shared with the store's lease table.
pub mod stage {
    pub const INGEST: &str = "ingest";
    pub const CLUSTER: &str = "cluster";
    pub const EXTRACT: &str = "extract";
    pub const VERIFY: &str = "verify";
    pub const REFINE: &str = "refine";
}

/// Wall-clock budget for one stage run. On timeout the remainder of the
/// batch is abandoned; items already committed stay committed and the next
/// scheduled run picks up the rest.
const RUN_BUDGET: Duration = Duration::from_secs(240);

/// Delay between consecutive stage kickoffs at startup, so the first
/// ingestion has landed before the first clustering looks for work.
const KICKOFF_STAGGER: Duration = Duration::from_secs(10);

const INGEST_PERIOD: Duration = Duration::from_secs(5 * 60);
const CLUSTER_PERIOD: Duration = Duration::from_secs(10 * 60);
const EXTRACT_PERIOD: Duration = Duration::from_secs(12 * 60);
const VERIFY_PERIOD: Duration = Duration::from_secs(15 * 60);
const REFINE_PERIOD: Duration = Duration::from_secs(20 * 60);

/// One schedulable stage: a lease name plus a single batch run.
#[async_trait]
pub trait StageRun: Send + Sync {
    fn lease_name(&self) -> &'static str;
    async fn run_once(&self) -> Result<()>;
}

#[async_trait]
impl StageRun for IngestStage {
    fn lease_name(&self) -> &'static str {
        stage::INGEST
    }
    async fn run_once(&self) -> Result<()> {
        self.run().await.map(|_| ())
    }
}

#[async_trait]
impl StageRun for ClusterStage {
    fn lease_name(&self) -> &'static str {
        stage::CLUSTER
    }
    async fn run_once(&self) -> Result<()> {
        self.run().await.map(|_| ())
    }
}

#[async_trait]
impl StageRun for ExtractStage {
    fn lease_name(&self) -> &'static str {
        stage::EXTRACT
    }
    async fn run_once(&self) -> Result<()> {
        self.run().await.map(|_| ())
    }
}

#[async_trait]
impl StageRun for VerifyStage {
    fn lease_name(&self) -> &'static str {
        stage::VERIFY
    }
    async fn run_once(&self) -> Result<()> {
        self.run().await.map(|_| ())
    }
}

#[async_trait]
impl StageRun for RefineStage {
    fn lease_name(&self) -> &'static str {
        stage::REFINE
    }
    async fn run_once(&self) -> Result<()> {
        self.run().await.map(|_| ())
    }
}

struct StageLoop {
    stage: Arc<dyn StageRun>,
    period: Duration,
}

/// Owns one timer loop per stage. Periods follow the causal order loosely:
/// ingestion most frequent, verification and refinement least.
pub struct StageScheduler {
    store: Arc<dyn Store>,
    loops: Vec<StageLoop>,
}

impl StageScheduler {
    pub fn new(
        store: Arc<dyn Store>,
        ingest: Arc<IngestStage>,
        cluster: Arc<ClusterStage>,
        extract: Arc<ExtractStage>,
        verify: Arc<VerifyStage>,
        refine: Arc<RefineStage>,
    ) -> Self {
        let loops = vec![
            StageLoop {
                stage: ingest as Arc<dyn StageRun>,
                period: INGEST_PERIOD,
            },
            StageLoop {
                stage: cluster as Arc<dyn StageRun>,
                period: CLUSTER_PERIOD,
            },
            StageLoop {
                stage: extract as Arc<dyn StageRun>,
                period: EXTRACT_PERIOD,
            },
            StageLoop {
                stage: verify as Arc<dyn StageRun>,
                period: VERIFY_PERIOD,
            },
            StageLoop {
                stage: refine as Arc<dyn StageRun>,
                period: REFINE_PERIOD,
            },
        ];
        Self { store, loops }
    }

    /// Run every stage loop until the process is stopped.
    pub async fn run(self) -> Result<()> {
        let StageScheduler { store, loops } = self;
        info!(stages = loops.len(), "Stage scheduler starting");

        let mut tasks: tokio::task::JoinSet<()> = tokio::task::JoinSet::new();
        for (position, stage_loop) in loops.into_iter().enumerate() {
            let store = store.clone();
            tasks.spawn(async move {
                tokio::time::sleep(KICKOFF_STAGGER * position as u32).await;
                let mut ticker = tokio::time::interval(stage_loop.period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    ticker.tick().await;
                    run_leased(store.as_ref(), stage_loop.stage.as_ref(), RUN_BUDGET).await;
                }
            });
        }

        while let Some(joined) = tasks.join_next().await {
            joined.context("Stage loop panicked")?;
        }
        Ok(())
    }

    /// Run a single named stage once (operator path, `--once`). A held
    /// lease surfaces as an error here instead of a silent skip.
    pub async fn tick(&self, stage_name: &str) -> Result<()> {
        let stage_loop = self
            .loops
            .iter()
            .find(|l| l.stage.lease_name() == stage_name)
            .with_context(|| format!("Unknown stage '{stage_name}'"))?;
        match run_leased(self.store.as_ref(), stage_loop.stage.as_ref(), RUN_BUDGET).await {
            TickOutcome::Ran => Ok(()),
            TickOutcome::Skipped => {
                Err(FactlineError::LeaseConflict(stage_name.to_string()).into())
            }
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum TickOutcome {
    Ran,
    Skipped,
}

/// One lease-guarded stage tick. Failures never propagate past the tick —
/// a bad run must not take the scheduler down with it.
pub(crate) async fn run_leased(
    store: &dyn Store,
    stage: &dyn StageRun,
    budget: Duration,
) -> TickOutcome {
    let name = stage.lease_name();

    let acquired = match store.try_acquire_lease(name, Utc::now()).await {
        Ok(acquired) => acquired,
        Err(e) => {
            warn!(stage = name, error = %e, "Lease check failed, skipping tick");
            return TickOutcome::Skipped;
        }
    };
    if !acquired {
        info!(stage = name, "Previous run still holds the lease, skipping tick");
        return TickOutcome::Skipped;
    }

    match tokio::time::timeout(budget, stage.run_once()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(stage = name, error = %e, "Stage run failed"),
        Err(_) => warn!(
            stage = name,
            budget_secs = budget.as_secs(),
            "Stage run exceeded budget, abandoning remainder of batch"
        ),
    }

    if let Err(e) = store.release_lease(name).await {
        warn!(stage = name, error = %e, "Failed to release stage lease");
    }
    TickOutcome::Ran
}
