//! "Create all demo data": run a load plan and report what it wrote.

use chatgraph_dgraph::{with_txn, GraphClient, Mutation, Transaction};
use chatgraph_ingest_csv::DataSet;
use serde::Serialize;

use crate::plan::{LoadPlan, PhaseOutcome};
use crate::{LoadError, UidTable};

/// State shared by the phases of one run.
pub struct LoadContext<'a, C: GraphClient + ?Sized> {
    pub client: &'a C,
    pub dataset: &'a DataSet,
    pub table: UidTable,
}

impl<'a, C: GraphClient + ?Sized> LoadContext<'a, C> {
    pub fn new(client: &'a C, dataset: &'a DataSet) -> Self {
        Self {
            client,
            dataset,
            table: UidTable::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadOptions {
    /// On failure, delete every entity committed earlier in the same run
    /// before reporting the error.
    pub compensate: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhaseReport {
    pub name: &'static str,
    pub entities: usize,
    pub edges: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    pub phases: Vec<PhaseReport>,
}

impl LoadReport {
    pub fn entities(&self) -> usize {
        self.phases.iter().map(|p| p.entities).sum()
    }

    pub fn edges(&self) -> usize {
        self.phases.iter().map(|p| p.edges).sum()
    }

    pub fn phase(&self, name: &str) -> Option<&PhaseReport> {
        self.phases.iter().find(|p| p.name == name)
    }
}

/// Load the four CSVs in `dataset` with the standard plan.
///
/// Not idempotent: a second run without a drop-all creates a second copy of
/// every entity.
pub fn create_all<C>(client: &C, dataset: &DataSet, options: LoadOptions) -> Result<LoadReport, LoadError>
where
    C: GraphClient + ?Sized,
{
    dataset.check()?;
    run_plan(client, dataset, &LoadPlan::standard(), options)
}

pub fn run_plan<C>(
    client: &C,
    dataset: &DataSet,
    plan: &LoadPlan<C>,
    options: LoadOptions,
) -> Result<LoadReport, LoadError>
where
    C: GraphClient + ?Sized,
{
    let phases = plan.ordered()?;
    let mut ctx = LoadContext::new(client, dataset);
    let mut report = LoadReport::default();

    for phase in phases {
        let name = phase.name();
        tracing::info!(phase = name, "phase started");

        match phase.run(&mut ctx) {
            Ok(PhaseOutcome { entities, edges }) => {
                tracing::info!(phase = name, entities, edges, "phase committed");
                report.phases.push(PhaseReport {
                    name,
                    entities,
                    edges,
                });
            }
            Err(source) => {
                tracing::warn!(phase = name, error = %source, "phase failed");
                let compensated = if options.compensate {
                    compensate(client, &ctx.table)
                } else {
                    None
                };
                return Err(LoadError::Phase {
                    phase: name,
                    completed: report.phases.iter().map(|p| p.name).collect(),
                    compensated,
                    source: Box::new(source),
                });
            }
        }
    }

    tracing::info!(
        entities = report.entities(),
        edges = report.edges(),
        "all demo data created"
    );
    Ok(report)
}

/// Delete every node recorded in `table` in one transaction.
///
/// Returns the number deleted, or `None` when the cleanup itself failed (the
/// failure is logged; the original error is what gets reported).
fn compensate<C: GraphClient + ?Sized>(client: &C, table: &UidTable) -> Option<usize> {
    let uids = table.all_uids();
    if uids.is_empty() {
        return Some(0);
    }

    tracing::warn!(count = uids.len(), "compensating: deleting entities from this run");
    let deletes = uids.iter().map(|uid| uid.to_ref()).collect();
    let outcome: Result<(), LoadError> = with_txn(client, |txn| {
        txn.mutate(&Mutation::delete(deletes))?;
        Ok(())
    });
    match outcome {
        Ok(()) => Some(uids.len()),
        Err(e) => {
            tracing::warn!(error = %e, "compensation failed; committed data left in place");
            None
        }
    }
}
