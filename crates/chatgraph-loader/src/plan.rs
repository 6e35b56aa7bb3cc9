//! Load phases and their dependency order.

use chatgraph_dgraph::GraphClient;
use chatgraph_ingest_csv::{read_all, GroupRecord, MessageRecord, StatusRecord, UserRecord};
use std::collections::BTreeMap;
use std::marker::PhantomData;
use thiserror::Error;

use crate::edges::{apply_edges, plan_group_members, plan_message_links, plan_status_links};
use crate::entity::{load_entities, GraphEntity};
use crate::pipeline::LoadContext;
use crate::LoadError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("phase `{0}` is declared twice")]
    DuplicatePhase(&'static str),
    #[error("phase `{phase}` depends on unknown phase `{dependency}`")]
    UnknownDependency {
        phase: &'static str,
        dependency: &'static str,
    },
    #[error("dependency cycle among phases: {}", .phases.join(", "))]
    Cycle { phases: Vec<&'static str> },
}

/// What one phase wrote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PhaseOutcome {
    pub entities: usize,
    pub edges: usize,
}

/// One step of a load.
pub trait Phase<C: GraphClient + ?Sized> {
    fn name(&self) -> &'static str;

    /// Names of phases that must have committed first.
    fn depends_on(&self) -> &'static [&'static str];

    fn run(&self, ctx: &mut LoadContext<'_, C>) -> Result<PhaseOutcome, LoadError>;
}

// ============================================================================
// Standard phases
// ============================================================================

pub const LOAD_USERS: &str = "load users";
pub const LOAD_GROUPS: &str = "load groups";
pub const LINK_GROUP_MEMBERS: &str = "link group members";
pub const LOAD_MESSAGES: &str = "load messages";
pub const LINK_MESSAGES: &str = "link messages";
pub const LOAD_STATUSES: &str = "load statuses";
pub const LINK_STATUSES: &str = "link statuses";

/// Create every entity of one kind and record their uids.
pub struct LoadEntities<T> {
    name: &'static str,
    _kind: PhantomData<fn() -> T>,
}

impl<T> LoadEntities<T> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            _kind: PhantomData,
        }
    }
}

impl<C, T> Phase<C> for LoadEntities<T>
where
    C: GraphClient + ?Sized,
    T: GraphEntity,
{
    fn name(&self) -> &'static str {
        self.name
    }

    fn depends_on(&self) -> &'static [&'static str] {
        &[]
    }

    fn run(&self, ctx: &mut LoadContext<'_, C>) -> Result<PhaseOutcome, LoadError> {
        let records: Vec<T> = read_all(ctx.dataset.path(T::KIND))?;
        let mapping = load_entities(ctx.client, &records)?;
        let entities = mapping.len();
        ctx.table.merge(T::KIND, mapping)?;
        Ok(PhaseOutcome {
            entities,
            edges: 0,
        })
    }
}

pub struct LinkGroupMembers;

impl<C: GraphClient + ?Sized> Phase<C> for LinkGroupMembers {
    fn name(&self) -> &'static str {
        LINK_GROUP_MEMBERS
    }

    fn depends_on(&self) -> &'static [&'static str] {
        &[LOAD_USERS, LOAD_GROUPS]
    }

    fn run(&self, ctx: &mut LoadContext<'_, C>) -> Result<PhaseOutcome, LoadError> {
        let groups: Vec<GroupRecord> = read_all(&ctx.dataset.groups)?;
        let edges = plan_group_members(&groups, &ctx.table)?;
        Ok(PhaseOutcome {
            entities: 0,
            edges: apply_edges(ctx.client, LINK_GROUP_MEMBERS, &edges)?,
        })
    }
}

pub struct LinkMessages;

impl<C: GraphClient + ?Sized> Phase<C> for LinkMessages {
    fn name(&self) -> &'static str {
        LINK_MESSAGES
    }

    fn depends_on(&self) -> &'static [&'static str] {
        &[LOAD_USERS, LOAD_GROUPS, LOAD_MESSAGES]
    }

    fn run(&self, ctx: &mut LoadContext<'_, C>) -> Result<PhaseOutcome, LoadError> {
        let users: Vec<UserRecord> = read_all(&ctx.dataset.users)?;
        let messages: Vec<MessageRecord> = read_all(&ctx.dataset.messages)?;
        let edges = plan_message_links(&users, &messages, &ctx.table)?;
        Ok(PhaseOutcome {
            entities: 0,
            edges: apply_edges(ctx.client, LINK_MESSAGES, &edges)?,
        })
    }
}

pub struct LinkStatuses;

impl<C: GraphClient + ?Sized> Phase<C> for LinkStatuses {
    fn name(&self) -> &'static str {
        LINK_STATUSES
    }

    fn depends_on(&self) -> &'static [&'static str] {
        &[LOAD_USERS, LOAD_STATUSES]
    }

    fn run(&self, ctx: &mut LoadContext<'_, C>) -> Result<PhaseOutcome, LoadError> {
        let users: Vec<UserRecord> = read_all(&ctx.dataset.users)?;
        let statuses: Vec<StatusRecord> = read_all(&ctx.dataset.statuses)?;
        let edges = plan_status_links(&users, &statuses, &ctx.table)?;
        Ok(PhaseOutcome {
            entities: 0,
            edges: apply_edges(ctx.client, LINK_STATUSES, &edges)?,
        })
    }
}

// ============================================================================
// Plan
// ============================================================================

/// A set of phases, run in dependency order.
///
/// Phases with no ordering constraint between them run in the order they were
/// added.
pub struct LoadPlan<C: GraphClient + ?Sized> {
    phases: Vec<Box<dyn Phase<C>>>,
}

impl<C: GraphClient + ?Sized> Default for LoadPlan<C> {
    fn default() -> Self {
        Self { phases: Vec::new() }
    }
}

impl<C: GraphClient + ?Sized> LoadPlan<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// users → groups → group members → messages → message links → statuses
    /// → status links.
    pub fn standard() -> Self {
        Self::new()
            .with_phase(LoadEntities::<UserRecord>::new(LOAD_USERS))
            .with_phase(LoadEntities::<GroupRecord>::new(LOAD_GROUPS))
            .with_phase(LinkGroupMembers)
            .with_phase(LoadEntities::<MessageRecord>::new(LOAD_MESSAGES))
            .with_phase(LinkMessages)
            .with_phase(LoadEntities::<StatusRecord>::new(LOAD_STATUSES))
            .with_phase(LinkStatuses)
    }

    pub fn with_phase(mut self, phase: impl Phase<C> + 'static) -> Self {
        self.phases.push(Box::new(phase));
        self
    }

    pub fn len(&self) -> usize {
        self.phases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phases.is_empty()
    }

    /// Topological order; among ready phases the earliest declared wins.
    pub fn ordered(&self) -> Result<Vec<&dyn Phase<C>>, PlanError> {
        let mut index = BTreeMap::new();
        for (i, phase) in self.phases.iter().enumerate() {
            if index.insert(phase.name(), i).is_some() {
                return Err(PlanError::DuplicatePhase(phase.name()));
            }
        }

        let mut remaining_deps = vec![0usize; self.phases.len()];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); self.phases.len()];
        for (i, phase) in self.phases.iter().enumerate() {
            for dependency in phase.depends_on() {
                let Some(&d) = index.get(dependency) else {
                    return Err(PlanError::UnknownDependency {
                        phase: phase.name(),
                        dependency: *dependency,
                    });
                };
                remaining_deps[i] += 1;
                dependents[d].push(i);
            }
        }

        let mut done = vec![false; self.phases.len()];
        let mut order = Vec::with_capacity(self.phases.len());
        while order.len() < self.phases.len() {
            let next = (0..self.phases.len()).find(|&i| !done[i] && remaining_deps[i] == 0);
            let Some(next) = next else {
                let phases = (0..self.phases.len())
                    .filter(|&i| !done[i])
                    .map(|i| self.phases[i].name())
                    .collect();
                return Err(PlanError::Cycle { phases });
            };
            done[next] = true;
            for &dependent in &dependents[next] {
                remaining_deps[dependent] -= 1;
            }
            order.push(self.phases[next].as_ref());
        }
        Ok(order)
    }

    pub fn ordered_names(&self) -> Result<Vec<&'static str>, PlanError> {
        Ok(self.ordered()?.into_iter().map(|p| p.name()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatgraph_dgraph::MemoryGraph;

    struct Named(&'static str, &'static [&'static str]);

    impl Phase<MemoryGraph> for Named {
        fn name(&self) -> &'static str {
            self.0
        }

        fn depends_on(&self) -> &'static [&'static str] {
            self.1
        }

        fn run(&self, _ctx: &mut LoadContext<'_, MemoryGraph>) -> Result<PhaseOutcome, LoadError> {
            Ok(PhaseOutcome::default())
        }
    }

    #[test]
    fn standard_plan_runs_in_the_documented_order() {
        let plan = LoadPlan::<MemoryGraph>::standard();
        assert_eq!(
            plan.ordered_names().unwrap(),
            vec![
                LOAD_USERS,
                LOAD_GROUPS,
                LINK_GROUP_MEMBERS,
                LOAD_MESSAGES,
                LINK_MESSAGES,
                LOAD_STATUSES,
                LINK_STATUSES,
            ]
        );
    }

    #[test]
    fn dependencies_override_declaration_order() {
        let plan = LoadPlan::<MemoryGraph>::new()
            .with_phase(Named("link", &["b", "a"]))
            .with_phase(Named("b", &["a"]))
            .with_phase(Named("a", &[]));
        assert_eq!(plan.ordered_names().unwrap(), vec!["a", "b", "link"]);
    }

    #[test]
    fn unknown_dependency_is_rejected() {
        let plan = LoadPlan::<MemoryGraph>::new().with_phase(Named("link", &["missing"]));
        assert_eq!(
            plan.ordered_names(),
            Err(PlanError::UnknownDependency {
                phase: "link",
                dependency: "missing"
            })
        );
    }

    #[test]
    fn cycles_and_duplicates_are_rejected() {
        let cyclic = LoadPlan::<MemoryGraph>::new()
            .with_phase(Named("root", &[]))
            .with_phase(Named("a", &["b"]))
            .with_phase(Named("b", &["a"]));
        assert_eq!(
            cyclic.ordered_names(),
            Err(PlanError::Cycle {
                phases: vec!["a", "b"]
            })
        );

        let twice = LoadPlan::<MemoryGraph>::new()
            .with_phase(Named("a", &[]))
            .with_phase(Named("a", &[]));
        assert_eq!(twice.ordered_names(), Err(PlanError::DuplicatePhase("a")));
    }
}
