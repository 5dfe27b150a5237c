use crate::core::graph::DecompositionError;
use crate::core::graph::interaction::InteractionGraph;
use crate::core::graph::junction_tree::{DecompositionStats, JunctionTree, NodeIndex};
use crate::core::io::solutions::{SolutionCsv, SolutionTable};
use crate::core::io::traits::AssignmentFile;
use crate::core::models::subset::Subset;
use crate::core::models::system::EntitySystem;
use crate::core::scoring::term::ScoringTerm;
use crate::engine::config::InferenceConfig;
use crate::engine::context::InferenceContext;
use crate::engine::error::EngineError;
use crate::engine::filters::{FilterChain, FilterStats};
use crate::engine::potentials::Potentials;
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::state::{NodeStates, Solution};
use crate::engine::tasks;
use crate::engine::tasks::elimination::{NodeStats, NodeTable};
use std::path::Path;
use tracing::{info, instrument, warn};

/// A decomposed problem, ready for inference.
///
/// Building the plan is cheap compared to inference; inspect [`Plan::stats`]
/// to reject or re-decompose a problem whose largest node is too expensive.
#[derive(Debug, Clone)]
pub struct Plan {
    pub graph: InteractionGraph,
    pub tree: JunctionTree,
    pub stats: DecompositionStats,
}

impl Plan {
    /// Builds the interaction graph and decomposes it with the configured heuristic.
    ///
    /// Entity groups coupled by a filter are joined in the graph like a term
    /// support, so some node contains each group and the filter sees it whole.
    #[instrument(skip_all, name = "planning")]
    pub fn new(
        system: &EntitySystem,
        terms: &[Box<dyn ScoringTerm>],
        filters: &FilterChain,
        config: &InferenceConfig,
    ) -> Result<Self, EngineError> {
        let mut graph = InteractionGraph::build(system, terms)?;
        for (_, group) in filters.coupled() {
            graph.add_clique(&group);
        }
        info!(
            entities = graph.num_vertices(),
            interactions = graph.num_edges(),
            "Interaction graph built."
        );
        let tree = JunctionTree::decompose(&graph, system, config.heuristic)?;
        Ok(Self::finish(graph, tree))
    }

    /// Uses a caller-supplied decomposition instead of triangulating.
    ///
    /// Node 0 of `subsets` becomes the root. The tree is verified against
    /// `system`, and every term support and every filter-coupled group must
    /// lie inside one node.
    pub fn from_subsets(
        system: &EntitySystem,
        terms: &[Box<dyn ScoringTerm>],
        filters: &FilterChain,
        subsets: Vec<Subset>,
        edges: &[(NodeIndex, NodeIndex)],
    ) -> Result<Self, EngineError> {
        let mut graph = InteractionGraph::build(system, terms)?;
        let tree = JunctionTree::from_subsets(subsets, edges, system)?;
        if let Some(term) = terms
            .iter()
            .find(|t| !tree.covers(&t.support().iter().copied().collect()))
        {
            return Err(DecompositionError::UncoveredTerm {
                term: term.name().to_string(),
            }
            .into());
        }
        for (filter, group) in filters.coupled() {
            if !tree.covers(&group.iter().copied().collect()) {
                return Err(DecompositionError::UncoveredFilter { filter }.into());
            }
            graph.add_clique(&group);
        }
        Ok(Self::finish(graph, tree))
    }

    fn finish(graph: InteractionGraph, tree: JunctionTree) -> Self {
        let stats = tree.stats();
        info!(
            nodes = stats.nodes,
            max_subset_len = stats.max_subset_len,
            max_separator_len = stats.max_separator_len,
            max_domain_size = %stats.max_domain_size,
            "Junction tree decomposed."
        );
        Self { graph, tree, stats }
    }
}

#[derive(Debug, Clone)]
pub struct OptimizationResult {
    /// Full joint assignments over every entity of the system, best first.
    pub solutions: Vec<Solution>,
    pub stats: DecompositionStats,
    /// Per-node elimination counters, indexed by junction-tree node.
    pub nodes: Vec<NodeStats>,
    pub filters: Vec<FilterStats>,
    /// True when no container discarded a feasible assignment and every
    /// filter was lossless, so `solutions` are the globally best ones.
    pub exact: bool,
}

impl OptimizationResult {
    pub fn best(&self) -> Option<&Solution> {
        self.solutions.first()
    }

    pub fn is_feasible(&self) -> bool {
        !self.solutions.is_empty()
    }

    /// Converts the solutions into a table labelled with entity names.
    pub fn to_table(&self, system: &EntitySystem) -> SolutionTable {
        let entities = self
            .solutions
            .first()
            .map(|s| s.entities.clone())
            .unwrap_or_else(|| system.all_entities());
        SolutionTable::new(
            system,
            &entities,
            self.solutions.iter().map(Solution::to_assignment).collect(),
        )
    }

    pub fn write_csv(&self, system: &EntitySystem, path: &Path) -> Result<(), EngineError> {
        SolutionCsv::write_to_path(&self.to_table(system), path).map_err(|source| {
            EngineError::Csv {
                path: path.to_string_lossy().to_string(),
                source,
            }
        })
    }
}

/// Runs the full pipeline: decomposition, potential assembly, bottom-up
/// elimination and back-tracking.
#[instrument(skip_all, name = "optimization_workflow")]
pub fn run(
    system: &EntitySystem,
    terms: &[Box<dyn ScoringTerm>],
    filters: &FilterChain,
    config: &InferenceConfig,
    reporter: &ProgressReporter,
) -> Result<OptimizationResult, EngineError> {
    // === Phase 1: Decomposition ===
    reporter.report(Progress::PhaseStart {
        name: "Decomposition",
    });
    let plan = Plan::new(system, terms, filters, config)?;
    reporter.report(Progress::PhaseFinish);

    let context = InferenceContext::new(system, config, reporter);
    run_plan(&plan, terms, filters, &context)
}

/// Runs inference over an existing plan.
///
/// The context carries the configuration and, optionally, a starting bound
/// for branch-and-bound filters (see [`InferenceContext::with_bound`]).
#[instrument(skip_all, name = "inference", fields(nodes = plan.tree.len()))]
pub fn run_plan(
    plan: &Plan,
    terms: &[Box<dyn ScoringTerm>],
    filters: &FilterChain,
    context: &InferenceContext<'_>,
) -> Result<OptimizationResult, EngineError> {
    let config = context.config;
    let system = context.system;
    let reporter = context.reporter;
    check_domain_limit(&plan.tree, config)?;

    // === Phase 2: Potential assembly ===
    reporter.report(Progress::PhaseStart {
        name: "Potential Assembly",
    });
    let potentials = Potentials::assemble(
        &plan.tree,
        system,
        terms,
        config.semantics,
        config.table_mode,
    )?;
    reporter.report(Progress::PhaseFinish);

    // === Phase 3: Bottom-up elimination ===
    let tables = eliminate(&plan.tree, &potentials, filters, context)?;

    // === Phase 4: Back-tracking ===
    reporter.report(Progress::PhaseStart {
        name: "Back-tracking",
    });
    let solutions = tasks::backtracking::run(
        &plan.tree,
        &tables,
        &system.all_entities(),
        config.num_solutions,
        config.semantics,
    )?;
    reporter.report(Progress::PhaseFinish);

    let nodes: Vec<NodeStats> = tables.iter().map(|t| t.stats).collect();
    let dropped: usize = nodes.iter().map(|n| n.dropped).sum();
    let exact = dropped == 0 && filters.is_lossless();

    match solutions.first() {
        Some(best) => info!(
            best_score = best.score,
            solutions = solutions.len(),
            exact,
            "Inference complete."
        ),
        None => warn!("No feasible assignment survived the filters."),
    }
    if !exact {
        warn!(
            dropped,
            lossless_filters = filters.is_lossless(),
            "Result is approximate: bounded storage or lossy filters discarded assignments."
        );
    }

    Ok(OptimizationResult {
        solutions,
        stats: plan.stats,
        nodes,
        filters: filters.stats(),
        exact,
    })
}

/// Rejects a tree whose largest node exceeds the configured domain ceiling
/// before any table is allocated.
fn check_domain_limit(tree: &JunctionTree, config: &InferenceConfig) -> Result<(), EngineError> {
    let Some(limit) = config.limits.max_domain_size else {
        return Ok(());
    };
    match tree
        .nodes()
        .iter()
        .enumerate()
        .find(|(_, n)| n.domain_size > limit as u128)
    {
        Some((node, n)) => Err(EngineError::ResourceExhausted {
            node,
            resource: "domain size",
            size: n.domain_size,
            limit: limit as u128,
        }),
        None => Ok(()),
    }
}

fn eliminate(
    tree: &JunctionTree,
    potentials: &Potentials<'_>,
    filters: &FilterChain,
    context: &InferenceContext<'_>,
) -> Result<Vec<NodeTable>, EngineError> {
    let reporter = context.reporter;
    reporter.report(Progress::PhaseStart {
        name: "Elimination",
    });
    reporter.report(Progress::TaskStart {
        total_steps: tree.len() as u64,
    });

    let mut states = NodeStates::new(tree.len());
    let mut tables: Vec<Option<NodeTable>> = (0..tree.len()).map(|_| None).collect();
    for &node in tree.post_order() {
        states.begin(tree, node)?;
        let jnode = &tree.nodes()[node];
        let children = jnode
            .children
            .iter()
            .map(|&c| {
                tables[c].as_ref().ok_or_else(|| {
                    EngineError::Internal(format!("child {} of node {} has no table", c, node))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let bound = filters.bind(&jnode.subset, context);
        let table = tasks::elimination::run(node, tree, potentials, &bound, &children, context)?;
        states.finish(node)?;

        reporter.report(Progress::NodeFinished {
            node,
            domain_size: table.stats.domain_size,
            retained: table.stats.retained,
        });
        reporter.report(Progress::TaskIncrement);
        tables[node] = Some(table);
    }
    reporter.report(Progress::TaskFinish);
    reporter.report(Progress::PhaseFinish);

    if !states.all_done() {
        return Err(EngineError::Internal(
            "post-order traversal skipped a node".to_string(),
        ));
    }
    tables
        .into_iter()
        .enumerate()
        .map(|(node, t)| {
            t.ok_or_else(|| EngineError::Internal(format!("node {} has no table", node)))
        })
        .collect()
}
