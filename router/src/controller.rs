use crate::algo::{PathFinder, SearchStrategy};
use crate::candidates;
use crate::resolver::model::MipBackend;
use crate::resolver::{ConflictResolver, ResolverConfig};
use maze_common::db::core::{FAILED_STEPS, Grid, RoutePath};
use maze_common::db::indices::NetId;
use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NetOutcome {
    Routed { steps: usize },
    Failed,
}

impl NetOutcome {
    /// Step count, or `-1` for a failed net.
    pub fn steps(&self) -> i64 {
        match self {
            NetOutcome::Routed { steps } => *steps as i64,
            NetOutcome::Failed => FAILED_STEPS,
        }
    }

    pub fn is_routed(&self) -> bool {
        matches!(self, NetOutcome::Routed { .. })
    }
}

/// Outcome of every net on the grid, keyed by net id.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RoutingResult {
    outcomes: BTreeMap<NetId, NetOutcome>,
    rounds_run: usize,
}

impl RoutingResult {
    pub fn get(&self, net: NetId) -> Option<NetOutcome> {
        self.outcomes.get(&net).copied()
    }

    pub fn steps(&self, net: NetId) -> Option<i64> {
        self.get(net).map(|o| o.steps())
    }

    pub fn iter(&self) -> impl Iterator<Item = (NetId, NetOutcome)> + '_ {
        self.outcomes.iter().map(|(&n, &o)| (n, o))
    }

    /// `(net, steps)` pairs with the `-1` sentinel for failures.
    pub fn step_counts(&self) -> Vec<(NetId, i64)> {
        self.iter().map(|(n, o)| (n, o.steps())).collect()
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn routed_count(&self) -> usize {
        self.outcomes.values().filter(|o| o.is_routed()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.len() - self.routed_count()
    }

    pub fn total_steps(&self) -> usize {
        self.outcomes
            .values()
            .map(|o| match o {
                NetOutcome::Routed { steps } => *steps,
                NetOutcome::Failed => 0,
            })
            .sum()
    }

    /// Rounds started by iterative mode; zero for direct mode.
    pub fn rounds_run(&self) -> usize {
        self.rounds_run
    }

    fn record(&mut self, net: NetId, outcome: NetOutcome) {
        self.outcomes.insert(net, outcome);
    }
}

#[derive(Clone, Copy, Debug)]
pub struct IterativeOptions {
    pub max_rounds: usize,
    pub strategy: SearchStrategy,
    pub resolver: ResolverConfig,
}

impl Default for IterativeOptions {
    fn default() -> Self {
        Self {
            max_rounds: 1,
            strategy: SearchStrategy::Bfs,
            resolver: ResolverConfig::default(),
        }
    }
}

/// Greedy routing in net-id order. Each net is searched against the grid as
/// left by the nets before it and committed right away, so earlier nets can
/// block later ones for good.
pub fn route_direct(grid: &mut Grid, strategy: SearchStrategy) -> RoutingResult {
    log::info!(
        "Direct routing of {} nets ({:?})...",
        grid.num_nets(),
        strategy
    );
    let start = Instant::now();
    let mut finder = PathFinder::new(strategy);
    let mut result = RoutingResult::default();

    let nets: Vec<NetId> = grid.net_ids().collect();
    for net in nets {
        let Some(pins) = grid.net_pins(net) else {
            continue;
        };
        let outcome = match finder.find_path(&*grid, net, pins.start, pins.end) {
            Some(path) => commit(grid, &path),
            None => {
                log::debug!("Net {}: unreachable", net);
                NetOutcome::Failed
            }
        };
        result.record(net, outcome);
    }

    log::info!(
        "Direct routing done: {} routed, {} failed, {} total steps, {}ms",
        result.routed_count(),
        result.failed_count(),
        result.total_steps(),
        start.elapsed().as_millis()
    );
    result
}

/// Round-based routing with the bundled conflict resolver.
pub fn route_iterative(grid: &mut Grid, options: &IterativeOptions) -> RoutingResult {
    let resolver = ConflictResolver::new(options.resolver);
    route_iterative_with(grid, options, &resolver)
}

/// Each round: candidates for every remaining net against the committed grid,
/// a conflict-free maximum subset from `resolver`, then commit that subset.
/// Stops when the round budget is spent or a round makes no selection; nets
/// still remaining are failures.
pub fn route_iterative_with<B: MipBackend>(
    grid: &mut Grid,
    options: &IterativeOptions,
    resolver: &ConflictResolver<B>,
) -> RoutingResult {
    log::info!(
        "Iterative routing of {} nets (max {} rounds, {:?}, solver {:.1}s x {} threads)...",
        grid.num_nets(),
        options.max_rounds,
        options.strategy,
        resolver.config().time_limit.as_secs_f64(),
        resolver.config().threads
    );
    let mut finder = PathFinder::new(options.strategy);
    let mut result = RoutingResult::default();
    let mut remaining: BTreeSet<NetId> = grid.net_ids().collect();

    while result.rounds_run < options.max_rounds && !remaining.is_empty() {
        let round = result.rounds_run;
        result.rounds_run += 1;
        let start = Instant::now();

        let batch = candidates::generate(grid, &mut finder, &remaining);
        if batch.is_empty() {
            log::info!("Round {}: no candidates left, stopping", round);
            break;
        }

        let picked = resolver.resolve(&batch);
        if picked.is_empty() {
            log::info!(
                "Round {}: resolver selected nothing from {} candidates, stopping",
                round,
                batch.len()
            );
            break;
        }

        let mut committed = 0;
        for &i in &picked {
            let path = &batch[i];
            let outcome = commit(grid, path);
            if outcome.is_routed() {
                result.record(path.net, outcome);
                remaining.remove(&path.net);
                committed += 1;
            }
        }

        log::info!(
            "Round {}: candidates: {}, committed: {}, remaining: {}, time: {}ms",
            round,
            batch.len(),
            committed,
            remaining.len(),
            start.elapsed().as_millis()
        );
    }

    for net in remaining {
        result.record(net, NetOutcome::Failed);
    }

    log::info!(
        "Iterative routing done after {} rounds: {} routed, {} failed, {} total steps",
        result.rounds_run,
        result.routed_count(),
        result.failed_count(),
        result.total_steps()
    );
    result
}

fn commit(grid: &mut Grid, path: &RoutePath) -> NetOutcome {
    match grid.commit(path) {
        Ok(()) => {
            log::debug!("Net {}: committed {} cells", path.net, path.steps());
            NetOutcome::Routed {
                steps: path.steps(),
            }
        }
        Err(e) => {
            log::error!("Net {}: commit rejected: {}", path.net, e);
            NetOutcome::Failed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use maze_common::db::parser::maze;

    #[test]
    fn outcome_sentinel() {
        assert_eq!(NetOutcome::Failed.steps(), -1);
        assert_eq!(NetOutcome::Failed.steps(), FAILED_STEPS);
        assert_eq!(NetOutcome::Routed { steps: 4 }.steps(), 4);
    }

    #[test]
    fn zero_round_budget_fails_everything() {
        let mut grid = maze::parse_str("1 3\nS1 . E1").unwrap();
        let options = IterativeOptions {
            max_rounds: 0,
            ..IterativeOptions::default()
        };
        let result = route_iterative(&mut grid, &options);
        assert_eq!(result.steps(NetId::new(1)), Some(-1));
        assert_eq!(result.rounds_run(), 0);
    }

    #[test]
    fn empty_grid_has_empty_result() {
        let mut grid = maze::parse_str("2 2\n. . . .").unwrap();
        assert!(route_direct(&mut grid, SearchStrategy::Astar).is_empty());
        assert!(route_iterative(&mut grid, &IterativeOptions::default()).is_empty());
    }

    #[test]
    fn summary_counts() {
        let mut grid = maze::parse_str("2 3\nS1 . E1\nS2 # E2").unwrap();
        let result = route_direct(&mut grid, SearchStrategy::Bfs);
        assert_eq!(result.routed_count(), 1);
        assert_eq!(result.failed_count(), 1);
        assert_eq!(result.total_steps(), 3);
        assert_eq!(
            result.step_counts(),
            vec![(NetId::new(1), 3), (NetId::new(2), -1)]
        );
    }
}
