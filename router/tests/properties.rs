use maze_common::db::core::{Grid, RoutePath};
use maze_common::db::indices::NetId;
use maze_common::db::parser::maze;
use maze_common::geom::coord::GridCoord;
use maze_common::util::check;
use maze_common::util::generator::generate_maze;
use maze_router::algo::{PathFinder, SearchStrategy};
use maze_router::candidates;
use maze_router::resolver::{ConflictResolver, ResolverConfig};
use maze_router::{IterativeOptions, route_direct, route_iterative};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{BTreeSet, HashSet};

fn random_grid(seed: u64, nets: usize) -> Grid {
    let mut rng = StdRng::seed_from_u64(seed);
    let rows = rng.gen_range(2..12);
    let cols = rng.gen_range(2..12);
    let density = rng.gen_range(0.0..0.35);
    maze::parse_str(&generate_maze(rows, cols, nets, density, Some(seed))).unwrap()
}

fn disjoint<'a>(paths: impl IntoIterator<Item = &'a RoutePath>) -> bool {
    let mut seen = HashSet::new();
    paths
        .into_iter()
        .flat_map(|p| p.cells.iter())
        .all(|c| seen.insert(*c))
}

#[test]
fn open_grid_paths_have_manhattan_length() {
    let mut rng = StdRng::seed_from_u64(11);
    for _ in 0..100 {
        let rows = rng.gen_range(1..10);
        let cols = rng.gen_range(2..10);
        let s = GridCoord::new(rng.gen_range(0..rows), rng.gen_range(0..cols));
        let e = GridCoord::new(rng.gen_range(0..rows), rng.gen_range(0..cols));
        if s == e {
            continue;
        }
        let net = NetId::new(1);
        let grid = Grid::with_nets(rows, cols, &[], &[(net, s, e)]).unwrap();
        for strategy in [SearchStrategy::Bfs, SearchStrategy::Astar] {
            let path = PathFinder::new(strategy).find_path(&grid, net, s, e).unwrap();
            assert_eq!(path.steps() as u32, s.manhattan(e) + 1);
            assert!(path.is_contiguous());
        }
    }
}

#[test]
fn bfs_and_astar_agree_on_length() {
    let mut bfs = PathFinder::new(SearchStrategy::Bfs);
    let mut astar = PathFinder::new(SearchStrategy::Astar);
    for seed in 0..150 {
        let grid = random_grid(seed, 4);
        for (&net, pins) in grid.nets() {
            let a = bfs.find_path(&grid, net, pins.start, pins.end);
            let b = astar.find_path(&grid, net, pins.start, pins.end);
            assert_eq!(
                a.as_ref().map(|p| p.steps()),
                b.as_ref().map(|p| p.steps()),
                "seed {} net {}",
                seed,
                net
            );
            for path in a.iter().chain(b.iter()) {
                assert!(path.is_contiguous());
                assert_eq!(path.cells.first(), Some(&pins.start));
                assert_eq!(path.cells.last(), Some(&pins.end));
                assert!(path.cells.iter().all(|&c| !grid.is_obstacle(c)));
            }
        }
    }
}

#[test]
fn direct_mode_never_reassigns_cells() {
    for seed in 0..60 {
        let mut grid = random_grid(seed, 6);
        let before = grid.clone();
        let result = route_direct(&mut grid, SearchStrategy::Bfs);

        assert_eq!(result.len(), grid.num_nets());
        for i in 0..grid.num_cells() {
            let c = grid.coord(i);
            if let Some(owner) = before.owner(c) {
                assert_eq!(grid.owner(c), Some(owner), "seed {}", seed);
            }
        }
        check::run(&grid, &result.step_counts()).unwrap();
    }
}

#[test]
fn resolver_selection_is_disjoint_and_maximum() {
    let resolver = ConflictResolver::new(ResolverConfig::default());
    let mut finder = PathFinder::new(SearchStrategy::Bfs);
    for seed in 0..60 {
        let grid = random_grid(seed, 8);
        let nets: BTreeSet<NetId> = grid.net_ids().collect();
        let batch = candidates::generate(&grid, &mut finder, &nets);
        let picked = resolver.resolve(&batch);
        assert!(disjoint(picked.iter().map(|&i| &batch[i])), "seed {}", seed);

        let best = (0u32..1 << batch.len())
            .filter(|mask| {
                disjoint(
                    batch
                        .iter()
                        .enumerate()
                        .filter(|(i, _)| mask >> i & 1 == 1)
                        .map(|(_, p)| p),
                )
            })
            .map(|mask| mask.count_ones() as usize)
            .max()
            .unwrap_or(0);
        assert_eq!(picked.len(), best, "seed {}", seed);
    }
}

#[test]
fn iterative_mode_is_monotone_in_round_budget() {
    for seed in 0..40 {
        let base = random_grid(seed, 8);
        let mut previous = 0;
        for rounds in 0..4 {
            let mut grid = base.clone();
            let options = IterativeOptions {
                max_rounds: rounds,
                ..IterativeOptions::default()
            };
            let result = route_iterative(&mut grid, &options);

            assert!(result.rounds_run() <= rounds);
            assert_eq!(result.len(), grid.num_nets());
            assert!(result.routed_count() >= previous, "seed {}", seed);
            previous = result.routed_count();
            check::run(&grid, &result.step_counts()).unwrap();
        }
    }
}

#[test]
fn parallel_resolver_matches_sequential() {
    for seed in 0..30 {
        let base = random_grid(seed, 8);
        let run = |threads: usize| {
            let mut grid = base.clone();
            let options = IterativeOptions {
                max_rounds: 3,
                strategy: SearchStrategy::Astar,
                resolver: ResolverConfig {
                    threads,
                    ..ResolverConfig::default()
                },
            };
            route_iterative(&mut grid, &options)
        };
        assert_eq!(run(1), run(4), "seed {}", seed);
    }
}
