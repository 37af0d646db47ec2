pub mod algo;
pub mod candidates;
pub mod controller;
pub mod grid;
pub mod resolver;

pub use controller::{IterativeOptions, NetOutcome, RoutingResult, route_direct, route_iterative};

use maze_common::db::core::Grid;
use maze_common::util::config::{Config, RoutingMode};
use resolver::ResolverConfig;
use std::time::Duration;

pub fn route(grid: &mut Grid, config: &Config) -> RoutingResult {
    match config.routing.mode {
        RoutingMode::Direct => route_direct(grid, config.routing.strategy),
        RoutingMode::Iterative => {
            let options = IterativeOptions {
                max_rounds: config.iterative.max_rounds,
                strategy: config.routing.strategy,
                resolver: ResolverConfig {
                    time_limit: Duration::from_secs_f64(
                        config.iterative.time_limit.max(0.0).min(1e9),
                    ),
                    threads: config.iterative.threads,
                    suboptimal: config.iterative.suboptimal,
                },
            };
            route_iterative(grid, &options)
        }
    }
}
