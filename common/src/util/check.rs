use crate::db::core::{FAILED_STEPS, Grid};
use crate::db::indices::NetId;
use crate::geom::coord::GridCoord;
use rayon::prelude::*;
use std::collections::{HashSet, VecDeque};

/// Verifies a routed grid against the reported outcomes:
/// - every routed net owns a 4-connected region joining its terminals, at
///   least as large as the reported step count allows;
/// - every failed net owns nothing beyond its two terminals;
/// - no cell is owned by a net the grid does not know.
pub fn run(grid: &Grid, outcomes: &[(NetId, i64)]) -> Result<(), String> {
    log::info!("Starting Routing Verification...");

    let errors: Vec<String> = outcomes
        .par_iter()
        .filter_map(|&(net, steps)| check_net(grid, net, steps).err())
        .collect();

    let mut msgs = errors;
    let foreign = (0..grid.num_cells())
        .filter_map(|i| grid.owner(grid.coord(i)))
        .filter(|net| !grid.nets().contains_key(net))
        .count();
    if foreign > 0 {
        msgs.push(format!("{} cells are owned by unregistered nets", foreign));
    }

    if msgs.is_empty() {
        log::info!("\x1b[32mPASS\x1b[0m: All routed nets are connected and disjoint.");
        Ok(())
    } else {
        for m in &msgs {
            log::error!("\x1b[31mFAIL\x1b[0m: {}", m);
        }
        Err(msgs.join("; "))
    }
}

fn check_net(grid: &Grid, net: NetId, steps: i64) -> Result<(), String> {
    let pins = grid
        .net_pins(net)
        .ok_or_else(|| format!("net {} is not on the grid", net))?;
    let owned: HashSet<GridCoord> = grid.owned_cells(net).into_iter().collect();

    if steps == FAILED_STEPS {
        if owned.len() != 2 {
            return Err(format!(
                "failed net {} owns {} cells instead of its 2 terminals",
                net,
                owned.len()
            ));
        }
        return Ok(());
    }

    let min_steps = pins.start.manhattan(pins.end) as i64 + 1;
    if steps < min_steps || (owned.len() as i64) < steps {
        return Err(format!(
            "net {} reports {} steps but owns {} cells (minimum {})",
            net,
            steps,
            owned.len(),
            min_steps
        ));
    }

    if !connected(&owned, pins.start, pins.end) {
        return Err(format!("net {} is open between {} and {}", net, pins.start, pins.end));
    }
    Ok(())
}

fn connected(owned: &HashSet<GridCoord>, start: GridCoord, end: GridCoord) -> bool {
    let mut seen = HashSet::new();
    let mut queue = VecDeque::new();
    seen.insert(start);
    queue.push_back(start);
    while let Some(c) = queue.pop_front() {
        if c == end {
            return true;
        }
        let around = [
            c.row.checked_sub(1).map(|r| GridCoord::new(r, c.col)),
            Some(GridCoord::new(c.row + 1, c.col)),
            c.col.checked_sub(1).map(|col| GridCoord::new(c.row, col)),
            Some(GridCoord::new(c.row, c.col + 1)),
        ];
        for n in around.into_iter().flatten() {
            if owned.contains(&n) && seen.insert(n) {
                queue.push_back(n);
            }
        }
    }
    false
}
