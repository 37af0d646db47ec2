use crate::algo::PathFinder;
use maze_common::db::core::{Grid, RoutePath};
use maze_common::db::indices::NetId;
use std::collections::BTreeSet;

/// Computes one candidate path per net against the committed grid. Each net
/// is searched in isolation: candidates from the same batch may overlap, and
/// sorting that out is the resolver's job. Nets with no path are left out.
pub fn generate(grid: &Grid, finder: &mut PathFinder, nets: &BTreeSet<NetId>) -> Vec<RoutePath> {
    let mut batch = Vec::with_capacity(nets.len());
    for &net in nets {
        let Some(pins) = grid.net_pins(net) else {
            log::warn!("Net {} has no terminals on this grid, skipping", net);
            continue;
        };
        match finder.find_path(grid, net, pins.start, pins.end) {
            Some(path) => batch.push(path),
            None => log::debug!("Net {}: no candidate against the current grid", net),
        }
    }
    batch
}
