use crate::geom::coord::GridCoord;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{HashSet, VecDeque};
use std::fs::File;
use std::io::Write;

const MAX_PLACEMENT_TRIES: usize = 5000;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Tile {
    Free,
    Wall,
    Start(usize),
    End(usize),
}

/// Random maze in the loader's text format. Obstacles are sprinkled with the
/// given density, then nets are placed one by one; every accepted net gets
/// one of its shortest paths carved free so it is solvable on its own.
pub fn generate_maze(
    rows: u32,
    cols: u32,
    num_nets: usize,
    density: f64,
    seed: Option<u64>,
) -> String {
    let mut rng = match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    };
    let rows = rows.max(1);
    let cols = cols.max(1);
    let density = density.clamp(0.0, 1.0);

    let mut tiles = vec![Tile::Free; rows as usize * cols as usize];
    let idx = |c: GridCoord| tile_index(c, cols);

    for t in tiles.iter_mut() {
        if rng.gen_bool(density) {
            *t = Tile::Wall;
        }
    }

    let mut used: HashSet<GridCoord> = HashSet::new();
    let mut nets: Vec<(GridCoord, GridCoord)> = Vec::new();
    let mut tries = 0;
    while nets.len() < num_nets && tries < MAX_PLACEMENT_TRIES {
        tries += 1;
        let s = GridCoord::new(rng.gen_range(0..rows), rng.gen_range(0..cols));
        let e = GridCoord::new(rng.gen_range(0..rows), rng.gen_range(0..cols));
        if s == e || used.contains(&s) || used.contains(&e) {
            continue;
        }

        tiles[idx(s)] = Tile::Free;
        tiles[idx(e)] = Tile::Free;
        if let Some(path) = shortest_free_path(&tiles, rows, cols, s, e) {
            for c in path {
                tiles[idx(c)] = Tile::Free;
            }
            used.insert(s);
            used.insert(e);
            nets.push((s, e));
        }
    }

    if nets.len() < num_nets {
        log::warn!(
            "Placed only {} of {} nets after {} attempts",
            nets.len(),
            num_nets,
            tries
        );
    }

    for (i, &(s, e)) in nets.iter().enumerate() {
        tiles[idx(s)] = Tile::Start(i + 1);
        tiles[idx(e)] = Tile::End(i + 1);
    }

    let mut out = format!("{} {}\n", rows, cols);
    for row in 0..rows {
        for col in 0..cols {
            let token = match tiles[idx(GridCoord::new(row, col))] {
                Tile::Free => ".".to_string(),
                Tile::Wall => "#".to_string(),
                Tile::Start(n) => format!("S{}", n),
                Tile::End(n) => format!("E{}", n),
            };
            out.push(' ');
            out.push_str(&token);
        }
        out.push('\n');
    }
    out
}

pub fn generate_maze_file(
    filename: &str,
    rows: u32,
    cols: u32,
    num_nets: usize,
    density: f64,
    seed: Option<u64>,
) -> std::io::Result<()> {
    log::info!(
        "Generating maze: {}x{}, {} nets, obstacle density {:.0}%",
        rows,
        cols,
        num_nets,
        density * 100.0
    );
    let text = generate_maze(rows, cols, num_nets, density, seed);
    let mut file = File::create(filename)?;
    file.write_all(text.as_bytes())
}

#[inline]
fn tile_index(c: GridCoord, cols: u32) -> usize {
    c.row as usize * cols as usize + c.col as usize
}

// Walls block; terminals already placed for earlier nets do not, since the
// carved path is only there to prove each net is solvable in isolation.
fn shortest_free_path(
    tiles: &[Tile],
    rows: u32,
    cols: u32,
    start: GridCoord,
    end: GridCoord,
) -> Option<Vec<GridCoord>> {
    let idx = |c: GridCoord| tile_index(c, cols);
    let mut parent: Vec<Option<GridCoord>> = vec![None; tiles.len()];
    let mut seen = vec![false; tiles.len()];
    let mut queue = VecDeque::new();
    seen[idx(start)] = true;
    queue.push_back(start);

    while let Some(cur) = queue.pop_front() {
        if cur == end {
            let mut path = vec![cur];
            let mut at = cur;
            while let Some(p) = parent[idx(at)] {
                path.push(p);
                at = p;
            }
            path.reverse();
            return Some(path);
        }
        let candidates = [
            (cur.row > 0).then(|| GridCoord::new(cur.row - 1, cur.col)),
            (cur.row + 1 < rows).then(|| GridCoord::new(cur.row + 1, cur.col)),
            (cur.col > 0).then(|| GridCoord::new(cur.row, cur.col - 1)),
            (cur.col + 1 < cols).then(|| GridCoord::new(cur.row, cur.col + 1)),
        ];
        for n in candidates.into_iter().flatten() {
            let i = idx(n);
            if !seen[i] && tiles[i] != Tile::Wall {
                seen[i] = true;
                parent[i] = Some(cur);
                queue.push_back(n);
            }
        }
    }
    None
}
