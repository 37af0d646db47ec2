use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub routing: RoutingConfig,
    #[serde(default)]
    pub iterative: IterativeConfig,
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub generator: GeneratorConfig,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoutingMode {
    #[default]
    Direct,
    Iterative,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchStrategy {
    /// Unweighted breadth-first search.
    #[default]
    Bfs,
    /// Best-first search ordered by steps so far plus Manhattan distance.
    Astar,
}

/// What the conflict resolver does with a selection that was still being
/// improved when its time budget ran out.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuboptimalPolicy {
    #[default]
    Accept,
    Discard,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct RoutingConfig {
    #[serde(default)]
    pub mode: RoutingMode,
    #[serde(default)]
    pub strategy: SearchStrategy,
}

#[derive(Clone, Debug, Deserialize)]
pub struct IterativeConfig {
    #[serde(default = "default_max_rounds")]
    pub max_rounds: usize,
    #[serde(default = "default_time_limit")]
    pub time_limit: f64,
    #[serde(default = "default_threads")]
    pub threads: usize,
    #[serde(default)]
    pub suboptimal: SuboptimalPolicy,
}

impl Default for IterativeConfig {
    fn default() -> Self {
        Self {
            max_rounds: default_max_rounds(),
            time_limit: default_time_limit(),
            threads: default_threads(),
            suboptimal: SuboptimalPolicy::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct InputConfig {
    #[serde(default = "default_maze_file")]
    pub maze_file: String,
    #[serde(default = "default_report_file")]
    pub report_file: String,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            maze_file: default_maze_file(),
            report_file: default_report_file(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct GeneratorConfig {
    #[serde(default = "default_gen_rows")]
    pub rows: u32,
    #[serde(default = "default_gen_cols")]
    pub cols: u32,
    #[serde(default = "default_gen_nets")]
    pub nets: usize,
    #[serde(default = "default_gen_density")]
    pub density: f64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            rows: default_gen_rows(),
            cols: default_gen_cols(),
            nets: default_gen_nets(),
            density: default_gen_density(),
        }
    }
}

fn default_max_rounds() -> usize {
    1
}

fn default_time_limit() -> f64 {
    30.0
}

fn default_threads() -> usize {
    1
}

fn default_maze_file() -> String {
    "inputs/maze.txt".to_string()
}

fn default_report_file() -> String {
    "output/routing_results.txt".to_string()
}

fn default_gen_rows() -> u32 {
    20
}

fn default_gen_cols() -> u32 {
    20
}

fn default_gen_nets() -> usize {
    10
}

fn default_gen_density() -> f64 {
    0.2
}
