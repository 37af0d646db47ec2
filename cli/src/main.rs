use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use maze_common::db::core::{Grid, RenderMode};
use maze_common::db::parser::maze;
use maze_common::util::config::{Config, RoutingMode, SearchStrategy};
use maze_common::util::{check, generator, logger, report};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Direct,
    Iterative,
}

impl From<ModeArg> for RoutingMode {
    fn from(m: ModeArg) -> Self {
        match m {
            ModeArg::Direct => RoutingMode::Direct,
            ModeArg::Iterative => RoutingMode::Iterative,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Route every net of a maze and report step counts.
    Route {
        #[arg(long, value_name = "FILE")]
        maze: Option<String>,
        #[arg(long, value_enum)]
        mode: Option<ModeArg>,
        /// Use A* instead of breadth-first search.
        #[arg(long)]
        astar: bool,
        #[arg(long)]
        rounds: Option<usize>,
        /// Solver budget per round, in seconds.
        #[arg(long)]
        time_limit: Option<f64>,
        #[arg(long)]
        threads: Option<usize>,
        /// Print the maze before and after routing.
        #[arg(long)]
        print: bool,
        #[arg(long, value_name = "FILE")]
        report: Option<String>,
    },
    /// Write a random maze whose nets are each solvable on their own.
    Generate {
        #[arg(long)]
        rows: Option<u32>,
        #[arg(long)]
        cols: Option<u32>,
        #[arg(long)]
        nets: Option<usize>,
        #[arg(long)]
        density: Option<f64>,
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long, default_value = "inputs/random_maze.txt")]
        output: String,
    },
}

struct RouteFlags {
    print: bool,
}

fn main() -> anyhow::Result<()> {
    logger::init();
    let args = Args::parse();

    let mut config = if args.config.exists() {
        log::info!("Loading configuration from {:?}", args.config);
        let config_str = std::fs::read_to_string(&args.config)
            .with_context(|| format!("Failed to read config file {:?}", args.config))?;
        toml::from_str(&config_str)
            .map_err(|e| anyhow::anyhow!("Failed to parse config TOML: {}", e))?
    } else {
        log::warn!(
            "Configuration file {:?} not found. Using internal defaults.",
            args.config
        );
        Config::default()
    };

    let command = args.command.unwrap_or(Commands::Route {
        maze: None,
        mode: None,
        astar: false,
        rounds: None,
        time_limit: None,
        threads: None,
        print: false,
        report: None,
    });

    match command {
        Commands::Generate {
            rows,
            cols,
            nets,
            density,
            seed,
            output,
        } => {
            let g = &config.generator;
            let rows = rows.unwrap_or(g.rows);
            let cols = cols.unwrap_or(g.cols);
            let nets = nets.unwrap_or(g.nets);
            let requested = density.unwrap_or(g.density);
            let density = requested.clamp(0.0, 0.9);
            if (density - requested).abs() > f64::EPSILON {
                log::warn!(
                    "Requested density {:.2} is unsafe. Clamped to {:.2}",
                    requested,
                    density
                );
            }

            prepare_output_dir(&output)?;
            log::info!(
                "Generating random maze ({}x{}, Nets: {}, Density: {:.0}%)...",
                rows,
                cols,
                nets,
                density * 100.0
            );
            generator::generate_maze_file(&output, rows, cols, nets, density, seed)?;
            log::info!("Generated: {}", output);
        }
        Commands::Route {
            maze,
            mode,
            astar,
            rounds,
            time_limit,
            threads,
            print,
            report,
        } => {
            if let Some(m) = maze {
                config.input.maze_file = m;
            }
            if let Some(m) = mode {
                config.routing.mode = m.into();
            }
            if astar {
                config.routing.strategy = SearchStrategy::Astar;
            }
            if let Some(r) = rounds {
                config.iterative.max_rounds = r;
            }
            if let Some(t) = time_limit {
                config.iterative.time_limit = t;
            }
            if let Some(t) = threads {
                config.iterative.threads = t;
            }
            if let Some(r) = report {
                config.input.report_file = r;
            }

            if !Path::new(&config.input.maze_file).exists() {
                return Err(anyhow::anyhow!(
                    "Input maze file missing: {}",
                    config.input.maze_file
                ));
            }
            prepare_output_dir(&config.input.report_file)?;

            if let Err(e) = run_routing(&config, RouteFlags { print }) {
                log::error!("{:#}", e);
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

fn prepare_output_dir(path_str: &str) -> anyhow::Result<()> {
    if let Some(parent) = Path::new(path_str).parent() {
        if !parent.exists() && !parent.as_os_str().is_empty() {
            log::info!("Creating output directory: {:?}", parent);
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

fn load_grid(filename: &str) -> anyhow::Result<Grid> {
    log::info!("Parsing maze: {}", filename);
    let grid = maze::parse(filename)
        .map_err(|e| anyhow::anyhow!("Invalid maze in '{}': {}", filename, e))?;
    log::info!(
        "Maze: {}x{} cells, {} nets",
        grid.rows(),
        grid.cols(),
        grid.num_nets()
    );
    Ok(grid)
}

fn run_routing(config: &Config, flags: RouteFlags) -> anyhow::Result<()> {
    let mut grid = load_grid(&config.input.maze_file)?;

    if flags.print {
        println!("Original maze:");
        print!("{}", grid.render(RenderMode::Original));
    }

    log::info!("Starting Routing...");
    let result = maze_router::route(&mut grid, config);

    for (net, outcome) in result.iter() {
        println!("{}", report::format_line(net, outcome.steps()));
    }

    if flags.print {
        println!("Solved maze:");
        print!("{}", grid.render(RenderMode::Solved));
    }

    log::info!("Writing report to {}", config.input.report_file);
    report::write_report(&config.input.report_file, result.step_counts())
        .with_context(|| format!("Failed to write report {}", config.input.report_file))?;

    check::run(&grid, &result.step_counts())
        .map_err(|e| anyhow::anyhow!("Verification Failed: {}", e))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_maze(name: &str, text: &str) -> String {
        let path = std::env::temp_dir().join(format!("maze-cli-{}-{}", std::process::id(), name));
        std::fs::write(&path, text).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn load_errors_name_the_bad_token() {
        let file = write_maze("bad_token.txt", "1 3\nS1 . X");
        let err = load_grid(&file).unwrap_err();
        let msg = format!("{:#}", err);
        assert!(msg.contains("invalid token 'X' at (0, 2)"), "{}", msg);
        assert!(msg.contains(&file), "{}", msg);
        let _ = std::fs::remove_file(&file);
    }

    #[test]
    fn load_errors_name_the_missing_terminal() {
        let file = write_maze("no_end.txt", "2 2\nS1 . . .");
        let msg = format!("{:#}", load_grid(&file).unwrap_err());
        assert!(msg.contains("net 1 is missing its end terminal"), "{}", msg);
        let _ = std::fs::remove_file(&file);
    }

    #[test]
    fn routing_failure_carries_the_loader_error() {
        let file = write_maze("routing_bad.txt", "2 2\nS1 . . .");
        let mut config = Config::default();
        config.input.maze_file = file.clone();
        config.input.report_file = std::env::temp_dir()
            .join(format!("maze-cli-{}-unused-report.txt", std::process::id()))
            .to_string_lossy()
            .into_owned();
        let msg = format!("{:#}", run_routing(&config, RouteFlags { print: false }).unwrap_err());
        assert!(msg.contains("missing its end terminal"), "{}", msg);
        let _ = std::fs::remove_file(&file);
    }
}
