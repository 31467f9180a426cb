//! millpath CLI - plan, post and simulate 3-axis toolpaths from job files.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use millpath_cam::{DefaultStrategy, JobControl, ToolLibrary, Toolpath, ToolpathGenerator};
use millpath_post::{generate_gcode, PostFlavor, Units};
use millpath_stocksim::StockGrid;
use tracing::info;

mod job;

use job::Job;

#[derive(Parser)]
#[command(name = "millpath")]
#[command(about = "3-axis CNC toolpath planner", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Plan a job and write G-code
    Generate {
        /// Job file (.json or .toml)
        job: PathBuf,
        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Post flavor
        #[arg(long, default_value = "grbl")]
        post: PostFlavor,
        /// Emit inches instead of millimeters
        #[arg(long)]
        inches: bool,
        /// Also write the planned toolpath as JSON
        #[arg(long)]
        json_toolpath: Option<PathBuf>,
        #[command(flatten)]
        tool: ToolArgs,
    },
    /// Plan a job and report stock left against the part surface
    Simulate {
        /// Job file (.json or .toml)
        job: PathBuf,
        /// Voxel edge length (mm)
        #[arg(long, default_value_t = 0.5)]
        cell_size: f64,
        /// Include per-column samples in the report
        #[arg(long)]
        samples: bool,
        #[command(flatten)]
        tool: ToolArgs,
    },
    /// List the tools in a tool library
    Tools {
        /// Tool library (.json)
        library: PathBuf,
        /// Show diameters in inches
        #[arg(long)]
        inches: bool,
    },
    /// List the available post flavors
    Flavors,
}

/// Pick the cutter from a tool library instead of the job file.
#[derive(Args, Debug, Default)]
struct ToolArgs {
    /// Tool library (.json)
    #[arg(long, requires = "tool")]
    tool_library: Option<PathBuf>,
    /// Tool id to use from the library
    #[arg(long, requires = "tool_library")]
    tool: Option<String>,
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    match cli.command {
        Commands::Generate {
            job,
            output,
            post,
            inches,
            json_toolpath,
            tool,
        } => {
            let units = if inches { Units::Inches } else { Units::Millimeters };
            let job = load_job(&job, &tool)?;
            generate(&job, output.as_deref(), post, units, json_toolpath.as_deref())?;
        }
        Commands::Simulate {
            job,
            cell_size,
            samples,
            tool,
        } => {
            let job = load_job(&job, &tool)?;
            simulate(&job, cell_size, samples)?;
        }
        Commands::Tools { library, inches } => {
            let library = ToolLibrary::load(&library)?;
            for tool in library.tools() {
                println!("{:<12} {}", tool.id, tool.display_label(inches));
            }
        }
        Commands::Flavors => {
            for flavor in PostFlavor::ALL {
                let config = flavor.config();
                println!(
                    "{:<12} {:<12} arcs={} spindle={}",
                    flavor.id(),
                    config.name,
                    config.supports_arcs,
                    config.spindle_supported
                );
            }
        }
    }

    Ok(())
}

/// Log to stderr so G-code on stdout stays clean. `RUST_LOG` overrides
/// the default `info` level.
fn init_logging() {
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(io::stderr).with_target(true))
        .init();
}

fn load_job(path: &Path, tool: &ToolArgs) -> Result<Job> {
    let mut job = Job::load(path)?;
    if let (Some(library_path), Some(id)) = (&tool.tool_library, &tool.tool) {
        let library = ToolLibrary::load(library_path)?;
        let selected = library
            .tool_by_id(id)
            .ok_or_else(|| anyhow!("tool id {id:?} not found in {}", library_path.display()))?;
        job.apply_tool(selected);
    }
    Ok(job)
}

fn plan(job: &Job) -> Result<Toolpath> {
    ToolpathGenerator::default()
        .generate(&job.mesh, &job.params, &DefaultStrategy, &JobControl::new())
        .context("toolpath generation failed")
}

fn generate(
    job: &Job,
    output: Option<&Path>,
    flavor: PostFlavor,
    units: Units,
    json_toolpath: Option<&Path>,
) -> Result<()> {
    let toolpath = plan(job)?;

    if let Some(json_path) = json_toolpath {
        let json = serde_json::to_string_pretty(&toolpath)?;
        fs::write(json_path, json)
            .with_context(|| format!("failed to write {}", json_path.display()))?;
        info!(path = %json_path.display(), "toolpath written");
    }

    let gcode = generate_gcode(&toolpath, flavor, units, &job.params.post);
    match output {
        Some(out) => {
            fs::write(out, &gcode).with_context(|| format!("failed to write {}", out.display()))?;
            info!(path = %out.display(), post = %flavor, %units, "G-code written");
        }
        None => io::stdout().write_all(gcode.as_bytes())?,
    }
    Ok(())
}

fn simulate(job: &Job, cell_size: f64, samples: bool) -> Result<()> {
    let toolpath = plan(job)?;

    let mut grid = StockGrid::new(&job.mesh, cell_size, job.params.stock.margin)
        .context("failed to build stock grid")?;
    grid.subtract_toolpath(&toolpath, &job.params);
    let mut summary = grid.summarize();
    if !samples {
        summary.samples.clear();
    }
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_generate_flags() {
        let cli = Cli::try_parse_from([
            "millpath", "generate", "job.toml", "-o", "out.nc", "--post", "heidenhain", "--inches",
        ])
        .unwrap();
        match cli.command {
            Commands::Generate {
                output, post, inches, ..
            } => {
                assert_eq!(output, Some(PathBuf::from("out.nc")));
                assert_eq!(post, PostFlavor::Heidenhain);
                assert!(inches);
            }
            _ => panic!("expected generate"),
        }
        assert!(Cli::try_parse_from(["millpath", "generate", "job.toml", "--post", "haas"]).is_err());
    }

    #[test]
    fn test_tool_flags_come_in_pairs() {
        let cli = Cli::try_parse_from([
            "millpath", "simulate", "job.json", "--tool-library", "tools.json", "--tool", "FEM-6",
        ])
        .unwrap();
        match cli.command {
            Commands::Simulate { tool, .. } => {
                assert_eq!(tool.tool_library, Some(PathBuf::from("tools.json")));
                assert_eq!(tool.tool.as_deref(), Some("FEM-6"));
            }
            _ => panic!("expected simulate"),
        }
        assert!(Cli::try_parse_from(["millpath", "generate", "job.json", "--tool", "FEM-6"]).is_err());
        assert!(Cli::try_parse_from(["millpath", "simulate", "job.json", "--tool-library", "t.json"]).is_err());
    }

    #[test]
    fn test_load_job_with_library_tool() {
        let dir = std::env::temp_dir().join(format!("millpath-cli-tools-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let job_path = dir.join("job.json");
        let library_path = dir.join("tools.json");
        fs::write(
            &job_path,
            r#"{ "mesh": { "positions": [0,0,0, 20,0,0, 20,20,0], "indices": [0,1,2] },
                 "params": { "step_over": 1.0 } }"#,
        )
        .unwrap();
        fs::write(
            &library_path,
            r#"{ "tools": [ { "id": "FEM-8", "name": "8mm Flat", "type": "flat", "diameter_mm": 8.0 } ] }"#,
        )
        .unwrap();

        let args = ToolArgs {
            tool_library: Some(library_path.clone()),
            tool: Some("fem-8".into()),
        };
        let job = load_job(&job_path, &args).unwrap();
        assert_eq!(job.params.tool_diameter, 8.0);
        assert_eq!(job.params.step_over, 1.0);
        assert_eq!(job.params.max_depth_per_pass, 4.0);

        let missing = ToolArgs {
            tool_library: Some(library_path),
            tool: Some("BN-1".into()),
        };
        assert!(load_job(&job_path, &missing).unwrap_err().to_string().contains("not found"));
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_plan_and_post_plate_job() {
        let text = r#"{
            "mesh": { "positions": [0,0,0, 20,0,0, 20,20,0, 0,20,0], "indices": [0,1,2, 0,2,3] },
            "params": { "stock": { "top_z": 2.0 }, "enable_rough_pass": false }
        }"#;
        let job = Job::parse(text, "json").unwrap();
        let toolpath = plan(&job).unwrap();
        assert!(toolpath.cut_count() > 0);
        let gcode = generate_gcode(&toolpath, PostFlavor::Grbl, Units::Millimeters, &job.params.post);
        let last = gcode.lines().last().unwrap();
        assert_eq!(last, "M2");
        assert!(gcode.starts_with("(millpath - GRBL Post)"));
    }
}
