use crate::generator::{ProjectScaffolder, ScaffoldOptions, DEFAULT_BASE_DIR, DEFAULT_PROJECT_NAME};
use clap::error::ErrorKind;
use clap::Parser;
use std::ffi::OsString;
use std::path::PathBuf;

/// Generate a service skeleton from an OpenAPI specification
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(name = "openapi-glue-gen", version, about, long_about = None)]
pub struct Cli {
    /// Name of the generated project
    #[arg(short = 'p', long, default_value = DEFAULT_PROJECT_NAME)]
    pub project_name: String,

    /// Directory the project is created in
    #[arg(short = 'b', long, default_value = DEFAULT_BASE_DIR)]
    pub base_dir: PathBuf,

    /// Print a checksum manifest instead of writing files
    #[arg(short = 'c', long, default_value_t = false)]
    pub checksum_only: bool,

    /// Depend on this checkout of openapi-glue instead of the registry release
    #[arg(short = 'l', long, default_value_t = false)]
    pub local_plugin: bool,

    /// Path to the OpenAPI specification file (YAML or JSON)
    pub specification: PathBuf,
}

/// What a successful run produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliOutput {
    /// Pretty JSON checksum manifest
    Manifest(String),
    /// Directory the project was written to
    Project(PathBuf),
}

pub fn run_cli(cli: &Cli) -> anyhow::Result<CliOutput> {
    let options = ScaffoldOptions {
        project_name: cli.project_name.clone(),
        base_dir: cli.base_dir.clone(),
        local_plugin: cli.local_plugin,
    };
    let scaffolder = ProjectScaffolder::new(cli.specification.as_path(), options)?;
    if cli.checksum_only {
        let manifest = scaffolder.checksums()?;
        return Ok(CliOutput::Manifest(serde_json::to_string_pretty(&manifest)?));
    }
    Ok(CliOutput::Project(scaffolder.write()?))
}

/// Parse `args`, run, print the outcome and return the exit code.
pub fn main_with_args<I, T>(args: I) -> i32
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            print!("{e}");
            return 0;
        }
        Err(e) => {
            print!("{e}");
            return 1;
        }
    };
    match run_cli(&cli) {
        Ok(CliOutput::Manifest(manifest)) => {
            println!("{manifest}");
            0
        }
        Ok(CliOutput::Project(dir)) => {
            println!("Project '{}' generated in {}", cli.project_name, dir.display());
            0
        }
        Err(e) => {
            println!("{e:#}");
            1
        }
    }
}
