use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Parser;
use tracing::info;

use mfront::behaviour::ModellingHypothesis;
use mfront::integration::OutOfBoundsPolicy;
use mfront::logging::init_tracing;
use mfront::{CompilerOptions, Driver};

/// compiles behaviour descriptions (.mfront) into C++ sources, one header and one source
/// for each modelling hypothesis and interface
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Behaviour files
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Target interface, may be repeated
    #[arg(short, long = "interface", default_value = "generic")]
    interfaces: Vec<String>,

    /// Only generate for this modelling hypothesis, may be repeated
    #[arg(long = "hypothesis")]
    hypotheses: Vec<ModellingHypothesis>,

    /// Directory of the generated files
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,

    /// Number of generation threads
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Default policy of the generated code when a variable leaves its bounds
    #[arg(long)]
    out_of_bounds_policy: Option<OutOfBoundsPolicy>,

    /// Report every written file
    #[arg(short, long)]
    verbose: bool,

    /// Report the progress of the parser and of the generator
    #[arg(long)]
    debug: bool,
}

fn main() -> Result<()> {
    let cli = Args::parse();
    init_tracing(cli.verbose, cli.debug);
    let options = CompilerOptions {
        interfaces: cli.interfaces,
        hypotheses: cli.hypotheses,
        output_dir: cli.output_dir,
        jobs: cli.jobs,
        out_of_bounds_policy: cli.out_of_bounds_policy,
    };
    let driver = Driver::new(options);
    let report = driver.compile_files(&cli.files);
    info!("{} files written", report.written.len());
    if !report.is_success() {
        for err in report.errors.iter() {
            eprintln!("{}", err);
        }
        bail!("compilation failed with {} error(s)", report.errors.len());
    }
    Ok(())
}
