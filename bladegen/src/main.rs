use bladegen_core::{Bladegen, GenerationOutput, SessionOptions};
use clap::{Parser, Subcommand};
use log::info;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Parser)]
#[command(name = "bladegen")]
#[command(about = "Generates geometric algebra implementation code from an algebra description", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate source files for every function the description requests
    Generate {
        /// Algebra description (YAML)
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Output directory (defaults to the directory of the input file)
        #[arg(short, long, value_name = "DIR")]
        output: Option<PathBuf>,

        /// Worker threads (0 uses one per core)
        #[arg(long, default_value_t = 0)]
        threads: usize,

        /// Skip test function generation
        #[arg(long)]
        no_tests: bool,

        /// Print verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Validate a description and resolve every request without writing files
    Check {
        /// Algebra description (YAML)
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Print verbose output
        #[arg(short, long)]
        verbose: bool,
    },
}

#[derive(Debug, Error)]
enum DriverError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Generation error: {0}")]
    GenerationError(#[from] bladegen_core::GenError),
}

fn main() -> Result<(), DriverError> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Generate {
            input,
            output,
            threads,
            no_tests,
            verbose,
        } => {
            generate_file(input, output, threads, no_tests, verbose)?;
        }
        Commands::Check { input, verbose } => {
            check_file(input, verbose)?;
        }
    }

    Ok(())
}

fn generate_file(
    input: PathBuf,
    output: Option<PathBuf>,
    threads: usize,
    no_tests: bool,
    verbose: bool,
) -> Result<(), DriverError> {
    if verbose {
        info!("Generating from {}...", input.display());
    }

    let source = fs::read_to_string(&input)?;
    let options = SessionOptions {
        threads,
        emit_tests: no_tests.then_some(false),
    };
    let generated = Bladegen::new(options).generate(&source)?;

    let directory = output.unwrap_or_else(|| {
        input
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    });
    fs::create_dir_all(&directory)?;
    write_outputs(&directory, &generated, verbose)?;

    if verbose {
        info!(
            "Generated {} functions and {} tests into {}",
            generated.functions.len(),
            generated.test_functions.len(),
            directory.display()
        );
    }

    Ok(())
}

fn write_outputs(directory: &Path, generated: &GenerationOutput, verbose: bool) -> Result<(), DriverError> {
    let name = generated.algebra_name.as_str();
    let convention = generated.convention;
    let (declaration_ext, definition_ext) = convention.file_extensions();
    let contents = &generated.contents;

    let mut files = Vec::new();
    if convention.writes_declarations() {
        files.push((format!("{}.{}", name, declaration_ext), contents.declarations.as_str()));
    }
    files.push((format!("{}.{}", name, definition_ext), contents.definitions.as_str()));
    if !contents.inline.is_empty() {
        files.push((format!("{}_inline.{}", name, declaration_ext), contents.inline.as_str()));
    }

    for (file_name, text) in files {
        let path = directory.join(file_name);
        fs::write(&path, text)?;
        if verbose {
            info!("Wrote {}", path.display());
        }
    }

    if !generated.test_functions.is_empty() {
        let path = directory.join("tests.txt");
        fs::write(&path, lines(generated.test_functions.iter()))?;
        if verbose {
            info!("Wrote {} test names to {}", generated.test_functions.len(), path.display());
        }
    }

    let path = directory.join("features.txt");
    fs::write(&path, lines(contents.features.iter()))?;
    Ok(())
}

fn lines<T: ToString>(items: impl Iterator<Item = T>) -> String {
    items.map(|item| item.to_string() + "\n").collect()
}

fn check_file(input: PathBuf, verbose: bool) -> Result<(), DriverError> {
    if verbose {
        info!("Checking {}...", input.display());
    }

    let source = fs::read_to_string(&input)?;
    let options = SessionOptions {
        threads: 0,
        emit_tests: Some(false),
    };
    let count = Bladegen::new(options).check(&source)?;

    if verbose {
        info!("✓ {} is valid ({} functions)", input.display(), count);
    }

    Ok(())
}
