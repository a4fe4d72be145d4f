#![allow(unused_assignments)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::prelude::*;

use confgen::{CompileOptions, Compiler, ConfgenError, ConfgenResult, OutputKind};

/// Device configuration compiler
///
/// Validates a YAML device configuration and generates the C++ setup code
/// and build metadata for it.
#[derive(Parser)]
#[command(name = "confgen")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate main.cpp (or the setup fragment) for a configuration
    Compile {
        /// Configuration file
        file: PathBuf,

        /// Output file; defaults to <build_path>/src/main.cpp
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write build metadata (libraries, flags, includes) as JSON
        #[arg(long)]
        metadata: Option<PathBuf>,

        /// Emit only the setup statements to stdout
        #[arg(long)]
        fragment: bool,

        /// Build directory to use instead of core.build_path
        #[arg(long)]
        build_path: Option<PathBuf>,
    },

    /// Validate a configuration and its code generation without writing files
    Check {
        /// Configuration file
        file: PathBuf,
    },

    /// Print the normalized configuration
    Config {
        /// Configuration file
        file: PathBuf,

        /// Output format: yaml, json
        #[arg(short, long, default_value = "yaml")]
        format: String,
    },
}

fn init_logging(verbose: bool) {
    let default = if verbose { "confgen=debug" } else { "confgen=warn" };
    let filter = if verbose {
        tracing_subscriber::EnvFilter::new(default)
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default))
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() -> ExitCode {
    // Set up miette for nice error output
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(2)
                .tab_width(4)
                .build(),
        )
    }))
    .ok();

    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Compile {
            file,
            output,
            metadata,
            fragment,
            build_path,
        } => cmd_compile(file, output, metadata, fragment, build_path),
        Commands::Check { file } => cmd_check(file),
        Commands::Config { file, format } => cmd_config(file, format),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let exit_code = match &e {
                // I/O errors
                ConfgenError::Io { .. } => ExitCode::from(3),
                // Configuration and generation errors
                _ => ExitCode::from(1),
            };
            eprintln!("{:?}", miette::Report::new(e));
            exit_code
        }
    }
}

fn config_dir(file: &Path) -> PathBuf {
    file.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

fn compiler_for(file: &Path, build_path: Option<PathBuf>) -> Compiler {
    let mut options = CompileOptions::new(config_dir(file));
    options.build_path_override = build_path;
    Compiler::new(options)
}

fn write_file(path: &Path, content: &str) -> ConfgenResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| {
            ConfgenError::io_error(format!("failed to create '{}': {}", parent.display(), e))
        })?;
    }
    std::fs::write(path, content)
        .map_err(|e| ConfgenError::io_error(format!("failed to write '{}': {}", path.display(), e)))
}

fn cmd_compile(
    file: PathBuf,
    output: Option<PathBuf>,
    metadata: Option<PathBuf>,
    fragment: bool,
    build_path: Option<PathBuf>,
) -> ConfgenResult<()> {
    let compiler = compiler_for(&file, build_path);
    let document = confgen::load_file(&file)?;
    let config = compiler.validate(&document)?;
    let paths = compiler.build_paths(&config);
    let program = compiler.generate(config)?;

    if let Some(ref path) = metadata {
        write_file(path, &program.metadata().to_json()?)?;
    }

    if fragment {
        let text = program.emit(OutputKind::Fragment)?;
        match output {
            Some(path) => write_file(&path, &text)?,
            None => print!("{}", text),
        }
        return Ok(());
    }

    let text = program.emit(OutputKind::MainCpp)?;
    let path = output.unwrap_or_else(|| paths.main_cpp());
    write_file(&path, &text)?;
    eprintln!("Wrote {}", path.display());
    Ok(())
}

fn cmd_check(file: PathBuf) -> ConfgenResult<()> {
    let compiler = compiler_for(&file, None);
    let document = confgen::load_file(&file)?;
    let program = compiler.compile(&document)?;
    // Rendering surfaces references that were never defined
    program.emit(OutputKind::Fragment)?;
    eprintln!(
        "✓ {} is valid ({} statements)",
        file.display(),
        program.statements().len()
    );
    Ok(())
}

fn cmd_config(file: PathBuf, format: String) -> ConfgenResult<()> {
    let compiler = compiler_for(&file, None);
    let document = confgen::load_file(&file)?;
    let config = compiler.validate(&document)?;
    let text = match format.to_lowercase().as_str() {
        "json" => serde_json::to_string_pretty(&config.value.to_serde_json())
            .map_err(|e| ConfgenError::io_error(format!("failed to serialize: {}", e)))?,
        "yaml" | "yml" => serde_yaml::to_string(&config.value.to_serde_yaml())
            .map_err(|e| ConfgenError::io_error(format!("failed to serialize: {}", e)))?,
        other => {
            return Err(ConfgenError::io_error(format!(
                "unknown output format '{}'. Use: yaml, json",
                other
            )))
        }
    };
    print!("{}", text);
    if !text.ends_with('\n') {
        println!();
    }
    Ok(())
}
