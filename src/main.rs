//! Command-line interface for xmlpack

#[cfg(feature = "cli")]
use clap::{Parser, Subcommand};

#[cfg(feature = "cli")]
use std::fs;
#[cfg(feature = "cli")]
use std::path::{Path, PathBuf};
#[cfg(feature = "cli")]
use std::sync::Arc;

#[cfg(feature = "cli")]
use xmlpack::completion::CompletionProvider;
#[cfg(feature = "cli")]
use xmlpack::parser::DocumentParser;
#[cfg(feature = "cli")]
use xmlpack::tree_builder::TreeBuilder;
#[cfg(feature = "cli")]
use xmlpack::{Analysis, Location, Position, Schema, Severity};

#[cfg(feature = "cli")]
#[derive(Parser, Debug)]
#[command(name = "xmlpack")]
#[command(author, version, about = "RELAX NG schemas, XML symbol trees and completion", long_about = None)]
struct Cli {
    /// Directory holding gtkbuilder.rng and gtk4builder.rng
    #[arg(long, global = true, value_name = "DIR")]
    bundled_schemas: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[cfg(feature = "cli")]
#[derive(Subcommand, Debug)]
enum Commands {
    /// Parse a RELAX NG schema and dump its simplified patterns
    Inspect {
        /// Path to the RELAX NG schema
        #[arg(value_name = "SCHEMA")]
        schema: PathBuf,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Print the outline of a document
    Outline {
        /// Path to the XML file
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Check a document against the schemas it references
    Diagnostics {
        /// Path to the XML file
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// List completion proposals at a cursor
    Complete {
        /// Path to the XML file
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Cursor line, 1-based
        line: u32,

        /// Cursor column, 1-based
        col: u32,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },
}

#[cfg(feature = "cli")]
fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let bundled = cli.bundled_schemas.as_deref();

    let result = match cli.command {
        Commands::Inspect { schema, json } => cmd_inspect(&schema, json),
        Commands::Outline { file } => cmd_outline(&file, bundled),
        Commands::Diagnostics { file, json } => cmd_diagnostics(&file, bundled, json),
        Commands::Complete { file, line, col, json } => cmd_complete(&file, bundled, line, col, json),
    };

    match result {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(2);
        }
    }
}

#[cfg(feature = "cli")]
type CmdResult = Result<bool, Box<dyn std::error::Error>>;

#[cfg(feature = "cli")]
fn cmd_inspect(path: &Path, json_output: bool) -> CmdResult {
    let schema = Schema::from_file(path)?;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&schema.to_dump())?);
    } else {
        println!("xmlpack v{}", xmlpack::VERSION);
        println!();
        print!("{}", schema.dump());
        if !schema.errors().is_empty() {
            println!();
            println!("Errors:");
            for error in schema.errors() {
                println!("  - {}", error);
            }
        }
    }

    Ok(schema.errors().is_empty())
}

#[cfg(feature = "cli")]
fn analyze(path: &Path, bundled: Option<&Path>) -> Result<(Analysis, Vec<u8>), Box<dyn std::error::Error>> {
    let content = fs::read(path)?;
    let location = Location::Path(path.canonicalize()?);

    let mut parser = DocumentParser::new();
    if let Some(dir) = bundled {
        parser = parser.with_bundled_schemas(dir);
    }
    let analysis = TreeBuilder::new()
        .with_parser(parser)
        .build(Some(&location), &content, 0)?;
    Ok((analysis, content))
}

#[cfg(feature = "cli")]
fn cmd_outline(path: &Path, bundled: Option<&Path>) -> CmdResult {
    let (analysis, _) = analyze(path, bundled)?;
    print!("{}", analysis.tree.outline());
    Ok(true)
}

#[cfg(feature = "cli")]
fn cmd_diagnostics(path: &Path, bundled: Option<&Path>, json_output: bool) -> CmdResult {
    let (analysis, _) = analyze(path, bundled)?;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&analysis.diagnostics)?);
    } else if analysis.diagnostics.is_empty() {
        println!("✓ No problems found");
    } else {
        for diagnostic in &analysis.diagnostics {
            println!("{}:{}", path.display(), diagnostic);
        }
    }

    Ok(analysis
        .diagnostics
        .iter()
        .all(|d| d.severity < Severity::Error))
}

#[cfg(feature = "cli")]
fn cmd_complete(path: &Path, bundled: Option<&Path>, line: u32, col: u32, json_output: bool) -> CmdResult {
    let (analysis, content) = analyze(path, bundled)?;
    let position = Position::resolve(Arc::new(analysis), &content, line, col);
    let proposals = CompletionProvider::new().populate(&position);

    if json_output {
        println!("{}", serde_json::to_string_pretty(&proposals)?);
    } else {
        for proposal in &proposals {
            println!("{}\t{}", proposal.label, proposal.text);
        }
    }

    Ok(true)
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI feature not enabled. Rebuild with --features cli");
    std::process::exit(1);
}
