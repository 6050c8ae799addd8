use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "class-scope")]
#[command(about = "Index, decompile and inspect the Java classes a Maven project depends on")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Project directory (defaults to the current directory)
    #[arg(long, value_name = "DIR")]
    pub project: Option<PathBuf>,

    #[arg(long, value_name = "PATH")]
    pub m2: Option<PathBuf>,

    #[arg(long, value_name = "FILE")]
    pub cfr: Option<PathBuf>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    /// Build the class index, or report the existing one
    Scan {
        #[arg(long)]
        force: bool,
    },
    /// Decompile one or more classes through the source cache
    Decompile {
        #[arg(required = true, value_name = "CLASS")]
        class_names: Vec<String>,

        #[arg(long)]
        no_cache: bool,

        #[arg(short = 'f', long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,

        #[arg(short = 'o', long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
    /// Describe a class from its javap report
    Analyze {
        class_name: String,

        #[arg(short = 'f', long, value_enum, default_value_t = AnalysisFormat::Json)]
        format: AnalysisFormat,
    },
    /// List indexed class names
    Classes {
        #[arg(long, value_name = "PREFIX")]
        prefix: Option<String>,

        #[arg(long, value_name = "N")]
        limit: Option<usize>,
    },
    /// Remove the project's index and decompiled sources
    Clear,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Text,
    Code,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum AnalysisFormat {
    Json,
    Text,
}
