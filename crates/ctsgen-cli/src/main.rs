//! ctsgen - CTS test repository generator
//!
//! Generates one test package description per package directory under the
//! test root, plus the default test plans, into `<ctsOutputDir>/repository`.

use anyhow::{Context, Result};
use clap::Parser;
use ctsgen_core::{BuildConfig, BuildPipeline, DocletConfig, DEFAULT_WORKERS};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, Level};

#[derive(Parser, Debug)]
#[command(name = "ctsgen")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Generate CTS test descriptions and test plans", long_about = None)]
struct Cli {
    /// Directory under which to search for CTS tests
    test_root: PathBuf,

    /// Directory in which the CTS repository should be created
    cts_output_dir: PathBuf,

    /// Directory to use for storing temporary files
    temp_dir: PathBuf,

    /// Root directory of the Android source tree
    android_root_dir: PathBuf,

    /// Class path where the DescriptionGenerator doclet can be found
    doclet_path: String,

    /// Number of descriptions generated concurrently
    #[arg(long, env = "CTSGEN_WORKERS", default_value_t = DEFAULT_WORKERS)]
    workers: usize,

    /// Seconds before a doclet run is killed (0 waits forever)
    #[arg(long, env = "CTSGEN_DOCLET_TIMEOUT", default_value_t = 0)]
    doclet_timeout: u64,

    /// javadoc executable
    #[arg(long, env = "CTSGEN_JAVADOC", default_value = "javadoc")]
    javadoc: String,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON-formatted log lines and a JSON summary
    #[arg(long)]
    json: bool,
}

impl Cli {
    fn build_config(&self) -> BuildConfig {
        BuildConfig::new(
            self.test_root.clone(),
            self.cts_output_dir.clone(),
            self.temp_dir.clone(),
            self.android_root_dir.clone(),
            self.doclet_path.clone(),
        )
        .with_workers(self.workers)
        .with_doclet(DocletConfig {
            command: vec![self.javadoc.clone()],
            timeout_secs: self.doclet_timeout,
            ..DocletConfig::default()
        })
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    ctsgen_core::init_tracing(cli.json, level);

    let config = cli.build_config();
    let result = BuildPipeline::run(&config)
        .await
        .context("Failed to build CTS repository")?;

    for failure in result.report.failures() {
        if let Err(message) = &failure.outcome {
            error!(task = %failure.task, "{message}");
        }
    }

    if cli.json {
        println!("{}", serde_json::to_string(&result.report)?);
    }

    if result.success() {
        info!(
            descriptions = result.report.written_count(),
            skipped = result.report.skipped_count(),
            plans = result.plans.len(),
            "CTS repository generated"
        );
        Ok(ExitCode::SUCCESS)
    } else {
        error!(
            failed = result.report.failed_count(),
            "CTS repository generated with failures"
        );
        Ok(ExitCode::FAILURE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ARGS: [&str; 6] = [
        "ctsgen",
        "cts/tests/tests",
        "out/host/cts",
        "/tmp/cts",
        ".",
        "out/host/framework/descGen.jar",
    ];

    #[test]
    fn test_parses_five_positional_values() {
        let cli = Cli::try_parse_from(ARGS).expect("parse failed");
        let config = cli.build_config();
        assert_eq!(config.test_root, PathBuf::from("cts/tests/tests"));
        assert_eq!(config.output_dir, PathBuf::from("out/host/cts"));
        assert_eq!(config.temp_dir, PathBuf::from("/tmp/cts"));
        assert_eq!(config.android_root, PathBuf::from("."));
        assert_eq!(config.doclet_path, "out/host/framework/descGen.jar");
        assert_eq!(config.workers, DEFAULT_WORKERS);
        assert_eq!(config.doclet.command, vec!["javadoc".to_string()]);
    }

    #[test]
    fn test_rejects_too_few_values() {
        assert!(Cli::try_parse_from(&ARGS[..5]).is_err());
    }

    #[test]
    fn test_rejects_too_many_values() {
        let mut args = ARGS.to_vec();
        args.push("extra");
        assert!(Cli::try_parse_from(args).is_err());
    }

    #[test]
    fn test_options() {
        let mut args = ARGS.to_vec();
        args.extend(["--workers", "4", "--doclet-timeout", "600", "--javadoc", "/opt/jdk/bin/javadoc"]);
        let config = Cli::try_parse_from(args).unwrap().build_config();
        assert_eq!(config.workers, 4);
        assert_eq!(config.doclet.timeout_secs, 600);
        assert_eq!(config.doclet.command, vec!["/opt/jdk/bin/javadoc".to_string()]);
    }
}
