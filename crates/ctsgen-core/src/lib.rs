//! ctsgen - CTS test repository generation
//!
//! Builds the test repository consumed by the CTS harness:
//! - One description document per test package, produced by the javadoc
//!   description generator and completed from `Android.mk` and
//!   `AndroidManifest.xml`
//! - Named test plans selected from the generated packages by ordered
//!   include/exclude rules

pub mod config;
pub mod description;
pub mod dispatcher;
pub mod doclet;
pub mod error;
pub mod generate;
pub mod makefile;
pub mod pipeline;
pub mod plan;
pub mod relpath;
pub mod telemetry;
pub mod xml_file;

// Re-export key types
pub use config::{BuildConfig, DocletConfig, RepositoryLayout, DEFAULT_WORKERS};
pub use description::{PackageMetadata, TestPackage};
pub use dispatcher::{Dispatcher, GenerationReport, GenerationTask, TaskReport};
pub use doclet::{DescriptionTool, DocletCommand, JavadocDoclet, ToolRun};
pub use error::{BuildError, Result};
pub use generate::{GenerationContext, PackageOutcome};
pub use makefile::BuildVariables;
pub use pipeline::{BuildPipeline, BuildResult};
pub use plan::{default_plans, PlanBuilder, PlanRule, TestPlan};
pub use relpath::relative_path;
pub use telemetry::init_tracing;
pub use xml_file::XmlFile;
