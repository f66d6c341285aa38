//! End-to-end repository build: descriptions first, then plans.

use crate::config::BuildConfig;
use crate::dispatcher::{Dispatcher, GenerationReport};
use crate::doclet::{DescriptionTool, JavadocDoclet};
use crate::error::{BuildError, Result};
use crate::generate::GenerationContext;
use crate::plan::{default_plans, PlanBuilder};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Result of a complete repository build.
#[derive(Debug, Clone)]
pub struct BuildResult {
    /// Per-task outcome of description generation.
    pub report: GenerationReport,

    /// Plan documents written, in definition order.
    pub plans: Vec<PathBuf>,
}

impl BuildResult {
    pub fn success(&self) -> bool {
        self.report.success()
    }
}

/// Repository build orchestrator.
pub struct BuildPipeline;

impl BuildPipeline {
    /// Build with the javadoc description generator from `config`.
    pub async fn run(config: &BuildConfig) -> Result<BuildResult> {
        let tool = JavadocDoclet::new(
            config.android_root.clone(),
            config.doclet_path.clone(),
            config.doclet.clone(),
        );
        Self::run_with_tool(config, Arc::new(tool)).await
    }

    /// Build using `tool` to produce base descriptions.
    ///
    /// Plans are written even when some descriptions failed; the failures
    /// are in the returned report.
    pub async fn run_with_tool(
        config: &BuildConfig,
        tool: Arc<dyn DescriptionTool>,
    ) -> Result<BuildResult> {
        let layout = config.layout();
        layout.create_dirs().await?;
        tokio::fs::create_dir_all(&config.temp_dir)
            .await
            .map_err(|e| BuildError::io(&config.temp_dir, e))?;

        info!(
            test_root = %config.test_root.display(),
            output_dir = %config.output_dir.display(),
            "Building test repository"
        );

        let dispatcher = Dispatcher::new(GenerationContext::from(config), tool, config.workers);
        let report = dispatcher.generate_all().await?;

        let builder = PlanBuilder::load(&layout.testcases).await?;
        let plans = builder.write_all(&default_plans()?, &layout).await?;

        Ok(BuildResult { report, plans })
    }
}
