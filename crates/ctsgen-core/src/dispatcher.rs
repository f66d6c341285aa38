//! Concurrent description generation.
//!
//! One task per bespoke description plus one per package directory, run on
//! the tokio runtime with at most `workers` tasks in flight. Every task
//! reports back; failures are collected instead of aborting siblings.

use crate::doclet::DescriptionTool;
use crate::error::{BuildError, Result};
use crate::generate::{
    generate_app_security, generate_package, generate_reference_app, generate_signature_check,
    GenerationContext, PackageOutcome,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{debug, info};

/// One unit of generation work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "package", rename_all = "snake_case")]
pub enum GenerationTask {
    SignatureCheck,
    ReferenceApp,
    AppSecurity,
    /// A subdirectory of the test root.
    Package(String),
}

impl fmt::Display for GenerationTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenerationTask::SignatureCheck => write!(f, "signature-check"),
            GenerationTask::ReferenceApp => write!(f, "reference-app"),
            GenerationTask::AppSecurity => write!(f, "app-security"),
            GenerationTask::Package(name) => write!(f, "package:{name}"),
        }
    }
}

/// Result of one task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskReport {
    pub task: GenerationTask,

    /// Outcome, or the rendered error.
    pub outcome: std::result::Result<PackageOutcome, String>,
}

impl TaskReport {
    pub fn failed(&self) -> bool {
        self.outcome.is_err()
    }
}

/// Aggregated results of a generation run, in submission order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationReport {
    pub tasks: Vec<TaskReport>,

    /// Wall time in milliseconds.
    pub duration_ms: u64,
}

impl GenerationReport {
    /// Number of descriptions written.
    pub fn written_count(&self) -> usize {
        self.tasks
            .iter()
            .filter(|t| matches!(t.outcome, Ok(PackageOutcome::Written { .. })))
            .count()
    }

    /// Number of package directories skipped.
    pub fn skipped_count(&self) -> usize {
        self.tasks
            .iter()
            .filter(|t| matches!(t.outcome, Ok(PackageOutcome::Skipped { .. })))
            .count()
    }

    /// Number of tasks that failed.
    pub fn failed_count(&self) -> usize {
        self.failures().count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &TaskReport> {
        self.tasks.iter().filter(|t| t.failed())
    }

    /// Whether every task succeeded (skips count as success).
    pub fn success(&self) -> bool {
        self.failed_count() == 0
    }
}

/// Names of all subdirectories of `root`, sorted.
pub async fn discover_packages(root: &Path) -> Result<Vec<String>> {
    let mut entries = tokio::fs::read_dir(root)
        .await
        .map_err(|e| BuildError::io(root, e))?;
    let mut packages = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| BuildError::io(root, e))?
    {
        let is_dir = tokio::fs::metadata(entry.path())
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false);
        if is_dir {
            packages.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    packages.sort();
    Ok(packages)
}

/// Runs generation tasks concurrently with a bounded worker count.
pub struct Dispatcher {
    ctx: Arc<GenerationContext>,
    tool: Arc<dyn DescriptionTool>,
    workers: usize,
}

impl Dispatcher {
    pub fn new(ctx: GenerationContext, tool: Arc<dyn DescriptionTool>, workers: usize) -> Self {
        Self {
            ctx: Arc::new(ctx),
            tool,
            workers: workers.max(1),
        }
    }

    /// The three bespoke tasks followed by one task per package directory.
    pub async fn plan_tasks(&self) -> Result<Vec<GenerationTask>> {
        let mut tasks = vec![
            GenerationTask::SignatureCheck,
            GenerationTask::ReferenceApp,
            GenerationTask::AppSecurity,
        ];
        tasks.extend(
            discover_packages(&self.ctx.test_root)
                .await?
                .into_iter()
                .map(GenerationTask::Package),
        );
        Ok(tasks)
    }

    /// Generate every description and wait for all of them.
    pub async fn generate_all(&self) -> Result<GenerationReport> {
        let tasks = self.plan_tasks().await?;
        Ok(self.run(tasks).await)
    }

    /// Run `tasks` and collect one report per task.
    pub async fn run(&self, tasks: Vec<GenerationTask>) -> GenerationReport {
        let start = Instant::now();
        let semaphore = Arc::new(Semaphore::new(self.workers));
        info!(tasks = tasks.len(), workers = self.workers, "Starting description generation");

        let handles: Vec<_> = tasks
            .iter()
            .cloned()
            .map(|task| {
                let ctx = Arc::clone(&self.ctx);
                let tool = Arc::clone(&self.tool);
                let semaphore = Arc::clone(&semaphore);
                tokio::spawn(async move { run_task(semaphore, ctx, tool, task).await })
            })
            .collect();

        let results = futures::future::join_all(handles).await;

        let reports = tasks
            .into_iter()
            .zip(results)
            .map(|(task, joined)| {
                let outcome = match joined {
                    Ok(result) => result.map_err(|e| e.to_string()),
                    Err(join_err) => Err(BuildError::TaskAborted(join_err.to_string()).to_string()),
                };
                TaskReport { task, outcome }
            })
            .collect();

        let report = GenerationReport {
            tasks: reports,
            duration_ms: start.elapsed().as_millis() as u64,
        };
        info!(
            written = report.written_count(),
            skipped = report.skipped_count(),
            failed = report.failed_count(),
            duration_ms = report.duration_ms,
            "Description generation finished"
        );
        report
    }
}

async fn run_task(
    semaphore: Arc<Semaphore>,
    ctx: Arc<GenerationContext>,
    tool: Arc<dyn DescriptionTool>,
    task: GenerationTask,
) -> Result<PackageOutcome> {
    let _permit = semaphore
        .acquire_owned()
        .await
        .map_err(|e| BuildError::TaskAborted(e.to_string()))?;
    debug!(task = %task, "Running generation task");
    execute(&ctx, tool.as_ref(), &task).await
}

async fn execute(
    ctx: &GenerationContext,
    tool: &dyn DescriptionTool,
    task: &GenerationTask,
) -> Result<PackageOutcome> {
    match task {
        GenerationTask::SignatureCheck => generate_signature_check(&ctx.layout).await,
        GenerationTask::ReferenceApp => generate_reference_app(&ctx.layout).await,
        GenerationTask::AppSecurity => generate_app_security(ctx, tool).await,
        GenerationTask::Package(name) => generate_package(ctx, tool, name).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn report(outcomes: Vec<std::result::Result<PackageOutcome, String>>) -> GenerationReport {
        GenerationReport {
            tasks: outcomes
                .into_iter()
                .enumerate()
                .map(|(i, outcome)| TaskReport {
                    task: GenerationTask::Package(format!("p{i}")),
                    outcome,
                })
                .collect(),
            duration_ms: 5,
        }
    }

    #[test]
    fn test_report_counts() {
        let report = report(vec![
            Ok(PackageOutcome::Written {
                package: "android.os".to_string(),
                path: PathBuf::from("CtsOsTestCases.xml"),
            }),
            Ok(PackageOutcome::Skipped {
                package: "android.text".to_string(),
                reason: "missing Android.mk".to_string(),
            }),
            Err("variable LOCAL_PACKAGE_NAME is not defined".to_string()),
        ]);

        assert_eq!(report.written_count(), 1);
        assert_eq!(report.skipped_count(), 1);
        assert_eq!(report.failed_count(), 1);
        assert!(!report.success());
        assert_eq!(
            report.failures().next().map(|t| &t.task),
            Some(&GenerationTask::Package("p2".to_string()))
        );
    }

    #[test]
    fn test_report_with_only_skips_is_success() {
        let report = report(vec![Ok(PackageOutcome::Skipped {
            package: "android.text".to_string(),
            reason: "missing AndroidManifest.xml".to_string(),
        })]);
        assert!(report.success());
    }

    #[test]
    fn test_task_display() {
        assert_eq!(GenerationTask::AppSecurity.to_string(), "app-security");
        assert_eq!(
            GenerationTask::Package("os".to_string()).to_string(),
            "package:os"
        );
    }

    #[test]
    fn test_report_serializes_to_json() {
        let report = report(vec![Err("boom".to_string())]);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["tasks"][0]["task"]["kind"], "package");
        assert_eq!(json["tasks"][0]["task"]["package"], "p0");
        assert_eq!(json["tasks"][0]["outcome"]["Err"], "boom");
    }

    #[tokio::test]
    async fn test_discover_packages_lists_only_directories() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("view")).unwrap();
        std::fs::create_dir(dir.path().join("app")).unwrap();
        std::fs::write(dir.path().join("Android.mk"), "").unwrap();

        let packages = discover_packages(dir.path()).await.unwrap();
        assert_eq!(packages, vec!["app".to_string(), "view".to_string()]);
    }
}
