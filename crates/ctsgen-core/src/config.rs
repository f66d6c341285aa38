//! Build configuration and repository layout.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default number of concurrent generation workers.
pub const DEFAULT_WORKERS: usize = 16;

/// Configuration of the external description generator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DocletConfig {
    /// Command prefix (first element is the executable).
    pub command: Vec<String>,

    /// Maximum JVM heap passed as `-J-Xmx<max_heap>`.
    pub max_heap: String,

    /// Doclet class name.
    pub doclet_class: String,

    /// Timeout in seconds, 0 waits forever.
    pub timeout_secs: u64,
}

impl Default for DocletConfig {
    fn default() -> Self {
        Self {
            command: vec!["javadoc".to_string()],
            max_heap: "512m".to_string(),
            doclet_class: "DescriptionGenerator".to_string(),
            timeout_secs: 0,
        }
    }
}

/// Full configuration of one generator run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BuildConfig {
    /// Directory whose subdirectories are test packages.
    pub test_root: PathBuf,

    /// Directory in which the repository is created.
    pub output_dir: PathBuf,

    /// Scratch directory for generator output.
    pub temp_dir: PathBuf,

    /// Root of the Android source tree.
    pub android_root: PathBuf,

    /// Class path where the description generator doclet lives.
    pub doclet_path: String,

    /// Number of concurrent generation workers.
    pub workers: usize,

    /// External generator settings.
    pub doclet: DocletConfig,
}

impl BuildConfig {
    pub fn new(
        test_root: PathBuf,
        output_dir: PathBuf,
        temp_dir: PathBuf,
        android_root: PathBuf,
        doclet_path: String,
    ) -> Self {
        Self {
            test_root,
            output_dir,
            temp_dir,
            android_root,
            doclet_path,
            workers: DEFAULT_WORKERS,
            doclet: DocletConfig::default(),
        }
    }

    /// Override the worker count. Zero is clamped to one.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_doclet(mut self, doclet: DocletConfig) -> Self {
        self.doclet = doclet;
        self
    }

    pub fn layout(&self) -> RepositoryLayout {
        RepositoryLayout::new(&self.output_dir)
    }
}

/// Output directory structure of the test repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryLayout {
    pub testcases: PathBuf,
    pub plans: PathBuf,
}

impl RepositoryLayout {
    pub fn new(output_dir: &Path) -> Self {
        let repository = output_dir.join("repository");
        Self {
            testcases: repository.join("testcases"),
            plans: repository.join("plans"),
        }
    }

    /// Path of the description document for `name`.
    pub fn description_path(&self, name: &str) -> PathBuf {
        self.testcases.join(format!("{name}.xml"))
    }

    /// Path of the plan document for `plan_name`.
    pub fn plan_path(&self, plan_name: &str) -> PathBuf {
        self.plans.join(format!("{plan_name}.xml"))
    }

    /// Create both repository directories.
    pub async fn create_dirs(&self) -> crate::Result<()> {
        for dir in [&self.testcases, &self.plans] {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| crate::BuildError::io(dir, e))?;
        }
        Ok(())
    }
}
