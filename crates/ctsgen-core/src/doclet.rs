//! External description generator invocation.
//!
//! The generator is a javadoc doclet that inspects test sources and writes a
//! base description document. It is reached through [`DescriptionTool`] so
//! the pipeline can run against a fake in tests.

use crate::config::DocletConfig;
use crate::error::{BuildError, Result};
use crate::relpath::relative_path;
use async_trait::async_trait;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::debug;
use walkdir::WalkDir;

/// Source roots that must be on the source path for the doclet to resolve
/// test base classes, the runner, JUnit and test annotations.
pub const FRAMEWORK_SOURCE_ROOTS: &[&str] = &[
    "frameworks/base/core/java",
    "frameworks/base/test-runner/src",
    "libcore/junit/src/main/java",
    "development/tools/hosttestlib/src",
    "libcore/dalvik/src/main/java",
    "cts/tests/src",
];

const SOURCE_EXTENSION: &str = ".java";

/// Outcome of one generator run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolRun {
    /// Exit code, `None` when terminated by a signal.
    pub exit_code: Option<i32>,

    /// Duration in milliseconds.
    pub duration_ms: u64,
}

impl ToolRun {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Something that writes a base description for a source subtree.
#[async_trait]
pub trait DescriptionTool: Send + Sync {
    /// Generate a description of the tests under `source_root` into `output`.
    ///
    /// A non-zero exit is returned as data, not as an error; only failures
    /// to run the tool at all are errors.
    async fn generate(&self, source_root: &Path, output: &Path) -> Result<ToolRun>;
}

/// A fully built generator command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocletCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl fmt::Display for DocletCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// The javadoc-based description generator.
#[derive(Debug, Clone)]
pub struct JavadocDoclet {
    android_root: PathBuf,
    doclet_path: String,
    config: DocletConfig,
}

impl JavadocDoclet {
    pub fn new(android_root: PathBuf, doclet_path: String, config: DocletConfig) -> Self {
        Self {
            android_root,
            doclet_path,
            config,
        }
    }

    /// Source path for `source_root`: the framework roots followed by the
    /// package subtree, all under the android root.
    pub fn source_path(&self, source_root: &Path) -> Result<Vec<PathBuf>> {
        let relative = relative_path(source_root, &self.android_root)
            .map_err(|e| BuildError::io(source_root, e))?;
        Ok(FRAMEWORK_SOURCE_ROOTS
            .iter()
            .map(PathBuf::from)
            .chain(std::iter::once(relative))
            .map(|p| self.android_root.join(p))
            .collect())
    }

    /// Build the command line that describes `source_root` into `output`.
    pub fn command(&self, source_root: &Path, output: &Path) -> Result<DocletCommand> {
        let (program, prefix) = self
            .config
            .command
            .split_first()
            .ok_or(BuildError::EmptyCommand)?;

        let source_path = self.source_path(source_root)?;
        let sources = collect_sources(source_path.last().map_or(source_root, PathBuf::as_path))?;

        let mut args: Vec<String> = prefix.to_vec();
        args.extend([
            "-o".to_string(),
            output.to_string_lossy().into_owned(),
            format!("-J-Xmx{}", self.config.max_heap),
            "-quiet".to_string(),
            "-doclet".to_string(),
            self.config.doclet_class.clone(),
            "-docletpath".to_string(),
            self.doclet_path.clone(),
            "-sourcepath".to_string(),
            join_source_path(&source_path),
        ]);
        args.extend(sources.iter().map(|s| s.to_string_lossy().into_owned()));

        Ok(DocletCommand {
            program: program.clone(),
            args,
        })
    }
}

#[async_trait]
impl DescriptionTool for JavadocDoclet {
    async fn generate(&self, source_root: &Path, output: &Path) -> Result<ToolRun> {
        let command = self.command(source_root, output)?;
        run_command(&command, self.config.timeout_secs).await
    }
}

fn join_source_path(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(":")
}

/// All files under `dir` whose name ends in `.java`, in walk order.
pub fn collect_sources(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut sources = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry?;
        if entry.file_type().is_file()
            && entry.file_name().to_string_lossy().ends_with(SOURCE_EXTENSION)
        {
            sources.push(entry.into_path());
        }
    }
    Ok(sources)
}

/// Run `command` to completion, discarding its output.
///
/// With `timeout_secs == 0` the call waits indefinitely. On timeout the child
/// is killed when its handle is dropped.
pub async fn run_command(command: &DocletCommand, timeout_secs: u64) -> Result<ToolRun> {
    let start = Instant::now();

    let child = Command::new(&command.program)
        .args(&command.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| BuildError::ToolSpawn {
            program: command.program.clone(),
            source,
        })?;

    let wait = child.wait_with_output();
    let waited = if timeout_secs > 0 {
        tokio::time::timeout(Duration::from_secs(timeout_secs), wait)
            .await
            .map_err(|_| BuildError::ToolTimeout { timeout_secs })?
    } else {
        wait.await
    };
    let output = waited.map_err(|source| BuildError::ToolSpawn {
        program: command.program.clone(),
        source,
    })?;

    let run = ToolRun {
        exit_code: output.status.code(),
        duration_ms: start.elapsed().as_millis() as u64,
    };
    if !run.success() {
        debug!(
            program = %command.program,
            exit_code = ?run.exit_code,
            stderr = %String::from_utf8_lossy(&output.stderr),
            "Description generator exited unsuccessfully"
        );
    }
    Ok(run)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doclet(root: &Path) -> JavadocDoclet {
        JavadocDoclet::new(
            root.to_path_buf(),
            "out/host/linux-x86/framework/descGen.jar".to_string(),
            DocletConfig::default(),
        )
    }

    #[test]
    fn test_tool_run_success() {
        let ok = ToolRun {
            exit_code: Some(0),
            duration_ms: 10,
        };
        assert!(ok.success());
        let failed = ToolRun {
            exit_code: Some(1),
            duration_ms: 10,
        };
        assert!(!failed.success());
        let killed = ToolRun {
            exit_code: None,
            duration_ms: 10,
        };
        assert!(!killed.success());
    }

    #[test]
    fn test_source_path_order() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let paths = doclet(root)
            .source_path(&root.join("cts/tests/tests/os"))
            .unwrap();

        assert_eq!(paths.len(), FRAMEWORK_SOURCE_ROOTS.len() + 1);
        assert_eq!(paths[0], root.join("frameworks/base/core/java"));
        assert_eq!(paths[5], root.join("cts/tests/src"));
        assert_eq!(paths[6], root.join("cts/tests/tests/os"));
    }

    #[test]
    fn test_collect_sources_filters_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src/android/os/cts");
        std::fs::create_dir_all(&src).unwrap();
        std::fs::write(src.join("BuildTest.java"), "class BuildTest {}").unwrap();
        std::fs::write(src.join("AbiTest.java"), "class AbiTest {}").unwrap();
        std::fs::write(src.join("notes.txt"), "").unwrap();
        std::fs::create_dir_all(dir.path().join("res.java")).unwrap();

        let sources = collect_sources(dir.path()).unwrap();
        assert_eq!(
            sources,
            vec![src.join("AbiTest.java"), src.join("BuildTest.java")]
        );
    }

    #[test]
    fn test_command_line_layout() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let package = root.join("cts/tests/tests/os");
        std::fs::create_dir_all(package.join("src")).unwrap();
        std::fs::write(package.join("src/OsTest.java"), "").unwrap();

        let output = Path::new("/tmp/android.os-description.xml");
        let cmd = doclet(root).command(&package, output).unwrap();

        assert_eq!(cmd.program, "javadoc");
        assert_eq!(cmd.args[0], "-o");
        assert_eq!(cmd.args[1], "/tmp/android.os-description.xml");
        assert_eq!(cmd.args[2], "-J-Xmx512m");
        assert_eq!(cmd.args[3], "-quiet");
        assert_eq!(&cmd.args[4..6], &["-doclet", "DescriptionGenerator"]);
        assert_eq!(cmd.args[6], "-docletpath");
        assert_eq!(cmd.args[7], "out/host/linux-x86/framework/descGen.jar");
        assert_eq!(cmd.args[8], "-sourcepath");
        assert!(cmd.args[9].ends_with(&format!(":{}", package.display())));
        assert_eq!(cmd.args[9].matches(':').count(), FRAMEWORK_SOURCE_ROOTS.len());
        assert_eq!(
            cmd.args[10],
            package.join("src/OsTest.java").to_string_lossy()
        );
        assert_eq!(cmd.args.len(), 11);
        assert!(cmd.to_string().starts_with("javadoc -o /tmp/android.os-description.xml "));
    }

    #[test]
    fn test_android_root_with_parent_component() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("sub")).unwrap();
        let package = root.join("cts/tests/tests/os");
        std::fs::create_dir_all(package.join("src")).unwrap();
        std::fs::write(package.join("src/OsTest.java"), "").unwrap();

        let cmd = doclet(&root.join("sub/.."))
            .command(&package, Path::new("out.xml"))
            .unwrap();

        assert!(cmd.args[9].ends_with("sub/../cts/tests/tests/os"));
        assert_eq!(cmd.args.len(), 11);
        assert!(cmd.args[10].ends_with("cts/tests/tests/os/src/OsTest.java"));
    }

    #[test]
    fn test_command_prefix_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let config = DocletConfig {
            command: vec!["sh".to_string(), "fake-javadoc.sh".to_string()],
            ..DocletConfig::default()
        };
        let tool = JavadocDoclet::new(dir.path().to_path_buf(), String::new(), config);
        let cmd = tool
            .command(dir.path(), Path::new("out.xml"))
            .unwrap();
        assert_eq!(cmd.program, "sh");
        assert_eq!(cmd.args[0], "fake-javadoc.sh");
        assert_eq!(cmd.args[1], "-o");
    }

    #[test]
    fn test_empty_command_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let config = DocletConfig {
            command: Vec::new(),
            ..DocletConfig::default()
        };
        let tool = JavadocDoclet::new(dir.path().to_path_buf(), String::new(), config);
        let err = tool.command(dir.path(), Path::new("out.xml")).unwrap_err();
        assert!(matches!(err, BuildError::EmptyCommand));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_command_reports_exit_code() {
        let ok = DocletCommand {
            program: "sh".to_string(),
            args: vec!["-c".to_string(), "echo noisy; exit 0".to_string()],
        };
        assert!(run_command(&ok, 0).await.unwrap().success());

        let failed = DocletCommand {
            program: "sh".to_string(),
            args: vec!["-c".to_string(), "echo broken >&2; exit 3".to_string()],
        };
        let run = run_command(&failed, 0).await.unwrap();
        assert_eq!(run.exit_code, Some(3));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_command_times_out() {
        let slow = DocletCommand {
            program: "sleep".to_string(),
            args: vec!["5".to_string()],
        };
        let err = run_command(&slow, 1).await.unwrap_err();
        assert!(matches!(err, BuildError::ToolTimeout { timeout_secs: 1 }));
    }

    #[tokio::test]
    async fn test_run_command_missing_program() {
        let missing = DocletCommand {
            program: "ctsgen-no-such-javadoc".to_string(),
            args: Vec::new(),
        };
        let err = run_command(&missing, 0).await.unwrap_err();
        assert!(matches!(err, BuildError::ToolSpawn { .. }));
    }
}
