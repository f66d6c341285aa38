//! Build-variable extraction from `Android.mk` style make files.
//!
//! Only simple `NAME := value` assignments are recognised. A value runs to the
//! first line end not preceded by a backslash, so continued values keep their
//! raw `\`-newline sequences.

use crate::error::{BuildError, Result};
use regex::Regex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

fn assignment_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?ms)^\s*([^:#=\s]+)\s*:=\s*(.*?[^\\])$")
            .expect("assignment pattern is a valid regex")
    })
}

/// Variables assigned with `:=` in one make file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildVariables {
    path: PathBuf,
    vars: HashMap<String, String>,
}

impl BuildVariables {
    /// Read and parse the make file at `path`.
    pub async fn load(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| BuildError::io(path, e))?;
        Ok(Self::parse(path, &content))
    }

    /// Parse make file text. `path` is only kept for error reporting.
    ///
    /// Later assignments to the same name replace earlier ones.
    pub fn parse(path: &Path, content: &str) -> Self {
        let vars = assignment_pattern()
            .captures_iter(content)
            .map(|caps| (caps[1].to_string(), caps[2].to_string()))
            .collect();
        Self {
            path: path.to_path_buf(),
            vars,
        }
    }

    /// Value of `name`, failing if the file does not define it.
    pub fn get(&self, name: &str) -> Result<&str> {
        self.get_opt(name).ok_or_else(|| BuildError::MissingVariable {
            name: name.to_string(),
            path: self.path.clone(),
        })
    }

    pub fn get_opt(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(content: &str) -> BuildVariables {
        BuildVariables::parse(Path::new("Android.mk"), content)
    }

    #[test]
    fn test_simple_assignments() {
        let vars = parse(
            "LOCAL_PATH:= $(call my-dir)\n\
             include $(CLEAR_VARS)\n\
             LOCAL_MODULE_TAGS := tests\n\
             LOCAL_PACKAGE_NAME := CtsOsTestCases\n\
             LOCAL_INSTRUMENTATION_FOR := CtsTestStubs\n",
        );
        assert_eq!(vars.len(), 4);
        assert_eq!(vars.get("LOCAL_PATH").unwrap(), "$(call my-dir)");
        assert_eq!(vars.get("LOCAL_MODULE_TAGS").unwrap(), "tests");
        assert_eq!(vars.get("LOCAL_PACKAGE_NAME").unwrap(), "CtsOsTestCases");
        assert_eq!(
            vars.get("LOCAL_INSTRUMENTATION_FOR").unwrap(),
            "CtsTestStubs"
        );
    }

    #[test]
    fn test_continued_value_spans_lines() {
        let vars = parse(
            "LOCAL_JAVA_LIBRARIES := android.test.runner \\\n    core-junit\n\
             LOCAL_SDK_VERSION := current\n",
        );
        assert_eq!(vars.len(), 2);
        assert_eq!(
            vars.get("LOCAL_JAVA_LIBRARIES").unwrap(),
            "android.test.runner \\\n    core-junit"
        );
        assert_eq!(vars.get("LOCAL_SDK_VERSION").unwrap(), "current");
    }

    #[test]
    fn test_value_may_contain_colon_and_hash() {
        let vars = parse("LOCAL_SRC_FILES := a:b # trailing\n");
        assert_eq!(vars.get("LOCAL_SRC_FILES").unwrap(), "a:b # trailing");
    }

    #[test]
    fn test_last_assignment_wins() {
        let vars = parse("LOCAL_MODULE := first\nLOCAL_MODULE := second\n");
        assert_eq!(vars.len(), 1);
        assert_eq!(vars.get("LOCAL_MODULE").unwrap(), "second");
    }

    #[test]
    fn test_plain_equals_and_comments_are_ignored() {
        let vars = parse("# LOCAL_MODULE := commented\nLOCAL_CFLAGS = -O2\nLOCAL_MODULE += extra\n");
        assert!(vars.is_empty());
    }

    #[test]
    fn test_value_without_trailing_newline() {
        let vars = parse("LOCAL_MODULE := CtsAppSecurityTests");
        assert_eq!(vars.get("LOCAL_MODULE").unwrap(), "CtsAppSecurityTests");
    }

    #[test]
    fn test_missing_variable_is_error() {
        let vars = parse("LOCAL_MODULE := x\n");
        let err = vars.get("LOCAL_PACKAGE_NAME").unwrap_err();
        assert!(matches!(err, BuildError::MissingVariable { ref name, .. } if name == "LOCAL_PACKAGE_NAME"));
        assert!(vars.get_opt("LOCAL_PACKAGE_NAME").is_none());
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Android.mk");
        std::fs::write(&path, "LOCAL_PACKAGE_NAME := CtsViewTestCases\n").unwrap();

        let vars = BuildVariables::load(&path).await.expect("load failed");
        assert_eq!(vars.get("LOCAL_PACKAGE_NAME").unwrap(), "CtsViewTestCases");
        assert_eq!(vars.path(), path.as_path());
    }

    #[tokio::test]
    async fn test_load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = BuildVariables::load(&dir.path().join("Android.mk"))
            .await
            .unwrap_err();
        assert!(matches!(err, BuildError::Io { .. }));
    }
}
