//! Description generation for bespoke and discovered test packages.

use crate::config::{BuildConfig, RepositoryLayout};
use crate::description::{attr, merge_root_attributes, PackageMetadata, TestPackage, ROOT_ELEMENT};
use crate::doclet::{DescriptionTool, ToolRun};
use crate::error::{BuildError, Result};
use crate::makefile::BuildVariables;
use crate::xml_file::XmlFile;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const MAKEFILE_NAME: &str = "Android.mk";
pub const MANIFEST_NAME: &str = "AndroidManifest.xml";

pub const SIGNATURE_PACKAGE: &str = "android.tests.sigtest";
pub const REFERENCE_APP_PACKAGE: &str = "android.apidemos.cts";
pub const APP_SECURITY_PACKAGE: &str = "android.tests.appsecurity";

/// Host-side app security tests, relative to the android root.
pub const APP_SECURITY_ROOT: &str = "cts/tests/appsecurity-tests";

const VAR_PACKAGE_NAME: &str = "LOCAL_PACKAGE_NAME";
const VAR_INSTRUMENTATION_FOR: &str = "LOCAL_INSTRUMENTATION_FOR";
const VAR_MODULE: &str = "LOCAL_MODULE";

/// Inputs shared by every generation task.
#[derive(Debug, Clone)]
pub struct GenerationContext {
    pub test_root: PathBuf,
    pub temp_dir: PathBuf,
    pub android_root: PathBuf,
    pub layout: RepositoryLayout,
}

impl From<&BuildConfig> for GenerationContext {
    fn from(config: &BuildConfig) -> Self {
        Self {
            test_root: config.test_root.clone(),
            temp_dir: config.temp_dir.clone(),
            android_root: config.android_root.clone(),
            layout: config.layout(),
        }
    }
}

/// What a generation task did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PackageOutcome {
    /// A description was written to `path`.
    Written { package: String, path: PathBuf },

    /// The package directory lacks a required file.
    Skipped { package: String, reason: String },
}

impl PackageOutcome {
    pub fn package(&self) -> &str {
        match self {
            PackageOutcome::Written { package, .. } | PackageOutcome::Skipped { package, .. } => {
                package
            }
        }
    }
}

fn log_generate(package: &str) {
    info!(package = %package, "Generating test description");
}

/// Signature check description, synthesised directly.
pub async fn generate_signature_check(layout: &RepositoryLayout) -> Result<PackageOutcome> {
    log_generate(SIGNATURE_PACKAGE);
    let package = TestPackage::new("SignatureTest", SIGNATURE_PACKAGE)
        .with_attribute(attr::APP_NAMESPACE, SIGNATURE_PACKAGE)
        .with_attribute(attr::SIGNATURE_CHECK, "true")
        .with_attribute(attr::RUNNER, ".InstrumentationRunner")
        .with_test("android.tests.sigtest.SignatureTest.signatureTest");
    write_synthesised(layout, &package).await
}

/// Reference application description, synthesised directly.
pub async fn generate_reference_app(layout: &RepositoryLayout) -> Result<PackageOutcome> {
    log_generate(REFERENCE_APP_PACKAGE);
    let package = TestPackage::new("ApiDemosReferenceTest", REFERENCE_APP_PACKAGE)
        .with_attribute(attr::APP_NAMESPACE, REFERENCE_APP_PACKAGE)
        .with_attribute(attr::PACKAGE_TO_TEST, "com.example.android.apis")
        .with_attribute(attr::APK_TO_TEST_NAME, "ApiDemos")
        .with_attribute(attr::RUNNER, "android.test.InstrumentationTestRunner")
        .with_attribute(attr::REFERENCE_APP_TEST, "true")
        .with_test("android.apidemos.cts.ApiDemosTest.testNumberOfItemsInListView");
    write_synthesised(layout, &package).await
}

/// Host-side app security description, generated from its sources.
pub async fn generate_app_security(
    ctx: &GenerationContext,
    tool: &dyn DescriptionTool,
) -> Result<PackageOutcome> {
    let test_root = ctx.android_root.join(APP_SECURITY_ROOT);
    let vars = BuildVariables::load(&test_root.join(MAKEFILE_NAME)).await?;
    let module = vars.get(VAR_MODULE)?;
    log_generate(APP_SECURITY_PACKAGE);

    let metadata = PackageMetadata {
        name: Some(APP_SECURITY_PACKAGE.to_string()),
        app_package_name: Some(APP_SECURITY_PACKAGE.to_string()),
        host_side_only: Some(true),
        jar_path: Some(format!("{module}.jar")),
        ..PackageMetadata::default()
    };

    let temp_desc = temp_description_path(ctx, APP_SECURITY_PACKAGE);
    let run = run_tool(tool, &test_root.join("src"), &temp_desc).await?;
    let dest = ctx.layout.description_path(APP_SECURITY_PACKAGE);
    merge_generated(&temp_desc, &run, &metadata, &dest).await?;

    Ok(PackageOutcome::Written {
        package: APP_SECURITY_PACKAGE.to_string(),
        path: dest,
    })
}

/// Description for the test package in `<test_root>/<package>`.
///
/// Directories without a make file or manifest are skipped, not failed.
pub async fn generate_package(
    ctx: &GenerationContext,
    tool: &dyn DescriptionTool,
    package: &str,
) -> Result<PackageOutcome> {
    let app_package_name = format!("android.{package}");
    let package_root = ctx.test_root.join(package);

    let makefile = package_root.join(MAKEFILE_NAME);
    if !exists(&makefile).await? {
        return Ok(skip(&app_package_name, &package_root, MAKEFILE_NAME));
    }
    let vars = BuildVariables::load(&makefile).await?;

    let manifest_path = package_root.join(MANIFEST_NAME);
    if !exists(&manifest_path).await? {
        return Ok(skip(&app_package_name, &package_root, MANIFEST_NAME));
    }
    let manifest = XmlFile::load(&manifest_path).await?;

    log_generate(&app_package_name);

    let package_name = vars.get(VAR_PACKAGE_NAME)?.to_string();
    let runner = manifest.android_attr("instrumentation", "name")?;
    let target_package = manifest.android_attr("instrumentation", "targetPackage")?;
    let test_package = manifest.attr("manifest", "package")?;

    let mut metadata = PackageMetadata {
        name: Some(package_name.clone()),
        runner: Some(runner),
        app_namespace: Some(test_package.clone()),
        app_package_name: Some(app_package_name.clone()),
        ..PackageMetadata::default()
    };
    if test_package != target_package {
        metadata.target_namespace = Some(target_package);
        metadata.target_binary_name = vars.get_opt(VAR_INSTRUMENTATION_FOR).map(str::to_string);
        if metadata.target_binary_name.is_none() {
            warn!(
                package = %app_package_name,
                "{VAR_INSTRUMENTATION_FOR} not set, leaving {} unset",
                attr::TARGET_BINARY_NAME
            );
        }
    }

    let temp_desc = temp_description_path(ctx, &app_package_name);
    let run = run_tool(tool, &package_root, &temp_desc).await?;
    let dest = ctx.layout.description_path(&package_name);
    merge_generated(&temp_desc, &run, &metadata, &dest).await?;

    Ok(PackageOutcome::Written {
        package: app_package_name,
        path: dest,
    })
}

fn skip(app_package_name: &str, package_root: &Path, missing: &str) -> PackageOutcome {
    warn!(
        "Skipping directory \"{}\" due to missing {missing}",
        package_root.display()
    );
    PackageOutcome::Skipped {
        package: app_package_name.to_string(),
        reason: format!("missing {missing}"),
    }
}

fn temp_description_path(ctx: &GenerationContext, app_package_name: &str) -> PathBuf {
    ctx.temp_dir
        .join(format!("{app_package_name}-description.xml"))
}

async fn exists(path: &Path) -> Result<bool> {
    tokio::fs::try_exists(path)
        .await
        .map_err(|e| BuildError::io(path, e))
}

/// Run the generator, clearing any stale output first.
///
/// A non-zero exit is only logged; the output is still parsed and a parse
/// failure carries the exit code.
async fn run_tool(
    tool: &dyn DescriptionTool,
    source_root: &Path,
    output: &Path,
) -> Result<ToolRun> {
    match tokio::fs::remove_file(output).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(BuildError::io(output, e)),
    }
    let run = tool.generate(source_root, output).await?;
    debug!(
        source_root = %source_root.display(),
        duration_ms = run.duration_ms,
        "Description generator finished"
    );
    if !run.success() {
        warn!(
            source_root = %source_root.display(),
            exit_code = ?run.exit_code,
            "Description generator failed, parsing its output anyway"
        );
    }
    Ok(run)
}

async fn merge_generated(
    temp_desc: &Path,
    run: &ToolRun,
    metadata: &PackageMetadata,
    dest: &Path,
) -> Result<()> {
    let parse_error = |message: String| BuildError::DescriptionParse {
        path: temp_desc.to_path_buf(),
        exit_code: run.exit_code,
        message,
    };

    let content = tokio::fs::read_to_string(temp_desc)
        .await
        .map_err(|e| parse_error(e.to_string()))?;
    let merged = merge_root_attributes(&content, &metadata.overrides())
        .map_err(|e| parse_error(e.to_string()))?
        .ok_or_else(|| parse_error(format!("no <{ROOT_ELEMENT}> element")))?;
    write_file(dest, &merged).await
}

async fn write_synthesised(
    layout: &RepositoryLayout,
    package: &TestPackage,
) -> Result<PackageOutcome> {
    let dest = layout.description_path(package.name());
    let bytes = package.to_xml().map_err(|e| BuildError::xml(&dest, e))?;
    write_file(&dest, &bytes).await?;
    Ok(PackageOutcome::Written {
        package: package.app_package_name().to_string(),
        path: dest,
    })
}

pub(crate) async fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| BuildError::io(parent, e))?;
    }
    tokio::fs::write(path, bytes)
        .await
        .map_err(|e| BuildError::io(path, e))
}
