//! Test plans: named subsets of the generated packages.
//!
//! A plan is an ordered list of include/exclude rules folded over the
//! universe of package identifiers. `Include` resets the working set to the
//! matching part of the universe; `Exclude` narrows the current working set.
//! Patterns are anchored at the start of the identifier only.

use crate::config::RepositoryLayout;
use crate::description::{attr, ROOT_ELEMENT};
use crate::error::{BuildError, Result};
use crate::generate::write_file;
use crate::xml_file::XmlFile;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::Writer;
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::info;

/// One step of a plan definition.
#[derive(Debug, Clone)]
pub enum PlanRule {
    Include(Regex),
    Exclude(Regex),
}

impl PlanRule {
    pub fn include(pattern: &str) -> Result<Self> {
        Ok(PlanRule::Include(anchored(pattern)?))
    }

    pub fn exclude(pattern: &str) -> Result<Self> {
        Ok(PlanRule::Exclude(anchored(pattern)?))
    }

    /// Apply this rule to `working`, drawing includes from `universe`.
    pub fn apply(&self, universe: &[String], working: Vec<String>) -> Vec<String> {
        match self {
            PlanRule::Include(re) => universe
                .iter()
                .filter(|id| re.is_match(id))
                .cloned()
                .collect(),
            PlanRule::Exclude(re) => working.into_iter().filter(|id| !re.is_match(id)).collect(),
        }
    }
}

fn anchored(pattern: &str) -> Result<Regex> {
    Ok(Regex::new(&format!("^(?:{pattern})"))?)
}

/// A named plan and the rules that define its membership.
#[derive(Debug, Clone)]
pub struct TestPlan {
    name: String,
    rules: Vec<PlanRule>,
}

impl TestPlan {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rules: Vec::new(),
        }
    }

    /// A new plan starting with all of `base`'s rules.
    pub fn derived(name: impl Into<String>, base: &TestPlan) -> Self {
        Self {
            name: name.into(),
            rules: base.rules.clone(),
        }
    }

    pub fn include(mut self, pattern: &str) -> Result<Self> {
        self.rules.push(PlanRule::include(pattern)?);
        Ok(self)
    }

    pub fn exclude(mut self, pattern: &str) -> Result<Self> {
        self.rules.push(PlanRule::exclude(pattern)?);
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rules(&self) -> &[PlanRule] {
        &self.rules
    }

    /// Members of this plan, in universe order.
    pub fn resolve(&self, universe: &[String]) -> Vec<String> {
        self.rules
            .iter()
            .fold(universe.to_vec(), |working, rule| rule.apply(universe, working))
    }
}

/// The fixed set of plans shipped with the repository.
pub fn default_plans() -> Result<Vec<TestPlan>> {
    let cts = TestPlan::new("CTS").exclude(r"android\.performance.*")?;
    let android = TestPlan::derived("Android", &cts)
        .exclude(r"android\.tests\.sigtest")?
        .exclude(r"android\.core.*")?;

    Ok(vec![
        cts,
        android,
        TestPlan::new("Java").include(r"android\.core\.tests.*")?,
        TestPlan::new("VM").include(r"android\.core\.vm-tests")?,
        TestPlan::new("Signature").include(r"android\.tests\.sigtest")?,
        TestPlan::new("RefApp").include(r"android\.apidemos\.cts")?,
        TestPlan::new("Performance").include(r"android\.performance.*")?,
        TestPlan::new("AppSecurity").include(r"android\.tests\.appsecurity")?,
    ])
}

/// Serialise plan members as a `TestPlan` document.
pub fn plan_document(members: &[String]) -> quick_xml::Result<Vec<u8>> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 4);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let mut root = BytesStart::new("TestPlan");
    root.push_attribute(("version", "1.0"));
    writer.write_event(Event::Start(root))?;
    for member in members {
        let mut entry = BytesStart::new("Entry");
        entry.push_attribute(("uri", member.as_str()));
        writer.write_event(Event::Empty(entry))?;
    }
    writer.write_event(Event::End(BytesEnd::new("TestPlan")))?;

    let mut bytes = writer.into_inner();
    bytes.push(b'\n');
    Ok(bytes)
}

/// Builds plan documents over the packages found in the repository.
#[derive(Debug, Clone)]
pub struct PlanBuilder {
    packages: Vec<String>,
}

impl PlanBuilder {
    pub fn new(packages: Vec<String>) -> Self {
        Self { packages }
    }

    /// Collect `appPackageName` from every description in `testcases`,
    /// ordered by description file path.
    pub async fn load(testcases: &Path) -> Result<Self> {
        let pattern = format!(
            "{}/*.xml",
            glob::Pattern::escape(&testcases.to_string_lossy())
        );
        let mut descriptions = glob::glob(&pattern)?.collect::<std::result::Result<Vec<PathBuf>, _>>()?;
        descriptions.sort();

        let mut packages = Vec::with_capacity(descriptions.len());
        for description in &descriptions {
            let doc = XmlFile::load(description).await?;
            packages.push(doc.attr(ROOT_ELEMENT, attr::APP_PACKAGE_NAME)?);
        }
        Ok(Self::new(packages))
    }

    pub fn packages(&self) -> &[String] {
        &self.packages
    }

    /// Resolve `plan` and write it to `path`. Returns the members.
    pub async fn write_plan(&self, plan: &TestPlan, path: &Path) -> Result<Vec<String>> {
        info!(plan = %plan.name(), "Generating test plan");
        let members = plan.resolve(&self.packages);
        let bytes = plan_document(&members).map_err(|e| BuildError::xml(path, e))?;
        write_file(path, &bytes).await?;
        Ok(members)
    }

    /// Write every plan in `plans` into the repository's plan directory.
    pub async fn write_all(
        &self,
        plans: &[TestPlan],
        layout: &RepositoryLayout,
    ) -> Result<Vec<PathBuf>> {
        let mut written = Vec::with_capacity(plans.len());
        for plan in plans {
            let path = layout.plan_path(plan.name());
            self.write_plan(plan, &path).await?;
            written.push(path);
        }
        Ok(written)
    }
}
