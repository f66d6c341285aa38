//! Test package description documents.
//!
//! Descriptions are either synthesised from scratch ([`TestPackage`]) or
//! produced by the external generator and then completed with metadata from
//! the make file and manifest ([`merge_root_attributes`]).

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};
use std::collections::HashSet;

/// Root element of every description document.
pub const ROOT_ELEMENT: &str = "TestPackage";

/// Attribute names on the root element.
pub mod attr {
    pub const NAME: &str = "name";
    pub const APP_PACKAGE_NAME: &str = "appPackageName";
    pub const APP_NAMESPACE: &str = "appNameSpace";
    pub const RUNNER: &str = "runner";
    pub const TARGET_NAMESPACE: &str = "targetNameSpace";
    pub const TARGET_BINARY_NAME: &str = "targetBinaryName";
    pub const SIGNATURE_CHECK: &str = "signatureCheck";
    pub const REFERENCE_APP_TEST: &str = "referenceAppTest";
    pub const PACKAGE_TO_TEST: &str = "packageToTest";
    pub const APK_TO_TEST_NAME: &str = "apkToTestName";
    pub const HOST_SIDE_ONLY: &str = "hostSideOnly";
    pub const JAR_PATH: &str = "jarPath";
}

/// Metadata gathered from the make file and manifest of one package.
///
/// Every field that is `Some` overwrites the attribute of the same name on
/// the generated root element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageMetadata {
    pub name: Option<String>,
    pub runner: Option<String>,
    pub app_namespace: Option<String>,
    pub app_package_name: Option<String>,
    pub target_namespace: Option<String>,
    pub target_binary_name: Option<String>,
    pub host_side_only: Option<bool>,
    pub jar_path: Option<String>,
}

type Accessor = fn(&PackageMetadata) -> Option<String>;

/// Attributes the metadata sources are authoritative for, in append order.
const AUTHORITATIVE: &[(&str, Accessor)] = &[
    (attr::NAME, |m| m.name.clone()),
    (attr::RUNNER, |m| m.runner.clone()),
    (attr::APP_NAMESPACE, |m| m.app_namespace.clone()),
    (attr::APP_PACKAGE_NAME, |m| m.app_package_name.clone()),
    (attr::TARGET_NAMESPACE, |m| m.target_namespace.clone()),
    (attr::TARGET_BINARY_NAME, |m| m.target_binary_name.clone()),
    (attr::HOST_SIDE_ONLY, |m| m.host_side_only.map(|b| b.to_string())),
    (attr::JAR_PATH, |m| m.jar_path.clone()),
];

impl PackageMetadata {
    /// Attribute values to force onto the root element.
    pub fn overrides(&self) -> Vec<(&'static str, String)> {
        AUTHORITATIVE
            .iter()
            .filter_map(|(name, get)| get(self).map(|value| (*name, value)))
            .collect()
    }
}

/// Rewrite the first `<TestPackage>` element of `content` with `overrides`.
///
/// Existing attributes keep their order and are replaced in place when
/// overridden; the remaining overrides are appended. Everything else in the
/// document is copied unchanged. Returns `None` when the document has no
/// root description element.
pub fn merge_root_attributes(
    content: &str,
    overrides: &[(&str, String)],
) -> quick_xml::Result<Option<Vec<u8>>> {
    let mut reader = Reader::from_str(content);
    let mut writer = Writer::new(Vec::new());
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    writer.get_mut().push(b'\n');

    let mut merged = false;
    let mut in_prolog = true;
    loop {
        match reader.read_event()? {
            Event::Eof => break,
            Event::Decl(_) => {}
            Event::Text(text) if in_prolog && text.iter().all(u8::is_ascii_whitespace) => {}
            Event::Start(start) if !merged && start.name().as_ref() == ROOT_ELEMENT.as_bytes() => {
                in_prolog = false;
                merged = true;
                writer.write_event(Event::Start(merge_start(&start, overrides)?))?;
            }
            Event::Empty(start) if !merged && start.name().as_ref() == ROOT_ELEMENT.as_bytes() => {
                in_prolog = false;
                merged = true;
                writer.write_event(Event::Empty(merge_start(&start, overrides)?))?;
            }
            event => {
                if matches!(event, Event::Start(_) | Event::Empty(_)) {
                    in_prolog = false;
                }
                writer.write_event(event)?;
            }
        }
    }

    if !merged {
        return Ok(None);
    }
    let mut bytes = writer.into_inner();
    if bytes.last() != Some(&b'\n') {
        bytes.push(b'\n');
    }
    Ok(Some(bytes))
}

fn merge_start(
    start: &BytesStart<'_>,
    overrides: &[(&str, String)],
) -> quick_xml::Result<BytesStart<'static>> {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut merged = BytesStart::new(name);
    let mut applied = HashSet::new();

    for attr in start.attributes() {
        let attr = attr?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        match overrides.iter().find(|(name, _)| *name == key) {
            Some((name, value)) => {
                merged.push_attribute((*name, value.as_str()));
                applied.insert(*name);
            }
            None => merged.push_attribute(attr),
        }
    }
    for (name, value) in overrides {
        if !applied.contains(name) {
            merged.push_attribute((*name, value.as_str()));
        }
    }
    Ok(merged)
}

/// A description synthesised without the external generator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestPackage {
    name: String,
    app_package_name: String,
    attributes: Vec<(String, String)>,
    tests: Vec<String>,
}

impl TestPackage {
    pub fn new(name: impl Into<String>, app_package_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            app_package_name: app_package_name.into(),
            attributes: Vec::new(),
            tests: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn app_package_name(&self) -> &str {
        &self.app_package_name
    }

    /// Set an attribute on the root element, replacing a previous value.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((key, value)),
        }
        self
    }

    /// Add a test by its fully qualified `package.Class.method` identifier.
    pub fn with_test(mut self, test: impl Into<String>) -> Self {
        self.tests.push(test.into());
        self
    }

    /// Serialise as a description document.
    pub fn to_xml(&self) -> quick_xml::Result<Vec<u8>> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 4);
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

        let mut root = BytesStart::new(ROOT_ELEMENT);
        root.push_attribute((attr::NAME, self.name.as_str()));
        root.push_attribute((attr::APP_PACKAGE_NAME, self.app_package_name.as_str()));
        for (key, value) in &self.attributes {
            root.push_attribute((key.as_str(), value.as_str()));
        }
        writer.write_event(Event::Start(root))?;
        SuiteNode::from_tests(&self.tests).write_children(&mut writer)?;
        writer.write_event(Event::End(BytesEnd::new(ROOT_ELEMENT)))?;

        let mut bytes = writer.into_inner();
        bytes.push(b'\n');
        Ok(bytes)
    }
}

/// Test identifiers grouped into nested suites by package segment.
#[derive(Debug, Default)]
struct SuiteNode {
    name: String,
    suites: Vec<SuiteNode>,
    cases: Vec<(String, Vec<String>)>,
}

impl SuiteNode {
    fn from_tests(tests: &[String]) -> Self {
        let mut root = SuiteNode::default();
        for test in tests {
            let mut parts: Vec<&str> = test.split('.').collect();
            let method = parts.pop().unwrap_or_default();
            let class = parts.pop().unwrap_or_default();
            root.suite_mut(&parts).add_test(class, method);
        }
        root
    }

    fn suite_mut(&mut self, path: &[&str]) -> &mut SuiteNode {
        let Some((first, rest)) = path.split_first() else {
            return self;
        };
        let index = match self.suites.iter().position(|s| s.name == *first) {
            Some(index) => index,
            None => {
                self.suites.push(SuiteNode {
                    name: first.to_string(),
                    ..SuiteNode::default()
                });
                self.suites.len() - 1
            }
        };
        self.suites[index].suite_mut(rest)
    }

    fn add_test(&mut self, class: &str, method: &str) {
        match self.cases.iter_mut().find(|(name, _)| name == class) {
            Some((_, methods)) => methods.push(method.to_string()),
            None => self
                .cases
                .push((class.to_string(), vec![method.to_string()])),
        }
    }

    fn write_children<W: std::io::Write>(&self, writer: &mut Writer<W>) -> quick_xml::Result<()> {
        for suite in &self.suites {
            let mut start = BytesStart::new("TestSuite");
            start.push_attribute(("name", suite.name.as_str()));
            writer.write_event(Event::Start(start))?;
            suite.write_children(writer)?;
            writer.write_event(Event::End(BytesEnd::new("TestSuite")))?;
        }
        for (class, methods) in &self.cases {
            let mut start = BytesStart::new("TestCase");
            start.push_attribute(("name", class.as_str()));
            writer.write_event(Event::Start(start))?;
            for method in methods {
                let mut test = BytesStart::new("Test");
                test.push_attribute(("name", method.as_str()));
                writer.write_event(Event::Empty(test))?;
            }
            writer.write_event(Event::End(BytesEnd::new("TestCase")))?;
        }
        Ok(())
    }
}
