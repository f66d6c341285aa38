//! Attribute lookup in XML documents (manifests and descriptions).

use crate::error::{BuildError, Result};
use quick_xml::events::Event;
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::NsReader;
use std::path::{Path, PathBuf};

/// Namespace of the `android:` attributes in `AndroidManifest.xml`.
pub const ANDROID_NS: &str = "http://schemas.android.com/apk/res/android";

/// Read-only view over an XML document on disk.
#[derive(Debug, Clone)]
pub struct XmlFile {
    path: PathBuf,
    content: String,
}

impl XmlFile {
    pub async fn load(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| BuildError::io(path, e))?;
        Ok(Self::from_string(path, content))
    }

    pub fn from_string(path: &Path, content: impl Into<String>) -> Self {
        Self {
            path: path.to_path_buf(),
            content: content.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Attribute `attribute` of the first `<element>` in document order.
    pub fn attr(&self, element: &str, attribute: &str) -> Result<String> {
        self.find_attr(element, None, attribute)
    }

    /// Attribute `attribute` in namespace `namespace` of the first `<element>`.
    pub fn ns_attr(&self, namespace: &str, element: &str, attribute: &str) -> Result<String> {
        self.find_attr(element, Some(namespace), attribute)
    }

    /// Shorthand for an `android:` attribute.
    pub fn android_attr(&self, element: &str, attribute: &str) -> Result<String> {
        self.ns_attr(ANDROID_NS, element, attribute)
    }

    fn find_attr(&self, element: &str, namespace: Option<&str>, attribute: &str) -> Result<String> {
        let mut reader = NsReader::from_str(&self.content);
        loop {
            let event = reader
                .read_event()
                .map_err(|e| BuildError::xml(&self.path, e))?;
            match event {
                Event::Start(start) | Event::Empty(start)
                    if start.name().as_ref() == element.as_bytes() =>
                {
                    for attr in start.attributes() {
                        let attr = attr.map_err(|e| BuildError::xml(&self.path, e))?;
                        let matches = match namespace {
                            None => attr.key.as_ref() == attribute.as_bytes(),
                            Some(ns) => {
                                let (resolved, local) = reader.resolve_attribute(attr.key);
                                local.as_ref() == attribute.as_bytes()
                                    && matches!(
                                        resolved,
                                        ResolveResult::Bound(Namespace(bound)) if bound == ns.as_bytes()
                                    )
                            }
                        };
                        if matches {
                            let value = attr
                                .unescape_value()
                                .map_err(|e| BuildError::xml(&self.path, e))?;
                            return Ok(value.into_owned());
                        }
                    }
                    return Err(BuildError::MissingAttribute {
                        element: element.to_string(),
                        attribute: attribute.to_string(),
                        path: self.path.clone(),
                    });
                }
                Event::Eof => {
                    return Err(BuildError::MissingElement {
                        element: element.to_string(),
                        path: self.path.clone(),
                    })
                }
                _ => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<manifest xmlns:android="http://schemas.android.com/apk/res/android"
    package="com.android.cts.os">
    <application>
        <uses-library android:name="android.test.runner" />
    </application>
    <instrumentation android:name="android.test.InstrumentationCtsTestRunner"
                     android:targetPackage="com.android.cts.stub"
                     android:label="CTS tests of android.os"/>
</manifest>
"#;

    fn manifest() -> XmlFile {
        XmlFile::from_string(Path::new("AndroidManifest.xml"), MANIFEST)
    }

    #[test]
    fn test_plain_attribute() {
        assert_eq!(
            manifest().attr("manifest", "package").unwrap(),
            "com.android.cts.os"
        );
    }

    #[test]
    fn test_android_namespaced_attribute() {
        let m = manifest();
        assert_eq!(
            m.android_attr("instrumentation", "name").unwrap(),
            "android.test.InstrumentationCtsTestRunner"
        );
        assert_eq!(
            m.android_attr("instrumentation", "targetPackage").unwrap(),
            "com.android.cts.stub"
        );
    }

    #[test]
    fn test_namespaced_lookup_ignores_unprefixed_attribute() {
        let doc = XmlFile::from_string(
            Path::new("m.xml"),
            r#"<manifest xmlns:android="http://schemas.android.com/apk/res/android"><instrumentation name="plain"/></manifest>"#,
        );
        let err = doc.android_attr("instrumentation", "name").unwrap_err();
        assert!(matches!(err, BuildError::MissingAttribute { .. }));
        assert_eq!(doc.attr("instrumentation", "name").unwrap(), "plain");
    }

    #[test]
    fn test_first_matching_element_wins() {
        let doc = XmlFile::from_string(
            Path::new("d.xml"),
            r#"<root><TestPackage appPackageName="android.first"/><TestPackage appPackageName="android.second"/></root>"#,
        );
        assert_eq!(
            doc.attr("TestPackage", "appPackageName").unwrap(),
            "android.first"
        );
    }

    #[test]
    fn test_missing_element() {
        let err = manifest().attr("uses-sdk", "minSdkVersion").unwrap_err();
        assert!(matches!(err, BuildError::MissingElement { ref element, .. } if element == "uses-sdk"));
    }

    #[test]
    fn test_missing_attribute() {
        let err = manifest().attr("manifest", "versionCode").unwrap_err();
        assert!(matches!(err, BuildError::MissingAttribute { ref attribute, .. } if attribute == "versionCode"));
    }

    #[test]
    fn test_escaped_value_is_unescaped() {
        let doc = XmlFile::from_string(
            Path::new("d.xml"),
            r#"<TestPackage name="A&amp;B"/>"#,
        );
        assert_eq!(doc.attr("TestPackage", "name").unwrap(), "A&B");
    }
}
