//! Class structure from `javap -v` output.
//!
//! The report is read line by line:
//!
//! - before the member block (`{`), the first line made of modifiers, a
//!   `class` / `interface` / `enum` keyword and a qualified name is the
//!   declaration;
//! - inside it, `modifiers type name(params);` lines are methods and
//!   `modifiers type name;` lines are fields;
//! - a `LocalVariableTable:` block following a method supplies its parameter
//!   names by slot.
//!
//! The layout assumptions match javap from JDK 8 through 21. Lines that do not
//! fit are skipped, so a layout change yields a partial analysis rather than
//! an error.

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{FinderError, Result};
use crate::indexer::ClassIndexer;
use crate::store::ProjectStore;
use crate::toolchain::Toolchain;
use crate::unit::UnitName;

const DECLARATION_MODIFIERS: [&str; 9] = [
    "public",
    "protected",
    "private",
    "abstract",
    "static",
    "final",
    "strictfp",
    "sealed",
    "non-sealed",
];

const MEMBER_MODIFIERS: [&str; 12] = [
    "public",
    "protected",
    "private",
    "static",
    "final",
    "abstract",
    "synchronized",
    "native",
    "strictfp",
    "transient",
    "volatile",
    "default",
];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassAnalysis {
    pub class_name: String,
    pub package_name: String,
    pub kind: String,
    pub modifiers: Vec<String>,
    pub super_class: Option<String>,
    pub interfaces: Vec<String>,
    pub fields: Vec<FieldInfo>,
    pub methods: Vec<MethodInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    pub modifiers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodInfo {
    pub name: String,
    /// Empty for constructors.
    pub return_type: String,
    /// `"type name"`, in declaration order.
    pub parameters: Vec<String>,
    pub modifiers: Vec<String>,
}

#[derive(Clone)]
pub struct ClassAnalyzer {
    indexer: ClassIndexer,
    toolchain: Arc<dyn Toolchain>,
}

impl ClassAnalyzer {
    pub fn new(indexer: ClassIndexer, toolchain: Arc<dyn Toolchain>) -> Self {
        Self { indexer, toolchain }
    }

    /// Disassembles `unit_name` from its indexed jar and parses the report.
    ///
    /// Builds the project index first when there is none.
    pub fn describe(&self, store: &ProjectStore, unit_name: &str) -> Result<ClassAnalysis> {
        let unit = UnitName::parse(unit_name)?;

        let archive = match self.indexer.find_archive_within_timeout(store, &unit) {
            Err(FinderError::IndexMissing { .. }) => {
                log::info!("no class index yet for {}, scanning", store.project_root().display());
                self.indexer.scan(store, false)?;
                self.indexer.find_archive_within_timeout(store, &unit)?
            }
            other => other?,
        }
        .ok_or_else(|| FinderError::UnitNotIndexed {
            unit: unit.to_string(),
            project: store.project_root().to_path_buf(),
        })?;

        let report = self.toolchain.disassemble(&archive, unit.as_str())?;
        parse_disassembly(&report, &unit)
    }
}

/// Parses a `javap -v` report.
///
/// Fails only when the report contains neither a declaration nor any member;
/// otherwise missing pieces are left empty and the names fall back to `unit`.
pub fn parse_disassembly(report: &str, unit: &UnitName) -> Result<ClassAnalysis> {
    let mut parser = ReportParser::default();
    for line in report.lines() {
        parser.feed(line);
    }
    parser.finish(unit)
}

#[derive(Default)]
struct ReportParser {
    analysis: ClassAnalysis,
    declared: bool,
    in_body: bool,
    capturing: bool,
    slots: BTreeMap<usize, String>,
    pending: Option<PendingMethod>,
}

/// A method whose parameter types are parsed but not yet named.
struct PendingMethod {
    index: usize,
    param_types: Vec<String>,
}

impl ReportParser {
    fn feed(&mut self, raw: &str) {
        let line = raw.trim();

        if self.capturing {
            if line.is_empty() {
                self.close_method();
                return;
            }
            if let Some((slot, name)) = parse_local_variable_row(line) {
                self.slots.entry(slot).or_insert(name);
                return;
            }
            let ends_method = line == "}" || is_static_initializer(line);
            if !ends_method && parse_method(line).is_none() {
                return;
            }
        }

        if !self.in_body {
            // Plain `javap` puts the opening brace on the declaration line.
            let (head, opens_body) = match line.strip_suffix('{') {
                Some(head) => (head.trim_end(), true),
                None => (line, false),
            };
            let mut declared_here = false;
            if !self.declared
                && let Some(decl) = parse_declaration(head)
            {
                self.apply_declaration(decl);
                declared_here = true;
            }
            self.in_body = opens_body && (head.is_empty() || declared_here);
            return;
        }

        if line == "}" && !raw.starts_with(char::is_whitespace) {
            self.close_method();
            self.in_body = false;
            return;
        }

        if line.starts_with("LocalVariableTable:") {
            self.capturing = true;
            return;
        }

        if is_static_initializer(line) {
            self.close_method();
            return;
        }

        if let Some((method, param_types)) = parse_method(line) {
            self.close_method();
            self.pending = Some(PendingMethod {
                index: self.analysis.methods.len(),
                param_types,
            });
            self.analysis.methods.push(method);
            return;
        }

        if let Some(field) = parse_field(line) {
            self.close_method();
            self.analysis.fields.push(field);
        }
    }

    /// Names the pending method's parameters from the captured slots and resets capture state.
    fn close_method(&mut self) {
        if let Some(pending) = self.pending.take() {
            let named = name_parameters(&pending.param_types, &self.slots);
            if let Some(method) = self.analysis.methods.get_mut(pending.index) {
                method.parameters = named;
            }
        }
        self.slots.clear();
        self.capturing = false;
    }

    fn apply_declaration(&mut self, decl: Declaration) {
        let (package_name, class_name) = match decl.qualified_name.rfind('.') {
            Some(idx) => (
                decl.qualified_name[..idx].to_string(),
                decl.qualified_name[idx + 1..].to_string(),
            ),
            None => (String::new(), decl.qualified_name.clone()),
        };
        self.analysis.kind = decl.kind;
        self.analysis.class_name = class_name;
        self.analysis.package_name = package_name;
        self.analysis.modifiers = decl.modifiers;
        self.analysis.super_class = decl.super_class;
        self.analysis.interfaces = decl.interfaces;
        self.declared = true;
    }

    fn finish(mut self, unit: &UnitName) -> Result<ClassAnalysis> {
        self.close_method();

        let empty = self.analysis.methods.is_empty() && self.analysis.fields.is_empty();
        if !self.declared {
            if empty {
                return Err(FinderError::NoDeclarationFound {
                    unit: unit.to_string(),
                });
            }
            log::warn!("javap output for {unit} has members but no declaration line");
            self.analysis.class_name = unit.simple_name().to_string();
            self.analysis.package_name = unit.package_name().to_string();
        }
        Ok(self.analysis)
    }
}

struct Declaration {
    kind: String,
    qualified_name: String,
    modifiers: Vec<String>,
    super_class: Option<String>,
    interfaces: Vec<String>,
}

fn parse_declaration(line: &str) -> Option<Declaration> {
    let (modifiers, rest) = take_modifiers(line, &DECLARATION_MODIFIERS);
    let (keyword, rest) = rest.split_once(' ')?;
    if !matches!(keyword, "class" | "interface" | "enum") {
        return None;
    }

    let words = split_top_level_whitespace(rest);
    let (name, clauses) = words.split_first()?;
    let qualified_name = strip_type_arguments(name);
    if qualified_name.is_empty() || qualified_name.contains(['/', ':', '#']) {
        return None;
    }

    #[derive(Clone, Copy)]
    enum Clause {
        None,
        Extends,
        Implements,
    }

    let mut extends: Vec<&str> = Vec::new();
    let mut implements: Vec<&str> = Vec::new();
    let mut clause = Clause::None;
    for word in clauses {
        match (word.as_str(), clause) {
            ("extends", _) => clause = Clause::Extends,
            ("implements", _) => clause = Clause::Implements,
            ("permits", _) => clause = Clause::None,
            (other, Clause::Extends) => extends.push(other),
            (other, Clause::Implements) => implements.push(other),
            (_, Clause::None) => {}
        }
    }
    let extends = split_parameters(&extends.join(" "));
    let implements = split_parameters(&implements.join(" "));

    let (super_class, mut interfaces): (Option<String>, Vec<String>) = if keyword == "interface" {
        (None, extends.into_iter().chain(implements).collect())
    } else {
        (extends.into_iter().next(), implements)
    };
    dedup_in_order(&mut interfaces);

    let kind = match (keyword, super_class.as_deref()) {
        ("enum", _) => "enum",
        (_, Some(s)) if s.starts_with("java.lang.Enum<") => "enum",
        (_, Some("java.lang.Record")) => "record",
        ("interface", _) if interfaces.iter().any(|i| i == "java.lang.annotation.Annotation") => {
            "annotation"
        }
        (kw, _) => kw,
    };

    Some(Declaration {
        kind: kind.to_string(),
        qualified_name,
        modifiers,
        super_class,
        interfaces,
    })
}

/// `modifiers returnType name(params) [throws ...];` → method plus raw parameter types.
fn parse_method(line: &str) -> Option<(MethodInfo, Vec<String>)> {
    let body = line.strip_suffix(';')?;
    let open = body.find('(')?;
    let close = body.rfind(')')?;
    if close < open {
        return None;
    }

    let head = &body[..open];
    if !starts_like_declaration(head) || head.contains([':', '=', '#', '"', '/', '{']) {
        return None;
    }

    let (modifiers, rest) = take_modifiers(head, &MEMBER_MODIFIERS);
    let rest = rest.trim();
    let (mut return_type, name) = match rest.rfind(' ') {
        Some(idx) => (rest[..idx].trim().to_string(), &rest[idx + 1..]),
        None => (String::new(), rest),
    };
    // Generic constructors print only their type parameters before the name.
    if is_type_parameter_list(&return_type) {
        return_type.clear();
    }
    // Constructors are printed with their qualified class name.
    let name = match (return_type.is_empty(), name.rfind('.')) {
        (true, Some(idx)) => &name[idx + 1..],
        _ => name,
    };
    if !is_member_name(name) {
        return None;
    }

    let param_types = split_parameters(&body[open + 1..close]);
    Some((
        MethodInfo {
            name: name.to_string(),
            return_type,
            parameters: param_types.clone(),
            modifiers,
        },
        param_types,
    ))
}

/// `modifiers type name;`
fn parse_field(line: &str) -> Option<FieldInfo> {
    let body = line.strip_suffix(';')?;
    if !starts_like_declaration(body) || body.contains(['(', ')', ':', '=', '#', '"', '/', '{', '}']) {
        return None;
    }

    let (modifiers, rest) = take_modifiers(body, &MEMBER_MODIFIERS);
    let rest = rest.trim();
    let idx = rest.rfind(' ')?;
    let field_type = rest[..idx].trim();
    let name = &rest[idx + 1..];
    if field_type.is_empty() || !is_member_name(name) {
        return None;
    }

    Some(FieldInfo {
        name: name.to_string(),
        field_type: field_type.to_string(),
        modifiers,
    })
}

/// `Start Length Slot Name Signature` → `(slot, name)`.
fn parse_local_variable_row(line: &str) -> Option<(usize, String)> {
    let cols: Vec<&str> = line.split_whitespace().collect();
    if cols.len() < 5 {
        return None;
    }
    cols[0].parse::<usize>().ok()?;
    cols[1].parse::<usize>().ok()?;
    let slot = cols[2].parse::<usize>().ok()?;
    Some((slot, cols[3].to_string()))
}

fn is_static_initializer(line: &str) -> bool {
    line == "static {};"
}

/// Parameter `i` lives at slot `base + Σ width(previous)`, where `base` skips `this`
/// and `long` / `double` take two slots. Unnamed slots become `param{i+1}`.
fn name_parameters(param_types: &[String], slots: &BTreeMap<usize, String>) -> Vec<String> {
    let mut slot = match slots.get(&0) {
        Some(name) if name == "this" => 1,
        _ => 0,
    };
    param_types
        .iter()
        .enumerate()
        .map(|(i, ty)| {
            let name = slots
                .get(&slot)
                .cloned()
                .unwrap_or_else(|| format!("param{}", i + 1));
            slot += if ty == "long" || ty == "double" { 2 } else { 1 };
            format!("{ty} {name}")
        })
        .collect()
}

/// Splits on commas outside `<...>`, trimming each part and dropping empty ones.
///
/// `Map<String, List<Integer>>, boolean` → `["Map<String, List<Integer>>", "boolean"]`.
pub fn split_parameters(list: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut current = String::new();
    for c in list.chars() {
        match c {
            '<' => {
                depth += 1;
                current.push(c);
            }
            '>' => {
                depth = depth.saturating_sub(1);
                current.push(c);
            }
            ',' if depth == 0 => {
                push_trimmed(&mut parts, &current);
                current.clear();
            }
            _ => current.push(c),
        }
    }
    push_trimmed(&mut parts, &current);
    parts
}

fn push_trimmed(parts: &mut Vec<String>, part: &str) {
    let part = part.trim();
    if !part.is_empty() {
        parts.push(part.to_string());
    }
}

fn split_top_level_whitespace(s: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut depth = 0usize;
    let mut current = String::new();
    for c in s.chars() {
        match c {
            '<' => {
                depth += 1;
                current.push(c);
            }
            '>' => {
                depth = depth.saturating_sub(1);
                current.push(c);
            }
            c if c.is_whitespace() && depth == 0 => push_trimmed(&mut words, &std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    push_trimmed(&mut words, &current);
    words
}

fn take_modifiers<'a>(line: &'a str, keywords: &[&str]) -> (Vec<String>, &'a str) {
    let mut modifiers = Vec::new();
    let mut rest = line.trim_start();
    while let Some((word, tail)) = rest.split_once(' ') {
        if !keywords.contains(&word) {
            break;
        }
        if !modifiers.iter().any(|m| m == word) {
            modifiers.push(word.to_string());
        }
        rest = tail.trim_start();
    }
    (modifiers, rest)
}

fn strip_type_arguments(name: &str) -> String {
    name.split('<').next().unwrap_or(name).trim().to_string()
}

fn starts_like_declaration(s: &str) -> bool {
    s.chars()
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '<' || c == '_' || c == '$')
}

/// `<T>` or `<K, V extends java.lang.Comparable<V>>` with nothing after it.
fn is_type_parameter_list(s: &str) -> bool {
    s.starts_with('<') && s.ends_with('>') && split_top_level_whitespace(s).len() == 1
}

fn is_member_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '$')
}

fn dedup_in_order(items: &mut Vec<String>) {
    let mut seen = std::collections::HashSet::new();
    items.retain(|i| seen.insert(i.clone()));
}
