// src/shader/preprocess.rs
//! Source preprocessing: `#define` injection and `#include` expansion.
//!
//! Defines are emitted in sorted key order, so preprocessing is deterministic:
//! the same source, defines and include registry always produce byte-identical
//! output. Include expansion is a single textual substitution pass — built-in
//! includes contain no further includes, so recursion is unnecessary.

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::OnceLock;

use log::warn;
use parking_lot::RwLock;

use super::source::parse_include;

/// Value of one preprocessor define.
#[derive(Clone, Debug, PartialEq)]
pub enum DefineValue {
    Text(String),
    Int(i64),
    Float(f64),
    /// `true` emits a bare `#define KEY`; `false` emits nothing.
    Bool(bool),
}

impl From<&str> for DefineValue {
    fn from(v: &str) -> Self {
        DefineValue::Text(v.to_string())
    }
}

impl From<i64> for DefineValue {
    fn from(v: i64) -> Self {
        DefineValue::Int(v)
    }
}

impl From<f64> for DefineValue {
    fn from(v: f64) -> Self {
        DefineValue::Float(v)
    }
}

impl From<bool> for DefineValue {
    fn from(v: bool) -> Self {
        DefineValue::Bool(v)
    }
}

/// An ordered set of compile-time defines.
///
/// Two define sets are equal only if they declare exactly the same keys with
/// exactly the same values — the equality used for variant lookup.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DefineSet(BTreeMap<String, DefineValue>);

impl DefineSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<DefineValue>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<DefineValue>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &DefineValue)> {
        self.0.iter()
    }

    /// Render `#define` lines, one per entry, in key order.
    fn emit(&self) -> String {
        let mut out = String::new();
        for (key, value) in &self.0 {
            match value {
                DefineValue::Text(v) => {
                    let _ = writeln!(out, "#define {} {}", key, v);
                }
                DefineValue::Int(v) => {
                    let _ = writeln!(out, "#define {} {}", key, v);
                }
                DefineValue::Float(v) => {
                    let _ = writeln!(out, "#define {} {:?}", key, v);
                }
                DefineValue::Bool(true) => {
                    let _ = writeln!(out, "#define {}", key);
                }
                DefineValue::Bool(false) => {}
            }
        }
        out
    }
}

fn include_registry() -> &'static RwLock<HashMap<String, String>> {
    static REGISTRY: OnceLock<RwLock<HashMap<String, String>>> = OnceLock::new();
    REGISTRY.get_or_init(|| RwLock::new(HashMap::new()))
}

/// Register (or replace) a named include in the global registry.
pub fn register_include(name: impl Into<String>, text: impl Into<String>) {
    include_registry().write().insert(name.into(), text.into());
}

/// Look up a registered include's text.
pub fn include_text(name: &str) -> Option<String> {
    include_registry().read().get(name).cloned()
}

/// Preprocess one stage's source: inject defines, then expand includes.
///
/// Define lines land immediately after the `#version` directive when present,
/// otherwise at the top of the file. Unresolved includes warn and are left
/// untouched, so compilation fails later with a driver error naming the
/// missing symbol rather than silently producing a broken program.
pub fn preprocess(source: &str, defines: &DefineSet) -> String {
    let defined = inject_defines(source, defines);
    expand_includes(&defined)
}

fn inject_defines(source: &str, defines: &DefineSet) -> String {
    if defines.is_empty() {
        return source.to_string();
    }
    let block = defines.emit();
    if block.is_empty() {
        return source.to_string();
    }

    match source
        .lines()
        .position(|line| line.trim_start().starts_with("#version"))
    {
        Some(version_idx) => {
            let mut out = String::with_capacity(source.len() + block.len());
            for (i, line) in source.lines().enumerate() {
                out.push_str(line);
                out.push('\n');
                if i == version_idx {
                    out.push_str(&block);
                }
            }
            out
        }
        None => {
            let mut out = block;
            out.push_str(source);
            out
        }
    }
}

fn expand_includes(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    for line in source.lines() {
        match parse_include(line) {
            Some(name) => match include_text(name) {
                Some(text) => {
                    out.push_str(&text);
                    if !text.ends_with('\n') {
                        out.push('\n');
                    }
                }
                None => {
                    warn!("unresolved include \"{}\" left untouched", name);
                    out.push_str(line);
                    out.push('\n');
                }
            },
            None => {
                out.push_str(line);
                out.push('\n');
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defines_land_after_version() {
        let src = "#version 330 core\nvoid main() {}\n";
        let defines = DefineSet::new().with("USE_FOG", true).with("MAX_STEPS", 8i64);
        let out = preprocess(src, &defines);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "#version 330 core");
        assert_eq!(lines[1], "#define MAX_STEPS 8");
        assert_eq!(lines[2], "#define USE_FOG");
    }

    #[test]
    fn test_defines_prepended_without_version() {
        let src = "void main() {}\n";
        let defines = DefineSet::new().with("A", 1i64);
        let out = preprocess(src, &defines);
        assert!(out.starts_with("#define A 1\n"));
    }

    #[test]
    fn test_false_bool_emits_nothing() {
        let src = "#version 330 core\nvoid main() {}\n";
        let defines = DefineSet::new().with("DISABLED", false);
        let out = preprocess(src, &defines);
        assert!(!out.contains("DISABLED"));
    }

    #[test]
    fn test_include_expansion_and_idempotence() {
        register_include("test_idempotence_inc", "float helper() { return 1.0; }");
        let src = "#version 330 core\n#include \"test_idempotence_inc\"\nvoid main() {}\n";
        let defines = DefineSet::new().with("X", 2i64);
        let first = preprocess(src, &defines);
        let second = preprocess(src, &defines);
        assert!(first.contains("float helper()"));
        assert!(!first.contains("#include"));
        assert_eq!(first, second);
    }

    #[test]
    fn test_unresolved_include_left_untouched() {
        let src = "#include \"no_such_include_anywhere\"\nvoid main() {}\n";
        let out = preprocess(src, &DefineSet::new());
        assert!(out.contains("#include \"no_such_include_anywhere\""));
    }

    #[test]
    fn test_define_set_equality_is_exact() {
        let a = DefineSet::new().with("A", 1i64).with("B", true);
        let b = DefineSet::new().with("B", true).with("A", 1i64);
        let c = DefineSet::new().with("A", 2i64).with("B", true);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
