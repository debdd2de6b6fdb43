// src/shader/source.rs
//! Shader source text and static reflection.
//!
//! Reflection here is textual: it scans global-scope declarations for
//! uniforms, attributes and varyings, and enumerates `#include` directives.
//! It deliberately does not parse GLSL — the compiler does that; this pass
//! exists so tooling can inspect a shader before it ever reaches a device.

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use crate::gpu::{ShaderStage, SymbolKind};

/// A symbol declared in source text (before link-time dead-code elimination).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeclaredSymbol {
    pub kind: SymbolKind,
    /// Array size; `1` for non-arrays.
    pub size: u32,
}

/// Result of statically analyzing one stage.
#[derive(Clone, Debug, Default)]
pub struct StageReflection {
    pub uniforms: BTreeMap<String, DeclaredSymbol>,
    pub attributes: BTreeMap<String, DeclaredSymbol>,
    pub varyings: BTreeMap<String, DeclaredSymbol>,
    pub includes: BTreeSet<String>,
}

/// Shader source for up to three stages, re-analyzed whenever source changes.
///
/// Immutable identity (`name`); consumers never mutate a `Shader` in place —
/// replacing source goes through [`Shader::set_source`], which re-runs
/// reflection.
#[derive(Clone, Debug)]
pub struct Shader {
    name: String,
    vertex: Option<String>,
    fragment: Option<String>,
    geometry: Option<String>,
    uniforms: BTreeMap<String, DeclaredSymbol>,
    attributes: BTreeMap<String, DeclaredSymbol>,
    varyings: BTreeMap<String, DeclaredSymbol>,
    dependencies: BTreeSet<String>,
}

impl Shader {
    pub fn new(
        name: impl Into<String>,
        vertex: Option<String>,
        fragment: Option<String>,
        geometry: Option<String>,
    ) -> Self {
        let mut shader = Self {
            name: name.into(),
            vertex,
            fragment,
            geometry,
            uniforms: BTreeMap::new(),
            attributes: BTreeMap::new(),
            varyings: BTreeMap::new(),
            dependencies: BTreeSet::new(),
        };
        shader.analyze();
        shader
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stage_source(&self, stage: ShaderStage) -> Option<&str> {
        match stage {
            ShaderStage::Vertex => self.vertex.as_deref(),
            ShaderStage::Fragment => self.fragment.as_deref(),
            ShaderStage::Geometry => self.geometry.as_deref(),
        }
    }

    /// Stages present on this shader, in compile order.
    pub fn stages(&self) -> impl Iterator<Item = (ShaderStage, &str)> {
        [
            (ShaderStage::Vertex, self.vertex.as_deref()),
            (ShaderStage::Fragment, self.fragment.as_deref()),
            (ShaderStage::Geometry, self.geometry.as_deref()),
        ]
        .into_iter()
        .filter_map(|(stage, src)| src.map(|s| (stage, s)))
    }

    /// Replace a stage's source and re-run reflection.
    pub fn set_source(&mut self, stage: ShaderStage, source: Option<String>) {
        match stage {
            ShaderStage::Vertex => self.vertex = source,
            ShaderStage::Fragment => self.fragment = source,
            ShaderStage::Geometry => self.geometry = source,
        }
        self.analyze();
    }

    pub fn uniforms(&self) -> &BTreeMap<String, DeclaredSymbol> {
        &self.uniforms
    }

    pub fn attributes(&self) -> &BTreeMap<String, DeclaredSymbol> {
        &self.attributes
    }

    pub fn varyings(&self) -> &BTreeMap<String, DeclaredSymbol> {
        &self.varyings
    }

    /// Names of `#include` dependencies across all stages.
    pub fn dependencies(&self) -> &BTreeSet<String> {
        &self.dependencies
    }

    fn analyze(&mut self) {
        self.uniforms.clear();
        self.attributes.clear();
        self.varyings.clear();
        self.dependencies.clear();
        for (stage, source) in [
            (ShaderStage::Vertex, self.vertex.clone()),
            (ShaderStage::Fragment, self.fragment.clone()),
            (ShaderStage::Geometry, self.geometry.clone()),
        ] {
            let Some(source) = source else { continue };
            let reflection = reflect_stage(stage, &source);
            self.uniforms.extend(reflection.uniforms);
            self.attributes.extend(reflection.attributes);
            self.varyings.extend(reflection.varyings);
            self.dependencies.extend(reflection.includes);
        }
    }
}

/// Remove `//` and `/* */` comments, preserving line structure.
pub fn strip_comments(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut chars = source.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '/' && chars.peek() == Some(&'/') {
            for c in chars.by_ref() {
                if c == '\n' {
                    out.push('\n');
                    break;
                }
            }
        } else if c == '/' && chars.peek() == Some(&'*') {
            chars.next();
            let mut prev = '\0';
            for c in chars.by_ref() {
                if prev == '*' && c == '/' {
                    break;
                }
                if c == '\n' {
                    out.push('\n');
                }
                prev = c;
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Statically analyze one stage's source.
pub fn reflect_stage(stage: ShaderStage, source: &str) -> StageReflection {
    let stripped = strip_comments(source);
    let mut reflection = StageReflection::default();

    // Includes are line-based directives.
    for line in stripped.lines() {
        if let Some(name) = parse_include(line) {
            reflection.includes.insert(name.to_string());
        }
    }

    for statement in global_statements(&stripped) {
        let Some((storage, kind, declarators)) = parse_declaration(&statement) else {
            continue;
        };
        for (name, size) in declarators {
            let symbol = DeclaredSymbol { kind, size };
            match (storage, stage) {
                (Storage::Uniform, _) => {
                    reflection.uniforms.insert(name, symbol);
                }
                (Storage::In, ShaderStage::Vertex) => {
                    reflection.attributes.insert(name, symbol);
                }
                (Storage::Out, ShaderStage::Vertex)
                | (Storage::In, ShaderStage::Fragment)
                | (Storage::Varying, _) => {
                    reflection.varyings.insert(name, symbol);
                }
                // Fragment outputs and geometry-stage in/out are not part of
                // the interface this crate introspects.
                _ => {}
            }
        }
    }
    reflection
}

/// Text inside function bodies (brace depth > 0), used by the headless linker
/// to decide which declared uniforms a stage actually references.
pub fn function_body_text(source: &str) -> String {
    let stripped = strip_comments(source);
    let mut out = String::new();
    let mut depth = 0i32;
    for c in stripped.chars() {
        match c {
            '{' => depth += 1,
            '}' => depth -= 1,
            _ if depth > 0 => out.push(c),
            _ => {}
        }
    }
    out
}

/// Whole-word occurrence test for identifiers.
pub fn references_symbol(text: &str, name: &str) -> bool {
    let bytes = text.as_bytes();
    let mut start = 0;
    while let Some(pos) = text[start..].find(name) {
        let at = start + pos;
        let end = at + name.len();
        let before_ok = at == 0 || !is_ident_char(bytes[at - 1]);
        let after_ok = end >= bytes.len() || !is_ident_char(bytes[end]);
        if before_ok && after_ok {
            return true;
        }
        start = at + 1;
    }
    false
}

fn is_ident_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Parse `#include "name"`; returns the include name.
pub fn parse_include(line: &str) -> Option<&str> {
    let rest = line.trim_start().strip_prefix("#include")?.trim();
    let rest = rest.strip_prefix('"')?;
    let end = rest.find('"')?;
    Some(&rest[..end])
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Storage {
    Uniform,
    In,
    Out,
    /// Legacy GLSL `varying`: the interpolated interface in either stage.
    Varying,
}

/// Split source into `;`-terminated statements at global scope, with
/// preprocessor lines and `layout(...)` qualifiers removed.
fn global_statements(stripped: &str) -> Vec<String> {
    let mut text = String::with_capacity(stripped.len());
    for line in stripped.lines() {
        if !line.trim_start().starts_with('#') {
            text.push_str(line);
            text.push('\n');
        }
    }

    let mut statements = Vec::new();
    let mut current = String::new();
    let mut depth = 0i32;
    for c in text.chars() {
        match c {
            '{' => {
                depth += 1;
                current.clear();
            }
            '}' => {
                depth -= 1;
                current.clear();
            }
            ';' if depth == 0 => {
                statements.push(remove_layout(&current));
                current.clear();
            }
            _ if depth == 0 => current.push(c),
            _ => {}
        }
    }
    statements
}

fn remove_layout(statement: &str) -> String {
    let mut out = String::with_capacity(statement.len());
    let mut rest = statement;
    while let Some(pos) = rest.find("layout") {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + "layout".len()..];
        if let Some(open) = after.find('(') {
            if let Some(close) = after[open..].find(')') {
                rest = &after[open + close + 1..];
                continue;
            }
        }
        rest = after;
    }
    out.push_str(rest);
    out
}

/// Parse one global statement into (storage, type, declarators).
fn parse_declaration(statement: &str) -> Option<(Storage, SymbolKind, Vec<(String, u32)>)> {
    let mut tokens = statement.split_whitespace();
    let storage = loop {
        match tokens.next()? {
            "uniform" => break Storage::Uniform,
            "attribute" => break Storage::In,
            "varying" => break Storage::Varying,
            "in" => break Storage::In,
            "out" => break Storage::Out,
            "flat" | "smooth" | "noperspective" | "centroid" | "invariant" => continue,
            _ => return None,
        }
    };

    let mut type_token = tokens.next()?;
    if matches!(type_token, "highp" | "mediump" | "lowp") {
        type_token = tokens.next()?;
    }
    let kind = SymbolKind::from_glsl(type_token)?;

    let remainder: String = tokens.collect::<Vec<_>>().join(" ");
    let mut declarators = Vec::new();
    for decl in remainder.split(',') {
        let decl = decl.split('=').next().unwrap_or("").trim();
        if decl.is_empty() {
            continue;
        }
        let (name, size) = match decl.find('[') {
            Some(open) => {
                let name = decl[..open].trim();
                let size = decl[open + 1..]
                    .trim_end_matches(']')
                    .trim()
                    .parse::<u32>()
                    .unwrap_or(1);
                (name, size.max(1))
            }
            None => (decl, 1),
        };
        if !name.is_empty() {
            declarators.push((name.to_string(), size));
        }
    }
    if declarators.is_empty() {
        return None;
    }
    Some((storage, kind, declarators))
}

#[cfg(test)]
mod tests {
    use super::*;

    const VERT: &str = r#"
        #version 330 core
        #include "common"
        layout(location = 0) in vec3 a_position;
        in vec2 a_uv;
        out vec2 v_uv;
        uniform mat4 u_model;
        uniform mat4 u_view_proj;
        uniform vec3 u_offsets[8];
        void main() {
            v_uv = a_uv;
            gl_Position = u_view_proj * u_model * vec4(a_position + u_offsets[0], 1.0);
        }
    "#;

    #[test]
    fn test_reflect_vertex_stage() {
        let r = reflect_stage(ShaderStage::Vertex, VERT);
        assert_eq!(r.attributes.len(), 2);
        assert_eq!(r.attributes["a_position"].kind, SymbolKind::Vec3);
        assert_eq!(r.varyings["v_uv"].kind, SymbolKind::Vec2);
        assert_eq!(r.uniforms["u_model"].kind, SymbolKind::Mat4);
        assert_eq!(r.uniforms["u_offsets"].size, 8);
        assert!(r.includes.contains("common"));
    }

    #[test]
    fn test_comments_do_not_declare() {
        let src = r#"
            // uniform mat4 u_commented;
            /* uniform vec3 u_blocked; */
            uniform float u_real;
            void main() { gl_FragColor = vec4(u_real); }
        "#;
        let r = reflect_stage(ShaderStage::Fragment, src);
        assert_eq!(r.uniforms.len(), 1);
        assert!(r.uniforms.contains_key("u_real"));
    }

    #[test]
    fn test_shader_reanalyzes_on_source_swap() {
        let mut shader = Shader::new("test", Some(VERT.to_string()), None, None);
        assert!(shader.uniforms().contains_key("u_model"));
        shader.set_source(
            ShaderStage::Vertex,
            Some("uniform vec2 u_only;\nvoid main() { gl_Position = vec4(u_only, 0.0, 1.0); }".into()),
        );
        assert!(!shader.uniforms().contains_key("u_model"));
        assert!(shader.uniforms().contains_key("u_only"));
    }

    #[test]
    fn test_strip_comments_keeps_utf8_intact() {
        // Non-ASCII text outside comments must survive byte-for-byte.
        let src = "// crépuscule östlich\nuniform float u_exposé; /* ΔΣ */\n";
        assert_eq!(strip_comments(src), "\nuniform float u_exposé; \n");
        let r = reflect_stage(
            ShaderStage::Fragment,
            "/* façade */ uniform vec3 u_tint;\nvoid main() { gl_FragColor = vec4(u_tint, 1.0); }",
        );
        assert!(r.uniforms.contains_key("u_tint"));
    }

    #[test]
    fn test_body_reference_detection() {
        let body = function_body_text(VERT);
        assert!(references_symbol(&body, "u_model"));
        assert!(!references_symbol(&body, "u_mod"));
    }
}
