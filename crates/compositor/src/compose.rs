//! Synthesizes the final shader text handed to the backend: a fixed header,
//! generated uniform declarations, the shared utility block, then the user's
//! code.

use std::fmt::Write;

use crate::types::{UniformDecl, INTERNAL_UNIFORMS};

/// Precision defaults shared by every generated program (GLSL ES 1.00, the
/// profile the sketch sources are written against).
const HEADER: &str = "precision highp float;\nprecision highp int;\n";

/// Helper functions available to every pass. `norm_uv` expects the
/// `resolution` uniform declared above it.
const UTILS: &str = r#"vec2 norm_uv(vec4 fragCoord) {
  vec2 uv = fragCoord.xy / resolution;
  uv = uv * 2.0 - 1.0;
  uv.x *= resolution.x / resolution.y;
  return uv;
}

mat2 rotate2d(float angle) {
  return mat2(cos(angle), -sin(angle), sin(angle), cos(angle));
}

vec3 hsb2rgb(vec3 c) {
  vec3 rgb = clamp(abs(mod(c.x * 6.0 + vec3(0.0, 4.0, 2.0), 6.0) - 3.0) - 1.0, 0.0, 1.0);
  rgb = rgb * rgb * (3.0 - 2.0 * rgb);
  return c.z * mix(vec3(1.0), rgb, c.y);
}
"#;

/// Pass-through vertex program; passes never customize the vertex stage.
const VERTEX_BODY: &str = "attribute vec2 position;\nvoid main() {\n  gl_Position = vec4(position, 0.0, 1.0);\n}\n";

/// `uniform <type> <name>;` lines: the internal set first, then the pass's
/// own declarations in their declared order.
pub(crate) fn uniform_declarations(uniforms: &[UniformDecl]) -> String {
    let mut out = String::new();
    for (name, kind) in INTERNAL_UNIFORMS {
        let _ = writeln!(out, "uniform {} {};", kind.glsl_type(), name);
    }
    for decl in uniforms {
        let _ = writeln!(out, "uniform {} {};", decl.kind().glsl_type(), decl.name);
    }
    out
}

/// Full fragment program for a pass whose source supplies its own `main`.
pub(crate) fn fragment_source(source: &str, uniforms: &[UniformDecl]) -> String {
    format!(
        "{HEADER}\n{decls}\n{UTILS}\n{source}\n",
        decls = uniform_declarations(uniforms),
    )
}

/// Fragment program wrapping a bare body in an implicit `main`. The wrapper
/// supplies the normalized coordinate `uv` and expects the body to declare a
/// `vec3 color`.
pub(crate) fn wrapped_fragment_source(body: &str, uniforms: &[UniformDecl]) -> String {
    format!(
        "{HEADER}\n{decls}\n{UTILS}\nvoid main() {{\n  vec2 uv = norm_uv(gl_FragCoord);\n{body}\n  gl_FragColor = vec4(color, 1.0);\n}}\n",
        decls = uniform_declarations(uniforms),
    )
}

pub(crate) fn vertex_source() -> String {
    format!("{HEADER}\n{VERTEX_BODY}")
}
