//! Infers which buffers a pass samples and orders passes so dependencies
//! render first.

use crate::types::{PassKey, Sketch, PASS_COUNT};

/// Scans shader source for buffer references.
///
/// Detection is a literal substring test against the four buffer names, in
/// declaration order. That makes it cheap and tokenizer-free, at the cost of
/// false positives (a name inside a comment) and false negatives (a name
/// assembled by concatenation). A pass naming its own buffer is a feedback
/// read of its previous frame, not an error. Swap this function out for a
/// real tokenizer or an explicit dependency list without touching the
/// scheduler.
pub fn detect_dependencies(source: &str) -> Vec<PassKey> {
    PassKey::BUFFERS
        .iter()
        .copied()
        .filter(|buffer| source.contains(buffer.name()))
        .collect()
}

/// Render order plus each configured pass's direct dependencies.
///
/// The dependency lists keep their detection order because a dependency's
/// position doubles as its texture unit at bind time. A list may name a
/// buffer with no configuration; binding skips it at frame time.
#[derive(Clone, Debug, Default)]
pub(crate) struct PassGraph {
    pub order: Vec<PassKey>,
    deps: [Vec<PassKey>; PASS_COUNT],
}

impl PassGraph {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn dependencies(&self, key: PassKey) -> &[PassKey] {
        &self.deps[key.index()]
    }
}

/// Computes the graph for every configured pass in `sketch`.
///
/// Depth-first post-order: passes are taken up in declaration order, each
/// pass's dependencies are visited before the pass itself, and a pass is
/// marked visited *before* recursing so self-references and cross-pass
/// cycles terminate. In a cross-pass cycle the later-visited pass samples
/// the other's previous-frame texture; that ambiguity is inherent to the
/// single-buffer design and left as is.
pub(crate) fn resolve(sketch: &Sketch) -> PassGraph {
    let mut deps: [Vec<PassKey>; PASS_COUNT] = std::array::from_fn(|_| Vec::new());
    for (key, config) in sketch.configured() {
        deps[key.index()] = detect_dependencies(&config.source);
    }

    let mut visited = [false; PASS_COUNT];
    let mut order = Vec::new();
    for key in PassKey::ALL {
        if sketch.get(key).is_some() && !visited[key.index()] {
            visit(key, sketch, &deps, &mut visited, &mut order);
        }
    }

    PassGraph { order, deps }
}

fn visit(
    key: PassKey,
    sketch: &Sketch,
    deps: &[Vec<PassKey>; PASS_COUNT],
    visited: &mut [bool; PASS_COUNT],
    order: &mut Vec<PassKey>,
) {
    visited[key.index()] = true;
    for &dep in &deps[key.index()] {
        if sketch.get(dep).is_some() && !visited[dep.index()] {
            visit(dep, sketch, deps, visited, order);
        }
    }
    order.push(key);
}
