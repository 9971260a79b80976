//! Decides whether an incoming sketch needs a full GPU rebuild or only
//! carries new uniform values.

use crate::types::{PassConfig, PassKey, Sketch};

/// True when any pass differs structurally from the applied snapshot:
/// different shader source, or a different ordered list of uniform *names*
/// (added, removed, or reordered). Value-only changes never rebuild. A
/// single structural difference rebuilds the whole set; there is no partial
/// rebuild.
pub(crate) fn requires_rebuild(incoming: &Sketch, snapshot: &Sketch) -> bool {
    PassKey::ALL
        .iter()
        .any(|&key| pass_changed(incoming.get(key), snapshot.get(key)))
}

fn pass_changed(incoming: Option<&PassConfig>, applied: Option<&PassConfig>) -> bool {
    match (incoming, applied) {
        (None, None) => false,
        (Some(next), Some(prev)) => {
            next.source != prev.source || !same_uniform_names(next, prev)
        }
        _ => true,
    }
}

fn same_uniform_names(a: &PassConfig, b: &PassConfig) -> bool {
    a.uniforms.len() == b.uniforms.len()
        && a.uniforms
            .iter()
            .zip(&b.uniforms)
            .all(|(x, y)| x.name == y.name)
}
