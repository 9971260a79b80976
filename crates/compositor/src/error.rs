use std::fmt;

use thiserror::Error;

use crate::types::PassKey;

/// Shader stage a compile diagnostic originated from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShaderStage {
    Vertex,
    Fragment,
    Link,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderStage::Vertex => f.write_str("vertex"),
            ShaderStage::Fragment => f.write_str("fragment"),
            ShaderStage::Link => f.write_str("link"),
        }
    }
}

/// Returned by a backend when a program fails to build; `log` carries the
/// driver's info log verbatim.
#[derive(Debug, Error)]
#[error("{stage} stage failed: {log}")]
pub struct CompileError {
    pub stage: ShaderStage,
    pub log: String,
}

impl CompileError {
    pub fn new(stage: ShaderStage, log: impl Into<String>) -> Self {
        Self {
            stage,
            log: log.into(),
        }
    }
}

/// Returned by a backend when an offscreen framebuffer or its backing
/// texture could not be allocated.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct TargetError(pub String);

/// Everything that can go wrong while compositing. None of these abort
/// rendering: a faulted pass is dropped from the set and the rest of the
/// frame proceeds.
#[derive(Debug, Error)]
pub enum RenderFault {
    /// A pass's program failed to build or link; the pass is omitted until
    /// the next successful update.
    #[error("pass {pass} failed to compile ({stage}): {log}")]
    Compile {
        pass: PassKey,
        stage: ShaderStage,
        log: String,
    },
    /// A buffer pass compiled but its offscreen target could not be
    /// allocated; the pass is omitted.
    #[error("pass {pass} could not allocate an offscreen target: {detail}")]
    OffscreenTarget { pass: PassKey, detail: String },
    /// A resolved uniform rejected its value. The frame continues.
    #[error("pass {pass} rejected a value for uniform '{name}'")]
    UniformSet { pass: PassKey, name: String },
    /// The rendering surface or its context became invalid. Recovery (a
    /// full reconstruction) is the caller's responsibility.
    #[error("rendering surface was lost")]
    SurfaceLost,
}

/// Receives every [`RenderFault`] the compositor encounters. Implement this
/// to observe failures deterministically; the default [`LogSink`] forwards
/// to `tracing`.
pub trait FaultSink {
    fn report(&mut self, fault: RenderFault);
}

/// Default sink: log-and-continue.
#[derive(Debug, Default)]
pub struct LogSink;

impl FaultSink for LogSink {
    fn report(&mut self, fault: RenderFault) {
        tracing::warn!(%fault, "render fault");
    }
}
