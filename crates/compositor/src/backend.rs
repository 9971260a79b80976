//! The seam between the compositor and whatever actually talks to the GPU.
//!
//! The compositor never issues a graphics call directly; it hands synthesized
//! shader source to [`RenderBackend::compile`], asks for offscreen targets,
//! and drives draws through the handles it gets back. This keeps the
//! scheduling and lifecycle logic testable against a scripted fake and lets
//! backends (GL, a recording double, ...) vary independently.

use crate::error::{CompileError, TargetError};
use crate::types::{UniformDecl, UniformValue};

/// Outcome of applying one named uniform value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UniformStatus {
    /// The value was written.
    Applied,
    /// The program has no uniform with that name. Callers skip silently;
    /// shaders routinely declare fewer uniforms than the host offers.
    Missing,
    /// The uniform exists but refused the value (e.g. a type mismatch).
    Rejected,
}

/// Minimal GPU contract the compositor renders through.
///
/// A `Program` is a compiled-and-linked shader pair with a by-name uniform
/// table; a `Target` is an offscreen framebuffer with one color texture.
/// Handles are owned by the caller and must be returned to
/// `destroy_program`/`destroy_target` — the backend never frees them behind
/// the caller's back.
pub trait RenderBackend {
    type Program;
    type Target;

    /// Builds and links a program. `uniforms` lists the pass's own
    /// declarations so the backend can resolve a setter table up front; the
    /// internal uniform set (see [`crate::types::INTERNAL_UNIFORMS`]) is
    /// always resolved in addition.
    fn compile(
        &mut self,
        vertex: &str,
        fragment: &str,
        uniforms: &[UniformDecl],
    ) -> Result<Self::Program, CompileError>;

    /// Allocates one framebuffer with a color texture of the given pixel
    /// size.
    fn create_target(&mut self, width: u32, height: u32) -> Result<Self::Target, TargetError>;

    fn destroy_program(&mut self, program: Self::Program);

    fn destroy_target(&mut self, target: Self::Target);

    /// Makes `program` current for subsequent uniform writes and draws.
    fn use_program(&mut self, program: &Self::Program);

    fn set_uniform(
        &mut self,
        program: &Self::Program,
        name: &str,
        value: &UniformValue,
    ) -> UniformStatus;

    /// Binds `target`'s color texture to the given texture unit and points
    /// the sampler uniform named `sampler` at it. Skips silently when the
    /// program has no such sampler.
    fn bind_texture(&mut self, program: &Self::Program, unit: u32, target: &Self::Target, sampler: &str);

    fn set_viewport(&mut self, width: u32, height: u32);

    /// Issues the fullscreen draw. `Some(target)` renders into the target's
    /// framebuffer (restoring the default framebuffer afterwards); `None`
    /// renders to the visible surface.
    fn draw(&mut self, program: &Self::Program, target: Option<&Self::Target>);
}
