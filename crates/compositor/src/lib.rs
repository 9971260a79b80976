//! Dependency-driven multi-pass shader compositor.
//!
//! A [`Sketch`] configures up to five passes: the visible `Image` plus four
//! offscreen buffers whose textures other passes sample by name. The overall
//! flow per configuration change and per frame:
//!
//! ```text
//!   host / UI
//!        │ Sketch
//!        ▼
//!   Compositor::update ──▶ change detection ──▶ rebuild passes (on change)
//!        │                                            │
//!        ▼                                            ▼
//!   Compositor::render ──▶ passes in dependency order ──▶ RenderBackend ──▶ surface
//! ```
//!
//! Dependencies are inferred from shader text (a buffer's name appearing in
//! a pass's source), passes are ordered with a depth-first topological sort,
//! and a structural change — different source text or a different uniform
//! name list — tears down and rebuilds every GPU resource atomically.
//! Value-only changes touch nothing. All GPU work happens behind the
//! [`RenderBackend`] trait; [`single::SinglePass`] is the one-program
//! variant used where no buffer graph is needed (thumbnails, previews).

mod change;
mod clock;
mod compose;
mod deps;

pub mod backend;
pub mod error;
pub mod single;
pub mod types;

pub use backend::{RenderBackend, UniformStatus};
pub use clock::{BoxedTimeSource, FixedTimeSource, SystemTimeSource, TimeSource};
pub use deps::detect_dependencies;
pub use error::{CompileError, FaultSink, LogSink, RenderFault, ShaderStage, TargetError};
pub use single::{SinglePass, SinglePassConfig};
pub use types::{
    PassConfig, PassKey, Sketch, UniformDecl, UniformKind, UniformValue, INTERNAL_UNIFORMS,
    PASS_COUNT,
};

use deps::PassGraph;
use tracing::{debug, trace, warn};

/// GPU resources owned by one live pass.
struct InstantiatedPass<B: RenderBackend> {
    program: B::Program,
    /// Offscreen framebuffer + texture; `None` for the `Image` pass, which
    /// renders to the visible surface.
    target: Option<B::Target>,
}

/// Owns the pass table, the dependency graph, and the applied-configuration
/// snapshot, and renders one frame per [`Compositor::render`] call.
///
/// Single-threaded by design: everything runs on the host's animation
/// callback, and the backend's context belongs to this instance alone.
pub struct Compositor<B: RenderBackend> {
    backend: B,
    /// Live configuration; uniform values may drift via
    /// [`Compositor::set_uniform_value`] between updates.
    sketch: Sketch,
    /// Deep copy of the last applied configuration, compared against on
    /// every update. Replaced wholesale, never edited in place.
    snapshot: Sketch,
    graph: PassGraph,
    passes: [Option<InstantiatedPass<B>>; types::PASS_COUNT],
    surface_size: (u32, u32),
    clock: BoxedTimeSource,
    stream: Option<f32>,
    volume: f32,
    /// Set for the duration of a rebuild; `render` skips the frame while it
    /// holds so no frame observes a half-built pass table.
    updating: bool,
    sink: Box<dyn FaultSink>,
}

impl<B: RenderBackend> Compositor<B> {
    /// Builds every configured pass immediately; faults go to [`LogSink`].
    pub fn new(backend: B, sketch: Sketch, surface_size: (u32, u32)) -> Self {
        Self::with_sink(backend, sketch, surface_size, Box::new(LogSink))
    }

    /// Like [`Compositor::new`] with an explicit fault sink.
    pub fn with_sink(
        backend: B,
        sketch: Sketch,
        surface_size: (u32, u32),
        sink: Box<dyn FaultSink>,
    ) -> Self {
        let mut compositor = Self {
            backend,
            snapshot: sketch.clone(),
            sketch,
            graph: PassGraph::empty(),
            passes: std::array::from_fn(|_| None),
            surface_size,
            clock: Box::new(SystemTimeSource::new()),
            stream: None,
            volume: 1.0,
            updating: false,
            sink,
        };
        compositor.backend.set_viewport(surface_size.0, surface_size.1);
        compositor.rebuild();
        compositor
    }

    /// Passes in the order they render this configuration.
    pub fn render_order(&self) -> &[PassKey] {
        &self.graph.order
    }

    /// False while a rebuild is in flight or the `Image` pass has no
    /// program; [`Compositor::render`] skips frames in that state.
    pub fn is_ready(&self) -> bool {
        !self.updating && self.passes[PassKey::Image.index()].is_some()
    }

    /// Replaces the default wall-clock time source.
    pub fn set_time_source(&mut self, clock: BoxedTimeSource) {
        self.clock = clock;
    }

    /// Audio playback position fed to the `stream` uniform. `None` falls
    /// back to elapsed time.
    pub fn set_stream(&mut self, seconds: Option<f32>) {
        self.stream = seconds;
    }

    /// Volume scalar fed to the `volume` uniform.
    pub fn set_volume(&mut self, volume: f32) {
        self.volume = volume;
    }

    /// Applies a new configuration. Rebuilds all GPU resources only when the
    /// change detector finds a structural difference against the snapshot;
    /// otherwise the sketch (and snapshot) are swapped so the next frame
    /// reads the latest uniform values, and no resource is touched.
    pub fn update(&mut self, sketch: Sketch) {
        let structural = change::requires_rebuild(&sketch, &self.snapshot);
        self.snapshot = sketch.clone();
        self.sketch = sketch;
        if structural {
            debug!("structural change detected; rebuilding passes");
            self.rebuild();
        } else {
            trace!("value-only update; keeping GPU resources");
        }
    }

    /// Overwrites one uniform's value on the live sketch. Returns false when
    /// the pass or the name is unknown. Never rebuilds.
    pub fn set_uniform_value(&mut self, pass: PassKey, name: &str, value: UniformValue) -> bool {
        let Some(config) = self.sketch.slot_mut(pass).as_mut() else {
            return false;
        };
        match config.uniforms.iter_mut().find(|decl| decl.name == name) {
            Some(decl) => {
                decl.value = value;
                true
            }
            None => false,
        }
    }

    /// Renders one frame. `timestamp` is elapsed seconds; `None` samples the
    /// owned time source. Skips silently when not ready — a missing `Image`
    /// program or an in-flight rebuild is not an error here.
    pub fn render(&mut self, timestamp: Option<f32>) {
        if !self.is_ready() {
            trace!("frame skipped; compositor not ready");
            return;
        }

        let time = match timestamp {
            Some(seconds) => seconds,
            None => self.clock.sample(),
        };
        let stream = self.stream.unwrap_or(time);
        let resolution = UniformValue::Vec2([
            self.surface_size.0 as f32,
            self.surface_size.1 as f32,
        ]);

        for &key in &self.graph.order {
            let Some(pass) = &self.passes[key.index()] else {
                // Failed to compile this configuration; dependents render
                // with the corresponding texture unit unbound.
                continue;
            };

            self.backend.use_program(&pass.program);

            for (unit, &dep) in self.graph.dependencies(key).iter().enumerate() {
                let Some(dep_pass) = &self.passes[dep.index()] else {
                    continue;
                };
                let Some(dep_target) = &dep_pass.target else {
                    continue;
                };
                self.backend
                    .bind_texture(&pass.program, unit as u32, dep_target, dep.name());
            }

            Self::apply_uniform(
                &mut self.backend,
                self.sink.as_mut(),
                &pass.program,
                key,
                "resolution",
                &resolution,
            );
            Self::apply_uniform(
                &mut self.backend,
                self.sink.as_mut(),
                &pass.program,
                key,
                "time",
                &UniformValue::Float(time),
            );
            Self::apply_uniform(
                &mut self.backend,
                self.sink.as_mut(),
                &pass.program,
                key,
                "stream",
                &UniformValue::Float(stream),
            );
            Self::apply_uniform(
                &mut self.backend,
                self.sink.as_mut(),
                &pass.program,
                key,
                "volume",
                &UniformValue::Float(self.volume),
            );

            if let Some(config) = self.sketch.get(key) {
                for decl in &config.uniforms {
                    Self::apply_uniform(
                        &mut self.backend,
                        self.sink.as_mut(),
                        &pass.program,
                        key,
                        &decl.name,
                        &decl.value,
                    );
                }
            }

            self.backend.draw(&pass.program, pass.target.as_ref());
        }
    }

    /// Updates the viewport only. Existing offscreen targets keep their
    /// allocation-time size until the next structural rebuild.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.surface_size = (width, height);
        self.backend.set_viewport(width, height);
    }

    /// Host-reported surface/context loss. Recovery — typically a full
    /// reconstruction — is the caller's responsibility.
    pub fn surface_lost(&mut self) {
        self.sink.report(RenderFault::SurfaceLost);
    }

    /// Releases every pass's GPU resources. Subsequent renders no-op.
    pub fn destroy(&mut self) {
        self.release_passes();
        self.graph = PassGraph::empty();
    }

    /// Access to the backend, e.g. to reach the underlying context.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Tears down all live passes, then resolves the dependency graph and
    /// instantiates each configured pass in render order. A pass that fails
    /// to compile (or cannot get its offscreen target) is reported and
    /// omitted; the others proceed. The updating flag brackets the whole
    /// exchange so no frame sees a partial table.
    fn rebuild(&mut self) {
        self.updating = true;
        self.release_passes();
        self.graph = deps::resolve(&self.sketch);

        for &key in &self.graph.order {
            let Some(config) = self.sketch.get(key) else {
                continue;
            };

            let vertex = compose::vertex_source();
            let fragment = compose::fragment_source(&config.source, &config.uniforms);
            let program = match self.backend.compile(&vertex, &fragment, &config.uniforms) {
                Ok(program) => program,
                Err(err) => {
                    warn!(pass = %key, error = %err, "pass failed to compile");
                    self.sink.report(RenderFault::Compile {
                        pass: key,
                        stage: err.stage,
                        log: err.log,
                    });
                    continue;
                }
            };

            let target = if key.is_buffer() {
                match self
                    .backend
                    .create_target(self.surface_size.0, self.surface_size.1)
                {
                    Ok(target) => Some(target),
                    Err(err) => {
                        warn!(pass = %key, error = %err, "offscreen target allocation failed");
                        self.backend.destroy_program(program);
                        self.sink.report(RenderFault::OffscreenTarget {
                            pass: key,
                            detail: err.0,
                        });
                        continue;
                    }
                }
            } else {
                None
            };

            self.passes[key.index()] = Some(InstantiatedPass { program, target });
        }

        debug!(order = ?self.graph.order, "passes rebuilt");
        self.updating = false;
    }

    fn release_passes(&mut self) {
        for slot in self.passes.iter_mut() {
            if let Some(pass) = slot.take() {
                if let Some(target) = pass.target {
                    self.backend.destroy_target(target);
                }
                self.backend.destroy_program(pass.program);
            }
        }
    }

    fn apply_uniform(
        backend: &mut B,
        sink: &mut dyn FaultSink,
        program: &B::Program,
        pass: PassKey,
        name: &str,
        value: &UniformValue,
    ) {
        match backend.set_uniform(program, name, value) {
            UniformStatus::Applied | UniformStatus::Missing => {}
            UniformStatus::Rejected => sink.report(RenderFault::UniformSet {
                pass,
                name: name.to_string(),
            }),
        }
    }
}

impl<B: RenderBackend> Drop for Compositor<B> {
    fn drop(&mut self) {
        self.release_passes();
    }
}
