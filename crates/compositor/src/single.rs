//! One-program renderer for surfaces that need no buffer graph: previews,
//! editor panes, offscreen thumbnail generation.

use tracing::{debug, trace};

use crate::backend::{RenderBackend, UniformStatus};
use crate::clock::{BoxedTimeSource, SystemTimeSource};
use crate::compose;
use crate::error::{FaultSink, LogSink, RenderFault};
use crate::types::{UniformDecl, UniformValue};

/// Configuration for a [`SinglePass`].
#[derive(Clone, Debug, PartialEq)]
pub struct SinglePassConfig {
    /// Fragment source: a full program, or a bare body when `wrap_main` is
    /// set.
    pub source: String,
    pub uniforms: Vec<UniformDecl>,
    /// Wrap the source in an implicit `main` that supplies the normalized
    /// coordinate `uv` and writes the body's `vec3 color` out.
    pub wrap_main: bool,
    /// Whether the host should keep scheduling ticks (see
    /// [`SinglePass::animate`]). Off means single-shot rendering on demand.
    pub animate: bool,
    /// Logical surface size; backing pixels are this times `dpr`.
    pub width: u32,
    pub height: u32,
    pub dpr: f32,
}

impl Default for SinglePassConfig {
    fn default() -> Self {
        Self {
            source: String::new(),
            uniforms: Vec::new(),
            wrap_main: false,
            animate: false,
            width: 1,
            height: 1,
            dpr: 1.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Lifecycle {
    Ready,
    Rebuilding,
    Destroyed,
}

/// A compositor reduced to exactly one pass rendering straight to the
/// surface. Owns its program, its viewport math (logical size × device
/// pixel ratio), and the same internal uniform set as the multi-pass
/// renderer.
pub struct SinglePass<B: RenderBackend> {
    backend: B,
    config: SinglePassConfig,
    program: Option<B::Program>,
    lifecycle: Lifecycle,
    clock: BoxedTimeSource,
    stream: Option<f32>,
    volume: f32,
    sink: Box<dyn FaultSink>,
}

impl<B: RenderBackend> SinglePass<B> {
    /// Compiles the program immediately; faults go to [`LogSink`]. A compile
    /// failure leaves the renderer alive but not ready — `render` no-ops
    /// until a successful [`SinglePass::rebuild`].
    pub fn new(backend: B, config: SinglePassConfig) -> Self {
        Self::with_sink(backend, config, Box::new(LogSink))
    }

    pub fn with_sink(backend: B, config: SinglePassConfig, sink: Box<dyn FaultSink>) -> Self {
        let mut renderer = Self {
            backend,
            config,
            program: None,
            lifecycle: Lifecycle::Ready,
            clock: Box::new(SystemTimeSource::new()),
            stream: None,
            volume: 1.0,
            sink,
        };
        renderer.apply_viewport();
        renderer.program = Self::build_program(
            &mut renderer.backend,
            &renderer.config,
            renderer.sink.as_mut(),
        );
        renderer
    }

    pub fn is_ready(&self) -> bool {
        self.lifecycle == Lifecycle::Ready && self.program.is_some()
    }

    /// Whether the host should schedule another tick after each render.
    pub fn animate(&self) -> bool {
        self.config.animate && self.lifecycle == Lifecycle::Ready
    }

    pub fn set_animate(&mut self, animate: bool) {
        self.config.animate = animate;
    }

    pub fn set_time_source(&mut self, clock: BoxedTimeSource) {
        self.clock = clock;
    }

    pub fn set_stream(&mut self, seconds: Option<f32>) {
        self.stream = seconds;
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.volume = volume;
    }

    /// Backing-surface size in device pixels.
    pub fn pixel_size(&self) -> (u32, u32) {
        let width = (self.config.width as f32 * self.config.dpr).round().max(1.0) as u32;
        let height = (self.config.height as f32 * self.config.dpr).round().max(1.0) as u32;
        (width, height)
    }

    /// New logical size, usually from the host's resize observation.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.config.width = width;
        self.config.height = height;
        self.apply_viewport();
    }

    pub fn set_dpr(&mut self, dpr: f32) {
        if dpr <= 0.0 {
            return;
        }
        self.config.dpr = dpr;
        self.apply_viewport();
    }

    /// Overwrites one uniform's value; returns false for unknown names.
    pub fn set_uniform_value(&mut self, name: &str, value: UniformValue) -> bool {
        match self
            .config
            .uniforms
            .iter_mut()
            .find(|decl| decl.name == name)
        {
            Some(decl) => {
                decl.value = value;
                true
            }
            None => false,
        }
    }

    /// Renders one frame; `None` samples the owned time source. Serves both
    /// modes: the host calls this every tick while [`SinglePass::animate`]
    /// holds, or exactly once for a single-shot snapshot.
    pub fn render(&mut self, timestamp: Option<f32>) {
        if self.lifecycle != Lifecycle::Ready {
            trace!("frame skipped; single pass not ready");
            return;
        }
        let Some(program) = &self.program else {
            trace!("frame skipped; no compiled program");
            return;
        };

        let time = match timestamp {
            Some(seconds) => seconds,
            None => self.clock.sample(),
        };
        let stream = self.stream.unwrap_or(time);
        let (width, height) = self.pixel_size();

        self.backend.use_program(program);
        Self::apply_uniform(
            &mut self.backend,
            self.sink.as_mut(),
            program,
            "resolution",
            &UniformValue::Vec2([width as f32, height as f32]),
        );
        Self::apply_uniform(
            &mut self.backend,
            self.sink.as_mut(),
            program,
            "time",
            &UniformValue::Float(time),
        );
        Self::apply_uniform(
            &mut self.backend,
            self.sink.as_mut(),
            program,
            "stream",
            &UniformValue::Float(stream),
        );
        Self::apply_uniform(
            &mut self.backend,
            self.sink.as_mut(),
            program,
            "volume",
            &UniformValue::Float(self.volume),
        );
        for decl in &self.config.uniforms {
            Self::apply_uniform(
                &mut self.backend,
                self.sink.as_mut(),
                program,
                &decl.name,
                &decl.value,
            );
        }

        self.backend.draw(program, None);
    }

    /// Swaps in new source and uniforms, recompiling in place. The surface
    /// and its observation stay untouched.
    pub fn rebuild(&mut self, source: impl Into<String>, uniforms: Vec<UniformDecl>) {
        if self.lifecycle == Lifecycle::Destroyed {
            return;
        }
        self.lifecycle = Lifecycle::Rebuilding;
        if let Some(program) = self.program.take() {
            self.backend.destroy_program(program);
        }
        self.config.source = source.into();
        self.config.uniforms = uniforms;
        self.program =
            Self::build_program(&mut self.backend, &self.config, self.sink.as_mut());
        self.lifecycle = Lifecycle::Ready;
    }

    /// Host-reported surface loss. Suppressed once teardown has begun so a
    /// deliberate destroy does not masquerade as a failure.
    pub fn surface_lost(&mut self) {
        if self.lifecycle == Lifecycle::Destroyed {
            debug!("surface loss ignored during teardown");
            return;
        }
        self.sink.report(RenderFault::SurfaceLost);
    }

    /// Terminal: releases the program. Further renders and rebuilds no-op.
    pub fn destroy(&mut self) {
        self.lifecycle = Lifecycle::Destroyed;
        if let Some(program) = self.program.take() {
            self.backend.destroy_program(program);
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn apply_viewport(&mut self) {
        let (width, height) = self.pixel_size();
        self.backend.set_viewport(width, height);
    }

    fn build_program(
        backend: &mut B,
        config: &SinglePassConfig,
        sink: &mut dyn FaultSink,
    ) -> Option<B::Program> {
        let vertex = compose::vertex_source();
        let fragment = if config.wrap_main {
            compose::wrapped_fragment_source(&config.source, &config.uniforms)
        } else {
            compose::fragment_source(&config.source, &config.uniforms)
        };
        match backend.compile(&vertex, &fragment, &config.uniforms) {
            Ok(program) => Some(program),
            Err(err) => {
                sink.report(RenderFault::Compile {
                    pass: crate::types::PassKey::Image,
                    stage: err.stage,
                    log: err.log,
                });
                None
            }
        }
    }

    fn apply_uniform(
        backend: &mut B,
        sink: &mut dyn FaultSink,
        program: &B::Program,
        name: &str,
        value: &UniformValue,
    ) {
        match backend.set_uniform(program, name, value) {
            UniformStatus::Applied | UniformStatus::Missing => {}
            UniformStatus::Rejected => sink.report(RenderFault::UniformSet {
                pass: crate::types::PassKey::Image,
                name: name.to_string(),
            }),
        }
    }
}

impl<B: RenderBackend> Drop for SinglePass<B> {
    fn drop(&mut self) {
        if let Some(program) = self.program.take() {
            self.backend.destroy_program(program);
        }
    }
}
