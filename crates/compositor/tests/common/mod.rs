//! Scripted backend double: records every call the compositor makes so
//! tests can assert on resource lifecycles and frame traffic.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use compositor::{
    CompileError, FaultSink, RenderBackend, RenderFault, ShaderStage, TargetError, UniformDecl,
    UniformStatus, UniformValue, INTERNAL_UNIFORMS,
};

/// Fragment sources containing this marker fail to compile.
pub const FAIL_MARKER: &str = "__FAIL_COMPILE__";

/// Installs a fmt subscriber once so `RUST_LOG` controls test output.
pub fn init_logging() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
}

#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    Compile { program: u32 },
    CompileFailed,
    CreateTarget { target: u32 },
    DestroyProgram { program: u32 },
    DestroyTarget { target: u32 },
    UseProgram { program: u32 },
    SetUniform { program: u32, name: String, value: UniformValue },
    BindTexture { program: u32, unit: u32, target: u32, sampler: String },
    Viewport { width: u32, height: u32 },
    Draw { program: u32, target: Option<u32> },
}

pub type EventLog = Rc<RefCell<Vec<Event>>>;
pub type SourceLog = Rc<RefCell<Vec<String>>>;

pub struct ScriptedBackend {
    pub events: EventLog,
    pub sources: SourceLog,
    next_program: u32,
    next_target: u32,
    known_uniforms: HashMap<u32, Vec<String>>,
    pub reject_uniform: Option<String>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self {
            events: Rc::new(RefCell::new(Vec::new())),
            sources: Rc::new(RefCell::new(Vec::new())),
            next_program: 1,
            next_target: 100,
            known_uniforms: HashMap::new(),
            reject_uniform: None,
        }
    }

    pub fn rejecting(name: &str) -> Self {
        let mut backend = Self::new();
        backend.reject_uniform = Some(name.to_string());
        backend
    }

    fn push(&self, event: Event) {
        self.events.borrow_mut().push(event);
    }
}

impl RenderBackend for ScriptedBackend {
    type Program = u32;
    type Target = u32;

    fn compile(
        &mut self,
        _vertex: &str,
        fragment: &str,
        uniforms: &[UniformDecl],
    ) -> Result<u32, CompileError> {
        if fragment.contains(FAIL_MARKER) {
            self.push(Event::CompileFailed);
            return Err(CompileError::new(ShaderStage::Fragment, "scripted failure"));
        }
        let program = self.next_program;
        self.next_program += 1;
        let mut names: Vec<String> = INTERNAL_UNIFORMS
            .iter()
            .map(|(name, _)| name.to_string())
            .collect();
        names.extend(uniforms.iter().map(|decl| decl.name.clone()));
        self.known_uniforms.insert(program, names);
        self.sources.borrow_mut().push(fragment.to_string());
        self.push(Event::Compile { program });
        Ok(program)
    }

    fn create_target(&mut self, _width: u32, _height: u32) -> Result<u32, TargetError> {
        let target = self.next_target;
        self.next_target += 1;
        self.push(Event::CreateTarget { target });
        Ok(target)
    }

    fn destroy_program(&mut self, program: u32) {
        self.known_uniforms.remove(&program);
        self.push(Event::DestroyProgram { program });
    }

    fn destroy_target(&mut self, target: u32) {
        self.push(Event::DestroyTarget { target });
    }

    fn use_program(&mut self, program: &u32) {
        self.push(Event::UseProgram { program: *program });
    }

    fn set_uniform(&mut self, program: &u32, name: &str, value: &UniformValue) -> UniformStatus {
        if self.reject_uniform.as_deref() == Some(name) {
            return UniformStatus::Rejected;
        }
        let known = self
            .known_uniforms
            .get(program)
            .map(|names| names.iter().any(|n| n == name))
            .unwrap_or(false);
        if !known {
            return UniformStatus::Missing;
        }
        self.push(Event::SetUniform {
            program: *program,
            name: name.to_string(),
            value: value.clone(),
        });
        UniformStatus::Applied
    }

    fn bind_texture(&mut self, program: &u32, unit: u32, target: &u32, sampler: &str) {
        self.push(Event::BindTexture {
            program: *program,
            unit,
            target: *target,
            sampler: sampler.to_string(),
        });
    }

    fn set_viewport(&mut self, width: u32, height: u32) {
        self.push(Event::Viewport { width, height });
    }

    fn draw(&mut self, program: &u32, target: Option<&u32>) {
        self.push(Event::Draw {
            program: *program,
            target: target.copied(),
        });
    }
}

/// Sink collecting faults for assertions.
pub struct CollectingSink(pub Rc<RefCell<Vec<RenderFault>>>);

impl CollectingSink {
    pub fn new() -> (Self, Rc<RefCell<Vec<RenderFault>>>) {
        let faults = Rc::new(RefCell::new(Vec::new()));
        (Self(Rc::clone(&faults)), faults)
    }
}

impl FaultSink for CollectingSink {
    fn report(&mut self, fault: RenderFault) {
        self.0.borrow_mut().push(fault);
    }
}

pub fn count(events: &EventLog, pred: impl Fn(&Event) -> bool) -> usize {
    events.borrow().iter().filter(|event| pred(event)).count()
}

pub fn draws(events: &EventLog) -> Vec<(u32, Option<u32>)> {
    events
        .borrow()
        .iter()
        .filter_map(|event| match event {
            Event::Draw { program, target } => Some((*program, *target)),
            _ => None,
        })
        .collect()
}
