use std::fmt;

use serde::{Deserialize, Serialize};

/// A sketch drives at most five passes: the visible image plus four buffers.
pub const PASS_COUNT: usize = 5;

/// Identifies one of the five fixed render passes.
///
/// `Image` is the pass presented on the visible surface; the buffers render
/// into offscreen textures that other passes may sample by name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PassKey {
    Image,
    BufferA,
    BufferB,
    BufferC,
    BufferD,
}

impl PassKey {
    /// Every pass in declaration order. Scheduling ties break in this order.
    pub const ALL: [PassKey; PASS_COUNT] = [
        PassKey::Image,
        PassKey::BufferA,
        PassKey::BufferB,
        PassKey::BufferC,
        PassKey::BufferD,
    ];

    /// The four offscreen buffer passes, in declaration order.
    pub const BUFFERS: [PassKey; 4] = [
        PassKey::BufferA,
        PassKey::BufferB,
        PassKey::BufferC,
        PassKey::BufferD,
    ];

    pub const fn index(self) -> usize {
        match self {
            PassKey::Image => 0,
            PassKey::BufferA => 1,
            PassKey::BufferB => 2,
            PassKey::BufferC => 3,
            PassKey::BufferD => 4,
        }
    }

    /// The key's name as it appears in shader source. Buffer names double as
    /// the sampler uniform a dependent pass reads the texture through.
    pub const fn name(self) -> &'static str {
        match self {
            PassKey::Image => "Image",
            PassKey::BufferA => "BufferA",
            PassKey::BufferB => "BufferB",
            PassKey::BufferC => "BufferC",
            PassKey::BufferD => "BufferD",
        }
    }

    pub const fn is_buffer(self) -> bool {
        !matches!(self, PassKey::Image)
    }
}

impl fmt::Display for PassKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// GLSL type of a declared uniform.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UniformKind {
    Float,
    Vec2,
    Vec3,
    Vec4,
    Int,
}

impl UniformKind {
    /// Type name emitted into generated `uniform` declarations.
    pub const fn glsl_type(self) -> &'static str {
        match self {
            UniformKind::Float => "float",
            UniformKind::Vec2 => "vec2",
            UniformKind::Vec3 => "vec3",
            UniformKind::Vec4 => "vec4",
            UniformKind::Int => "int",
        }
    }
}

/// Current value of a uniform; the variant fixes the declared type.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum UniformValue {
    Float(f32),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
    Int(i32),
}

impl UniformValue {
    pub const fn kind(&self) -> UniformKind {
        match self {
            UniformValue::Float(_) => UniformKind::Float,
            UniformValue::Vec2(_) => UniformKind::Vec2,
            UniformValue::Vec3(_) => UniformKind::Vec3,
            UniformValue::Vec4(_) => UniformKind::Vec4,
            UniformValue::Int(_) => UniformKind::Int,
        }
    }
}

/// One named uniform owned by a pass. Declaration order is preserved because
/// it shapes the generated source text.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UniformDecl {
    pub name: String,
    pub value: UniformValue,
}

impl UniformDecl {
    pub fn new(name: impl Into<String>, value: UniformValue) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }

    pub fn kind(&self) -> UniformKind {
        self.value.kind()
    }
}

/// Uniforms every generated program declares ahead of the pass's own:
/// surface resolution in device pixels, elapsed seconds, the audio stream
/// position, and a volume scalar.
pub const INTERNAL_UNIFORMS: [(&str, UniformKind); 4] = [
    ("resolution", UniformKind::Vec2),
    ("time", UniformKind::Float),
    ("stream", UniformKind::Float),
    ("volume", UniformKind::Float),
];

/// Source and uniforms for a single configured pass.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PassConfig {
    pub source: String,
    #[serde(default)]
    pub uniforms: Vec<UniformDecl>,
}

impl PassConfig {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            uniforms: Vec::new(),
        }
    }

    pub fn with_uniforms(source: impl Into<String>, uniforms: Vec<UniformDecl>) -> Self {
        Self {
            source: source.into(),
            uniforms,
        }
    }
}

/// A full compositor configuration: one optional [`PassConfig`] per
/// [`PassKey`]. An absent slot means the pass is unused.
///
/// `Clone` produces the structural deep copy the compositor keeps as its
/// change-detection snapshot; nothing is shared with the caller's value.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Sketch {
    #[serde(default)]
    pub image: Option<PassConfig>,
    #[serde(default)]
    pub buffer_a: Option<PassConfig>,
    #[serde(default)]
    pub buffer_b: Option<PassConfig>,
    #[serde(default)]
    pub buffer_c: Option<PassConfig>,
    #[serde(default)]
    pub buffer_d: Option<PassConfig>,
}

impl Sketch {
    pub fn get(&self, key: PassKey) -> Option<&PassConfig> {
        self.slot(key).as_ref()
    }

    pub fn set(&mut self, key: PassKey, config: Option<PassConfig>) {
        *self.slot_mut(key) = config;
    }

    /// Configured passes in declaration order.
    pub fn configured(&self) -> impl Iterator<Item = (PassKey, &PassConfig)> {
        PassKey::ALL
            .iter()
            .filter_map(move |&key| self.get(key).map(|config| (key, config)))
    }

    fn slot(&self, key: PassKey) -> &Option<PassConfig> {
        match key {
            PassKey::Image => &self.image,
            PassKey::BufferA => &self.buffer_a,
            PassKey::BufferB => &self.buffer_b,
            PassKey::BufferC => &self.buffer_c,
            PassKey::BufferD => &self.buffer_d,
        }
    }

    pub(crate) fn slot_mut(&mut self, key: PassKey) -> &mut Option<PassConfig> {
        match key {
            PassKey::Image => &mut self.image,
            PassKey::BufferA => &mut self.buffer_a,
            PassKey::BufferB => &mut self.buffer_b,
            PassKey::BufferC => &mut self.buffer_c,
            PassKey::BufferD => &mut self.buffer_d,
        }
    }
}
