//! OpenGL / GLES implementation of the compositor's [`RenderBackend`],
//! built on `glow`.
//!
//! The host creates the GL context (via glutin, a canvas, an EGL surface —
//! whatever it runs on) and hands it over; from then on the backend owns all
//! GL calls. Programs keep a by-name uniform location table resolved at link
//! time; dependency samplers are looked up at bind time since their names
//! depend on the sketch, not the program.

use std::collections::HashMap;

use glow::HasContext;
use thiserror::Error;
use tracing::debug;

use compositor::{
    CompileError, RenderBackend, ShaderStage, TargetError, UniformDecl, UniformKind,
    UniformStatus, UniformValue, INTERNAL_UNIFORMS,
};

/// Failures while setting up backend-owned GL objects.
#[derive(Debug, Error)]
pub enum GlowBindError {
    #[error("failed to create GL object: {0}")]
    Create(String),
}

/// Compiled program plus its resolved uniform table.
pub struct GlowProgram {
    program: glow::NativeProgram,
    uniforms: HashMap<String, (glow::NativeUniformLocation, UniformKind)>,
}

/// Offscreen framebuffer with one color texture.
pub struct GlowTarget {
    framebuffer: glow::NativeFramebuffer,
    texture: glow::NativeTexture,
    width: i32,
    height: i32,
}

impl GlowTarget {
    pub fn size(&self) -> (i32, i32) {
        (self.width, self.height)
    }
}

/// Owns the GL context and the shared fullscreen-triangle geometry.
pub struct GlowBackend {
    gl: glow::Context,
    vao: glow::NativeVertexArray,
    vbo: glow::NativeBuffer,
}

impl GlowBackend {
    pub fn new(gl: glow::Context) -> Result<Self, GlowBindError> {
        // One triangle covering the surface; attribute 0 is the position.
        let verts: [f32; 6] = [-1.0, -1.0, 3.0, -1.0, -1.0, 3.0];
        unsafe {
            let vao = gl
                .create_vertex_array()
                .map_err(GlowBindError::Create)?;
            let vbo = gl.create_buffer().map_err(GlowBindError::Create)?;

            gl.bind_vertex_array(Some(vao));
            gl.bind_buffer(glow::ARRAY_BUFFER, Some(vbo));
            let bytes = core::slice::from_raw_parts(
                verts.as_ptr() as *const u8,
                verts.len() * core::mem::size_of::<f32>(),
            );
            gl.buffer_data_u8_slice(glow::ARRAY_BUFFER, bytes, glow::STATIC_DRAW);
            gl.enable_vertex_attrib_array(0);
            gl.vertex_attrib_pointer_f32(0, 2, glow::FLOAT, false, 2 * 4, 0);
            gl.bind_buffer(glow::ARRAY_BUFFER, None);
            gl.bind_vertex_array(None);

            Ok(Self { gl, vao, vbo })
        }
    }

    /// The underlying context, e.g. for host-side swap or readback.
    pub fn context(&self) -> &glow::Context {
        &self.gl
    }

    fn draw_triangle(&self) {
        unsafe {
            self.gl.bind_vertex_array(Some(self.vao));
            self.gl.draw_arrays(glow::TRIANGLES, 0, 3);
            self.gl.bind_vertex_array(None);
        }
    }
}

impl RenderBackend for GlowBackend {
    type Program = GlowProgram;
    type Target = GlowTarget;

    fn compile(
        &mut self,
        vertex: &str,
        fragment: &str,
        uniforms: &[UniformDecl],
    ) -> Result<GlowProgram, CompileError> {
        let gl = &self.gl;
        unsafe {
            let vs = compile_stage(gl, glow::VERTEX_SHADER, vertex, ShaderStage::Vertex)?;
            let fs = match compile_stage(gl, glow::FRAGMENT_SHADER, fragment, ShaderStage::Fragment)
            {
                Ok(fs) => fs,
                Err(err) => {
                    gl.delete_shader(vs);
                    return Err(err);
                }
            };

            let program = match gl.create_program() {
                Ok(program) => program,
                Err(detail) => {
                    gl.delete_shader(vs);
                    gl.delete_shader(fs);
                    return Err(CompileError::new(ShaderStage::Link, detail));
                }
            };
            gl.attach_shader(program, vs);
            gl.attach_shader(program, fs);
            gl.bind_attrib_location(program, 0, "position");
            gl.link_program(program);
            gl.detach_shader(program, vs);
            gl.detach_shader(program, fs);
            gl.delete_shader(vs);
            gl.delete_shader(fs);

            if !gl.get_program_link_status(program) {
                let log = gl.get_program_info_log(program);
                gl.delete_program(program);
                return Err(CompileError::new(ShaderStage::Link, log));
            }

            let mut table = HashMap::new();
            for (name, kind) in INTERNAL_UNIFORMS {
                if let Some(location) = gl.get_uniform_location(program, name) {
                    table.insert(name.to_string(), (location, kind));
                }
            }
            for decl in uniforms {
                if let Some(location) = gl.get_uniform_location(program, &decl.name) {
                    table.insert(decl.name.clone(), (location, decl.kind()));
                }
            }
            debug!(uniforms = table.len(), "program linked");

            Ok(GlowProgram {
                program,
                uniforms: table,
            })
        }
    }

    fn create_target(&mut self, width: u32, height: u32) -> Result<GlowTarget, TargetError> {
        let gl = &self.gl;
        let width = width.max(1) as i32;
        let height = height.max(1) as i32;
        unsafe {
            let framebuffer = gl.create_framebuffer().map_err(TargetError)?;
            let texture = match gl.create_texture() {
                Ok(texture) => texture,
                Err(detail) => {
                    gl.delete_framebuffer(framebuffer);
                    return Err(TargetError(detail));
                }
            };

            gl.bind_texture(glow::TEXTURE_2D, Some(texture));
            gl.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_MIN_FILTER,
                glow::LINEAR as i32,
            );
            gl.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_MAG_FILTER,
                glow::LINEAR as i32,
            );
            gl.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_WRAP_S,
                glow::CLAMP_TO_EDGE as i32,
            );
            gl.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_WRAP_T,
                glow::CLAMP_TO_EDGE as i32,
            );
            gl.tex_image_2d(
                glow::TEXTURE_2D,
                0,
                glow::RGBA8 as i32,
                width,
                height,
                0,
                glow::RGBA,
                glow::UNSIGNED_BYTE,
                glow::PixelUnpackData::Slice(None),
            );

            gl.bind_framebuffer(glow::FRAMEBUFFER, Some(framebuffer));
            gl.framebuffer_texture_2d(
                glow::FRAMEBUFFER,
                glow::COLOR_ATTACHMENT0,
                glow::TEXTURE_2D,
                Some(texture),
                0,
            );

            let status = gl.check_framebuffer_status(glow::FRAMEBUFFER);
            gl.bind_framebuffer(glow::FRAMEBUFFER, None);
            gl.bind_texture(glow::TEXTURE_2D, None);
            if status != glow::FRAMEBUFFER_COMPLETE {
                gl.delete_framebuffer(framebuffer);
                gl.delete_texture(texture);
                return Err(TargetError(format!("framebuffer incomplete: 0x{status:x}")));
            }

            Ok(GlowTarget {
                framebuffer,
                texture,
                width,
                height,
            })
        }
    }

    fn destroy_program(&mut self, program: GlowProgram) {
        unsafe {
            self.gl.delete_program(program.program);
        }
    }

    fn destroy_target(&mut self, target: GlowTarget) {
        unsafe {
            self.gl.delete_framebuffer(target.framebuffer);
            self.gl.delete_texture(target.texture);
        }
    }

    fn use_program(&mut self, program: &GlowProgram) {
        unsafe {
            self.gl.use_program(Some(program.program));
        }
    }

    fn set_uniform(
        &mut self,
        program: &GlowProgram,
        name: &str,
        value: &UniformValue,
    ) -> UniformStatus {
        let Some((location, kind)) = program.uniforms.get(name) else {
            return UniformStatus::Missing;
        };
        if *kind != value.kind() {
            return UniformStatus::Rejected;
        }
        unsafe {
            match value {
                UniformValue::Float(v) => self.gl.uniform_1_f32(Some(location), *v),
                UniformValue::Vec2(v) => self.gl.uniform_2_f32(Some(location), v[0], v[1]),
                UniformValue::Vec3(v) => self.gl.uniform_3_f32(Some(location), v[0], v[1], v[2]),
                UniformValue::Vec4(v) => {
                    self.gl.uniform_4_f32(Some(location), v[0], v[1], v[2], v[3])
                }
                UniformValue::Int(v) => self.gl.uniform_1_i32(Some(location), *v),
            }
        }
        UniformStatus::Applied
    }

    fn bind_texture(&mut self, program: &GlowProgram, unit: u32, target: &GlowTarget, sampler: &str) {
        unsafe {
            self.gl.active_texture(glow::TEXTURE0 + unit);
            self.gl.bind_texture(glow::TEXTURE_2D, Some(target.texture));
            // Sampler names come from the sketch's buffer wiring, so they
            // are resolved here rather than kept in the program table.
            if let Some(location) = self.gl.get_uniform_location(program.program, sampler) {
                self.gl.uniform_1_i32(Some(&location), unit as i32);
            }
        }
    }

    fn set_viewport(&mut self, width: u32, height: u32) {
        unsafe {
            self.gl.viewport(0, 0, width as i32, height as i32);
        }
    }

    fn draw(&mut self, _program: &GlowProgram, target: Option<&GlowTarget>) {
        unsafe {
            match target {
                Some(target) => {
                    self.gl
                        .bind_framebuffer(glow::FRAMEBUFFER, Some(target.framebuffer));
                    self.draw_triangle();
                    self.gl.bind_framebuffer(glow::FRAMEBUFFER, None);
                }
                None => self.draw_triangle(),
            }
        }
    }
}

impl Drop for GlowBackend {
    fn drop(&mut self) {
        unsafe {
            self.gl.delete_vertex_array(self.vao);
            self.gl.delete_buffer(self.vbo);
        }
    }
}

unsafe fn compile_stage(
    gl: &glow::Context,
    kind: u32,
    source: &str,
    stage: ShaderStage,
) -> Result<glow::NativeShader, CompileError> {
    let shader = gl
        .create_shader(kind)
        .map_err(|detail| CompileError::new(stage, detail))?;
    gl.shader_source(shader, source);
    gl.compile_shader(shader);
    if !gl.get_shader_compile_status(shader) {
        let log = gl.get_shader_info_log(shader);
        gl.delete_shader(shader);
        return Err(CompileError::new(stage, log));
    }
    Ok(shader)
}
