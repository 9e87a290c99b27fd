//! Shader programs of the OpenGL backend
//!
//! Five programs are loaded at init from GLSL stage files laid out as
//! `<shader_dir>/<name>.<stage>.glsl`. A missing file, a compile error or a
//! link error is fatal: there is no partial-success path.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use super::device::{GpuDevice, ShaderStage};
use super::uniforms::UNIFORM_BLOCKS;
use crate::render::{RenderError, RenderResult};

/// First texture unit of the material textures (diffuse, normal, roughness,
/// metallic occupy units 0 to 3)
pub const MATERIAL_TEXTURE_UNIT: u32 = 0;
/// Texture unit of the directional shadow map
pub const DIRECTIONAL_SHADOW_UNIT: u32 = 4;
/// Texture unit of point shadow map 0; maps 1 to 3 follow
pub const POINT_SHADOW_UNIT: u32 = 5;
/// Texture unit of the post-process input
pub const POST_PROCESS_INPUT_UNIT: u32 = 0;

/// The programs the backend renders with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProgramKind {
    /// Fullscreen blit of the main framebuffer
    PostProcess,
    /// Flat-colored UI quads
    UiDebugColor,
    /// Lit, textured, shadow-receiving geometry
    PhongBrdf,
    /// Depth-only directional shadow
    ShadowDirectional,
    /// Depth-only point shadow; a geometry stage emits all six cube faces
    ShadowPoint,
}

impl ProgramKind {
    /// Every program, in load order
    pub const ALL: [Self; 5] = [
        Self::PostProcess,
        Self::UiDebugColor,
        Self::PhongBrdf,
        Self::ShadowDirectional,
        Self::ShadowPoint,
    ];

    /// File name stem of the program's stages
    pub const fn name(self) -> &'static str {
        match self {
            Self::PostProcess => "post_process",
            Self::UiDebugColor => "ui_debug_color",
            Self::PhongBrdf => "phong_brdf",
            Self::ShadowDirectional => "shadow_directional",
            Self::ShadowPoint => "shadow_point",
        }
    }

    /// Stages the program is linked from
    pub const fn stages(self) -> &'static [ShaderStage] {
        match self {
            Self::ShadowPoint => &[ShaderStage::Vertex, ShaderStage::Geometry, ShaderStage::Fragment],
            _ => &[ShaderStage::Vertex, ShaderStage::Fragment],
        }
    }

    /// Non-sampler uniforms the backend sets
    pub const fn uniforms(self) -> &'static [&'static str] {
        match self {
            Self::PostProcess => &[],
            Self::UiDebugColor => &["u_transform", "u_color"],
            Self::PhongBrdf => &["u_transform", "u_normal_matrix", "u_tint", "u_shadow_receiver"],
            Self::ShadowDirectional => &["u_transform"],
            Self::ShadowPoint => &["u_transform", "u_point_index"],
        }
    }

    /// Samplers paired with the texture unit they read from
    pub const fn samplers(self) -> &'static [(&'static str, u32)] {
        match self {
            Self::PostProcess => &[("u_input", POST_PROCESS_INPUT_UNIT)],
            Self::PhongBrdf => &[
                ("u_diffuse", MATERIAL_TEXTURE_UNIT),
                ("u_normal", MATERIAL_TEXTURE_UNIT + 1),
                ("u_roughness", MATERIAL_TEXTURE_UNIT + 2),
                ("u_metallic", MATERIAL_TEXTURE_UNIT + 3),
                ("u_shadow_directional", DIRECTIONAL_SHADOW_UNIT),
                ("u_shadow_point0", POINT_SHADOW_UNIT),
                ("u_shadow_point1", POINT_SHADOW_UNIT + 1),
                ("u_shadow_point2", POINT_SHADOW_UNIT + 2),
                ("u_shadow_point3", POINT_SHADOW_UNIT + 3),
            ],
            _ => &[],
        }
    }

    /// Path of one stage file
    pub fn stage_path(self, dir: &Path, stage: ShaderStage) -> PathBuf {
        dir.join(format!("{}.{}.glsl", self.name(), stage.file_extension()))
    }
}

/// Read every stage source of `kind` from `dir`
///
/// # Errors
/// [`RenderError::ShaderFileMissing`] for the first stage file that cannot be
/// read.
pub fn read_program_sources(dir: &Path, kind: ProgramKind) -> RenderResult<Vec<(ShaderStage, String)>> {
    kind.stages()
        .iter()
        .map(|&stage| {
            let path = kind.stage_path(dir, stage);
            std::fs::read_to_string(&path)
                .map(|source| (stage, source))
                .map_err(|source| RenderError::ShaderFileMissing { path, source })
        })
        .collect()
}

/// A linked program with its uniform locations
pub struct ShaderProgram<D: GpuDevice> {
    program: D::Program,
    uniforms: HashMap<&'static str, D::UniformLocation>,
}

impl<D: GpuDevice> ShaderProgram<D> {
    /// Link `kind` from sources, bind its uniform blocks and sampler units
    pub fn create(device: &mut D, kind: ProgramKind, sources: &[(ShaderStage, String)]) -> RenderResult<Self> {
        let stages: Vec<(ShaderStage, &str)> =
            sources.iter().map(|(stage, source)| (*stage, source.as_str())).collect();
        let program = device.create_program(kind.name(), &stages)?;

        for (block, binding) in UNIFORM_BLOCKS {
            device.bind_uniform_block(program, block, binding);
        }

        let uniforms = kind
            .uniforms()
            .iter()
            .filter_map(|&name| device.uniform_location(program, name).map(|location| (name, location)))
            .collect();

        if !kind.samplers().is_empty() {
            device.use_program(program);
            for &(name, unit) in kind.samplers() {
                let location = device.uniform_location(program, name);
                device.set_uniform_i32(location.as_ref(), unit as i32);
            }
        }

        Ok(Self { program, uniforms })
    }

    /// Native program handle
    pub const fn program(&self) -> D::Program {
        self.program
    }

    /// Location of a uniform, `None` if the program does not use it
    pub fn uniform(&self, name: &str) -> Option<&D::UniformLocation> {
        self.uniforms.get(name)
    }
}

/// All programs the backend renders with
pub struct ShaderLibrary<D: GpuDevice> {
    /// Fullscreen blit
    pub post_process: ShaderProgram<D>,
    /// UI quads
    pub ui_debug_color: ShaderProgram<D>,
    /// Main pass
    pub phong_brdf: ShaderProgram<D>,
    /// Directional shadow pass
    pub shadow_directional: ShaderProgram<D>,
    /// Point shadow pass
    pub shadow_point: ShaderProgram<D>,
}

impl<D: GpuDevice> ShaderLibrary<D> {
    /// Load and link every program from `dir`
    ///
    /// Programs linked before a failure are deleted again.
    pub fn load(device: &mut D, dir: &Path) -> RenderResult<Self> {
        let mut linked: Vec<D::Program> = Vec::with_capacity(ProgramKind::ALL.len());
        let mut load = |kind: ProgramKind| -> RenderResult<ShaderProgram<D>> {
            let program = read_program_sources(dir, kind)
                .inspect_err(|e| log::error!("Failed to read shader program '{}': {}", kind.name(), e))
                .and_then(|sources| {
                    ShaderProgram::create(device, kind, &sources).inspect_err(|e| {
                        log::error!("Failed to build shader program '{}': {}", kind.name(), e);
                    })
                });
            match program {
                Ok(program) => {
                    log::debug!("Loaded shader program '{}'", kind.name());
                    linked.push(program.program());
                    Ok(program)
                }
                Err(e) => {
                    for &program in &linked {
                        device.delete_program(program);
                    }
                    Err(e)
                }
            }
        };

        Ok(Self {
            post_process: load(ProgramKind::PostProcess)?,
            ui_debug_color: load(ProgramKind::UiDebugColor)?,
            phong_brdf: load(ProgramKind::PhongBrdf)?,
            shadow_directional: load(ProgramKind::ShadowDirectional)?,
            shadow_point: load(ProgramKind::ShadowPoint)?,
        })
    }

    /// Delete every program
    pub fn destroy(&self, device: &mut D) {
        for program in [
            &self.post_process,
            &self.ui_debug_color,
            &self.phong_brdf,
            &self.shadow_directional,
            &self.shadow_point,
        ] {
            device.delete_program(program.program());
        }
    }
}
