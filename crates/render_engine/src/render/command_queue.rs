//! # Render Command Queue
//!
//! Frame-scoped, fixed-capacity buffer of [`RenderCommand`]s. Game logic pushes
//! during the frame; the active backend consumes the queue once in
//! `begin_frame`/`end_frame`; the renderer clears it afterwards.
//!
//! ## Layout
//!
//! Draws and lifecycle commands (generate, retire, light updates) are kept in
//! two separate regions. The backend drains the lifecycle region first, so
//! every id a draw references has been resolved before the draws are read,
//! no matter in which order the two kinds were pushed.
//!
//! Capacity is shared by both regions and fixed when the queue is created.
//! A push past capacity is rejected with [`RenderError::QueueFull`] and the
//! command is dropped by the caller, never silently truncated.

use crate::foundation::math::Vec3;
use crate::foundation::sort::quicksort;
use crate::render::commands::{
    DirectionalLightCommand, DrawCommand, GenerateMesh, GenerateTexture, MeshId, PointLightCommand,
    RenderCommand, TextureId, UiRect,
};
use crate::render::draw_order;
use crate::render::{RenderError, RenderResult};

/// Default number of commands a frame may hold
pub const DEFAULT_COMMAND_CAPACITY: usize = 1024;

/// Commands collected for one frame
#[derive(Debug)]
pub struct CommandQueue {
    /// Draw commands, in submission order until sorted
    draws: Vec<DrawCommand>,

    /// Generate/retire/light commands, in submission order
    lifecycle: Vec<RenderCommand>,

    /// Legacy UI rectangles, drawn after the scene
    ui_rects: Vec<UiRect>,

    /// Maximum of draws + lifecycle commands
    capacity: usize,
}

impl CommandQueue {
    /// Create an empty queue holding at most `capacity` commands
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            draws: Vec::with_capacity(capacity),
            lifecycle: Vec::with_capacity(capacity / 4),
            ui_rects: Vec::new(),
            capacity,
        }
    }

    /// Append one command
    ///
    /// # Errors
    /// [`RenderError::QueueFull`] when the frame already holds `capacity`
    /// commands; the queue is left unchanged.
    pub fn push(&mut self, command: RenderCommand) -> RenderResult<()> {
        if self.len() >= self.capacity {
            log::warn!(
                "Render command queue full ({} commands), rejecting {}",
                self.capacity,
                command.name()
            );
            return Err(RenderError::QueueFull { capacity: self.capacity });
        }

        match command {
            RenderCommand::Draw3d(draw) => self.draws.push(draw),
            other => self.lifecycle.push(other),
        }
        Ok(())
    }

    /// Append a draw command
    pub fn push_draw(&mut self, draw: DrawCommand) -> RenderResult<()> {
        self.push(RenderCommand::Draw3d(draw))
    }

    /// Append a mesh generation request
    pub fn push_generate_mesh(&mut self, generate: GenerateMesh) -> RenderResult<()> {
        self.push(RenderCommand::GenerateMesh(generate))
    }

    /// Append a texture generation request
    pub fn push_generate_texture(&mut self, generate: GenerateTexture) -> RenderResult<()> {
        self.push(RenderCommand::GenerateTexture(generate))
    }

    /// Append a mesh release request
    pub fn push_retire_meshes(&mut self, ids: Vec<MeshId>) -> RenderResult<()> {
        self.push(RenderCommand::RetireMeshes(ids))
    }

    /// Append a texture release request
    pub fn push_retire_textures(&mut self, ids: Vec<TextureId>) -> RenderResult<()> {
        self.push(RenderCommand::RetireTextures(ids))
    }

    /// Append a directional light update
    pub fn push_directional_light(&mut self, light: DirectionalLightCommand) -> RenderResult<()> {
        self.push(RenderCommand::SetDirectionalLight(light))
    }

    /// Append a point light update
    pub fn push_point_light(&mut self, light: PointLightCommand) -> RenderResult<()> {
        self.push(RenderCommand::SetPointLight(light))
    }

    /// Append a UI rectangle
    ///
    /// UI rectangles have their own budget of `capacity` entries.
    pub fn push_ui_rect(&mut self, rect: UiRect) -> RenderResult<()> {
        if self.ui_rects.len() >= self.capacity {
            return Err(RenderError::QueueFull { capacity: self.capacity });
        }
        self.ui_rects.push(rect);
        Ok(())
    }

    /// Number of queued draw and lifecycle commands
    pub fn len(&self) -> usize {
        self.draws.len() + self.lifecycle.len()
    }

    /// Whether no commands are queued
    pub fn is_empty(&self) -> bool {
        self.draws.is_empty() && self.lifecycle.is_empty() && self.ui_rects.is_empty()
    }

    /// Maximum number of commands per frame
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Queued draws
    pub fn draws(&self) -> &[DrawCommand] {
        &self.draws
    }

    /// Queued lifecycle commands
    pub fn lifecycle(&self) -> &[RenderCommand] {
        &self.lifecycle
    }

    /// Queued UI rectangles
    pub fn ui_rects(&self) -> &[UiRect] {
        &self.ui_rects
    }

    /// Remove and return the lifecycle commands in submission order
    ///
    /// After this the queue only exposes draws, so later phases never see
    /// lifecycle commands.
    pub fn take_lifecycle(&mut self) -> Vec<RenderCommand> {
        std::mem::take(&mut self.lifecycle)
    }

    /// Sort draws back to front as seen from `camera_position`
    pub fn sort_draws_back_to_front(&mut self, camera_position: Vec3) {
        quicksort(&mut self.draws, |a, b| draw_order::farther_first(a, b, camera_position));
    }

    /// Reset for the next frame
    ///
    /// Calling it twice in a row is the same as calling it once.
    pub fn clear(&mut self) {
        self.draws.clear();
        self.lifecycle.clear();
        self.ui_rects.clear();
    }
}

impl Default for CommandQueue {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_COMMAND_CAPACITY)
    }
}
