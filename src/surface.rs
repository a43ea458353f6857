//! Render surface contract consumed by the engine.

use bevy::math::{UVec2, Vec2};

use crate::error::SurfaceError;

/// One sprite-sheet cell copied to the surface.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Blit {
    /// Index of the frame player (and therefore the sheet) being drawn.
    pub sheet: usize,
    pub col: u32,
    pub row: u32,
    /// Source cell size in sheet pixels.
    pub cell: UVec2,
    /// Destination size, `cell * scale`.
    pub size: Vec2,
    /// Mirror the draw around the destination width.
    pub flip: bool,
}

impl Blit {
    /// Top-left corner of the source cell in sheet pixels.
    pub fn source_origin(&self) -> UVec2 {
        UVec2::new(self.col * self.cell.x, self.row * self.cell.y)
    }
}

/// Affine placement applied to the whole surface each tick.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Placement {
    pub x: f32,
    pub y: f32,
    /// Degrees, clockwise on screen.
    pub rotation: f32,
}

pub trait RenderSurface {
    fn clear(&mut self);
    fn blit(&mut self, blit: &Blit) -> Result<(), SurfaceError>;
    fn place(&mut self, placement: Placement);
    fn attach(&mut self, container: &str) -> Result<(), SurfaceError>;
    fn detach(&mut self);
    fn is_attached(&self) -> bool;
}

/// What a [`RecordingSurface`] saw, in call order.
#[derive(Clone, Debug, PartialEq)]
pub enum SurfaceCall {
    Clear,
    Blit(Blit),
    Place(Placement),
    Attach(String),
    Detach,
}

/// Headless surface that keeps every call it receives.
#[derive(Debug, Default)]
pub struct RecordingSurface {
    pub calls: Vec<SurfaceCall>,
    container: Option<String>,
    /// When set, every blit fails with this error.
    pub fail_blits: Option<SurfaceError>,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attached(container: &str) -> Self {
        Self {
            container: Some(container.to_owned()),
            ..Self::default()
        }
    }

    pub fn blits(&self) -> impl Iterator<Item = &Blit> {
        self.calls.iter().filter_map(|c| match c {
            SurfaceCall::Blit(b) => Some(b),
            _ => None,
        })
    }

    pub fn last_placement(&self) -> Option<Placement> {
        self.calls.iter().rev().find_map(|c| match c {
            SurfaceCall::Place(p) => Some(*p),
            _ => None,
        })
    }

    /// Simulate the host container dropping the surface behind our back.
    pub fn lose_container(&mut self) {
        self.container = None;
    }
}

impl RenderSurface for RecordingSurface {
    fn clear(&mut self) {
        self.calls.push(SurfaceCall::Clear);
    }

    fn blit(&mut self, blit: &Blit) -> Result<(), SurfaceError> {
        if let Some(err) = &self.fail_blits {
            return Err(err.clone());
        }
        self.calls.push(SurfaceCall::Blit(*blit));
        Ok(())
    }

    fn place(&mut self, placement: Placement) {
        self.calls.push(SurfaceCall::Place(placement));
    }

    fn attach(&mut self, container: &str) -> Result<(), SurfaceError> {
        self.container = Some(container.to_owned());
        self.calls.push(SurfaceCall::Attach(container.to_owned()));
        Ok(())
    }

    fn detach(&mut self) {
        self.container = None;
        self.calls.push(SurfaceCall::Detach);
    }

    fn is_attached(&self) -> bool {
        self.container.is_some()
    }
}
