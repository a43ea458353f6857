//! Coordinate of one machine and the drag arbitration around it.
//!
//! Two writers compete for the coordinate: autonomous stepping and the user
//! dragging the pet. While a drag is active it is exclusive: the public
//! setters drop their writes and only the drag handlers move the pet.

use bevy::log::debug;
use bevy::math::Vec2;

use crate::surface::{Placement, RenderSurface};

/// Step length of [`Position::move_towards`] when callers have no opinion.
pub const DEFAULT_SPEED: f32 = 5.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointerPhase {
    Press,
    Move,
    Release,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointerButton {
    Primary,
    Secondary,
    Other,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Pointer {
    Mouse { at: Vec2, button: PointerButton },
    /// Active touch points; only the first one is used.
    Touch(Vec<Vec2>),
}

#[derive(Clone, Debug, PartialEq)]
pub struct PointerEvent {
    pub phase: PointerPhase,
    pub pointer: Pointer,
}

impl PointerEvent {
    pub fn mouse(phase: PointerPhase, at: Vec2, button: PointerButton) -> Self {
        Self {
            phase,
            pointer: Pointer::Mouse { at, button },
        }
    }

    pub fn touch(phase: PointerPhase, points: Vec<Vec2>) -> Self {
        Self {
            phase,
            pointer: Pointer::Touch(points),
        }
    }

    pub fn point(&self) -> Option<Vec2> {
        match &self.pointer {
            Pointer::Mouse { at, .. } => Some(*at),
            Pointer::Touch(points) => points.first().copied(),
        }
    }

    fn is_primary(&self) -> bool {
        match &self.pointer {
            Pointer::Mouse { button, .. } => *button == PointerButton::Primary,
            Pointer::Touch(_) => true,
        }
    }
}

/// What a pointer event did to the drag.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DragChange {
    None,
    Started,
    Moved,
    Ended,
}

#[derive(Clone, Debug, Default)]
pub struct Position {
    at: Vec2,
    /// Degrees.
    pub rotation: f32,
    dragging: bool,
    grab_offset: Vec2,
}

impl Position {
    pub fn new(x: f32, y: f32) -> Self {
        Self {
            at: Vec2::new(x, y),
            ..Self::default()
        }
    }

    pub fn x(&self) -> f32 {
        self.at.x
    }

    pub fn y(&self) -> f32 {
        self.at.y
    }

    pub fn coords(&self) -> Vec2 {
        self.at
    }

    pub fn is_dragging(&self) -> bool {
        self.dragging
    }

    /// Dropped while dragging.
    pub fn set_x(&mut self, x: f32) {
        if !self.dragging {
            self.at.x = x;
        }
    }

    /// Dropped while dragging.
    pub fn set_y(&mut self, y: f32) {
        if !self.dragging {
            self.at.y = y;
        }
    }

    pub fn set(&mut self, at: Vec2) {
        self.set_x(at.x);
        self.set_y(at.y);
    }

    /// Step `speed` towards `target`. Returns `false` once within Manhattan
    /// distance `speed` of it.
    pub fn move_towards(&mut self, target: Vec2, speed: f32) -> bool {
        let d = target - self.at;
        if d.x.abs() + d.y.abs() <= speed {
            return false;
        }
        let angle = d.y.atan2(d.x);
        self.set_x(self.at.x + angle.cos() * speed);
        self.set_y(self.at.y + angle.sin() * speed);
        true
    }

    /// Feed one pointer event. `blocked` is the owner's `is_blocked(drag)`.
    pub fn handle_pointer(&mut self, event: &PointerEvent, blocked: bool) -> DragChange {
        match event.phase {
            PointerPhase::Press => {
                if blocked || !event.is_primary() {
                    return DragChange::None;
                }
                let Some(point) = event.point() else {
                    return DragChange::None;
                };
                self.grab_offset = point - self.at;
                self.dragging = true;
                debug!("drag started at {point}");
                DragChange::Started
            }
            PointerPhase::Move => {
                if !self.dragging {
                    return DragChange::None;
                }
                let Some(point) = event.point() else {
                    return DragChange::None;
                };
                self.at = point - self.grab_offset;
                DragChange::Moved
            }
            PointerPhase::Release => {
                if !event.is_primary() || !self.dragging {
                    return DragChange::None;
                }
                self.dragging = false;
                debug!("drag released at {}", self.at);
                DragChange::Ended
            }
        }
    }

    pub fn placement(&self) -> Placement {
        Placement {
            x: self.at.x,
            y: self.at.y,
            rotation: self.rotation,
        }
    }

    pub fn update(&self, surface: &mut dyn RenderSurface) {
        surface.place(self.placement());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::RecordingSurface;

    fn press(x: f32, y: f32) -> PointerEvent {
        PointerEvent::mouse(PointerPhase::Press, Vec2::new(x, y), PointerButton::Primary)
    }

    fn moved(x: f32, y: f32) -> PointerEvent {
        PointerEvent::mouse(PointerPhase::Move, Vec2::new(x, y), PointerButton::Primary)
    }

    fn release() -> PointerEvent {
        PointerEvent::mouse(PointerPhase::Release, Vec2::ZERO, PointerButton::Primary)
    }

    #[test]
    fn move_towards_converges_without_overshooting() {
        let target = Vec2::new(500.0, 200.0);
        let mut pos = Position::new(0.0, 0.0);
        let mut steps = 0;
        while pos.move_towards(target, DEFAULT_SPEED) {
            steps += 1;
            assert!(steps < 200, "did not converge");
            assert!(pos.x() <= target.x + DEFAULT_SPEED);
            assert!(pos.y() <= target.y + DEFAULT_SPEED);
        }
        let d = target - pos.coords();
        assert!(d.x.abs() + d.y.abs() <= DEFAULT_SPEED);
        assert!((100..=110).contains(&steps), "took {steps} steps");

        let mut again = Position::new(0.0, 0.0);
        let mut replay = 0;
        while again.move_towards(target, DEFAULT_SPEED) {
            replay += 1;
        }
        assert_eq!(replay, steps);
        assert_eq!(again.coords(), pos.coords());
    }

    #[test]
    fn arrival_uses_manhattan_distance() {
        let mut pos = Position::new(0.0, 0.0);
        // euclidean 4.24, manhattan 6
        assert!(pos.move_towards(Vec2::new(3.0, 3.0), 5.0));
        let mut pos = Position::new(0.0, 0.0);
        assert!(!pos.move_towards(Vec2::new(2.0, 3.0), 5.0));
        assert_eq!(pos.coords(), Vec2::ZERO);
    }

    #[test]
    fn writes_are_dropped_while_dragging() {
        let mut pos = Position::new(10.0, 10.0);
        assert_eq!(pos.handle_pointer(&press(12.0, 15.0), false), DragChange::Started);

        pos.set_x(99.0);
        pos.set_y(99.0);
        assert!(pos.move_towards(Vec2::new(400.0, 10.0), 5.0));
        assert_eq!(pos.coords(), Vec2::new(10.0, 10.0));

        assert_eq!(pos.handle_pointer(&moved(52.0, 45.0), false), DragChange::Moved);
        assert_eq!(pos.coords(), Vec2::new(50.0, 40.0));

        assert_eq!(pos.handle_pointer(&release(), false), DragChange::Ended);
        pos.set_x(7.0);
        assert_eq!(pos.x(), 7.0);
    }

    #[test]
    fn blocked_or_secondary_press_does_not_drag() {
        let mut pos = Position::new(0.0, 0.0);
        assert_eq!(pos.handle_pointer(&press(1.0, 1.0), true), DragChange::None);
        let right = PointerEvent::mouse(PointerPhase::Press, Vec2::ONE, PointerButton::Secondary);
        assert_eq!(pos.handle_pointer(&right, false), DragChange::None);
        assert_eq!(pos.handle_pointer(&moved(50.0, 50.0), false), DragChange::None);
        assert_eq!(pos.coords(), Vec2::ZERO);
    }

    #[test]
    fn touch_uses_first_point() {
        let mut pos = Position::new(0.0, 0.0);
        let start = PointerEvent::touch(
            PointerPhase::Press,
            vec![Vec2::new(5.0, 5.0), Vec2::new(300.0, 300.0)],
        );
        assert_eq!(pos.handle_pointer(&start, false), DragChange::Started);
        let drag = PointerEvent::touch(
            PointerPhase::Move,
            vec![Vec2::new(25.0, 15.0), Vec2::new(900.0, 900.0)],
        );
        pos.handle_pointer(&drag, false);
        assert_eq!(pos.coords(), Vec2::new(20.0, 10.0));

        let empty = PointerEvent::touch(PointerPhase::Move, Vec::new());
        assert_eq!(pos.handle_pointer(&empty, false), DragChange::None);
        let end = PointerEvent::touch(PointerPhase::Release, Vec::new());
        assert_eq!(pos.handle_pointer(&end, false), DragChange::Ended);
    }

    #[test]
    fn update_writes_placement() {
        let mut pos = Position::new(3.0, 4.0);
        pos.rotation = 90.0;
        let mut surface = RecordingSurface::new();
        pos.update(&mut surface);
        assert_eq!(
            surface.last_placement(),
            Some(Placement {
                x: 3.0,
                y: 4.0,
                rotation: 90.0
            })
        );
    }
}
