use glam::{Mat3, Vec2, Vec3};

use crate::camera::{Camera, InputSnapshot};

/// Radians of rotation per pixel of cursor movement.
const ROTATION_PER_PIXEL: f32 = 0.01;

/// Orbits the eye around a fixed center while the middle mouse button is
/// dragged.
#[derive(Debug, Clone)]
pub struct TrackballController {
    camera: Camera,
    world_up: Vec3,
    /// Cursor position at the last update, while dragging.
    drag_cursor: Option<Vec2>,
}

impl TrackballController {
    pub fn new(world_up: Vec3) -> TrackballController {
        TrackballController {
            camera: Camera::new(Vec3::Z, Vec3::ZERO, world_up),
            world_up,
            drag_cursor: None,
        }
    }

    pub fn camera(&self) -> Camera {
        self.camera
    }

    pub fn set_camera(&mut self, camera: Camera) {
        self.camera = camera;
    }

    pub fn world_up(&self) -> Vec3 {
        self.world_up
    }

    pub fn update(&mut self, input: &InputSnapshot, _elapsed_seconds: f32) -> bool {
        let cursor_delta = match (self.drag_cursor, input.orbit_button) {
            (Some(last_cursor), true) => input.cursor - last_cursor,
            _ => Vec2::ZERO,
        };
        self.drag_cursor = input.orbit_button.then_some(input.cursor);
        self.orbit(cursor_delta)
    }

    /// Rotates the eye around the center by a cursor movement: vertical
    /// movement around the horizontal axis facing the eye, then horizontal
    /// movement around the world up axis.
    pub fn orbit(&mut self, cursor_delta: Vec2) -> bool {
        if cursor_delta == Vec2::ZERO {
            return false;
        }
        let latitude = -ROTATION_PER_PIXEL * cursor_delta.x;
        let longitude = -ROTATION_PER_PIXEL * cursor_delta.y;

        let offset = self.camera.eye - self.camera.center;
        let mut rotation = Mat3::from_axis_angle(self.world_up, latitude);
        // Looking straight along the up axis, there's no horizontal axis.
        if let Some(perpendicular) = self.world_up.cross(offset).try_normalize() {
            rotation *= Mat3::from_axis_angle(perpendicular, longitude);
        }

        self.camera.eye = self.camera.center + rotation * offset;
        self.camera.up = rotation * self.camera.up;
        true
    }
}
