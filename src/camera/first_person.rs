use glam::Vec3;

use crate::camera::{Camera, InputSnapshot};

/// Radians of rotation per pixel of mouse look.
const LOOK_PER_PIXEL: f32 = 0.01;
/// Radians of roll per second while a roll key is held.
const ROLL_RATE: f32 = 0.06;

/// Flies the camera with the keyboard and looks around with the mouse.
#[derive(Debug, Clone)]
pub struct FirstPersonController {
    camera: Camera,
    world_up: Vec3,
    speed: f32,
}

impl FirstPersonController {
    pub fn new(world_up: Vec3, speed: f32) -> FirstPersonController {
        FirstPersonController {
            camera: Camera::new(Vec3::Z, Vec3::ZERO, world_up),
            world_up,
            speed,
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

    pub fn update(&mut self, input: &InputSnapshot, elapsed_seconds: f32) -> bool {
        let keys = &input.movement;
        let axis = |positive: bool, negative: bool| positive as i32 as f32 - negative as i32 as f32;
        let step = self.speed * elapsed_seconds;
        let truck_left = axis(keys.left, keys.right) * step;
        let pedestal_up = axis(keys.up, keys.down) * step;
        let dolly_in = axis(keys.forward, keys.backward) * step;
        let roll_right = axis(keys.roll_right, keys.roll_left) * ROLL_RATE * elapsed_seconds;
        let pan_left = -LOOK_PER_PIXEL * input.look_delta.x;
        let tilt_down = LOOK_PER_PIXEL * input.look_delta.y;

        let moved = [truck_left, pedestal_up, dolly_in, roll_right, pan_left, tilt_down]
            .iter()
            .any(|&amount| amount != 0.0);
        if !moved {
            return false;
        }

        self.camera.move_local(truck_left, pedestal_up, dolly_in);
        self.camera.rotate_local(roll_right, tilt_down, 0.0);
        self.camera.rotate_world(pan_left, self.world_up);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::MovementKeys;
    use glam::Vec2;

    fn first_person(speed: f32) -> FirstPersonController {
        let mut controller = FirstPersonController::new(Vec3::Y, speed);
        controller.set_camera(Camera::new(Vec3::new(1.0, 2.0, 3.0), Vec3::new(0.0, 1.0, -1.0), Vec3::Y));
        controller
    }

    fn holding(movement: MovementKeys) -> InputSnapshot {
        InputSnapshot {
            movement,
            ..Default::default()
        }
    }

    #[test]
    fn forward_for_one_second_moves_speed_units() {
        let speed = 2.5;
        let mut controller = first_person(speed);
        let before = controller.camera();
        let forward = holding(MovementKeys {
            forward: true,
            ..Default::default()
        });
        assert!(controller.update(&forward, 1.0));
        let after = controller.camera();
        let expected = before.front() * speed;
        assert!((after.eye - before.eye).abs_diff_eq(expected, 1e-5));
        assert!((after.center - before.center).abs_diff_eq(expected, 1e-5));
        assert!(after.orthonormal_up().abs_diff_eq(before.orthonormal_up(), 1e-5));
    }

    #[test]
    fn opposite_keys_cancel_out() {
        let mut controller = first_person(1.0);
        let before = controller.camera();
        let input = holding(MovementKeys {
            left: true,
            right: true,
            up: true,
            down: true,
            ..Default::default()
        });
        assert!(!controller.update(&input, 0.5));
        assert_eq!(controller.camera(), before);
    }

    #[test]
    fn truck_and_pedestal_follow_the_local_frame() {
        let mut controller = first_person(1.0);
        let before = controller.camera();
        controller.update(
            &holding(MovementKeys {
                left: true,
                ..Default::default()
            }),
            1.0,
        );
        assert!((controller.camera().eye - before.eye).abs_diff_eq(before.left(), 1e-5));

        let mut controller = first_person(1.0);
        controller.update(
            &holding(MovementKeys {
                down: true,
                ..Default::default()
            }),
            0.5,
        );
        let moved = controller.camera().eye - before.eye;
        assert!(moved.abs_diff_eq(-0.5 * before.orthonormal_up(), 1e-5));
    }

    #[test]
    fn mouse_look_turns_without_moving() {
        let mut controller = first_person(1.0);
        let before = controller.camera();
        let input = InputSnapshot {
            look_delta: Vec2::new(10.0, -5.0),
            ..Default::default()
        };
        assert!(controller.update(&input, 0.016));
        let after = controller.camera();
        assert_eq!(after.eye, before.eye);
        assert!(!after.front().abs_diff_eq(before.front(), 1e-3));
        assert!(after.front().dot(after.up).abs() < 1e-4);
    }

    #[test]
    fn roll_tilts_the_up_vector() {
        let mut controller = first_person(1.0);
        let before = controller.camera();
        controller.update(
            &holding(MovementKeys {
                roll_right: true,
                ..Default::default()
            }),
            1.0,
        );
        let after = controller.camera();
        assert!(after.front().abs_diff_eq(before.front(), 1e-5));
        let angle = after.up.angle_between(before.orthonormal_up());
        assert!((angle - ROLL_RATE).abs() < 1e-4);
    }

    #[test]
    fn idle_update_reports_no_change() {
        let mut controller = first_person(1.0);
        assert!(!controller.update(&InputSnapshot::default(), 0.016));
    }
}
