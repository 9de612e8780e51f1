//! The camera pose and the two interactive controllers that drive it.

use glam::{Mat3, Mat4, Vec2, Vec3};

mod first_person;
mod trackball;

pub use first_person::FirstPersonController;
pub use trackball::TrackballController;

/// A look-at camera. `up` and `center - eye` must never be parallel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub eye: Vec3,
    pub center: Vec3,
    pub up: Vec3,
}

impl Camera {
    pub fn new(eye: Vec3, center: Vec3, up: Vec3) -> Camera {
        Camera { eye, center, up }
    }

    /// Frames the given bounds: looking at their center from one full
    /// diagonal away, or from the side if the bounds are flat along z.
    /// Bounds too thin for either look at the center along -z.
    pub fn framing_bounds(min: Vec3, max: Vec3) -> Camera {
        let diagonal = max - min;
        let center = min + diagonal * 0.5;
        let up = Vec3::Y;
        let eye = if diagonal.z > 0.0 {
            center + diagonal
        } else {
            center + 2.0 * diagonal.cross(up)
        };
        if (eye - center).cross(up).length_squared() <= f32::EPSILON {
            let distance = diagonal.length().max(1.0);
            return Camera::new(center + Vec3::Z * distance, center, up);
        }
        Camera { eye, center, up }
    }

    pub fn front(&self) -> Vec3 {
        (self.center - self.eye).normalize()
    }

    pub fn left(&self) -> Vec3 {
        self.up.cross(self.front()).normalize()
    }

    /// `up`, made perpendicular to the view direction.
    pub fn orthonormal_up(&self) -> Vec3 {
        self.front().cross(self.left())
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye, self.center, self.up)
    }

    /// Translates eye and center together along the camera's own axes.
    pub fn move_local(&mut self, truck_left: f32, pedestal_up: f32, dolly_in: f32) {
        let translation =
            truck_left * self.left() + pedestal_up * self.orthonormal_up() + dolly_in * self.front();
        self.eye += translation;
        self.center += translation;
    }

    /// Rotates the view direction and up vector around the camera's own
    /// front, left and up axes, keeping the eye in place.
    pub fn rotate_local(&mut self, roll_right: f32, tilt_down: f32, pan_left: f32) {
        let (front, left, up) = (self.front(), self.left(), self.orthonormal_up());
        let rotation = Mat3::from_axis_angle(up, pan_left)
            * Mat3::from_axis_angle(left, tilt_down)
            * Mat3::from_axis_angle(front, roll_right);
        let distance = (self.center - self.eye).length();
        self.center = self.eye + rotation * front * distance;
        self.up = rotation * up;
    }

    /// Rotates the view direction and up vector around a world space axis
    /// through the eye.
    pub fn rotate_world(&mut self, angle: f32, axis: Vec3) {
        let rotation = Mat3::from_axis_angle(axis.normalize(), angle);
        self.center = self.eye + rotation * (self.center - self.eye);
        self.up = rotation * self.up;
    }

    /// The camera as a `--lookat` argument.
    pub fn lookat_argument(&self) -> String {
        let [ex, ey, ez] = self.eye.to_array();
        let [cx, cy, cz] = self.center.to_array();
        let [ux, uy, uz] = self.up.to_array();
        format!("--lookat {ex},{ey},{ez},{cx},{cy},{cz},{ux},{uy},{uz}")
    }
}

/// Keys held down this frame, as far as the first-person controller cares.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MovementKeys {
    pub forward: bool,
    pub backward: bool,
    pub left: bool,
    pub right: bool,
    pub up: bool,
    pub down: bool,
    pub roll_left: bool,
    pub roll_right: bool,
}

/// The input state the controllers read each update.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct InputSnapshot {
    /// Cursor position in window pixels.
    pub cursor: Vec2,
    /// Whether the trackball drag button (middle mouse) is held.
    pub orbit_button: bool,
    /// Mouse look in pixels since the last update. Only non-zero while the
    /// look button is held, the caller takes care of that.
    pub look_delta: Vec2,
    pub movement: MovementKeys,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerKind {
    Trackball,
    FirstPerson,
}

/// The active camera controller.
#[derive(Debug, Clone)]
pub enum CameraController {
    Trackball(TrackballController),
    FirstPerson(FirstPersonController),
}

impl CameraController {
    /// `speed` is the first-person movement speed in units per second.
    pub fn new(kind: ControllerKind, world_up: Vec3, speed: f32) -> CameraController {
        match kind {
            ControllerKind::Trackball => CameraController::Trackball(TrackballController::new(world_up)),
            ControllerKind::FirstPerson => {
                CameraController::FirstPerson(FirstPersonController::new(world_up, speed))
            }
        }
    }

    pub fn kind(&self) -> ControllerKind {
        match self {
            CameraController::Trackball(_) => ControllerKind::Trackball,
            CameraController::FirstPerson(_) => ControllerKind::FirstPerson,
        }
    }

    /// Returns true if the camera moved.
    pub fn update(&mut self, input: &InputSnapshot, elapsed_seconds: f32) -> bool {
        match self {
            CameraController::Trackball(controller) => controller.update(input, elapsed_seconds),
            CameraController::FirstPerson(controller) => controller.update(input, elapsed_seconds),
        }
    }

    pub fn camera(&self) -> Camera {
        match self {
            CameraController::Trackball(controller) => controller.camera(),
            CameraController::FirstPerson(controller) => controller.camera(),
        }
    }

    pub fn set_camera(&mut self, camera: Camera) {
        match self {
            CameraController::Trackball(controller) => controller.set_camera(camera),
            CameraController::FirstPerson(controller) => controller.set_camera(camera),
        }
    }

    /// Replaces the controller with a fresh one of the given kind, looking
    /// from exactly where this one did.
    pub fn switch_to(&mut self, kind: ControllerKind, speed: f32) {
        let world_up = match self {
            CameraController::Trackball(controller) => controller.world_up(),
            CameraController::FirstPerson(controller) => controller.world_up(),
        };
        let camera = self.camera();
        let mut next = CameraController::new(kind, world_up, speed);
        next.set_camera(camera);
        *self = next;
    }
}
