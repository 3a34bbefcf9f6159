//! Vector and rotation helpers shared by the solver and the collision world.
//!
//! World space is Z-up: X east, Y north, Z up. Yaw rotates about −Z (positive
//! turns clockwise seen from above) and pitch about −X, matching the way the
//! game stores actor orientation. Conversions to the collision library's
//! `nalgebra`-based types live here so the rest of the crate can stay in
//! `glam`.

use glam::{Quat, Vec3};
use parry3d::math::{Isometry, Point, Real, Vector};
use parry3d::na::{Quaternion, Translation3, UnitQuaternion};

/// Full movement-space orientation: pitch about −X applied first, then yaw
/// about −Z. Used for flying and swimming actors and for no-clip movement.
pub fn movement_rotation(pitch: f32, yaw: f32) -> Quat {
    yaw_rotation(yaw) * Quat::from_axis_angle(Vec3::NEG_X, pitch)
}

/// Yaw-only orientation for grounded movement.
pub fn yaw_rotation(yaw: f32) -> Quat {
    Quat::from_axis_angle(Vec3::NEG_Z, yaw)
}

/// Orientation of a placed object from its stored Euler angles
/// (applied z, then y, then x, each about the negative axis).
pub fn rotation_from_euler(angles: Vec3) -> Quat {
    Quat::from_axis_angle(Vec3::NEG_Z, angles.z)
        * Quat::from_axis_angle(Vec3::NEG_Y, angles.y)
        * Quat::from_axis_angle(Vec3::NEG_X, angles.x)
}

/// Angle in degrees between a surface normal and the up axis.
pub fn slope_degrees(normal: Vec3) -> f32 {
    normal.z.clamp(-1.0, 1.0).acos().to_degrees()
}

/// Project `u` onto `v`.
pub fn project(u: Vec3, v: Vec3) -> Vec3 {
    v * u.dot(v)
}

/// Remove the component of `direction` along `plane_normal`, so the
/// remainder glides along the surface.
pub fn slide(direction: Vec3, plane_normal: Vec3) -> Vec3 {
    direction - project(direction, plane_normal)
}

/// Reflect `velocity` about the plane with the given normal.
pub fn reflect(velocity: Vec3, normal: Vec3) -> Vec3 {
    velocity - normal * normal.dot(velocity) * 2.0
}

pub fn to_point(v: Vec3) -> Point<Real> {
    Point::new(v.x, v.y, v.z)
}

pub fn to_vector(v: Vec3) -> Vector<Real> {
    Vector::new(v.x, v.y, v.z)
}

pub fn from_point(p: Point<Real>) -> Vec3 {
    Vec3::new(p.x, p.y, p.z)
}

pub fn from_vector(v: Vector<Real>) -> Vec3 {
    Vec3::new(v.x, v.y, v.z)
}

/// Build a collision-library isometry from a translation and rotation.
pub fn to_isometry(translation: Vec3, rotation: Quat) -> Isometry<Real> {
    Isometry::from_parts(
        Translation3::new(translation.x, translation.y, translation.z),
        UnitQuaternion::from_quaternion(Quaternion::new(
            rotation.w, rotation.x, rotation.y, rotation.z,
        )),
    )
}

/// Translation-only isometry.
pub fn translation_isometry(translation: Vec3) -> Isometry<Real> {
    Isometry::translation(translation.x, translation.y, translation.z)
}
