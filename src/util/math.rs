//! Math type re-exports and angle conversions used by the set formats.
//!
//! Transforms are kept as quaternions in memory. On disk the pointer-based and
//! indexed formats store Euler angles in radians, the fixed-slot format stores
//! 16-bit binary angle units (BAMS) widened to 32 bits.

pub use glam::{EulerRot, Quat, Vec2, Vec3, Vec4};

/// Euler order used by every format that stores rotations as angle triples.
pub const EULER_ORDER: EulerRot = EulerRot::XYZ;

/// BAMS units per half turn.
pub const BAMS_HALF_TURN: f32 = 32768.0;

/// Build a rotation from Euler angles in radians.
#[inline]
pub fn quat_from_euler(radians: Vec3) -> Quat {
    Quat::from_euler(EULER_ORDER, radians.x, radians.y, radians.z)
}

/// Decompose a rotation into Euler angles in radians.
#[inline]
pub fn quat_to_euler(rotation: Quat) -> Vec3 {
    let (x, y, z) = rotation.to_euler(EULER_ORDER);
    Vec3::new(x, y, z)
}

/// Convert a BAMS angle to degrees (`angle * 180 / 32768`).
#[inline]
pub fn bams_to_degrees(angle: i32) -> f32 {
    angle as f32 * 180.0 / BAMS_HALF_TURN
}

/// Convert degrees to the nearest BAMS angle.
#[inline]
pub fn degrees_to_bams(degrees: f32) -> i32 {
    (degrees * BAMS_HALF_TURN / 180.0).round() as i32
}

/// Build a rotation from three BAMS angles.
pub fn quat_from_bams(angles: [i32; 3]) -> Quat {
    let [x, y, z] = angles.map(|a| bams_to_degrees(a).to_radians());
    quat_from_euler(Vec3::new(x, y, z))
}

/// Decompose a rotation into three BAMS angles.
pub fn quat_to_bams(rotation: Quat) -> [i32; 3] {
    let euler = quat_to_euler(rotation);
    [euler.x, euler.y, euler.z].map(|r| degrees_to_bams(r.to_degrees()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_euler() {
        assert_eq!(quat_to_euler(Quat::IDENTITY), Vec3::ZERO);
        assert_eq!(quat_from_euler(Vec3::ZERO), Quat::IDENTITY);
    }

    #[test]
    fn test_euler_roundtrip() {
        let angles = Vec3::new(0.3, -0.7, 1.2);
        let back = quat_to_euler(quat_from_euler(angles));
        assert!((back - angles).abs().max_element() < 1e-5);
    }

    #[test]
    fn test_bams() {
        assert_eq!(bams_to_degrees(16384), 90.0);
        assert_eq!(bams_to_degrees(-32768), -180.0);
        assert_eq!(degrees_to_bams(45.0), 8192);
        assert_eq!(quat_to_bams(Quat::IDENTITY), [0, 0, 0]);

        let q = quat_from_bams([4096, 8192, -2048]);
        let back = quat_to_bams(q);
        assert!((back[0] - 4096).abs() <= 1);
        assert!((back[1] - 8192).abs() <= 1);
        assert!((back[2] + 2048).abs() <= 1);
    }
}
