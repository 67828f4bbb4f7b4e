use std::f32::consts::PI;

use glam::Vec3;
use rand::Rng;
use thiserror::Error;

/// Lower bound of the `z` draw in [`sample_hemisphere`], `cos(PI / 4)`.
///
/// The sampler inherited this bound from the shipped shader math; it narrows
/// the draw to a 45 degree half-angle cone around the normal instead of the
/// full hemisphere the function name suggests. Kept as observed behavior.
pub const SAMPLE_CONE_COS: f32 = std::f32::consts::FRAC_1_SQRT_2;

/// Degenerate inputs detected by the camera and sampling math.
///
/// Both variants are programmer or configuration errors; the per-frame loop
/// logs and skips the frame instead of letting NaNs reach the GPU.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum MathError {
    #[error("cannot normalize a zero-length vector")]
    DegenerateVector,
    #[error("view-projection matrix is singular")]
    SingularMatrix,
}

/// Euclidean norm of `v`.
pub fn length(v: Vec3) -> f32 {
    v.length()
}

/// Scales `v` to unit length, rejecting zero-length input.
pub fn normalize(v: Vec3) -> Result<Vec3, MathError> {
    let len = length(v);
    if len == 0.0 || !len.is_finite() {
        return Err(MathError::DegenerateVector);
    }
    Ok(v / len)
}

/// Draws uniformly from `[a, b)` using the injected generator.
pub fn uniform_random<R: Rng + ?Sized>(rng: &mut R, a: f32, b: f32) -> f32 {
    if a == b {
        return a;
    }
    rng.gen_range(a..b)
}

/// Right-handed orthonormal frame built around a surface normal.
///
/// `b3` is the normalized input normal; `b1` and `b2` span the perpendicular
/// plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Basis {
    pub b1: Vec3,
    pub b2: Vec3,
    pub b3: Vec3,
}

impl Basis {
    /// Constructs the frame from `normal`.
    ///
    /// The reference vector is world +X unless the normal is nearly aligned
    /// with the X axis (`|b3.z| >= 0.5` picks world +Y) so the cross product
    /// never degenerates.
    pub fn from_normal(normal: Vec3) -> Result<Self, MathError> {
        let b3 = normalize(normal)?;
        let different = if b3.z.abs() < 0.5 {
            Vec3::new(1.0, 0.0, 0.0)
        } else {
            Vec3::new(0.0, 1.0, 0.0)
        };
        let b1 = normalize(b3.cross(different))?;
        let b2 = b1.cross(b3);
        Ok(Self { b1, b2, b3 })
    }
}

/// Draws a unit direction in the cone around `normal`.
///
/// `z` is drawn from `[SAMPLE_CONE_COS, 1)` and `theta` from `[-PI, PI)`, so
/// `dot(result, normal) >= cos(PI / 4)` always holds. The result is unit
/// length by construction (`x^2 + y^2 + z^2 = 1`).
pub fn sample_hemisphere<R: Rng + ?Sized>(rng: &mut R, normal: Vec3) -> Result<Vec3, MathError> {
    let basis = Basis::from_normal(normal)?;
    let z = uniform_random(rng, SAMPLE_CONE_COS, 1.0);
    let theta = uniform_random(rng, -PI, PI);
    let r = (1.0 - z * z).max(0.0).sqrt();
    let x = r * theta.cos();
    let y = r * theta.sin();
    Ok(x * basis.b1 + y * basis.b2 + z * basis.b3)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const EPS: f32 = 1e-5;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(0x5EED)
    }

    fn random_unit(rng: &mut StdRng) -> Vec3 {
        loop {
            let v = Vec3::new(
                uniform_random(rng, -1.0, 1.0),
                uniform_random(rng, -1.0, 1.0),
                uniform_random(rng, -1.0, 1.0),
            );
            if v.length_squared() > 1e-4 {
                return v.normalize();
            }
        }
    }

    #[test]
    fn normalize_returns_unit_vectors() {
        let mut rng = rng();
        for _ in 0..100 {
            let v = random_unit(&mut rng) * uniform_random(&mut rng, 0.01, 100.0);
            let n = normalize(v).unwrap();
            assert!((n.length() - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn normalize_rejects_zero_vector() {
        assert_eq!(normalize(Vec3::ZERO), Err(MathError::DegenerateVector));
    }

    #[test]
    fn uniform_random_stays_in_range() {
        let mut rng = rng();
        for _ in 0..1000 {
            let v = uniform_random(&mut rng, -3.0, 7.0);
            assert!((-3.0..7.0).contains(&v));
        }
    }

    #[test]
    fn basis_is_orthonormal_in_both_branches() {
        // One normal per reference-vector branch: |z| < 0.5 and |z| >= 0.5.
        for normal in [Vec3::new(0.3, 0.9, 0.2), Vec3::new(0.1, 0.2, 0.97)] {
            let basis = Basis::from_normal(normal).unwrap();
            assert!(basis.b1.dot(basis.b2).abs() < EPS);
            assert!(basis.b1.dot(basis.b3).abs() < EPS);
            assert!(basis.b2.dot(basis.b3).abs() < EPS);
            assert!((basis.b1.length() - 1.0).abs() < EPS);
            assert!((basis.b2.length() - 1.0).abs() < EPS);
            assert!((basis.b3 - normal.normalize()).length() < EPS);
            // Right-handed: b1 x b2 points back along b3.
            assert!((basis.b1.cross(basis.b2) - basis.b3).length() < EPS);
        }
    }

    #[test]
    fn basis_rejects_zero_normal() {
        assert_eq!(
            Basis::from_normal(Vec3::ZERO),
            Err(MathError::DegenerateVector)
        );
    }

    #[test]
    fn hemisphere_samples_are_unit_and_inside_the_cone() {
        // Known deviation: the sampler covers a 45 degree cone, not the full
        // hemisphere, so the dot-product bound below is cos(PI / 4) rather
        // than zero.
        let mut rng = rng();
        for _ in 0..1000 {
            let normal = random_unit(&mut rng);
            let sample = sample_hemisphere(&mut rng, normal).unwrap();
            assert!((sample.length() - 1.0).abs() < 1e-4);
            assert!(sample.dot(normal) >= SAMPLE_CONE_COS - 1e-4);
        }
    }

    #[test]
    fn hemisphere_covers_both_reference_branches() {
        let mut rng = rng();
        for normal in [Vec3::Y, Vec3::Z, -Vec3::Z, Vec3::X] {
            for _ in 0..250 {
                let sample = sample_hemisphere(&mut rng, normal).unwrap();
                assert!(sample.dot(normal) >= SAMPLE_CONE_COS - 1e-4);
            }
        }
    }

    #[test]
    fn hemisphere_rejects_zero_normal() {
        let mut rng = rng();
        assert_eq!(
            sample_hemisphere(&mut rng, Vec3::ZERO),
            Err(MathError::DegenerateVector)
        );
    }
}
