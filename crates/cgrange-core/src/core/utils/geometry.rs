use nalgebra::{Point3, Vector3};

/// Displacement `to - from` folded into the primary image of an orthorhombic box.
#[inline]
pub fn minimum_image(from: &Point3<f64>, to: &Point3<f64>, half_lengths: &Vector3<f64>) -> Vector3<f64> {
    let mut d = to - from;
    for axis in 0..3 {
        let half = half_lengths[axis];
        if half <= 0.0 {
            continue;
        }
        let full = 2.0 * half;
        if d[axis] > half {
            d[axis] -= full * ((d[axis] - half) / full).ceil();
        } else if d[axis] < -half {
            d[axis] += full * ((-d[axis] - half) / full).ceil();
        }
    }
    d
}

pub fn distance(positions: &[Point3<f64>], sites: [usize; 2], half_lengths: &Vector3<f64>) -> f64 {
    minimum_image(&positions[sites[0]], &positions[sites[1]], half_lengths).norm()
}

/// Angle in degrees at `sites[1]` formed with the end sites `sites[0]` and `sites[2]`.
pub fn angle(positions: &[Point3<f64>], sites: [usize; 3], half_lengths: &Vector3<f64>) -> f64 {
    let [k, j, l] = sites;
    let a = minimum_image(&positions[j], &positions[k], half_lengths);
    let b = minimum_image(&positions[j], &positions[l], half_lengths);
    let cos_theta = (a.dot(&b) / (a.norm() * b.norm())).clamp(-1.0, 1.0);
    cos_theta.acos().to_degrees()
}

/// Dihedral in degrees, in `(-180, 180]`, around the central bond `sites[1]`-`sites[2]`.
pub fn dihedral(positions: &[Point3<f64>], sites: [usize; 4], half_lengths: &Vector3<f64>) -> f64 {
    let [k, i, j, l] = sites;
    let b1 = minimum_image(&positions[k], &positions[i], half_lengths);
    let b2 = minimum_image(&positions[i], &positions[j], half_lengths);
    let b3 = minimum_image(&positions[j], &positions[l], half_lengths);

    let n1 = b1.cross(&b2);
    let n2 = b2.cross(&b3);
    let y = b2.norm() * b1.dot(&n2);
    let x = n1.dot(&n2);
    y.atan2(x).to_degrees()
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOLERANCE: f64 = 1e-9;

    fn f64_approx_equal(a: f64, b: f64) -> bool {
        (a - b).abs() < TOLERANCE
    }

    fn open_box() -> Vector3<f64> {
        Vector3::new(100.0, 100.0, 100.0)
    }

    #[test]
    fn distance_uses_minimum_image_across_boundary() {
        let positions = vec![Point3::new(0.5, 0.0, 0.0), Point3::new(9.5, 0.0, 0.0)];
        let half = Vector3::new(5.0, 5.0, 5.0);
        assert!(f64_approx_equal(distance(&positions, [0, 1], &half), 1.0));
    }

    #[test]
    fn minimum_image_folds_displacements_longer_than_a_box() {
        let d = minimum_image(
            &Point3::new(0.0, 0.0, 0.0),
            &Point3::new(21.0, -19.5, 0.0),
            &Vector3::new(5.0, 5.0, 5.0),
        );
        assert!(f64_approx_equal(d.x, 1.0));
        assert!(f64_approx_equal(d.y, 0.5));
    }

    #[test]
    fn angle_of_right_angle_is_ninety_degrees() {
        let positions = vec![
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(0.0, 2.0, 0.0),
        ];
        assert!(f64_approx_equal(angle(&positions, [0, 1, 2], &open_box()), 90.0));
    }

    #[test]
    fn angle_of_collinear_sites_is_one_eighty() {
        let positions = vec![
            Point3::new(-1.0, 0.0, 0.0),
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(3.0, 0.0, 0.0),
        ];
        assert!(f64_approx_equal(angle(&positions, [0, 1, 2], &open_box()), 180.0));
    }

    #[test]
    fn dihedral_of_trans_configuration_is_one_eighty() {
        let positions = vec![
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, -1.0, 0.0),
        ];
        let phi = dihedral(&positions, [0, 1, 2, 3], &open_box());
        assert!(f64_approx_equal(phi.abs(), 180.0));
    }

    #[test]
    fn dihedral_of_perpendicular_configuration_is_ninety_in_magnitude() {
        let positions = vec![
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 1.0),
        ];
        let phi = dihedral(&positions, [0, 1, 2, 3], &open_box());
        assert!(f64_approx_equal(phi.abs(), 90.0));
    }

    #[test]
    fn dihedral_of_cis_configuration_is_zero() {
        let positions = vec![
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
        ];
        assert!(f64_approx_equal(dihedral(&positions, [0, 1, 2, 3], &open_box()), 0.0));
    }
}
