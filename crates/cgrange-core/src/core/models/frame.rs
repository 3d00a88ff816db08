use nalgebra::{Point3, Vector3};

/// Orthorhombic periodic simulation box described by its edge lengths.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationBox {
    pub lengths: Vector3<f64>,
}

impl SimulationBox {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self {
            lengths: Vector3::new(x, y, z),
        }
    }

    pub fn half_lengths(&self) -> Vector3<f64> {
        self.lengths * 0.5
    }

    pub fn volume(&self) -> f64 {
        self.lengths.x * self.lengths.y * self.lengths.z
    }
}

/// A single trajectory frame: one position per coarse-grained site plus the box.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub positions: Vec<Point3<f64>>,
    pub simulation_box: SimulationBox,
}

impl Frame {
    pub fn new(positions: Vec<Point3<f64>>, simulation_box: SimulationBox) -> Self {
        Self {
            positions,
            simulation_box,
        }
    }

    pub fn n_sites(&self) -> usize {
        self.positions.len()
    }
}
