use crate::error::ConfigError;

/// Uniform 1D finite-volume mesh.
///
/// `x_face[i]` and `x_face[i + 1]` bound cell `i`; `x_cell[i]` is its center.
#[derive(Debug, Clone)]
pub struct Mesh {
    x_left: f64,
    x_right: f64,
    num_cells: usize,
    dx: f64,
    x_cell: Vec<f64>,
    x_face: Vec<f64>,
}

impl Mesh {
    pub fn from_cells(x_left: f64, x_right: f64, num_cells: usize) -> Result<Self, ConfigError> {
        if num_cells == 0 {
            return Err(ConfigError::EmptyMesh);
        }
        if !(x_right > x_left) {
            return Err(ConfigError::BadMeshBounds { x_left, x_right });
        }
        let dx = (x_right - x_left) / num_cells as f64;
        let x_face = (0..=num_cells).map(|i| x_left + dx * i as f64).collect();
        let x_cell = (0..num_cells)
            .map(|i| x_left + dx * (i as f64 + 0.5))
            .collect();
        Ok(Self {
            x_left,
            x_right,
            num_cells,
            dx,
            x_cell,
            x_face,
        })
    }

    pub fn from_dx(x_left: f64, x_right: f64, dx: f64) -> Result<Self, ConfigError> {
        if !(dx > 0.0) {
            return Err(ConfigError::NonPositiveParam {
                name: "dx",
                value: dx,
            });
        }
        let num_cells = ((x_right - x_left) / dx).ceil() as usize;
        Self::from_cells(x_left, x_right, num_cells)
    }

    pub fn x_left(&self) -> f64 {
        self.x_left
    }

    pub fn x_right(&self) -> f64 {
        self.x_right
    }

    pub fn num_cells(&self) -> usize {
        self.num_cells
    }

    pub fn dx(&self) -> f64 {
        self.dx
    }

    pub fn x_cell(&self) -> &[f64] {
        &self.x_cell
    }

    pub fn x_face(&self) -> &[f64] {
        &self.x_face
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn uniform_spacing() {
        let mesh = Mesh::from_cells(0.0, 1.0, 10).unwrap();
        assert_eq!(mesh.num_cells(), 10);
        assert_relative_eq!(mesh.dx(), 0.1);
        assert_relative_eq!(mesh.x_cell()[0], 0.05);
        assert_relative_eq!(mesh.x_cell()[9], 0.95);
        assert_relative_eq!(mesh.x_face()[10], 1.0);
    }

    #[test]
    fn from_dx_rounds_up() {
        let mesh = Mesh::from_dx(0.0, 1.0, 0.3).unwrap();
        assert_eq!(mesh.num_cells(), 4);
    }

    #[test]
    fn rejects_bad_bounds() {
        assert!(Mesh::from_cells(1.0, 0.0, 10).is_err());
        assert!(Mesh::from_cells(0.0, 1.0, 0).is_err());
    }
}
