use crate::StrError;
use gemlab::integ::Gauss;
use gemlab::shapes::{GeoKind, Scratchpad};
use russell_lab::{mat_mat_mul, mat_vec_mul, vec_copy_scaled, vec_norm, Matrix, Norm, Vector};

/// Mixed derivatives ∂²N_b/∂r∂s of the Qua4 shape functions (constant)
const DERIV_RS: [f64; 4] = [0.25, -0.25, 0.25, -0.25];

/// Evaluates the geometry of a Qua4 facet embedded in 3D
///
/// With y(r,s) = Σ N_b(r,s) x_b, the tangents are τ_α = ∂y/∂ξ_α and the normal is
/// ν = τ₁ × τ₂ / |τ₁ × τ₂|. The facets of a contact surface are numbered counterclockwise
/// when seen from outside, hence ν points outward.
pub struct FacetShape {
    /// Scratchpad holding the facet coordinates
    pad: Scratchpad,

    /// Tangents (3 × 2) computed by `calc_tangents`
    tangents: Matrix,
}

impl FacetShape {
    /// Allocates a new instance
    pub fn new() -> Result<Self, StrError> {
        Ok(FacetShape {
            pad: Scratchpad::new(3, GeoKind::Qua4)?,
            tangents: Matrix::new(3, 2),
        })
    }

    /// Sets the coordinates of the four nodes
    pub fn set_coordinates(&mut self, xf: &[[f64; 3]; 4]) {
        for m in 0..4 {
            for j in 0..3 {
                self.pad.set_xx(m, j, xf[m][j]);
            }
        }
    }

    /// Calculates and returns the shape functions N_b at (r, s)
    pub fn calc_interp(&mut self, rs: [f64; 2]) -> &Vector {
        (self.pad.fn_interp)(&mut self.pad.interp, &rs);
        &self.pad.interp
    }

    /// Calculates and returns the position y(r,s)
    pub fn calc_position(&mut self, rs: [f64; 2]) -> Result<Vector, StrError> {
        (self.pad.fn_interp)(&mut self.pad.interp, &rs);
        let mut y = Vector::new(3);
        mat_vec_mul(&mut y, 1.0, &self.pad.xxt, &self.pad.interp)?;
        Ok(y)
    }

    /// Calculates the derivatives of the shape functions and the tangents at (r, s)
    pub fn calc_tangents(&mut self, rs: [f64; 2]) -> Result<(), StrError> {
        (self.pad.fn_deriv)(&mut self.pad.deriv, &rs);
        mat_mat_mul(&mut self.tangents, 1.0, &self.pad.xxt, &self.pad.deriv, 0.0)
    }

    /// Returns the derivatives N_b,α (4 × 2) computed by `calc_tangents`
    pub fn deriv(&self) -> &Matrix {
        &self.pad.deriv
    }

    /// Returns the tangent τ_α computed by `calc_tangents`
    pub fn tangent(&self, alpha: usize) -> Vector {
        Vector::from(&[
            self.tangents.get(0, alpha),
            self.tangents.get(1, alpha),
            self.tangents.get(2, alpha),
        ])
    }

    /// Returns the unit normal and the area element |τ₁ × τ₂| (requires `calc_tangents`)
    ///
    /// The normal is zero for a degenerate facet.
    pub fn normal(&self) -> Result<(Vector, f64), StrError> {
        let c = cross(&self.tangent(0), &self.tangent(1));
        let len = vec_norm(&c, Norm::Euc);
        let mut nu = Vector::new(3);
        if len > 0.0 {
            vec_copy_scaled(&mut nu, 1.0 / len, &c)?;
        }
        Ok((nu, len))
    }

    /// Returns the mixed derivative y,rs = Σ N_b,rs x_b
    pub fn twist(&self) -> Result<Vector, StrError> {
        let mut y_rs = Vector::new(3);
        mat_vec_mul(&mut y_rs, 1.0, &self.pad.xxt, &Vector::from(&DERIV_RS))?;
        Ok(y_rs)
    }

    /// Calculates the area of the facet by Gauss quadrature
    pub fn calc_area(&mut self) -> Result<f64, StrError> {
        let gauss = Gauss::new(GeoKind::Qua4);
        let mut area = 0.0;
        for p in 0..gauss.npoint() {
            let ksi = gauss.coords(p);
            self.calc_tangents([ksi[0], ksi[1]])?;
            let (_, da) = self.normal()?;
            area += da * gauss.weight(p);
        }
        Ok(area)
    }
}

/// Returns u × v
fn cross(u: &Vector, v: &Vector) -> Vector {
    Vector::from(&[
        u[1] * v[2] - u[2] * v[1],
        u[2] * v[0] - u[0] * v[2],
        u[0] * v[1] - u[1] * v[0],
    ])
}

/// Converts a 3D vector into an array
pub(crate) fn to_array(v: &Vector) -> [f64; 3] {
    [v[0], v[1], v[2]]
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::FacetShape;
    use russell_lab::approx_eq;

    #[test]
    fn flat_facet_works() {
        // 2 × 1 rectangle in the plane z = 3 (counterclockwise seen from +z)
        let xf = [[0.0, 0.0, 3.0], [2.0, 0.0, 3.0], [2.0, 1.0, 3.0], [0.0, 1.0, 3.0]];
        let mut shape = FacetShape::new().unwrap();
        shape.set_coordinates(&xf);
        let nn = shape.calc_interp([0.0, 0.0]);
        for b in 0..4 {
            approx_eq(nn[b], 0.25, 1e-15);
        }
        let y = shape.calc_position([1.0, 1.0]).unwrap();
        assert_eq!(y.as_data(), &[2.0, 1.0, 3.0]);
        shape.calc_tangents([0.3, -0.2]).unwrap();
        assert_eq!(shape.tangent(0).as_data(), &[1.0, 0.0, 0.0]);
        assert_eq!(shape.tangent(1).as_data(), &[0.0, 0.5, 0.0]);
        let (nu, da) = shape.normal().unwrap();
        assert_eq!(nu.as_data(), &[0.0, 0.0, 1.0]);
        approx_eq(da, 0.5, 1e-15);
        approx_eq(shape.calc_area().unwrap(), 2.0, 1e-14);
        let y_rs = shape.twist().unwrap();
        assert_eq!(y_rs.as_data(), &[0.0, 0.0, 0.0]);
    }

    #[test]
    fn warped_facet_has_twist() {
        let xf = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.4], [0.0, 1.0, 0.0]];
        let mut shape = FacetShape::new().unwrap();
        shape.set_coordinates(&xf);
        let y_rs = shape.twist().unwrap();
        approx_eq(y_rs[2], 0.1, 1e-15);
        // derivative of the tangent τ₁ with respect to s
        let h = 1e-6;
        shape.calc_tangents([0.2, 0.1 + h]).unwrap();
        let tp = shape.tangent(0);
        shape.calc_tangents([0.2, 0.1 - h]).unwrap();
        let tm = shape.tangent(0);
        for i in 0..3 {
            approx_eq((tp[i] - tm[i]) / (2.0 * h), y_rs[i], 1e-9);
        }
    }
}
