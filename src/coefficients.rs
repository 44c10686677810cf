//! Material parameters turned into update coefficients.
//!
//! The planar and volumetric kernels use two different formulations:
//!
//! * [`CoupledMomentum`]: damped two-phase momentum balance. Solid and fluid
//!   accelerations are coupled through a 2x2 system whose inverse gives the
//!   six coefficients `A..F`.
//! * [`SaturatedElastic`]: undamped single-phase medium with Biot-derived
//!   bulk density and Lamé parameters taken straight from the wave speeds.
//!
//! The two are kept separate on purpose and must not be merged.

/// Inverse of the coupled solid/fluid momentum system.
///
/// With `rho_m = T * rho_f / phi` and fluid mobility `b = mu_f / k`:
///
/// ```text
/// | rho_b  rho_f | | dv/dt |   | div(tau)   |
/// | rho_f  rho_m | | dq/dt | = | -grad(p) - b q |
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoupledMomentum {
    /// Effective fluid density (mass coupling), kg/m^3.
    pub rho_m: f64,
    /// Resistive damping `mu_f / k`, kg/(m^3 s).
    pub mobility: f64,
    /// Determinant `rho_b * rho_m - rho_f^2`.
    pub rho_bar: f64,
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl CoupledMomentum {
    pub fn derive(rho_b: f64, rho_f: f64, phi: f64, tortuosity: f64, mu_f: f64, k: f64) -> Self {
        let rho_m = tortuosity * (rho_f / phi);
        let mobility = mu_f / k;
        let rho_bar = rho_b * rho_m - rho_f * rho_f;
        CoupledMomentum {
            rho_m,
            mobility,
            rho_bar,
            a: rho_m / rho_bar,
            b: (rho_f * mobility) / rho_bar,
            c: rho_f / rho_bar,
            d: -1.0 * rho_f / rho_bar,
            e: -1.0 * rho_b * mobility / rho_bar,
            f: -1.0 * rho_b / rho_bar,
        }
    }
}

/// Saturated-rock parameters for the volumetric kernel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SaturatedElastic {
    /// Biot coefficient `1 - K_dr / K_s`.
    pub alpha: f64,
    /// `phi / K_f + (alpha - phi) / K_s`, i.e. the reciprocal of the
    /// Gassmann Biot modulus. Not used by the volumetric stencils.
    pub biot_modulus: f64,
    pub rho_b: f64,
    /// Shear modulus of the saturated rock.
    pub mu: f64,
    /// First Lamé parameter of the saturated rock.
    pub lambda: f64,
}

impl SaturatedElastic {
    #[allow(clippy::too_many_arguments)]
    pub fn derive(
        vp: f64,
        vs: f64,
        rho_s: f64,
        rho_f: f64,
        phi: f64,
        k_dr: f64,
        k_s: f64,
        k_f: f64,
    ) -> Self {
        let alpha = 1.0 - k_dr / k_s;
        let biot_modulus = phi / k_f + (alpha - phi) / k_s;
        let rho_b = phi * rho_f + (1.0 - phi) * rho_s;
        let mu = vs.powi(2) * rho_b;
        let lambda = rho_b * (vp.powi(2) - 2.0 * vs.powi(2));
        SaturatedElastic {
            alpha,
            biot_modulus,
            rho_b,
            mu,
            lambda,
        }
    }

    pub fn p_velocity(&self) -> f64 {
        ((self.lambda + 2.0 * self.mu) / self.rho_b).sqrt()
    }

    pub fn s_velocity(&self) -> f64 {
        (self.mu / self.rho_b).sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() <= 1e-9 * a.abs().max(b.abs()).max(1.0)
    }

    #[test]
    fn coupled_coefficients_invert_the_momentum_system() {
        let cases = [
            (2200.0, 1000.0, 0.2, 2.0, 1.0e-3, 1.0e-12),
            (2650.0, 1040.0, 0.05, 1.5, 8.9e-4, 5.0e-14),
            (1900.0, 900.0, 0.45, 3.0, 1.2e-3, 2.0e-11),
            (10.0, 3.0, 0.9, 1.0, 1.0, 1.0),
        ];
        for (rho_b, rho_f, phi, t, mu_f, k) in cases {
            let c = CoupledMomentum::derive(rho_b, rho_f, phi, t, mu_f, k);
            let mob = mu_f / k;
            assert!(close(c.rho_m, t * rho_f / phi));
            assert!(close(c.mobility, mob));
            assert!(close(c.a * c.rho_bar, c.rho_m));
            assert!(close(c.b * c.rho_bar, rho_f * mob));
            assert!(close(c.c * c.rho_bar, rho_f));
            assert!(close(c.d * c.rho_bar, -rho_f));
            assert!(close(c.e * c.rho_bar, -rho_b * mob));
            assert!(close(c.f * c.rho_bar, -rho_b));
            assert!(close(c.d, -c.c));
        }
    }

    #[test]
    fn coupled_coefficients_solve_the_mass_matrix() {
        // inverse of [rho_b rho_f; rho_f rho_m] is [A -C; D -F]
        let (rho_b, rho_f) = (2300.0, 1000.0);
        let c = CoupledMomentum::derive(rho_b, rho_f, 0.25, 2.0, 1.0e-3, 1.0e-12);
        assert!(close(c.a * rho_b - c.c * rho_f, 1.0));
        assert!(close(c.a * rho_f - c.c * c.rho_m, 0.0));
        assert!(close(c.d * rho_b - c.f * rho_f, 0.0));
        assert!(close(c.d * rho_f - c.f * c.rho_m, 1.0));
    }

    #[test]
    fn saturated_parameters_reproduce_wave_speeds() {
        let cases = [
            (3000.0, 1500.0, 2650.0, 1000.0, 0.2),
            (4500.0, 2500.0, 2700.0, 1030.0, 0.05),
            (1800.0, 600.0, 2000.0, 1000.0, 0.4),
        ];
        for (vp, vs, rho_s, rho_f, phi) in cases {
            let s = SaturatedElastic::derive(vp, vs, rho_s, rho_f, phi, 1.0e10, 3.6e10, 2.2e9);
            assert!(close(s.rho_b, phi * rho_f + (1.0 - phi) * rho_s));
            assert!(close(((s.lambda + 2.0 * s.mu) / s.rho_b).sqrt(), vp));
            assert!(close((s.mu / s.rho_b).sqrt(), vs));
            assert!(close(s.p_velocity(), vp));
            assert!(close(s.s_velocity(), vs));
            assert!(s.lambda > 0.0);
        }
    }

    #[test]
    fn saturated_biot_terms_follow_the_volumetric_formulation() {
        let s = SaturatedElastic::derive(3000.0, 1500.0, 2650.0, 1000.0, 0.2, 1.0e10, 4.0e10, 2.0e9);
        assert!(close(s.alpha, 0.75));
        assert!(close(s.biot_modulus, 0.2 / 2.0e9 + 0.55 / 4.0e10));
    }
}
