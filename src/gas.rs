use crate::error::{ConfigError, NumericsError};

/// Universal gas constant, J/(kmol K).
pub const R_UNIV: f64 = 8314.4621;

/// Per-species constants for the calorically-perfect closure.
#[derive(Debug, Clone)]
pub struct SpeciesProps {
    pub name: String,
    /// Molecular weight, kg/kmol.
    pub mol_weight: f64,
    /// Heat capacity at constant pressure, J/(kg K).
    pub cp: f64,
    /// Reference enthalpy at `temp_ref`, J/kg.
    pub enth_ref: f64,
}

impl SpeciesProps {
    pub fn new(name: impl Into<String>, mol_weight: f64, cp: f64, enth_ref: f64) -> Self {
        Self {
            name: name.into(),
            mol_weight,
            cp,
            enth_ref,
        }
    }
}

/// Thermodynamic closure of the gas mixture.
///
/// Primitive state per cell is `[pressure, velocity, temperature, Y_1..]`
/// with the last species mass fraction derived from sum-to-one;
/// conservative state is `[rho, rho u, rho H - p, rho Y_1..]`. The two
/// conversions must be mutually inverse for a fixed model.
pub trait GasModel: std::fmt::Debug {
    fn num_species_full(&self) -> usize;

    /// Transported species count; the last species is derived.
    fn num_species(&self) -> usize {
        self.num_species_full() - 1
    }

    fn num_eqs(&self) -> usize {
        self.num_species() + 3
    }

    /// Mixture gas constant from the transported mass fractions.
    fn mix_gas_constant(&self, mass_fracs: &[f64]) -> f64;

    fn mix_cp(&self, mass_fracs: &[f64]) -> f64;

    fn mix_gamma(&self, r_mix: f64, cp_mix: f64) -> f64 {
        cp_mix / (cp_mix - r_mix)
    }

    fn density(&self, press: f64, temp: f64, mass_fracs: &[f64]) -> f64;

    /// Stagnation enthalpy `h + u^2 / 2` from a primitive cell state.
    fn stag_enthalpy(&self, prim: &[f64]) -> f64;

    fn sound_speed(&self, temp: f64, mass_fracs: &[f64]) -> f64;

    fn cons_from_prim(&self, prim: &[f64], cons: &mut [f64]);

    /// Invert a conservative cell state. Fails when the state has left
    /// the physical regime (non-positive density or temperature).
    fn prim_from_cons(&self, cell: usize, cons: &[f64], prim: &mut [f64])
        -> Result<(), NumericsError>;
}

/// Ideal-gas mixture with constant per-species heat capacities.
#[derive(Debug, Clone)]
pub struct CaloricallyPerfectGas {
    mol_weights: Vec<f64>,
    cp: Vec<f64>,
    enth_ref: Vec<f64>,
    r_gas: Vec<f64>,
    temp_ref: f64,
}

impl CaloricallyPerfectGas {
    pub fn new(species: Vec<SpeciesProps>, temp_ref: f64) -> Result<Self, ConfigError> {
        if species.is_empty() {
            return Err(ConfigError::NoSpecies);
        }
        for s in &species {
            if !(s.mol_weight > 0.0) {
                return Err(ConfigError::NonPositiveSpeciesProp {
                    name: "mol_weight",
                    value: s.mol_weight,
                });
            }
            if !(s.cp > 0.0) {
                return Err(ConfigError::NonPositiveSpeciesProp {
                    name: "cp",
                    value: s.cp,
                });
            }
        }
        let r_gas = species.iter().map(|s| R_UNIV / s.mol_weight).collect();
        Ok(Self {
            mol_weights: species.iter().map(|s| s.mol_weight).collect(),
            cp: species.iter().map(|s| s.cp).collect(),
            enth_ref: species.iter().map(|s| s.enth_ref).collect(),
            r_gas,
            temp_ref,
        })
    }

    /// Single inert species, a common smoke-test configuration.
    pub fn single(mol_weight: f64, cp: f64) -> Result<Self, ConfigError> {
        Self::new(vec![SpeciesProps::new("gas", mol_weight, cp, 0.0)], 0.0)
    }

    // Mixture property over the full species set, with the last mass
    // fraction implied by sum-to-one.
    fn mix_prop(&self, prop: &[f64], mass_fracs: &[f64]) -> f64 {
        debug_assert_eq!(mass_fracs.len(), prop.len() - 1);
        let mut acc = 0.0;
        let mut y_sum = 0.0;
        for (y, p) in mass_fracs.iter().zip(prop) {
            acc += y * p;
            y_sum += y;
        }
        acc + (1.0 - y_sum) * prop[prop.len() - 1]
    }
}

impl GasModel for CaloricallyPerfectGas {
    fn num_species_full(&self) -> usize {
        self.mol_weights.len()
    }

    fn mix_gas_constant(&self, mass_fracs: &[f64]) -> f64 {
        self.mix_prop(&self.r_gas, mass_fracs)
    }

    fn mix_cp(&self, mass_fracs: &[f64]) -> f64 {
        self.mix_prop(&self.cp, mass_fracs)
    }

    fn density(&self, press: f64, temp: f64, mass_fracs: &[f64]) -> f64 {
        press / (self.mix_gas_constant(mass_fracs) * temp)
    }

    fn stag_enthalpy(&self, prim: &[f64]) -> f64 {
        let (vel, temp) = (prim[1], prim[2]);
        let mass_fracs = &prim[3..];
        let cp_mix = self.mix_cp(mass_fracs);
        let enth_ref_mix = self.mix_prop(&self.enth_ref, mass_fracs);
        cp_mix * (temp - self.temp_ref) + enth_ref_mix + 0.5 * vel * vel
    }

    fn sound_speed(&self, temp: f64, mass_fracs: &[f64]) -> f64 {
        let r_mix = self.mix_gas_constant(mass_fracs);
        let gamma = self.mix_gamma(r_mix, self.mix_cp(mass_fracs));
        (gamma * r_mix * temp).sqrt()
    }

    fn cons_from_prim(&self, prim: &[f64], cons: &mut [f64]) {
        let (press, vel) = (prim[0], prim[1]);
        let temp = prim[2];
        let mass_fracs = &prim[3..];
        let rho = self.density(press, temp, mass_fracs);
        cons[0] = rho;
        cons[1] = rho * vel;
        cons[2] = rho * self.stag_enthalpy(prim) - press;
        for (k, y) in mass_fracs.iter().enumerate() {
            cons[3 + k] = rho * y;
        }
    }

    fn prim_from_cons(
        &self,
        cell: usize,
        cons: &[f64],
        prim: &mut [f64],
    ) -> Result<(), NumericsError> {
        let rho = cons[0];
        if !(rho > 0.0) || !rho.is_finite() {
            return Err(NumericsError::NonPhysicalState {
                cell,
                what: "density",
                value: rho,
            });
        }
        let vel = cons[1] / rho;
        for k in 0..self.num_species() {
            prim[3 + k] = cons[3 + k] / rho;
        }
        let mass_fracs = &prim[3..];
        let r_mix = self.mix_gas_constant(mass_fracs);
        let cp_mix = self.mix_cp(mass_fracs);
        let enth_ref_mix = self.mix_prop(&self.enth_ref, mass_fracs);

        // rho H - p = rho (cp (T - T_ref) + h_ref + u^2/2) - rho R T
        let temp = (cons[2] / rho - enth_ref_mix + cp_mix * self.temp_ref - 0.5 * vel * vel)
            / (cp_mix - r_mix);
        if !(temp > 0.0) || !temp.is_finite() {
            return Err(NumericsError::NonPhysicalState {
                cell,
                what: "temperature",
                value: temp,
            });
        }
        prim[0] = rho * r_mix * temp;
        prim[1] = vel;
        prim[2] = temp;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn two_species() -> CaloricallyPerfectGas {
        CaloricallyPerfectGas::new(
            vec![
                SpeciesProps::new("fuel", 16.04, 2220.0, -4.675e6),
                SpeciesProps::new("oxidizer", 28.97, 1005.0, 0.0),
            ],
            298.15,
        )
        .unwrap()
    }

    #[test]
    fn mixture_properties_interpolate() {
        let gas = two_species();
        let r_fuel = R_UNIV / 16.04;
        let r_ox = R_UNIV / 28.97;
        assert_relative_eq!(gas.mix_gas_constant(&[1.0]), r_fuel, max_relative = 1e-12);
        assert_relative_eq!(gas.mix_gas_constant(&[0.0]), r_ox, max_relative = 1e-12);
        let r_half = gas.mix_gas_constant(&[0.5]);
        assert_relative_eq!(r_half, 0.5 * (r_fuel + r_ox), max_relative = 1e-12);
    }

    #[test]
    fn conversion_round_trips() {
        let gas = two_species();
        let prim = [101_325.0, 35.0, 950.0, 0.23];
        let mut cons = [0.0; 4];
        gas.cons_from_prim(&prim, &mut cons);

        let mut prim_back = [0.0; 4];
        gas.prim_from_cons(0, &cons, &mut prim_back).unwrap();
        for (a, b) in prim.iter().zip(&prim_back) {
            assert_relative_eq!(a, b, max_relative = 1e-10);
        }

        let mut cons_back = [0.0; 4];
        gas.cons_from_prim(&prim_back, &mut cons_back);
        for (a, b) in cons.iter().zip(&cons_back) {
            assert_relative_eq!(a, b, max_relative = 1e-10);
        }
    }

    #[test]
    fn inversion_rejects_negative_density() {
        let gas = two_species();
        let cons = [-0.5, 10.0, 1e5, 0.1];
        let mut prim = [0.0; 4];
        let err = gas.prim_from_cons(3, &cons, &mut prim).unwrap_err();
        assert!(matches!(
            err,
            NumericsError::NonPhysicalState { cell: 3, what: "density", .. }
        ));
    }

    #[test]
    fn sound_speed_is_ideal_gas() {
        let gas = CaloricallyPerfectGas::single(28.97, 1005.0).unwrap();
        let r = R_UNIV / 28.97;
        let gamma = 1005.0 / (1005.0 - r);
        assert_relative_eq!(
            gas.sound_speed(300.0, &[]),
            (gamma * r * 300.0).sqrt(),
            max_relative = 1e-12
        );
    }

    #[test]
    fn rejects_empty_or_invalid_species() {
        assert!(CaloricallyPerfectGas::new(vec![], 0.0).is_err());
        assert!(
            CaloricallyPerfectGas::new(vec![SpeciesProps::new("bad", -1.0, 1000.0, 0.0)], 0.0)
                .is_err()
        );
    }
}
