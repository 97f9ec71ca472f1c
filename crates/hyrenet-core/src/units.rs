//! Unit newtypes for the static ratings carried by network components.
//!
//! Ratings read from configuration tables are plain numbers; wrapping them
//! at assembly time keeps a transformer's `s_nom` (MVA) from being summed
//! with a generator's `p_nom` (MW), and a bus `v_nom` from being compared
//! with a per-unit setpoint. Per-unit factors (`p_max_pu`, efficiencies)
//! stay `f64`.
//!
//! ```
//! use hyrenet_core::units::{Kilovolts, Megawatts};
//!
//! let storage = Megawatts(25.0);
//! assert_eq!(storage.over_hours(4.0).value(), 100.0);
//! assert!(Kilovolts(110.0).within(Kilovolts(110.0005), 1e-3));
//! ```

use serde::{Deserialize, Serialize};
use std::ops::{Add, Mul, Sub};

macro_rules! impl_unit_ops {
    ($type:ty, $unit_name:literal) => {
        impl Add for $type {
            type Output = Self;
            fn add(self, rhs: Self) -> Self::Output {
                Self(self.0 + rhs.0)
            }
        }

        impl Sub for $type {
            type Output = Self;
            fn sub(self, rhs: Self) -> Self::Output {
                Self(self.0 - rhs.0)
            }
        }

        impl Mul<f64> for $type {
            type Output = Self;
            fn mul(self, rhs: f64) -> Self::Output {
                Self(self.0 * rhs)
            }
        }

        impl std::fmt::Display for $type {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{:.4} {}", self.0, $unit_name)
            }
        }

        impl $type {
            #[inline]
            pub const fn new(value: f64) -> Self {
                Self(value)
            }

            #[inline]
            pub const fn value(self) -> f64 {
                self.0
            }

            /// True when both values agree within an absolute tolerance
            #[inline]
            pub fn within(self, other: Self, tolerance: f64) -> bool {
                (self.0 - other.0).abs() <= tolerance
            }
        }

        impl std::iter::Sum for $type {
            fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
                Self(iter.map(|x| x.0).sum())
            }
        }

        impl<'a> std::iter::Sum<&'a $type> for $type {
            fn sum<I: Iterator<Item = &'a Self>>(iter: I) -> Self {
                Self(iter.map(|x| x.0).sum())
            }
        }
    };
}

/// Active power rating in megawatts (MW)
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct Megawatts(pub f64);

impl_unit_ops!(Megawatts, "MW");

/// Apparent power rating in megavolt-amperes (MVA)
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct MegavoltAmperes(pub f64);

impl_unit_ops!(MegavoltAmperes, "MVA");

/// Stored energy in megawatt-hours (MWh)
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct MegawattHours(pub f64);

impl_unit_ops!(MegawattHours, "MWh");

/// Nominal voltage in kilovolts (kV)
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct Kilovolts(pub f64);

impl_unit_ops!(Kilovolts, "kV");

/// Series resistance or reactance in ohms
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct Ohms(pub f64);

impl_unit_ops!(Ohms, "Ω");

impl Megawatts {
    /// Energy delivered when running at this rating for `hours`
    #[inline]
    pub fn over_hours(self, hours: f64) -> MegawattHours {
        MegawattHours(self.0 * hours)
    }
}

impl Ohms {
    /// Scale a per-length impedance by a line length
    #[inline]
    pub fn per_length(value_per_km: f64, length_km: f64) -> Self {
        Ohms(value_per_km * length_km)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_megawatts_arithmetic() {
        let p1 = Megawatts(100.0);
        let p2 = Megawatts(50.0);

        assert_eq!((p1 + p2).value(), 150.0);
        assert_eq!((p1 - p2).value(), 50.0);
        assert_eq!((p1 * 0.5).value(), 50.0);
    }

    #[test]
    fn test_energy_capacity() {
        assert_eq!(Megawatts(10.0).over_hours(6.0), MegawattHours(60.0));
    }

    #[test]
    fn test_within_tolerance() {
        assert!(Kilovolts(20.0).within(Kilovolts(20.0009), 1e-3));
        assert!(!Kilovolts(20.0).within(Kilovolts(20.01), 1e-3));
    }

    #[test]
    fn test_per_length_scaling() {
        let r = Ohms::per_length(0.02, 15.0);
        assert!((r.value() - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_sum_iterator() {
        let ratings = vec![MegavoltAmperes(10.0), MegavoltAmperes(20.0)];
        let total: MegavoltAmperes = ratings.iter().sum();
        assert_eq!(total.value(), 30.0);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Megawatts(100.0)), "100.0000 MW");
        assert_eq!(format!("{}", Kilovolts(0.4)), "0.4000 kV");
    }
}
