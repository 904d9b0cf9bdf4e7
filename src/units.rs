//! This module defines various unit types and their conversions.
//!
//! Quantities in the parameter repository and in results carry a unit type so that, for example,
//! a capital cost per unit of capacity cannot be silently added to an absolute cost. The
//! optimisation program itself works with raw `f64` coefficients.
use float_cmp::{ApproxEq, F64Margin};
use serde::{Deserialize, Serialize};

macro_rules! base_unit_struct {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug,
            Default,
            Clone,
            Copy,
            PartialEq,
            PartialOrd,
            Serialize,
            Deserialize,
            derive_more::Add,
            derive_more::Sub,
            derive_more::AddAssign,
            derive_more::SubAssign,
            derive_more::Display,
        )]
        #[serde(transparent)]
        pub struct $name(pub f64);

        impl $name {
            /// Create a new instance of the unit type from an `f64` value
            pub const fn new(value: f64) -> Self {
                Self(value)
            }

            /// The raw `f64` value
            pub fn value(self) -> f64 {
                self.0
            }

            /// Whether the value is neither infinite nor NaN
            pub fn is_finite(self) -> bool {
                self.0.is_finite()
            }
        }

        impl From<f64> for $name {
            fn from(value: f64) -> Self {
                $name(value)
            }
        }

        impl std::iter::Sum for $name {
            fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
                $name(iter.map(|x| x.0).sum())
            }
        }

        impl ApproxEq for $name {
            type Margin = F64Margin;

            fn approx_eq<T: Into<Self::Margin>>(self, other: Self, margin: T) -> bool {
                self.0.approx_eq(other.0, margin)
            }
        }
    };
}

macro_rules! unit_struct {
    ($(#[$meta:meta])* $name:ident) => {
        base_unit_struct!($(#[$meta])* $name);

        impl std::ops::Mul<Dimensionless> for $name {
            type Output = $name;
            fn mul(self, rhs: Dimensionless) -> $name {
                $name(self.0 * rhs.0)
            }
        }

        impl std::ops::Div<Dimensionless> for $name {
            type Output = $name;
            fn div(self, rhs: Dimensionless) -> $name {
                $name(self.0 / rhs.0)
            }
        }

        impl std::ops::Div<$name> for $name {
            type Output = Dimensionless;
            fn div(self, rhs: $name) -> Dimensionless {
                Dimensionless(self.0 / rhs.0)
            }
        }
    };
}

macro_rules! impl_mul {
    ($Lhs:ty, $Rhs:ty, $Out:ty) => {
        impl std::ops::Mul<$Rhs> for $Lhs {
            type Output = $Out;
            fn mul(self, rhs: $Rhs) -> $Out {
                <$Out>::new(self.0 * rhs.0)
            }
        }
        impl std::ops::Mul<$Lhs> for $Rhs {
            type Output = $Out;
            fn mul(self, lhs: $Lhs) -> $Out {
                <$Out>::new(self.0 * lhs.0)
            }
        }
    };
}

macro_rules! impl_div {
    ($Lhs:ty, $Rhs:ty, $Out:ty) => {
        impl std::ops::Div<$Rhs> for $Lhs {
            type Output = $Out;
            fn div(self, rhs: $Rhs) -> $Out {
                <$Out>::new(self.0 / rhs.0)
            }
        }
    };
}

base_unit_struct!(
    /// A dimensionless quantity (fractions, rates, factors)
    Dimensionless
);

impl Dimensionless {
    /// Raise to an integer power
    pub fn powi(self, rhs: i32) -> Self {
        Dimensionless(self.0.powi(rhs))
    }
}

impl std::ops::Mul for Dimensionless {
    type Output = Dimensionless;

    fn mul(self, rhs: Dimensionless) -> Self::Output {
        Dimensionless(self.0 * rhs.0)
    }
}

impl std::ops::Div for Dimensionless {
    type Output = Dimensionless;

    fn div(self, rhs: Dimensionless) -> Self::Output {
        Dimensionless(self.0 / rhs.0)
    }
}

unit_struct!(
    /// Installed capacity of a technology (MW, MWh, t/day, m³/day depending on technology)
    Capacity
);
unit_struct!(
    /// An amount of money ($)
    Money
);
unit_struct!(
    /// Cost per unit of installed capacity
    MoneyPerCapacity
);
unit_struct!(
    /// Emissions of CO2 (t)
    Emissions
);
unit_struct!(
    /// Cost per tonne of CO2
    MoneyPerEmissions
);

impl_mul!(MoneyPerCapacity, Capacity, Money);
impl_mul!(MoneyPerEmissions, Emissions, Money);
impl_div!(Money, Emissions, MoneyPerEmissions);
impl_div!(Money, Capacity, MoneyPerCapacity);

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;

    #[test]
    fn test_unit_arithmetic() {
        let cost = MoneyPerCapacity(900.0) * Capacity(2.0);
        assert_eq!(cost, Money(1800.0));
        assert_eq!(cost / Capacity(2.0), MoneyPerCapacity(900.0));
        assert_eq!(
            MoneyPerEmissions(60.0) * Emissions(10.0) / Emissions(10.0),
            MoneyPerEmissions(60.0)
        );
        assert_approx_eq!(
            Dimensionless,
            Capacity(1.0) / Capacity(4.0),
            Dimensionless(0.25)
        );
    }

    #[test]
    fn test_sum() {
        let total: Money = [Money(1.0), Money(2.5)].into_iter().sum();
        assert_eq!(total, Money(3.5));
    }
}
