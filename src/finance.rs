//! General functions related to finance.
use crate::units::{Dimensionless, MoneyPerCapacity};

/// The capital recovery factor (CRF): the fraction of an up-front cost paid each year to repay it
/// over `lifetime` years at `discount_rate`.
///
/// `CRF = r(1+r)^n / ((1+r)^n - 1)`, which tends to `1/n` as `r` goes to zero. A zero lifetime
/// gives zero.
pub fn capital_recovery_factor(lifetime: u32, discount_rate: Dimensionless) -> Dimensionless {
    match lifetime {
        0 => Dimensionless(0.0),
        years if discount_rate == Dimensionless(0.0) => Dimensionless(1.0 / years as f64),
        years => {
            let growth = (Dimensionless(1.0) + discount_rate).powi(years as i32);
            discount_rate * growth / (growth - Dimensionless(1.0))
        }
    }
}

/// Annualised capital cost per unit of capacity
pub fn annual_capital_cost(
    capex: MoneyPerCapacity,
    lifetime: u32,
    discount_rate: Dimensionless,
) -> MoneyPerCapacity {
    capex * capital_recovery_factor(lifetime, discount_rate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    #[rstest]
    #[case(0, 0.08, 0.0)] // Never annualised
    #[case(20, 0.0, 0.05)] // No discounting: straight-line
    #[case(25, 0.08, 0.09367877905196811)] // PV, hydrogen storage
    #[case(15, 0.08, 0.11682954493601999)] // Battery, fuel cell
    #[case(20, 0.08, 0.10185220882315059)] // CHP, electrolyser, recovery
    fn test_capital_recovery_factor(
        #[case] lifetime: u32,
        #[case] discount_rate: f64,
        #[case] expected: f64,
    ) {
        let result = capital_recovery_factor(lifetime, Dimensionless(discount_rate));
        assert_approx_eq!(f64, result.0, expected, epsilon = 1e-10);
    }

    #[rstest]
    #[case(900_000.0, 25, 0.08, 84_310.901_146_771_3)] // PV
    #[case(228_000.0, 15, 0.08, 26_637.136_245_412_556)] // Battery
    #[case(800_000.0, 20, 0.0, 40_000.0)] // Electrolyser, undiscounted
    fn test_annual_capital_cost(
        #[case] capital_cost: f64,
        #[case] lifetime: u32,
        #[case] discount_rate: f64,
        #[case] expected: f64,
    ) {
        let result = annual_capital_cost(
            MoneyPerCapacity(capital_cost),
            lifetime,
            Dimensionless(discount_rate),
        );
        assert_approx_eq!(f64, result.0, expected, epsilon = 1e-4);
    }
}
