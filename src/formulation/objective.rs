//! The objective of the program and the cost components it is made of.
//!
//! Cost terms are computed once here and used both to set the objective and, after solving, to
//! break the total cost down by component.
use super::constraints::{capacity, operation};
use super::keys::{
    ConstraintKey, ConstraintKind, OperationKey, OperationKind, Trade, UnmetCommodity, VariableKey,
};
use super::period_keys;
use super::program::{ColumnId, Program};
use crate::error::ModelError;
use crate::finance::annual_capital_cost;
use crate::model::Model;
use crate::scenario::Prices;
use crate::technology::{RecoveredProduct, Technology, TechnologyKind};
use crate::units::MoneyPerEmissions;
use strum::IntoEnumIterator;

/// What the program minimises
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, clap::ValueEnum, strum::Display)]
#[value(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ObjectiveKind {
    /// Expected annualised cost
    #[default]
    MinimizeCost,
    /// Expected annual emissions, plus the unmet-demand penalty
    MinimizeEmissions,
    /// Expected annualised cost, with expected annual emissions capped
    MinimizeCostWithEmissionCap,
}

/// A component of the annualised cost
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, strum::Display, strum::EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum CostComponent {
    /// Annualised capital cost
    Investment,
    /// Fixed operation and maintenance
    FixedOperating,
    /// Variable operation and maintenance
    VariableOperating,
    /// Electricity bought from the grid
    GridPurchase,
    /// Natural gas bought
    NaturalGas,
    /// Electricity sold to the grid (negative)
    GridSales,
    /// Ammonia, reclaimed water and recovered fertiliser sold (negative)
    ProductRevenue,
    /// Carbon tax on emissions
    Carbon,
    /// Penalty on unmet demand
    UnmetDemandPenalty,
}

/// A single objective coefficient attributed to a cost component
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CostTerm {
    /// The component this term contributes to
    pub component: CostComponent,
    /// The column the term applies to
    pub column: ColumnId,
    /// Cost per unit of the column
    pub coefficient: f64,
}

/// The activity variable operating costs are charged on, if any
fn activity(kind: &TechnologyKind) -> Option<OperationKind> {
    match kind {
        TechnologyKind::Renewable { .. } | TechnologyKind::Dispatchable(_) => {
            Some(OperationKind::Generation)
        }
        TechnologyKind::Storage(_) => Some(OperationKind::Discharge),
        TechnologyKind::Electrolysis { .. } => Some(OperationKind::Consumption),
        TechnologyKind::AmmoniaSynthesis { .. } | TechnologyKind::Recovery { .. } => {
            Some(OperationKind::Production)
        }
        // Digester output is fixed by the sludge available, built or not
        TechnologyKind::AnaerobicDigestion | TechnologyKind::Capture { .. } => None,
    }
}

/// The price a technology's production is sold at, if any
fn product_price(kind: &TechnologyKind, prices: &Prices) -> Option<f64> {
    match kind {
        TechnologyKind::AmmoniaSynthesis { .. } => Some(prices.ammonia),
        TechnologyKind::Recovery { product } => Some(match product {
            RecoveredProduct::Water => prices.reclaimed_water,
            RecoveredProduct::Nitrogen => prices.fertilizer_n,
            RecoveredProduct::Phosphorus => prices.fertilizer_p,
        }),
        _ => None,
    }
}

fn add_investment_terms(terms: &mut Vec<CostTerm>, program: &Program, model: &Model) {
    for tech in model.technologies.values() {
        let Technology { economics, .. } = tech;
        let annual_capex = annual_capital_cost(
            economics.capex,
            economics.lifespan,
            model.parameters.discount_rate,
        );
        let column = capacity(program, tech);
        terms.push(CostTerm {
            component: CostComponent::Investment,
            column,
            coefficient: annual_capex.value(),
        });

        // Fixed O&M is charged once per scenario, weighted by its probability
        for scenario in model.scenarios.values() {
            let weight =
                scenario.probability.value() * model.time_index.annualisation_factor().value();
            terms.push(CostTerm {
                component: CostComponent::FixedOperating,
                column,
                coefficient: weight
                    * economics.fixed_opex_rate.value()
                    * economics.capex.value(),
            });
        }
    }
}

/// Collect the cost terms of the expected annualised cost.
///
/// Operating terms for a scenario are weighted by `probability · 365 / number of representative
/// days`.
pub fn cost_terms(model: &Model, program: &Program, carbon_tax: MoneyPerEmissions) -> Vec<CostTerm> {
    let mut terms = Vec::new();
    add_investment_terms(&mut terms, program, model);

    let annualisation = model.time_index.annualisation_factor().value();
    let penalty = model.parameters.unmet_demand_penalty;
    for slot in period_keys(model) {
        let scenario = &model.scenarios[&slot.scenario];
        let weight = scenario.probability.value() * annualisation;
        let prices = &scenario.period(&slot.period).prices;
        let mut push = |component, column, coefficient: f64| {
            terms.push(CostTerm {
                component,
                column,
                coefficient: weight * coefficient,
            });
        };

        for tech in model.technologies.values() {
            let key = OperationKey::new(&tech.id, &slot.period, &slot.scenario);
            if let Some(kind) = activity(&tech.kind)
                && tech.economics.variable_opex != 0.0
            {
                push(
                    CostComponent::VariableOperating,
                    operation(program, kind, &key),
                    tech.economics.variable_opex,
                );
            }
            if let Some(price) = product_price(&tech.kind, prices) {
                push(
                    CostComponent::ProductRevenue,
                    operation(program, OperationKind::Production, &key),
                    -price,
                );
            }
        }

        let trade = |trade| program.col(&VariableKey::Trade(trade, slot.clone()));
        push(
            CostComponent::GridPurchase,
            trade(Trade::GridPurchase),
            prices.electricity_buy,
        );
        push(
            CostComponent::GridSales,
            trade(Trade::GridSale),
            -prices.electricity_sell,
        );
        push(
            CostComponent::NaturalGas,
            trade(Trade::NaturalGasPurchase),
            prices.natural_gas,
        );
        push(
            CostComponent::Carbon,
            program.col(&VariableKey::Emissions(slot.clone())),
            carbon_tax.value(),
        );
        for commodity in UnmetCommodity::iter() {
            push(
                CostComponent::UnmetDemandPenalty,
                program.col(&VariableKey::UnmetDemand(commodity, slot.clone())),
                penalty,
            );
        }
    }

    terms
}

/// Expected annual emissions and unmet-demand penalty
fn emission_terms(model: &Model, program: &Program) -> Vec<(ColumnId, f64)> {
    let annualisation = model.time_index.annualisation_factor().value();
    let penalty = model.parameters.unmet_demand_penalty;
    let mut terms = Vec::new();
    for slot in period_keys(model) {
        let weight = model.scenarios[&slot.scenario].probability.value() * annualisation;
        terms.push((program.col(&VariableKey::Emissions(slot.clone())), weight));
        for commodity in UnmetCommodity::iter() {
            let column = program.col(&VariableKey::UnmetDemand(commodity, slot.clone()));
            terms.push((column, weight * penalty));
        }
    }

    terms
}

/// Set the objective of the program.
///
/// For [`ObjectiveKind::MinimizeCostWithEmissionCap`] this also adds the emission cap row, so the
/// model must define `emission_cap`.
pub fn set_objective(
    program: &mut Program,
    model: &Model,
    objective: ObjectiveKind,
    carbon_tax: MoneyPerEmissions,
) -> Result<(), ModelError> {
    match objective {
        ObjectiveKind::MinimizeCost => add_cost_objective(program, model, carbon_tax),
        ObjectiveKind::MinimizeEmissions => {
            for (column, cost) in emission_terms(model, program) {
                program.add_cost(column, cost);
            }
        }
        ObjectiveKind::MinimizeCostWithEmissionCap => {
            let cap = model.parameters.emission_cap.ok_or_else(|| {
                ModelError::Configuration(
                    "The emission-capped objective requires `emission_cap` in model.toml".into(),
                )
            })?;
            add_cost_objective(program, model, carbon_tax);
            add_emission_cap(program, model, cap.value());
        }
    }

    Ok(())
}

fn add_cost_objective(program: &mut Program, model: &Model, carbon_tax: MoneyPerEmissions) {
    for term in cost_terms(model, program, carbon_tax) {
        program.add_cost(term.column, term.coefficient);
    }
}

/// Expected annual emissions must not exceed the cap
fn add_emission_cap(program: &mut Program, model: &Model, cap: f64) {
    let annualisation = model.time_index.annualisation_factor().value();
    let terms: Vec<_> = period_keys(model)
        .map(|slot| {
            let weight = model.scenarios[&slot.scenario].probability.value() * annualisation;
            (program.col(&VariableKey::Emissions(slot)), weight)
        })
        .collect();
    program.add_le(ConstraintKey::global(ConstraintKind::EmissionCap), terms, cap);
}

/// Sum the cost terms by component for the given column values
pub fn cost_breakdown(terms: &[CostTerm], values: &[f64]) -> Vec<(CostComponent, f64)> {
    CostComponent::iter()
        .map(|component| {
            let total = terms
                .iter()
                .filter(|term| term.component == component)
                .map(|term| term.coefficient * values[term.column.0])
                .sum();
            (component, total)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{assert_error, model};
    use crate::formulation::variables::add_variables;
    use crate::technology::TechnologyID;
    use crate::units::Emissions;
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    fn program(model: &Model) -> Program {
        let mut program = Program::default();
        add_variables(&mut program, model);
        program
    }

    #[rstest]
    fn test_cost_terms(model: Model) {
        let program = program(&model);
        let terms = cost_terms(&model, &program, MoneyPerEmissions(60.0));

        // One period and a probability-one scenario: weight is 365
        let purchase = terms
            .iter()
            .find(|term| term.component == CostComponent::GridPurchase)
            .unwrap();
        assert_approx_eq!(f64, purchase.coefficient, 365.0 * 100.0);
        let sale = terms
            .iter()
            .find(|term| term.component == CostComponent::GridSales)
            .unwrap();
        assert_approx_eq!(f64, sale.coefficient, -365.0 * 50.0);
        let carbon = terms
            .iter()
            .find(|term| term.component == CostComponent::Carbon)
            .unwrap();
        assert_approx_eq!(f64, carbon.coefficient, 365.0 * 60.0);

        let investment: Vec<_> = terms
            .iter()
            .filter(|term| term.component == CostComponent::Investment)
            .collect();
        assert_eq!(investment.len(), 2);
        let pv = program.col(&VariableKey::Capacity("pv".into()));
        assert_eq!(investment[0].column, pv);
        assert_approx_eq!(f64, investment[0].coefficient, 84.3109011, epsilon = 1e-6);
    }

    #[rstest]
    fn test_variable_opex_skips_fixed_output(mut model: Model) {
        model.technologies["pv"].economics.variable_opex = 3.0;
        let mut digester = model.technologies["pv"].clone();
        digester.id = "digester".into();
        digester.kind = TechnologyKind::AnaerobicDigestion;
        digester.economics.variable_opex = 2.0;
        model.technologies.insert(digester.id.clone(), digester);
        let program = program(&model);

        let terms = cost_terms(&model, &program, MoneyPerEmissions(0.0));
        let opex: Vec<_> = terms
            .iter()
            .filter(|term| term.component == CostComponent::VariableOperating)
            .collect();
        assert_eq!(opex.len(), 1);
        let (key, _) = program.column(opex[0].column);
        let VariableKey::Operation(OperationKind::Generation, op_key) = key else {
            panic!("Expected PV generation, got {key}");
        };
        assert_eq!(op_key.technology, TechnologyID::new("pv"));
        assert_approx_eq!(f64, opex[0].coefficient, 365.0 * 3.0);
    }

    #[rstest]
    fn test_cost_breakdown(model: Model) {
        let program = program(&model);
        let terms = cost_terms(&model, &program, MoneyPerEmissions(0.0));
        let mut values = vec![0.0; program.num_columns()];
        let purchase = terms
            .iter()
            .find(|term| term.component == CostComponent::GridPurchase)
            .unwrap();
        values[purchase.column.0] = 2.0;

        let breakdown = cost_breakdown(&terms, &values);
        assert_eq!(breakdown.len(), CostComponent::iter().count());
        let (_, grid) = breakdown
            .iter()
            .find(|(component, _)| *component == CostComponent::GridPurchase)
            .unwrap();
        assert_approx_eq!(f64, *grid, 2.0 * 365.0 * 100.0);
        let total: f64 = breakdown.iter().map(|(_, cost)| cost).sum();
        assert_approx_eq!(f64, total, *grid);
    }

    #[rstest]
    fn test_emission_cap_requires_parameter(mut model: Model) {
        let mut program = program(&model);
        assert_error!(
            set_objective(
                &mut program,
                &model,
                ObjectiveKind::MinimizeCostWithEmissionCap,
                MoneyPerEmissions(0.0)
            ),
            "Configuration error: The emission-capped objective requires `emission_cap` in \
             model.toml"
        );

        model.parameters.emission_cap = Some(Emissions(100.0));
        let mut program = self::program(&model);
        set_objective(
            &mut program,
            &model,
            ObjectiveKind::MinimizeCostWithEmissionCap,
            MoneyPerEmissions(0.0),
        )
        .unwrap();
        let row = program.rows().last().unwrap();
        assert_eq!(row.key.kind, ConstraintKind::EmissionCap);
        assert_eq!(row.upper, 100.0);
    }

    #[rstest]
    fn test_minimize_emissions_objective(model: Model) {
        let mut program = program(&model);
        set_objective(
            &mut program,
            &model,
            ObjectiveKind::MinimizeEmissions,
            MoneyPerEmissions(60.0),
        )
        .unwrap();

        // Only emissions and slack carry a cost
        for (_, key, column) in program.columns() {
            let expected = match key {
                VariableKey::Emissions(_) => 365.0,
                VariableKey::UnmetDemand(..) => 365.0 * 1000.0,
                _ => 0.0,
            };
            assert_approx_eq!(f64, column.cost, expected);
        }
    }

    #[test]
    fn test_objective_kind_display() {
        assert_eq!(
            ObjectiveKind::MinimizeCostWithEmissionCap.to_string(),
            "minimize_cost_with_emission_cap"
        );
    }
}
