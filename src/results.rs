//! Results of a solved run: investment decisions, annual KPIs and the cost breakdown.
//!
//! Per-period values are turned into expected annual figures by weighting each scenario by its
//! probability and scaling representative days up to a year, as the objective does.
use crate::finance::annual_capital_cost;
use crate::formulation::keys::{
    ConstraintKind, OperationKey, OperationKind, PeriodKey, Trade, UnmetCommodity, VariableKey,
};
use crate::formulation::objective::{CostComponent, cost_breakdown, cost_terms};
use crate::formulation::program::Program;
use crate::formulation::{PlanningOptions, period_keys};
use crate::model::Model;
use crate::scenario::ScenarioID;
use crate::solver::adapter::{SolveAttempt, SolveOutcome};
use crate::technology::{
    RecoveredProduct, RenewableResource, StorageCommodity, Technology, TechnologyCategory,
    TechnologyID, TechnologyKind,
};
use crate::time_period::TimePeriod;
use crate::units::{Capacity, Emissions, Money, MoneyPerEmissions};
use log::{debug, warn};
use serde::Serialize;
use strum::IntoEnumIterator;

/// Build decisions are binary; the solver may return them with a small tolerance
const BUILD_THRESHOLD: f64 = 0.5;

/// Electricity-balance residuals above this are reported as a warning
const BALANCE_TOLERANCE: f64 = 1e-6;

/// The investment decision for one technology
#[derive(Clone, Debug, PartialEq)]
pub struct Investment {
    /// The technology
    pub technology: TechnologyID,
    /// Its category
    pub category: TechnologyCategory,
    /// Whether it is built
    pub built: bool,
    /// Installed capacity
    pub capacity: Capacity,
    /// Units of the capacity figure
    pub units: &'static str,
    /// Up-front capital cost
    pub capital_cost: Money,
    /// Capital cost annualised with the capital recovery factor
    pub annual_capital_cost: Money,
}

/// Key performance indicators, as expected annual values
#[derive(Clone, Debug, PartialEq)]
pub struct Kpis {
    /// Installed PV and wind capacity (MW)
    pub renewable_capacity: Capacity,
    /// Renewable share of generation capacity (%), if any generation is built
    pub renewable_share: Option<f64>,
    /// Installed battery capacity (MWh)
    pub battery_capacity: Capacity,
    /// Installed electrolysis capacity (MW)
    pub electrolysis_capacity: Capacity,
    /// Installed hydrogen storage capacity (t)
    pub hydrogen_storage_capacity: Capacity,
    /// Hydrogen produced (t/year)
    pub hydrogen_production: f64,
    /// Ammonia produced (t/year)
    pub ammonia_production: f64,
    /// Water reclaimed (m³/year)
    pub water_reclaimed: f64,
    /// Nitrogen recovered (t/year)
    pub nitrogen_recovered: f64,
    /// Phosphorus recovered (t/year)
    pub phosphorus_recovered: f64,
    /// CO2 emitted (t/year)
    pub emissions: Emissions,
    /// Up-front capital investment
    pub capital_investment: Money,
    /// Annualised capital cost
    pub annual_capital_cost: Money,
    /// Expected annualised cost, whatever the objective
    pub total_cost: Money,
    /// Total cost per tonne of CO2 avoided relative to `reference_emissions`
    pub cost_per_tonne_avoided: Option<MoneyPerEmissions>,
}

/// One period of the sample operating profile
#[derive(Clone, Debug, PartialEq)]
pub struct ProfileRow {
    /// The period
    pub period: TimePeriod,
    /// PV generation (MWh)
    pub pv: f64,
    /// Wind generation (MWh)
    pub wind: f64,
    /// Dispatchable generation (MWh)
    pub dispatchable: f64,
    /// Battery discharge minus charge (MWh)
    pub battery: f64,
    /// Grid purchase (MWh)
    pub grid_purchase: f64,
    /// Grid sale (MWh)
    pub grid_sale: f64,
    /// Emissions (t)
    pub emissions: f64,
}

/// The value of one second-stage variable, for plotting
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OperationRow {
    /// The scenario
    pub scenario: ScenarioID,
    /// The period
    pub time_period: TimePeriod,
    /// The technology, for per-technology decisions
    pub technology: Option<TechnologyID>,
    /// The kind of variable, e.g. `generation` or `grid_purchase`
    pub variable: String,
    /// The solved value
    pub value: f64,
}

/// Everything reported for a solved run
#[derive(Clone, Debug, PartialEq)]
pub struct RunResults {
    /// Carbon policy and objective of the run
    pub options: PlanningOptions,
    /// Version of the input data, if given
    pub data_version: Option<String>,
    /// Value of the objective which was minimised
    pub objective_value: f64,
    /// Investment decisions, in technology order
    pub investments: Vec<Investment>,
    /// Key performance indicators
    pub kpis: Kpis,
    /// Expected annualised cost by component
    pub costs: Vec<(CostComponent, Money)>,
    /// Expected annual unmet demand by commodity
    pub unmet_demand: Vec<(UnmetCommodity, f64)>,
    /// Largest absolute electricity-balance residual over all periods and scenarios
    pub electricity_balance_residual: f64,
    /// All solve attempts
    pub attempts: Vec<SolveAttempt>,
    /// The scenario the operating profile is taken from (the most probable)
    pub profile_scenario: ScenarioID,
    /// Operating profile over the first representative day
    pub profile: Vec<ProfileRow>,
    /// Every second-stage value
    pub operations: Vec<OperationRow>,
}

impl RunResults {
    /// Look up an investment decision
    pub fn investment(&self, technology: &str) -> Option<&Investment> {
        self.investments
            .iter()
            .find(|investment| &*investment.technology.0 == technology)
    }

    /// Expected annualised cost of one component
    pub fn cost(&self, component: CostComponent) -> Money {
        self.costs
            .iter()
            .find(|(c, _)| *c == component)
            .map_or(Money(0.0), |(_, cost)| *cost)
    }
}

/// Units of a technology's capacity
pub fn capacity_units(kind: &TechnologyKind) -> &'static str {
    match kind {
        TechnologyKind::Renewable { .. }
        | TechnologyKind::Dispatchable(_)
        | TechnologyKind::Electrolysis { .. } => "MW",
        TechnologyKind::Storage(params) => match params.commodity {
            StorageCommodity::Electricity => "MWh",
            StorageCommodity::Hydrogen | StorageCommodity::Ammonia => "t",
        },
        TechnologyKind::AnaerobicDigestion
        | TechnologyKind::Recovery {
            product: RecoveredProduct::Water,
        } => "m³/day",
        TechnologyKind::AmmoniaSynthesis { .. }
        | TechnologyKind::Recovery { .. }
        | TechnologyKind::Capture { .. } => "t/day",
    }
}

/// Reads values out of a solution
struct Solution<'a> {
    model: &'a Model,
    program: &'a Program,
    values: &'a [f64],
}

impl Solution<'_> {
    fn value(&self, key: &VariableKey) -> f64 {
        self.values[self.program.col(key).0]
    }

    fn operation(&self, kind: OperationKind, tech: &Technology, slot: &PeriodKey) -> f64 {
        let key = OperationKey::new(&tech.id, &slot.period, &slot.scenario);
        self.value(&VariableKey::operation(kind, &key))
    }

    /// Probability-weighted annual total of a per-slot quantity
    fn expected_annual<F>(&self, per_slot: F) -> f64
    where
        F: Fn(&PeriodKey) -> f64,
    {
        let annualisation = self.model.time_index.annualisation_factor().value();
        period_keys(self.model)
            .map(|slot| {
                let probability = self.model.scenarios[&slot.scenario].probability.value();
                probability * annualisation * per_slot(&slot)
            })
            .sum()
    }

    /// Expected annual production of the technologies matching the predicate
    fn annual_production<P>(&self, predicate: P) -> f64
    where
        P: Fn(&TechnologyKind) -> bool,
    {
        self.model
            .technologies
            .values()
            .filter(|tech| predicate(&tech.kind))
            .map(|tech| {
                self.expected_annual(|slot| self.operation(OperationKind::Production, tech, slot))
            })
            .sum()
    }

    fn capacity(&self, tech: &Technology) -> Capacity {
        Capacity(self.value(&VariableKey::Capacity(tech.id.clone())))
    }

    /// Total installed capacity of the technologies matching the predicate
    fn capacity_where<P>(&self, predicate: P) -> Capacity
    where
        P: Fn(&TechnologyKind) -> bool,
    {
        self.model
            .technologies
            .values()
            .filter(|tech| predicate(&tech.kind))
            .map(|tech| self.capacity(tech))
            .sum()
    }

    fn investments(&self) -> Vec<Investment> {
        self.model
            .technologies
            .values()
            .map(|tech| {
                let capacity = self.capacity(tech);
                let economics = &tech.economics;
                let annual = annual_capital_cost(
                    economics.capex,
                    economics.lifespan,
                    self.model.parameters.discount_rate,
                );
                Investment {
                    technology: tech.id.clone(),
                    category: tech.category(),
                    built: self.value(&VariableKey::Build(tech.id.clone())) > BUILD_THRESHOLD,
                    capacity,
                    units: capacity_units(&tech.kind),
                    capital_cost: economics.capex * capacity,
                    annual_capital_cost: annual * capacity,
                }
            })
            .collect()
    }

    fn kpis(&self, investments: &[Investment], total_cost: Money) -> Kpis {
        let renewable_capacity =
            self.capacity_where(|kind| matches!(kind, TechnologyKind::Renewable { .. }));
        let generation_capacity: Capacity = investments
            .iter()
            .filter(|investment| investment.category == TechnologyCategory::Generation)
            .map(|investment| investment.capacity)
            .sum();
        let renewable_share = (generation_capacity.value() > 0.0)
            .then(|| 100.0 * renewable_capacity.value() / generation_capacity.value());
        let is_storage_of = |commodity| {
            move |kind: &TechnologyKind| {
                matches!(kind, TechnologyKind::Storage(params) if params.commodity == commodity)
            }
        };
        let is_recovery_of = |product| {
            move |kind: &TechnologyKind| {
                matches!(kind, TechnologyKind::Recovery { product: p } if *p == product)
            }
        };

        let emissions =
            Emissions(self.expected_annual(|slot| self.value(&VariableKey::Emissions(slot.clone()))));
        let cost_per_tonne_avoided = self
            .model
            .parameters
            .reference_emissions
            .map(|reference| reference - emissions)
            .filter(|avoided| avoided.value() > 0.0)
            .map(|avoided| total_cost / avoided);

        Kpis {
            renewable_capacity,
            renewable_share,
            battery_capacity: self.capacity_where(is_storage_of(StorageCommodity::Electricity)),
            electrolysis_capacity: self
                .capacity_where(|kind| matches!(kind, TechnologyKind::Electrolysis { .. })),
            hydrogen_storage_capacity: self
                .capacity_where(is_storage_of(StorageCommodity::Hydrogen)),
            hydrogen_production: self
                .annual_production(|kind| matches!(kind, TechnologyKind::Electrolysis { .. })),
            ammonia_production: self
                .annual_production(|kind| matches!(kind, TechnologyKind::AmmoniaSynthesis { .. })),
            water_reclaimed: self.annual_production(is_recovery_of(RecoveredProduct::Water)),
            nitrogen_recovered: self.annual_production(is_recovery_of(RecoveredProduct::Nitrogen)),
            phosphorus_recovered: self
                .annual_production(is_recovery_of(RecoveredProduct::Phosphorus)),
            emissions,
            capital_investment: investments.iter().map(|i| i.capital_cost).sum(),
            annual_capital_cost: investments.iter().map(|i| i.annual_capital_cost).sum(),
            total_cost,
            cost_per_tonne_avoided,
        }
    }

    fn unmet_demand(&self) -> Vec<(UnmetCommodity, f64)> {
        UnmetCommodity::iter()
            .map(|commodity| {
                let annual = self.expected_annual(|slot| {
                    self.value(&VariableKey::UnmetDemand(commodity, slot.clone()))
                });
                (commodity, annual)
            })
            .collect()
    }

    fn electricity_balance_residual(&self) -> f64 {
        self.program
            .rows()
            .iter()
            .filter(|row| row.key.kind == ConstraintKind::ElectricityBalance)
            .map(|row| (Program::row_activity(row, self.values) - row.upper).abs())
            .fold(0.0, f64::max)
    }

    /// The most probable scenario, the first one on ties
    fn profile_scenario(&self) -> ScenarioID {
        self.model
            .scenarios
            .values()
            .reduce(|best, scenario| {
                if scenario.probability > best.probability {
                    scenario
                } else {
                    best
                }
            })
            .map(|scenario| scenario.id.clone())
            .expect("Model has no scenarios")
    }

    /// Total generation of the technologies matching the predicate
    fn generation_where<P>(&self, slot: &PeriodKey, predicate: P) -> f64
    where
        P: Fn(&TechnologyKind) -> bool,
    {
        self.model
            .technologies
            .values()
            .filter(|tech| predicate(&tech.kind))
            .map(|tech| self.operation(OperationKind::Generation, tech, slot))
            .sum()
    }

    fn profile(&self, scenario: &ScenarioID) -> Vec<ProfileRow> {
        let first_day = self
            .model
            .time_index
            .iter()
            .take(self.model.time_index.hours_per_day() as usize);

        first_day
            .map(|period| {
                let slot = PeriodKey {
                    period,
                    scenario: scenario.clone(),
                };
                let is_resource = |resource| {
                    move |kind: &TechnologyKind| {
                        matches!(kind, TechnologyKind::Renewable { resource: r } if *r == resource)
                    }
                };
                let battery = self
                    .model
                    .technologies
                    .values()
                    .filter(|tech| {
                        matches!(&tech.kind, TechnologyKind::Storage(params)
                            if params.commodity == StorageCommodity::Electricity)
                    })
                    .map(|tech| {
                        self.operation(OperationKind::Discharge, tech, &slot)
                            - self.operation(OperationKind::Charge, tech, &slot)
                    })
                    .sum();
                let trade = |trade| self.value(&VariableKey::Trade(trade, slot.clone()));

                ProfileRow {
                    pv: self.generation_where(&slot, is_resource(RenewableResource::Pv)),
                    wind: self.generation_where(&slot, is_resource(RenewableResource::Wind)),
                    dispatchable: self.generation_where(&slot, |kind| {
                        matches!(kind, TechnologyKind::Dispatchable(_))
                    }),
                    battery,
                    grid_purchase: trade(Trade::GridPurchase),
                    grid_sale: trade(Trade::GridSale),
                    emissions: self.value(&VariableKey::Emissions(slot.clone())),
                    period: slot.period,
                }
            })
            .collect()
    }

    fn operations(&self) -> Vec<OperationRow> {
        self.program
            .columns()
            .filter_map(|(id, key, _)| {
                let (technology, slot) = match key {
                    VariableKey::Capacity(_) | VariableKey::Build(_) => return None,
                    VariableKey::Operation(_, key) => (
                        Some(key.technology.clone()),
                        PeriodKey {
                            period: key.period.clone(),
                            scenario: key.scenario.clone(),
                        },
                    ),
                    VariableKey::Trade(_, slot)
                    | VariableKey::Emissions(slot)
                    | VariableKey::UnmetDemand(_, slot) => (None, slot.clone()),
                };
                Some(OperationRow {
                    scenario: slot.scenario,
                    time_period: slot.period,
                    technology,
                    variable: key.kind().to_string(),
                    value: self.values[id.0],
                })
            })
            .collect()
    }
}

/// Extract the results of a solved run.
///
/// # Arguments
///
/// * `model` - The model the program was built from
/// * `program` - The solved program
/// * `options` - Carbon policy and objective of the run
/// * `outcome` - The solution and the attempts it took
pub fn extract_results(
    model: &Model,
    program: &Program,
    options: &PlanningOptions,
    outcome: SolveOutcome,
) -> RunResults {
    let solution = Solution {
        model,
        program,
        values: &outcome.values,
    };

    let terms = cost_terms(model, program, options.carbon_tax);
    let costs: Vec<_> = cost_breakdown(&terms, &outcome.values)
        .into_iter()
        .map(|(component, cost)| (component, Money(cost)))
        .collect();
    let total_cost = costs.iter().map(|(_, cost)| *cost).sum();

    let investments = solution.investments();
    let kpis = solution.kpis(&investments, total_cost);
    let residual = solution.electricity_balance_residual();
    if residual > BALANCE_TOLERANCE {
        warn!("Electricity balance residual of {residual} exceeds tolerance");
    }
    let profile_scenario = solution.profile_scenario();
    let profile = solution.profile(&profile_scenario);
    let unmet_demand = solution.unmet_demand();
    let operations = solution.operations();
    debug!(
        "Extracted results for {}: total cost {total_cost}, emissions {}",
        options.run_name(),
        kpis.emissions
    );

    RunResults {
        options: options.clone(),
        data_version: model.parameters.version.clone(),
        objective_value: outcome.objective,
        investments,
        kpis,
        costs,
        unmet_demand,
        electricity_balance_residual: residual,
        attempts: outcome.attempts,
        profile_scenario,
        profile,
        operations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ModelError;
    use crate::fixture::model;
    use crate::formulation::{ObjectiveKind, build_program};
    use crate::solver::SolverOptions;
    use crate::solver::adapter::solve;
    use crate::solver::highs::HighsSolver;
    use float_cmp::assert_approx_eq;
    use indexmap::IndexMap;
    use rstest::rstest;

    fn run(model: &Model, policy: &str, objective: ObjectiveKind) -> RunResults {
        let options = PlanningOptions::new(model, policy, objective).unwrap();
        let program = build_program(model, &options).unwrap();
        let outcome = solve(&program, &HighsSolver, &SolverOptions::default()).unwrap();
        extract_results(model, &program, &options, outcome)
    }

    #[rstest]
    fn test_extract_results(model: Model) {
        let results = run(&model, "no_tax", ObjectiveKind::MinimizeCost);

        // Selling surplus PV pays for itself, so PV is built to its limit
        let pv = results.investment("pv").unwrap();
        assert!(pv.built);
        assert_approx_eq!(f64, pv.capacity.value(), 200.0, epsilon = 1e-6);
        assert_eq!(pv.units, "MW");
        assert_eq!(results.investment("battery").unwrap().units, "MWh");

        for investment in &results.investments {
            if !investment.built {
                assert_approx_eq!(f64, investment.capacity.value(), 0.0, epsilon = 1e-6);
            }
        }
        assert!(results.electricity_balance_residual < 1e-6);
        for (_, unmet) in &results.unmet_demand {
            assert_approx_eq!(f64, *unmet, 0.0, epsilon = 1e-6);
        }
        assert_eq!(results.kpis.renewable_share, Some(100.0));
        assert!(results.kpis.cost_per_tonne_avoided.is_none());

        // The cost breakdown adds up to the objective of the cost-minimising run
        assert_approx_eq!(
            f64,
            results.kpis.total_cost.value(),
            results.objective_value,
            epsilon = 1e-3
        );
        assert_eq!(results.profile_scenario, ScenarioID::new("base"));
        assert_eq!(results.profile.len(), 1);
        assert_approx_eq!(f64, results.profile[0].pv, 100.0, epsilon = 1e-6);
        assert_approx_eq!(f64, results.profile[0].grid_purchase, 0.0, epsilon = 1e-6);
    }

    /// Set the heat demand of every period, which nothing in the fixture can supply
    fn with_heat_demand(mut model: Model, heat: f64) -> Model {
        for scenario in model.scenarios.values_mut() {
            for data in scenario.periods.values_mut() {
                data.demand.heat = heat;
            }
        }
        model
    }

    #[rstest]
    fn test_unmet_demand_is_the_shortfall(model: Model) {
        let model = with_heat_demand(model, 30.0);
        let results = run(&model, "no_tax", ObjectiveKind::MinimizeCost);

        // One representative day stands for the whole year
        let unmet: IndexMap<_, _> = results.unmet_demand.iter().copied().collect();
        assert_approx_eq!(f64, unmet[&UnmetCommodity::Heat], 30.0 * 365.0, epsilon = 1e-6);
        assert_approx_eq!(f64, unmet[&UnmetCommodity::Hydrogen], 0.0, epsilon = 1e-6);
        assert_approx_eq!(f64, unmet[&UnmetCommodity::Nitrogen], 0.0, epsilon = 1e-6);
    }

    #[rstest]
    fn test_unmet_demand_above_slack_bound(model: Model) {
        let model = with_heat_demand(model, 1500.0);
        let options = PlanningOptions::new(&model, "no_tax", ObjectiveKind::MinimizeCost).unwrap();
        let program = build_program(&model, &options).unwrap();

        let result = solve(&program, &HighsSolver, &SolverOptions::default());
        let Err(ModelError::InfeasibleModel(report)) = result else {
            panic!("Expected infeasible model");
        };
        assert!(
            report
                .constraints
                .iter()
                .any(|constraint| constraint.starts_with("heat_balance["))
        );
    }

    #[rstest]
    fn test_extract_results_deterministic(model: Model) {
        let first = run(&model, "no_tax", ObjectiveKind::MinimizeCost);
        let second = run(&model, "no_tax", ObjectiveKind::MinimizeCost);
        assert_eq!(first.investments, second.investments);
        assert_eq!(first.operations, second.operations);
    }

    #[rstest]
    fn test_carbon_tax_monotonicity(model: Model) {
        let untaxed = run(&model, "no_tax", ObjectiveKind::MinimizeCost);
        let taxed = run(&model, "high_tax", ObjectiveKind::MinimizeCost);
        for (a, b) in untaxed.investments.iter().zip(&taxed.investments) {
            assert!(b.capacity.value() >= a.capacity.value() - 1e-6);
        }
    }

    #[rstest]
    fn test_cost_per_tonne_avoided(mut model: Model) {
        // Emissions are zero, so everything is avoided
        model.parameters.reference_emissions = Some(Emissions(1000.0));
        let results = run(&model, "no_tax", ObjectiveKind::MinimizeCost);
        let avoided = results.kpis.cost_per_tonne_avoided.unwrap();
        assert_approx_eq!(
            f64,
            avoided.value(),
            results.kpis.total_cost.value() / 1000.0,
            epsilon = 1e-6
        );
    }

    #[rstest]
    fn test_operations(model: Model) {
        let results = run(&model, "no_tax", ObjectiveKind::MinimizeCost);
        let sale = results
            .operations
            .iter()
            .find(|row| row.variable == "grid_sale")
            .unwrap();
        assert!(sale.technology.is_none());
        assert_eq!(sale.time_period, TimePeriod::new("winter", 0));
        assert!(
            results
                .operations
                .iter()
                .any(|row| row.variable == "state_of_charge"
                    && row.technology == Some(TechnologyID::new("battery")))
        );
    }

    #[test]
    fn test_capacity_units() {
        assert_eq!(
            capacity_units(&TechnologyKind::Recovery {
                product: RecoveredProduct::Nitrogen
            }),
            "t/day"
        );
        assert_eq!(capacity_units(&TechnologyKind::AnaerobicDigestion), "m³/day");
    }
}
