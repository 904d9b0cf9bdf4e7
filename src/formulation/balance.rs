//! Commodity balances and emissions accounting for each period and scenario.
use super::constraints::operation;
use super::keys::{
    ConstraintKey, ConstraintKind, OperationKey, OperationKind, PeriodKey, Trade, UnmetCommodity,
    VariableKey,
};
use super::period_keys;
use super::program::{ColumnId, Program};
use crate::model::Model;
use crate::technology::{Fuel, RecoveredProduct, StorageCommodity, TechnologyID, TechnologyKind};

/// Add commodity balances and emissions accounting
pub fn add_balance_constraints(program: &mut Program, model: &Model) {
    for key in period_keys(model) {
        add_electricity_balance(program, model, &key);
        add_heat_balance(program, model, &key);
        add_hydrogen_balance(program, model, &key);
        add_water_balance(program, model, &key);
        add_nitrogen_balance(program, model, &key);
        add_emissions_accounting(program, model, &key);
    }
}

/// A linear expression collected from the technologies operating in one period and scenario
struct Terms<'a> {
    program: &'a Program,
    slot: &'a PeriodKey,
    terms: Vec<(ColumnId, f64)>,
}

impl<'a> Terms<'a> {
    fn new(program: &'a Program, slot: &'a PeriodKey) -> Self {
        Self {
            program,
            slot,
            terms: Vec::new(),
        }
    }

    fn operation(&mut self, tech: &TechnologyID, kind: OperationKind, coeff: f64) {
        let key = OperationKey::new(tech, &self.slot.period, &self.slot.scenario);
        self.terms.push((operation(self.program, kind, &key), coeff));
    }

    fn trade(&mut self, trade: Trade, coeff: f64) {
        let column = self.program.col(&VariableKey::Trade(trade, self.slot.clone()));
        self.terms.push((column, coeff));
    }

    fn unmet(&mut self, commodity: UnmetCommodity) {
        let column = self
            .program
            .col(&VariableKey::UnmetDemand(commodity, self.slot.clone()));
        self.terms.push((column, 1.0));
    }

    fn into_terms(self) -> Vec<(ColumnId, f64)> {
        self.terms
    }
}

fn demand(model: &Model, key: &PeriodKey) -> crate::scenario::Demand {
    model.scenarios[&key.scenario].period(&key.period).demand
}

/// Supply equals demand, including the wastewater plant's own consumption
fn add_electricity_balance(program: &mut Program, model: &Model, key: &PeriodKey) {
    let mut terms = Terms::new(program, key);
    for tech in model.technologies.values() {
        let id = &tech.id;
        match &tech.kind {
            TechnologyKind::Renewable { .. } | TechnologyKind::Dispatchable(_) => {
                terms.operation(id, OperationKind::Generation, 1.0);
            }
            TechnologyKind::Storage(params) if params.commodity == StorageCommodity::Electricity => {
                terms.operation(id, OperationKind::Discharge, 1.0);
                terms.operation(id, OperationKind::Charge, -1.0);
            }
            TechnologyKind::Electrolysis { .. } => {
                terms.operation(id, OperationKind::Consumption, -1.0);
            }
            _ => {}
        }
    }
    terms.trade(Trade::GridPurchase, 1.0);
    terms.trade(Trade::GridSale, -1.0);
    let terms = terms.into_terms();

    let internal = model
        .wastewater
        .map_or(0.0, |wastewater| wastewater.internal_electricity());
    program.add_eq(
        ConstraintKey::slot(ConstraintKind::ElectricityBalance, key),
        terms,
        demand(model, key).electricity + internal,
    );
}

/// Heat from combined heat and power units covers demand
fn add_heat_balance(program: &mut Program, model: &Model, key: &PeriodKey) {
    let mut terms = Terms::new(program, key);
    for tech in model.technologies.values() {
        if let TechnologyKind::Dispatchable(params) = &tech.kind
            && let Some(thermal) = params.thermal_efficiency
        {
            let heat_per_electricity = thermal / params.electric_efficiency;
            terms.operation(&tech.id, OperationKind::Generation, heat_per_electricity);
        }
    }
    terms.unmet(UnmetCommodity::Heat);
    let terms = terms.into_terms();

    program.add_ge(
        ConstraintKey::slot(ConstraintKind::HeatBalance, key),
        terms,
        demand(model, key).heat,
    );
}

fn add_hydrogen_balance(program: &mut Program, model: &Model, key: &PeriodKey) {
    let mut terms = Terms::new(program, key);
    for tech in model.technologies.values() {
        let id = &tech.id;
        match &tech.kind {
            TechnologyKind::Electrolysis { .. } => {
                terms.operation(id, OperationKind::Production, 1.0);
            }
            TechnologyKind::Storage(params) if params.commodity == StorageCommodity::Hydrogen => {
                terms.operation(id, OperationKind::Discharge, 1.0);
                terms.operation(id, OperationKind::Charge, -1.0);
            }
            TechnologyKind::AmmoniaSynthesis { .. } => {
                terms.operation(id, OperationKind::Consumption, -1.0);
            }
            TechnologyKind::Dispatchable(params) if params.fuel == Fuel::Hydrogen => {
                terms.operation(id, OperationKind::Consumption, -1.0);
            }
            _ => {}
        }
    }
    terms.unmet(UnmetCommodity::Hydrogen);
    let terms = terms.into_terms();

    program.add_ge(
        ConstraintKey::slot(ConstraintKind::HydrogenBalance, key),
        terms,
        demand(model, key).hydrogen,
    );
}

/// Reclaimed water cannot exceed demand.
///
/// Omitted when no technology recovers water.
fn add_water_balance(program: &mut Program, model: &Model, key: &PeriodKey) {
    let mut terms = Terms::new(program, key);
    for tech in model.technologies.values() {
        if let TechnologyKind::Recovery {
            product: RecoveredProduct::Water,
        } = tech.kind
        {
            terms.operation(&tech.id, OperationKind::Production, 1.0);
        }
    }
    let terms = terms.into_terms();
    if terms.is_empty() {
        return;
    }

    program.add_le(
        ConstraintKey::slot(ConstraintKind::WaterBalance, key),
        terms,
        demand(model, key).water,
    );
}

/// Recovered nitrogen plus the nitrogen content of ammonia covers fertiliser demand
fn add_nitrogen_balance(program: &mut Program, model: &Model, key: &PeriodKey) {
    let nitrogen_fraction = model.parameters.conversions.ammonia_nitrogen_fraction;
    let mut terms = Terms::new(program, key);
    for tech in model.technologies.values() {
        let id = &tech.id;
        match &tech.kind {
            TechnologyKind::Recovery {
                product: RecoveredProduct::Nitrogen,
            } => terms.operation(id, OperationKind::Production, 1.0),
            TechnologyKind::AmmoniaSynthesis { .. } => {
                terms.operation(id, OperationKind::Production, nitrogen_fraction);
            }
            TechnologyKind::Storage(params) if params.commodity == StorageCommodity::Ammonia => {
                terms.operation(id, OperationKind::Discharge, nitrogen_fraction);
                terms.operation(id, OperationKind::Charge, -nitrogen_fraction);
            }
            _ => {}
        }
    }
    terms.unmet(UnmetCommodity::Nitrogen);
    let terms = terms.into_terms();

    program.add_ge(
        ConstraintKey::slot(ConstraintKind::NitrogenBalance, key),
        terms,
        demand(model, key).fertilizer_n,
    );
}

/// `emissions = grid_ef · grid purchase + gas_ef · gas purchase`
fn add_emissions_accounting(program: &mut Program, model: &Model, key: &PeriodKey) {
    let factors = model.parameters.emission_factors;
    let emissions = program.col(&VariableKey::Emissions(key.clone()));
    let mut terms = Terms::new(program, key);
    terms.trade(Trade::GridPurchase, -factors.grid);
    terms.trade(Trade::NaturalGasPurchase, -factors.natural_gas);
    let terms = terms.into_terms();

    program.add_eq(
        ConstraintKey::slot(ConstraintKind::EmissionsAccounting, key),
        terms.into_iter().chain([(emissions, 1.0)]),
        0.0,
    );
}
