//! Technology constraints: capacity links, renewable output, dispatch, storage and conversion.
use super::keys::{
    ConstraintKey, ConstraintKind, OperationKey, OperationKind, PeriodKey, Trade, VariableKey,
};
use super::program::{ColumnId, Program};
use super::{operation_keys, period_keys};
use crate::model::Model;
use crate::technology::{
    DispatchParameters, Fuel, RecoveredProduct, StorageParameters, Technology, TechnologyKind,
};
use crate::wastewater::WastewaterData;

/// Hours in a day, for technologies whose capacity is rated per day
const HOURS_PER_DAY: f64 = 24.0;

/// Initial state of charge of storage, as a fraction of capacity
pub const INITIAL_STORAGE_LEVEL: f64 = 0.5;

/// Get the column of an operating decision
pub fn operation(program: &Program, kind: OperationKind, key: &OperationKey) -> ColumnId {
    program.col(&VariableKey::operation(kind, key))
}

/// Get the capacity column of a technology
pub fn capacity(program: &Program, tech: &Technology) -> ColumnId {
    program.col(&VariableKey::Capacity(tech.id.clone()))
}

/// Add constraints on technologies and their operation
pub fn add_technology_constraints(program: &mut Program, model: &Model) {
    for tech in model.technologies.values() {
        add_capacity_links(program, tech);
    }

    for (tech, key) in operation_keys(model) {
        match &tech.kind {
            TechnologyKind::Renewable { resource } => {
                let availability = model.scenarios[&key.scenario]
                    .period(&key.period)
                    .availability
                    .for_resource(*resource);
                add_renewable_constraint(program, tech, &key, availability);
            }
            TechnologyKind::Dispatchable(params) => {
                add_dispatch_constraints(program, model, tech, params, &key);
            }
            TechnologyKind::Storage(params) => {
                add_storage_constraints(program, model, tech, params, &key);
            }
            TechnologyKind::Electrolysis { specific_energy } => {
                add_electrolysis_constraints(program, tech, &key, *specific_energy);
            }
            TechnologyKind::AmmoniaSynthesis {
                hydrogen_per_ammonia,
            } => add_ammonia_constraints(program, tech, &key, *hydrogen_per_ammonia),
            TechnologyKind::AnaerobicDigestion => {
                if let Some(wastewater) = &model.wastewater {
                    add_digester_constraint(program, &key, wastewater);
                }
            }
            TechnologyKind::Recovery { product } => {
                let wastewater = model.wastewater.as_ref();
                add_recovery_constraints(program, tech, &key, *product, wastewater);
            }
            TechnologyKind::Capture { .. } => {}
        }
    }

    if model.technologies.values().any(burns_natural_gas_or_makes_biogas) {
        for key in period_keys(model) {
            add_natural_gas_supply_constraint(program, model, &key);
        }
    }
}

fn burns_natural_gas_or_makes_biogas(tech: &Technology) -> bool {
    match &tech.kind {
        TechnologyKind::Dispatchable(params) => params.fuel == Fuel::NaturalGas,
        TechnologyKind::AnaerobicDigestion => true,
        _ => false,
    }
}

/// Link capacity to the build decision: `min · build <= capacity <= max · build`
fn add_capacity_links(program: &mut Program, tech: &Technology) {
    let capacity = capacity(program, tech);
    let build = program.col(&VariableKey::Build(tech.id.clone()));
    let limits = tech.capacity_limits;

    program.add_le(
        ConstraintKey::technology(ConstraintKind::CapacityUpperLink, &tech.id),
        [(capacity, 1.0), (build, -limits.max.value())],
        0.0,
    );
    if limits.min.value() > 0.0 {
        program.add_ge(
            ConstraintKey::technology(ConstraintKind::CapacityLowerLink, &tech.id),
            [(capacity, 1.0), (build, -limits.min.value())],
            0.0,
        );
    }
}

fn add_renewable_constraint(
    program: &mut Program,
    tech: &Technology,
    key: &OperationKey,
    availability: f64,
) {
    let generation = operation(program, OperationKind::Generation, key);
    let capacity = capacity(program, tech);
    program.add_eq(
        ConstraintKey::operation(ConstraintKind::RenewableOutput, key),
        [(generation, 1.0), (capacity, -availability)],
        0.0,
    );
}

/// Dispatch limits, ramping, unit commitment and fuel use.
///
/// The committed capacity `w = capacity · on` is linearised exactly, with the maximum capacity as
/// big-M.
fn add_dispatch_constraints(
    program: &mut Program,
    model: &Model,
    tech: &Technology,
    params: &DispatchParameters,
    key: &OperationKey,
) {
    let max = tech.capacity_limits.max.value();
    let capacity = capacity(program, tech);
    let generation = operation(program, OperationKind::Generation, key);
    let fuel = operation(program, OperationKind::Consumption, key);
    let on = operation(program, OperationKind::On, key);
    let committed = operation(program, OperationKind::CommittedCapacity, key);
    let row = |kind| ConstraintKey::operation(kind, key);

    program.add_le(
        row(ConstraintKind::CommittedCapacityLimit),
        [(committed, 1.0), (capacity, -1.0)],
        0.0,
    );
    program.add_le(
        row(ConstraintKind::CommittedCapacityOn),
        [(committed, 1.0), (on, -max)],
        0.0,
    );
    program.add_ge(
        row(ConstraintKind::CommittedCapacityLink),
        [(committed, 1.0), (capacity, -1.0), (on, -max)],
        -max,
    );
    program.add_le(
        row(ConstraintKind::DispatchMax),
        [(generation, 1.0), (committed, -1.0)],
        0.0,
    );
    program.add_ge(
        row(ConstraintKind::DispatchMinLoad),
        [(generation, 1.0), (committed, -params.min_load_fraction)],
        0.0,
    );

    let heating_value = match params.fuel {
        Fuel::NaturalGas => model.parameters.conversions.gas_heating_value,
        Fuel::Hydrogen => model.parameters.conversions.hydrogen_heating_value,
    };
    program.add_eq(
        row(ConstraintKind::FuelConsumption),
        [
            (generation, 1.0),
            (fuel, -heating_value * params.electric_efficiency),
        ],
        0.0,
    );

    // Everything below links to the previous hour of the same day
    let Some(previous) = model.time_index.previous(&key.period) else {
        return;
    };
    let previous = key.at(&previous);
    let previous_generation = operation(program, OperationKind::Generation, &previous);
    let previous_on = operation(program, OperationKind::On, &previous);

    if let Some(ramp_up) = params.ramp_up {
        program.add_le(
            row(ConstraintKind::RampUp),
            [
                (generation, 1.0),
                (previous_generation, -1.0),
                (capacity, -ramp_up),
            ],
            0.0,
        );
    }
    if let Some(ramp_down) = params.ramp_down {
        program.add_le(
            row(ConstraintKind::RampDown),
            [
                (previous_generation, 1.0),
                (generation, -1.0),
                (capacity, -ramp_down),
            ],
            0.0,
        );
    }

    let startup = operation(program, OperationKind::Startup, key);
    let shutdown = operation(program, OperationKind::Shutdown, key);
    program.add_ge(
        row(ConstraintKind::Startup),
        [(startup, 1.0), (on, -1.0), (previous_on, 1.0)],
        0.0,
    );
    program.add_ge(
        row(ConstraintKind::Shutdown),
        [(shutdown, 1.0), (previous_on, -1.0), (on, 1.0)],
        0.0,
    );

    if params.min_up_time > 0 {
        let startups =
            recent_transitions(program, model, key, OperationKind::Startup, params.min_up_time);
        program.add_le(
            row(ConstraintKind::MinUpTime),
            startups.into_iter().chain([(on, -1.0)]),
            0.0,
        );
    }
    if params.min_down_time > 0 {
        let shutdowns =
            recent_transitions(program, model, key, OperationKind::Shutdown, params.min_down_time);
        program.add_le(
            row(ConstraintKind::MinDownTime),
            shutdowns.into_iter().chain([(on, 1.0)]),
            1.0,
        );
    }
}

/// Startup or shutdown columns in the window `(t - length, t]` of the same day
fn recent_transitions(
    program: &Program,
    model: &Model,
    key: &OperationKey,
    kind: OperationKind,
    length: u8,
) -> Vec<(ColumnId, f64)> {
    model
        .time_index
        .window_ending_at(&key.period, length)
        .filter(|period| !period.is_first_of_day())
        .map(|period| (operation(program, kind, &key.at(&period)), 1.0))
        .collect()
}

fn add_storage_constraints(
    program: &mut Program,
    model: &Model,
    tech: &Technology,
    params: &StorageParameters,
    key: &OperationKey,
) {
    let capacity = capacity(program, tech);
    let charge = operation(program, OperationKind::Charge, key);
    let discharge = operation(program, OperationKind::Discharge, key);
    let soc = operation(program, OperationKind::StateOfCharge, key);
    let row = |kind| ConstraintKey::operation(kind, key);

    program.add_le(
        row(ConstraintKind::ChargeLimit),
        [(charge, 1.0), (capacity, -params.charge_rate)],
        0.0,
    );
    program.add_le(
        row(ConstraintKind::DischargeLimit),
        [(discharge, 1.0), (capacity, -params.discharge_rate)],
        0.0,
    );
    program.add_ge(
        row(ConstraintKind::StateOfChargeMin),
        [(soc, 1.0), (capacity, -params.min_level)],
        0.0,
    );
    program.add_le(
        row(ConstraintKind::StateOfChargeMax),
        [(soc, 1.0), (capacity, -params.max_level)],
        0.0,
    );

    // soc = carried_over + η_c · charge - discharge / η_d
    let carried_over = match model.time_index.previous(&key.period) {
        None => (capacity, -INITIAL_STORAGE_LEVEL),
        Some(previous) => {
            let previous_soc =
                operation(program, OperationKind::StateOfCharge, &key.at(&previous));
            (previous_soc, -(1.0 - params.self_discharge))
        }
    };
    program.add_eq(
        row(ConstraintKind::StorageBalance),
        [
            (soc, 1.0),
            carried_over,
            (charge, -params.charge_efficiency),
            (discharge, 1.0 / params.discharge_efficiency),
        ],
        0.0,
    );
}

fn add_electrolysis_constraints(
    program: &mut Program,
    tech: &Technology,
    key: &OperationKey,
    specific_energy: f64,
) {
    let capacity = capacity(program, tech);
    let consumption = operation(program, OperationKind::Consumption, key);
    let production = operation(program, OperationKind::Production, key);

    program.add_eq(
        ConstraintKey::operation(ConstraintKind::ElectrolysisConversion, key),
        [(production, 1.0), (consumption, -1.0 / specific_energy)],
        0.0,
    );
    program.add_le(
        ConstraintKey::operation(ConstraintKind::ElectrolysisCapacity, key),
        [(consumption, 1.0), (capacity, -1.0)],
        0.0,
    );
}

fn add_ammonia_constraints(
    program: &mut Program,
    tech: &Technology,
    key: &OperationKey,
    hydrogen_per_ammonia: f64,
) {
    let capacity = capacity(program, tech);
    let consumption = operation(program, OperationKind::Consumption, key);
    let production = operation(program, OperationKind::Production, key);

    program.add_eq(
        ConstraintKey::operation(ConstraintKind::AmmoniaConversion, key),
        [(production, hydrogen_per_ammonia), (consumption, -1.0)],
        0.0,
    );
    program.add_le(
        ConstraintKey::operation(ConstraintKind::AmmoniaCapacity, key),
        [(production, 1.0), (capacity, -1.0 / HOURS_PER_DAY)],
        0.0,
    );
}

/// Biogas output is fixed by the sludge available, whether or not the digester is built
fn add_digester_constraint(program: &mut Program, key: &OperationKey, wastewater: &WastewaterData) {
    let production = operation(program, OperationKind::Production, key);
    program.add_eq(
        ConstraintKey::operation(ConstraintKind::DigesterOutput, key),
        [(production, 1.0)],
        wastewater.biogas_per_period(),
    );
}

fn add_recovery_constraints(
    program: &mut Program,
    tech: &Technology,
    key: &OperationKey,
    product: RecoveredProduct,
    wastewater: Option<&WastewaterData>,
) {
    let capacity = capacity(program, tech);
    let production = operation(program, OperationKind::Production, key);

    program.add_le(
        ConstraintKey::operation(ConstraintKind::RecoveryCapacity, key),
        [(production, 1.0), (capacity, -1.0 / HOURS_PER_DAY)],
        0.0,
    );
    if let Some(wastewater) = wastewater {
        program.add_le(
            ConstraintKey::operation(ConstraintKind::RecoveryResource, key),
            [(production, 1.0)],
            wastewater.recoverable_per_period(product),
        );
    }
}

/// Gas bought must cover gas burned, less the methane content of any biogas
fn add_natural_gas_supply_constraint(program: &mut Program, model: &Model, key: &PeriodKey) {
    let ch4_content = model.wastewater.map_or(0.0, |wastewater| wastewater.ch4_content);
    let purchase = program.col(&VariableKey::Trade(Trade::NaturalGasPurchase, key.clone()));
    let mut terms = vec![(purchase, 1.0)];
    for tech in model.technologies.values() {
        let op_key = OperationKey::new(&tech.id, &key.period, &key.scenario);
        match &tech.kind {
            TechnologyKind::Dispatchable(params) if params.fuel == Fuel::NaturalGas => {
                terms.push((operation(program, OperationKind::Consumption, &op_key), -1.0));
            }
            TechnologyKind::AnaerobicDigestion => {
                terms.push((operation(program, OperationKind::Production, &op_key), ch4_content));
            }
            _ => {}
        }
    }

    program.add_ge(
        ConstraintKey::slot(ConstraintKind::NaturalGasSupply, key),
        terms,
        0.0,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{chp, model};
    use crate::formulation::variables::add_variables;
    use crate::time_period::{Season, TimeIndex};
    use rstest::rstest;

    fn build(model: &Model) -> Program {
        let mut program = Program::default();
        add_variables(&mut program, model);
        add_technology_constraints(&mut program, model);
        program
    }

    fn rows_of_kind(program: &Program, kind: ConstraintKind) -> usize {
        program.rows().iter().filter(|row| row.key.kind == kind).count()
    }

    #[rstest]
    fn test_capacity_links(mut model: Model) {
        let program = build(&model);
        assert_eq!(rows_of_kind(&program, ConstraintKind::CapacityUpperLink), 2);
        assert_eq!(rows_of_kind(&program, ConstraintKind::CapacityLowerLink), 0);

        model.technologies["pv"].capacity_limits.min = 10.0.into();
        let program = build(&model);
        assert_eq!(rows_of_kind(&program, ConstraintKind::CapacityLowerLink), 1);
    }

    #[rstest]
    fn test_storage_first_hour_starts_half_full(model: Model) {
        let program = build(&model);
        let row = program
            .rows()
            .iter()
            .find(|row| row.key.kind == ConstraintKind::StorageBalance)
            .unwrap();
        let capacity = program.col(&VariableKey::Capacity("battery".into()));
        assert!(row.terms.contains(&(capacity, -INITIAL_STORAGE_LEVEL)));
        assert_eq!((row.lower, row.upper), (0.0, 0.0));
    }

    /// Stretch the one-hour fixture day to `hours`, repeating its data
    fn with_hours(mut model: Model, hours: u8) -> Model {
        model.time_index = TimeIndex::new(&[Season::new("winter")], hours).unwrap();
        let scenario = model.scenarios.values_mut().next().unwrap();
        let data = *scenario.periods.values().next().unwrap();
        scenario.periods = model
            .time_index
            .iter()
            .map(|period| (period, data))
            .collect();
        model
    }

    #[rstest]
    #[case(50.0, true)]
    #[case(50.1, false)]
    #[case(49.9, false)]
    #[case(100.0, false)]
    fn test_idle_storage_only_self_discharges(
        model: Model,
        #[case] second_hour_level: f64,
        #[case] satisfied: bool,
    ) {
        // Self-discharge of 0.2 per hour: 62.5 idles down to 50
        let mut model = with_hours(model, 2);
        let TechnologyKind::Storage(params) = &mut model.technologies["battery"].kind else {
            panic!("Expected storage");
        };
        params.self_discharge = 0.2;
        let program = build(&model);

        let periods: Vec<_> = model.time_index.iter().collect();
        let key = OperationKey::new(&"battery".into(), &periods[1], &"base".into());
        let row = program
            .rows()
            .iter()
            .find(|row| row.key == ConstraintKey::operation(ConstraintKind::StorageBalance, &key))
            .unwrap();

        let mut values = vec![0.0; program.num_columns()];
        values[operation(&program, OperationKind::StateOfCharge, &key.at(&periods[0])).0] = 62.5;
        values[operation(&program, OperationKind::StateOfCharge, &key).0] = second_hour_level;
        let activity = Program::row_activity(row, &values);
        assert_eq!(
            activity >= row.lower - 1e-9 && activity <= row.upper + 1e-9,
            satisfied
        );
    }

    #[rstest]
    fn test_dispatch_constraints_per_day(model: Model, chp: Technology) {
        let mut model = with_hours(model, 4);
        model.technologies.insert(chp.id.clone(), chp);

        let program = build(&model);

        // No links to the previous day
        assert_eq!(rows_of_kind(&program, ConstraintKind::DispatchMax), 4);
        assert_eq!(rows_of_kind(&program, ConstraintKind::RampUp), 3);
        assert_eq!(rows_of_kind(&program, ConstraintKind::Startup), 3);
        assert_eq!(rows_of_kind(&program, ConstraintKind::MinUpTime), 3);
        assert_eq!(rows_of_kind(&program, ConstraintKind::NaturalGasSupply), 4);

        // min_up_time = 3: hour 3 looks back at startups in hours 1 to 3
        let min_up = program
            .rows()
            .iter()
            .filter(|row| row.key.kind == ConstraintKind::MinUpTime)
            .last()
            .unwrap();
        assert_eq!(min_up.terms.len(), 4);
    }

    #[rstest]
    fn test_committed_capacity_linearisation(mut model: Model, chp: Technology) {
        // With capacity 15 and on = 1 the committed capacity is forced to 15; with on = 0 to 0
        model.technologies.insert(chp.id.clone(), chp);
        let program = build(&model);
        let rows: Vec<_> = program
            .rows()
            .iter()
            .filter(|row| {
                matches!(
                    row.key.kind,
                    ConstraintKind::CommittedCapacityLimit
                        | ConstraintKind::CommittedCapacityOn
                        | ConstraintKind::CommittedCapacityLink
                )
            })
            .collect();
        assert_eq!(rows.len(), 3);

        let key = OperationKey::new(
            &"chp".into(),
            model.time_index.iter().next().as_ref().unwrap(),
            &"base".into(),
        );
        let capacity = program.col(&VariableKey::Capacity("chp".into()));
        let on = operation(&program, OperationKind::On, &key);
        let committed = operation(&program, OperationKind::CommittedCapacity, &key);

        let feasible = |values: &[f64]| {
            rows.iter().all(|row| {
                let activity = Program::row_activity(row, values);
                activity >= row.lower - 1e-9 && activity <= row.upper + 1e-9
            })
        };
        let mut values = vec![0.0; program.num_columns()];
        values[capacity.0] = 15.0;
        values[on.0] = 1.0;
        values[committed.0] = 15.0;
        assert!(feasible(&values));
        values[committed.0] = 14.0;
        assert!(!feasible(&values));
        values[on.0] = 0.0;
        assert!(!feasible(&values));
        values[committed.0] = 0.0;
        assert!(feasible(&values));
    }
}
