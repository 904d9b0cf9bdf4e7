//! Decision variables of the program.
use super::keys::{OperationKey, OperationKind, Trade, UnmetCommodity, VariableKey};
use super::program::Program;
use super::{operation_keys, period_keys};
use crate::model::Model;
use crate::technology::TechnologyKind;
use crate::time_period::TimePeriod;
use strum::IntoEnumIterator;

/// The operating decisions a technology has in the given period
pub fn operation_kinds(kind: &TechnologyKind, period: &TimePeriod) -> Vec<OperationKind> {
    use OperationKind::{
        Charge, CommittedCapacity, Consumption, Discharge, Generation, On, Production, Shutdown,
        Startup, StateOfCharge,
    };

    match kind {
        TechnologyKind::Renewable { .. } => vec![Generation],
        TechnologyKind::Dispatchable(_) if period.is_first_of_day() => {
            vec![Generation, Consumption, On, CommittedCapacity]
        }
        TechnologyKind::Dispatchable(_) => vec![
            Generation,
            Consumption,
            On,
            CommittedCapacity,
            Startup,
            Shutdown,
        ],
        TechnologyKind::Storage(_) => vec![Charge, Discharge, StateOfCharge],
        TechnologyKind::Electrolysis { .. } | TechnologyKind::AmmoniaSynthesis { .. } => {
            vec![Consumption, Production]
        }
        TechnologyKind::AnaerobicDigestion | TechnologyKind::Recovery { .. } => vec![Production],
        TechnologyKind::Capture { .. } => Vec::new(),
    }
}

/// Add all variables to the program.
///
/// First-stage variables come first, followed by per-technology operating variables and then
/// facility-wide variables for each period and scenario.
pub fn add_variables(program: &mut Program, model: &Model) {
    for tech in model.technologies.values() {
        program.add_continuous(
            VariableKey::Capacity(tech.id.clone()),
            0.0,
            tech.capacity_limits.max.value(),
        );
        program.add_binary(VariableKey::Build(tech.id.clone()));
    }

    for (tech, key) in operation_keys(model) {
        for kind in operation_kinds(&tech.kind, &key.period) {
            add_operation_variable(program, kind, &key, tech.capacity_limits.max.value());
        }
    }

    let slack_bound = model.parameters.slack_upper_bound;
    for key in period_keys(model) {
        for trade in Trade::iter() {
            program.add_continuous(VariableKey::Trade(trade, key.clone()), 0.0, f64::INFINITY);
        }
        program.add_continuous(VariableKey::Emissions(key.clone()), 0.0, f64::INFINITY);
        for commodity in UnmetCommodity::iter() {
            program.add_continuous(
                VariableKey::UnmetDemand(commodity, key.clone()),
                0.0,
                slack_bound,
            );
        }
    }
}

fn add_operation_variable(
    program: &mut Program,
    kind: OperationKind,
    key: &OperationKey,
    max_capacity: f64,
) {
    let var = VariableKey::operation(kind, key);
    match kind {
        OperationKind::On | OperationKind::Startup | OperationKind::Shutdown => {
            program.add_binary(var);
        }
        OperationKind::CommittedCapacity => {
            program.add_continuous(var, 0.0, max_capacity);
        }
        _ => {
            program.add_continuous(var, 0.0, f64::INFINITY);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{chp, model};
    use crate::formulation::keys::VariableKind;
    use crate::technology::Technology;
    use rstest::rstest;

    #[rstest]
    fn test_operation_kinds_dispatchable(chp: Technology) {
        let first = TimePeriod::new("winter", 0);
        let later = TimePeriod::new("winter", 1);
        assert_eq!(operation_kinds(&chp.kind, &first).len(), 4);
        let kinds = operation_kinds(&chp.kind, &later);
        assert!(kinds.contains(&OperationKind::Startup));
        assert!(kinds.contains(&OperationKind::Shutdown));
    }

    #[rstest]
    fn test_add_variables(model: Model) {
        let mut program = Program::default();
        add_variables(&mut program, &model);

        // pv and battery: capacity and build each
        let first_stage = program
            .columns()
            .filter(|(_, key, _)| key.is_first_stage())
            .count();
        assert_eq!(first_stage, 4);

        let (_, pv_capacity) = program.column(program.col(&VariableKey::Capacity("pv".into())));
        assert_eq!(pv_capacity.upper, 200.0);

        let slack: Vec<_> = program
            .columns()
            .filter(|(_, key, _)| matches!(key.kind(), VariableKind::UnmetDemand(_)))
            .map(|(_, _, column)| column.upper)
            .collect();
        assert_eq!(slack, [1000.0; 3]);

        let binaries = program
            .columns()
            .filter(|(_, _, column)| column.integer)
            .count();
        assert_eq!(binaries, 2);
    }
}
