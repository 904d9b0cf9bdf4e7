//! Fixtures for tests

use crate::model::Model;
use crate::model::parameters::{CarbonPolicy, Conversions, EmissionFactors, ModelParameters};
use crate::scenario::{Availability, Demand, PeriodData, Prices, Scenario, ScenarioMap};
use crate::solver::SolverOptions;
use crate::technology::{
    CapacityLimits, DispatchParameters, Economics, Fuel, RenewableResource, StorageCommodity,
    StorageParameters, Technology, TechnologyKind, TechnologyMap,
};
use crate::time_period::{Season, TimeIndex};
use crate::units::{Capacity, Dimensionless, MoneyPerCapacity, MoneyPerEmissions};
use crate::wastewater::WastewaterData;
use indexmap::indexmap;
use rstest::fixture;

/// Assert that an error with the given message occurs
macro_rules! assert_error {
    ($result:expr, $msg:expr) => {
        assert_eq!(
            anyhow::Error::from($result.unwrap_err())
                .chain()
                .next()
                .unwrap()
                .to_string(),
            $msg
        );
    };
}
pub(crate) use assert_error;

fn economics(capex: f64, lifespan: u32) -> Economics {
    Economics {
        capex: MoneyPerCapacity(capex),
        lifespan,
        fixed_opex_rate: Dimensionless(0.01),
        variable_opex: 0.0,
    }
}

fn limits(max: f64) -> CapacityLimits {
    CapacityLimits {
        min: Capacity(0.0),
        max: Capacity(max),
    }
}

#[fixture]
pub fn parameters() -> ModelParameters {
    ModelParameters {
        version: None,
        seasons: vec![Season::new("winter")],
        hours_per_day: 1,
        discount_rate: Dimensionless(0.08),
        carbon_policies: vec![
            CarbonPolicy {
                name: "no_tax".into(),
                tax: MoneyPerEmissions(0.0),
            },
            CarbonPolicy {
                name: "high_tax".into(),
                tax: MoneyPerEmissions(60.0),
            },
        ],
        unmet_demand_penalty: 1000.0,
        slack_upper_bound: 1000.0,
        emission_cap: None,
        reference_emissions: None,
        conversions: Conversions::default(),
        emission_factors: EmissionFactors::default(),
        solver: SolverOptions::default(),
    }
}

#[fixture]
pub fn pv() -> Technology {
    Technology {
        id: "pv".into(),
        kind: TechnologyKind::Renewable {
            resource: RenewableResource::Pv,
        },
        capacity_limits: limits(200.0),
        economics: economics(900.0, 25),
    }
}

#[fixture]
pub fn battery() -> Technology {
    Technology {
        id: "battery".into(),
        kind: TechnologyKind::Storage(StorageParameters {
            commodity: StorageCommodity::Electricity,
            charge_rate: 0.5,
            discharge_rate: 0.5,
            self_discharge: 0.0001,
            min_level: 0.1,
            max_level: 0.9,
            charge_efficiency: 0.95,
            discharge_efficiency: 0.95,
        }),
        capacity_limits: limits(200.0),
        economics: economics(228.0, 10),
    }
}

#[fixture]
pub fn chp() -> Technology {
    Technology {
        id: "chp".into(),
        kind: TechnologyKind::Dispatchable(DispatchParameters {
            fuel: Fuel::NaturalGas,
            electric_efficiency: 0.4,
            thermal_efficiency: Some(0.45),
            min_load_fraction: 0.3,
            ramp_up: Some(0.3),
            ramp_down: Some(0.3),
            min_up_time: 3,
            min_down_time: 2,
        }),
        capacity_limits: limits(20.0),
        economics: economics(1200.0, 20),
    }
}

#[fixture]
pub fn electrolyser() -> Technology {
    Technology {
        id: "electrolyser".into(),
        kind: TechnologyKind::Electrolysis {
            specific_energy: 55.0,
        },
        capacity_limits: limits(10.0),
        economics: economics(1500.0, 15),
    }
}

#[fixture]
pub fn technologies(pv: Technology, battery: Technology) -> TechnologyMap {
    indexmap! {
        pv.id.clone() => pv,
        battery.id.clone() => battery,
    }
}

/// A single probability-one scenario: half PV availability, 50 MWh of electricity demand
#[fixture]
pub fn scenarios(parameters: ModelParameters) -> ScenarioMap {
    let time_index = TimeIndex::new(&parameters.seasons, parameters.hours_per_day).unwrap();
    let data = PeriodData {
        availability: Availability { pv: 0.5, wind: 0.0 },
        demand: Demand {
            electricity: 50.0,
            ..Default::default()
        },
        prices: Prices {
            electricity_buy: 100.0,
            electricity_sell: 50.0,
            ..Default::default()
        },
    };
    let scenario = Scenario {
        id: "base".into(),
        probability: Dimensionless(1.0),
        periods: time_index.iter().map(|period| (period, data)).collect(),
    };

    indexmap! { scenario.id.clone() => scenario }
}

#[fixture]
pub fn model(
    parameters: ModelParameters,
    technologies: TechnologyMap,
    scenarios: ScenarioMap,
) -> Model {
    let time_index = TimeIndex::new(&parameters.seasons, parameters.hours_per_day).unwrap();
    Model {
        parameters,
        time_index,
        technologies,
        scenarios,
        wastewater: None,
    }
}

#[fixture]
pub fn wastewater_data() -> WastewaterData {
    WastewaterData {
        influent_flow: 50000.0,
        tn_concentration: 50.0,
        tp_concentration: 10.0,
        tn_removal: 0.75,
        tp_removal: 0.8,
        sludge_production: 0.001,
        vs_content: 0.7,
        biogas_yield: 0.35,
        ch4_content: 0.6,
        energy_consumption: 0.5,
    }
}
