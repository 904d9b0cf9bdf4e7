//! Typed keys addressing the variables and constraints of the program.
use crate::scenario::ScenarioID;
use crate::technology::TechnologyID;
use crate::time_period::TimePeriod;
use std::fmt::Display;

/// A (period, scenario) pair
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PeriodKey {
    /// The representative period
    pub period: TimePeriod,
    /// The scenario
    pub scenario: ScenarioID,
}

impl Display for PeriodKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}, {}", self.period, self.scenario)
    }
}

/// A (technology, period, scenario) triple addressing a second-stage decision
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct OperationKey {
    /// The technology
    pub technology: TechnologyID,
    /// The representative period
    pub period: TimePeriod,
    /// The scenario
    pub scenario: ScenarioID,
}

impl OperationKey {
    /// Create a new [`OperationKey`]
    pub fn new(technology: &TechnologyID, period: &TimePeriod, scenario: &ScenarioID) -> Self {
        Self {
            technology: technology.clone(),
            period: period.clone(),
            scenario: scenario.clone(),
        }
    }

    /// The same technology and scenario in a different period
    pub fn at(&self, period: &TimePeriod) -> Self {
        Self {
            technology: self.technology.clone(),
            period: period.clone(),
            scenario: self.scenario.clone(),
        }
    }
}

impl Display for OperationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}, {}, {}", self.technology, self.period, self.scenario)
    }
}

/// Second-stage decisions made per technology
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, strum::Display, strum::EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum OperationKind {
    /// Electricity output
    Generation,
    /// Amount put into storage
    Charge,
    /// Amount taken out of storage
    Discharge,
    /// Stored amount at the end of the period
    StateOfCharge,
    /// Output of a conversion or recovery unit
    Production,
    /// Input of a conversion unit, or fuel burned by a dispatchable unit
    Consumption,
    /// Whether a dispatchable unit is committed
    On,
    /// Whether a dispatchable unit starts up
    Startup,
    /// Whether a dispatchable unit shuts down
    Shutdown,
    /// Committed capacity (capacity × on), for linearisation
    CommittedCapacity,
}

/// Energy traded with external networks
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, strum::Display, strum::EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum Trade {
    /// Electricity bought from the grid
    GridPurchase,
    /// Electricity sold to the grid
    GridSale,
    /// Natural gas bought from the network
    NaturalGasPurchase,
}

/// Commodities whose demand may go unmet at a penalty
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, strum::Display, strum::EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum UnmetCommodity {
    /// Heat
    Heat,
    /// Hydrogen
    Hydrogen,
    /// Nitrogen fertiliser
    Nitrogen,
}

/// A key identifying a single variable of the program
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum VariableKey {
    /// Installed capacity of a technology (first stage)
    Capacity(TechnologyID),
    /// Whether a technology is built (first stage)
    Build(TechnologyID),
    /// A per-technology operating decision
    Operation(OperationKind, OperationKey),
    /// Energy traded with external networks
    Trade(Trade, PeriodKey),
    /// CO2 emitted
    Emissions(PeriodKey),
    /// Unmet demand (slack) for a commodity
    UnmetDemand(UnmetCommodity, PeriodKey),
}

/// Coarse classification of variables
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VariableKind {
    /// See [`VariableKey::Capacity`]
    Capacity,
    /// See [`VariableKey::Build`]
    Build,
    /// See [`VariableKey::Operation`]
    Operation(OperationKind),
    /// See [`VariableKey::Trade`]
    Trade(Trade),
    /// See [`VariableKey::Emissions`]
    Emissions,
    /// See [`VariableKey::UnmetDemand`]
    UnmetDemand(UnmetCommodity),
}

impl Display for VariableKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Capacity => write!(f, "capacity"),
            Self::Build => write!(f, "build"),
            Self::Operation(kind) => write!(f, "{kind}"),
            Self::Trade(trade) => write!(f, "{trade}"),
            Self::Emissions => write!(f, "emissions"),
            Self::UnmetDemand(commodity) => write!(f, "unmet_{commodity}"),
        }
    }
}

impl VariableKey {
    /// Key for a per-technology operating decision
    pub fn operation(kind: OperationKind, key: &OperationKey) -> Self {
        Self::Operation(kind, key.clone())
    }

    /// The kind of this variable
    pub fn kind(&self) -> VariableKind {
        match self {
            Self::Capacity(_) => VariableKind::Capacity,
            Self::Build(_) => VariableKind::Build,
            Self::Operation(kind, _) => VariableKind::Operation(*kind),
            Self::Trade(trade, _) => VariableKind::Trade(*trade),
            Self::Emissions(_) => VariableKind::Emissions,
            Self::UnmetDemand(commodity, _) => VariableKind::UnmetDemand(*commodity),
        }
    }

    /// Whether this is a first-stage (investment) decision
    pub fn is_first_stage(&self) -> bool {
        matches!(self, Self::Capacity(_) | Self::Build(_))
    }
}

impl Display for VariableKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Capacity(tech) => write!(f, "capacity[{tech}]"),
            Self::Build(tech) => write!(f, "build[{tech}]"),
            Self::Operation(kind, key) => write!(f, "{kind}[{key}]"),
            Self::Trade(trade, key) => write!(f, "{trade}[{key}]"),
            Self::Emissions(key) => write!(f, "emissions[{key}]"),
            Self::UnmetDemand(commodity, key) => write!(f, "unmet_{commodity}[{key}]"),
        }
    }
}

/// Purpose groups of constraints
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, strum::Display, strum::EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum ConstraintGroup {
    /// Linking capacity to the build decision
    CapacityLink,
    /// Renewable output
    Renewable,
    /// Dispatchable limits, ramping and unit commitment
    Dispatch,
    /// Storage dynamics
    Storage,
    /// Conversion stoichiometry and fuel supply
    Conversion,
    /// Multi-commodity balances
    Balance,
    /// Emissions accounting and caps
    Emissions,
}

/// The kinds of constraint in the program
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum ConstraintKind {
    /// capacity <= build · max
    CapacityUpperLink,
    /// capacity >= build · min
    CapacityLowerLink,
    /// generation = capacity · availability
    RenewableOutput,
    /// committed <= capacity
    CommittedCapacityLimit,
    /// committed <= max · on
    CommittedCapacityOn,
    /// committed >= capacity - max · (1 - on)
    CommittedCapacityLink,
    /// generation <= committed
    DispatchMax,
    /// generation >= min_load · committed
    DispatchMinLoad,
    /// generation(t) - generation(t-1) <= ramp_up · capacity
    RampUp,
    /// generation(t-1) - generation(t) <= ramp_down · capacity
    RampDown,
    /// startup(t) >= on(t) - on(t-1)
    Startup,
    /// shutdown(t) >= on(t-1) - on(t)
    Shutdown,
    /// Recent startups force the unit on
    MinUpTime,
    /// Recent shutdowns force the unit off
    MinDownTime,
    /// generation = fuel · heating value · efficiency
    FuelConsumption,
    /// charge <= charge_rate · capacity
    ChargeLimit,
    /// discharge <= discharge_rate · capacity
    DischargeLimit,
    /// soc >= min_level · capacity
    StateOfChargeMin,
    /// soc <= max_level · capacity
    StateOfChargeMax,
    /// State-of-charge dynamics
    StorageBalance,
    /// hydrogen = electricity / specific energy
    ElectrolysisConversion,
    /// electricity <= capacity
    ElectrolysisCapacity,
    /// ammonia · hydrogen_per_ammonia = hydrogen
    AmmoniaConversion,
    /// ammonia <= capacity / 24
    AmmoniaCapacity,
    /// biogas = daily biogas / 24
    DigesterOutput,
    /// gas purchase >= gas burned - biogas methane
    NaturalGasSupply,
    /// product <= capacity / 24
    RecoveryCapacity,
    /// product <= resource available in the influent
    RecoveryResource,
    /// Electricity supply equals demand
    ElectricityBalance,
    /// Heat supply covers demand
    HeatBalance,
    /// Hydrogen supply covers demand
    HydrogenBalance,
    /// Reclaimed water does not exceed demand
    WaterBalance,
    /// Nitrogen supply covers fertiliser demand
    NitrogenBalance,
    /// emissions = grid_ef · grid purchase + gas_ef · gas purchase
    EmissionsAccounting,
    /// Expected annual emissions <= cap
    EmissionCap,
}

impl ConstraintKind {
    /// The purpose group this kind of constraint belongs to
    pub fn group(self) -> ConstraintGroup {
        match self {
            Self::CapacityUpperLink | Self::CapacityLowerLink => ConstraintGroup::CapacityLink,
            Self::RenewableOutput => ConstraintGroup::Renewable,
            Self::CommittedCapacityLimit
            | Self::CommittedCapacityOn
            | Self::CommittedCapacityLink
            | Self::DispatchMax
            | Self::DispatchMinLoad
            | Self::RampUp
            | Self::RampDown
            | Self::Startup
            | Self::Shutdown
            | Self::MinUpTime
            | Self::MinDownTime
            | Self::FuelConsumption => ConstraintGroup::Dispatch,
            Self::ChargeLimit
            | Self::DischargeLimit
            | Self::StateOfChargeMin
            | Self::StateOfChargeMax
            | Self::StorageBalance => ConstraintGroup::Storage,
            Self::ElectrolysisConversion
            | Self::ElectrolysisCapacity
            | Self::AmmoniaConversion
            | Self::AmmoniaCapacity
            | Self::DigesterOutput
            | Self::NaturalGasSupply
            | Self::RecoveryCapacity
            | Self::RecoveryResource => ConstraintGroup::Conversion,
            Self::ElectricityBalance
            | Self::HeatBalance
            | Self::HydrogenBalance
            | Self::WaterBalance
            | Self::NitrogenBalance => ConstraintGroup::Balance,
            Self::EmissionsAccounting | Self::EmissionCap => ConstraintGroup::Emissions,
        }
    }
}

/// A key identifying a constraint of the program.
///
/// Several rows may share a key where one logical constraint is split (e.g. min up time).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ConstraintKey {
    /// The kind of constraint
    pub kind: ConstraintKind,
    /// The technology the constraint applies to, if any
    pub technology: Option<TechnologyID>,
    /// The period and scenario the constraint applies to, if any
    pub slot: Option<PeriodKey>,
}

impl ConstraintKey {
    /// A constraint on a technology's first-stage decisions
    pub fn technology(kind: ConstraintKind, technology: &TechnologyID) -> Self {
        Self {
            kind,
            technology: Some(technology.clone()),
            slot: None,
        }
    }

    /// A constraint on a technology's operation in one period and scenario
    pub fn operation(kind: ConstraintKind, key: &OperationKey) -> Self {
        Self {
            kind,
            technology: Some(key.technology.clone()),
            slot: Some(PeriodKey {
                period: key.period.clone(),
                scenario: key.scenario.clone(),
            }),
        }
    }

    /// A facility-wide constraint in one period and scenario
    pub fn slot(kind: ConstraintKind, key: &PeriodKey) -> Self {
        Self {
            kind,
            technology: None,
            slot: Some(key.clone()),
        }
    }

    /// A constraint over the whole program
    pub fn global(kind: ConstraintKind) -> Self {
        Self {
            kind,
            technology: None,
            slot: None,
        }
    }

    /// The purpose group of the constraint
    pub fn group(&self) -> ConstraintGroup {
        self.kind.group()
    }
}

impl Display for ConstraintKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.kind)?;
        match (&self.technology, &self.slot) {
            (Some(tech), Some(slot)) => write!(f, "[{tech}, {slot}]"),
            (Some(tech), None) => write!(f, "[{tech}]"),
            (None, Some(slot)) => write!(f, "[{slot}]"),
            (None, None) => Ok(()),
        }
    }
}
