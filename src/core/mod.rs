mod engine;
mod types;

pub use engine::{effective_monthly_rate, project, round2, solve_contribution, solve_months};
pub use types::{
    CalculationMode, GOAL, MAX_SIMULATION_MONTHS, PeriodUnit, ProjectionInputs, ProjectionResult,
    RatePeriod, RateSpec, SolveFor, SolveStatus, YearlyCheckpoint,
};
