use serde::Serialize;

/// Fixed target balance every projection aims for.
pub const GOAL: f64 = 1_000_000.0;

/// Longest horizon the monthly simulation will walk (500 years).
pub const MAX_SIMULATION_MONTHS: u32 = 6_000;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CalculationMode {
    Contribution,
    Time,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RatePeriod {
    Annual,
    Monthly,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PeriodUnit {
    Years,
    Months,
}

impl PeriodUnit {
    pub fn to_months(self, duration: f64) -> f64 {
        match self {
            PeriodUnit::Years => duration * 12.0,
            PeriodUnit::Months => duration,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RateSpec {
    /// Nominal rate in percent.
    pub rate: f64,
    pub period: RatePeriod,
}

/// The unknown being solved for, carrying the parameter that mode needs.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum SolveFor {
    /// Solve for the monthly contribution that reaches the goal in `duration`.
    Contribution { duration: f64, unit: PeriodUnit },
    /// Solve for the months needed given a fixed monthly contribution.
    Time { monthly_contribution: f64 },
}

impl SolveFor {
    pub fn mode(&self) -> CalculationMode {
        match self {
            SolveFor::Contribution { .. } => CalculationMode::Contribution,
            SolveFor::Time { .. } => CalculationMode::Time,
        }
    }
}

/// Engine inputs. Callers are expected to have sanitized these: finite
/// numbers, a non-negative balance, a positive horizon in contribution mode
/// and a non-negative contribution in time mode.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ProjectionInputs {
    pub initial_balance: f64,
    pub rate: RateSpec,
    pub solve_for: SolveFor,
}

impl ProjectionInputs {
    /// Builds inputs from the flat calling convention where the third
    /// parameter is a duration or a contribution depending on `mode`.
    /// `period_unit` is ignored in time mode.
    pub fn from_parts(
        mode: CalculationMode,
        initial_balance: f64,
        rate: f64,
        rate_period: RatePeriod,
        third_param: f64,
        period_unit: PeriodUnit,
    ) -> Self {
        let solve_for = match mode {
            CalculationMode::Contribution => SolveFor::Contribution {
                duration: third_param,
                unit: period_unit,
            },
            CalculationMode::Time => SolveFor::Time {
                monthly_contribution: third_param,
            },
        };
        Self {
            initial_balance,
            rate: RateSpec {
                rate,
                period: rate_period,
            },
            solve_for,
        }
    }

    pub fn mode(&self) -> CalculationMode {
        self.solve_for.mode()
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SolveStatus {
    Solved,
    /// Time mode found no finite forward solution; `months` holds the 0
    /// sentinel and must not be read as "goal reached immediately".
    NoForwardSolution,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YearlyCheckpoint {
    pub year: u32,
    pub invested_amount: f64,
    pub interest_cumulative: f64,
    pub total_invested: f64,
    pub total_interest: f64,
    pub total_accumulated: f64,
    pub goal: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectionResult {
    pub mode: CalculationMode,
    pub monthly_rate: f64,
    pub monthly_contribution: f64,
    pub months: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub solved_contribution: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub solved_months: Option<f64>,
    pub status: SolveStatus,
    pub total_contributed: f64,
    pub total_interest: f64,
    pub total_balance: f64,
    pub simulated_months: u32,
    pub horizon_capped: bool,
    pub yearly_checkpoints: Vec<YearlyCheckpoint>,
}

impl ProjectionResult {
    pub fn is_degenerate(&self) -> bool {
        self.status == SolveStatus::NoForwardSolution
    }

    pub fn goal_reached(&self) -> bool {
        self.total_balance + 1e-9 >= GOAL
    }
}
