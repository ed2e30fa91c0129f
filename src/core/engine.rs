use super::types::{
    CalculationMode, GOAL, MAX_SIMULATION_MONTHS, ProjectionInputs, ProjectionResult, RatePeriod,
    RateSpec, SolveFor, SolveStatus, YearlyCheckpoint,
};

#[derive(Debug, Clone, Copy)]
struct Solution {
    monthly_contribution: f64,
    months: f64,
    status: SolveStatus,
}

#[derive(Debug)]
struct Simulation {
    simulated_months: u32,
    horizon_capped: bool,
    total_contributed: f64,
    total_interest: f64,
    total_balance: f64,
    checkpoints: Vec<YearlyCheckpoint>,
}

/// Solves for the unknown in closed form, then re-derives every reported
/// total from a cent-rounded monthly simulation.
pub fn project(inputs: &ProjectionInputs) -> ProjectionResult {
    let monthly_rate = effective_monthly_rate(inputs.rate);
    let solution = match inputs.solve_for {
        SolveFor::Contribution { duration, unit } => {
            let months = unit.to_months(duration);
            Solution {
                monthly_contribution: solve_contribution(
                    inputs.initial_balance,
                    monthly_rate,
                    months,
                ),
                months,
                status: SolveStatus::Solved,
            }
        }
        SolveFor::Time {
            monthly_contribution,
        } => {
            let (months, status) =
                solve_months(inputs.initial_balance, monthly_rate, monthly_contribution);
            Solution {
                monthly_contribution,
                months,
                status,
            }
        }
    };

    let simulation = simulate(
        inputs.initial_balance,
        monthly_rate,
        solution.monthly_contribution,
        solution.months,
    );

    let mode = inputs.mode();
    tracing::debug!(
        ?mode,
        monthly_rate,
        monthly_contribution = solution.monthly_contribution,
        months = solution.months,
        status = ?solution.status,
        simulated_months = simulation.simulated_months,
        "projection solved"
    );

    ProjectionResult {
        mode,
        monthly_rate,
        monthly_contribution: solution.monthly_contribution,
        months: solution.months,
        solved_contribution: (mode == CalculationMode::Contribution)
            .then_some(solution.monthly_contribution),
        solved_months: (mode == CalculationMode::Time).then_some(solution.months),
        status: solution.status,
        total_contributed: simulation.total_contributed,
        total_interest: simulation.total_interest,
        total_balance: simulation.total_balance,
        simulated_months: simulation.simulated_months,
        horizon_capped: simulation.horizon_capped,
        yearly_checkpoints: simulation.checkpoints,
    }
}

/// Geometric de-annualization: compounding twelve of these gives the
/// nominal annual rate back.
pub fn effective_monthly_rate(rate: RateSpec) -> f64 {
    match rate.period {
        RatePeriod::Annual => (1.0 + rate.rate / 100.0).powf(1.0 / 12.0) - 1.0,
        RatePeriod::Monthly => rate.rate / 100.0,
    }
}

/// Inverts `FV = PV(1+r)^n + PMT((1+r)^n - 1)/r` for PMT, clamped at zero.
pub fn solve_contribution(initial_balance: f64, monthly_rate: f64, months: f64) -> f64 {
    let compound_factor = (1.0 + monthly_rate).powf(months);
    let remaining = GOAL - initial_balance * compound_factor;

    let contribution = if monthly_rate == 0.0 {
        remaining / months
    } else {
        remaining / ((compound_factor - 1.0) / monthly_rate)
    };

    contribution.max(0.0)
}

/// Inverts the same identity for `n`. Returns the `0.0` sentinel with
/// `NoForwardSolution` when the goal cannot be reached going forward; a
/// `Solved` zero only ever means the seed balance already meets the goal.
pub fn solve_months(
    initial_balance: f64,
    monthly_rate: f64,
    monthly_contribution: f64,
) -> (f64, SolveStatus) {
    if monthly_rate == 0.0 && monthly_contribution == 0.0 {
        return (0.0, SolveStatus::NoForwardSolution);
    }
    if initial_balance >= GOAL {
        return (0.0, SolveStatus::Solved);
    }

    let months = if monthly_rate == 0.0 {
        (GOAL - initial_balance) / monthly_contribution
    } else {
        let numerator = GOAL * monthly_rate + monthly_contribution;
        let denominator = initial_balance * monthly_rate + monthly_contribution;
        if denominator == 0.0 || numerator / denominator <= 0.0 {
            return (0.0, SolveStatus::NoForwardSolution);
        }
        // ln(numerator / denominator) and ln(1 + r), kept accurate for tiny r.
        let excess = (GOAL - initial_balance) * monthly_rate / denominator;
        excess.ln_1p() / monthly_rate.ln_1p()
    };

    // Negative rates can drain towards a ceiling below the goal, which
    // solves to a negative horizon.
    if !months.is_finite() || months < 0.0 {
        return (0.0, SolveStatus::NoForwardSolution);
    }

    (months, SolveStatus::Solved)
}

fn simulate(
    initial_balance: f64,
    monthly_rate: f64,
    monthly_contribution: f64,
    months: f64,
) -> Simulation {
    let wanted_months = if months.is_finite() {
        months.ceil().max(0.0)
    } else {
        0.0
    };
    let horizon_capped = wanted_months > MAX_SIMULATION_MONTHS as f64;
    let simulated_months = wanted_months.min(MAX_SIMULATION_MONTHS as f64) as u32;
    if horizon_capped {
        tracing::warn!(
            requested_months = wanted_months,
            cap = MAX_SIMULATION_MONTHS,
            "simulation horizon capped"
        );
    }

    let mut balance = initial_balance;
    let mut contributed = initial_balance;
    let mut interest_total = 0.0;
    let mut checkpoints = Vec::with_capacity(simulated_months.div_ceil(12) as usize);

    for month in 1..=simulated_months {
        let interest = round2(balance * monthly_rate);
        balance = round2(balance + interest + monthly_contribution);
        contributed = round2(contributed + monthly_contribution);
        interest_total = round2(interest_total + interest);

        if month % 12 == 0 || month == simulated_months {
            checkpoints.push(YearlyCheckpoint {
                year: month.div_ceil(12),
                invested_amount: round2(contributed - initial_balance),
                interest_cumulative: interest_total,
                total_invested: contributed,
                total_interest: interest_total,
                total_accumulated: balance,
                goal: GOAL,
            });
        }
    }

    Simulation {
        simulated_months,
        horizon_capped,
        total_contributed: contributed,
        total_interest: interest_total,
        total_balance: balance,
        checkpoints,
    }
}

/// Half-up rounding to cents. The epsilon nudge keeps values such as 1.005,
/// stored as 1.00499999..., rounding the way they read.
pub fn round2(value: f64) -> f64 {
    ((value + f64::EPSILON) * 100.0 + 0.5).floor() / 100.0
}
