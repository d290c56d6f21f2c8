//! Closed-form classification of the long-run regime of the SVI model.
//!
//! The regime is chosen by walking an ordered rule table; the first rule whose
//! predicate holds decides the regime and builds the steady state. The
//! predicates overlap, so table order is part of the semantics.

use crate::model::{Compartments, Parameters};
use log::debug;
use serde::{Deserialize, Serialize};

/// Qualitative long-run behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Regime {
    /// R0 < 1: the disease dies out whatever the vaccination rate.
    AlwaysDiseaseFree,
    AlwaysEndemic,
    /// Disease-free and endemic equilibria are both locally stable.
    Bistable,
    /// The state stays at its initial condition.
    Neutral,
    /// The disease dies out because of vaccination.
    VaccinationDiseaseFree,
}

impl Regime {
    pub fn description(&self) -> &'static str {
        match self {
            Regime::AlwaysDiseaseFree => "always disease-free regardless of vaccination",
            Regime::AlwaysEndemic => "always endemic",
            Regime::Bistable => "both disease-free and endemic equilibria locally stable",
            Regime::Neutral => "neutral",
            Regime::VaccinationDiseaseFree => "disease-free as a result of vaccination",
        }
    }
}

/// The rule of the classification table that produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Branch {
    SubcriticalTransmission,
    UnvaccinatedEndemic,
    UnvaccinatedNeutral,
    PerfectVaccineEndemic,
    ImperfectVaccineEndemic,
    Bistable,
    CriticalNeutral,
    VaccinationDiseaseFree,
}

impl Branch {
    pub fn regime(&self) -> Regime {
        match self {
            Branch::SubcriticalTransmission => Regime::AlwaysDiseaseFree,
            Branch::UnvaccinatedEndemic
            | Branch::PerfectVaccineEndemic
            | Branch::ImperfectVaccineEndemic => Regime::AlwaysEndemic,
            Branch::UnvaccinatedNeutral | Branch::CriticalNeutral => Regime::Neutral,
            Branch::Bistable => Regime::Bistable,
            Branch::VaccinationDiseaseFree => Regime::VaccinationDiseaseFree,
        }
    }
}

/// A steady-state value: one equilibrium, or the disease-free and endemic
/// members of a bistable pair (in that order).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SteadyState {
    Single(f64),
    Pair(f64, f64),
}

impl SteadyState {
    pub fn len(&self) -> usize {
        match self {
            SteadyState::Single(_) => 1,
            SteadyState::Pair(..) => 2,
        }
    }

    pub fn get(&self, index: usize) -> Option<f64> {
        match (self, index) {
            (SteadyState::Single(x), 0) => Some(*x),
            (SteadyState::Pair(a, _), 0) => Some(*a),
            (SteadyState::Pair(_, b), 1) => Some(*b),
            _ => None,
        }
    }

    pub fn values(&self) -> Vec<f64> {
        match self {
            SteadyState::Single(x) => vec![*x],
            SteadyState::Pair(a, b) => vec![*a, *b],
        }
    }

    pub fn map(self, f: impl Fn(f64) -> f64) -> SteadyState {
        match self {
            SteadyState::Single(x) => SteadyState::Single(f(x)),
            SteadyState::Pair(a, b) => SteadyState::Pair(f(a), f(b)),
        }
    }

    /// Elementwise combination; a single value broadcasts against a pair.
    pub fn zip_with(self, other: SteadyState, f: impl Fn(f64, f64) -> f64) -> SteadyState {
        match (self, other) {
            (SteadyState::Single(x), SteadyState::Single(y)) => SteadyState::Single(f(x, y)),
            (SteadyState::Single(x), SteadyState::Pair(a, b)) => {
                SteadyState::Pair(f(x, a), f(x, b))
            }
            (SteadyState::Pair(a, b), SteadyState::Single(y)) => {
                SteadyState::Pair(f(a, y), f(b, y))
            }
            (SteadyState::Pair(a, b), SteadyState::Pair(c, d)) => {
                SteadyState::Pair(f(a, c), f(b, d))
            }
        }
    }
}

/// Derived quantities shared by the rule predicates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub r0: f64,
    pub r0_phi: f64,
    pub b: f64,
    pub inequality1: bool,
    pub inequality2: bool,
}

impl Thresholds {
    pub fn compute(params: &Parameters) -> Self {
        let Parameters {
            beta,
            gamma,
            theta,
            sigma,
            phi,
        } = *params;

        let effective_waning = theta + sigma * phi;
        let leak = gamma * sigma * (1.0 - sigma) * phi;
        let lower = gamma - effective_waning / sigma + (2.0 / sigma) * leak.sqrt();
        let upper = gamma * (theta + phi) / effective_waning;

        Self {
            r0: params.basic_reproduction_number(),
            r0_phi: params.vaccine_reproduction_number(),
            b: sigma * (beta - gamma) - effective_waning,
            inequality1: effective_waning * effective_waning < leak,
            inequality2: lower < beta && beta < upper,
        }
    }
}

/// Result of classifying one parameter set and initial condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub r0: f64,
    pub r0_phi: f64,
    pub regime: Regime,
    pub branch: Branch,
    pub s_star: SteadyState,
    pub v_star: SteadyState,
    pub i_star: SteadyState,
    pub i0: f64,
    pub v0: f64,
    pub thresholds: Thresholds,
}

impl Classification {
    pub fn is_neutral(&self) -> bool {
        self.regime == Regime::Neutral
    }

    /// Steady states as compartment triples, disease-free first for pairs.
    pub fn equilibria(&self) -> Vec<Compartments> {
        (0..self.i_star.len())
            .filter_map(|k| {
                Some(Compartments::new(
                    self.s_star.get(k)?,
                    self.v_star.get(k)?,
                    self.i_star.get(k)?,
                ))
            })
            .collect()
    }

    /// Index and distance of the steady state closest to `state`.
    pub fn nearest_equilibrium(&self, state: &Compartments) -> Option<(usize, f64)> {
        self.equilibria()
            .iter()
            .map(|eq| eq.distance(state))
            .enumerate()
            .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
    }
}

struct RuleInput {
    params: Parameters,
    thresholds: Thresholds,
    initial: Compartments,
}

impl RuleInput {
    fn unvaccinated(&self) -> bool {
        self.params.phi == 0.0 || self.thresholds.r0_phi.is_nan()
    }

    fn disease_free_vaccinated(&self) -> f64 {
        let Parameters { theta, phi, .. } = self.params;
        if phi + theta > 0.0 {
            phi / (phi + theta)
        } else {
            0.0
        }
    }

    /// B / (2 beta sigma): the vertex of the endemic quadratic in I. Off the
    /// true endemic root whenever the discriminant term is non-zero.
    fn endemic_infected(&self) -> f64 {
        let Parameters { beta, sigma, .. } = self.params;
        self.thresholds.b / (2.0 * beta * sigma)
    }

    fn endemic_vaccinated(&self) -> f64 {
        let Parameters {
            beta,
            theta,
            sigma,
            phi,
            ..
        } = self.params;
        let b = self.thresholds.b;
        // Suspect: an older transcription groups the leading factor as
        // (phi / beta) * sigma. Kept as phi / (beta * sigma) until checked
        // against the source paper.
        (phi / (beta * sigma)) * ((2.0 * beta * sigma - b) / (b + 2.0 * (theta + phi)))
    }
}

struct Outcome {
    i_star: SteadyState,
    v_star: SteadyState,
}

struct Rule {
    branch: Branch,
    applies: fn(&RuleInput) -> bool,
    outcome: fn(&RuleInput) -> Outcome,
}

fn disease_free(input: &RuleInput) -> Outcome {
    Outcome {
        i_star: SteadyState::Single(0.0),
        v_star: SteadyState::Single(input.disease_free_vaccinated()),
    }
}

fn frozen(input: &RuleInput) -> Outcome {
    Outcome {
        i_star: SteadyState::Single(input.initial.i),
        v_star: SteadyState::Single(input.initial.v),
    }
}

static RULES: [Rule; 8] = [
    Rule {
        branch: Branch::SubcriticalTransmission,
        applies: |input| input.thresholds.r0 < 1.0,
        outcome: disease_free,
    },
    Rule {
        branch: Branch::UnvaccinatedEndemic,
        applies: |input| input.unvaccinated() && input.thresholds.r0 > 1.0,
        outcome: |input| Outcome {
            i_star: SteadyState::Single(1.0 - 1.0 / input.thresholds.r0),
            v_star: SteadyState::Single(0.0),
        },
    },
    Rule {
        branch: Branch::UnvaccinatedNeutral,
        applies: RuleInput::unvaccinated,
        outcome: frozen,
    },
    Rule {
        branch: Branch::PerfectVaccineEndemic,
        applies: |input| input.thresholds.r0_phi > 1.0 && input.params.sigma == 0.0,
        outcome: |input| {
            let Parameters { theta, phi, .. } = input.params;
            let r0 = input.thresholds.r0;
            Outcome {
                i_star: SteadyState::Single(1.0 - (1.0 / r0) * (1.0 + phi / theta)),
                v_star: SteadyState::Single(phi / (r0 * theta)),
            }
        },
    },
    Rule {
        branch: Branch::ImperfectVaccineEndemic,
        applies: |input| input.thresholds.r0_phi > 1.0,
        outcome: |input| Outcome {
            i_star: SteadyState::Single(input.endemic_infected()),
            v_star: SteadyState::Single(input.endemic_vaccinated()),
        },
    },
    Rule {
        branch: Branch::Bistable,
        applies: |input| input.thresholds.inequality1 && input.thresholds.inequality2,
        outcome: |input| Outcome {
            i_star: SteadyState::Pair(0.0, input.endemic_infected()),
            v_star: SteadyState::Pair(input.disease_free_vaccinated(), input.endemic_vaccinated()),
        },
    },
    Rule {
        branch: Branch::CriticalNeutral,
        applies: |input| input.thresholds.r0 == 1.0 && input.thresholds.r0_phi == 1.0,
        outcome: frozen,
    },
    Rule {
        branch: Branch::VaccinationDiseaseFree,
        applies: |_| true,
        outcome: disease_free,
    },
];

/// Classifies the long-run regime without integrating the model.
///
/// Never fails: degenerate rates (gamma = 0, theta = phi = 0, sigma = 0) are
/// routed to the branch their limiting values select.
pub fn classify(params: &Parameters, initial: &Compartments) -> Classification {
    let thresholds = Thresholds::compute(params);
    let input = RuleInput {
        params: *params,
        thresholds,
        initial: *initial,
    };

    // The last rule always applies.
    let rule = RULES
        .iter()
        .find(|rule| (rule.applies)(&input))
        .unwrap_or(&RULES[RULES.len() - 1]);
    let Outcome { i_star, v_star } = (rule.outcome)(&input);
    let s_star = i_star.zip_with(v_star, |i, v| 1.0 - i - v);

    debug!(
        "classified as {:?} via {:?} (R0 = {}, R0_phi = {}, B = {})",
        rule.branch.regime(),
        rule.branch,
        thresholds.r0,
        thresholds.r0_phi,
        thresholds.b
    );

    Classification {
        r0: thresholds.r0,
        r0_phi: thresholds.r0_phi,
        regime: rule.branch.regime(),
        branch: rule.branch,
        s_star,
        v_star,
        i_star,
        i0: initial.i,
        v0: initial.v,
        thresholds,
    }
}
