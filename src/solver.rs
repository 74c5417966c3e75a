//! Solver drivers: turn a validated request into a solved response.
//!
//! Pipeline per request: build the indexed context, post hard and soft
//! constraints, seed a round-robin warm start, run the search under the
//! configured budget, decode the assignment, distribute seat roles and
//! compute the response metadata. If the model is infeasible at the
//! base+2 cap, the cap is relaxed once to base+3 and the solve retried.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Instant;

use chrono::NaiveDate;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::config::Config;
use crate::constraints::{AssignmentVars, HardConstraintBuilder, SlotPlan};
use crate::cp::{Model, Solution, SolveStatus, Solver, SolverParams};
use crate::domain::{DutyContext, InvalidRequestError, SeatCtx, SegmentContext};
use crate::dto::{
    Assignment, DutyType, ScheduleMeta, ScheduleRequest, ScheduleResponse, SeatRole,
    SeniorScheduleRequest,
};
use crate::score::{
    desk_operator_split, segment_desk_operator_split, PenaltyBuilder, SegmentPenaltyBuilder,
};

/// One decoded `(slot, seat, person)` triple.
struct Decoded {
    slot: usize,
    seat: usize,
    person: usize,
}

// ============================================================================
// Duty mode
// ============================================================================

/// Duty-mode roster solver (six duty bands, DESK/OPERATOR on A-shifts).
pub struct SchedulerSolver {
    config: Config,
}

impl SchedulerSolver {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn solve(&self, request: &ScheduleRequest) -> Result<ScheduleResponse, InvalidRequestError> {
        self.solve_with_stop(request, None)
    }

    pub fn solve_with_stop(
        &self,
        request: &ScheduleRequest,
        stop: Option<Arc<AtomicBool>>,
    ) -> Result<ScheduleResponse, InvalidRequestError> {
        let started = Instant::now();
        let ctx = DutyContext::from_request(request)?;
        let mut warnings = Vec::new();

        let (mut solution, mut vars) = self.run(&ctx, ctx.base + 2, stop.clone());
        if solution.status == SolveStatus::Infeasible {
            tracing::warn!(
                "duty model infeasible at base+2; retrying once with the cap relaxed to base+3"
            );
            warnings.push(
                "Per-person cap was relaxed to base+3 to search for a feasible roster."
                    .to_string(),
            );
            let retried = self.run(&ctx, ctx.base + 3, stop);
            solution = retried.0;
            vars = retried.1;
        }

        Ok(self.build_response(&ctx, &vars, &solution, warnings, started))
    }

    fn run(
        &self,
        ctx: &DutyContext,
        max_allowed: i64,
        stop: Option<Arc<AtomicBool>>,
    ) -> (Solution, AssignmentVars) {
        let mut model = Model::new();
        let seat_counts: Vec<usize> = ctx.slots.iter().map(|s| s.seats.len()).collect();
        let vars = AssignmentVars::build(&mut model, ctx.person_count(), &seat_counts);

        let plans: Vec<SlotPlan> = ctx
            .slots
            .iter()
            .map(|s| SlotPlan {
                date: s.date,
                seat_count: s.seats.len(),
                night: s.duty.is_night(),
                morning: s.duty.is_morning(),
            })
            .collect();
        HardConstraintBuilder::new(&mut model, &vars, &plans, &ctx.slots_by_day, &ctx.rank_order)
            .apply(max_allowed);
        PenaltyBuilder::new(&mut model, ctx, &vars, &self.config.weights).apply();

        let slots_chrono = chronological_slots(&ctx.slots_by_day);
        add_warm_start(
            &mut model,
            &vars,
            &slots_chrono,
            &seat_counts,
            &ctx.unavailable,
            &ctx.rank_order,
            ctx.base,
            ctx.total_seats,
            self.config.random_seed,
        );

        let params = SolverParams {
            time_limit: self.config.time_limit(),
            random_seed: self.config.random_seed,
        };
        let solver = match stop {
            Some(flag) => Solver::new(params).with_stop_flag(flag),
            None => Solver::new(params),
        };
        (solver.solve(&model), vars)
    }

    fn build_response(
        &self,
        ctx: &DutyContext,
        vars: &AssignmentVars,
        solution: &Solution,
        mut warnings: Vec<String>,
        started: Instant,
    ) -> ScheduleResponse {
        let mut assignments = Vec::new();
        let mut counts = vec![0i64; ctx.person_count()];
        let mut violations = 0i64;
        let mut max_shifts = 0i64;
        let mut min_shifts = 0i64;
        let mut users_at_base_plus_2 = 0i64;
        let safe_limit = ctx.base + 1;

        if solution.status.is_feasible() {
            let decoded = decode_assignments(vars, solution, ctx.person_count(), &ctx.slots_by_day);
            for d in &decoded {
                counts[d.person] += 1;
            }
            violations = ctx
                .unavailable
                .iter()
                .filter(|&&(p, s)| {
                    vars.person_slot(p, s).iter().any(|&v| solution.value(v))
                })
                .count() as i64;

            let roles_by_slot: Vec<Vec<Option<SeatRole>>> = ctx
                .slots
                .iter()
                .map(|slot| {
                    if slot.duty == DutyType::A {
                        let (desk, operator) = desk_operator_split(slot.seats.len());
                        distribute_roles(&slot.seats, desk, operator)
                            .into_iter()
                            .map(Some)
                            .collect()
                    } else {
                        vec![None; slot.seats.len()]
                    }
                })
                .collect();
            for d in &decoded {
                let slot = &ctx.slots[d.slot];
                assignments.push(Assignment {
                    slot_id: slot.id.clone(),
                    seat_id: slot.seats[d.seat].id.clone(),
                    user_id: ctx.persons[d.person].id.clone(),
                    seat_role: roles_by_slot[d.slot][d.seat],
                    is_extra: counts[d.person] > safe_limit,
                });
            }

            max_shifts = counts.iter().copied().max().unwrap_or(0);
            min_shifts = counts.iter().copied().min().unwrap_or(0);
            users_at_base_plus_2 = counts.iter().filter(|&&c| c > safe_limit).count() as i64;

            if violations > 0 {
                warnings.push(format!(
                    "{violations} assignment(s) had to ignore user unavailability."
                ));
            }
            if users_at_base_plus_2 > 0 {
                warnings.push(format!(
                    "{users_at_base_plus_2} user(s) were pushed to base+2 total shifts."
                ));
            }
            let consecutive = consecutive_3_day_users(ctx.person_count(), &decoded, |slot| {
                ctx.slots[slot].date
            });
            if consecutive > 0 {
                warnings.push(format!(
                    "{consecutive} user(s) had 3+ consecutive days with shifts."
                ));
            }
        } else {
            warnings.push("Solver status: INFEASIBLE. No feasible solution found.".to_string());
            warnings.push(
                "Likely cause: over-constrained unavailability or too few users for the \
                 requested seats."
                    .to_string(),
            );
        }

        ScheduleResponse {
            assignments,
            meta: ScheduleMeta {
                base: ctx.base,
                max_shifts,
                min_shifts,
                total_slots: ctx.slots.len() as i64,
                total_assignments: counts.iter().sum(),
                users_at_base_plus_2,
                unavailability_violations: violations,
                warnings,
                solver_status: solution.status.as_str().to_string(),
                solve_time_ms: started.elapsed().as_secs_f64() * 1000.0,
            },
        }
    }
}

// ============================================================================
// Senior mode
// ============================================================================

/// Senior-mode solver: A-shift MORNING/EVENING half segments only.
pub struct SeniorSchedulerSolver {
    config: Config,
}

impl SeniorSchedulerSolver {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn solve(
        &self,
        request: &SeniorScheduleRequest,
    ) -> Result<ScheduleResponse, InvalidRequestError> {
        self.solve_with_stop(request, None)
    }

    pub fn solve_with_stop(
        &self,
        request: &SeniorScheduleRequest,
        stop: Option<Arc<AtomicBool>>,
    ) -> Result<ScheduleResponse, InvalidRequestError> {
        let started = Instant::now();
        let ctx = SegmentContext::from_request(request)?;
        let mut warnings = Vec::new();

        let (mut solution, mut vars) = self.run(&ctx, ctx.base + 2, stop.clone());
        if solution.status == SolveStatus::Infeasible {
            tracing::warn!(
                "senior model infeasible at base+2; retrying once with the cap relaxed to base+3"
            );
            warnings.push(
                "Per-person cap was relaxed to base+3 to search for a feasible roster."
                    .to_string(),
            );
            let retried = self.run(&ctx, ctx.base + 3, stop);
            solution = retried.0;
            vars = retried.1;
        }

        Ok(self.build_response(&ctx, &vars, &solution, warnings, started))
    }

    fn run(
        &self,
        ctx: &SegmentContext,
        max_allowed: i64,
        stop: Option<Arc<AtomicBool>>,
    ) -> (Solution, AssignmentVars) {
        let mut model = Model::new();
        let seat_counts: Vec<usize> = ctx.slots.iter().map(|s| s.seats.len()).collect();
        let vars = AssignmentVars::build(&mut model, ctx.person_count(), &seat_counts);

        // No night segments exist, so the forbidden-transition rule is a
        // structural no-op here.
        let plans: Vec<SlotPlan> = ctx
            .slots
            .iter()
            .map(|s| SlotPlan {
                date: s.date,
                seat_count: s.seats.len(),
                night: false,
                morning: false,
            })
            .collect();
        HardConstraintBuilder::new(&mut model, &vars, &plans, &ctx.slots_by_day, &ctx.rank_order)
            .apply(max_allowed);
        SegmentPenaltyBuilder::new(&mut model, ctx, &vars, &self.config.weights).apply();

        let slots_chrono = chronological_slots(&ctx.slots_by_day);
        add_warm_start(
            &mut model,
            &vars,
            &slots_chrono,
            &seat_counts,
            &ctx.unavailable,
            &ctx.rank_order,
            ctx.base,
            ctx.total_seats,
            self.config.random_seed,
        );

        let params = SolverParams {
            time_limit: self.config.time_limit(),
            random_seed: self.config.random_seed,
        };
        let solver = match stop {
            Some(flag) => Solver::new(params).with_stop_flag(flag),
            None => Solver::new(params),
        };
        (solver.solve(&model), vars)
    }

    fn build_response(
        &self,
        ctx: &SegmentContext,
        vars: &AssignmentVars,
        solution: &Solution,
        mut warnings: Vec<String>,
        started: Instant,
    ) -> ScheduleResponse {
        let mut assignments = Vec::new();
        let mut counts = vec![0i64; ctx.person_count()];
        let mut violations = 0i64;
        let mut max_shifts = 0i64;
        let mut min_shifts = 0i64;
        let mut users_at_base_plus_2 = 0i64;
        let safe_limit = ctx.base + 1;

        if solution.status.is_feasible() {
            let decoded = decode_assignments(vars, solution, ctx.person_count(), &ctx.slots_by_day);
            for d in &decoded {
                counts[d.person] += 1;
            }
            violations = ctx
                .unavailable
                .iter()
                .filter(|&&(p, s)| {
                    vars.person_slot(p, s).iter().any(|&v| solution.value(v))
                })
                .count() as i64;

            let roles_by_slot: Vec<Vec<SeatRole>> = ctx
                .slots
                .iter()
                .map(|slot| {
                    let (desk, operator) = segment_desk_operator_split(slot.seats.len());
                    distribute_roles(&slot.seats, desk, operator)
                })
                .collect();
            for d in &decoded {
                let slot = &ctx.slots[d.slot];
                assignments.push(Assignment {
                    slot_id: slot.id.clone(),
                    seat_id: slot.seats[d.seat].id.clone(),
                    user_id: ctx.persons[d.person].id.clone(),
                    seat_role: Some(roles_by_slot[d.slot][d.seat]),
                    is_extra: counts[d.person] > safe_limit,
                });
            }

            max_shifts = counts.iter().copied().max().unwrap_or(0);
            min_shifts = counts.iter().copied().min().unwrap_or(0);
            users_at_base_plus_2 = counts.iter().filter(|&&c| c > safe_limit).count() as i64;

            if violations > 0 {
                warnings.push(format!(
                    "{violations} assignment(s) had to ignore senior unavailability."
                ));
            }
            if users_at_base_plus_2 > 0 {
                warnings.push(format!(
                    "{users_at_base_plus_2} senior(s) were pushed to base+2 total segments."
                ));
            }
            let consecutive = consecutive_3_day_users(ctx.person_count(), &decoded, |slot| {
                ctx.slots[slot].date
            });
            if consecutive > 0 {
                warnings.push(format!(
                    "{consecutive} senior(s) had 3+ consecutive days with segments."
                ));
            }
        } else {
            warnings.push("Solver status: INFEASIBLE. No feasible solution found.".to_string());
            warnings.push(
                "Likely cause: over-constrained unavailability or too few users for the \
                 requested seats."
                    .to_string(),
            );
        }

        ScheduleResponse {
            assignments,
            meta: ScheduleMeta {
                base: ctx.base,
                max_shifts,
                min_shifts,
                total_slots: ctx.slots.len() as i64,
                total_assignments: counts.iter().sum(),
                users_at_base_plus_2,
                unavailability_violations: violations,
                warnings,
                solver_status: solution.status.as_str().to_string(),
                solve_time_ms: started.elapsed().as_secs_f64() * 1000.0,
            },
        }
    }
}

// ============================================================================
// Shared pieces
// ============================================================================

fn chronological_slots(slots_by_day: &BTreeMap<NaiveDate, Vec<usize>>) -> Vec<usize> {
    slots_by_day.values().flatten().copied().collect()
}

/// Round-robin warm start, mirroring the production hint: everyone gets
/// base or base+1 targets, seats are filled chronologically by the
/// least-loaded eligible person, avoiding blocked slots when possible.
/// Ties fall back to a seed-derived priority so the start is
/// deterministic per seed.
#[allow(clippy::too_many_arguments)]
fn add_warm_start(
    model: &mut Model,
    vars: &AssignmentVars,
    slots_chrono: &[usize],
    seat_counts: &[usize],
    unavailable: &BTreeSet<(usize, usize)>,
    rank_order: &[usize],
    base: i64,
    total_seats: usize,
    seed: u64,
) {
    let n = rank_order.len();
    if n == 0 {
        return;
    }
    let remainder = total_seats as i64 - base * n as i64;
    let mut targets = vec![base; n];
    for (position, &person) in rank_order.iter().enumerate() {
        if (position as i64) < remainder {
            targets[person] = base + 1;
        }
    }

    let mut priority: Vec<usize> = (0..n).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    priority.shuffle(&mut rng);
    let mut priority_of = vec![0usize; n];
    for (rank, &person) in priority.iter().enumerate() {
        priority_of[person] = rank;
    }

    let mut counts = vec![0i64; n];
    for &slot in slots_chrono {
        let mut taken = vec![false; n];
        for seat in 0..seat_counts[slot] {
            let candidate = (0..n)
                .filter(|&p| !taken[p])
                .min_by_key(|&p| {
                    (
                        counts[p] >= targets[p],
                        unavailable.contains(&(p, slot)),
                        counts[p],
                        priority_of[p],
                    )
                });
            if let Some(person) = candidate {
                taken[person] = true;
                counts[person] += 1;
                model.add_hint(vars.var(person, slot, seat), true);
            }
        }
    }
}

/// Reads the seat-level assignment out of the solved model, in
/// chronological slot order.
fn decode_assignments(
    vars: &AssignmentVars,
    solution: &Solution,
    person_count: usize,
    slots_by_day: &BTreeMap<NaiveDate, Vec<usize>>,
) -> Vec<Decoded> {
    let mut decoded = Vec::new();
    for slot_indices in slots_by_day.values() {
        for &slot in slot_indices {
            let seat_count = vars.person_slot(0, slot).len();
            for seat in 0..seat_count {
                if let Some(person) =
                    (0..person_count).find(|&p| solution.value(vars.var(p, slot, seat)))
                {
                    decoded.push(Decoded { slot, seat, person });
                }
            }
        }
    }
    decoded
}

/// Honors preassigned seat roles, then hands DESK to null-role seats in
/// seat-id order until its quota is met, then OPERATOR.
fn distribute_roles(seats: &[SeatCtx], desk_target: usize, operator_target: usize) -> Vec<SeatRole> {
    let mut roles: Vec<Option<SeatRole>> = seats.iter().map(|s| s.role).collect();
    let desk_pre = roles.iter().filter(|r| **r == Some(SeatRole::Desk)).count();
    let operator_pre = roles
        .iter()
        .filter(|r| **r == Some(SeatRole::Operator))
        .count();
    let mut desk_remaining = desk_target.saturating_sub(desk_pre);
    let mut operator_remaining = operator_target.saturating_sub(operator_pre);

    let mut open: Vec<usize> = seats
        .iter()
        .enumerate()
        .filter(|(_, s)| s.role.is_none())
        .map(|(i, _)| i)
        .collect();
    open.sort_by(|&a, &b| seats[a].id.cmp(&seats[b].id));

    for index in open {
        let role = if desk_remaining > 0 {
            desk_remaining -= 1;
            SeatRole::Desk
        } else if operator_remaining > 0 {
            operator_remaining -= 1;
            SeatRole::Operator
        } else {
            SeatRole::Operator
        };
        roles[index] = Some(role);
    }
    roles
        .into_iter()
        .map(|r| r.unwrap_or(SeatRole::Operator))
        .collect()
}

/// How many persons work three or more consecutive calendar days.
fn consecutive_3_day_users(
    person_count: usize,
    decoded: &[Decoded],
    date_of_slot: impl Fn(usize) -> NaiveDate,
) -> i64 {
    let mut dates: Vec<BTreeSet<NaiveDate>> = vec![BTreeSet::new(); person_count];
    for d in decoded {
        dates[d.person].insert(date_of_slot(d.slot));
    }
    dates
        .iter()
        .filter(|days| {
            let days: Vec<NaiveDate> = days.iter().copied().collect();
            days.windows(3).any(|w| {
                (w[1] - w[0]).num_days() == 1 && (w[2] - w[1]).num_days() == 1
            })
        })
        .count() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seat(id: &str, role: Option<SeatRole>) -> SeatCtx {
        SeatCtx {
            id: id.to_string(),
            index: 0,
            role,
        }
    }

    #[test]
    fn test_distribute_roles_all_null() {
        let seats = vec![
            seat("s1", None),
            seat("s2", None),
            seat("s3", None),
            seat("s4", None),
        ];
        let roles = distribute_roles(&seats, 2, 2);
        assert_eq!(
            roles,
            vec![
                SeatRole::Desk,
                SeatRole::Desk,
                SeatRole::Operator,
                SeatRole::Operator
            ]
        );
    }

    #[test]
    fn test_distribute_roles_honors_preassigned() {
        // Table for 3 seats is (1 desk, 2 operator); the preassigned
        // operator consumes one operator slot.
        let seats = vec![
            seat("a", Some(SeatRole::Operator)),
            seat("b", None),
            seat("c", None),
        ];
        let roles = distribute_roles(&seats, 1, 2);
        assert_eq!(
            roles,
            vec![SeatRole::Operator, SeatRole::Desk, SeatRole::Operator]
        );
    }

    #[test]
    fn test_distribute_roles_orders_null_seats_by_id() {
        let seats = vec![seat("z", None), seat("a", None)];
        let roles = distribute_roles(&seats, 1, 1);
        // "a" sorts first and takes DESK even though it is listed second.
        assert_eq!(roles, vec![SeatRole::Operator, SeatRole::Desk]);
    }

    #[test]
    fn test_distribute_roles_over_preassigned_falls_back() {
        let seats = vec![
            seat("a", Some(SeatRole::Desk)),
            seat("b", Some(SeatRole::Desk)),
            seat("c", None),
        ];
        // Targets (1, 2): desk already over quota, open seat goes operator.
        let roles = distribute_roles(&seats, 1, 2);
        assert_eq!(roles[2], SeatRole::Operator);
    }
}
