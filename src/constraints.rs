//! Hard constraints: rules the solver may never violate.
//!
//! Both scheduling modes share this builder; the senior mode simply has
//! no night or morning slots, which turns the forbidden-transition rule
//! into a no-op.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::cp::{BoolVar, Model};

/// One boolean per `(person, slot, seat)` triple.
#[derive(Debug)]
pub struct AssignmentVars {
    x: Vec<Vec<Vec<BoolVar>>>,
}

impl AssignmentVars {
    pub fn build(model: &mut Model, person_count: usize, seat_counts: &[usize]) -> Self {
        let x = (0..person_count)
            .map(|_| {
                seat_counts
                    .iter()
                    .map(|&seats| (0..seats).map(|_| model.new_bool()).collect())
                    .collect()
            })
            .collect();
        Self { x }
    }

    #[inline]
    pub fn var(&self, person: usize, slot: usize, seat: usize) -> BoolVar {
        self.x[person][slot][seat]
    }

    /// All seat variables of one person in one slot.
    #[inline]
    pub fn person_slot(&self, person: usize, slot: usize) -> &[BoolVar] {
        &self.x[person][slot]
    }

    /// Every variable of one person, across all slots.
    pub fn person_all(&self, person: usize) -> Vec<BoolVar> {
        self.x[person].iter().flatten().copied().collect()
    }

    /// The candidate variables of one seat, persons in the given order.
    pub fn seat_candidates(&self, slot: usize, seat: usize, order: &[usize]) -> Vec<BoolVar> {
        order.iter().map(|&p| self.x[p][slot][seat]).collect()
    }

    pub fn person_count(&self) -> usize {
        self.x.len()
    }
}

/// Mode-neutral slot description for constraint building.
#[derive(Debug, Clone)]
pub struct SlotPlan {
    pub date: NaiveDate,
    pub seat_count: usize,
    /// Duty ends the next morning (C/F).
    pub night: bool,
    /// Duty starts in the morning (A/D).
    pub morning: bool,
}

/// Posts the inviolable rules onto the model.
pub struct HardConstraintBuilder<'a> {
    model: &'a mut Model,
    vars: &'a AssignmentVars,
    slots: &'a [SlotPlan],
    slots_by_day: &'a BTreeMap<NaiveDate, Vec<usize>>,
    /// Person candidate order inside every seat group.
    rank_order: &'a [usize],
}

impl<'a> HardConstraintBuilder<'a> {
    pub fn new(
        model: &'a mut Model,
        vars: &'a AssignmentVars,
        slots: &'a [SlotPlan],
        slots_by_day: &'a BTreeMap<NaiveDate, Vec<usize>>,
        rank_order: &'a [usize],
    ) -> Self {
        Self {
            model,
            vars,
            slots,
            slots_by_day,
            rank_order,
        }
    }

    pub fn apply(&mut self, max_shifts_allowed: i64) {
        self.seat_exclusivity();
        self.single_occupancy_per_slot();
        self.daily_cap();
        self.total_cap(max_shifts_allowed);
        self.forbidden_transitions();
        self.coverage();
    }

    /// Every seat is taken by exactly one person. Groups are registered
    /// chronologically, which is also the solver's branching order.
    fn seat_exclusivity(&mut self) {
        for slot_indices in self.slots_by_day.values() {
            for &slot in slot_indices {
                for seat in 0..self.slots[slot].seat_count {
                    let group = self.vars.seat_candidates(slot, seat, self.rank_order);
                    self.model.add_exactly_one(group);
                }
            }
        }
    }

    /// A person occupies at most one seat of a given slot.
    fn single_occupancy_per_slot(&mut self) {
        for person in 0..self.vars.person_count() {
            for slot in 0..self.slots.len() {
                if self.slots[slot].seat_count >= 2 {
                    self.model.add_at_most(self.vars.person_slot(person, slot), 1);
                }
            }
        }
    }

    /// At most two shifts per person per calendar day.
    fn daily_cap(&mut self) {
        for slot_indices in self.slots_by_day.values() {
            for person in 0..self.vars.person_count() {
                let day_vars: Vec<BoolVar> = slot_indices
                    .iter()
                    .flat_map(|&slot| self.vars.person_slot(person, slot))
                    .copied()
                    .collect();
                if day_vars.len() > 2 {
                    self.model.add_at_most(&day_vars, 2);
                }
            }
        }
    }

    /// Nobody exceeds the allowed total for the period.
    fn total_cap(&mut self, max_shifts_allowed: i64) {
        for person in 0..self.vars.person_count() {
            let all = self.vars.person_all(person);
            self.model.add_at_most(&all, max_shifts_allowed);
        }
    }

    /// No morning duty (A/D) the day after a night duty (C/F).
    fn forbidden_transitions(&mut self) {
        let days: Vec<NaiveDate> = self.slots_by_day.keys().copied().collect();
        for window in days.windows(2) {
            let (today, tomorrow) = (window[0], window[1]);
            if (tomorrow - today).num_days() != 1 {
                continue;
            }
            let night_slots: Vec<usize> = self.slots_by_day[&today]
                .iter()
                .copied()
                .filter(|&s| self.slots[s].night)
                .collect();
            let morning_slots: Vec<usize> = self.slots_by_day[&tomorrow]
                .iter()
                .copied()
                .filter(|&s| self.slots[s].morning)
                .collect();
            if night_slots.is_empty() || morning_slots.is_empty() {
                continue;
            }
            for person in 0..self.vars.person_count() {
                for &night in &night_slots {
                    for &morning in &morning_slots {
                        let mut pair: Vec<BoolVar> =
                            self.vars.person_slot(person, night).to_vec();
                        pair.extend_from_slice(self.vars.person_slot(person, morning));
                        self.model.add_at_most(&pair, 1);
                    }
                }
            }
        }
    }

    /// Redundant per-slot coverage equality; follows from seat
    /// exclusivity but gives the search an early global check.
    fn coverage(&mut self) {
        for slot in 0..self.slots.len() {
            let all: Vec<BoolVar> = (0..self.vars.person_count())
                .flat_map(|person| self.vars.person_slot(person, slot))
                .copied()
                .collect();
            self.model.add_exactly(&all, self.slots[slot].seat_count as i64);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cp::{Solver, SolverParams};
    use std::time::Duration;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 12, day).unwrap()
    }

    fn params() -> SolverParams {
        SolverParams {
            time_limit: Duration::from_secs(5),
            random_seed: 42,
        }
    }

    #[test]
    fn test_forbidden_transition_excludes_same_person() {
        // Day 1: night slot, day 2: morning slot, two persons.
        let slots = vec![
            SlotPlan {
                date: date(1),
                seat_count: 1,
                night: true,
                morning: false,
            },
            SlotPlan {
                date: date(2),
                seat_count: 1,
                night: false,
                morning: true,
            },
        ];
        let mut slots_by_day = BTreeMap::new();
        slots_by_day.insert(date(1), vec![0]);
        slots_by_day.insert(date(2), vec![1]);
        let rank_order = vec![0, 1];

        let mut model = Model::new();
        let vars = AssignmentVars::build(&mut model, 2, &[1, 1]);
        HardConstraintBuilder::new(&mut model, &vars, &slots, &slots_by_day, &rank_order)
            .apply(10);

        let solution = Solver::new(params()).solve(&model);
        assert!(solution.status.is_feasible());
        let night_person = (0..2).find(|&p| solution.value(vars.var(p, 0, 0))).unwrap();
        let morning_person = (0..2).find(|&p| solution.value(vars.var(p, 1, 0))).unwrap();
        assert_ne!(night_person, morning_person);
    }

    #[test]
    fn test_daily_cap_makes_three_slots_infeasible_for_one_person() {
        // Three single-seat slots on one day, one person: cap of two.
        let slots: Vec<SlotPlan> = (0..3)
            .map(|_| SlotPlan {
                date: date(1),
                seat_count: 1,
                night: false,
                morning: false,
            })
            .collect();
        let mut slots_by_day = BTreeMap::new();
        slots_by_day.insert(date(1), vec![0, 1, 2]);
        let rank_order = vec![0];

        let mut model = Model::new();
        let vars = AssignmentVars::build(&mut model, 1, &[1, 1, 1]);
        HardConstraintBuilder::new(&mut model, &vars, &slots, &slots_by_day, &rank_order)
            .apply(10);

        let solution = Solver::new(params()).solve(&model);
        assert_eq!(solution.status, crate::cp::SolveStatus::Infeasible);
    }

    #[test]
    fn test_total_cap_limits_assignments() {
        // Four slots over four days, one person, cap 3: infeasible.
        let slots: Vec<SlotPlan> = (0..4)
            .map(|i| SlotPlan {
                date: date(i + 1),
                seat_count: 1,
                night: false,
                morning: false,
            })
            .collect();
        let mut slots_by_day = BTreeMap::new();
        for i in 0..4usize {
            slots_by_day.insert(date(i as u32 + 1), vec![i]);
        }
        let rank_order = vec![0];

        let mut model = Model::new();
        let vars = AssignmentVars::build(&mut model, 1, &[1, 1, 1, 1]);
        HardConstraintBuilder::new(&mut model, &vars, &slots, &slots_by_day, &rank_order)
            .apply(3);

        let solution = Solver::new(params()).solve(&model);
        assert_eq!(solution.status, crate::cp::SolveStatus::Infeasible);
    }
}
