//! Soft objective: weighted penalty terms minimized by the solver.
//!
//! Weights form an effectively lexicographic hierarchy; any violation at
//! a higher tier dominates plausible combinations of lower-tier terms.
//! Every deviation/dispersion term is linearized as a positive-part
//! hinge `max(0, expr)` with a non-negative objective weight, so tier
//! splits stack: the cost of the k-th unit over a bound is the sum of
//! the hinge weights active at k.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};

use crate::config::PenaltyWeights;
use crate::constraints::AssignmentVars;
use crate::cp::{BoolVar, LinearExpr, MaxVar, Model};
use crate::domain::{block_category, DutyContext, SegmentContext};
use crate::dto::{DutyType, Segment};

// ============================================================================
// Duty mode
// ============================================================================

pub struct PenaltyBuilder<'a> {
    model: &'a mut Model,
    ctx: &'a DutyContext,
    vars: &'a AssignmentVars,
    weights: &'a PenaltyWeights,
}

impl<'a> PenaltyBuilder<'a> {
    pub fn new(
        model: &'a mut Model,
        ctx: &'a DutyContext,
        vars: &'a AssignmentVars,
        weights: &'a PenaltyWeights,
    ) -> Self {
        Self {
            model,
            ctx,
            vars,
            weights,
        }
    }

    pub fn apply(&mut self) {
        // Tier 1
        self.unavailability_penalties();
        self.ideal_deviation_penalties();
        self.zero_shift_penalties();
        // Tier 2
        self.consecutive_day_penalties();
        // Tier 3
        self.duty_type_fairness();
        self.night_fairness();
        self.weekend_slot_fairness();
        // Tier 4
        self.weekly_clustering();
        self.two_shifts_same_day();
        self.consecutive_night_penalties();
        // Tier 5
        self.preference_terms();
    }

    /// Heaviest soft rule: assigning a blocked slot anyway. The
    /// tie-breaker lowers the price for the person who blocked the most
    /// slots of that category, so when everyone blocked a slot the
    /// heaviest closer is placed first. A second hinge escalates repeat
    /// violations on the same person so forced breaches spread out.
    fn unavailability_penalties(&mut self) {
        for &(person, slot) in &self.ctx.unavailable {
            let cat = block_category(self.ctx.slots[slot].duty);
            let fairness_extra = (self.ctx.max_blocked_by_category[cat]
                - self.ctx.blocked_by_category[person][cat])
                * self.weights.unavailability_fairness;
            let coefficient = self.weights.unavailability + fairness_extra;
            for &var in self.vars.person_slot(person, slot) {
                self.model.add_objective(LinearExpr::term(var, coefficient));
            }
        }

        for person in 0..self.ctx.person_count() {
            let blocked_vars: Vec<BoolVar> = self
                .ctx
                .unavailable
                .iter()
                .filter(|&&(p, _)| p == person)
                .flat_map(|&(_, s)| self.vars.person_slot(person, s))
                .copied()
                .collect();
            if blocked_vars.len() < 2 {
                continue;
            }
            let repeats = self
                .model
                .new_pos_part(LinearExpr::sum(&blocked_vars).offset(-1));
            self.model.add_objective(LinearExpr::max_term(
                repeats,
                self.weights.unavailability_repeat,
            ));
        }
    }

    /// Deviation from the per-person ideal: a soft slope on every unit,
    /// the history-fairness slope on every unit, and a heavy tier once
    /// the deviation passes 2. Under-assignment beyond 2 is priced above
    /// over-assignment beyond 2 on purpose.
    fn ideal_deviation_penalties(&mut self) {
        for person in 0..self.ctx.person_count() {
            let all = self.vars.person_all(person);
            let ideal = self.ctx.ideals[person];

            let over = self
                .model
                .new_pos_part(LinearExpr::sum(&all).offset(-ideal));
            let under = self.model.new_pos_part(negated_sum(&all, ideal));
            for hinge in [over, under] {
                self.model
                    .add_objective(LinearExpr::max_term(hinge, self.weights.ideal_soft));
                self.model
                    .add_objective(LinearExpr::max_term(hinge, self.weights.history_fairness));
            }

            let over_strong = self
                .model
                .new_pos_part(LinearExpr::sum(&all).offset(-(ideal + 2)));
            self.model.add_objective(LinearExpr::max_term(
                over_strong,
                (self.weights.above_ideal_strong - self.weights.ideal_soft).max(0),
            ));
            let under_strong = self.model.new_pos_part(negated_sum(&all, ideal - 2));
            self.model.add_objective(LinearExpr::max_term(
                under_strong,
                (self.weights.below_ideal_strong - self.weights.ideal_soft).max(0),
            ));
        }
    }

    /// Nobody should sit out the whole period.
    fn zero_shift_penalties(&mut self) {
        for person in 0..self.ctx.person_count() {
            let all = self.vars.person_all(person);
            let is_zero = self.model.new_pos_part(negated_sum(&all, 1));
            self.model
                .add_objective(LinearExpr::max_term(is_zero, self.weights.zero_shifts));
        }
    }

    fn consecutive_day_penalties(&mut self) {
        for person in 0..self.ctx.person_count() {
            let by_day = self.person_vars_by_day(person, |_| true);
            let indicators = presence_indicators(self.model, &by_day);
            penalize_consecutive_runs(self.model, &indicators, self.weights.consecutive_days);
        }
    }

    fn duty_type_fairness(&mut self) {
        for duty in [DutyType::A, DutyType::B, DutyType::C] {
            self.category_fairness(|d| d == duty, self.weights.duty_type_fairness);
        }
    }

    fn night_fairness(&mut self) {
        self.category_fairness(|d| d.is_night(), self.weights.night_fairness);
    }

    fn weekend_slot_fairness(&mut self) {
        for duty in [DutyType::D, DutyType::E, DutyType::F] {
            self.category_fairness(|d| d == duty, self.weights.weekend_slot_fairness);
        }
    }

    /// Per-person absolute deviation from the rounded ideal share of a
    /// slot category.
    fn category_fairness(&mut self, select: impl Fn(DutyType) -> bool, weight: i64) {
        let slots: Vec<usize> = self
            .ctx
            .slots
            .iter()
            .filter(|s| select(s.duty))
            .map(|s| s.index)
            .collect();
        if slots.is_empty() || weight == 0 {
            return;
        }
        let total: usize = slots.iter().map(|&s| self.ctx.slots[s].seats.len()).sum();
        let target = rounded_share(total, self.ctx.person_count());
        for person in 0..self.ctx.person_count() {
            let vars: Vec<BoolVar> = slots
                .iter()
                .flat_map(|&s| self.vars.person_slot(person, s))
                .copied()
                .collect();
            deviation_penalty(self.model, &vars, target, weight);
        }
    }

    fn weekly_clustering(&mut self) {
        let mut weeks: BTreeMap<(i32, u32), Vec<usize>> = BTreeMap::new();
        for slot in &self.ctx.slots {
            weeks.entry(iso_week_key(slot.date)).or_default().push(slot.index);
        }
        for person in 0..self.ctx.person_count() {
            for slot_indices in weeks.values() {
                let vars: Vec<BoolVar> = slot_indices
                    .iter()
                    .flat_map(|&s| self.vars.person_slot(person, s))
                    .copied()
                    .collect();
                if vars.len() <= 2 {
                    continue;
                }
                let excess = self.model.new_pos_part(LinearExpr::sum(&vars).offset(-2));
                self.model.add_objective(LinearExpr::max_term(
                    excess,
                    self.weights.weekly_clustering,
                ));
            }
        }
    }

    /// Comfort nudge: spreading across days beats doubling up, when the
    /// rest of the objective is indifferent.
    fn two_shifts_same_day(&mut self) {
        for person in 0..self.ctx.person_count() {
            for slot_indices in self.ctx.slots_by_day.values() {
                let vars: Vec<BoolVar> = slot_indices
                    .iter()
                    .flat_map(|&s| self.vars.person_slot(person, s))
                    .copied()
                    .collect();
                if vars.len() < 2 {
                    continue;
                }
                let doubled = self.model.new_pos_part(LinearExpr::sum(&vars).offset(-1));
                self.model.add_objective(LinearExpr::max_term(
                    doubled,
                    self.weights.two_shifts_same_day,
                ));
            }
        }
    }

    fn consecutive_night_penalties(&mut self) {
        for person in 0..self.ctx.person_count() {
            let by_day = self.person_vars_by_day(person, |d| d.is_night());
            let indicators = presence_indicators(self.model, &by_day);
            penalize_adjacent_pairs(self.model, &indicators, self.weights.consecutive_nights);
        }
    }

    fn preference_terms(&mut self) {
        for person in &self.ctx.persons {
            for slot in &self.ctx.slots {
                if person.dislikes_weekend && slot.duty.is_weekend() {
                    for &var in self.vars.person_slot(person.index, slot.index) {
                        self.model
                            .add_objective(LinearExpr::term(var, self.weights.dislikes_weekend));
                    }
                }
                if person.likes_night && slot.duty.is_night() {
                    for &var in self.vars.person_slot(person.index, slot.index) {
                        self.model
                            .add_objective(LinearExpr::term(var, -self.weights.likes_night));
                    }
                }
            }
        }
    }

    fn person_vars_by_day(
        &self,
        person: usize,
        select: impl Fn(DutyType) -> bool,
    ) -> BTreeMap<NaiveDate, Vec<BoolVar>> {
        let mut by_day: BTreeMap<NaiveDate, Vec<BoolVar>> = BTreeMap::new();
        for (day, slot_indices) in &self.ctx.slots_by_day {
            let vars: Vec<BoolVar> = slot_indices
                .iter()
                .filter(|&&s| select(self.ctx.slots[s].duty))
                .flat_map(|&s| self.vars.person_slot(person, s))
                .copied()
                .collect();
            if !vars.is_empty() {
                by_day.insert(*day, vars);
            }
        }
        by_day
    }
}

// ============================================================================
// Senior mode
// ============================================================================

pub struct SegmentPenaltyBuilder<'a> {
    model: &'a mut Model,
    ctx: &'a SegmentContext,
    vars: &'a AssignmentVars,
    weights: &'a PenaltyWeights,
}

impl<'a> SegmentPenaltyBuilder<'a> {
    pub fn new(
        model: &'a mut Model,
        ctx: &'a SegmentContext,
        vars: &'a AssignmentVars,
        weights: &'a PenaltyWeights,
    ) -> Self {
        Self {
            model,
            ctx,
            vars,
            weights,
        }
    }

    pub fn apply(&mut self) {
        self.unavailability_penalties();
        self.overload_penalties();
        self.consecutive_day_penalties();
        self.segment_fairness();
        self.history_fairness();
        self.weekly_clustering();
        self.full_day_penalties();
        self.preference_terms();
    }

    fn unavailability_penalties(&mut self) {
        for &(person, slot) in &self.ctx.unavailable {
            for &var in self.vars.person_slot(person, slot) {
                self.model
                    .add_objective(LinearExpr::term(var, self.weights.unavailability));
            }
        }
    }

    /// Being pushed to base+2 is heavily penalized; the hard cap already
    /// forbids base+3.
    fn overload_penalties(&mut self) {
        let safe_limit = self.ctx.base + 1;
        for person in 0..self.ctx.person_count() {
            let all = self.vars.person_all(person);
            let excess = self
                .model
                .new_pos_part(LinearExpr::sum(&all).offset(-safe_limit));
            self.model.add_objective(LinearExpr::max_term(
                excess,
                self.weights.above_ideal_strong,
            ));
        }
    }

    fn consecutive_day_penalties(&mut self) {
        for person in 0..self.ctx.person_count() {
            let by_day = self.person_vars_by_day(person, |_| true);
            let indicators = presence_indicators(self.model, &by_day);
            penalize_consecutive_runs(self.model, &indicators, self.weights.consecutive_days);
        }
    }

    /// One combined dispersion term over both segments: each person's
    /// current-period segment count against the common rounded share.
    fn segment_fairness(&mut self) {
        let n = self.ctx.person_count();
        if n < 2 {
            return;
        }
        let target = rounded_share(self.ctx.total_seats, n);
        for person in 0..n {
            let all = self.vars.person_all(person);
            deviation_penalty(self.model, &all, target, self.weights.segment_fairness);
        }
    }

    /// Long-run A balance: all-time half-A count plus this period's
    /// assignments, measured against the rounded common share.
    fn history_fairness(&mut self) {
        let n = self.ctx.person_count();
        if n < 2 {
            return;
        }
        let history_total: i64 = self.ctx.persons.iter().map(|p| p.count_a_all_time).sum();
        let target = rounded_share_i64(history_total + self.ctx.total_seats as i64, n);
        for person in &self.ctx.persons {
            let all = self.vars.person_all(person.index);
            let over = self
                .model
                .new_pos_part(LinearExpr::sum(&all).offset(person.count_a_all_time - target));
            let under = self
                .model
                .new_pos_part(negated_sum(&all, target - person.count_a_all_time));
            self.model
                .add_objective(LinearExpr::max_term(over, self.weights.history_fairness));
            self.model
                .add_objective(LinearExpr::max_term(under, self.weights.history_fairness));
        }
    }

    fn weekly_clustering(&mut self) {
        let mut weeks: BTreeMap<(i32, u32), Vec<usize>> = BTreeMap::new();
        for slot in &self.ctx.slots {
            weeks.entry(iso_week_key(slot.date)).or_default().push(slot.index);
        }
        for person in 0..self.ctx.person_count() {
            for slot_indices in weeks.values() {
                let vars: Vec<BoolVar> = slot_indices
                    .iter()
                    .flat_map(|&s| self.vars.person_slot(person, s))
                    .copied()
                    .collect();
                if vars.len() <= 2 {
                    continue;
                }
                let excess = self.model.new_pos_part(LinearExpr::sum(&vars).offset(-2));
                self.model.add_objective(LinearExpr::max_term(
                    excess,
                    self.weights.weekly_clustering,
                ));
            }
        }
    }

    /// Morning plus evening on the same day.
    fn full_day_penalties(&mut self) {
        for person in 0..self.ctx.person_count() {
            let mornings = self.person_vars_by_day(person, |seg| seg == Segment::Morning);
            let evenings = self.person_vars_by_day(person, |seg| seg == Segment::Evening);
            let morning_ind = presence_indicators(self.model, &mornings);
            let evening_ind = presence_indicators(self.model, &evenings);
            for (day, &m) in &morning_ind {
                let Some(&e) = evening_ind.get(day) else {
                    continue;
                };
                let mut expr = LinearExpr::constant(-1);
                expr.maxes.push((m, 1));
                expr.maxes.push((e, 1));
                let both = self.model.new_pos_part(expr);
                self.model
                    .add_objective(LinearExpr::max_term(both, self.weights.full_day));
            }
        }
    }

    fn preference_terms(&mut self) {
        for person in &self.ctx.persons {
            for slot in &self.ctx.slots {
                let bonus = match slot.segment {
                    Segment::Morning if person.likes_morning => self.weights.likes_morning,
                    Segment::Evening if person.likes_evening => self.weights.likes_evening,
                    _ => continue,
                };
                for &var in self.vars.person_slot(person.index, slot.index) {
                    self.model.add_objective(LinearExpr::term(var, -bonus));
                }
            }
        }
    }

    fn person_vars_by_day(
        &self,
        person: usize,
        select: impl Fn(Segment) -> bool,
    ) -> BTreeMap<NaiveDate, Vec<BoolVar>> {
        let mut by_day: BTreeMap<NaiveDate, Vec<BoolVar>> = BTreeMap::new();
        for (day, slot_indices) in &self.ctx.slots_by_day {
            let vars: Vec<BoolVar> = slot_indices
                .iter()
                .filter(|&&s| select(self.ctx.slots[s].segment))
                .flat_map(|&s| self.vars.person_slot(person, s))
                .copied()
                .collect();
            if !vars.is_empty() {
                by_day.insert(*day, vars);
            }
        }
        by_day
    }
}

// ============================================================================
// Shared helpers
// ============================================================================

/// `constant - sum(vars)` as a linear expression.
fn negated_sum(vars: &[BoolVar], constant: i64) -> LinearExpr {
    let mut expr = LinearExpr::constant(constant);
    for &v in vars {
        expr.push(v, -1);
    }
    expr
}

/// Adds `weight * |sum(vars) - target|` via an over/under hinge pair.
fn deviation_penalty(model: &mut Model, vars: &[BoolVar], target: i64, weight: i64) {
    let over = model.new_pos_part(LinearExpr::sum(vars).offset(-target));
    let under = model.new_pos_part(negated_sum(vars, target));
    model.add_objective(LinearExpr::max_term(over, weight));
    model.add_objective(LinearExpr::max_term(under, weight));
}

/// One 0/1 indicator per day: "person works at all on this day".
fn presence_indicators(
    model: &mut Model,
    by_day: &BTreeMap<NaiveDate, Vec<BoolVar>>,
) -> BTreeMap<NaiveDate, MaxVar> {
    by_day
        .iter()
        .map(|(&day, vars)| {
            let exprs = vars.iter().map(|&v| LinearExpr::term(v, 1)).collect();
            (day, model.new_max_var(exprs))
        })
        .collect()
}

/// Penalizes every window of three consecutive calendar days that are
/// all worked.
fn penalize_consecutive_runs(
    model: &mut Model,
    indicators: &BTreeMap<NaiveDate, MaxVar>,
    weight: i64,
) {
    let days: Vec<NaiveDate> = indicators.keys().copied().collect();
    for window in days.windows(3) {
        if (window[1] - window[0]).num_days() != 1 || (window[2] - window[1]).num_days() != 1 {
            continue;
        }
        let mut expr = LinearExpr::constant(-2);
        for day in window {
            expr.maxes.push((indicators[day], 1));
        }
        let run = model.new_pos_part(expr);
        model.add_objective(LinearExpr::max_term(run, weight));
    }
}

/// Penalizes adjacent day pairs that are both worked (night runs).
fn penalize_adjacent_pairs(
    model: &mut Model,
    indicators: &BTreeMap<NaiveDate, MaxVar>,
    weight: i64,
) {
    let days: Vec<NaiveDate> = indicators.keys().copied().collect();
    for window in days.windows(2) {
        if (window[1] - window[0]).num_days() != 1 {
            continue;
        }
        let mut expr = LinearExpr::constant(-1);
        expr.maxes.push((indicators[&window[0]], 1));
        expr.maxes.push((indicators[&window[1]], 1));
        let pair = model.new_pos_part(expr);
        model.add_objective(LinearExpr::max_term(pair, weight));
    }
}

fn iso_week_key(date: NaiveDate) -> (i32, u32) {
    let week = date.iso_week();
    (week.year(), week.week())
}

fn rounded_share(total: usize, persons: usize) -> i64 {
    rounded_share_i64(total as i64, persons)
}

fn rounded_share_i64(total: i64, persons: usize) -> i64 {
    if persons == 0 {
        return 0;
    }
    (total as f64 / persons as f64).round() as i64
}

// ============================================================================
// DESK/OPERATOR distribution
// ============================================================================

/// Duty-mode split of an A-shift with `n` filled seats.
pub fn desk_operator_split(n: usize) -> (usize, usize) {
    match n {
        0 => (0, 0),
        1 => (0, 1),
        2 => (1, 1),
        3 => (1, 2),
        4 => (2, 2),
        5 => (3, 2),
        6 => (3, 3),
        7 => (4, 3),
        _ => (n.div_ceil(2), n / 2),
    }
}

/// Senior-mode split of an A-segment with `n` filled seats.
pub fn segment_desk_operator_split(n: usize) -> (usize, usize) {
    match n {
        0 => (0, 0),
        1 => (0, 1),
        2 => (1, 1),
        3 => (2, 1),
        _ => {
            let desk = (2 * n).div_ceil(3);
            (desk, n - desk)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_desk_operator_table() {
        assert_eq!(desk_operator_split(0), (0, 0));
        assert_eq!(desk_operator_split(1), (0, 1));
        assert_eq!(desk_operator_split(2), (1, 1));
        assert_eq!(desk_operator_split(3), (1, 2));
        assert_eq!(desk_operator_split(4), (2, 2));
        assert_eq!(desk_operator_split(5), (3, 2));
        assert_eq!(desk_operator_split(6), (3, 3));
        assert_eq!(desk_operator_split(7), (4, 3));
        assert_eq!(desk_operator_split(8), (4, 4));
        assert_eq!(desk_operator_split(9), (5, 4));
    }

    #[test]
    fn test_segment_desk_operator_table() {
        assert_eq!(segment_desk_operator_split(1), (0, 1));
        assert_eq!(segment_desk_operator_split(2), (1, 1));
        assert_eq!(segment_desk_operator_split(3), (2, 1));
        assert_eq!(segment_desk_operator_split(4), (3, 1));
        assert_eq!(segment_desk_operator_split(6), (4, 2));
    }

    #[test]
    fn test_rounded_share() {
        assert_eq!(rounded_share(10, 4), 3); // 2.5 rounds away from zero
        assert_eq!(rounded_share(9, 3), 3);
        assert_eq!(rounded_share(1, 4), 0);
        assert_eq!(rounded_share(0, 3), 0);
    }

    #[test]
    fn test_iso_week_key_rolls_over_year() {
        // 2025-12-29 belongs to ISO week 1 of 2026.
        let key = iso_week_key(NaiveDate::from_ymd_opt(2025, 12, 29).unwrap());
        assert_eq!(key, (2026, 1));
        let key = iso_week_key(NaiveDate::from_ymd_opt(2025, 12, 28).unwrap());
        assert_eq!(key.0, 2025);
    }
}
