//! Constraint model: boolean decision variables, linear constraints,
//! exactly-one decision groups and max-expression auxiliary variables.
//!
//! The model is passive data; [`crate::cp::solver::Solver`] consumes it.

/// A boolean decision variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BoolVar(pub(crate) u32);

impl BoolVar {
    #[inline]
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// An auxiliary integer variable defined as the maximum of a set of
/// linear expressions.
///
/// With a non-negative objective coefficient the solver always settles it
/// at exactly that maximum, which is how soft-penalty hinges such as
/// `max(0, count - limit)` are linearized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MaxVar(pub(crate) u32);

impl MaxVar {
    #[inline]
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// A linear expression over boolean variables, max-variables and a
/// constant offset.
#[derive(Debug, Clone, Default)]
pub struct LinearExpr {
    pub(crate) bools: Vec<(BoolVar, i64)>,
    pub(crate) maxes: Vec<(MaxVar, i64)>,
    pub(crate) constant: i64,
}

impl LinearExpr {
    /// A constant expression.
    pub fn constant(value: i64) -> Self {
        Self {
            constant: value,
            ..Self::default()
        }
    }

    /// The unweighted sum of the given booleans.
    pub fn sum(vars: &[BoolVar]) -> Self {
        Self {
            bools: vars.iter().map(|&v| (v, 1)).collect(),
            ..Self::default()
        }
    }

    /// A single weighted boolean term.
    pub fn term(var: BoolVar, coefficient: i64) -> Self {
        Self {
            bools: vec![(var, coefficient)],
            ..Self::default()
        }
    }

    /// A single weighted max-variable term.
    pub fn max_term(var: MaxVar, coefficient: i64) -> Self {
        Self {
            maxes: vec![(var, coefficient)],
            ..Self::default()
        }
    }

    /// Adds a weighted boolean term in place.
    pub fn push(&mut self, var: BoolVar, coefficient: i64) {
        self.bools.push((var, coefficient));
    }

    /// Returns the expression shifted by a constant.
    pub fn offset(mut self, delta: i64) -> Self {
        self.constant += delta;
        self
    }
}

/// `lo <= sum(terms) <= hi` over boolean variables.
#[derive(Debug, Clone)]
pub(crate) struct LinearConstraint {
    pub terms: Vec<(BoolVar, i64)>,
    pub lo: i64,
    pub hi: i64,
}

/// Definition of a [`MaxVar`]: its value is the maximum over `exprs`.
#[derive(Debug, Clone)]
pub(crate) struct MaxDef {
    pub exprs: Vec<LinearExpr>,
}

/// A constraint model under construction.
#[derive(Debug, Default)]
pub struct Model {
    pub(crate) num_bools: u32,
    pub(crate) constraints: Vec<LinearConstraint>,
    /// Exactly-one groups, in registration order. The solver branches on
    /// these groups first, in this order.
    pub(crate) groups: Vec<Vec<BoolVar>>,
    pub(crate) in_group: Vec<bool>,
    pub(crate) max_defs: Vec<MaxDef>,
    pub(crate) objective: LinearExpr,
    pub(crate) hints: Vec<Option<bool>>,
}

impl Model {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a fresh boolean variable.
    pub fn new_bool(&mut self) -> BoolVar {
        let var = BoolVar(self.num_bools);
        self.num_bools += 1;
        self.in_group.push(false);
        self.hints.push(None);
        var
    }

    pub fn num_bools(&self) -> usize {
        self.num_bools as usize
    }

    /// Posts `lo <= sum(terms) <= hi`.
    pub fn add_linear(&mut self, terms: Vec<(BoolVar, i64)>, lo: i64, hi: i64) {
        debug_assert!(lo <= hi, "empty linear constraint bounds [{lo}, {hi}]");
        self.constraints.push(LinearConstraint { terms, lo, hi });
    }

    /// Posts `sum(vars) <= hi`.
    pub fn add_at_most(&mut self, vars: &[BoolVar], hi: i64) {
        self.add_linear(vars.iter().map(|&v| (v, 1)).collect(), 0, hi);
    }

    /// Posts `sum(vars) == n`.
    pub fn add_exactly(&mut self, vars: &[BoolVar], n: i64) {
        self.add_linear(vars.iter().map(|&v| (v, 1)).collect(), n, n);
    }

    /// Posts `sum(vars) == 1` and registers the set as a decision group.
    ///
    /// A variable may belong to at most one group; groups drive the
    /// solver's branching order.
    pub fn add_exactly_one(&mut self, vars: Vec<BoolVar>) {
        assert!(!vars.is_empty(), "exactly-one group must not be empty");
        for &v in &vars {
            assert!(
                !self.in_group[v.index()],
                "variable {v:?} already belongs to a decision group"
            );
            self.in_group[v.index()] = true;
        }
        self.add_exactly(&vars, 1);
        self.groups.push(vars);
    }

    /// Creates an auxiliary variable whose value is the maximum of the
    /// given expressions.
    ///
    /// Expressions may reference previously created max-variables, which
    /// keeps evaluation a single forward pass.
    pub fn new_max_var(&mut self, exprs: Vec<LinearExpr>) -> MaxVar {
        assert!(!exprs.is_empty(), "max variable needs at least one expression");
        let next = self.max_defs.len() as u32;
        for expr in &exprs {
            for (m, _) in &expr.maxes {
                assert!(
                    m.0 < next,
                    "max variable expressions may only reference earlier max variables"
                );
            }
        }
        self.max_defs.push(MaxDef { exprs });
        MaxVar(next)
    }

    /// Convenience: `max(0, expr)`, the positive-part hinge used by all
    /// penalty linearizations.
    pub fn new_pos_part(&mut self, expr: LinearExpr) -> MaxVar {
        self.new_max_var(vec![expr, LinearExpr::constant(0)])
    }

    /// Adds an expression to the minimized objective.
    ///
    /// Coefficients on max-variables must be non-negative; boolean
    /// coefficients may be negative (bonuses).
    pub fn add_objective(&mut self, expr: LinearExpr) {
        for &(m, c) in &expr.maxes {
            assert!(
                c >= 0,
                "objective coefficient on {m:?} must be non-negative, got {c}"
            );
        }
        self.objective.bools.extend(expr.bools);
        self.objective.maxes.extend(expr.maxes);
        self.objective.constant += expr.constant;
    }

    /// Suggests a value for a variable; the solver tries hinted values
    /// first when branching.
    pub fn add_hint(&mut self, var: BoolVar, value: bool) {
        self.hints[var.index()] = Some(value);
    }

    pub(crate) fn hint(&self, var: BoolVar) -> Option<bool> {
        self.hints[var.index()]
    }

    /// Evaluates a linear expression at a complete assignment, given the
    /// already-computed max-variable values.
    pub(crate) fn eval_expr(expr: &LinearExpr, values: &[bool], max_values: &[i64]) -> i64 {
        let mut total = expr.constant;
        for &(b, c) in &expr.bools {
            if values[b.index()] {
                total += c;
            }
        }
        for &(m, c) in &expr.maxes {
            total += c * max_values[m.index()];
        }
        total
    }

    /// Evaluates the objective at a complete assignment.
    pub(crate) fn objective_value(&self, values: &[bool]) -> i64 {
        let mut max_values = vec![0i64; self.max_defs.len()];
        for (i, def) in self.max_defs.iter().enumerate() {
            let mut best = i64::MIN;
            for expr in &def.exprs {
                best = best.max(Self::eval_expr(expr, values, &max_values));
            }
            max_values[i] = best;
        }
        Self::eval_expr(&self.objective, values, &max_values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expr_builders() {
        let mut model = Model::new();
        let a = model.new_bool();
        let b = model.new_bool();

        let expr = LinearExpr::sum(&[a, b]).offset(-1);
        assert_eq!(expr.bools.len(), 2);
        assert_eq!(expr.constant, -1);
    }

    #[test]
    fn test_objective_value_with_max_vars() {
        let mut model = Model::new();
        let a = model.new_bool();
        let b = model.new_bool();

        // hinge = max(0, a + b - 1)
        let hinge = model.new_pos_part(LinearExpr::sum(&[a, b]).offset(-1));
        model.add_objective(LinearExpr::max_term(hinge, 100));
        model.add_objective(LinearExpr::term(a, -5));

        assert_eq!(model.objective_value(&[false, false]), 0);
        assert_eq!(model.objective_value(&[true, false]), -5);
        assert_eq!(model.objective_value(&[true, true]), 95);
    }

    #[test]
    fn test_layered_max_vars() {
        let mut model = Model::new();
        let a = model.new_bool();
        let b = model.new_bool();

        // day indicators, then an and-like window over them
        let ya = model.new_max_var(vec![LinearExpr::term(a, 1), LinearExpr::constant(0)]);
        let yb = model.new_max_var(vec![LinearExpr::term(b, 1), LinearExpr::constant(0)]);
        let mut window = LinearExpr::constant(-1);
        window.maxes.push((ya, 1));
        window.maxes.push((yb, 1));
        let both = model.new_pos_part(window);
        model.add_objective(LinearExpr::max_term(both, 7));

        assert_eq!(model.objective_value(&[true, false]), 0);
        assert_eq!(model.objective_value(&[true, true]), 7);
    }

    #[test]
    #[should_panic(expected = "already belongs to a decision group")]
    fn test_double_group_membership_panics() {
        let mut model = Model::new();
        let a = model.new_bool();
        let b = model.new_bool();
        model.add_exactly_one(vec![a, b]);
        model.add_exactly_one(vec![a]);
    }
}
