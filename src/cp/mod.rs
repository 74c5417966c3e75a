//! A small constraint-programming engine in the CP-SAT mold.
//!
//! The scheduling drivers build a [`Model`] of boolean assignment
//! variables, post hard linear constraints and penalty linearizations,
//! then run the deterministic branch-and-bound [`Solver`]. Statuses
//! mirror CP-SAT: a proven optimum, the best incumbent at the budget, or
//! proven infeasibility.

mod model;
mod solver;

pub use model::{BoolVar, LinearExpr, MaxVar, Model};
pub use solver::{Solution, SolveStats, SolveStatus, Solver, SolverParams};
