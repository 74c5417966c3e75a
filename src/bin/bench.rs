//! Solve a generated demo instance and print solver statistics.
//!
//! Run with: cargo run --release --bin bench

use std::time::Instant;

use duty_scheduling::config::Config;
use duty_scheduling::demo_data::{self, DemoData, DemoRequest};
use duty_scheduling::solver::SchedulerSolver;

fn main() {
    let DemoRequest::Duty(request) = demo_data::generate(DemoData::Large) else {
        unreachable!("LARGE is a duty request");
    };

    println!("Benchmark: duty roster solve");
    println!("  Users: {}", request.users.len());
    println!("  Slots: {}", request.slots.len());
    println!(
        "  Seats: {}",
        request.slots.iter().map(|s| s.seats.len()).sum::<usize>()
    );
    println!();

    let mut config = Config::default();
    config.time_limit_seconds = 10;
    let solver = SchedulerSolver::new(config);

    let started = Instant::now();
    let response = solver.solve(&request).expect("demo request must be valid");
    let elapsed = started.elapsed();

    println!("Results:");
    println!("  Status: {}", response.meta.solver_status);
    println!("  Assignments: {}", response.assignments.len());
    println!("  Base: {}", response.meta.base);
    println!(
        "  Shifts per user: {}..{}",
        response.meta.min_shifts, response.meta.max_shifts
    );
    println!(
        "  Unavailability violations: {}",
        response.meta.unavailability_violations
    );
    println!("  Time: {:.2?}", elapsed);
    for warning in &response.meta.warnings {
        println!("  Warning: {warning}");
    }
}
