use sparsolve::algo::{DogLeg, LevenbergMarquardt};
use sparsolve::testing::{ExtendedRosenbrock, TestProblem};

fn main() -> Result<(), String> {
    let mut f = ExtendedRosenbrock::new(1000);
    let tolerance = 1e-12;

    let mut p = f.initials()[0].clone();
    let mut solver = LevenbergMarquardt::new(&f);
    solver.options_mut().set_tolerance(tolerance);

    let report = solver
        .solve_with_monitor(&mut f, &mut p, |iter, error| {
            println!("iter = {}\terror = {}", iter, error);
            true
        })
        .map_err(|error| format!("{error}"))?;

    println!(
        "levenberg-marquardt: {:?} after {} iterations",
        report.status(),
        report.iterations()
    );

    let mut p = f.initials()[0].clone();
    let mut solver = DogLeg::new(&f);
    solver.options_mut().set_tolerance(tolerance);

    let report = solver
        .solve(&mut f, &mut p)
        .map_err(|error| format!("{error}"))?;

    println!(
        "dog leg: {:?} after {} iterations",
        report.status(),
        report.iterations()
    );

    if report.status().is_converged() && f.is_optimum(&p, 1e-9) {
        Ok(())
    } else {
        Err("did not converge".to_string())
    }
}
