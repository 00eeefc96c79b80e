use criterion::{criterion_group, criterion_main, Criterion};
use sparsolve::{
    algo::{BiCgStab, ConjugateGradient, DogLeg, LevenbergMarquardt},
    nalgebra as na,
    testing::*,
    SparseProblem,
};

const MAX_ITERS: usize = 1000;
const TOLERANCE: f64 = 1e-12;

fn solve_lm<P: TestProblem<Field = f64>>(f: &mut P, mut p: na::DVector<f64>) -> bool {
    let mut solver = LevenbergMarquardt::new(f);
    solver
        .options_mut()
        .set_max_iters(MAX_ITERS)
        .set_tolerance(TOLERANCE);

    match solver.solve(f, &mut p) {
        Ok(report) => report.status().is_converged(),
        Err(_) => false,
    }
}

fn solve_dl<P: TestProblem<Field = f64>>(f: &mut P, mut p: na::DVector<f64>) -> bool {
    let mut solver = DogLeg::new(f);
    solver
        .options_mut()
        .set_max_iters(MAX_ITERS)
        .set_tolerance(TOLERANCE);

    match solver.solve(f, &mut p) {
        Ok(report) => report.status().is_converged(),
        Err(_) => false,
    }
}

fn linear_spd(c: &mut Criterion) {
    let a = random_spd(10_000, 5, 3);
    let b = random_vector(10_000, 4);

    let mut solver = ConjugateGradient::new();
    solver
        .options_mut()
        .set_max_iters(MAX_ITERS)
        .set_tolerance(1e-8);

    c.bench_function("cg spd 10000", |bench| {
        bench.iter(|| {
            let mut x = na::DVector::zeros(b.len());
            assert!(solver.solve(&a, &b, &mut x).unwrap().status().is_converged())
        })
    });

    let mut solver = BiCgStab::new();
    solver
        .options_mut()
        .set_max_iters(MAX_ITERS)
        .set_tolerance(1e-8);

    c.bench_function("bicgstab spd 10000", |bench| {
        bench.iter(|| {
            let mut x = na::DVector::zeros(b.len());
            assert!(solver.solve(&a, &b, &mut x).unwrap().status().is_converged())
        })
    });
}

fn linear_non_symmetric(c: &mut Criterion) {
    let a = random_diagonally_dominant(10_000, 5, 5);
    let b = random_vector(10_000, 6);

    let mut solver = BiCgStab::new();
    solver
        .options_mut()
        .set_max_iters(MAX_ITERS)
        .set_tolerance(1e-8);

    c.bench_function("bicgstab non-symmetric 10000", |bench| {
        bench.iter(|| {
            let mut x = na::DVector::zeros(b.len());
            assert!(solver.solve(&a, &b, &mut x).unwrap().status().is_converged())
        })
    });
}

fn rosenbrock_large(c: &mut Criterion) {
    let mut f = ExtendedRosenbrock::new(1000);
    let p = f.initials()[0].clone();

    c.bench_function("levenberg-marquardt rosenbrock 1000", |b| {
        b.iter(|| assert!(solve_lm(&mut f, p.clone())))
    });

    c.bench_function("dog leg rosenbrock 1000", |b| {
        b.iter(|| assert!(solve_dl(&mut f, p.clone())))
    });
}

fn powell(c: &mut Criterion) {
    let mut f = ExtendedPowell::new(400);
    let p = f.initials()[0].clone();

    c.bench_function("levenberg-marquardt powell 400", |b| {
        b.iter(|| solve_lm(&mut f, p.clone()))
    });

    c.bench_function("dog leg powell 400", |b| {
        b.iter(|| solve_dl(&mut f, p.clone()))
    });
}

fn linear_least_squares(c: &mut Criterion) {
    let mut f = LinearProblem::random(2000, 1000, 11);
    let p = na::DVector::zeros(f.input_size());

    c.bench_function("levenberg-marquardt linear 2000x1000", |b| {
        b.iter(|| assert!(solve_lm(&mut f, p.clone())))
    });

    c.bench_function("dog leg linear 2000x1000", |b| {
        b.iter(|| assert!(solve_dl(&mut f, p.clone())))
    });
}

criterion_group!(
    solvers,
    linear_spd,
    linear_non_symmetric,
    rosenbrock_large,
    powell,
    linear_least_squares,
);
criterion_main!(solvers);
