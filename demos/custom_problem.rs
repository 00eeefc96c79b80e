use sparsolve::nalgebra as na;
use sparsolve::{solve_levenberg_marquardt, ProblemError, SparseProblem};
use na::DVector;

// A chain of points in the plane connected by springs of unit rest length.
// The first and the last point are pinned, every other point is free. The
// parameters are the coordinates [x0, y0, x1, y1, ...].
struct SpringChain {
    points: usize,
    end: (f64, f64),
}

impl SpringChain {
    fn springs(&self) -> usize {
        self.points - 1
    }
}

impl SparseProblem for SpringChain {
    type Field = f64;

    fn input_size(&self) -> usize {
        2 * self.points
    }

    fn output_size(&self) -> usize {
        // Spring elongations followed by pins of both ends.
        self.springs() + 4
    }

    fn constraint(&self) -> DVector<Self::Field> {
        let mut c = DVector::zeros(self.output_size());
        let s = self.springs();
        c[s + 2] = self.end.0;
        c[s + 3] = self.end.1;
        c
    }

    fn evaluate(
        &self,
        p: &DVector<Self::Field>,
        fx: &mut DVector<Self::Field>,
    ) -> Result<(), ProblemError> {
        let s = self.springs();

        for i in 0..s {
            let dx = p[2 * i + 2] - p[2 * i];
            let dy = p[2 * i + 3] - p[2 * i + 1];
            fx[i] = (dx * dx + dy * dy).sqrt() - 1.0;
        }

        fx[s] = p[0];
        fx[s + 1] = p[1];
        fx[s + 2] = p[2 * s];
        fx[s + 3] = p[2 * s + 1];

        Ok(())
    }

    fn differentiate(
        &self,
        index: usize,
        p: &DVector<Self::Field>,
        derivative: &mut Vec<(usize, Self::Field)>,
    ) -> Result<(), ProblemError> {
        let s = self.springs();

        if index < s {
            let i = index;
            let dx = p[2 * i + 2] - p[2 * i];
            let dy = p[2 * i + 3] - p[2 * i + 1];
            let length = (dx * dx + dy * dy).sqrt();

            if length == 0.0 {
                return Err(ProblemError::InvalidValue);
            }

            derivative.push((2 * i, -dx / length));
            derivative.push((2 * i + 1, -dy / length));
            derivative.push((2 * i + 2, dx / length));
            derivative.push((2 * i + 3, dy / length));
        } else {
            let col = match index - s {
                0 => 0,
                1 => 1,
                2 => 2 * s,
                _ => 2 * s + 1,
            };
            derivative.push((col, 1.0));
        }

        Ok(())
    }
}

fn main() -> Result<(), String> {
    // The ends are closer than the length of the chain, so the chain bends.
    let mut f = SpringChain {
        points: 200,
        end: (150.0, 0.0),
    };

    // Straight line between the ends with a small bump to pick a direction.
    let n = f.points;
    let mut p = DVector::zeros(f.input_size());
    for i in 0..n {
        let t = i as f64 / (n - 1) as f64;
        p[2 * i] = t * f.end.0;
        p[2 * i + 1] = (t * std::f64::consts::PI).sin();
    }

    let mut monitor = |iter: usize, error: f64| {
        println!("iter = {}\terror = {}", iter, error);
        true
    };

    let report = solve_levenberg_marquardt(&mut f, &mut p, 200, 1e-14, Some(&mut monitor))
        .map_err(|error| format!("{error}"))?;

    println!(
        "{:?} after {} iterations, error = {}",
        report.status(),
        report.iterations(),
        report.error()
    );

    let sag = (0..n)
        .map(|i| p[2 * i + 1])
        .fold(f64::NEG_INFINITY, f64::max);
    println!("maximum height of the chain = {}", sag);

    if report.error() <= 1e-8 {
        Ok(())
    } else {
        Err("did not converge".to_string())
    }
}
