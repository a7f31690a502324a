//! A basic example: fit a circle to noisy points.
use gnls::{BacktrackingArmijo, Config, FnResidual, GaussNewton, least_squares};

/// Parameters are (center x, center y, radius).
type Circle = [f64; 3];

fn main() {
    // Points roughly on a circle of radius 2 centred at (1, -1).
    let points = vec![
        (3.02, -1.0),
        (1.0, 0.98),
        (-1.01, -1.0),
        (1.0, -3.03),
        (2.41, 0.43),
        (-0.43, -2.4),
    ];

    // One residual per point: its distance from the center, minus the radius.
    let f = FnResidual::new(
        |c: &Circle, pts: &Vec<(f64, f64)>| {
            let r: Vec<f64> = pts
                .iter()
                .map(|(x, y)| (x - c[0]).hypot(y - c[1]) - c[2])
                .collect();
            (r, ())
        },
        |c: &Circle, pts: &Vec<(f64, f64)>, dc: &Circle| {
            pts.iter()
                .map(|(x, y)| {
                    let d = (x - c[0]).hypot(y - c[1]);
                    -(x - c[0]) / d * dc[0] - (y - c[1]) / d * dc[1] - dc[2]
                })
                .collect::<Vec<f64>>()
        },
    );

    let solver = GaussNewton::new(1e-10, 1e-10).with_line_search(BacktrackingArmijo::default());

    // Start from a rough guess.
    match least_squares(&f, &solver, [0.0, 0.0, 1.0], &points, Config::default()) {
        Ok(solution) => {
            let [cx, cy, radius] = *solution.value();
            println!("center = ({cx:.3}, {cy:.3}), radius = {radius:.3}");
            println!("converged in {} steps", solution.num_steps());
        }
        Err(e) => {
            eprintln!("Could not fit circle: {}", e.error);
        }
    }
}
