use crate::{
    Results,
    norm::Norm,
    tree::{Scalar, Tree},
};

/// Cauchy-style stopping test: has both the iterate and the objective stopped moving?
///
/// Stops immediately, returning `result` unchanged, if `result` is already a failure.
/// Otherwise converged means both
/// - `norm(diff / (atol + rtol * |y|)) < 1`, and
/// - `|f_val - f_prev| < atol + rtol * |f_val|`.
///
/// A NaN anywhere in either test counts as not converged.
#[allow(clippy::too_many_arguments)]
pub fn cauchy_termination<Y: Tree>(
    rtol: Scalar,
    atol: Scalar,
    norm: Norm,
    y: &Y,
    diff: &Y,
    f_val: Scalar,
    f_prev: Scalar,
    result: Results,
) -> (bool, Results) {
    if !result.is_successful() {
        return (true, result);
    }
    let scaled = diff.zip_map(y, |d, yi| d / (atol + rtol * yi.abs()));
    let y_converged = norm.apply(&scaled) < 1.0;
    let f_converged = (f_val - f_prev).abs() < atol + rtol * f_val.abs();
    (y_converged && f_converged, result)
}
