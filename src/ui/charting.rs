use itertools::{Itertools, MinMaxResult};

/// X (test number) and Y (WPM) bounds for the history chart. Y snaps
/// outward to multiples of ten; X always spans at least one step.
pub fn compute_chart_params(wpm_coords: &[(f64, f64)]) -> ([f64; 2], [f64; 2]) {
    let x_max = wpm_coords.last().map_or(2.0, |p| p.0).max(2.0);

    let y = match wpm_coords.iter().map(|p| p.1).minmax_by(|a, b| a.total_cmp(b)) {
        MinMaxResult::NoElements => [0.0, 10.0],
        MinMaxResult::OneElement(v) => [snap_down(v), snap_up(v)],
        MinMaxResult::MinMax(lo, hi) => [snap_down(lo), snap_up(hi)],
    };

    ([1.0, x_max], y)
}

fn snap_down(v: f64) -> f64 {
    ((v / 10.0).floor() * 10.0).max(0.0)
}

fn snap_up(v: f64) -> f64 {
    ((v / 10.0).floor() + 1.0) * 10.0
}

/// Format a simple numeric label consistently
pub fn format_label(val: f64) -> String {
    if (val - val.round()).abs() < f64::EPSILON {
        format!("{}", val.round())
    } else {
        format!("{val:.2}")
    }
}
