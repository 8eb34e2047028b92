use crate::core::models::analysis::SeriesStatistics;

/// Reduces a finished series to its summary statistics.
///
/// Returns `None` for an empty series. The variance is the sample variance
/// `n/(n-1) * (E[x^2] - E[x]^2)`, 0 for a single sample and clamped at 0
/// against rounding.
pub fn reduce(series: &[f64]) -> Option<SeriesStatistics> {
    if series.is_empty() {
        return None;
    }
    let n = series.len() as f64;

    let mut sum = 0.0;
    let mut sum_sq = 0.0;
    let mut log_sum = 0.0;
    let mut inv_sum = 0.0;
    let mut positive = true;
    let mut nonzero = true;
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;

    for &x in series {
        sum += x;
        sum_sq += x * x;
        min = min.min(x);
        max = max.max(x);
        if x > 0.0 {
            log_sum += x.ln();
        } else {
            positive = false;
        }
        if x == 0.0 {
            nonzero = false;
        } else {
            inv_sum += 1.0 / x;
        }
    }

    let arithmetic_mean = sum / n;
    let quadratic_mean = (sum_sq / n).sqrt();
    let geometric_mean = positive.then(|| (log_sum / n).exp());
    let harmonic_mean = nonzero.then(|| n / inv_sum);

    let variance = if series.len() > 1 {
        (n / (n - 1.0) * (sum_sq / n - arithmetic_mean * arithmetic_mean)).max(0.0)
    } else {
        0.0
    };
    let std_dev = variance.sqrt();

    Some(SeriesStatistics {
        count: series.len(),
        arithmetic_mean,
        geometric_mean,
        harmonic_mean,
        quadratic_mean,
        min,
        max,
        range: max - min,
        midrange: (max + min) / 2.0,
        median: median(series),
        variance,
        std_dev,
        std_error: std_dev / n.sqrt(),
    })
}

fn median(series: &[f64]) -> f64 {
    let mut sorted = series.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        sorted[mid]
    } else {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    }
}
