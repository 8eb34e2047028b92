use crate::core::models::analysis::AnalysisResult;
use itertools::Itertools;

/// Fills the Pearson correlation matrix of a result.
///
/// Every entry starts as `None`; an off-diagonal pair gets a coefficient only
/// when both series have statistics, the same produced length, and a nonzero
/// population variance. The matrix is symmetric.
pub fn build(result: &mut AnalysisResult) {
    let n = result.sources.len();
    let mut matrix = vec![vec![None; n]; n];

    for (i, j) in (0..n).tuple_combinations() {
        let r = pearson(result, i, j);
        matrix[i][j] = r;
        matrix[j][i] = r;
    }

    for (dsref, row) in result.sources.iter_mut().zip(matrix) {
        dsref.set_correlation(row);
    }
}

fn pearson(result: &AnalysisResult, i: usize, j: usize) -> Option<f64> {
    let a = &result.sources[i];
    let b = &result.sources[j];
    if a.actual_data_size() != b.actual_data_size() || a.actual_data_size() == 0 {
        return None;
    }
    let (xs, ys) = (a.series()?, b.series()?);
    let (sa, sb) = (a.stats()?, b.stats()?);

    let n = xs.len() as f64;
    let mean_xy = xs.iter().zip(ys).map(|(x, y)| x * y).sum::<f64>() / n;
    let cov = mean_xy - sa.arithmetic_mean * sb.arithmetic_mean;

    let denom = (sa.population_variance() * sb.population_variance()).sqrt();
    if denom == 0.0 || !denom.is_finite() {
        return None;
    }
    Some(cov / denom)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::analysis::{DsRef, ResultLayout, YUnit};
    use crate::core::models::ids::DataSourceId;
    use crate::engine::statistics;

    fn result_with(series: &[Vec<f64>]) -> AnalysisResult {
        let mut result = AnalysisResult::new("r", ResultLayout::Time, YUnit::Angstrom);
        for values in series {
            let mut dsref = DsRef::new(DataSourceId::default());
            dsref.store(values.clone(), values.len());
            dsref.set_stats(statistics::reduce(values));
            result.sources.push(dsref);
        }
        result
    }

    #[test]
    fn identical_series_correlate_perfectly() {
        let ramp = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let mut result = result_with(&[ramp.clone(), ramp]);
        build(&mut result);
        let r = result.sources()[0].correlation()[1].unwrap();
        assert!((r - 1.0).abs() < 1e-9);
        assert!(result.sources()[0].correlation()[0].is_none());
    }

    #[test]
    fn matrix_is_symmetric() {
        let mut result = result_with(&[
            vec![1.0, 3.0, 2.0, 5.0],
            vec![2.0, 1.0, 4.0, 3.0],
            vec![-1.0, -2.0, -3.0, -5.0],
        ]);
        build(&mut result);
        for i in 0..3 {
            for j in 0..3 {
                assert_eq!(
                    result.sources()[i].correlation()[j],
                    result.sources()[j].correlation()[i]
                );
            }
        }
    }

    #[test]
    fn reversed_series_correlate_negatively() {
        let mut result = result_with(&[vec![1.0, 2.0, 3.0], vec![3.0, 2.0, 1.0]]);
        build(&mut result);
        let r = result.sources()[1].correlation()[0].unwrap();
        assert!((r + 1.0).abs() < 1e-9);
    }

    #[test]
    fn unequal_lengths_and_constant_series_are_undefined() {
        let mut result = result_with(&[
            vec![1.0, 2.0, 3.0],
            vec![1.0, 2.0],
            vec![4.0, 4.0, 4.0],
        ]);
        build(&mut result);
        assert!(result.sources()[0].correlation()[1].is_none());
        assert!(result.sources()[0].correlation()[2].is_none());
    }

    #[test]
    fn single_series_gets_only_a_diagonal() {
        let mut result = result_with(&[vec![1.0, 2.0]]);
        build(&mut result);
        assert_eq!(result.sources()[0].correlation(), &[None]);
    }
}
