//! CSV export of finished results.
//!
//! Undefined values (a series shorter than its neighbours, a mean with no
//! defined value, an uncomputed correlation entry) are written as empty cells.

use crate::core::models::analysis::{AnalysisResult, ResultLayout, SeriesStatistics};
use std::io::Write;

const STATISTICS_HEADER: [&str; 14] = [
    "series",
    "count",
    "arithmetic_mean",
    "geometric_mean",
    "harmonic_mean",
    "quadratic_mean",
    "min",
    "max",
    "range",
    "midrange",
    "median",
    "variance",
    "std_dev",
    "std_error",
];

fn cell(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// One row per frame (or residue), one column per series.
///
/// `columns` names the series in result order.
pub fn write_series<W: Write>(
    writer: W,
    result: &AnalysisResult,
    columns: &[String],
) -> Result<(), csv::Error> {
    let mut wtr = csv::Writer::from_writer(writer);

    let index_header = match result.layout {
        ResultLayout::Time => "frame",
        ResultLayout::Residue => "residue",
    };
    let mut header = vec![index_header.to_string()];
    header.extend(columns.iter().cloned());
    wtr.write_record(&header)?;

    let rows = result
        .sources()
        .iter()
        .map(|r| r.actual_data_size())
        .max()
        .unwrap_or(0);
    for row in 0..rows {
        let mut record = vec![(row + 1).to_string()];
        record.extend(
            result
                .sources()
                .iter()
                .map(|r| cell(r.series().and_then(|s| s.get(row).copied()))),
        );
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    Ok(())
}

fn statistics_record(name: &str, stats: Option<&SeriesStatistics>) -> Vec<String> {
    let mut record = vec![name.to_string()];
    match stats {
        Some(s) => record.extend([
            s.count.to_string(),
            s.arithmetic_mean.to_string(),
            cell(s.geometric_mean),
            cell(s.harmonic_mean),
            s.quadratic_mean.to_string(),
            s.min.to_string(),
            s.max.to_string(),
            s.range.to_string(),
            s.midrange.to_string(),
            s.median.to_string(),
            s.variance.to_string(),
            s.std_dev.to_string(),
            s.std_error.to_string(),
        ]),
        None => record.extend(std::iter::repeat_n(String::new(), STATISTICS_HEADER.len() - 1)),
    }
    record
}

/// One row per series with its summary statistics.
pub fn write_statistics<W: Write>(
    writer: W,
    result: &AnalysisResult,
    columns: &[String],
) -> Result<(), csv::Error> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(STATISTICS_HEADER)?;
    for (dsref, name) in result.sources().iter().zip(columns) {
        wtr.write_record(statistics_record(name, dsref.stats()))?;
    }
    wtr.flush()?;
    Ok(())
}

/// The square correlation matrix, labelled on both axes.
pub fn write_correlation<W: Write>(
    writer: W,
    result: &AnalysisResult,
    columns: &[String],
) -> Result<(), csv::Error> {
    let mut wtr = csv::Writer::from_writer(writer);
    let mut header = vec![String::new()];
    header.extend(columns.iter().cloned());
    wtr.write_record(&header)?;

    let n = result.sources().len();
    for (dsref, name) in result.sources().iter().zip(columns) {
        let mut record = vec![name.clone()];
        record.extend((0..n).map(|j| cell(dsref.correlation().get(j).copied().flatten())));
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::analysis::{DsRef, YUnit};
    use crate::core::models::ids::DataSourceId;

    fn result_with_two_series() -> AnalysisResult {
        let mut result = AnalysisResult::new("r", ResultLayout::Time, YUnit::Angstrom);
        let mut a = DsRef::new(DataSourceId::default());
        a.store(vec![1.0, 2.0, 3.0], 3);
        a.set_stats(Some(SeriesStatistics {
            count: 3,
            arithmetic_mean: 2.0,
            ..Default::default()
        }));
        a.set_correlation(vec![None, Some(0.5)]);
        let mut b = DsRef::new(DataSourceId::default());
        b.store(vec![4.0, 5.0, 0.0], 2);
        b.set_correlation(vec![Some(0.5), None]);
        result.sources.push(a);
        result.sources.push(b);
        result
    }

    fn columns() -> Vec<String> {
        vec!["a".into(), "b".into()]
    }

    #[test]
    fn series_rows_leave_short_series_blank() {
        let mut out = Vec::new();
        write_series(&mut out, &result_with_two_series(), &columns()).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "frame,a,b\n1,1,4\n2,2,5\n3,3,\n");
    }

    #[test]
    fn statistics_rows_blank_missing_values() {
        let mut out = Vec::new();
        write_statistics(&mut out, &result_with_two_series(), &columns()).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("a,3,2,,,0,"));
        assert_eq!(lines[2], "b,,,,,,,,,,,,,");
    }

    #[test]
    fn correlation_matrix_has_blank_diagonal() {
        let mut out = Vec::new();
        write_correlation(&mut out, &result_with_two_series(), &columns()).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, ",a,b\na,,0.5\nb,0.5,\n");
    }
}
