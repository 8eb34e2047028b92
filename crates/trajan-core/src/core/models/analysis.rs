use super::data_source::Quantity;
use super::ids::DataSourceId;
use serde::{Deserialize, Serialize};

/// How the series of a result is indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResultLayout {
    /// One value per trajectory frame.
    #[default]
    Time,
    /// One value per residue, averaged over the whole trajectory.
    Residue,
}

/// Unit of the Y axis a result is reported in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum YUnit {
    #[default]
    Angstrom,
    Nanometer,
    Degree,
    Radian,
    SquareAngstrom,
    SquareNanometer,
    Unitless,
}

impl YUnit {
    /// Multiplier converting a value of the given quantity from its natural unit
    /// (Å, radians, Å²) into this unit. Mismatched pairs convert with factor 1.
    pub fn factor_for(self, quantity: Quantity) -> f64 {
        match (quantity, self) {
            (Quantity::Length, YUnit::Nanometer) => 0.1,
            (Quantity::Angle, YUnit::Degree) => 180.0 / std::f64::consts::PI,
            (Quantity::Area, YUnit::SquareNanometer) => 0.01,
            _ => 1.0,
        }
    }
}

/// Cache state of a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ResultStatus {
    /// Every series is populated from the latest build.
    Actual,
    /// Some upstream edit happened since the last build.
    #[default]
    Modified,
}

/// Summary statistics of one finished series.
///
/// Means that are undefined for the sample (geometric with non-positive values,
/// harmonic with a zero value) are `None`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SeriesStatistics {
    pub count: usize,
    pub arithmetic_mean: f64,
    pub geometric_mean: Option<f64>,
    pub harmonic_mean: Option<f64>,
    pub quadratic_mean: f64,
    pub min: f64,
    pub max: f64,
    pub range: f64,
    pub midrange: f64,
    pub median: f64,
    pub variance: f64,
    pub std_dev: f64,
    pub std_error: f64,
}

impl SeriesStatistics {
    /// Population variance recovered from the quadratic and arithmetic means.
    #[inline]
    pub fn population_variance(&self) -> f64 {
        (self.quadratic_mean * self.quadratic_mean - self.arithmetic_mean * self.arithmetic_mean)
            .max(0.0)
    }
}

/// Binding of a data source's output into a result.
#[derive(Debug, Clone, PartialEq)]
pub struct DsRef {
    pub data_source: DataSourceId,
    pub scale: f64,
    pub bias: f64,
    pub visible: bool,
    data: Option<Vec<f64>>,
    actual_data_size: usize,
    stats: Option<SeriesStatistics>,
    correlation: Vec<Option<f64>>,
}

impl DsRef {
    pub fn new(data_source: DataSourceId) -> Self {
        Self {
            data_source,
            scale: 1.0,
            bias: 0.0,
            visible: true,
            data: None,
            actual_data_size: 0,
            stats: None,
            correlation: Vec::new(),
        }
    }

    pub fn with_transform(mut self, scale: f64, bias: f64) -> Self {
        self.scale = scale;
        self.bias = bias;
        self
    }

    /// The allocated buffer, if the last build populated it.
    pub fn data(&self) -> Option<&[f64]> {
        self.data.as_deref()
    }

    /// Length of the allocated buffer (0 when freed).
    pub fn data_size(&self) -> usize {
        self.data.as_ref().map_or(0, Vec::len)
    }

    pub fn actual_data_size(&self) -> usize {
        self.actual_data_size
    }

    /// The produced part of the series.
    pub fn series(&self) -> Option<&[f64]> {
        self.data.as_deref().map(|d| &d[..self.actual_data_size.min(d.len())])
    }

    pub fn stats(&self) -> Option<&SeriesStatistics> {
        self.stats.as_ref()
    }

    /// Pearson coefficients against every other entry of the owning result,
    /// in result order. Empty until a correlation pass ran.
    pub fn correlation(&self) -> &[Option<f64>] {
        &self.correlation
    }

    pub(crate) fn store(&mut self, data: Vec<f64>, actual_data_size: usize) {
        self.actual_data_size = actual_data_size.min(data.len());
        self.data = Some(data);
        self.stats = None;
        self.correlation.clear();
    }

    pub(crate) fn set_stats(&mut self, stats: Option<SeriesStatistics>) {
        self.stats = stats;
    }

    pub(crate) fn set_correlation(&mut self, correlation: Vec<Option<f64>>) {
        self.correlation = correlation;
    }

    pub(crate) fn clear(&mut self) {
        self.data = None;
        self.actual_data_size = 0;
        self.stats = None;
        self.correlation.clear();
    }
}

/// A set of series sharing a layout and unit, plus their statistics and
/// correlation matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisResult {
    pub name: String,
    pub layout: ResultLayout,
    pub y_unit: YUnit,
    pub(crate) sources: Vec<DsRef>,
    pub(crate) status: ResultStatus,
}

impl AnalysisResult {
    pub fn new(name: &str, layout: ResultLayout, y_unit: YUnit) -> Self {
        Self {
            name: name.to_string(),
            layout,
            y_unit,
            sources: Vec::new(),
            status: ResultStatus::Modified,
        }
    }

    pub fn sources(&self) -> &[DsRef] {
        &self.sources
    }

    pub fn status(&self) -> ResultStatus {
        self.status
    }

    pub fn is_actual(&self) -> bool {
        self.status == ResultStatus::Actual
    }

    pub fn references(&self, data_source: DataSourceId) -> bool {
        self.sources.iter().any(|r| r.data_source == data_source)
    }

    pub(crate) fn invalidate(&mut self) {
        for dsref in &mut self.sources {
            dsref.clear();
        }
        self.status = ResultStatus::Modified;
    }
}
