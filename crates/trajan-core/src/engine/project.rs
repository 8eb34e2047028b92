use super::context::BuildContext;
use super::correlation;
use super::error::EngineError;
use super::progress::Progress;
use super::scheduler::{self, ScheduleOutcome, StreamJob, TaskKey, TaskSpec};
use super::statistics;
use crate::core::io::traits::FrameLoader;
use crate::core::models::analysis::{AnalysisResult, DsRef, ResultLayout, ResultStatus, YUnit};
use crate::core::models::data_source::DataSource;
use crate::core::models::frame::Frame;
use crate::core::models::ids::{DataSourceId, ResultId, StreamId};
use crate::core::models::stream::{FrameFormat, Stream, StreamFlags};
use crate::core::selection;
use slotmap::SlotMap;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

/// Editable view of a stream's settings, handed to [`Project::modify_stream`].
#[derive(Debug, Clone, PartialEq)]
pub struct StreamEdit {
    pub name: String,
    pub files: Vec<PathBuf>,
    pub format: FrameFormat,
    pub flags: StreamFlags,
}

impl StreamEdit {
    fn of(stream: &Stream) -> Self {
        Self {
            name: stream.name.clone(),
            files: stream.files().to_vec(),
            format: stream.format,
            flags: stream.flags,
        }
    }

    fn differs_in_source(&self, other: &StreamEdit) -> bool {
        self.files != other.files || self.format != other.format || self.flags != other.flags
    }
}

/// One binding of a data source into a result, as seen by [`ResultEdit`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Binding {
    pub data_source: DataSourceId,
    pub scale: f64,
    pub bias: f64,
    pub visible: bool,
}

impl Binding {
    pub fn new(data_source: DataSourceId) -> Self {
        Self {
            data_source,
            scale: 1.0,
            bias: 0.0,
            visible: true,
        }
    }
}

/// Editable view of a result, handed to [`Project::modify_result`].
#[derive(Debug, Clone, PartialEq)]
pub struct ResultEdit {
    pub name: String,
    pub layout: ResultLayout,
    pub y_unit: YUnit,
    pub bindings: Vec<Binding>,
}

impl ResultEdit {
    fn of(result: &AnalysisResult) -> Self {
        Self {
            name: result.name.clone(),
            layout: result.layout,
            y_unit: result.y_unit,
            bindings: result
                .sources()
                .iter()
                .map(|r| Binding {
                    data_source: r.data_source,
                    scale: r.scale,
                    bias: r.bias,
                    visible: r.visible,
                })
                .collect(),
        }
    }

    /// Whether switching from `self` to `other` changes any stored value.
    fn differs_in_content(&self, other: &ResultEdit) -> bool {
        self.layout != other.layout
            || self.y_unit != other.y_unit
            || self.bindings.len() != other.bindings.len()
            || self.bindings.iter().zip(&other.bindings).any(|(a, b)| {
                a.data_source != b.data_source || a.scale != b.scale || a.bias != b.bias
            })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BuildReport {
    pub results_built: usize,
    pub streams_processed: usize,
    pub frames_processed: usize,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BuildOutcome {
    /// Every non-empty result was already actual; nothing ran.
    UpToDate,
    Built(BuildReport),
    /// The build was cancelled; every result it touched is back to modified.
    Cancelled,
}

/// Streams, data sources and results, plus the edges between them.
///
/// Data sources depend on their stream, results depend on the data sources
/// they bind. Any content edit invalidates the results downstream of it; a
/// later [`Project::build`] recomputes exactly those.
#[derive(Debug, Default)]
pub struct Project {
    streams: SlotMap<StreamId, Stream>,
    data_sources: SlotMap<DataSourceId, DataSource>,
    results: SlotMap<ResultId, AnalysisResult>,
}

impl Project {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stream(&self, id: StreamId) -> Option<&Stream> {
        self.streams.get(id)
    }

    pub fn streams(&self) -> impl Iterator<Item = (StreamId, &Stream)> {
        self.streams.iter()
    }

    pub fn data_source(&self, id: DataSourceId) -> Option<&DataSource> {
        self.data_sources.get(id)
    }

    pub fn data_sources(&self) -> impl Iterator<Item = (DataSourceId, &DataSource)> {
        self.data_sources.iter()
    }

    pub fn result(&self, id: ResultId) -> Option<&AnalysisResult> {
        self.results.get(id)
    }

    pub fn results(&self) -> impl Iterator<Item = (ResultId, &AnalysisResult)> {
        self.results.iter()
    }

    // --- Lifecycle ---

    /// Adds a stream, loading its first file as the resident reference frame.
    pub fn add_stream(
        &mut self,
        name: &str,
        files: Vec<PathBuf>,
        format: FrameFormat,
        flags: StreamFlags,
        loader: &dyn FrameLoader,
    ) -> Result<StreamId, EngineError> {
        let reference = load_reference(name, &files, format, flags, loader)?;
        Ok(self.insert_stream(Stream::new(name, format, flags, files, reference)))
    }

    /// Adds a stream whose reference frame is already loaded.
    pub fn insert_stream(&mut self, stream: Stream) -> StreamId {
        debug!(stream = %stream.name, frames = stream.frame_count(), "Stream added.");
        self.streams.insert(stream)
    }

    pub fn add_data_source(&mut self, data_source: DataSource) -> Result<DataSourceId, EngineError> {
        if !self.streams.contains_key(data_source.stream) {
            return Err(EngineError::StreamNotFound(data_source.stream));
        }
        validate_data_source(&data_source)?;
        Ok(self.data_sources.insert(data_source))
    }

    pub fn add_result(&mut self, name: &str, layout: ResultLayout, y_unit: YUnit) -> ResultId {
        self.results.insert(AnalysisResult::new(name, layout, y_unit))
    }

    /// Binds a data source into a result. The result becomes modified.
    pub fn attach(
        &mut self,
        result: ResultId,
        data_source: DataSourceId,
        scale: f64,
        bias: f64,
    ) -> Result<(), EngineError> {
        let kind = self
            .data_sources
            .get(data_source)
            .ok_or(EngineError::DataSourceNotFound(data_source))?
            .kind;
        let target = self
            .results
            .get_mut(result)
            .ok_or(EngineError::ResultNotFound(result))?;
        if !kind.supports(target.layout) {
            return Err(EngineError::LayoutMismatch {
                kind,
                layout: target.layout,
            });
        }
        target
            .sources
            .push(DsRef::new(data_source).with_transform(scale, bias));
        target.invalidate();
        Ok(())
    }

    /// Removes a stream together with every data source defined on it.
    pub fn remove_stream(&mut self, id: StreamId) -> Result<Stream, EngineError> {
        if !self.streams.contains_key(id) {
            return Err(EngineError::StreamNotFound(id));
        }
        let owned: Vec<DataSourceId> = self
            .data_sources
            .iter()
            .filter(|(_, ds)| ds.stream == id)
            .map(|(ds_id, _)| ds_id)
            .collect();
        for ds_id in owned {
            self.remove_data_source(ds_id)?;
        }
        self.streams.remove(id).ok_or(EngineError::StreamNotFound(id))
    }

    /// Removes a data source and detaches it from every result binding it.
    pub fn remove_data_source(&mut self, id: DataSourceId) -> Result<DataSource, EngineError> {
        let removed = self
            .data_sources
            .remove(id)
            .ok_or(EngineError::DataSourceNotFound(id))?;
        for (_, result) in self.results.iter_mut().filter(|(_, r)| r.references(id)) {
            result.sources.retain(|r| r.data_source != id);
            result.invalidate();
        }
        Ok(removed)
    }

    pub fn remove_result(&mut self, id: ResultId) -> Result<AnalysisResult, EngineError> {
        self.results.remove(id).ok_or(EngineError::ResultNotFound(id))
    }

    // --- Invalidation ---

    /// Frees every buffer of the result and marks it modified.
    pub fn invalidate_result(&mut self, id: ResultId) -> Result<(), EngineError> {
        self.results
            .get_mut(id)
            .ok_or(EngineError::ResultNotFound(id))?
            .invalidate();
        Ok(())
    }

    /// Invalidates every result that binds the data source.
    pub fn invalidate_data_source(&mut self, id: DataSourceId) -> Result<(), EngineError> {
        if !self.data_sources.contains_key(id) {
            return Err(EngineError::DataSourceNotFound(id));
        }
        let mut count = 0;
        for (_, result) in self.results.iter_mut().filter(|(_, r)| r.references(id)) {
            result.invalidate();
            count += 1;
        }
        debug!(results = count, "Data source invalidated.");
        Ok(())
    }

    /// Invalidates every result downstream of the stream and drops its average.
    pub fn invalidate_stream(&mut self, id: StreamId) -> Result<(), EngineError> {
        let stream = self
            .streams
            .get_mut(id)
            .ok_or(EngineError::StreamNotFound(id))?;
        stream.clear_average();
        let owned: Vec<DataSourceId> = self
            .data_sources
            .iter()
            .filter(|(_, ds)| ds.stream == id)
            .map(|(ds_id, _)| ds_id)
            .collect();
        for ds_id in owned {
            self.invalidate_data_source(ds_id)?;
        }
        Ok(())
    }

    // --- Edits ---

    /// Applies `edit` to the stream's settings.
    ///
    /// A change of files, format or flags reloads the reference frame and
    /// invalidates everything downstream; a rename does not. Returns whether
    /// results were invalidated.
    pub fn modify_stream(
        &mut self,
        id: StreamId,
        loader: &dyn FrameLoader,
        edit: impl FnOnce(&mut StreamEdit),
    ) -> Result<bool, EngineError> {
        let stream = self.streams.get(id).ok_or(EngineError::StreamNotFound(id))?;
        let before = StreamEdit::of(stream);
        let mut after = before.clone();
        edit(&mut after);

        let reload = before.differs_in_source(&after);
        let reference = if reload {
            Some(load_reference(&after.name, &after.files, after.format, after.flags, loader)?)
        } else {
            None
        };

        let stream = self.streams.get_mut(id).ok_or(EngineError::StreamNotFound(id))?;
        stream.name = after.name;
        if let Some(reference) = reference {
            stream.replace_source(after.files, after.format, after.flags, reference);
            self.invalidate_stream(id)?;
        }
        Ok(reload)
    }

    /// Applies `edit` to a copy of the data source and commits it if it stays
    /// valid for every result that binds it.
    ///
    /// Returns whether results were invalidated; renames never invalidate.
    pub fn modify_data_source(
        &mut self,
        id: DataSourceId,
        edit: impl FnOnce(&mut DataSource),
    ) -> Result<bool, EngineError> {
        let before = self
            .data_sources
            .get(id)
            .ok_or(EngineError::DataSourceNotFound(id))?;
        let mut after = before.clone();
        edit(&mut after);

        if !self.streams.contains_key(after.stream) {
            return Err(EngineError::StreamNotFound(after.stream));
        }
        validate_data_source(&after)?;
        if let Some((_, result)) = self
            .results
            .iter()
            .find(|(_, r)| r.references(id) && !after.kind.supports(r.layout))
        {
            return Err(EngineError::LayoutMismatch {
                kind: after.kind,
                layout: result.layout,
            });
        }

        let changed = before.differs_in_content(&after);
        self.data_sources[id] = after;
        if changed {
            self.invalidate_data_source(id)?;
        }
        Ok(changed)
    }

    /// Applies `edit` to the result's settings and bindings.
    ///
    /// Renames and visibility toggles are applied in place; any other change
    /// rebinds the data sources and invalidates the result. Returns whether the
    /// result was invalidated.
    pub fn modify_result(
        &mut self,
        id: ResultId,
        edit: impl FnOnce(&mut ResultEdit),
    ) -> Result<bool, EngineError> {
        let result = self.results.get(id).ok_or(EngineError::ResultNotFound(id))?;
        let before = ResultEdit::of(result);
        let mut after = before.clone();
        edit(&mut after);

        for binding in &after.bindings {
            let kind = self
                .data_sources
                .get(binding.data_source)
                .ok_or(EngineError::DataSourceNotFound(binding.data_source))?
                .kind;
            if !kind.supports(after.layout) {
                return Err(EngineError::LayoutMismatch {
                    kind,
                    layout: after.layout,
                });
            }
        }

        let changed = before.differs_in_content(&after);
        let result = &mut self.results[id];
        result.name = after.name;
        if changed {
            result.layout = after.layout;
            result.y_unit = after.y_unit;
            result.sources = after
                .bindings
                .iter()
                .map(|b| {
                    let mut dsref = DsRef::new(b.data_source).with_transform(b.scale, b.bias);
                    dsref.visible = b.visible;
                    dsref
                })
                .collect();
            result.invalidate();
        } else {
            for (dsref, binding) in result.sources.iter_mut().zip(&after.bindings) {
                dsref.visible = binding.visible;
            }
        }
        Ok(changed)
    }

    // --- Build ---

    /// Recomputes every outstanding result.
    ///
    /// With `rebuild_all` false, results that are already actual are left
    /// untouched. Streams are processed one after another; correlation runs
    /// once at the end over the results rebuilt by this call.
    #[instrument(skip_all, name = "project_build")]
    pub fn build(&mut self, rebuild_all: bool, ctx: &BuildContext) -> Result<BuildOutcome, EngineError> {
        let started = Instant::now();
        let targets: Vec<ResultId> = self
            .results
            .iter()
            .filter(|(_, r)| !r.sources().is_empty() && (rebuild_all || !r.is_actual()))
            .map(|(id, _)| id)
            .collect();

        if targets.is_empty() {
            info!("All results are up to date.");
            return Ok(BuildOutcome::UpToDate);
        }

        for &id in &targets {
            self.results[id].invalidate();
        }

        ctx.reporter.report(Progress::PhaseStart { name: "Build" });
        info!(results = targets.len(), "Starting build.");

        let plan = self.plan(&targets)?;
        let mut series: HashMap<TaskKey, Vec<f64>> = HashMap::new();
        let mut averages: Vec<(StreamId, Frame)> = Vec::new();
        let mut frames_processed = 0;

        for (stream_id, specs) in &plan {
            if ctx.cancel.is_cancelled() {
                return Ok(self.abort(&targets, ctx));
            }
            let stream = &self.streams[*stream_id];
            ctx.reporter
                .report(Progress::Message(format!("Stream '{}'", stream.name)));

            let job = StreamJob {
                stream,
                loader: ctx.loader,
                script_host: ctx.script_host,
                kernel: ctx.config.kernel.kernel(),
                max_sweeps: ctx.config.max_jacobi_sweeps,
                pool: ctx.pool,
                reporter: ctx.reporter,
                cancel: ctx.cancel,
            };
            let task_specs: Vec<TaskSpec> = specs
                .iter()
                .map(|&(id, layout)| TaskSpec {
                    id,
                    data_source: &self.data_sources[id],
                    layout,
                })
                .collect();

            match scheduler::run(&job, &task_specs) {
                ScheduleOutcome::Completed(output) => {
                    frames_processed += stream.frame_count();
                    series.extend(output.series);
                    if let Some(average) = output.average {
                        averages.push((*stream_id, average));
                    }
                }
                ScheduleOutcome::Cancelled => return Ok(self.abort(&targets, ctx)),
            }
        }

        for (stream_id, average) in averages {
            if let Some(stream) = self.streams.get_mut(stream_id) {
                stream.set_average(average);
            }
        }

        for &id in &targets {
            self.commit(id, &series)?;
        }

        ctx.reporter.report(Progress::PhaseFinish);
        let report = BuildReport {
            results_built: targets.len(),
            streams_processed: plan.len(),
            frames_processed,
            elapsed: started.elapsed(),
        };
        info!(
            results = report.results_built,
            streams = report.streams_processed,
            frames = report.frames_processed,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Build finished."
        );
        Ok(BuildOutcome::Built(report))
    }

    /// Groups the distinct (data source, layout) tasks of the targets by stream,
    /// in first-seen order.
    fn plan(&self, targets: &[ResultId]) -> Result<Vec<(StreamId, Vec<TaskKey>)>, EngineError> {
        let mut plan: Vec<(StreamId, Vec<TaskKey>)> = Vec::new();
        let mut seen: HashSet<TaskKey> = HashSet::new();

        for &id in targets {
            let result = &self.results[id];
            for dsref in result.sources() {
                let ds = self
                    .data_sources
                    .get(dsref.data_source)
                    .ok_or(EngineError::DataSourceNotFound(dsref.data_source))?;
                if !self.streams.contains_key(ds.stream) {
                    return Err(EngineError::StreamNotFound(ds.stream));
                }
                let key = (dsref.data_source, result.layout);
                if !seen.insert(key) {
                    continue;
                }
                match plan.iter_mut().find(|(s, _)| *s == ds.stream) {
                    Some((_, keys)) => keys.push(key),
                    None => plan.push((ds.stream, vec![key])),
                }
            }
        }
        Ok(plan)
    }

    /// Writes converted series, statistics and correlations into a result and
    /// marks it actual.
    fn commit(&mut self, id: ResultId, series: &HashMap<TaskKey, Vec<f64>>) -> Result<(), EngineError> {
        let result = &mut self.results[id];
        let layout = result.layout;
        let y_unit = result.y_unit;

        if let Some(missing) = result
            .sources
            .iter()
            .find(|dsref| !series.contains_key(&(dsref.data_source, layout)))
        {
            return Err(EngineError::SeriesMissing {
                data_source: missing.data_source,
                layout,
            });
        }

        for dsref in &mut result.sources {
            let ds = self
                .data_sources
                .get(dsref.data_source)
                .ok_or(EngineError::DataSourceNotFound(dsref.data_source))?;
            let factor = y_unit.factor_for(ds.kind.quantity());
            let Some(natural) = series.get(&(dsref.data_source, layout)) else {
                continue;
            };
            let values: Vec<f64> = natural
                .iter()
                .map(|v| v * factor * dsref.scale + dsref.bias)
                .collect();
            let len = values.len();
            let stats = statistics::reduce(&values);
            dsref.store(values, len);
            dsref.set_stats(stats);
        }

        correlation::build(result);
        result.status = ResultStatus::Actual;
        debug!(result = %result.name, "Result committed.");
        Ok(())
    }

    fn abort(&mut self, targets: &[ResultId], ctx: &BuildContext) -> BuildOutcome {
        warn!("Build cancelled; discarding partial results.");
        for &id in targets {
            if let Some(result) = self.results.get_mut(id) {
                result.invalidate();
            }
        }
        ctx.reporter.report(Progress::PhaseFinish);
        BuildOutcome::Cancelled
    }
}

fn load_reference(
    name: &str,
    files: &[PathBuf],
    format: FrameFormat,
    flags: StreamFlags,
    loader: &dyn FrameLoader,
) -> Result<Frame, EngineError> {
    let first = files
        .first()
        .ok_or_else(|| EngineError::EmptyStream(name.to_string()))?;
    loader
        .load(0, format, first, flags)
        .map_err(|source| EngineError::ReferenceLoad {
            path: first.clone(),
            source,
        })
}

fn validate_data_source(data_source: &DataSource) -> Result<(), EngineError> {
    for slot in 0..data_source.selections.len() {
        if let Some(expression) = data_source.selection(slot) {
            selection::parse(expression).map_err(|source| EngineError::Selection {
                name: data_source.name.clone(),
                source,
            })?;
        }
    }
    let expected = data_source.kind.required_selections();
    let present = data_source.selections.iter().filter(|s| s.is_some()).count();
    if present < expected {
        return Err(EngineError::MissingSelection {
            name: data_source.name.clone(),
            kind: data_source.kind,
            expected,
        });
    }
    Ok(())
}
