use super::pool::{WorkerArena, WorkerPool, lock};
use super::progress::{CancellationToken, Progress, ProgressReporter};
use crate::core::alignment::kernel::AlignmentKernel;
use crate::core::alignment::superpose::superpose;
use crate::core::io::traits::FrameLoader;
use crate::core::metrics::script::ScriptHost;
use crate::core::metrics::{MetricEvaluator, MetricInput, evaluator_for};
use crate::core::models::analysis::ResultLayout;
use crate::core::models::data_source::{DataSource, DataSourceKind, MAX_SELECTIONS};
use crate::core::models::frame::Frame;
use crate::core::models::ids::DataSourceId;
use crate::core::models::mask::AtomMask;
use crate::core::models::stream::Stream;
use crate::core::selection;
use nalgebra::{Point3, Vector3};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, instrument, trace, warn};

/// One output series: a data source measured in one layout.
pub type TaskKey = (DataSourceId, ResultLayout);

/// A data source that some outstanding result needs in the given layout.
#[derive(Debug, Clone, Copy)]
pub struct TaskSpec<'a> {
    pub id: DataSourceId,
    pub data_source: &'a DataSource,
    pub layout: ResultLayout,
}

impl TaskSpec<'_> {
    pub fn key(&self) -> TaskKey {
        (self.id, self.layout)
    }
}

/// Everything a worker needs to process the frames of one stream.
pub struct StreamJob<'a> {
    pub stream: &'a Stream,
    pub loader: &'a dyn FrameLoader,
    pub script_host: &'a Arc<dyn ScriptHost>,
    pub kernel: &'static dyn AlignmentKernel,
    pub max_sweeps: usize,
    pub pool: &'a WorkerPool,
    pub reporter: &'a ProgressReporter<'a>,
    pub cancel: &'a CancellationToken,
}

/// Natural-unit series of one stream, keyed by task.
#[derive(Debug, Default)]
pub struct StreamOutput {
    pub series: HashMap<TaskKey, Vec<f64>>,
    /// Averaged structure, when a fluctuation task asked for it.
    pub average: Option<Frame>,
}

#[derive(Debug)]
pub enum ScheduleOutcome {
    Completed(StreamOutput),
    Cancelled,
}

struct PreparedTask<'a> {
    key: TaskKey,
    data_source: &'a DataSource,
    evaluator: Box<dyn MetricEvaluator>,
    selections: [Option<AtomMask>; MAX_SELECTIONS],
    /// Alignment target of the selection-scoped kinds, centered on selection 0.
    own_reference: Option<Frame>,
    /// Averaged `secondary` coordinates of a scoped fluctuation task.
    own_average: Option<Vec<Point3<f64>>>,
    enabled: bool,
    /// Column in the time matrix, or slab index in each worker.
    slot: usize,
    slab_len: usize,
}

impl PreparedTask<'_> {
    fn kind(&self) -> DataSourceKind {
        self.data_source.kind
    }

    fn layout(&self) -> ResultLayout {
        self.key.1
    }

    fn input<'f>(
        &'f self,
        job: &'f StreamJob,
        frame: &'f Frame,
        stream_average: Option<&'f [Point3<f64>]>,
        worker: usize,
    ) -> MetricInput<'f> {
        let reference = self.own_reference.as_ref().unwrap_or(job.stream.reference());
        let average = if self.kind().aligns_on_selection() {
            self.own_average.as_deref()
        } else {
            stream_average
        };
        MetricInput {
            data_source: self.data_source,
            frame,
            reference,
            average,
            selections: [self.selections[0].as_ref(), self.selections[1].as_ref()],
            kernel: job.kernel,
            worker,
        }
    }
}

#[derive(Default)]
struct Worker {
    slabs: Vec<Vec<f64>>,
    frames: usize,
}

/// Running coordinate sums of the averaging pass. Only frames that were
/// loaded and matched the reference are counted.
struct AverageAccumulator {
    stream: Vec<Vector3<f64>>,
    scoped: HashMap<usize, Vec<Vector3<f64>>>,
    frames: usize,
}

impl AverageAccumulator {
    fn into_points(v: Vec<Vector3<f64>>, frames: usize) -> Vec<Point3<f64>> {
        let scale = 1.0 / frames.max(1) as f64;
        v.into_iter().map(|sum| Point3::from(sum * scale)).collect()
    }
}

/// Runs every task of one stream over all of its frames.
///
/// Time-layout values are written into a frame-major matrix, one row per frame;
/// residue-layout values go into per-worker slabs that are merged after the
/// join and averaged over the frames that were actually measured. Frames that
/// fail to load leave zeros behind in the time layout.
#[instrument(skip_all, name = "stream_schedule", fields(stream = %job.stream.name))]
pub fn run(job: &StreamJob, specs: &[TaskSpec]) -> ScheduleOutcome {
    let stream = job.stream;
    let frame_count = stream.frame_count();
    let mut tasks = prepare_tasks(job, specs);
    let needs_average = tasks.iter().any(|t| t.enabled && t.kind().needs_average());

    info!(
        frames = frame_count,
        tasks = tasks.len(),
        workers = job.pool.thread_count(),
        "Processing stream."
    );

    let passes = if needs_average { 2 } else { 1 };
    job.reporter.report(Progress::TaskStart {
        total_steps: (frame_count * passes) as u64,
    });

    let mut average = None;
    if needs_average {
        job.reporter.report(Progress::PhaseStart { name: "Averaging" });
        let (stream_average, scoped) = averaging_pass(job, &tasks);
        job.reporter.report(Progress::PhaseFinish);
        if job.cancel.is_cancelled() {
            job.reporter.report(Progress::TaskFinish);
            return ScheduleOutcome::Cancelled;
        }
        for (index, coords) in scoped {
            tasks[index].own_average = Some(coords);
        }
        average = Some(stream_average);
    }

    job.reporter.report(Progress::PhaseStart { name: "Measuring" });
    let output = measurement_pass(job, &tasks, average.as_ref().map(|f| f.working.as_slice()));
    job.reporter.report(Progress::PhaseFinish);
    job.reporter.report(Progress::TaskFinish);

    if job.cancel.is_cancelled() {
        return ScheduleOutcome::Cancelled;
    }

    ScheduleOutcome::Completed(StreamOutput {
        series: output,
        average,
    })
}

fn prepare_tasks<'a>(job: &StreamJob, specs: &[TaskSpec<'a>]) -> Vec<PreparedTask<'a>> {
    let reference = job.stream.reference();
    let mut time_slots = 0;
    let mut residue_slots = 0;

    specs
        .iter()
        .map(|spec| {
            let ds = spec.data_source;
            let evaluator = evaluator_for(ds.kind, job.script_host);
            let mut enabled = true;

            let mut selections: [Option<AtomMask>; MAX_SELECTIONS] = [None, None];
            for (slot, entry) in selections.iter_mut().enumerate() {
                let Some(expression) = ds.selection(slot) else {
                    continue;
                };
                match selection::parse(expression) {
                    Ok(parsed) => *entry = Some(parsed.evaluate(reference)),
                    Err(e) => {
                        warn!(data_source = %ds.name, slot, "Invalid selection, output zero-filled: {}", e);
                        enabled = false;
                    }
                }
            }
            let present = selections.iter().filter(|s| s.is_some()).count();
            if enabled && present < ds.kind.required_selections() {
                warn!(data_source = %ds.name, kind = %ds.kind, "Missing selection, output zero-filled.");
                enabled = false;
            }

            let mut own_reference = None;
            if enabled && ds.kind.aligns_on_selection() {
                own_reference = load_own_reference(job, ds, selections[0].as_ref());
                enabled = own_reference.is_some();
            }

            let slot = match spec.layout {
                ResultLayout::Time => {
                    time_slots += 1;
                    time_slots - 1
                }
                ResultLayout::Residue => {
                    residue_slots += 1;
                    residue_slots - 1
                }
            };

            PreparedTask {
                key: spec.key(),
                data_source: ds,
                slab_len: evaluator.slab_len(reference),
                evaluator,
                selections,
                own_reference,
                own_average: None,
                enabled,
                slot,
            }
        })
        .collect()
}

/// Loads (or copies) the structure a selection-scoped task fits onto.
fn load_own_reference(job: &StreamJob, ds: &DataSource, mask: Option<&AtomMask>) -> Option<Frame> {
    let stream = job.stream;
    let mut reference = match &ds.reference_path {
        Some(path) => match job.loader.load(0, stream.format, path, stream.flags) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(data_source = %ds.name, path = %path.display(), "Reference failed to load, output zero-filled: {}", e);
                return None;
            }
        },
        None => stream.reference().clone(),
    };
    if !reference.is_compatible(stream.reference()) {
        warn!(
            data_source = %ds.name,
            expected = stream.reference().atom_count(),
            found = reference.atom_count(),
            "Reference atom count differs from the stream, output zero-filled."
        );
        return None;
    }
    reference.reset_working();
    let all = AtomMask::all(reference.atom_count());
    reference.move_to_centroid(mask.unwrap_or(&all));
    Some(reference)
}

/// Frame 0 is the resident reference and is never reloaded.
fn acquire_frame(job: &StreamJob, worker: usize, index: usize) -> Option<Frame> {
    if index == 0 {
        return Some(job.stream.reference().clone());
    }
    let path = job.stream.file(index)?;
    match job.loader.load(worker, job.stream.format, path, job.stream.flags) {
        Ok(frame) => Some(frame),
        Err(e) => {
            warn!(frame = index, path = %path.display(), "Frame failed to load, values zero-filled: {}", e);
            None
        }
    }
}

fn align_to_stream(job: &StreamJob, frame: &mut Frame, backbone: &AtomMask) {
    frame.reset_working();
    frame.move_to_centroid(backbone);
    let outcome = superpose(
        job.kernel,
        &mut frame.working,
        &job.stream.reference().working,
        backbone,
        job.max_sweeps,
    );
    if !outcome.is_aligned() {
        trace!(?outcome, "Backbone fit skipped; frame left centered.");
    }
}

fn align_on_selection(job: &StreamJob, frame: &mut Frame, task: &PreparedTask) {
    let (Some(mask), Some(target)) = (task.selections[0].as_ref(), task.own_reference.as_ref()) else {
        return;
    };
    frame.copy_working_into_secondary();
    frame.move_secondary_to_centroid(mask);
    superpose(job.kernel, &mut frame.secondary, &target.working, mask, job.max_sweeps);
}

fn averaging_pass(job: &StreamJob, tasks: &[PreparedTask]) -> (Frame, HashMap<usize, Vec<Point3<f64>>>) {
    let reference = job.stream.reference();
    let backbone = reference.backbone_mask();
    let atom_count = reference.atom_count();
    let frame_count = job.stream.frame_count();
    let scoped: Vec<usize> = tasks
        .iter()
        .enumerate()
        .filter(|(_, t)| t.enabled && t.kind().needs_average() && t.kind().aligns_on_selection())
        .map(|(i, _)| i)
        .collect();

    let accumulator = Mutex::new(AverageAccumulator {
        stream: vec![Vector3::zeros(); atom_count],
        scoped: scoped.iter().map(|&i| (i, vec![Vector3::zeros(); atom_count])).collect(),
        frames: 0,
    });

    job.pool.run_on_each_index(frame_count, |worker, index| {
        if job.cancel.is_cancelled() {
            return;
        }
        if let Some(mut frame) = acquire_frame(job, worker, index).filter(|f| f.is_compatible(reference)) {
            align_to_stream(job, &mut frame, &backbone);
            let fitted: Vec<(usize, Vec<Point3<f64>>)> = scoped
                .iter()
                .map(|&i| {
                    align_on_selection(job, &mut frame, &tasks[i]);
                    (i, frame.secondary.clone())
                })
                .collect();

            let mut acc = lock(&accumulator);
            acc.frames += 1;
            for (sum, p) in acc.stream.iter_mut().zip(&frame.working) {
                *sum += p.coords;
            }
            for (i, coords) in fitted {
                if let Some(target) = acc.scoped.get_mut(&i) {
                    for (sum, p) in target.iter_mut().zip(&coords) {
                        *sum += p.coords;
                    }
                }
            }
        }
        job.reporter.report(Progress::TaskIncrement { amount: 1 });
    });

    let acc = accumulator
        .into_inner()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    if acc.frames < frame_count && !job.cancel.is_cancelled() {
        warn!(
            averaged = acc.frames,
            frames = frame_count,
            "Some frames were skipped while averaging."
        );
    }
    let frames = acc.frames;
    let average = Frame::new(
        reference.atoms().to_vec(),
        AverageAccumulator::into_points(acc.stream, frames),
    );
    let scoped = acc
        .scoped
        .into_iter()
        .map(|(i, v)| (i, AverageAccumulator::into_points(v, frames)))
        .collect();
    debug!(frames, "Averaged structure ready.");
    (average, scoped)
}

fn measurement_pass(
    job: &StreamJob,
    tasks: &[PreparedTask],
    stream_average: Option<&[Point3<f64>]>,
) -> HashMap<TaskKey, Vec<f64>> {
    let reference = job.stream.reference();
    let backbone = reference.backbone_mask();
    let frame_count = job.stream.frame_count();
    let width = tasks.iter().filter(|t| t.layout() == ResultLayout::Time).count();

    let residue_tasks: Vec<&PreparedTask> = tasks
        .iter()
        .filter(|t| t.layout() == ResultLayout::Residue)
        .collect();
    let arena = WorkerArena::new(job.pool.thread_count(), || Worker {
        slabs: residue_tasks.iter().map(|t| vec![0.0; t.slab_len]).collect(),
        frames: 0,
    });

    let mut matrix = vec![0.0; frame_count * width];
    job.pool.run_on_each_row(&mut matrix, frame_count, width, |worker, index, row| {
        if job.cancel.is_cancelled() {
            return;
        }
        if let Some(mut frame) = acquire_frame(job, worker, index) {
            let compatible = frame.is_compatible(reference);
            align_to_stream(job, &mut frame, &backbone);
            for task in tasks.iter().filter(|t| t.enabled) {
                if task.layout() == ResultLayout::Residue && !compatible {
                    continue;
                }
                if task.kind().aligns_on_selection() {
                    align_on_selection(job, &mut frame, task);
                }
                let input = task.input(job, &frame, stream_average, worker);
                match task.layout() {
                    ResultLayout::Time => row[task.slot] = task.evaluator.evaluate(&input),
                    ResultLayout::Residue => arena.with(worker, |w| {
                        task.evaluator
                            .accumulate_residues(&input, &mut w.slabs[task.slot], 1.0)
                    }),
                }
            }
            if compatible {
                arena.with(worker, |w| w.frames += 1);
            }
        }
        job.reporter.report(Progress::TaskIncrement { amount: 1 });
    });

    let workers = arena.into_inner();
    let measured: usize = workers.iter().map(|w| w.frames).sum();
    let weight = 1.0 / measured.max(1) as f64;
    debug!(
        per_worker = ?workers.iter().map(|w| w.frames).collect::<Vec<_>>(),
        "Measurement pass finished."
    );

    let mut series = HashMap::with_capacity(tasks.len());
    for task in tasks {
        let values = match task.layout() {
            ResultLayout::Time => (0..frame_count).map(|r| matrix[r * width + task.slot]).collect(),
            ResultLayout::Residue if task.enabled => {
                let mut merged = merge_slabs(task.slab_len, workers.iter().map(|w| w.slabs[task.slot].as_slice()));
                merged.iter_mut().for_each(|v| *v *= weight);
                task.evaluator
                    .finalize_residues(reference, task.selections[0].as_ref(), merged)
            }
            ResultLayout::Residue => vec![0.0; reference.residue_count()],
        };
        series.insert(task.key, values);
    }
    series
}

/// Element-wise sum of per-worker slabs.
pub(crate) fn merge_slabs<'s>(len: usize, slabs: impl IntoIterator<Item = &'s [f64]>) -> Vec<f64> {
    let mut merged = vec![0.0; len];
    for slab in slabs {
        for (total, value) in merged.iter_mut().zip(slab) {
            *total += value;
        }
    }
    merged
}
