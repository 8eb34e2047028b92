use super::defaults::DefaultsConfig;
use super::file::{FileConfig, FileDataSource};
use super::models::AppConfig;
use crate::cli::AnalyzeArgs;
use crate::error::{CliError, Result};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::debug;
use trajan::core::io::traits::FrameLoader;
use trajan::core::models::data_source::{DataSource, DataSourceKind, MAX_ARGS, MAX_SELECTIONS};
use trajan::core::models::ids::{DataSourceId, StreamId};
use trajan::core::selection;
use trajan::engine::config::{self as core_config, KernelPreference};
use trajan::engine::project::{Binding, Project};

pub fn build_config(args: &AnalyzeArgs, threads: Option<usize>) -> Result<AppConfig> {
    let defaults = DefaultsConfig::default();

    let file_config = FileConfig::from_file(&args.project)?;
    let mut file_config = apply_set_values(file_config, &args.set_values)?;
    let engine = file_config.engine.take().unwrap_or_default();

    let kernel = args
        .kernel
        .map(KernelPreference::from)
        .or(engine.kernel)
        .unwrap_or(defaults.kernel);
    let max_jacobi_sweeps = args
        .max_jacobi_sweeps
        .or(engine.max_jacobi_sweeps)
        .unwrap_or(defaults.max_jacobi_sweeps);
    let single_threaded = args.single_threaded
        || engine
            .single_threaded
            .unwrap_or(defaults.single_threaded);

    let mut builder = core_config::BuildConfigBuilder::new()
        .kernel(kernel)
        .max_jacobi_sweeps(max_jacobi_sweeps)
        .single_threaded(single_threaded);
    if let Some(threads) = threads.or(engine.threads) {
        builder = builder.threads(threads);
    }
    let build_config = builder
        .build()
        .map_err(|e| CliError::Config(e.to_string()))?;

    let project_dir = args
        .project
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();

    Ok(AppConfig {
        project_path: args.project.clone(),
        project_dir,
        output_dir: args.output.clone(),
        rebuild_all: args.rebuild_all,
        build_config,
        project: file_config,
    })
}

fn resolve_path(base_dir: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}

/// Checks everything about a project description that can be decided without
/// loading a frame. Returns one message per problem.
pub fn validate(file: &FileConfig, base_dir: &Path) -> Vec<String> {
    let mut problems = Vec::new();

    let mut stream_names = HashSet::new();
    for stream in &file.stream {
        if !stream_names.insert(stream.name.as_str()) {
            problems.push(format!("stream '{}': duplicate name", stream.name));
        }
        if stream.files.is_empty() {
            problems.push(format!("stream '{}': no frame files", stream.name));
        }
        for path in &stream.files {
            let resolved = resolve_path(base_dir, path);
            if !resolved.exists() {
                problems.push(format!(
                    "stream '{}': frame file '{}' does not exist",
                    stream.name,
                    resolved.display()
                ));
            }
        }
    }

    let mut source_names = HashMap::new();
    for ds in &file.data_source {
        if source_names.insert(ds.name.as_str(), ds.kind).is_some() {
            problems.push(format!("data source '{}': duplicate name", ds.name));
        }
        if !stream_names.contains(ds.stream.as_str()) {
            problems.push(format!(
                "data source '{}': unknown stream '{}'",
                ds.name, ds.stream
            ));
        }
        problems.extend(validate_data_source(ds, base_dir));
    }

    let mut result_names = HashSet::new();
    for result in &file.result {
        if !result_names.insert(result.name.as_str()) {
            problems.push(format!("result '{}': duplicate name", result.name));
        }
        for binding in &result.sources {
            match source_names.get(binding.data_source.as_str()) {
                None => problems.push(format!(
                    "result '{}': unknown data source '{}'",
                    result.name, binding.data_source
                )),
                Some(kind) if !kind.supports(result.layout) => problems.push(format!(
                    "result '{}': data source '{}' of kind '{}' cannot be shown in the {:?} layout",
                    result.name, binding.data_source, kind, result.layout
                )),
                Some(_) => {}
            }
        }
    }

    problems
}

fn validate_data_source(ds: &FileDataSource, base_dir: &Path) -> Vec<String> {
    let mut problems = Vec::new();
    let required_args = ds.kind.required_args();
    if ds.args.len() != required_args {
        problems.push(format!(
            "data source '{}': kind '{}' takes {} atom indices, got {}",
            ds.name,
            ds.kind,
            required_args,
            ds.args.len()
        ));
    }
    if ds.selections.len() > MAX_SELECTIONS {
        problems.push(format!(
            "data source '{}': at most {} selections are allowed",
            ds.name, MAX_SELECTIONS
        ));
    }
    let required_selections = ds.kind.required_selections();
    if ds.selections.len() < required_selections {
        problems.push(format!(
            "data source '{}': kind '{}' requires {} selection(s)",
            ds.name, ds.kind, required_selections
        ));
    }
    for (slot, expression) in ds.selections.iter().enumerate() {
        if let Err(e) = selection::parse(expression) {
            problems.push(format!(
                "data source '{}': selection {} '{}': {}",
                ds.name, slot, expression, e
            ));
        }
    }
    if ds.kind == DataSourceKind::UserScript && ds.script.is_none() {
        problems.push(format!("data source '{}': user-script requires `script`", ds.name));
    }
    if let Some(reference) = &ds.reference {
        let resolved = resolve_path(base_dir, reference);
        if !resolved.exists() {
            problems.push(format!(
                "data source '{}': reference '{}' does not exist",
                ds.name,
                resolved.display()
            ));
        }
    }
    problems
}

/// Turns a validated project description into a [`Project`], loading the
/// reference frame of every stream.
pub fn build_project(
    file: &FileConfig,
    base_dir: &Path,
    loader: &dyn FrameLoader,
) -> Result<Project> {
    let problems = validate(file, base_dir);
    if !problems.is_empty() {
        return Err(CliError::Validation(problems));
    }

    let mut project = Project::new();

    let mut streams: HashMap<&str, StreamId> = HashMap::new();
    for stream in &file.stream {
        let files = stream
            .files
            .iter()
            .map(|p| resolve_path(base_dir, p))
            .collect();
        let id = project.add_stream(&stream.name, files, stream.format, stream.flags, loader)?;
        streams.insert(stream.name.as_str(), id);
    }

    let mut sources: HashMap<&str, DataSourceId> = HashMap::new();
    for ds in &file.data_source {
        let stream = *streams
            .get(ds.stream.as_str())
            .ok_or_else(|| CliError::Config(format!("unknown stream '{}'", ds.stream)))?;
        let mut data_source =
            DataSource::new(&ds.name, stream, ds.kind).with_args(&ds.args[..ds.args.len().min(MAX_ARGS)]);
        for (slot, expression) in ds.selections.iter().enumerate() {
            data_source = data_source.with_selection(slot, expression);
        }
        if let Some(reference) = &ds.reference {
            data_source = data_source.with_reference(resolve_path(base_dir, reference));
        }
        if let Some(script) = &ds.script {
            data_source = data_source.with_script(script);
        }
        let id = project.add_data_source(data_source)?;
        sources.insert(ds.name.as_str(), id);
    }

    for result in &file.result {
        let id = project.add_result(&result.name, result.layout, result.y_unit);
        let bindings = result
            .sources
            .iter()
            .map(|b| {
                let data_source = *sources.get(b.data_source.as_str()).ok_or_else(|| {
                    CliError::Config(format!("unknown data source '{}'", b.data_source))
                })?;
                Ok(Binding {
                    scale: b.scale.unwrap_or(1.0),
                    bias: b.bias.unwrap_or(0.0),
                    visible: b.visible.unwrap_or(true),
                    ..Binding::new(data_source)
                })
            })
            .collect::<Result<Vec<_>>>()?;
        project.modify_result(id, |edit| edit.bindings = bindings)?;
    }

    debug!(
        streams = file.stream.len(),
        data_sources = file.data_source.len(),
        results = file.result.len(),
        "Project assembled."
    );
    Ok(project)
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str, what: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| CliError::Config(format!("Invalid {} value for {}: {}", what, key, value)))
}

fn apply_set_values(mut config: FileConfig, set_values: &[String]) -> Result<FileConfig> {
    for kv_pair in set_values {
        let Some((key, value_str)) = kv_pair.split_once('=') else {
            return Err(CliError::Config(format!(
                "Invalid --set format: '{}'. Expected KEY=VALUE.",
                kv_pair
            )));
        };
        let engine = config.engine.get_or_insert_with(Default::default);

        match key {
            "engine.threads" => {
                engine.threads = Some(parse_value(key, value_str, "integer")?);
            }
            "engine.single-threaded" => {
                engine.single_threaded = Some(parse_value(key, value_str, "boolean")?);
            }
            "engine.max-jacobi-sweeps" => {
                engine.max_jacobi_sweeps = Some(parse_value(key, value_str, "integer")?);
            }
            "engine.kernel" => {
                engine.kernel = Some(match value_str {
                    "auto" => KernelPreference::Auto,
                    "scalar" => KernelPreference::Scalar,
                    "simd" => KernelPreference::Simd,
                    other => {
                        return Err(CliError::Config(format!(
                            "Invalid kernel for {}: {} (expected auto, scalar or simd)",
                            key, other
                        )));
                    }
                });
            }
            _ => {
                return Err(CliError::Config(format!(
                    "Unsupported configuration key for --set: '{}'",
                    key
                )));
            }
        }
    }
    Ok(config)
}
