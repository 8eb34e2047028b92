//! Project description loading and configuration merging.
//!
//! Engine settings are resolved with the precedence CLI flag > `--set` >
//! project file > built-in default; the stream, data source and result
//! tables of the project file are turned into a
//! [`Project`](trajan::engine::project::Project) by [`builder::build_project`].

pub mod builder;
pub mod defaults;
pub mod file;
pub mod models;
