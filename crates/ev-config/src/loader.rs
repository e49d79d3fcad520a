//! JSON loaders.
//!
//! The `*_path` functions open a file; the `*_reader` variants accept any
//! `Read` source, which is what the tests use (`std::io::Cursor`).
//!
//! Loading only parses.  Call [`crate::validate`] (or
//! [`Scenario::validate`]) before handing the result to a run.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use crate::schema::{Scenario, SimulationConfig};
use crate::ConfigResult;

/// Parse a [`SimulationConfig`] from a JSON file.
pub fn load_config_path(path: &Path) -> ConfigResult<SimulationConfig> {
    let file = File::open(path)?;
    load_config_reader(BufReader::new(file))
}

/// Like [`load_config_path`] but accepts any `Read` source.
pub fn load_config_reader<R: Read>(reader: R) -> ConfigResult<SimulationConfig> {
    Ok(serde_json::from_reader(reader)?)
}

/// Parse a [`Scenario`] (walkable area + config + parameters) from a JSON file.
pub fn load_scenario_path(path: &Path) -> ConfigResult<Scenario> {
    let file = File::open(path)?;
    load_scenario_reader(BufReader::new(file))
}

pub fn load_scenario_reader<R: Read>(reader: R) -> ConfigResult<Scenario> {
    Ok(serde_json::from_reader(reader)?)
}
