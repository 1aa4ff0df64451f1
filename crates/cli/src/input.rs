// Host data for the CLI: data point feeds, configuration values, scripts.

use std::fs;
use std::path::{Path, PathBuf};

use graphscript_core::{ConfigurationValue, DataPoint, RawDataSample};
use serde::de::DeserializeOwned;

use crate::CliError;

pub fn read_text(path: &Path) -> Result<String, CliError> {
    fs::read_to_string(path).map_err(|e| CliError::io(format!("cannot read {}: {}", path.display(), e)))
}

fn read_json<T: DeserializeOwned>(path: &Path, what: &str) -> Result<T, CliError> {
    let text = read_text(path)?;
    serde_json::from_str(&text).map_err(|e| {
        CliError::usage(format!("{}: invalid {}: {}", path.display(), what, e))
            .with_hint("expected a JSON array, see `gsx --help`")
    })
}

/// A data point file. Points are fed to scripts newest first, so the file
/// is sorted by descending timestamp regardless of its order on disk.
pub fn load_sample(path: &Path) -> Result<RawDataSample, CliError> {
    let mut points: Vec<DataPoint> = read_json(path, "data points")?;
    points.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    log::debug!("{}: {} data points", path.display(), points.len());
    Ok(RawDataSample::new(points))
}

pub fn load_config(path: &Path) -> Result<Vec<ConfigurationValue>, CliError> {
    read_json(path, "configuration values")
}

/// `name=path` from `--source`.
pub fn parse_source(arg: &str) -> Result<(String, PathBuf), String> {
    match arg.split_once('=') {
        Some((name, path)) if !name.is_empty() && !path.is_empty() => {
            Ok((name.to_string(), PathBuf::from(path)))
        }
        _ => Err(format!("expected NAME=FILE, got '{arg}'")),
    }
}
