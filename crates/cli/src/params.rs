use std::fs;

use anyhow::{Context, Result, bail};
use serde_json::Value;
use yba_types::{ParamValue, ParameterSet};

use crate::args::ParamArgs;

/// Split `key=value` at the first `=`.
pub fn parse_assignment(text: &str) -> Result<(String, String), String> {
    let (key, value) = text
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{text}'"))?;
    let key = key.trim();
    let valid_key = key.chars().next().is_some_and(|first| first.is_ascii_alphabetic() || first == '_')
        && key.chars().all(|character| character.is_ascii_alphanumeric() || character == '_');
    if !valid_key {
        return Err(format!("'{key}' is not a valid parameter name"));
    }
    Ok((key.to_string(), value.to_string()))
}

/// Build the parameter set from the file, then `--param`, then `--raw`.
pub fn collect_parameters(args: &ParamArgs) -> Result<ParameterSet> {
    let mut parameters = match &args.params_file {
        Some(path) => {
            let text = fs::read_to_string(path).with_context(|| format!("failed to read parameters file {}", path.display()))?;
            let document: Value =
                serde_json::from_str(&text).with_context(|| format!("parameters file {} is not valid JSON", path.display()))?;
            let Some(object) = document.as_object() else {
                bail!("parameters file {} must contain a JSON object", path.display());
            };
            ParameterSet::from_json_object(object)
        }
        None => ParameterSet::new(),
    };

    for (key, value) in &args.params {
        parameters.insert(key.as_str(), ParamValue::parse_auto(value));
    }
    for (key, fragment) in &args.raw {
        parameters.insert(key.as_str(), ParamValue::raw(fragment.as_str()));
    }
    Ok(parameters)
}
