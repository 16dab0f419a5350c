//! Template substitution engine.
//!
//! A template is a JSON document containing `$identifier` placeholders. The
//! text is scanned once into literal text and typed slots; the scanner tracks
//! whether each placeholder sits outside any string, fills a whole string
//! (`"$volume_size"`), or is embedded in a larger string
//! (`"s3://$bucket_name"`). The slot position and the parameter's type then
//! decide how the value is written:
//!
//! | value       | whole string `"$x"`  | embedded `"a-$x"`    | bare `$x`      |
//! |-------------|----------------------|----------------------|----------------|
//! | string      | quoted, escaped      | escaped              | quoted, escaped|
//! | number/bool | unquoted             | as text              | unquoted       |
//! | raw         | verbatim, unquoted   | verbatim             | verbatim       |
//!
//! Grammar: `$name` takes the longest identifier (`[A-Za-z_][A-Za-z0-9_]*`),
//! `${name}` is the delimited form, and `$$` is a literal dollar sign. Values
//! are never re-scanned, so a parameter containing `$` cannot introduce a new
//! placeholder.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use thiserror::Error;
use tracing::debug;
use yba_types::{ParamValue, ParameterSet};

/// Stage at which a template failed to parse as JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStage {
    BeforeSubstitution,
    AfterSubstitution,
}

impl fmt::Display for RenderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BeforeSubstitution => f.write_str("before substitution"),
            Self::AfterSubstitution => f.write_str("after substitution"),
        }
    }
}

/// Errors raised while loading or rendering a template.
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("template '{template}' has unresolved placeholders: {}", .names.join(", "))]
    UnresolvedPlaceholder { template: String, names: Vec<String> },

    #[error("template '{template}' is malformed {stage}: {reason}")]
    MalformedTemplate {
        template: String,
        stage: RenderStage,
        reason: String,
    },

    #[error("failed to read template {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl TemplateError {
    /// Placeholder names missing from the parameter set, if that is the failure.
    pub fn unresolved_names(&self) -> &[String] {
        match self {
            Self::UnresolvedPlaceholder { names, .. } => names,
            _ => &[],
        }
    }
}

/// Where a placeholder sits relative to JSON string literals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotPosition {
    /// Outside any string: `"size": $volume_size`.
    Bare,
    /// The entire content of a string, quotes consumed: `"$volume_size"`.
    WholeString,
    /// Part of a larger string: `"s3://$bucket_name"`.
    Embedded,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Text(String),
    Slot { name: String, position: SlotPosition },
}

/// A parsed template, immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    name: String,
    segments: Vec<Segment>,
}

impl Template {
    /// Scan `text` into segments and check that its structure is valid JSON
    /// with every placeholder standing in as a neutral value.
    pub fn parse(name: impl Into<String>, text: &str) -> Result<Self, TemplateError> {
        let name = name.into();
        let segments = scan(&name, text)?;
        let template = Self { name, segments };
        template.check_structure()?;
        Ok(template)
    }

    /// Load a template from disk. Templates are read fresh on every call.
    pub fn load(path: &Path) -> Result<Self, TemplateError> {
        let text = fs::read_to_string(path).map_err(|source| TemplateError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "loaded template");
        Self::parse(path.display().to_string(), &text)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Distinct placeholder names in order of first appearance.
    pub fn placeholders(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for segment in &self.segments {
            if let Segment::Slot { name, .. } = segment
                && !names.contains(&name.as_str())
            {
                names.push(name);
            }
        }
        names
    }

    /// Substitute `parameters` and return the rendered text.
    pub fn render_text(&self, parameters: &ParameterSet) -> Result<String, TemplateError> {
        let missing = self
            .placeholders()
            .into_iter()
            .filter(|name| !parameters.contains_key(name))
            .map(str::to_string)
            .collect::<Vec<_>>();
        if !missing.is_empty() {
            return Err(TemplateError::UnresolvedPlaceholder {
                template: self.name.clone(),
                names: missing,
            });
        }

        Ok(self.assemble(|name, position| match parameters.get(name) {
            Some(value) => write_slot(value, position),
            None => String::new(),
        }))
    }

    /// Substitute `parameters` and parse the result into a JSON document.
    pub fn render(&self, parameters: &ParameterSet) -> Result<Value, TemplateError> {
        let text = self.render_text(parameters)?;
        serde_json::from_str(&text).map_err(|error| TemplateError::MalformedTemplate {
            template: self.name.clone(),
            stage: RenderStage::AfterSubstitution,
            reason: error.to_string(),
        })
    }

    fn check_structure(&self) -> Result<(), TemplateError> {
        let probe = self.assemble(|_, position| match position {
            SlotPosition::Bare | SlotPosition::WholeString => "null".to_string(),
            SlotPosition::Embedded => String::new(),
        });
        serde_json::from_str::<Value>(&probe)
            .map(|_| ())
            .map_err(|error| TemplateError::MalformedTemplate {
                template: self.name.clone(),
                stage: RenderStage::BeforeSubstitution,
                reason: error.to_string(),
            })
    }

    fn assemble<F>(&self, mut slot_text: F) -> String
    where
        F: FnMut(&str, SlotPosition) -> String,
    {
        let mut output = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => output.push_str(text),
                Segment::Slot { name, position } => output.push_str(&slot_text(name, *position)),
            }
        }
        output
    }
}

/// Render `template` with `parameters`.
pub fn render(template: &Template, parameters: &ParameterSet) -> Result<Value, TemplateError> {
    template.render(parameters)
}

fn write_slot(value: &ParamValue, position: SlotPosition) -> String {
    match position {
        SlotPosition::Bare | SlotPosition::WholeString => value.to_bare_text(),
        SlotPosition::Embedded => value.to_embedded_text(),
    }
}

fn scan(template: &str, text: &str) -> Result<Vec<Segment>, TemplateError> {
    let characters: Vec<char> = text.chars().collect();
    let mut segments = Vec::new();
    let mut buffer = String::new();
    let mut in_string = false;
    let mut escaped = false;
    // Characters written since the current string literal opened.
    let mut string_length = 0usize;
    let mut index = 0usize;

    while index < characters.len() {
        let character = characters[index];

        if in_string && escaped {
            buffer.push(character);
            escaped = false;
            string_length += 1;
            index += 1;
            continue;
        }

        match character {
            '\\' if in_string => {
                buffer.push(character);
                escaped = true;
                string_length += 1;
                index += 1;
            }
            '"' => {
                buffer.push(character);
                in_string = !in_string;
                string_length = 0;
                index += 1;
            }
            '$' => {
                if characters.get(index + 1) == Some(&'$') {
                    buffer.push('$');
                    string_length += 1;
                    index += 2;
                    continue;
                }

                let (name, next_index) = read_placeholder(template, text, &characters, index)?;
                let closes_string = in_string && string_length == 0 && characters.get(next_index) == Some(&'"');
                let position = if !in_string {
                    SlotPosition::Bare
                } else if closes_string {
                    SlotPosition::WholeString
                } else {
                    SlotPosition::Embedded
                };

                if position == SlotPosition::WholeString {
                    // The slot owns both quotes.
                    buffer.pop();
                    in_string = false;
                    index = next_index + 1;
                } else {
                    string_length += 1;
                    index = next_index;
                }

                if !buffer.is_empty() {
                    segments.push(Segment::Text(std::mem::take(&mut buffer)));
                }
                segments.push(Segment::Slot { name, position });
            }
            _ => {
                buffer.push(character);
                if in_string {
                    string_length += 1;
                }
                index += 1;
            }
        }
    }

    if !buffer.is_empty() {
        segments.push(Segment::Text(buffer));
    }
    Ok(segments)
}

/// Read the placeholder starting at `start` (which holds `$`), returning its
/// name and the index just past it.
fn read_placeholder(template: &str, text: &str, characters: &[char], start: usize) -> Result<(String, usize), TemplateError> {
    let invalid = |reason: &str| TemplateError::MalformedTemplate {
        template: template.to_string(),
        stage: RenderStage::BeforeSubstitution,
        reason: format!("{reason} at line {}", line_of(text, characters, start)),
    };

    let braced = characters.get(start + 1) == Some(&'{');
    let name_start = if braced { start + 2 } else { start + 1 };

    match characters.get(name_start) {
        Some(first) if first.is_ascii_alphabetic() || *first == '_' => {}
        _ => return Err(invalid("invalid placeholder; use `$$` for a literal dollar sign")),
    }

    let mut name_end = name_start;
    while characters
        .get(name_end)
        .is_some_and(|character| character.is_ascii_alphanumeric() || *character == '_')
    {
        name_end += 1;
    }
    let name: String = characters[name_start..name_end].iter().collect();

    if braced {
        if characters.get(name_end) != Some(&'}') {
            return Err(invalid("unterminated `${` placeholder"));
        }
        return Ok((name, name_end + 1));
    }
    Ok((name, name_end))
}

fn line_of(text: &str, characters: &[char], index: usize) -> usize {
    debug_assert_eq!(text.chars().count(), characters.len());
    characters[..index].iter().filter(|character| **character == '\n').count() + 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params() -> ParameterSet {
        ParameterSet::new()
            .with("name", "demo")
            .with("volume_size", 5i64)
            .with("enable", true)
            .with("ratio", 0.5)
            .with("bucket_name", "backups")
            .with("region_list", ParamValue::quoted_list(["r-1", "r-2"]))
    }

    #[test]
    fn numbers_and_booleans_render_unquoted_in_whole_string_slots() {
        let template = Template::parse("t", r#"{ "size": "$volume_size", "enabled": "$enable", "ratio": "$ratio" }"#).expect("parse");
        let rendered = template.render(&params()).expect("render");
        assert_eq!(rendered, json!({ "size": 5, "enabled": true, "ratio": 0.5 }));
    }

    #[test]
    fn strings_stay_quoted_and_escaped() {
        let template = Template::parse("t", r#"{ "name": "$name", "secret": "$secret" }"#).expect("parse");
        let parameters = params().with("secret", "{\"auths\": {\"r\": 1}}\n");
        let rendered = template.render(&parameters).expect("render");
        assert_eq!(rendered["name"], json!("demo"));
        assert_eq!(rendered["secret"], json!("{\"auths\": {\"r\": 1}}\n"));
    }

    #[test]
    fn embedded_slots_join_the_surrounding_string() {
        let template = Template::parse("t", r#"{ "location": "s3://$bucket_name/$volume_size-gb", "literal": "cost: $$5" }"#).expect("parse");
        let rendered = template.render(&params()).expect("render");
        assert_eq!(rendered["location"], json!("s3://backups/5-gb"));
        assert_eq!(rendered["literal"], json!("cost: $5"));
    }

    #[test]
    fn raw_fragments_inject_lists() {
        let template = Template::parse("t", r#"{ "regionList": [$region_list], "count": $volume_size }"#).expect("parse");
        let rendered = template.render(&params()).expect("render");
        assert_eq!(rendered, json!({ "regionList": ["r-1", "r-2"], "count": 5 }));
    }

    #[test]
    fn longest_identifier_wins_over_prefixes() {
        let template = Template::parse("t", r#"{ "a": "$name", "b": "$name_suffix", "c": "${name}_suffix" }"#).expect("parse");
        let parameters = ParameterSet::new().with("name", "short").with("name_suffix", "long");
        let rendered = template.render(&parameters).expect("render");
        assert_eq!(rendered, json!({ "a": "short", "b": "long", "c": "short_suffix" }));
    }

    #[test]
    fn missing_parameters_are_reported_not_emitted() {
        let template = Template::parse("t", r#"{ "a": "$name", "b": "$zone", "c": $count, "d": "$zone" }"#).expect("parse");
        let error = template.render(&ParameterSet::new().with("name", "x")).expect_err("missing");
        assert!(matches!(error, TemplateError::UnresolvedPlaceholder { .. }));
        assert_eq!(error.unresolved_names(), ["zone".to_string(), "count".to_string()]);
    }

    #[test]
    fn extra_parameters_are_ignored() {
        let template = Template::parse("t", r#"{ "a": "$name" }"#).expect("parse");
        let rendered = template.render(&params().with("unused", 1i64)).expect("render");
        assert_eq!(rendered, json!({ "a": "demo" }));
    }

    #[test]
    fn values_are_not_rescanned() {
        let template = Template::parse("t", r#"{ "password": "$name" }"#).expect("parse");
        let rendered = template.render(&ParameterSet::new().with("name", "Pa$word")).expect("render");
        assert_eq!(rendered["password"], json!("Pa$word"));
    }

    #[test]
    fn structurally_broken_templates_fail_before_substitution() {
        let error = Template::parse("broken", r#"{ "a": "$name", }"#).expect_err("trailing comma");
        assert!(matches!(
            error,
            TemplateError::MalformedTemplate {
                stage: RenderStage::BeforeSubstitution,
                ..
            }
        ));
    }

    #[test]
    fn stray_dollar_is_malformed() {
        let error = Template::parse("t", "{\n \"a\": \"$1\" }").expect_err("stray dollar");
        assert!(error.to_string().contains("line 2"), "{error}");
    }

    #[test]
    fn raw_fragments_that_break_structure_fail_after_substitution() {
        let template = Template::parse("t", r#"{ "regions": [$region_list] }"#).expect("parse");
        let error = template
            .render(&ParameterSet::new().with("region_list", ParamValue::raw("\"a\",")))
            .expect_err("dangling comma");
        assert!(matches!(
            error,
            TemplateError::MalformedTemplate {
                stage: RenderStage::AfterSubstitution,
                ..
            }
        ));
    }

    #[test]
    fn placeholders_are_listed_once_in_order() {
        let template = Template::parse("t", r#"{ "a": "$b", "c": "$a", "d": "x-$b" }"#).expect("parse");
        assert_eq!(template.placeholders(), vec!["b", "a"]);
    }

    #[test]
    fn load_reads_templates_from_disk() {
        let directory = tempfile::tempdir().expect("tempdir");
        let path = directory.path().join("backup.json");
        fs::write(&path, r#"{ "configName": "$configuration_name" }"#).expect("write template");

        let template = Template::load(&path).expect("load");
        let rendered = template.render(&ParameterSet::new().with("configuration_name", "nightly")).expect("render");
        assert_eq!(rendered, json!({ "configName": "nightly" }));

        let missing = Template::load(&directory.path().join("absent.json")).expect_err("missing file");
        assert!(matches!(missing, TemplateError::Io { .. }));
    }
}
