//! Exercise parameters
//!
//! Parses the parameter record supplied by the delivery layer into an
//! immutable `ExerciseSpec`. Nothing here fails an evaluation: unparsable
//! input yields the default spec and unusable fields fall back to their
//! documented defaults.

use std::collections::BTreeMap;

use serde_json::{Map, Value};
use tracing::warn;

use crate::error::SpecError;
use crate::generator::{GeneratorSpec, NamedGeneratorSpec};

pub const DEFAULT_EXERCISE_NAME: &str = "ejercicio_sin_nombre";
pub const DEFAULT_REFERENCE_FUNCTION: &str = "sol_patron";
pub const DEFAULT_CANDIDATE_FUNCTION: &str = "resolver";

/// How reference and candidate are exercised
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExerciseKind {
    /// Run both as whole programs and compare stdout and output files
    #[default]
    Program,
    /// Call a named function on each side and compare return values
    Function,
}

/// Function names used in function mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionNames {
    pub reference: String,
    pub candidate: String,
}

impl Default for FunctionNames {
    fn default() -> Self {
        Self {
            reference: DEFAULT_REFERENCE_FUNCTION.to_string(),
            candidate: DEFAULT_CANDIDATE_FUNCTION.to_string(),
        }
    }
}

/// Fully parsed exercise description
#[derive(Debug, Clone, PartialEq)]
pub struct ExerciseSpec {
    pub exercise_id: String,
    pub kind: ExerciseKind,
    pub function_names: FunctionNames,
    pub input_specs: Vec<GeneratorSpec>,
    pub file_input_specs: Vec<NamedGeneratorSpec>,
    pub argument_specs: Vec<GeneratorSpec>,
    /// Declared output files, `None` when the exercise declares none
    pub output_file_names: Option<Vec<String>>,
    pub restrictions: BTreeMap<String, bool>,
    /// Whether attachments are shuffled before the runs
    pub shuffle_attachments: bool,
}

impl Default for ExerciseSpec {
    fn default() -> Self {
        Self {
            exercise_id: DEFAULT_EXERCISE_NAME.to_string(),
            kind: ExerciseKind::Program,
            function_names: FunctionNames::default(),
            input_specs: Vec::new(),
            file_input_specs: Vec::new(),
            argument_specs: Vec::new(),
            output_file_names: None,
            restrictions: BTreeMap::new(),
            shuffle_attachments: true,
        }
    }
}

impl ExerciseSpec {
    /// Parse parameters given as JSON text, degrading to the default spec.
    pub fn parse_or_default(raw: &str) -> Self {
        if raw.trim().is_empty() {
            return Self::default();
        }
        match Self::try_parse(raw) {
            Ok(spec) => spec,
            Err(e) => {
                warn!("Invalid exercise parameters, using defaults: {}", e);
                Self::default()
            }
        }
    }

    /// Parse parameters given as JSON text
    pub fn try_parse(raw: &str) -> Result<Self, SpecError> {
        let value: Value = serde_json::from_str(raw)?;
        Self::from_value(&value)
    }

    /// Build a spec from an already-decoded parameter record
    pub fn from_value(value: &Value) -> Result<Self, SpecError> {
        let obj = value.as_object().ok_or(SpecError::NotAnObject(type_name(value)))?;
        Ok(Self::from_map(obj))
    }

    fn from_map(obj: &Map<String, Value>) -> Self {
        let defaults = Self::default();
        let text = |key: &str| {
            obj.get(key)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        let kind = match text("tipo").as_deref() {
            None | Some("programa") => ExerciseKind::Program,
            Some("funcion") | Some("función") => ExerciseKind::Function,
            Some(other) => {
                warn!("Unknown exercise type '{}', treating as programa", other);
                ExerciseKind::Program
            }
        };

        let function_names = FunctionNames {
            reference: text("nombre_funcion_patron").unwrap_or(defaults.function_names.reference),
            candidate: text("nombre_funcion_alumno").unwrap_or(defaults.function_names.candidate),
        };

        let input_specs = as_list(obj.get("entrada_estandar"))
            .iter()
            .map(GeneratorSpec::from_value)
            .collect();

        let file_input_specs = as_list(obj.get("ficheros_entrada"))
            .iter()
            .filter_map(|v| {
                let named = NamedGeneratorSpec::from_value(v);
                if named.is_none() {
                    warn!("Skipping input file spec without a name: {}", v);
                }
                named
            })
            .collect();

        let argument_specs = as_list(obj.get("argumentos"))
            .iter()
            .map(GeneratorSpec::from_value)
            .collect();

        let output_file_names = obj.get("ficheros_salida").map(|v| {
            let mut names: Vec<String> = Vec::new();
            for item in as_list(Some(v)) {
                let name = match &item {
                    Value::String(s) => Some(s.as_str()),
                    other => other
                        .get("nombre")
                        .or_else(|| other.get("name"))
                        .and_then(Value::as_str),
                };
                match name.map(str::trim).filter(|n| !n.is_empty()) {
                    Some(n) if !names.iter().any(|existing| existing == n) => {
                        names.push(n.to_string())
                    }
                    Some(_) => {}
                    None => warn!("Skipping output file descriptor without a name: {}", item),
                }
            }
            names
        });

        let restrictions = match obj.get("restricciones") {
            Some(Value::Object(map)) => map
                .iter()
                .map(|(k, v)| (k.clone(), truthy(v)))
                .collect(),
            Some(Value::Null) | None => BTreeMap::new(),
            Some(other) => {
                warn!("Ignoring restricciones that is not an object: {}", other);
                BTreeMap::new()
            }
        };

        let shuffle_attachments = obj
            .get("barajar_adjuntos")
            .map(truthy)
            .unwrap_or(defaults.shuffle_attachments);

        Self {
            exercise_id: text("ejercicio").unwrap_or(defaults.exercise_id),
            kind,
            function_names,
            input_specs,
            file_input_specs,
            argument_specs,
            output_file_names,
            restrictions,
            shuffle_attachments,
        }
    }

    /// Declared output files merged with extra names, first occurrence wins
    pub fn output_files_with(&self, extra: &[String]) -> Vec<String> {
        let mut names: Vec<String> = self.output_file_names.clone().unwrap_or_default();
        for name in extra {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
        names
    }
}

/// Any non-list value is a single-element list; null or absent is empty.
fn as_list(value: Option<&Value>) -> Vec<Value> {
    match value {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items.clone(),
        Some(other) => vec![other.clone()],
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => matches!(
            s.trim().to_lowercase().as_str(),
            "true" | "1" | "si" | "sí" | "yes"
        ),
        _ => false,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
