//! Generator engine
//!
//! Turns declarative generator specs into concrete inputs: standard-input
//! text, input-file contents and function arguments. Every realization pulls
//! from one evaluation-scoped random source, so the order in which specs are
//! realized is part of the reproducibility contract.

use std::collections::BTreeMap;

use rand::Rng;
use serde_json::Value;
use tracing::warn;

use crate::exercise::ExerciseSpec;

/// Upper bound on generated list lengths
const MAX_LIST_LEN: usize = 100_000;

const DEFAULT_INTEGER: (i64, i64) = (1, 100);
const DEFAULT_LIST_BOUNDS: (i64, i64) = (0, 9);
const DEFAULT_LIST_COUNT: usize = 5;

/// How the elements of a generated list are joined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Separator {
    #[default]
    Space,
    Newline,
}

impl Separator {
    fn as_str(&self) -> &'static str {
        match self {
            Separator::Space => " ",
            Separator::Newline => "\n",
        }
    }
}

/// One declarative input generator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeneratorSpec {
    /// Uniform integer in `[min, max]`
    Integer { min: i64, max: i64 },
    /// Two uniform integers, each with its own bounds
    IntegerPair { first: (i64, i64), second: (i64, i64) },
    /// `count` uniform integers in `[min, max]`
    IntegerList {
        count: usize,
        min: i64,
        max: i64,
        separator: Separator,
    },
    /// Unrecognized or malformed spec; realizes as an integer in [1, 100]
    Unknown,
}

/// Generator spec that produces the content of a named input file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedGeneratorSpec {
    pub name: String,
    pub spec: GeneratorSpec,
}

impl GeneratorSpec {
    /// Parse a generator object. Never fails: anything unusable becomes `Unknown`.
    pub fn from_value(value: &Value) -> Self {
        let Some(obj) = value.as_object() else {
            warn!("Generator spec is not an object, using default integer: {}", value);
            return GeneratorSpec::Unknown;
        };

        let kind = obj
            .get("generador")
            .or_else(|| obj.get("kind"))
            .and_then(Value::as_str)
            .unwrap_or("");

        let int = |key: &str| obj.get(key).and_then(as_i64);
        let shared = (
            int("min").unwrap_or(DEFAULT_INTEGER.0),
            int("max").unwrap_or(DEFAULT_INTEGER.1),
        );

        match kind {
            "entero" | "integer" => {
                let (min, max) = ordered(shared);
                GeneratorSpec::Integer { min, max }
            }
            "par_enteros" | "pareja_enteros" | "integer_pair" => {
                let first = match (int("min1"), int("max1")) {
                    (Some(lo), Some(hi)) => (lo, hi),
                    _ => shared,
                };
                let second = match (int("min2"), int("max2")) {
                    (Some(lo), Some(hi)) => (lo, hi),
                    _ => shared,
                };
                GeneratorSpec::IntegerPair {
                    first: ordered(first),
                    second: ordered(second),
                }
            }
            "lista_enteros" | "integer_list" => {
                let count = int("cantidad")
                    .or_else(|| int("count"))
                    .map(|n| n.clamp(0, MAX_LIST_LEN as i64) as usize)
                    .unwrap_or(DEFAULT_LIST_COUNT);
                let (min, max) = ordered((
                    int("min").unwrap_or(DEFAULT_LIST_BOUNDS.0),
                    int("max").unwrap_or(DEFAULT_LIST_BOUNDS.1),
                ));
                let separator = match obj
                    .get("separador")
                    .or_else(|| obj.get("separator"))
                    .and_then(Value::as_str)
                {
                    Some("linea" | "línea" | "newline" | "\n") => Separator::Newline,
                    _ => Separator::Space,
                };
                GeneratorSpec::IntegerList {
                    count,
                    min,
                    max,
                    separator,
                }
            }
            other => {
                warn!("Unknown generator kind '{}', using default integer", other);
                GeneratorSpec::Unknown
            }
        }
    }

    /// Realize as text (stdin or file content). Always ends with a newline.
    pub fn realize<R: Rng + ?Sized>(&self, rng: &mut R) -> String {
        match self {
            GeneratorSpec::Integer { min, max } => format!("{}\n", rng.gen_range(*min..=*max)),
            GeneratorSpec::IntegerPair { first, second } => {
                let a = rng.gen_range(first.0..=first.1);
                let b = rng.gen_range(second.0..=second.1);
                format!("{} {}\n", a, b)
            }
            GeneratorSpec::IntegerList {
                count,
                min,
                max,
                separator,
            } => {
                let items: Vec<String> = (0..*count)
                    .map(|_| rng.gen_range(*min..=*max).to_string())
                    .collect();
                format!("{}\n", items.join(separator.as_str()))
            }
            GeneratorSpec::Unknown => {
                format!("{}\n", rng.gen_range(DEFAULT_INTEGER.0..=DEFAULT_INTEGER.1))
            }
        }
    }

    /// Realize as a typed value (function argument)
    pub fn realize_value<R: Rng + ?Sized>(&self, rng: &mut R) -> Value {
        match self {
            GeneratorSpec::Integer { min, max } => Value::from(rng.gen_range(*min..=*max)),
            GeneratorSpec::IntegerPair { first, second } => {
                let a = rng.gen_range(first.0..=first.1);
                let b = rng.gen_range(second.0..=second.1);
                Value::from(vec![a, b])
            }
            GeneratorSpec::IntegerList {
                count, min, max, ..
            } => Value::from(
                (0..*count)
                    .map(|_| rng.gen_range(*min..=*max))
                    .collect::<Vec<i64>>(),
            ),
            GeneratorSpec::Unknown => {
                Value::from(rng.gen_range(DEFAULT_INTEGER.0..=DEFAULT_INTEGER.1))
            }
        }
    }
}

impl NamedGeneratorSpec {
    /// Parse a named generator. Returns `None` when there is no usable name.
    pub fn from_value(value: &Value) -> Option<Self> {
        let name = value
            .get("nombre")
            .or_else(|| value.get("name"))
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|n| !n.is_empty())?;

        Some(Self {
            name: name.to_string(),
            spec: GeneratorSpec::from_value(value),
        })
    }
}

/// Concrete inputs shared verbatim by the reference and candidate runs
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeneratedInputs {
    pub standard_input: String,
    pub input_files: BTreeMap<String, String>,
    pub arguments: Vec<Value>,
}

/// Realize every generator of an exercise, in declaration order:
/// stdin specs, then file specs, then argument specs.
///
/// `fixed_stdin` is used when the exercise declares no stdin generators.
pub fn generate_inputs<R: Rng + ?Sized>(
    spec: &ExerciseSpec,
    fixed_stdin: &str,
    rng: &mut R,
) -> GeneratedInputs {
    let standard_input = if spec.input_specs.is_empty() {
        fixed_stdin.to_string()
    } else {
        spec.input_specs
            .iter()
            .map(|g| g.realize(rng))
            .collect::<String>()
    };

    let mut input_files = BTreeMap::new();
    for file in &spec.file_input_specs {
        let content = file.spec.realize(rng);
        input_files.insert(file.name.clone(), content);
    }

    let arguments = spec
        .argument_specs
        .iter()
        .map(|g| g.realize_value(rng))
        .collect();

    GeneratedInputs {
        standard_input,
        input_files,
        arguments,
    }
}

fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn ordered((lo, hi): (i64, i64)) -> (i64, i64) {
    if lo <= hi {
        (lo, hi)
    } else {
        warn!("Generator bounds [{}, {}] are reversed, swapping", lo, hi);
        (hi, lo)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use serde_json::json;

    fn rng() -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(42)
    }

    #[test]
    fn test_integer_in_range_with_newline() {
        let spec = GeneratorSpec::from_value(&json!({"generador": "entero", "min": 3, "max": 7}));
        let mut rng = rng();
        for _ in 0..50 {
            let text = spec.realize(&mut rng);
            assert!(text.ends_with('\n'));
            assert_eq!(text.matches('\n').count(), 1);
            let n: i64 = text.trim_end().parse().unwrap();
            assert!((3..=7).contains(&n));
        }
    }

    #[test]
    fn test_integer_fixed_value() {
        let spec = GeneratorSpec::from_value(&json!({"generador": "entero", "min": 5, "max": 5}));
        assert_eq!(spec.realize(&mut rng()), "5\n");
        assert_eq!(spec.realize_value(&mut rng()), json!(5));
    }

    #[test]
    fn test_pair_uses_per_value_bounds() {
        let spec = GeneratorSpec::from_value(&json!({
            "generador": "par_enteros",
            "min1": 1, "max1": 1,
            "min2": 9, "max2": 9
        }));
        assert_eq!(spec.realize(&mut rng()), "1 9\n");
    }

    #[test]
    fn test_pair_falls_back_to_shared_bounds() {
        let spec = GeneratorSpec::from_value(&json!({
            "generador": "integer_pair",
            "min": 4, "max": 4,
            "min1": 0
        }));
        assert_eq!(
            spec,
            GeneratorSpec::IntegerPair {
                first: (4, 4),
                second: (4, 4)
            }
        );
        assert_eq!(spec.realize_value(&mut rng()), json!([4, 4]));
    }

    #[test]
    fn test_list_count_and_bounds() {
        let spec = GeneratorSpec::from_value(&json!({
            "generador": "lista_enteros",
            "cantidad": 12, "min": -2, "max": 2
        }));
        let text = spec.realize(&mut rng());
        assert!(text.ends_with('\n'));
        let values: Vec<i64> = text.split_whitespace().map(|v| v.parse().unwrap()).collect();
        assert_eq!(values.len(), 12);
        assert!(values.iter().all(|v| (-2..=2).contains(v)));
    }

    #[test]
    fn test_list_defaults_and_newline_separator() {
        let spec = GeneratorSpec::from_value(&json!({"generador": "lista_enteros", "separador": "linea"}));
        let text = spec.realize(&mut rng());
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), DEFAULT_LIST_COUNT);
        assert!(lines.iter().all(|l| (0..=9).contains(&l.parse::<i64>().unwrap())));
    }

    #[test]
    fn test_unknown_and_malformed_fall_back() {
        for value in [json!({"generador": "matriz"}), json!("entero"), json!(17), json!(null)] {
            let spec = GeneratorSpec::from_value(&value);
            assert_eq!(spec, GeneratorSpec::Unknown);
            let n: i64 = spec.realize(&mut rng()).trim_end().parse().unwrap();
            assert!((1..=100).contains(&n));
        }
    }

    #[test]
    fn test_reversed_bounds_are_swapped() {
        let spec = GeneratorSpec::from_value(&json!({"generador": "entero", "min": 10, "max": 2}));
        assert_eq!(spec, GeneratorSpec::Integer { min: 2, max: 10 });
    }

    #[test]
    fn test_named_spec_requires_name() {
        assert!(NamedGeneratorSpec::from_value(&json!({"generador": "entero"})).is_none());
        assert!(NamedGeneratorSpec::from_value(&json!({"nombre": "  ", "generador": "entero"})).is_none());
        let named = NamedGeneratorSpec::from_value(&json!({"nombre": "datos.txt", "generador": "entero"})).unwrap();
        assert_eq!(named.name, "datos.txt");
    }

    #[test]
    fn test_same_seed_same_sequence() {
        let specs = [
            GeneratorSpec::Integer { min: 0, max: 1000 },
            GeneratorSpec::IntegerList {
                count: 8,
                min: 0,
                max: 1000,
                separator: Separator::Space,
            },
        ];
        let run = || {
            let mut rng = ChaCha8Rng::seed_from_u64(7);
            specs.iter().map(|s| s.realize(&mut rng)).collect::<String>()
        };
        assert_eq!(run(), run());
    }
}
