//! Evaluation pipeline
//!
//! One request is processed strictly in order: restriction check, seeding,
//! input generation, attachment shuffling, reference run, snapshot,
//! candidate run, snapshot, comparison, report. Every path ends in a
//! well-formed `EvaluationResult`.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info, warn};

use crate::comparator::{self, ExecutionResult, Verdict};
use crate::config::GraderConfig;
use crate::error::InvocationError;
use crate::exercise::{ExerciseKind, ExerciseSpec};
use crate::fingerprint::stable_seed;
use crate::generator::{generate_inputs, GeneratedInputs};
use crate::invoker::{DriverInvoker, FunctionInvoker};
use crate::outcome::Outcome;
use crate::report::{self, EvaluationResult, RunView};
use crate::restrictions::RestrictionChecker;
use crate::runner::{ProcessRunner, RunLimits, Runner};
use crate::runtimes::{RuntimeConfig, RuntimeRegistry};
use crate::workspace::{self, Workspace};

/// One evaluation request, as delivered by the templating layer
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvaluationRequest {
    /// Caller-chosen identifier (used as the worker result key)
    #[serde(default)]
    pub id: String,
    /// Exercise parameter record, as an object or as JSON text
    #[serde(default)]
    pub params: Value,
    /// Reference program, or source defining the reference function
    pub reference: String,
    /// Candidate source
    pub submission: String,
    /// Test driver appended to the candidate program
    #[serde(default)]
    pub test_code: String,
    /// Fixed stdin, used when no stdin generator is declared
    #[serde(default)]
    pub stdin: String,
    /// Extra output file names, one per line
    #[serde(default)]
    pub extra: String,
    /// Attachment file names in the attachments directory
    #[serde(default)]
    pub attachments: Vec<String>,
    /// Runtime name; the configured default when absent
    #[serde(default)]
    pub runtime: Option<String>,
}

impl EvaluationRequest {
    /// Raw parameter text, as it takes part in the fingerprint
    pub fn params_text(&self) -> String {
        match &self.params {
            Value::Null => String::new(),
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }

    pub fn exercise(&self) -> ExerciseSpec {
        match &self.params {
            Value::Object(_) => ExerciseSpec::from_value(&self.params).unwrap_or_default(),
            _ => ExerciseSpec::parse_or_default(&self.params_text()),
        }
    }

    /// Output file names listed in `extra`
    pub fn extra_output_files(&self) -> Vec<String> {
        self.extra
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Seed derived from the author-fixed parts of the test and the submission
    pub fn fingerprint(&self) -> u32 {
        let params = self.params_text();
        let stable = [
            self.stdin.as_str(),
            self.test_code.as_str(),
            self.extra.as_str(),
            params.as_str(),
        ];
        stable_seed(&stable, &self.submission)
    }
}

/// Runs reference and candidate and grades the candidate
pub struct Evaluator {
    config: GraderConfig,
    runtimes: RuntimeRegistry,
    invoker: Option<Arc<dyn FunctionInvoker>>,
}

/// Early exit from the pipeline with a finished report
struct Finished {
    result: EvaluationResult,
    outcome: Outcome,
}

impl Evaluator {
    pub fn new(config: GraderConfig, runtimes: RuntimeRegistry) -> Self {
        Self {
            config,
            runtimes,
            invoker: None,
        }
    }

    /// Use `invoker` for function-mode exercises instead of the runtime driver
    pub fn with_invoker(mut self, invoker: Arc<dyn FunctionInvoker>) -> Self {
        self.invoker = Some(invoker);
        self
    }

    /// Evaluate a request. Never fails: internal errors become a zero-score report.
    pub async fn evaluate(&self, request: &EvaluationRequest) -> EvaluationResult {
        let finished = match self.try_evaluate(request).await {
            Ok(finished) => finished,
            Err(e) => {
                error!("Evaluation {} failed internally: {:#}", request.id, e);
                Finished {
                    result: report::error_report(
                        "Error interno del corrector",
                        "Error interno",
                        &format!("{:#}", e),
                    ),
                    outcome: Outcome::SystemError,
                }
            }
        };

        info!(
            "Evaluation summary: id={}, outcome={}, fraction={}",
            request.id, finished.outcome, finished.result.fraction
        );
        finished.result
    }

    fn runtime_for(&self, request: &EvaluationRequest) -> Result<&RuntimeConfig> {
        if let Some(name) = request.runtime.as_deref() {
            match self.runtimes.get(name) {
                Some(runtime) => return Ok(runtime),
                None => warn!(
                    "Unknown runtime '{}', falling back to '{}'",
                    name, self.config.default_runtime
                ),
            }
        }
        self.runtimes
            .get(&self.config.default_runtime)
            .with_context(|| format!("Default runtime '{}' is not configured", self.config.default_runtime))
    }

    async fn try_evaluate(&self, request: &EvaluationRequest) -> Result<Finished> {
        let spec = request.exercise();
        let runtime = self.runtime_for(request)?;
        info!(
            "Evaluating {}: exercise={}, kind={:?}",
            request.id, spec.exercise_id, spec.kind
        );

        // Gate: forbidden constructs block the whole evaluation
        let restriction =
            RestrictionChecker::new(runtime.comment_prefix.as_str()).check(&request.submission, &spec.restrictions);
        if restriction.blocked {
            return Ok(Finished {
                result: report::error_report(
                    "Incorrecto: el código usa construcciones no permitidas",
                    "Restricciones incumplidas",
                    &restriction.violations.join("\n"),
                ),
                outcome: Outcome::RestrictionViolation,
            });
        }

        let seed = request.fingerprint();
        let mut rng = ChaCha8Rng::seed_from_u64(u64::from(seed));
        let inputs = generate_inputs(&spec, &request.stdin, &mut rng);

        let workspace = Workspace::create(self.config.scratch_root.as_deref(), self.config.worker_id)?;
        let mut input_files: BTreeMap<String, Vec<u8>> = inputs
            .input_files
            .iter()
            .map(|(name, content)| (name.clone(), content.clone().into_bytes()))
            .collect();
        let attachments = workspace.stage_attachments(
            &request.attachments,
            &self.config.attachments_dir,
            seed,
            spec.shuffle_attachments,
        )?;
        for (name, bytes) in attachments {
            if input_files.insert(name.clone(), bytes).is_some() {
                warn!("Attachment {} replaces a generated input file", name);
            }
        }

        let limits = RunLimits::new(self.config.timeout_ms);
        let runner: Arc<dyn Runner> = Arc::new(ProcessRunner::new(runtime.clone()));

        let context = RunContext {
            request,
            spec: &spec,
            runtime,
            inputs: &inputs,
            input_files: &input_files,
            workspace: &workspace,
            limits,
        };

        match spec.kind {
            ExerciseKind::Program => self.evaluate_program(&context, runner.as_ref()).await,
            ExerciseKind::Function => {
                let invoker: Arc<dyn FunctionInvoker> = match &self.invoker {
                    Some(invoker) => invoker.clone(),
                    None => Arc::new(DriverInvoker::new(
                        runner.clone(),
                        runtime.clone(),
                        context.limits.clone(),
                    )),
                };
                self.evaluate_function(&context, invoker.as_ref()).await
            }
        }
    }

    async fn evaluate_program(&self, ctx: &RunContext<'_>, runner: &dyn Runner) -> Result<Finished> {
        let output_files = ctx.spec.output_files_with(&ctx.request.extra_output_files());
        let stdin = ctx.inputs.standard_input.as_str();

        // Reference
        let ref_dir = ctx.workspace.run_dir("reference")?;
        workspace::populate(&ref_dir, ctx.input_files, &output_files)?;
        let ref_program = ctx.runtime.with_prelude(&ctx.request.reference);
        let ref_outcome = runner
            .run(&ref_program, stdin, &ref_dir, &ctx.limits)
            .await
            .context("Failed to run reference")?;
        if let Some(message) = ref_outcome.failure_message() {
            warn!("Reference failed for {}: {}", ctx.request.id, message);
            return Ok(reference_failure(&message));
        }
        let reference = ExecutionResult::from_run(&ref_outcome, workspace::snapshot(&ref_dir, &output_files));

        // Candidate
        let cand_dir = ctx.workspace.run_dir("candidate")?;
        workspace::populate(&cand_dir, ctx.input_files, &output_files)?;
        let cand_source = format!("{}\n{}", ctx.request.submission, ctx.request.test_code);
        let cand_program = ctx.runtime.with_prelude(&cand_source);
        let cand_outcome = runner
            .run(&cand_program, stdin, &cand_dir, &ctx.limits)
            .await
            .context("Failed to run candidate")?;
        let candidate = ExecutionResult::from_run(&cand_outcome, workspace::snapshot(&cand_dir, &output_files));

        let verdict = comparator::compare_program(&reference, &candidate, &output_files);

        let limit = self.config.display_limit;
        let initial_files: BTreeMap<String, String> = ctx
            .input_files
            .iter()
            .map(|(name, bytes)| (name.clone(), workspace::display_bytes(Some(bytes), limit)))
            .collect();
        let final_files = |result: &ExecutionResult| -> BTreeMap<String, String> {
            result
                .output_files
                .iter()
                .map(|(name, bytes)| (name.clone(), workspace::display_bytes(bytes.as_deref(), limit)))
                .collect()
        };

        let reference_view = RunView {
            test_code: ctx.request.test_code.clone(),
            stdin: stdin.to_string(),
            initial_files: initial_files.clone(),
            screen_output: reference.screen_output(limit),
            final_files: final_files(&reference),
            arguments: Vec::new(),
        };
        let candidate_view = RunView {
            test_code: ctx.request.test_code.clone(),
            stdin: stdin.to_string(),
            initial_files,
            screen_output: candidate.screen_output(limit),
            final_files: final_files(&candidate),
            arguments: Vec::new(),
        };

        let outcome = if verdict.passed() {
            Outcome::Accepted
        } else if candidate.timed_out {
            Outcome::TimeLimitExceeded
        } else if candidate.failed {
            Outcome::RuntimeError
        } else {
            Outcome::WrongAnswer
        };

        Ok(Finished {
            result: report::build(ExerciseKind::Program, &verdict, &reference_view, &candidate_view),
            outcome,
        })
    }

    async fn evaluate_function(
        &self,
        ctx: &RunContext<'_>,
        invoker: &dyn FunctionInvoker,
    ) -> Result<Finished> {
        let names = &ctx.spec.function_names;
        let args = &ctx.inputs.arguments;

        let ref_dir = ctx.workspace.run_dir("reference")?;
        workspace::populate(&ref_dir, ctx.input_files, &[])?;
        let reference = match invoker
            .invoke(&ctx.request.reference, &names.reference, args, &ref_dir)
            .await
        {
            Ok(value) => value,
            Err(e) => {
                let message = format!("{}: {}", names.reference, e);
                warn!("Reference function failed for {}: {}", ctx.request.id, message);
                return Ok(reference_failure(&message));
            }
        };

        let cand_dir = ctx.workspace.run_dir("candidate")?;
        workspace::populate(&cand_dir, ctx.input_files, &[])?;
        let candidate = invoker
            .invoke(&ctx.request.submission, &names.candidate, args, &cand_dir)
            .await;

        let limit = self.config.display_limit;
        let (verdict, candidate_screen, outcome) = match &candidate {
            Ok(value) => {
                let verdict = comparator::compare_values(&reference, value);
                let outcome = if verdict.passed() {
                    Outcome::Accepted
                } else {
                    Outcome::WrongAnswer
                };
                (verdict, report::render_value(value), outcome)
            }
            Err(e) => (
                Verdict::failed(),
                format!("Error en {}: {}", names.candidate, e),
                match e {
                    InvocationError::TimedOut(_) => Outcome::TimeLimitExceeded,
                    _ => Outcome::RuntimeError,
                },
            ),
        };

        let view = |screen: String| RunView {
            test_code: ctx.request.test_code.clone(),
            arguments: args.clone(),
            screen_output: workspace::truncate_for_display(&screen, limit),
            ..Default::default()
        };

        Ok(Finished {
            result: report::build(
                ExerciseKind::Function,
                &verdict,
                &view(report::render_value(&reference)),
                &view(candidate_screen),
            ),
            outcome,
        })
    }
}

/// Per-request state shared by both runs
struct RunContext<'a> {
    request: &'a EvaluationRequest,
    spec: &'a ExerciseSpec,
    runtime: &'a RuntimeConfig,
    inputs: &'a GeneratedInputs,
    input_files: &'a BTreeMap<String, Vec<u8>>,
    workspace: &'a Workspace,
    limits: RunLimits,
}

fn reference_failure(message: &str) -> Finished {
    Finished {
        result: report::error_report(
            "No se pudo ejecutar la solución patrón con estas entradas",
            "Error en patrón",
            message,
        ),
        outcome: Outcome::ReferenceError,
    }
}

/// Convenience for one-shot use: evaluate a request read from `path`
/// (`-` for stdin) with the given evaluator
pub async fn evaluate_file(evaluator: &Evaluator, path: &Path) -> Result<EvaluationResult> {
    let raw = if path == Path::new("-") {
        let mut buf = String::new();
        tokio::io::AsyncReadExt::read_to_string(&mut tokio::io::stdin(), &mut buf)
            .await
            .context("Failed to read request from stdin")?;
        buf
    } else {
        tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read request {:?}", path))?
    };
    let request: EvaluationRequest =
        serde_json::from_str(&raw).context("Invalid evaluation request")?;
    Ok(evaluator.evaluate(&request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invoker::NativeFunctions;
    use serde_json::json;

    fn evaluator_in(attachments_dir: &Path) -> Evaluator {
        let config = GraderConfig {
            default_runtime: "sh".to_string(),
            attachments_dir: attachments_dir.to_path_buf(),
            ..GraderConfig::default()
        };
        Evaluator::new(config, RuntimeRegistry::bundled().unwrap())
    }

    fn evaluator() -> Evaluator {
        evaluator_in(Path::new("."))
    }

    const DOUBLE: &str = "read n\necho $((n * 2))\n";

    fn program_request(reference: &str, submission: &str) -> EvaluationRequest {
        EvaluationRequest {
            id: "test".into(),
            params: json!({
                "tipo": "programa",
                "entrada_estandar": {"generador": "entero", "min": 5, "max": 5}
            }),
            reference: reference.into(),
            submission: submission.into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_identical_program_passes() {
        let result = evaluator().evaluate(&program_request(DOUBLE, DOUBLE)).await;
        assert_eq!(result.fraction, 1.0);
        assert!(result.prologuehtml.contains("<pre>10</pre>"));
        assert!(result.prologuehtml.contains("<strong>Entrada por teclado</strong>\n<pre>5</pre>"));
    }

    #[tokio::test]
    async fn test_wrong_output_fails() {
        let result = evaluator()
            .evaluate(&program_request(DOUBLE, "read n\necho $n\n"))
            .await;
        assert_eq!(result.fraction, 0.0);
        let html = &result.prologuehtml;
        assert!(html.contains("la salida por pantalla no coincide"));
        assert!(html.contains("<pre>10</pre>"));
        assert!(html.contains("<strong>Salida por pantalla</strong>\n<pre>5</pre>"));
    }

    #[tokio::test]
    async fn test_missing_output_file_fails() {
        let mut request = program_request("printf 'ok\\n' > out.txt\n", "true\n");
        request.params = json!({"ficheros_salida": [{"nombre": "out.txt"}]});
        let result = evaluator().evaluate(&request).await;
        assert_eq!(result.fraction, 0.0);
        assert!(result.prologuehtml.contains("los ficheros finales no coinciden"));
        assert!(result.prologuehtml.contains("[NO EXISTE]"));
    }

    #[tokio::test]
    async fn test_matching_output_file_passes() {
        let writer = "printf 'ok\\n' > out.txt\n";
        let mut request = program_request(writer, writer);
        request.params = Value::Null;
        request.extra = "out.txt\n".into();
        let result = evaluator().evaluate(&request).await;
        assert_eq!(result.fraction, 1.0);
        assert!(result.prologuehtml.contains("Fichero final: out.txt"));
    }

    #[tokio::test]
    async fn test_candidate_does_not_see_reference_files() {
        // the candidate only passes if it sees out.txt left by the reference
        let mut request = program_request(
            "printf 'ok\\n' > out.txt\n",
            "cat out.txt > /dev/null 2>&1 || exit 0\nprintf 'ok\\n' > out.txt\n",
        );
        request.params = json!({"ficheros_salida": ["out.txt"]});
        let result = evaluator().evaluate(&request).await;
        assert_eq!(result.fraction, 0.0);
    }

    #[tokio::test]
    async fn test_restriction_blocks_before_reference_runs() {
        let marker_dir = tempfile::tempdir().unwrap();
        let marker = marker_dir.path().join("ran");
        let mut request = program_request(&format!("touch {}\n", marker.display()), "while true; do :; done\n");
        request.params = json!({"restricciones": {"prohibir_while": true}});

        let result = evaluator().evaluate(&request).await;
        assert_eq!(result.fraction, 0.0);
        assert!(result.prologuehtml.contains("Restricciones incumplidas"));
        assert!(result.prologuehtml.contains("while"));
        assert!(!marker.exists());
    }

    #[tokio::test]
    async fn test_restriction_ignores_comments() {
        let mut request = program_request(DOUBLE, "# sin while \nread n\necho $((n * 2))\n");
        request.params["restricciones"] = json!({"prohibir_while": true});
        let result = evaluator().evaluate(&request).await;
        assert_eq!(result.fraction, 1.0);
    }

    #[tokio::test]
    async fn test_reference_error_aborts() {
        let result = evaluator()
            .evaluate(&program_request("echo roto >&2\nexit 1\n", DOUBLE))
            .await;
        assert_eq!(result.fraction, 0.0);
        assert!(result.prologuehtml.contains("Error en patrón"));
        assert!(result.prologuehtml.contains("roto"));
        assert!(!result.prologuehtml.contains(crate::report::CANDIDATE_TITLE));
    }

    #[tokio::test]
    async fn test_reference_timeout_aborts() {
        let config = GraderConfig {
            default_runtime: "sh".to_string(),
            timeout_ms: 300,
            ..GraderConfig::default()
        };
        let evaluator = Evaluator::new(config, RuntimeRegistry::bundled().unwrap());
        let result = evaluator
            .evaluate(&program_request("sleep 5\n", DOUBLE))
            .await;
        assert_eq!(result.fraction, 0.0);
        assert!(result.prologuehtml.contains("Error en patrón"));
        assert!(result.prologuehtml.contains("Timeout expired"));
    }

    #[tokio::test]
    async fn test_candidate_crash_shows_stderr() {
        let result = evaluator()
            .evaluate(&program_request(DOUBLE, "read n\necho $((n * 2))\necho fallo >&2\nexit 2\n"))
            .await;
        assert_eq!(result.fraction, 0.0);
        assert!(result.prologuehtml.contains("10\nfallo"));
    }

    #[tokio::test]
    async fn test_candidate_timeout_scores_zero() {
        let config = GraderConfig {
            default_runtime: "sh".to_string(),
            timeout_ms: 1000,
            ..GraderConfig::default()
        };
        let evaluator = Evaluator::new(config, RuntimeRegistry::bundled().unwrap());
        let result = evaluator
            .evaluate(&program_request(DOUBLE, "sleep 10\n"))
            .await;
        assert_eq!(result.fraction, 0.0);
        let html = &result.prologuehtml;
        assert!(!html.contains("Error en patrón"));
        assert!(html.contains(crate::report::CANDIDATE_TITLE));
        assert!(html.contains("Timeout expired"));
        // reference output is still shown
        assert!(html.contains("<pre>10</pre>"));
    }

    #[tokio::test]
    async fn test_candidate_flooding_output_is_stopped() {
        let result = evaluator()
            .evaluate(&program_request(DOUBLE, "yes 10\n"))
            .await;
        assert_eq!(result.fraction, 0.0);
        assert!(result.prologuehtml.contains("Output limit exceeded"));
        assert!(result.prologuehtml.contains(crate::workspace::TRUNCATION_MARKER.trim_start()));
    }

    #[tokio::test]
    async fn test_test_code_appended_to_candidate() {
        let mut request = program_request(DOUBLE, "doble() { echo $(($1 * 2)); }\n");
        request.test_code = "read n\ndoble $n\n".into();
        let result = evaluator().evaluate(&request).await;
        assert_eq!(result.fraction, 1.0);
        assert!(result.prologuehtml.contains("<strong>Test a ejecutar</strong>"));
    }

    #[tokio::test]
    async fn test_shuffled_attachment_is_shared_and_reproducible() {
        let dir = tempfile::tempdir().unwrap();
        let content = (0..20).map(|i| format!("{},{}\n", i, i + 100)).collect::<String>();
        std::fs::write(dir.path().join("datos.csv"), &content).unwrap();

        let mut request = program_request("cat datos.csv\n", "cat datos.csv\n");
        request.params = json!({});
        request.attachments = vec!["datos.csv".into()];

        let evaluator = evaluator_in(dir.path());
        let first = evaluator.evaluate(&request).await;
        let second = evaluator.evaluate(&request).await;
        assert_eq!(first.fraction, 1.0);
        assert_eq!(first, second);

        let shuffled = crate::shuffle::shuffle_content(&content, request.fingerprint());
        assert!(first.prologuehtml.contains(shuffled.trim_end()));
        assert_eq!(std::fs::read_to_string(dir.path().join("datos.csv")).unwrap(), content);
    }

    #[tokio::test]
    async fn test_generated_input_file() {
        let reader = "cat n.txt\n";
        let mut request = program_request(reader, reader);
        request.params = json!({
            "ficheros_entrada": [{"nombre": "n.txt", "generador": "entero", "min": 8, "max": 8}]
        });
        let result = evaluator().evaluate(&request).await;
        assert_eq!(result.fraction, 1.0);
        assert!(result.prologuehtml.contains("Fichero inicial: n.txt"));
    }

    fn squares() -> Arc<NativeFunctions> {
        Arc::new(
            NativeFunctions::new()
                .register("sol_patron", |args: &[Value]| {
                    let n = args[0].as_i64().ok_or("n")?;
                    Ok(json!(n * n))
                })
                .register("resolver", |args: &[Value]| {
                    let n = args[0].as_i64().ok_or("n")?;
                    Ok(json!(n * n))
                })
                .register("suma", |args: &[Value]| {
                    let n = args[0].as_i64().ok_or("n")?;
                    Ok(json!(n + n))
                }),
        )
    }

    fn function_request(params: Value) -> EvaluationRequest {
        EvaluationRequest {
            id: "fn".into(),
            params,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_function_mode_passes() {
        let request = function_request(json!({
            "tipo": "funcion",
            "argumentos": [{"generador": "entero", "min": 3, "max": 3}]
        }));
        let result = evaluator().with_invoker(squares()).evaluate(&request).await;
        assert_eq!(result.fraction, 1.0);
        assert!(result.prologuehtml.contains("<strong>Argumentos</strong>\n<pre>3</pre>"));
        assert!(result.prologuehtml.contains("<pre>9</pre>"));
    }

    #[tokio::test]
    async fn test_function_mode_wrong_value() {
        let request = function_request(json!({
            "tipo": "funcion",
            "nombre_funcion_alumno": "suma",
            "argumentos": {"generador": "entero", "min": 3, "max": 3}
        }));
        let result = evaluator().with_invoker(squares()).evaluate(&request).await;
        assert_eq!(result.fraction, 0.0);
        assert!(result.prologuehtml.contains("el valor devuelto no coincide"));
        assert!(result.prologuehtml.contains("<pre>6</pre>"));
    }

    #[tokio::test]
    async fn test_function_mode_missing_candidate_function() {
        let request = function_request(json!({
            "tipo": "funcion",
            "nombre_funcion_alumno": "no_existe",
            "argumentos": [{"generador": "entero", "min": 3, "max": 3}]
        }));
        let result = evaluator().with_invoker(squares()).evaluate(&request).await;
        assert_eq!(result.fraction, 0.0);
        assert!(result.prologuehtml.contains("Error en no_existe"));
        assert!(result.prologuehtml.contains(crate::report::REFERENCE_TITLE));
    }

    #[tokio::test]
    async fn test_function_mode_missing_reference_function() {
        let request = function_request(json!({
            "tipo": "funcion",
            "nombre_funcion_patron": "perdida"
        }));
        let result = evaluator().with_invoker(squares()).evaluate(&request).await;
        assert_eq!(result.fraction, 0.0);
        assert!(result.prologuehtml.contains("Error en patrón"));
        assert!(result.prologuehtml.contains("perdida"));
    }

    #[tokio::test]
    async fn test_unknown_default_runtime_is_system_error() {
        let config = GraderConfig {
            default_runtime: "cobol".to_string(),
            ..GraderConfig::default()
        };
        let evaluator = Evaluator::new(config, RuntimeRegistry::bundled().unwrap());
        let result = evaluator.evaluate(&program_request(DOUBLE, DOUBLE)).await;
        assert_eq!(result.fraction, 0.0);
        assert!(result.prologuehtml.contains("Error interno"));
    }

    #[test]
    fn test_request_defaults_and_fingerprint() {
        let request: EvaluationRequest =
            serde_json::from_str(r#"{"reference": "echo 1", "submission": "echo 1"}"#).unwrap();
        assert_eq!(request.exercise(), ExerciseSpec::default());
        assert_eq!(request.fingerprint(), request.clone().fingerprint());

        let mut other = request.clone();
        other.submission.push(' ');
        assert_ne!(request.fingerprint(), other.fingerprint());
    }

    #[test]
    fn test_params_as_text() {
        let request = EvaluationRequest {
            params: Value::String(r#"{"tipo": "funcion"}"#.into()),
            ..Default::default()
        };
        assert_eq!(request.exercise().kind, ExerciseKind::Function);
        let broken = EvaluationRequest {
            params: Value::String("{tipo".into()),
            ..Default::default()
        };
        assert_eq!(broken.exercise(), ExerciseSpec::default());
    }

    fn python_request(reference: &str, submission: &str, n: i64) -> EvaluationRequest {
        EvaluationRequest {
            id: "py".into(),
            params: json!({
                "tipo": "funcion",
                "argumentos": [{"generador": "entero", "min": n, "max": n}]
            }),
            reference: reference.into(),
            submission: submission.into(),
            runtime: Some("python".into()),
            ..Default::default()
        }
    }

    const POW: &str = "def sol_patron(n):\n    return 2**n\n";

    #[tokio::test]
    async fn test_python_driver_returns_exact_values() {
        let result = evaluator()
            .evaluate(&python_request(POW, "def resolver(n):\n    return 2**n\n", 70))
            .await;
        assert_eq!(result.fraction, 1.0);
        assert!(result.prologuehtml.contains("<pre>1180591620717411303424</pre>"));
    }

    #[tokio::test]
    async fn test_python_big_integers_differ() {
        let result = evaluator()
            .evaluate(&python_request(POW, "def resolver(n):\n    return 2**n + 1\n", 70))
            .await;
        assert_eq!(result.fraction, 0.0);
        assert!(result.prologuehtml.contains("<pre>1180591620717411303425</pre>"));
    }

    #[tokio::test]
    async fn test_python_float_and_int_results_match() {
        let result = evaluator()
            .evaluate(&python_request(
                "def sol_patron(n):\n    return [n / 2, {'k': n / 2}]\n",
                "def resolver(n):\n    return [n // 2, {'k': n // 2}]\n",
                4,
            ))
            .await;
        assert_eq!(result.fraction, 1.0);
    }

    #[tokio::test]
    async fn test_python_missing_function() {
        let result = evaluator()
            .evaluate(&python_request(POW, "def otra(n):\n    return n\n", 3))
            .await;
        assert_eq!(result.fraction, 0.0);
        let html = &result.prologuehtml;
        assert!(html.contains("Error en resolver"));
        assert!(html.contains("no está definida"));
        assert!(html.contains("<pre>8</pre>"));
    }

    #[tokio::test]
    async fn test_python_raised_exception() {
        let result = evaluator()
            .evaluate(&python_request(POW, "def resolver(n):\n    return n // 0\n", 3))
            .await;
        assert_eq!(result.fraction, 0.0);
        assert!(result.prologuehtml.contains("ZeroDivisionError"));
    }

    #[tokio::test]
    async fn test_python_printing_function_still_returns_value() {
        let result = evaluator()
            .evaluate(&python_request(
                POW,
                "def resolver(n):\n    print('calculando')\n    return 2**n\n",
                5,
            ))
            .await;
        assert_eq!(result.fraction, 1.0);
    }
}
