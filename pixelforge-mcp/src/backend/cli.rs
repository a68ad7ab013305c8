//! `imagen` command-line binding.
//!
//! Every call spawns the executable with `--json` and a wall-clock timeout.
//! A call that runs past the timeout is killed and reported with return
//! code [`TIMEOUT_RETURN_CODE`].

use super::{
    AnalyzeJob, BackendResult, DEFAULT_ANALYSIS_PROMPT, EditJob, GenerateJob, ImageBackend,
    NO_ANALYSIS_GENERATED, NO_IMAGES_GENERATED, details,
};
use async_trait::async_trait;
use pixelforge_mcp_common::error::Error;
use serde_json::{Map, Value, json};
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, error, info, instrument, warn};

/// Bound on the `--version` check run at construction.
pub const VERSION_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// Return code reported when a process could not run or was killed.
pub const TIMEOUT_RETURN_CODE: i32 = -1;

/// Result of one CLI invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct CliOutput {
    /// Process exited with status 0
    pub success: bool,
    /// Trimmed stdout
    pub output: String,
    /// Trimmed stderr on a non-zero exit, or the reason the process did not run
    pub error: Option<String>,
    /// Exit code, or [`TIMEOUT_RETURN_CODE`]
    pub return_code: i32,
    /// Stdout parsed as JSON, when it parses
    pub data: Option<Value>,
}

impl CliOutput {
    fn not_run(error: impl Into<String>) -> Self {
        Self {
            success: false,
            output: String::new(),
            error: Some(error.into()),
            return_code: TIMEOUT_RETURN_CODE,
            data: None,
        }
    }

    fn data_object(&self) -> Option<Map<String, Value>> {
        match &self.data {
            Some(Value::Object(map)) => Some(map.clone()),
            _ => None,
        }
    }

    fn failure_text(&self) -> String {
        match self.error.as_deref() {
            Some(e) if !e.is_empty() => e.to_string(),
            _ => format!("imagen exited with code {}", self.return_code),
        }
    }
}

/// Subprocess backend for the `imagen` executable.
#[derive(Debug, Clone)]
pub struct ImagenCliBackend {
    binary: String,
    timeout: Duration,
}

impl ImagenCliBackend {
    /// Verify the executable and build the backend.
    ///
    /// # Errors
    /// Fails when `binary` cannot be spawned, exits non-zero on `--version`,
    /// or does not answer within [`VERSION_CHECK_TIMEOUT`].
    pub async fn new(binary: impl Into<String>, timeout: Duration) -> Result<Self, Error> {
        let binary = binary.into();
        let version = Self::verify(&binary).await?;
        info!(binary = %binary, version = %version, "imagen CLI verified");
        Ok(Self { binary, timeout })
    }

    async fn verify(binary: &str) -> Result<String, Error> {
        let check = Command::new(binary)
            .arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(VERSION_CHECK_TIMEOUT, check).await {
            Err(_) => return Err(Error::timeout(VERSION_CHECK_TIMEOUT.as_secs())),
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::backend(format!(
                    "imagen CLI not found at '{}'. Install with: pip install gemini-imagen",
                    binary
                )));
            }
            Ok(Err(e)) => {
                return Err(Error::backend(format!("Failed to run '{} --version': {}", binary, e)));
            }
            Ok(Ok(output)) => output,
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::backend(format!(
                "imagen CLI not working properly: {}",
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Run `binary args...` under the configured timeout.
    pub async fn run(&self, args: &[String]) -> CliOutput {
        debug!(binary = %self.binary, args = ?args, "Running imagen");

        let child = Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(self.timeout, child).await {
            Err(_) => {
                let message = format!("Command timed out after {}s", self.timeout.as_secs_f64());
                error!(binary = %self.binary, "{}", message);
                return CliOutput::not_run(message);
            }
            Ok(Err(e)) => {
                error!(binary = %self.binary, error = %e, "Command execution failed");
                return CliOutput::not_run(e.to_string());
            }
            Ok(Ok(output)) => output,
        };

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        let success = output.status.success();
        let error = (!success).then(|| String::from_utf8_lossy(&output.stderr).trim().to_string());

        let data = if stdout.is_empty() {
            None
        } else {
            match serde_json::from_str(&stdout) {
                Ok(value) => Some(value),
                Err(e) => {
                    warn!(error = %e, "Failed to parse JSON output");
                    None
                }
            }
        };

        CliOutput {
            success,
            output: stdout,
            error,
            return_code: output.status.code().unwrap_or(TIMEOUT_RETURN_CODE),
            data,
        }
    }

    /// Turn a generate/edit invocation into a result. The output file must exist.
    fn image_result(cli: CliOutput, output_path: &Path, verb: &str) -> BackendResult {
        if !cli.success {
            return BackendResult::failure(cli.failure_text());
        }
        if !output_path.exists() {
            return BackendResult::failure(NO_IMAGES_GENERATED);
        }

        let result = BackendResult::success(format!(
            "Image {} successfully at {}",
            verb,
            output_path.display()
        ))
        .with_image_path(output_path);

        match cli.data_object() {
            Some(data) => result.with_data(data),
            None => result,
        }
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Text of an analysis: the `analysis` or `text` field of a JSON object, a
/// bare JSON string, or raw stdout that was not JSON.
fn analysis_text(cli: &CliOutput) -> String {
    match &cli.data {
        Some(Value::Object(map)) => ["analysis", "text"]
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_str))
            .unwrap_or_default()
            .to_string(),
        Some(Value::String(text)) => text.clone(),
        Some(_) => String::new(),
        None => cli.output.clone(),
    }
}

#[async_trait]
impl ImageBackend for ImagenCliBackend {
    fn name(&self) -> &'static str {
        "cli"
    }

    #[instrument(level = "info", name = "cli_generate", skip_all, fields(model = %job.model))]
    async fn generate(&self, job: &GenerateJob) -> BackendResult {
        let mut args = vec![
            "generate".to_string(),
            job.prompt.clone(),
            "-o".to_string(),
            path_arg(&job.output_path),
            "--json".to_string(),
        ];
        if let Some(aspect_ratio) = &job.aspect_ratio {
            args.extend(["--aspect-ratio".to_string(), aspect_ratio.clone()]);
        }
        if let Some(temperature) = job.temperature {
            args.extend(["--temperature".to_string(), temperature.to_string()]);
        }
        if !job.model.is_empty() {
            args.extend(["--model".to_string(), job.model.clone()]);
        }
        if let Some(safety_setting) = &job.safety_setting {
            args.extend(["--safety-setting".to_string(), safety_setting.clone()]);
        }

        let cli = self.run(&args).await;
        Self::image_result(cli, &job.output_path, "generated")
    }

    #[instrument(level = "info", name = "cli_edit", skip_all, fields(model = %job.model))]
    async fn edit(&self, job: &EditJob) -> BackendResult {
        let mut args = vec![
            "generate".to_string(),
            job.prompt.clone(),
            "-i".to_string(),
            path_arg(&job.input_path),
            "-o".to_string(),
            path_arg(&job.output_path),
            "--json".to_string(),
        ];
        if let Some(temperature) = job.temperature {
            args.extend(["--temperature".to_string(), temperature.to_string()]);
        }
        if !job.model.is_empty() {
            args.extend(["--model".to_string(), job.model.clone()]);
        }

        let cli = self.run(&args).await;
        Self::image_result(cli, &job.output_path, "edited")
    }

    #[instrument(level = "info", name = "cli_analyze", skip_all)]
    async fn analyze(&self, job: &AnalyzeJob) -> BackendResult {
        let prompt = job.prompt.as_deref().unwrap_or(DEFAULT_ANALYSIS_PROMPT);
        let args = vec![
            "analyze".to_string(),
            path_arg(&job.image_path),
            "--json".to_string(),
            "--prompt".to_string(),
            prompt.to_string(),
        ];

        let cli = self.run(&args).await;
        if !cli.success {
            return BackendResult::failure(cli.failure_text());
        }

        let text = analysis_text(&cli);
        if text.trim().is_empty() {
            return BackendResult::failure(NO_ANALYSIS_GENERATED);
        }

        BackendResult::success(text.clone()).with_data(details([
            ("analysis", json!(text)),
            ("image_path", json!(path_arg(&job.image_path))),
        ]))
    }

    async fn list_models(&self) -> BackendResult {
        let args = ["models", "list", "--json"].map(String::from);
        let cli = self.run(&args).await;
        if !cli.success {
            return BackendResult::failure(cli.failure_text());
        }

        let data = match cli.data {
            Some(Value::Object(map)) => map,
            Some(Value::Array(models)) => details([("models", Value::Array(models))]),
            _ => Map::new(),
        };
        BackendResult::success(cli.output).with_data(data)
    }
}
