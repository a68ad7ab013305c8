//! Input validation and request normalization.
//!
//! Every tool call passes through one of [`validate_generate`],
//! [`validate_edit`], or [`validate_analyze`] before any file is written or
//! any backend is called. Fields are checked in declaration order and the
//! first failure is returned.

use pixelforge_mcp_common::error::Error;
use std::fmt;
use std::path::{Path, PathBuf};

/// Supported aspect ratios, matched exactly.
pub const ASPECT_RATIOS: &[&str] = &[
    "1:1", "2:3", "3:2", "3:4", "4:3", "4:5", "5:4", "9:16", "16:9", "21:9",
];

/// Maximum prompt length in Unicode code points, after trimming.
pub const MAX_PROMPT_CHARS: usize = 2000;

/// Accepted image file extensions, compared case-insensitively.
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp"];

/// Extension appended to output filenames that lack an image extension.
pub const DEFAULT_EXTENSION: &str = ".png";

/// A rejected input field.
///
/// Displays as the bare message so callers can prefix it as they see fit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// The field that failed validation.
    pub field: &'static str,
    /// Description of the validation failure.
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ValidationError {}

impl From<ValidationError> for Error {
    fn from(err: ValidationError) -> Self {
        Error::Validation(err.message)
    }
}

/// A filename that passed [`validate_output_filename`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFilename(String);

impl OutputFilename {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<Path> for OutputFilename {
    fn as_ref(&self) -> &Path {
        Path::new(&self.0)
    }
}

impl fmt::Display for OutputFilename {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which tool an image path belongs to. Only the error wording differs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImagePathKind {
    /// `input_image_path` of an edit
    EditInput,
    /// `image_path` of an analysis
    AnalysisTarget,
}

impl ImagePathKind {
    fn field(self) -> &'static str {
        match self {
            ImagePathKind::EditInput => "input_image_path",
            ImagePathKind::AnalysisTarget => "image_path",
        }
    }

    fn not_found(self, raw: &str) -> String {
        match self {
            ImagePathKind::EditInput => format!("Input image not found: {raw}"),
            ImagePathKind::AnalysisTarget => format!("Image not found: {raw}"),
        }
    }

    fn not_a_file(self, raw: &str) -> String {
        match self {
            ImagePathKind::EditInput => format!("Input path is not a file: {raw}"),
            ImagePathKind::AnalysisTarget => format!("Path is not a file: {raw}"),
        }
    }
}

/// Raw generate arguments, with absent values already replaced by defaults.
#[derive(Debug, Clone)]
pub struct GenerateInput {
    pub prompt: String,
    pub output_filename: Option<String>,
    pub aspect_ratio: String,
    pub temperature: f64,
    pub model: Option<String>,
    pub safety_setting: String,
}

/// Raw edit arguments, with absent values already replaced by defaults.
#[derive(Debug, Clone)]
pub struct EditInput {
    pub prompt: String,
    pub input_image_path: String,
    pub output_filename: Option<String>,
    pub temperature: f64,
}

/// Raw analyze arguments.
#[derive(Debug, Clone)]
pub struct AnalyzeInput {
    pub image_path: String,
    pub prompt: Option<String>,
}

/// A validated text-to-image request.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub output_filename: Option<OutputFilename>,
    pub aspect_ratio: String,
    pub temperature: f64,
    pub model: Option<String>,
    pub safety_setting: String,
}

/// A validated image edit request.
#[derive(Debug, Clone, PartialEq)]
pub struct EditRequest {
    pub prompt: String,
    /// Absolute path of the source image
    pub input_image_path: String,
    pub output_filename: Option<OutputFilename>,
    pub temperature: f64,
}

/// A validated image analysis request.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzeRequest {
    /// Absolute path of the image
    pub image_path: String,
    pub prompt: Option<String>,
}

/// Whitespace, including the ASCII file/group/record/unit separators.
fn is_blank(c: char) -> bool {
    c.is_whitespace() || ('\u{1c}'..='\u{1f}').contains(&c)
}

/// Trim a prompt and check its length.
pub fn validate_prompt(prompt: &str) -> Result<String, ValidationError> {
    let trimmed = prompt.trim_matches(is_blank);
    if trimmed.is_empty() {
        return Err(ValidationError::new("prompt", "Prompt cannot be empty"));
    }
    if trimmed.chars().count() > MAX_PROMPT_CHARS {
        return Err(ValidationError::new(
            "prompt",
            format!("Prompt too long (max {MAX_PROMPT_CHARS} characters)"),
        ));
    }
    Ok(trimmed.to_string())
}

pub fn validate_aspect_ratio(aspect_ratio: &str) -> Result<String, ValidationError> {
    if ASPECT_RATIOS.contains(&aspect_ratio) {
        Ok(aspect_ratio.to_string())
    } else {
        Err(ValidationError::new(
            "aspect_ratio",
            format!("Invalid aspect ratio. Must be one of: {}", ASPECT_RATIOS.join(", ")),
        ))
    }
}

/// Accepts `0.0 ..= 1.0`. NaN is rejected.
pub fn validate_temperature(temperature: f64) -> Result<f64, ValidationError> {
    if (0.0..=1.0).contains(&temperature) {
        Ok(temperature)
    } else {
        Err(ValidationError::new(
            "temperature",
            "Temperature must be between 0.0 and 1.0",
        ))
    }
}

/// Reject unsafe filenames and append `.png` when no image extension is present.
///
/// The case of an existing extension is preserved.
pub fn validate_output_filename(filename: &str) -> Result<OutputFilename, ValidationError> {
    if filename.contains("..") || filename.contains('/') || filename.contains('\\') {
        return Err(ValidationError::new(
            "output_filename",
            "Filename cannot contain path separators",
        ));
    }

    let allowed = |c: char| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.');
    if filename.is_empty() || !filename.chars().all(allowed) {
        return Err(ValidationError::new(
            "output_filename",
            "Filename can only contain letters, numbers, underscore, hyphen, and dot",
        ));
    }

    let lower = filename.to_ascii_lowercase();
    let has_image_ext = IMAGE_EXTENSIONS
        .iter()
        .any(|ext| lower.ends_with(&format!(".{ext}")));

    if has_image_ext {
        Ok(OutputFilename(filename.to_string()))
    } else {
        Ok(OutputFilename(format!("{filename}{DEFAULT_EXTENSION}")))
    }
}

/// Check that `raw` names an existing image file and return its absolute path.
///
/// Relative paths are resolved against the current working directory.
/// Symlinks are followed for the existence and file checks but the returned
/// path is not canonicalized.
pub fn validate_image_path(raw: &str, kind: ImagePathKind) -> Result<String, ValidationError> {
    let field = kind.field();
    let path = Path::new(raw);

    if !path.exists() {
        return Err(ValidationError::new(field, kind.not_found(raw)));
    }
    if !path.is_file() {
        return Err(ValidationError::new(field, kind.not_a_file(raw)));
    }

    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    if !IMAGE_EXTENSIONS.iter().any(|valid| valid.eq_ignore_ascii_case(ext)) {
        let suffix = if ext.is_empty() {
            String::new()
        } else {
            format!(".{ext}")
        };
        return Err(ValidationError::new(
            field,
            format!("Invalid image format: {suffix}"),
        ));
    }

    let absolute: PathBuf = std::path::absolute(path)
        .map_err(|_| ValidationError::new(field, kind.not_found(raw)))?;
    Ok(absolute.to_string_lossy().into_owned())
}

fn validate_optional_filename(
    filename: Option<&str>,
) -> Result<Option<OutputFilename>, ValidationError> {
    filename.map(validate_output_filename).transpose()
}

/// Validate generate arguments.
pub fn validate_generate(input: &GenerateInput) -> Result<GenerationRequest, ValidationError> {
    let prompt = validate_prompt(&input.prompt)?;
    let output_filename = validate_optional_filename(input.output_filename.as_deref())?;
    let aspect_ratio = validate_aspect_ratio(&input.aspect_ratio)?;
    let temperature = validate_temperature(input.temperature)?;

    Ok(GenerationRequest {
        prompt,
        output_filename,
        aspect_ratio,
        temperature,
        model: input.model.clone(),
        safety_setting: input.safety_setting.clone(),
    })
}

/// Validate edit arguments.
pub fn validate_edit(input: &EditInput) -> Result<EditRequest, ValidationError> {
    let prompt = validate_prompt(&input.prompt)?;
    let input_image_path = validate_image_path(&input.input_image_path, ImagePathKind::EditInput)?;
    let output_filename = validate_optional_filename(input.output_filename.as_deref())?;
    let temperature = validate_temperature(input.temperature)?;

    Ok(EditRequest {
        prompt,
        input_image_path,
        output_filename,
        temperature,
    })
}

/// Validate analyze arguments. An absent prompt stays absent.
pub fn validate_analyze(input: &AnalyzeInput) -> Result<AnalyzeRequest, ValidationError> {
    let image_path = validate_image_path(&input.image_path, ImagePathKind::AnalysisTarget)?;
    let prompt = input.prompt.as_deref().map(validate_prompt).transpose()?;

    Ok(AnalyzeRequest { image_path, prompt })
}
