use crate::error::AppError;
use crate::models::{GenerateForm, OperationRecord};
use crate::pipeline::cost::IMAGE_GENERATION_EFFECT;
use crate::pipeline::effects;
use crate::services::openai::DescribeMode;
use crate::state::AppState;
use axum::body::Bytes;
use axum::extract::{Multipart, State};
use axum::response::Html;
use axum::Form;
use std::path::{Path, PathBuf};

pub const MEDICAL_EFFECT: &str = "medical_analysis";
const GENERATED_RESULT_NAME: &str = "DALL-E Cloud Image";
const PROMPT_LOG_CHARS: usize = 100;

struct Upload {
    filename: String,
    bytes: Bytes,
}

#[derive(Default)]
struct UploadForm {
    file: Option<Upload>,
    effect: Option<String>,
}

/// Keep only the final path component of a client-supplied filename.
fn sanitize_filename(raw: &str) -> String {
    let name = raw.rsplit(['/', '\\']).next().unwrap_or("").trim();
    if name.is_empty() || name == "." || name == ".." {
        "upload".to_string()
    } else {
        name.to_string()
    }
}

/// Public URL of a file under `/static/{subdir}`; the name is one encoded path segment.
fn static_url(subdir: &str, filename: &str) -> String {
    format!("/static/{}/{}", subdir, urlencoding::encode(filename))
}

async fn read_upload_form(multipart: &mut Multipart) -> Result<UploadForm, AppError> {
    let mut form = UploadForm::default();
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                let filename = field.file_name().map(sanitize_filename);
                let bytes = field.bytes().await?;
                if let Some(filename) = filename.filter(|_| !bytes.is_empty()) {
                    form.file = Some(Upload { filename, bytes });
                }
            }
            Some("effect") => form.effect = Some(field.text().await?),
            _ => {}
        }
    }
    Ok(form)
}

async fn save_upload(dir: &Path, upload: &Upload) -> Result<PathBuf, AppError> {
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(&upload.filename);
    tokio::fs::write(&path, &upload.bytes).await?;
    Ok(path)
}

pub async fn process(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Html<String>, AppError> {
    let form = read_upload_form(&mut multipart).await?;
    let upload = form
        .file
        .ok_or_else(|| AppError::BadRequest("an image file is required".into()))?;

    let processed_dir = state.config.processed_dir();
    let original_path = save_upload(&state.config.upload_dir(), &upload).await?;

    let now = chrono::Local::now().naive_local();
    let processed = {
        let original = original_path.clone();
        let out_dir = processed_dir.clone();
        let effect = form.effect.clone();
        tokio::task::spawn_blocking(move || {
            effects::process_image(&original, &out_dir, effect.as_deref(), now)
        })
        .await
        .map_err(|e| AppError::Internal(format!("image task failed: {}", e)))??
    };

    let description = state
        .openai
        .describe_image(&processed_dir.join(&processed.filename), DescribeMode::Standard)
        .await;

    state.operations.append(&OperationRecord {
        original_filename: upload.filename.clone(),
        result_filename: processed.filename.clone(),
        effect: processed.effect_tag.clone(),
        ai_description: description.text.clone(),
        tokens_in: description.input_tokens,
        tokens_out: description.output_tokens,
        created_at: None,
        model: Some(state.openai.vision_model().to_string()),
    })?;

    tracing::info!(
        file = %upload.filename,
        effect = %processed.effect_tag,
        quality = processed.quality,
        tokens_in = description.input_tokens,
        tokens_out = description.output_tokens,
        "Processed upload"
    );

    let mut ctx = tera::Context::new();
    ctx.insert("active_tab", "process");
    ctx.insert("ai_configured", &state.openai.is_configured());
    ctx.insert("original_image", &static_url("uploads", &upload.filename));
    ctx.insert("processed_image", &static_url("processed", &processed.filename));
    ctx.insert("ai_desc", &description.text);
    ctx.insert("effect", &processed.effect_tag);
    let html = state.tera.render("index.html", &ctx)?;
    Ok(Html(html))
}

pub async fn analyze_medical(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Html<String>, AppError> {
    let form = read_upload_form(&mut multipart).await?;
    let upload = form
        .file
        .ok_or_else(|| AppError::BadRequest("an image file is required".into()))?;

    let original_path = save_upload(&state.config.upload_dir(), &upload).await?;
    let description = state
        .openai
        .describe_image(&original_path, DescribeMode::Medical)
        .await;

    state.operations.append(&OperationRecord {
        original_filename: upload.filename.clone(),
        result_filename: upload.filename.clone(),
        effect: MEDICAL_EFFECT.to_string(),
        ai_description: description.text.clone(),
        tokens_in: description.input_tokens,
        tokens_out: description.output_tokens,
        created_at: None,
        model: Some(state.openai.vision_model().to_string()),
    })?;

    tracing::info!(
        file = %upload.filename,
        tokens_in = description.input_tokens,
        tokens_out = description.output_tokens,
        "Medical analysis complete"
    );

    let mut ctx = tera::Context::new();
    ctx.insert("active_tab", "medical");
    ctx.insert("ai_configured", &state.openai.is_configured());
    ctx.insert("medical_image", &static_url("uploads", &upload.filename));
    ctx.insert("medical_desc", &description.text);
    let html = state.tera.render("index.html", &ctx)?;
    Ok(Html(html))
}

pub async fn generate(
    State(state): State<AppState>,
    Form(form): Form<GenerateForm>,
) -> Result<Html<String>, AppError> {
    let prompt = form.prompt.trim();
    if prompt.is_empty() {
        return Err(AppError::BadRequest("prompt must not be empty".into()));
    }

    let image_url = state.openai.generate_image(prompt).await;
    let summary = if image_url.is_some() {
        "Image generated from the user's prompt."
    } else {
        "Image generation failed."
    };

    state.operations.append(&OperationRecord {
        original_filename: prompt.chars().take(PROMPT_LOG_CHARS).collect(),
        result_filename: GENERATED_RESULT_NAME.to_string(),
        effect: IMAGE_GENERATION_EFFECT.to_string(),
        ai_description: summary.to_string(),
        tokens_in: 0,
        tokens_out: 0,
        created_at: None,
        model: Some(state.openai.image_model().to_string()),
    })?;

    let mut ctx = tera::Context::new();
    ctx.insert("active_tab", "generate");
    ctx.insert("ai_configured", &state.openai.is_configured());
    ctx.insert("prompt", prompt);
    if let Some(url) = &image_url {
        ctx.insert("generated_url", url);
    } else {
        ctx.insert("generate_error", summary);
    }
    let html = state.tera.render("index.html", &ctx)?;
    Ok(Html(html))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filenames_lose_their_directories() {
        assert_eq!(sanitize_filename("cat.png"), "cat.png");
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("C:\\Users\\me\\photo.jpg"), "photo.jpg");
        assert_eq!(sanitize_filename("dir/"), "upload");
        assert_eq!(sanitize_filename(".."), "upload");
    }

    #[test]
    fn static_urls_encode_the_filename() {
        assert_eq!(static_url("uploads", "cat.png"), "/static/uploads/cat.png");
        assert_eq!(static_url("uploads", "scan#1.png"), "/static/uploads/scan%231.png");
        assert_eq!(static_url("processed", "50% off.jpg"), "/static/processed/50%25%20off.jpg");
    }
}
