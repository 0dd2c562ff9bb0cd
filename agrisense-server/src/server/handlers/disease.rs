use axum::{
    extract::{Multipart, State},
    response::Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use agrisense::clients::UploadedFile;
use agrisense::diagnosis::{detect, FollowupChoice, Language};
use agrisense::services::DetectionResponse;
use agrisense::CoreResult;

use crate::server::app::AppState;
use crate::server::auth::OptionalAuthUser;
use crate::server::error::{ApiError, ApiResult};
use crate::server::extract::JsonBody;

#[derive(Debug, Deserialize)]
pub struct DetectRequest {
    #[serde(default)]
    pub symptom_text: String,
    #[serde(default)]
    pub crop: String,
    #[serde(default)]
    pub followup_choice: Value,
    #[serde(default)]
    pub session_id: Option<i32>,
}

pub async fn detect_disease(
    State(state): State<AppState>,
    OptionalAuthUser(user): OptionalAuthUser,
    JsonBody(payload): JsonBody<DetectRequest>,
) -> ApiResult<Json<DetectionResponse>> {
    let symptom_text = payload.symptom_text.trim();
    let choice = FollowupChoice::from_json(&payload.followup_choice);
    let response = state
        .diagnosis
        .detect(symptom_text, &payload.crop, choice)
        .await?;

    if let (Some(user), Some(session_id)) = (user, payload.session_id) {
        if let Err(e) = record_exchange(&state, user.id, session_id, symptom_text, &response).await {
            tracing::warn!(user_id = user.id, session_id, error = %e, "Diagnosis not saved to chat session");
        }
    }
    Ok(Json(response))
}

/// Append the user text and the bot reply to one of the caller's sessions.
async fn record_exchange(
    state: &AppState,
    user_id: i32,
    session_id: i32,
    symptom_text: &str,
    response: &DetectionResponse,
) -> CoreResult<()> {
    state
        .chats
        .add_message(user_id, session_id, symptom_text.to_string(), true, None)
        .await?;
    let metadata = serde_json::to_value(response).ok();
    state
        .chats
        .add_message(user_id, session_id, response.reply_text(), false, metadata)
        .await?;
    Ok(())
}

/// The named file part plus every other text field.
async fn read_file(
    multipart: &mut Multipart,
    file_field: &str,
) -> ApiResult<(Option<UploadedFile>, Vec<(String, String)>)> {
    let mut file = None;
    let mut fields = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid multipart body: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if name == file_field {
            let file_name = field.file_name().unwrap_or(file_field).to_string();
            let content_type = field.content_type().map(str::to_string);
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::bad_request(format!("Failed to read upload: {}", e)))?;
            file = Some(UploadedFile {
                file_name,
                content_type,
                bytes: bytes.to_vec(),
            });
        } else {
            let value = field
                .text()
                .await
                .map_err(|e| ApiError::bad_request(format!("Invalid form field {}: {}", name, e)))?;
            fields.push((name, value));
        }
    }
    Ok((file, fields))
}

pub async fn transcribe_audio(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<Value>> {
    let (audio, _) = read_file(&mut multipart, "audio").await?;
    let audio = audio.ok_or_else(|| ApiError::bad_request("No audio file provided"))?;
    let transcription = state.transcriber.transcribe(audio).await?;
    Ok(Json(json!({
        "success": true,
        "transcript": transcription.transcript,
        "translated": transcription.translated,
        "detected_language": transcription.detected_language,
        "translation_applied": transcription.translation_applied,
        "engine": transcription.engine,
    })))
}

#[derive(Debug, Deserialize)]
pub struct TranslateRequest {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub source_language: Option<String>,
    #[serde(default)]
    pub target_language: Option<String>,
}

fn language(code: Option<&str>, fallback: Language) -> ApiResult<Language> {
    match code.map(str::trim).filter(|code| !code.is_empty()) {
        Some(code) => Language::from_code(code)
            .ok_or_else(|| ApiError::bad_request(format!("Unsupported language: {}", code))),
        None => Ok(fallback),
    }
}

pub async fn translate(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<TranslateRequest>,
) -> ApiResult<Json<Value>> {
    let text = payload.text.trim();
    if text.is_empty() {
        return Err(ApiError::bad_request("text is required"));
    }
    let source = language(payload.source_language.as_deref(), detect(text).language)?;
    let target = language(payload.target_language.as_deref(), Language::English)?;

    let translated = state.translator.translate(text, source, target).await?;
    Ok(Json(json!({
        "success": true,
        "original": text,
        "translated": translated,
        "source_language": source,
        "target_language": target,
    })))
}

pub async fn diagnose_image(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<Value>> {
    let (image, fields) = read_file(&mut multipart, "image").await?;
    let image = image.ok_or_else(|| ApiError::bad_request("No image file provided"))?;
    let crop = fields
        .into_iter()
        .find(|(name, value)| name == "crop" && !value.trim().is_empty())
        .map(|(_, value)| value.trim().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    let diagnosis = state.images.classify(image, &crop).await?;
    let mut body = json!({
        "success": true,
        "disease": diagnosis.disease,
        "confidence": diagnosis.confidence,
        "class_name": diagnosis.class_name,
        "message": format!(
            "Detected {} with {:.1}% confidence",
            diagnosis.class_name,
            diagnosis.confidence * 100.0
        ),
        "crop": crop,
    });
    if !diagnosis.top_predictions.is_empty() {
        body["top_predictions"] = json!(diagnosis.top_predictions);
    }
    Ok(Json(body))
}
