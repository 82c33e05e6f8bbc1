//! Stage request bodies: JSON or multipart with PDF uploads

use super::handlers::{AppError, TrackerState};
use crate::blob::UploadedFile;
use crate::tracker::StageKind;
use crate::DEFAULT_UPLOAD_MAX_BYTES;
use axum::{
    body::Bytes,
    extract::{FromRequest, Multipart, Request},
    http::header,
};
use serde_json::{Map, Value};
use tracing::debug;

pub const PDF_CONTENT_TYPE: &str = "application/pdf";

/// Upper bound on files in one request
const MAX_FILES_PER_REQUEST: usize = 20;

/// Room for the text parts of a multipart body
const FORM_OVERHEAD_BYTES: usize = 1024 * 1024;

/// Per-file and per-request upload constraints
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadLimits {
    pub max_file_bytes: usize,
    pub max_files: usize,
}

impl UploadLimits {
    pub fn new(max_file_bytes: usize) -> Self {
        Self {
            max_file_bytes,
            max_files: MAX_FILES_PER_REQUEST,
        }
    }

    /// Body size limit for the router
    pub fn request_body_limit(&self) -> usize {
        self.max_file_bytes
            .saturating_mul(self.max_files)
            .saturating_add(FORM_OVERHEAD_BYTES)
    }

    /// Accept only PDFs within the size limit
    pub fn check_file(&self, filename: &str, content_type: &str, len: usize) -> Result<(), AppError> {
        if content_type != PDF_CONTENT_TYPE {
            return Err(AppError::BadRequest(format!(
                "Only PDF files are allowed ('{}' is {})",
                filename,
                if content_type.is_empty() { "untyped" } else { content_type }
            )));
        }
        if len > self.max_file_bytes {
            return Err(AppError::BadRequest(format!(
                "'{}' is {} bytes; the limit is {} bytes",
                filename, len, self.max_file_bytes
            )));
        }
        Ok(())
    }
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self::new(DEFAULT_UPLOAD_MAX_BYTES)
    }
}

/// A stage payload plus the files that came with it
#[derive(Debug, Default)]
pub struct StageBody {
    pub payload: Map<String, Value>,
    pub files: Vec<UploadedFile>,
}

impl StageBody {
    /// Every file must arrive under the part name the stage binds
    pub fn check_file_parts(&self, kind: StageKind) -> Result<(), AppError> {
        let expected = kind.spec().file.map(|b| b.part);
        for file in &self.files {
            if Some(file.field.as_str()) != expected {
                return Err(AppError::BadRequest(match expected {
                    Some(part) => format!(
                        "Unexpected file part '{}' for {}; expected '{}'",
                        file.field, kind, part
                    ),
                    None => format!("{} does not accept file uploads", kind),
                }));
            }
        }
        Ok(())
    }
}

impl FromRequest<TrackerState> for StageBody {
    type Rejection = AppError;

    async fn from_request(req: Request, state: &TrackerState) -> Result<Self, Self::Rejection> {
        let is_multipart = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("multipart/form-data"));

        if is_multipart {
            let multipart = Multipart::from_request(req, state)
                .await
                .map_err(|e| AppError::BadRequest(e.body_text()))?;
            return read_multipart(multipart, &state.upload_limits).await;
        }

        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;
        Ok(StageBody {
            payload: parse_json_object(&bytes)?,
            files: Vec::new(),
        })
    }
}

/// A JSON body must be an object; an empty body is an empty payload
pub fn parse_json_object(bytes: &[u8]) -> Result<Map<String, Value>, AppError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Map::new());
    }
    match serde_json::from_slice(bytes) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(AppError::BadRequest(
            "Request body must be a JSON object".into(),
        )),
        Err(e) => Err(AppError::BadRequest(format!("Invalid JSON body: {}", e))),
    }
}

/// Text parts that look like JSON arrays/objects are parsed; anything else
/// stays a string
pub fn parse_text_part(name: &str, text: &str) -> Result<Value, AppError> {
    let trimmed = text.trim_start();
    if trimmed.starts_with('[') || trimmed.starts_with('{') {
        serde_json::from_str(text)
            .map_err(|e| AppError::BadRequest(format!("Part '{}' is not valid JSON: {}", name, e)))
    } else {
        Ok(Value::String(text.to_string()))
    }
}

/// Collect text parts into the payload and file parts into uploads
pub async fn read_multipart(
    mut multipart: Multipart,
    limits: &UploadLimits,
) -> Result<StageBody, AppError> {
    let mut body = StageBody::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.body_text()))?
    {
        let name = field
            .name()
            .filter(|n| !n.is_empty())
            .ok_or_else(|| AppError::BadRequest("Multipart part without a name".into()))?
            .to_string();

        match field.file_name().map(str::to_string) {
            Some(filename) => {
                if body.files.len() >= limits.max_files {
                    return Err(AppError::BadRequest(format!(
                        "At most {} files per request",
                        limits.max_files
                    )));
                }
                let content_type = field.content_type().unwrap_or_default().to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(e.body_text()))?;
                limits.check_file(&filename, &content_type, bytes.len())?;
                debug!(part = %name, filename = %filename, bytes = bytes.len(), "Received upload");
                body.files.push(UploadedFile {
                    field: name,
                    filename,
                    content_type,
                    bytes: bytes.to_vec(),
                });
            }
            None => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(e.body_text()))?;
                let value = parse_text_part(&name, &text)?;
                body.payload.insert(name, value);
            }
        }
    }

    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::pdf_upload;
    use serde_json::json;

    #[test]
    fn test_text_parts() {
        assert_eq!(
            parse_text_part("documents", r#"[{"type":"PASSPORT"}]"#).unwrap(),
            json!([{"type": "PASSPORT"}])
        );
        assert_eq!(
            parse_text_part("bookingDetails", r#" {"hotel":"Taj"}"#).unwrap(),
            json!({"hotel": "Taj"})
        );
        assert_eq!(
            parse_text_part("status", "SIGNED").unwrap(),
            json!("SIGNED")
        );
        // Numbers stay strings in multipart; typed deserialization decides
        assert_eq!(parse_text_part("amount", "250").unwrap(), json!("250"));
        assert!(matches!(
            parse_text_part("documents", "[{broken"),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn test_json_object_body() {
        assert!(parse_json_object(b"").unwrap().is_empty());
        assert!(parse_json_object(b"  \n").unwrap().is_empty());
        assert_eq!(
            parse_json_object(br#"{"status":"RECEIVED"}"#).unwrap()["status"],
            "RECEIVED"
        );
        assert!(parse_json_object(b"[1,2]").is_err());
        assert!(parse_json_object(b"{oops").is_err());
    }

    #[test]
    fn test_pdf_only_and_size_limit() {
        let limits = UploadLimits::new(10);
        assert!(limits.check_file("a.pdf", PDF_CONTENT_TYPE, 10).is_ok());
        assert!(limits.check_file("a.pdf", PDF_CONTENT_TYPE, 11).is_err());
        assert!(limits.check_file("a.png", "image/png", 1).is_err());
        assert!(limits.check_file("a", "", 1).is_err());
    }

    #[test]
    fn test_default_limits() {
        let limits = UploadLimits::default();
        assert_eq!(limits.max_file_bytes, 5 * 1024 * 1024);
        assert!(limits.request_body_limit() > limits.max_file_bytes * limits.max_files);
    }

    #[test]
    fn test_file_parts_must_match_stage() {
        let body = StageBody {
            payload: Map::new(),
            files: vec![pdf_upload("formFile", "form.pdf")],
        };
        assert!(body.check_file_parts(StageKind::VisaApplication).is_ok());
        assert!(body.check_file_parts(StageKind::Agreement).is_err());
        assert!(body.check_file_parts(StageKind::Payment).is_err());

        let docs = StageBody {
            payload: Map::new(),
            files: vec![pdf_upload("documents", "a.pdf")],
        };
        assert!(docs.check_file_parts(StageKind::DocumentCollection).is_ok());
        assert!(docs.check_file_parts(StageKind::SupportingDocuments).is_ok());
    }
}
