//! Multipart form reading for the PDF upload routes.

use std::collections::HashMap;

use axum::extract::Multipart;

use crate::error::ReviewError;
use crate::persistence::files::is_pdf;

/// Name of the form field carrying the PDF.
pub const FILE_FIELD: &str = "file";

/// Text fields and the PDF of an upload form.
#[derive(Debug, Default)]
pub struct UploadForm {
    /// Every non-file field by name; later duplicates win.
    pub fields: HashMap<String, String>,
    /// The PDF bytes, already checked for size and signature.
    pub pdf: Option<Vec<u8>>,
}

impl UploadForm {
    /// Text field `name`, trimmed, `None` when absent or blank.
    #[must_use]
    pub fn text(&self, name: &str) -> Option<String> {
        self.fields
            .get(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    /// The PDF, or a validation error naming the file field.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewError::Validation`] when no file was sent.
    pub fn require_pdf(&mut self) -> Result<Vec<u8>, ReviewError> {
        self.pdf
            .take()
            .ok_or_else(|| ReviewError::validation(FILE_FIELD, "a PDF file is required"))
    }
}

/// Drains `multipart` into an [`UploadForm`].
///
/// # Errors
///
/// Returns [`ReviewError::Validation`] for a malformed body, a file larger
/// than `max_bytes`, or a file that is not a PDF.
pub async fn read_upload_form(
    multipart: &mut Multipart,
    max_bytes: usize,
) -> Result<UploadForm, ReviewError> {
    let mut form = UploadForm::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ReviewError::validation("body", e.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if name == FILE_FIELD {
            let data = field
                .bytes()
                .await
                .map_err(|e| ReviewError::validation(FILE_FIELD, e.body_text()))?;
            if data.is_empty() {
                continue;
            }
            if data.len() > max_bytes {
                return Err(ReviewError::validation(
                    FILE_FIELD,
                    format!("file exceeds {max_bytes} bytes"),
                ));
            }
            if !is_pdf(&data) {
                return Err(ReviewError::validation(FILE_FIELD, "not a PDF document"));
            }
            form.pdf = Some(data.to_vec());
        } else {
            let text = field
                .text()
                .await
                .map_err(|e| ReviewError::validation("body", e.body_text()))?;
            form.fields.insert(name, text);
        }
    }
    Ok(form)
}
