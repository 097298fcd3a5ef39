use bytes::Bytes;

use crate::validation::{field_label, ValidationErrors};

/// Form field carrying the uploaded file (the name the web client submits).
pub const ATTACHMENT_FIELD: &str = "attachment_url";

pub const MAX_ATTACHMENT_KB: usize = 5120;
pub const MAX_ATTACHMENT_BYTES: usize = MAX_ATTACHMENT_KB * 1024;

pub const PDF_CONTENT_TYPE: &str = "application/pdf";
const PDF_MAGIC: &[u8] = b"%PDF-";

/// A file received with a create/update request, not yet persisted.
#[derive(Debug, Clone)]
pub struct Upload {
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub data: Bytes,
}

impl Upload {
    pub fn pdf(filename: &str, data: impl Into<Bytes>) -> Self {
        Self {
            filename: Some(filename.to_string()),
            content_type: Some(PDF_CONTENT_TYPE.to_string()),
            data: data.into(),
        }
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    fn declared_pdf(&self) -> bool {
        let by_type = self
            .content_type
            .as_deref()
            .map(|ct| ct.split(';').next().unwrap_or("").trim())
            .is_some_and(|ct| ct.eq_ignore_ascii_case(PDF_CONTENT_TYPE));
        let by_name = self
            .filename
            .as_deref()
            .is_some_and(|name| name.to_ascii_lowercase().ends_with(".pdf"));
        by_type || by_name
    }

    /// PDF declared by type or name, confirmed by the file's leading bytes.
    pub fn is_pdf(&self) -> bool {
        self.declared_pdf() && self.data.starts_with(PDF_MAGIC)
    }

    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let label = field_label(ATTACHMENT_FIELD);
        let mut errors = ValidationErrors::new();
        if !self.is_pdf() {
            errors.add(
                ATTACHMENT_FIELD,
                format!("The {label} field must be a file of type: pdf."),
            );
        }
        if self.size() > MAX_ATTACHMENT_BYTES {
            errors.add(
                ATTACHMENT_FIELD,
                format!("The {label} field must not be greater than {MAX_ATTACHMENT_KB} kilobytes."),
            );
        }
        errors.into_result(())
    }
}

/// Attachment bytes served by the preview endpoint.
#[derive(Debug, Clone)]
pub struct AttachmentFile {
    pub filename: String,
    pub content_type: String,
    pub data: Bytes,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pdf_bytes(len: usize) -> Vec<u8> {
        let mut data = b"%PDF-1.7\n".to_vec();
        data.resize(len.max(data.len()), b' ');
        data
    }

    #[test]
    fn accepts_small_pdf() {
        let upload = Upload::pdf("report.pdf", pdf_bytes(1024));
        assert!(upload.is_pdf());
        assert!(upload.validate().is_ok());
    }

    #[test]
    fn accepts_exactly_the_limit() {
        let upload = Upload::pdf("big.pdf", pdf_bytes(MAX_ATTACHMENT_BYTES));
        assert!(upload.validate().is_ok());
    }

    #[test]
    fn rejects_oversize_pdf() {
        let upload = Upload::pdf("big.pdf", pdf_bytes(6 * 1024 * 1024));
        let errors = upload.validate().unwrap_err();
        assert_eq!(
            errors.get(ATTACHMENT_FIELD).unwrap(),
            ["The attachment url field must not be greater than 5120 kilobytes."]
        );
    }

    #[test]
    fn rejects_non_pdf_content() {
        let upload = Upload::pdf("fake.pdf", Bytes::from_static(b"GIF89a...."));
        let errors = upload.validate().unwrap_err();
        assert_eq!(
            errors.get(ATTACHMENT_FIELD).unwrap(),
            ["The attachment url field must be a file of type: pdf."]
        );
    }

    #[test]
    fn name_or_type_declares_pdf() {
        let by_name = Upload {
            filename: Some("Scan.PDF".into()),
            content_type: Some("application/octet-stream".into()),
            data: Bytes::from(pdf_bytes(16)),
        };
        assert!(by_name.is_pdf());

        let by_type = Upload {
            filename: None,
            content_type: Some("application/pdf; charset=binary".into()),
            data: Bytes::from(pdf_bytes(16)),
        };
        assert!(by_type.is_pdf());

        let neither = Upload {
            filename: Some("notes.txt".into()),
            content_type: Some("text/plain".into()),
            data: Bytes::from(pdf_bytes(16)),
        };
        assert!(!neither.is_pdf());
    }
}
