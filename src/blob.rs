//! Blob-to-text conversion interface for `/ocr_upload` and `/transcribe`
//! (spec §1 Non-goals: "OCR/ASR model weights... consumed via a
//! blob-in/text-out interface"). [`UnavailableBlobService`] is the only
//! implementation shipped — no OCR/ASR model is vendored — but the trait
//! boundary is real so a deployment can plug one in.

use async_trait::async_trait;
use bytes::Bytes;

use crate::errors::AppError;

#[async_trait]
pub trait BlobToText: Send + Sync {
    async fn convert(&self, bytes: Bytes, content_type: &str) -> Result<String, AppError>;
}

pub struct UnavailableBlobService;

#[async_trait]
impl BlobToText for UnavailableBlobService {
    async fn convert(&self, _bytes: Bytes, _content_type: &str) -> Result<String, AppError> {
        Err(AppError::ClientError(
            "OCR/transcription not configured in this deployment".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unavailable_service_returns_client_error() {
        let service = UnavailableBlobService;
        let err = service.convert(Bytes::new(), "image/png").await.unwrap_err();
        assert!(matches!(err, AppError::ClientError(_)));
    }
}
