//! reqwest implementation of the recognition service.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use tracing::debug;
use url::Url;

use super::response::{decode_envelope, decode_plain, status_error, ServiceError};
use super::types::{
    BatchRequest, BatchResponse, BatchTarget, DocumentInit, ExtractedFrame, ExtractedFrames,
    ExtractedPage, ExtractedPages, FrameExtraction, ItemOutcome, ItemOutcomes, PagePreview,
    RecognizedText, ServerHealth, UploadReceipt, VideoUpload,
};
use super::RecognitionService;
use crate::models::{DocumentTask, InputFile, PreprocessingConfig, RecognitionConfig};
use crate::utils::server_file_route;

/// HTTP client for the recognition backend.
pub struct HttpRecognitionClient {
    client: Client,
    base: Url,
}

impl HttpRecognitionClient {
    /// Create a client for the backend at `base_url`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ServiceError> {
        let mut base = Url::parse(base_url)
            .map_err(|e| ServiceError::Connection(format!("invalid server URL '{}': {}", base_url, e)))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ServiceError::Connection(e.to_string()))?;

        Ok(Self { client, base })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Resolve an absolute route such as `/api/ocr` against the base URL.
    fn endpoint(&self, route: &str) -> Result<Url, ServiceError> {
        let encoded: Vec<String> = route
            .trim_start_matches('/')
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect();
        self.base
            .join(&encoded.join("/"))
            .map_err(|e| ServiceError::Connection(format!("invalid route '{}': {}", route, e)))
    }

    async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        route: &str,
        body: &B,
    ) -> Result<T, ServiceError> {
        let url = self.endpoint(route)?;
        debug!("POST {}", url);
        let resp = self.client.post(url).json(body).send().await?;
        Self::read_envelope(resp).await
    }

    async fn post_form<T: DeserializeOwned>(&self, route: &str, form: Form) -> Result<T, ServiceError> {
        let url = self.endpoint(route)?;
        debug!("POST {} (multipart)", url);
        let resp = self.client.post(url).multipart(form).send().await?;
        Self::read_envelope(resp).await
    }

    async fn post_for_blob<B: Serialize + ?Sized>(
        &self,
        route: &str,
        body: &B,
    ) -> Result<Vec<u8>, ServiceError> {
        let url = self.endpoint(route)?;
        debug!("POST {} (blob)", url);
        let resp = self.client.post(url).json(body).send().await?;
        Self::read_blob(resp).await
    }

    async fn read_envelope<T: DeserializeOwned>(resp: Response) -> Result<T, ServiceError> {
        let status = resp.status();
        let body = resp.text().await?;
        decode_envelope(status, &body)
    }

    async fn read_blob(resp: Response) -> Result<Vec<u8>, ServiceError> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(status_error(status, &body));
        }
        Ok(resp.bytes().await?.to_vec())
    }
}

fn file_part(file: &InputFile) -> Result<Part, ServiceError> {
    Part::bytes(file.bytes.clone())
        .file_name(file.name.clone())
        .mime_str(&file.mime_type)
        .map_err(|e| ServiceError::Connection(format!("invalid MIME type for {}: {}", file.name, e)))
}

fn with_recognition(mut form: Form, recognition: &RecognitionConfig) -> Form {
    for (name, value) in recognition.form_fields() {
        form = form.text(name, value);
    }
    form
}

#[async_trait]
impl RecognitionService for HttpRecognitionClient {
    async fn init_document(
        &self,
        file: &InputFile,
        recognition: &RecognitionConfig,
    ) -> Result<DocumentTask, ServiceError> {
        let form = with_recognition(Form::new().part("file", file_part(file)?), recognition);
        let init: DocumentInit = self.post_form("/api/pdf/init", form).await?;
        Ok(init.into())
    }

    async fn preview_page(&self, task_id: &str, page: u32) -> Result<String, ServiceError> {
        let preview: PagePreview = self
            .post_json(
                "/api/pdf/preview-page",
                &json!({ "task_id": task_id, "page_number": page }),
            )
            .await?;
        Ok(preview.image)
    }

    async fn extract_pages(&self, task_id: &str) -> Result<Vec<ExtractedPage>, ServiceError> {
        let pages: ExtractedPages = self
            .post_json("/api/pdf/extract-pages", &json!({ "task_id": task_id }))
            .await?;
        Ok(pages.images)
    }

    async fn cancel_task(&self, task_id: &str) -> Result<(), ServiceError> {
        let url = self.endpoint("/api/pdf/cancel")?;
        let resp = self
            .client
            .post(url)
            .json(&json!({ "task_id": task_id }))
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(status_error(status, &body));
        }
        Ok(())
    }

    async fn upload_items(&self, files: &[InputFile]) -> Result<UploadReceipt, ServiceError> {
        let mut form = Form::new();
        for file in files {
            form = form.part("files", file_part(file)?);
        }
        self.post_form("/api/preprocess/upload", form).await
    }

    async fn run_preprocessing(
        &self,
        task_id: &str,
        config: &PreprocessingConfig,
    ) -> Result<Vec<ItemOutcome>, ServiceError> {
        let outcomes: ItemOutcomes = self
            .post_json(
                "/api/preprocess/process",
                &json!({ "task_id": task_id, "settings": config }),
            )
            .await?;
        Ok(outcomes.results)
    }

    async fn download_preprocessed(&self, task_id: &str) -> Result<Vec<u8>, ServiceError> {
        self.post_for_blob("/api/preprocess/download", &json!({ "task_id": task_id }))
            .await
    }

    async fn upload_video(&self, file: &InputFile) -> Result<VideoUpload, ServiceError> {
        let form = Form::new().part("file", file_part(file)?);
        self.post_form("/api/video/upload", form).await
    }

    async fn extract_frames(
        &self,
        task_id: &str,
        settings: &FrameExtraction,
    ) -> Result<Vec<ExtractedFrame>, ServiceError> {
        let frames: ExtractedFrames = self
            .post_json(
                "/api/video/extract",
                &json!({ "task_id": task_id, "settings": settings }),
            )
            .await?;
        Ok(frames.frames)
    }

    async fn download_frames(&self, task_id: &str, indices: &[u32]) -> Result<Vec<u8>, ServiceError> {
        self.post_for_blob(
            "/api/video/download",
            &json!({ "task_id": task_id, "selected_frames": indices }),
        )
        .await
    }

    async fn run_batch(
        &self,
        target: BatchTarget,
        request: &BatchRequest,
    ) -> Result<BatchResponse, ServiceError> {
        let route = match target {
            BatchTarget::Document => "/api/pdf/process-batch",
            BatchTarget::Frames => "/api/video/process-batch",
        };
        self.post_json(route, request).await
    }

    async fn recognize_image(
        &self,
        file: &InputFile,
        recognition: &RecognitionConfig,
    ) -> Result<String, ServiceError> {
        let form = with_recognition(Form::new().part("file", file_part(file)?), recognition);
        let recognized: RecognizedText = self.post_form("/api/ocr", form).await?;
        Ok(recognized.text)
    }

    async fn fetch_file(&self, path: &str) -> Result<Vec<u8>, ServiceError> {
        let url = self.endpoint(&server_file_route(path))?;
        debug!("GET {}", url);
        let resp = self.client.get(url).send().await?;
        Self::read_blob(resp).await
    }

    async fn health(&self) -> Result<ServerHealth, ServiceError> {
        let url = self.endpoint("/api/health")?;
        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        let body = resp.text().await?;
        decode_plain(status, &body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joins_under_base_path() {
        let client =
            HttpRecognitionClient::new("http://ocr.local:5001/gateway", Duration::from_secs(5))
                .unwrap();
        assert_eq!(
            client.endpoint("/api/ocr").unwrap().as_str(),
            "http://ocr.local:5001/gateway/api/ocr"
        );
    }

    #[test]
    fn test_endpoint_encodes_segments() {
        let client = HttpRecognitionClient::new("http://ocr.local:5001", Duration::from_secs(5))
            .unwrap();
        assert_eq!(
            client
                .endpoint("/api/files/preprocess_a/processed/my scan.png")
                .unwrap()
                .as_str(),
            "http://ocr.local:5001/api/files/preprocess_a/processed/my%20scan.png"
        );
    }

    #[test]
    fn test_rejects_invalid_base_url() {
        assert!(matches!(
            HttpRecognitionClient::new("not a url", Duration::from_secs(5)),
            Err(ServiceError::Connection(_))
        ));
    }
}
