//! HTTP text recognition client.
//!
//! Posts the captured region as PNG bytes to `{base_url}/v1/text` and reads
//! `{"text": "..."}` back. A 404 means the service found no text.

use crate::{PlatformError, PlatformResult};
use image::ImageFormat;
use posflow_core::ports::{PixelBuffer, PortError, TextRecognizer};
use posflow_core::OcrSettings;
use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::Deserialize;
use std::io::Cursor;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct TextResponse {
    text: String,
}

/// Text recognizer backed by an HTTP OCR service.
pub struct HttpTextRecognizer {
    base_url: String,
    client: Client,
}

impl HttpTextRecognizer {
    pub fn new(settings: &OcrSettings) -> PlatformResult<Self> {
        let client = Client::builder().timeout(settings.timeout()).build()?;
        Ok(Self {
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/text", self.base_url)
    }

    fn request(&self, image: &PixelBuffer) -> PlatformResult<String> {
        let mut png_bytes = Vec::new();
        image.write_to(&mut Cursor::new(&mut png_bytes), ImageFormat::Png)?;

        let response = self
            .client
            .post(self.endpoint())
            .header("Content-Type", "application/octet-stream")
            .body(png_bytes)
            .send()?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(String::new());
        }
        let response = response.error_for_status()?;
        let body: TextResponse = response.json()?;
        debug!(len = body.text.len(), "OCR returned text");
        Ok(body.text)
    }
}

impl TextRecognizer for HttpTextRecognizer {
    fn recognize(&self, image: &PixelBuffer) -> Result<String, PortError> {
        self.request(image).map_err(|e| match e {
            // Encoding a buffer we own only fails on a broken image.
            PlatformError::Image(e) => PortError::RecognitionFailed(e.to_string()),
            other => other.into(),
        })
    }
}
