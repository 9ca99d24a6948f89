use image::{DynamicImage, ImageFormat, RgbImage};
use reqwest::blocking::Client;
use serde::Deserialize;
use std::io::Cursor;
use std::sync::OnceLock;
use std::time::Duration;

use super::{CaptionError, Captioner, ModelError};

#[derive(Debug, Deserialize)]
struct GeneratedText {
    generated_text: String,
}

/// Captions images through a hosted image-to-text endpoint.
///
/// The endpoint receives raw JPEG bytes and answers with
/// `[{"generated_text": "..."}]`. The blocking client is built on first use
/// so that construction never happens on an async worker.
pub struct HttpCaptioner {
    endpoint: reqwest::Url,
    api_token: Option<String>,
    timeout: Duration,
    client: OnceLock<Client>,
}

impl HttpCaptioner {
    pub fn new(
        endpoint: String,
        api_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ModelError> {
        let endpoint = reqwest::Url::parse(&endpoint).map_err(|e| ModelError::Load {
            path: endpoint.clone(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            endpoint,
            api_token,
            timeout,
            client: OnceLock::new(),
        })
    }

    fn client(&self) -> Result<&Client, CaptionError> {
        if let Some(client) = self.client.get() {
            return Ok(client);
        }
        let client = Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| CaptionError::Request(e.to_string()))?;
        Ok(self.client.get_or_init(|| client))
    }
}

pub(crate) fn parse_caption(body: &str) -> Result<String, CaptionError> {
    let generated: Vec<GeneratedText> =
        serde_json::from_str(body).map_err(|e| CaptionError::Request(e.to_string()))?;
    generated
        .into_iter()
        .map(|g| g.generated_text.trim().to_string())
        .find(|text| !text.is_empty())
        .ok_or(CaptionError::EmptyResponse)
}

impl Captioner for HttpCaptioner {
    fn caption(&self, image: &RgbImage) -> Result<String, CaptionError> {
        let mut jpeg = Vec::new();
        DynamicImage::ImageRgb8(image.clone())
            .write_to(&mut Cursor::new(&mut jpeg), ImageFormat::Jpeg)?;

        let mut request = self
            .client()?
            .post(self.endpoint.clone())
            .header(reqwest::header::CONTENT_TYPE, "image/jpeg")
            .body(jpeg);
        if let Some(token) = &self.api_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .map_err(|e| CaptionError::Request(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(CaptionError::Status(status.as_u16()));
        }
        let body = response
            .text()
            .map_err(|e| CaptionError::Request(e.to_string()))?;
        let caption = parse_caption(&body)?;
        log::debug!("Generated caption: {}", caption);
        Ok(caption)
    }
}
