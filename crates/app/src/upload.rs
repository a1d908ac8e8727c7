//! Blocking upload client for the analysis server. The encoded attempt goes
//! up as multipart form data with the word, the measured noise floor and the
//! test stage alongside the bytes; the floor lets the server judge recording
//! conditions when scoring.

use std::str::FromStr;
use std::time::Duration;

use reqwest::blocking::multipart::{Form, Part};
use serde::Deserialize;

use echocoach_endpoint::RecordingAttempt;
use echocoach_foundation::AppError;

/// Which half of the practice run an attempt belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestStage {
    Pre,
    Post,
}

impl TestStage {
    pub fn as_str(self) -> &'static str {
        match self {
            TestStage::Pre => "pre",
            TestStage::Post => "post",
        }
    }
}

impl FromStr for TestStage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pre" => Ok(TestStage::Pre),
            "post" => Ok(TestStage::Post),
            other => Err(format!("unknown stage {other:?}, expected pre or post")),
        }
    }
}

/// Server verdict on one attempt. The distance is an opaque score in Bark
/// space; smaller is closer to the reference pronunciation.
#[derive(Debug, Clone, Deserialize)]
pub struct Analysis {
    pub distance_bark: f32,
    #[serde(default)]
    pub recommendation: String,
}

#[derive(Debug, Deserialize)]
struct AnalyzeResponse {
    analysis: Analysis,
}

pub struct UploadClient {
    base_url: String,
    client: reqwest::blocking::Client,
}

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

impl UploadClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, AppError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| AppError::Network(e.to_string()))?;
        Ok(Self {
            base_url: base_url.into(),
            client,
        })
    }

    pub fn analyze(
        &self,
        attempt: &RecordingAttempt,
        stage: TestStage,
    ) -> Result<Analysis, AppError> {
        let part = Part::bytes(attempt.encoded.clone())
            .file_name(format!("{}.wav", attempt.word))
            .mime_str("audio/wav")
            .map_err(|e| AppError::Network(e.to_string()))?;
        let form = Form::new()
            .part("audio", part)
            .text("word", attempt.word.clone())
            .text("noiseFloor", attempt.noise_floor.to_string())
            .text("testType", stage.as_str());

        let url = format!("{}/analyze", self.base_url.trim_end_matches('/'));
        tracing::debug!(%url, word = %attempt.word, "uploading attempt");
        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .map_err(|e| AppError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AppError::Network(format!(
                "server returned {}",
                response.status()
            )));
        }

        let body: AnalyzeResponse = response
            .json()
            .map_err(|e| AppError::Network(format!("bad analysis response: {e}")))?;
        Ok(body.analysis)
    }
}
