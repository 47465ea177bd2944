//! Simulated `menu-analysis` job: walks the uploaded images one at a time.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde_json::{json, Value};

use super::types::{JobFuture, JobHandler, ProgressReporter};
use crate::task::TaskError;

pub const KIND: &str = "menu-analysis";
pub const MAX_IMAGES: usize = 10;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalysisRequest {
    #[serde(default)]
    menu_id: Option<String>,
    #[serde(default)]
    images: Vec<String>,
}

pub fn handler(step_delay: Duration) -> JobHandler {
    Arc::new(move |payload: Value, reporter: ProgressReporter| -> JobFuture {
        Box::pin(analyze(payload, reporter, step_delay))
    })
}

async fn analyze(payload: Value, reporter: ProgressReporter, step_delay: Duration) -> Result<Value, TaskError> {
    let request: AnalysisRequest =
        serde_json::from_value(payload).map_err(|err| invalid(&format!("malformed payload: {err}")))?;
    if request.images.is_empty() {
        return Err(invalid("no images supplied"));
    }
    if request.images.len() > MAX_IMAGES {
        return Err(invalid(&format!(
            "too many images: {} (max {MAX_IMAGES})",
            request.images.len()
        )));
    }
    if let Some(idx) = request.images.iter().position(|image| image.trim().is_empty()) {
        return Err(invalid(&format!("image {} has an empty reference", idx + 1)));
    }

    let total = request.images.len();
    reporter.report(5, "Preparing images");

    let mut analyzed = Vec::with_capacity(total);
    for (idx, image) in request.images.iter().enumerate() {
        reporter.report(
            step_progress(idx, total),
            &format!("Analyzing image {} of {}", idx + 1, total),
        );
        tokio::time::sleep(step_delay).await;
        analyzed.push(json!({ "image": image, "status": "analyzed" }));
    }

    reporter.report(95, "Building menu");
    Ok(json!({
        "menuId": request.menu_id,
        "imagesAnalyzed": total,
        "images": analyzed,
    }))
}

// 5..95 spread evenly across the images.
fn step_progress(idx: usize, total: usize) -> u8 {
    let value = 5 + (idx * 90) / total.max(1);
    u8::try_from(value.min(95)).unwrap_or(95)
}

fn invalid(message: &str) -> TaskError {
    TaskError::new(message).with_code("invalid_payload")
}
