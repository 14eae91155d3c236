use crate::types::{
    DebugInfo, DurationPhase, Proxy, RequestDebug, RequestError, ResponseDebug, Step, StepResult,
};
use reqwest::Client;
use reqwest::header::HeaderMap;
use std::time::Instant;

/// Sends one step's request and measures what reqwest lets us observe:
/// time to response headers, body read time and the total.
pub async fn execute_step(client: &Client, step: &Step, proxy: &Proxy, debug: bool) -> StepResult {
    let target = &step.target;
    let mut result = StepResult::new(step.id, step.name.clone());

    let mut request = client.request(target.method.clone(), &target.url);
    for (name, value) in &target.headers {
        request = request.header(name.as_str(), value.as_str());
    }
    if let Some(body) = &target.body {
        request = request.body(body.clone());
    }

    if debug {
        result.debug = Some(DebugInfo {
            request: RequestDebug {
                url: target.url.clone(),
                method: target.method.to_string(),
                headers: target.headers.clone(),
                body: target.body.clone().unwrap_or_default(),
            },
            response: None,
        });
    }

    let start = Instant::now();

    let response = match request.send().await {
        Ok(response) => response,
        Err(err) => {
            result
                .durations
                .insert(DurationPhase::Total, start.elapsed().as_secs_f64());
            return result.with_error(RequestError::from_reqwest_error(&err, proxy));
        }
    };

    let headers_at = start.elapsed();
    let status = response.status().as_u16();
    let response_headers = if debug {
        header_pairs(response.headers())
    } else {
        Vec::new()
    };

    // Always drain the body so the connection can be reused.
    let body = match response.bytes().await {
        Ok(body) => body,
        Err(err) => {
            result
                .durations
                .insert(DurationPhase::Total, start.elapsed().as_secs_f64());
            return result
                .with_status(status)
                .with_error(RequestError::from_reqwest_error(&err, proxy));
        }
    };
    let total = start.elapsed();

    if let Some(info) = result.debug.as_mut() {
        info.response = Some(ResponseDebug {
            status,
            headers: response_headers,
            body: String::from_utf8_lossy(&body).into_owned(),
        });
    }

    result
        .with_status(status)
        .with_duration(DurationPhase::ServerProcessing, headers_at.as_secs_f64())
        .with_duration(
            DurationPhase::ResponseRead,
            (total - headers_at).as_secs_f64(),
        )
        .with_duration(DurationPhase::Total, total.as_secs_f64())
}

fn header_pairs(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| {
            (
                name.to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect()
}
