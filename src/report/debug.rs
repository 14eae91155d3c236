use crate::types::{ScenarioResult, StepResult};
use std::io::{self, Write};

/// Full request/response transcript of one run, step by step.
pub fn write_transcript<W: Write + ?Sized>(w: &mut W, result: &ScenarioResult) -> io::Result<()> {
    writeln!(
        w,
        "Run started {} via {}",
        result.start_time.format("%Y-%m-%d %H:%M:%S%.3f UTC"),
        result.proxy
    )?;
    for step in &result.step_results {
        write_step(w, step)?;
    }
    Ok(())
}

fn write_step<W: Write + ?Sized>(w: &mut W, step: &StepResult) -> io::Result<()> {
    writeln!(w, "\n\nSTEP ({}) {}", step.step_id, step.name)?;
    writeln!(w, "-------------------------------------")?;
    writeln!(w, "***********  REQUEST  ***********")?;

    let Some(info) = &step.debug else {
        writeln!(w, "(request details were not captured)")?;
        if let Some(err) = &step.error {
            writeln!(w, "Error:      {}", err.reason)?;
        }
        return writeln!(w);
    };

    let request = &info.request;
    writeln!(w, "> Target:     {}", request.url)?;
    writeln!(w, "> Method:     {}", request.method)?;
    writeln!(w, "Request Headers:")?;
    for (name, value) in &request.headers {
        writeln!(w, "> {}:    {}", name, value)?;
    }
    writeln!(w, "Request Body:")?;
    write_body(w, content_type(&request.headers), &request.body)?;

    match (&step.error, &info.response) {
        (Some(err), _) => {
            writeln!(w, "Error:      {}", err.reason)?;
        }
        (None, Some(response)) => {
            writeln!(w, "\n***********  RESPONSE  ***********")?;
            writeln!(w, "< StatusCode:    {}", response.status)?;
            writeln!(w, "Response Headers:")?;
            for (name, value) in &response.headers {
                writeln!(w, "< {}:    {}", name, value)?;
            }
            writeln!(w, "Response Body:")?;
            write_body(w, content_type(&response.headers), &response.body)?;
        }
        (None, None) => {
            writeln!(w, "(response was not captured)")?;
        }
    }

    writeln!(w)
}

fn content_type(headers: &[(String, String)]) -> &str {
    headers
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case("content-type"))
        .map(|(_, value)| value.as_str())
        .unwrap_or("")
}

/// JSON bodies are pretty-printed; anything else, or JSON that fails to parse,
/// is written as-is.
fn write_body<W: Write + ?Sized>(w: &mut W, content_type: &str, body: &str) -> io::Result<()> {
    if content_type.contains("application/json") {
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
            if let Ok(pretty) = serde_json::to_string_pretty(&value) {
                return writeln!(w, "{}", pretty);
            }
        }
    }
    writeln!(w, "{}", body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        DebugInfo, ErrorKind, Proxy, RequestDebug, RequestError, ResponseDebug,
    };
    use chrono::Utc;

    fn render(steps: Vec<StepResult>) -> String {
        let mut result = ScenarioResult::new(Proxy::Direct, Utc::now());
        result.step_results = steps;
        let mut buf = Vec::new();
        write_transcript(&mut buf, &result).unwrap();
        String::from_utf8(buf).unwrap()
    }

    fn request(body: &str, content_type: &str) -> RequestDebug {
        RequestDebug {
            url: "https://api.example.com/login".to_string(),
            method: "POST".to_string(),
            headers: vec![("Content-Type".to_string(), content_type.to_string())],
            body: body.to_string(),
        }
    }

    #[test]
    fn successful_step_shows_request_and_response() {
        let mut step = StepResult::new(1, "login").with_status(200);
        step.debug = Some(DebugInfo {
            request: request(r#"{"user":"goku","power":9001}"#, "application/json"),
            response: Some(ResponseDebug {
                status: 200,
                headers: vec![("content-type".to_string(), "text/plain".to_string())],
                body: "welcome".to_string(),
            }),
        });

        let text = render(vec![step]);
        assert!(text.contains("STEP (1) login"));
        assert!(text.contains("> Target:     https://api.example.com/login"));
        assert!(text.contains("> Method:     POST"));
        assert!(text.contains("> Content-Type:    application/json"));
        assert!(text.contains("{\n  \"power\": 9001,\n  \"user\": \"goku\"\n}"), "{}", text);
        assert!(text.contains("< StatusCode:    200"));
        assert!(text.contains("Response Body:\nwelcome\n"));
    }

    #[test]
    fn failed_step_shows_error_instead_of_response() {
        let mut step = StepResult::new(2, "checkout")
            .with_error(RequestError::new(ErrorKind::Conn, "timeout"));
        step.debug = Some(DebugInfo {
            request: request("plain body", "text/plain"),
            response: None,
        });

        let text = render(vec![step]);
        assert!(text.contains("Request Body:\nplain body\n"));
        assert!(text.contains("Error:      timeout"));
        assert!(!text.contains("RESPONSE"));
    }

    #[test]
    fn invalid_json_body_is_written_literally() {
        let mut step = StepResult::new(1, "").with_status(200);
        step.debug = Some(DebugInfo {
            request: request("{not json", "application/json"),
            response: None,
        });

        let text = render(vec![step]);
        assert!(text.contains("Request Body:\n{not json\n"));
    }

    #[test]
    fn steps_are_rendered_in_order() {
        let text = render(vec![StepResult::new(1, "a"), StepResult::new(2, "b")]);
        assert!(text.starts_with("Run started "));
        assert!(text.lines().next().unwrap().ends_with(" via direct"));
        assert!(text.find("STEP (1) a").unwrap() < text.find("STEP (2) b").unwrap());
        assert!(text.contains("(request details were not captured)"));
    }
}
