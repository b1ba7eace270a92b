//! HTML status page

use std::fmt::Write;

use axum::{extract::State, response::Html};

use crate::api::state::ApiState;
use crate::api::types::{ServiceStatus, ServiceSummary};

/// GET /
pub async fn index(State(state): State<ApiState>) -> Html<String> {
    let services = super::summarize(&state).await;
    Html(render(&services))
}

fn last_status_text(service: &ServiceSummary) -> String {
    let status = match service.last_status {
        ServiceStatus::Up => "OK",
        ServiceStatus::Down => "ERR",
        ServiceStatus::Unknown => return "Not yet checked".to_string(),
    };

    format!(
        "{}, {} seconds ago",
        status,
        service.seconds_since_last_check.unwrap_or_default()
    )
}

fn uptime_text(service: &ServiceSummary) -> String {
    match service.uptime {
        Some(uptime) => format!("{uptime:.2}%"),
        None => "unknown".to_string(),
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

pub fn render(services: &[ServiceSummary]) -> String {
    let mut rows = String::new();
    for service in services {
        let class = match service.last_status {
            ServiceStatus::Up => "up",
            ServiceStatus::Down => "down",
            ServiceStatus::Unknown => "unknown",
        };

        // writing to a String cannot fail
        let _ = write!(
            rows,
            "<tr class=\"{class}\"><td>{}</td><td>tested {} times</td><td>{}</td><td>{}</td></tr>",
            escape(&service.name),
            service.checks,
            last_status_text(service),
            uptime_text(service),
        );
    }

    format!(
        "<!DOCTYPE html>\
<html><head><meta charset=\"utf-8\"><meta http-equiv=\"refresh\" content=\"10\">\
<title>Service monitor</title>\
<style>body{{font-family:sans-serif}}td,th{{padding:4px 12px;text-align:left}}\
.up{{color:#2e7d32}}.down{{color:#c62828}}.unknown{{color:#757575}}</style></head>\
<body><h1>Service monitor</h1><table>\
<tr><th>Service</th><th>Checks</th><th>Last status</th><th>Uptime</th></tr>{rows}</table>\
</body></html>"
    )
}
