//! Module serving the readings and the spreadsheet report over HTTP.
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tiny_http::{Header, Method, Request, Response, Server};

use crate::database::ReadingSource;
use crate::error::ServerError;
use crate::report::{build_report, ReportOptions};
use crate::xlsx;

const JSON_CONTENT_TYPE: &str = "application/json";

#[derive(Serialize, Deserialize, Debug, Clone)]
/// Parameters for the http server.
pub struct HttpParameters {
    /// The ip address the server should listen on.
    pub address: String,
    /// The port the server should listen on.
    pub port: u32,
    /// Origins allowed to read responses from a browser.
    #[serde(default)]
    pub allowed_origins: Vec<String>,
    /// Number of readings returned by the preview endpoint.
    #[serde(default = "default_preview_limit")]
    pub preview_limit: i64,
}

fn default_preview_limit() -> i64 {
    50
}

#[derive(Debug, Clone, PartialEq)]
/// Transport independent response produced by [`handle_request`].
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(&'static str, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    fn json_error(status: u16, message: &str) -> HttpResponse {
        HttpResponse {
            status,
            headers: vec![("Content-Type", JSON_CONTENT_TYPE.to_string())],
            body: serde_json::json!({ "error": message }).to_string().into_bytes(),
        }
    }
}

/// Routes a single request.
///
/// Failures are logged here and answered with a generic message only.
pub fn handle_request(method: &Method,
                      url: &str,
                      origin: Option<&str>,
                      source: &mut dyn ReadingSource,
                      params: &HttpParameters,
                      options: &ReportOptions,
                      now: DateTime<Utc>) -> HttpResponse
{
    let path = url.split('?').next().unwrap_or(url);

    let mut response = match (method, path) {
        (Method::Options, _) => HttpResponse {
            status: 204,
            headers: vec![
                ("Access-Control-Allow-Methods", "GET, OPTIONS".to_string()),
                ("Access-Control-Allow-Headers", "Content-Type".to_string()),
            ],
            body: Vec::new(),
        },
        (Method::Get, "/data") => recent_readings(source, params.preview_limit),
        (Method::Get, "/download") => download_report(source, options, now),
        (_, "/data") | (_, "/download") => HttpResponse::json_error(405, "Method not allowed"),
        _ => HttpResponse::json_error(404, "Not found"),
    };

    if let Some(origin) = origin {
        if params.allowed_origins.iter().any(|allowed| allowed == origin) {
            response.headers.push(("Access-Control-Allow-Origin", origin.to_string()));
            response.headers.push(("Vary", "Origin".to_string()));
        }
    }
    response
}

fn recent_readings(source: &mut dyn ReadingSource, limit: i64) -> HttpResponse {
    let readings = match source.fetch_readings(Some(limit)) {
        Ok(readings) => readings,
        Err(err) => {
            log::error!(target: "airqd::http", "Could not fetch readings: \'{}\'", err);
            return HttpResponse::json_error(500, "Error obteniendo datos");
        }
    };

    match serde_json::to_vec(&readings) {
        Ok(body) => HttpResponse {
            status: 200,
            headers: vec![("Content-Type", JSON_CONTENT_TYPE.to_string())],
            body,
        },
        Err(err) => {
            log::error!(target: "airqd::http", "Could not serialize readings: \'{}\'", err);
            HttpResponse::json_error(500, "Error obteniendo datos")
        }
    }
}

fn download_report(source: &mut dyn ReadingSource, options: &ReportOptions, now: DateTime<Utc>) -> HttpResponse {
    let readings = match source.fetch_readings(None) {
        Ok(readings) => readings,
        Err(err) => {
            log::error!(target: "airqd::http", "Could not fetch readings for report: \'{}\'", err);
            return HttpResponse::json_error(500, "Error generando Excel");
        }
    };

    let report = build_report(&readings, now, options);
    match xlsx::render(&report) {
        Ok(body) => {
            log::info!(target: "airqd::http", "Generated report with {} readings, status {:?}",
                       report.data_rows, report.status);
            HttpResponse {
                status: 200,
                headers: vec![
                    ("Content-Type", xlsx::CONTENT_TYPE.to_string()),
                    ("Content-Disposition", format!("attachment; filename={}", xlsx::FILENAME)),
                ],
                body,
            }
        }
        Err(err) => {
            log::error!(target: "airqd::http", "Could not generate report: \'{}\'", err);
            HttpResponse::json_error(500, "Error generando Excel")
        }
    }
}

fn respond(request: Request, response: HttpResponse) {
    let mut reply = Response::from_data(response.body).with_status_code(response.status);
    for (field, value) in &response.headers {
        match Header::from_bytes(field.as_bytes(), value.as_bytes()) {
            Ok(header) => reply.add_header(header),
            Err(_) => log::warn!(target: "airqd::http", "Skipping invalid header \'{}\'", field),
        }
    }
    match request.respond(reply) {
        Ok(_) => log::trace!(target: "airqd::http", "Response sent!"),
        Err(err) => log::warn!(target: "airqd::http", "Could not send response: \'{}\'", err),
    }
}

/// Thread function for the http server.
///
/// Requests are served one after another until `thread_finish` is set or the server
/// cannot accept connections anymore. In the latter case `thread_finish` is set as well and
/// the failure is returned.
///
/// # Arguments
///
/// * `source` - Where readings are fetched from for every request.
///
/// * `thread_finish` - Indicates that the thread should finish operation and should return.
///
/// * `params` - Parameters for the http server.
///
/// * `options` - Options controlling the generated report.
///
pub fn server_thread<S: ReadingSource>(mut source: S,
                                       thread_finish: Arc<AtomicBool>,
                                       params: HttpParameters,
                                       options: ReportOptions) -> Result<(), ServerError>
{
    let address = format!("{}:{}", params.address, params.port);
    let server = match Server::http(address.as_str()) {
        Ok(server) => server,
        Err(err) => {
            log::error!(target: "airqd::http", "Could not open http server: \'{}\'", err);
            thread_finish.store(true, Ordering::SeqCst);
            return Err(ServerError::Bind { address, source: err });
        }
    };
    log::info!(target: "airqd::http", "Server listening on \'{}:{}\'", params.address, params.port);

    let timeout = time::Duration::from_millis(100);

    while !thread_finish.load(Ordering::SeqCst) {
        let request = match server.recv_timeout(timeout) {
            Ok(Some(request)) => request,
            Ok(None) => continue,
            Err(err) => {
                log::error!(target: "airqd::http", "Server cannot receive requests: \'{}\'", err);
                thread_finish.store(true, Ordering::SeqCst);
                return Err(ServerError::Receive(err));
            }
        };

        log::debug!(target: "airqd::http", "{} {}", request.method(), request.url());

        let origin = request
            .headers()
            .iter()
            .find(|header| header.field.equiv("Origin"))
            .map(|header| header.value.as_str().to_string());

        let response = handle_request(request.method(),
                                      request.url(),
                                      origin.as_deref(),
                                      &mut source,
                                      &params,
                                      &options,
                                      Utc::now());
        respond(request, response);
    }
    Ok(())
}
