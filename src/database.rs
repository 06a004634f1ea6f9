//! Module for connecting to a postgres database and reading the air quality readings
//! stored there.
use chrono::{DateTime, Utc};
use openssl::ssl::{SslConnector, SslFiletype, SslMethod, SslVerifyMode};
use postgres::{Client, Row};
use postgres_openssl::MakeTlsConnector;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::SourceError;
use crate::reading::Reading;

static SQL_SELECT_READINGS: &'static str = include_str!("sql/select_readings.sql");
static SQL_SELECT_RECENT_READINGS: &'static str = include_str!("sql/select_recent_readings.sql");

#[derive(Serialize, Deserialize, Debug, Clone)]
/// Struct modeling the parameters required for a database connection.
///
/// This includes SSL/TLS encryption.
pub struct DatabaseParameters
{
    /// The hostname of the database server.
    pub hostname: String,
    /// The port for the database server.
    pub port: u32,
    /// The username to connect as.
    pub username: String,
    /// The password to connect with.
    pub password: String,
    /// The database to open on the server.
    pub database: String,
    /// Flag to enable tls for the database server connection.
    pub tls_enable: bool,
    /// Parameters for the tls connection to the database server.
    pub tls_params: Option<DatabaseTlsParameters>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
/// Struct for the parameters required for a tls connection to the database.
pub struct DatabaseTlsParameters {
    /// The path to the server certificate for TLS encryption.
    pub server_ca_path: String,
    /// The path to the client certificate for TLS encryption.
    pub client_cert_path: String,
    /// The path to the client key for TLS encryption.
    pub client_key_path: String,
}

/// Read-only source of readings, newest first.
pub trait ReadingSource {
    /// Fetches readings ordered by timestamp descending.
    ///
    /// With `limit` set only that many of the most recent readings are returned.
    fn fetch_readings(&mut self, limit: Option<i64>) -> Result<Vec<Reading>, SourceError>;
}

/// Reading source backed by the `air_readings` table.
///
/// The connection is opened on first use and dropped after a failed query, so the next
/// call reconnects.
pub struct PostgresReadingSource {
    parameters: DatabaseParameters,
    client: Option<Client>,
}

impl PostgresReadingSource {
    pub fn new(parameters: DatabaseParameters) -> PostgresReadingSource {
        PostgresReadingSource { parameters, client: None }
    }

    fn client(&mut self) -> Result<&mut Client, SourceError> {
        let client = match self.client.take() {
            Some(client) => client,
            None => {
                let client = connect(&self.parameters)?;
                log::info!(target: "airqd::db", "Database connection established!");
                client
            }
        };
        Ok(self.client.insert(client))
    }
}

impl ReadingSource for PostgresReadingSource {
    fn fetch_readings(&mut self, limit: Option<i64>) -> Result<Vec<Reading>, SourceError> {
        let client = self.client()?;
        let result = match limit {
            Some(limit) => client.query(SQL_SELECT_RECENT_READINGS, &[&limit]),
            None => client.query(SQL_SELECT_READINGS, &[]),
        };

        let rows = match result {
            Ok(rows) => rows,
            Err(err) => {
                log::warn!(target: "airqd::db", "Dropping database connection after failed query: \'{}\'", err);
                self.client = None;
                return Err(SourceError::Query(err));
            }
        };

        let mut readings = Vec::with_capacity(rows.len());
        for row in &rows {
            readings.push(reading_from_row(row)?);
        }
        log::debug!(target: "airqd::db", "Fetched {} readings", readings.len());
        Ok(readings)
    }
}

/// Opens a connection using the given parameters, with TLS if enabled.
///
/// # Errors
///
/// Errors occur when one of the following conditions is met:
///
/// * TLS is enabled but no TLS parameters are given.
///
/// * The files for the TLS connection cannot be found.
///
/// * The connection cannot be established or the user is not authorized for the database.
///
pub fn connect(connection_parameters: &DatabaseParameters) -> Result<Client, SourceError>
{
    let postgres_connection_string = format!("user={} password={} host={} port={} dbname={} application_name=airqd",
                                             connection_parameters.username,
                                             connection_parameters.password,
                                             connection_parameters.hostname,
                                             connection_parameters.port,
                                             connection_parameters.database);

    if !connection_parameters.tls_enable {
        return Client::connect(postgres_connection_string.as_str(), postgres::NoTls)
            .map_err(SourceError::Connect);
    }

    let tls_params = match connection_parameters.tls_params {
        Some(ref tls_params) => tls_params,
        None => return Err(SourceError::MissingTlsParameters),
    };

    let mut ssl_connection_builder = SslConnector::builder(SslMethod::tls())?;
    ssl_connection_builder.set_verify(SslVerifyMode::NONE);
    ssl_connection_builder.set_ca_file(&tls_params.server_ca_path)?;
    ssl_connection_builder.set_certificate_file(&tls_params.client_cert_path, SslFiletype::PEM)?;
    ssl_connection_builder.set_private_key_file(&tls_params.client_key_path, SslFiletype::PEM)?;

    let tls_connector = MakeTlsConnector::new(ssl_connection_builder.build());
    Client::connect(postgres_connection_string.as_str(), tls_connector).map_err(SourceError::Connect)
}

fn reading_from_row(row: &Row) -> Result<Reading, SourceError> {
    let timestamp: DateTime<Utc> = row.try_get("created_at").map_err(SourceError::Query)?;
    Ok(Reading {
        id: row.try_get::<_, Option<i64>>("id").ok().flatten()
            .or_else(|| row.try_get::<_, Option<i32>>("id").ok().flatten().map(i64::from)),
        timestamp,
        temperature: measurement(row, "temperature"),
        humidity: measurement(row, "humidity"),
        pm25: measurement(row, "pm25"),
        pm10: measurement(row, "pm10"),
        co: measurement(row, "co"),
        no2: measurement(row, "no2"),
        o3: measurement(row, "o3"),
        so2: measurement(row, "so2"),
    })
}

/// Reads a measurement column, accepting float, integer, numeric and text columns.
///
/// NULLs, unparsable text and unsupported column types yield `None`.
fn measurement(row: &Row, column: &str) -> Option<f64> {
    if let Ok(value) = row.try_get::<_, Option<f64>>(column) {
        return value;
    }
    if let Ok(value) = row.try_get::<_, Option<f32>>(column) {
        return value.map(f64::from);
    }
    if let Ok(value) = row.try_get::<_, Option<i32>>(column) {
        return value.map(f64::from);
    }
    if let Ok(value) = row.try_get::<_, Option<i64>>(column) {
        return value.map(|v| v as f64);
    }
    if let Ok(value) = row.try_get::<_, Option<Decimal>>(column) {
        return value.and_then(decimal_measurement);
    }
    match row.try_get::<_, Option<String>>(column) {
        Ok(value) => value.and_then(|text| text.trim().parse::<f64>().ok()),
        Err(err) => {
            log::trace!(target: "airqd::db", "Treating column \'{}\' as missing: \'{}\'", column, err);
            None
        }
    }
}

fn decimal_measurement(value: Decimal) -> Option<f64> {
    value.to_f64()
}
