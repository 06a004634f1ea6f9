extern crate postgres;
extern crate chrono;
extern crate serde_json;
extern crate log;
extern crate log4rs;
extern crate ctrlc;
extern crate clap;


use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::thread;

use serde::{Serialize, Deserialize};

use std::process::exit;

use clap::App;
use std::fs;

mod database;
mod error;
mod http;
mod reading;
mod report;
mod status;
mod xlsx;

static DEFAULT_CONFIG_PATH: &'static str = "resources/airqd.yml";
static DEFAULT_LOG_CONFIG_PATH: &'static str = "resources/log.yml";

#[derive(Serialize, Deserialize, Debug, Clone)]
struct Configuration {
    database_connection_parameters: database::DatabaseParameters,
    http_parameters: http::HttpParameters,
    #[serde(default)]
    report_parameters: report::ReportOptions,
}

fn load_configuration(path: &str) -> Result<Configuration, error::ConfigError> {
    let configuration_string = fs::read_to_string(path).map_err(|source| error::ConfigError::Read {
        path: path.to_string(),
        source,
    })?;
    Ok(serde_yaml::from_str::<Configuration>(configuration_string.as_str())?)
}

fn main() {
    let cli_yaml = clap::load_yaml!("cli.yml");
    let matches = App::from(cli_yaml).get_matches();
    let config_path = matches.value_of("config").unwrap_or(DEFAULT_CONFIG_PATH);
    let log_config_path = matches.value_of("log-config").unwrap_or(DEFAULT_LOG_CONFIG_PATH);

    match log4rs::init_file(log_config_path, Default::default()) {
        Ok(_) => {},
        Err(err) => {
            eprintln!("Could not create logger from yaml configuration: {}", err);
            exit(-100);
        }
    };

    let terminate_programm = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let terminate_main_thread = Arc::clone(&terminate_programm);
    let terminate_http_thread = Arc::clone(&terminate_programm);

    let configuration = match load_configuration(config_path) {
        Ok(res) => res,
        Err(err) => {
            log::error!(target: "airqd", "{}", err);
            exit(101);
        }
    };
    log::info!(target: "airqd", "Report time zone: \'{}\'", configuration.report_parameters.time_zone);

    let source = database::PostgresReadingSource::new(configuration.database_connection_parameters.clone());
    let http_configuration = configuration.http_parameters.clone();
    let report_options = configuration.report_parameters.clone();
    let http_thread = match thread::Builder::new()
        .name("http".to_string())
        .spawn(move || {
            http::server_thread(source, terminate_http_thread, http_configuration, report_options)
        }) {
        Ok(http_handle) => http_handle,
        Err(err) => {
            log::error!(target: "airqd", "Cannot start the http server thread: \'{}\'", err);
            exit(201);
        }
    };

    match ctrlc::set_handler(move || {
        log::info!(target: "airqd", "Termination signal received!");
        terminate_main_thread.store(true, Ordering::SeqCst);
    }) {
        Ok(_) => {},
        Err(err) => {
            log::error!(target: "airqd", "Error setting Ctrl-C handler: \'{}\'", err);
            terminate_programm.store(true, Ordering::SeqCst);
        }
    };

    match http_thread.join() {
        Ok(Ok(_)) => log::debug!(target: "airqd", "Joined http thread!"),
        Ok(Err(err)) => {
            log::error!(target: "airqd", "Http server stopped: \'{}\'", err);
            exit(202);
        }
        Err(_) => {
            log::error!(target: "airqd", "Could not join the http thread!");
            exit(301);
        }
    };

    log::info!(target: "airqd", "Exiting");
    exit(0);
}
