// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

extern crate clap;
extern crate julia_strips;
#[macro_use]
extern crate log;
extern crate num_cpus;
extern crate simplog;

use clap::{App, AppSettings, Arg, ArgMatches};
use simplog::simplog::SimpleLogger;
use std::process::exit;
use std::str::FromStr;

use julia_strips::config::{RenderConfig, DEFAULT_OUTPUT, MAX_WORKERS};
use julia_strips::{render, JuliaError, JuliaParams, Precision, Result};

fn validate_positive<T: FromStr + PartialOrd + Default>(
    s: &str,
    isnotanumber_err: &str,
    isnotpositive_err: &str,
) -> std::result::Result<(), String> {
    match T::from_str(s) {
        Ok(i) => {
            if i > T::default() {
                Ok(())
            } else {
                Err(isnotpositive_err.to_string())
            }
        }
        Err(_) => Err(isnotanumber_err.to_string()),
    }
}

fn validate_range<T: FromStr + Ord>(
    s: &str,
    low: T,
    high: T,
    isnotanumber_err: &str,
    isnotinrange_err: &str,
) -> std::result::Result<(), String> {
    match T::from_str(s) {
        Ok(i) => {
            if i >= low && i <= high {
                Ok(())
            } else {
                Err(isnotinrange_err.to_string())
            }
        }
        Err(_) => Err(isnotanumber_err.to_string()),
    }
}

fn validate_tint(s: &str) -> std::result::Result<(), String> {
    match f64::from_str(s) {
        Ok(t) if t.is_finite() && t >= 0.0 => Ok(()),
        Ok(_) => Err("Tint bias must be zero or more".to_string()),
        Err(_) => Err("Could not parse tint bias".to_string()),
    }
}

const HEIGHT: &str = "height";
const OUTPUT: &str = "output";
const WORKERS: &str = "workers";
const TINT: &str = "tint";
const PRECISION: &str = "precision";
const VERBOSITY: &str = "verbosity";

fn args<'a>() -> ArgMatches<'a> {
    App::new("julia")
        .version("0.1.0")
        .author("Elf M. Sternberg <elf.sternberg@gmail.com>")
        .about("Julia set renderer that splits rows across workers")
        .setting(AppSettings::AllowNegativeNumbers)
        .arg(
            Arg::with_name(HEIGHT)
                .required(true)
                .index(1)
                .validator(|s| {
                    validate_positive::<i64>(
                        &s,
                        "Enter the height 'N' as a positive integer",
                        "The height 'N' must be a positive integer",
                    )
                })
                .help("Image height in pixels; the width is twice this"),
        )
        .arg(
            Arg::with_name(WORKERS)
                .required(false)
                .long(WORKERS)
                .short("w")
                .takes_value(true)
                .validator(|s| {
                    validate_range(
                        &s,
                        1,
                        MAX_WORKERS,
                        "Could not parse worker count",
                        &format!("Worker count must be between 1 and {}", MAX_WORKERS),
                    )
                })
                .help("Number of workers to split the rows among (default: one per CPU)"),
        )
        .arg(
            Arg::with_name(OUTPUT)
                .required(false)
                .long(OUTPUT)
                .short("o")
                .takes_value(true)
                .default_value(DEFAULT_OUTPUT)
                .help("Output file"),
        )
        .arg(
            Arg::with_name(TINT)
                .required(false)
                .long(TINT)
                .short("t")
                .takes_value(true)
                .default_value("1.0")
                .validator(|s| validate_tint(&s))
                .help("Tint bias applied to the escape colors"),
        )
        .arg(
            Arg::with_name(PRECISION)
                .required(false)
                .long(PRECISION)
                .short("p")
                .takes_value(true)
                .default_value("single")
                .possible_values(&["single", "double"])
                .help("Float width of the escape loop"),
        )
        .arg(
            Arg::with_name(VERBOSITY)
                .required(false)
                .long(VERBOSITY)
                .short("v")
                .takes_value(true)
                .default_value("info")
                .possible_values(&["error", "warn", "info", "debug", "trace"])
                .help("Log level"),
        )
        .get_matches()
}

fn config(matches: &ArgMatches) -> Result<RenderConfig> {
    let height = matches.value_of(HEIGHT).unwrap_or_default();
    let height = u32::from_str(height).map_err(|_| {
        JuliaError::InvalidInput(format!("'{}' is not a usable image height", height))
    })?;

    let workers = match matches.value_of(WORKERS) {
        Some(w) => usize::from_str(w)
            .map_err(|_| JuliaError::InvalidInput(format!("'{}' is not a worker count", w)))?,
        None => num_cpus::get().min(MAX_WORKERS),
    };

    let tint = matches.value_of(TINT).unwrap_or("1.0");
    let tint = f64::from_str(tint)
        .map_err(|_| JuliaError::InvalidInput(format!("'{}' is not a tint bias", tint)))?;

    let precision = Precision::from_str(matches.value_of(PRECISION).unwrap_or("single"))?;

    Ok(RenderConfig::new(height)
        .with_workers(workers)
        .with_output(matches.value_of(OUTPUT).unwrap_or(DEFAULT_OUTPUT))
        .with_tint(tint)
        .with_params(JuliaParams {
            precision,
            ..JuliaParams::default()
        }))
}

fn run(matches: &ArgMatches) -> Result<()> {
    let config = config(matches)?;
    let summary = render(&config)?;
    for worker in &summary.workers {
        debug!(
            "Worker {} wrote rows {} to {} ({} bytes)",
            worker.rank, worker.rows.start, worker.rows.end, worker.bytes
        );
    }
    info!(
        "{} x {} image written to {:?} by {} workers",
        summary.spec.width,
        summary.spec.height,
        summary.output,
        summary.workers.len()
    );
    Ok(())
}

fn main() {
    let matches = args();
    SimpleLogger::init(matches.value_of(VERBOSITY));

    if let Err(e) = run(&matches) {
        eprintln!("Render failure: {}", e);
        exit(1);
    }
}
