//! Extract compressed-domain motion features from videos.

use anyhow::{anyhow, Context, Result};
use cdproc::prelude::v1::{
    compute_actionness, extract, sort_by_time, ActionnessParams, ExtractOptions, FeatureRecord,
    ShotDetection, Smoothing,
};
use cdproc_av::AvDecoder;
use clap::*;
use log::*;
use serde::Serialize;
use std::str::FromStr;

fn main() -> Result<()> {
    env_logger::init();

    let input = || {
        Arg::new("input")
            .long("input")
            .short('i')
            .takes_value(true)
            .required(true)
            .help("Input video file")
    };

    let raw = || {
        Arg::new("raw")
            .long("raw")
            .help("Keep raw per-frame totals instead of averaging over motion vectors")
    };

    let format = || {
        Arg::new("format")
            .long("format")
            .short('f')
            .takes_value(true)
            .possible_values(["json", "csv"])
            .default_value("json")
    };

    let dump = || {
        Arg::new("dump-format")
            .long("dump-format")
            .short('d')
            .help("Print container information to stderr")
    };

    let smoothing = |window: &'static str| {
        [
            Arg::new("smooth")
                .long("smooth")
                .takes_value(true)
                .possible_values(["ema", "sma", "none"])
                .default_value("ema"),
            Arg::new("window")
                .long("window")
                .takes_value(true)
                .default_value(window)
                .help("Smoothing span or window"),
        ]
    };

    let weights = |we: &'static str, ws: &'static str, wd: &'static str| {
        [
            Arg::new("we").long("we").takes_value(true).default_value(we),
            Arg::new("ws").long("ws").takes_value(true).default_value(ws),
            Arg::new("wd").long("wd").takes_value(true).default_value(wd),
        ]
    };

    let matches = Command::new("cdproc")
        .version(crate_version!())
        .about("Compressed-domain motion features")
        .subcommand_required(true)
        .subcommand(
            Command::new("extract")
                .about("Extract per-frame (t, E, S, div) features")
                .arg(input())
                .arg(raw())
                .arg(format())
                .arg(dump()),
        )
        .subcommand(
            Command::new("actionness")
                .about("Score per-frame actionness")
                .arg(input())
                .arg(raw())
                .arg(format())
                .arg(dump())
                .args(smoothing("5"))
                .args(weights("1.0", "1.0", "0.25"))
                .arg(
                    Arg::new("no-deriv")
                        .long("no-deriv")
                        .help("Disable the divergence derivative term"),
                ),
        )
        .subcommand(
            Command::new("shots")
                .about("Detect shot boundaries")
                .arg(input())
                .arg(raw())
                .arg(format())
                .arg(dump())
                .args(smoothing("3"))
                .args(weights("1.0", "0.6", "0.2"))
                .arg(Arg::new("l1").long("l1").takes_value(true))
                .arg(Arg::new("l2").long("l2").takes_value(true))
                .arg(Arg::new("k1").long("k1").takes_value(true).default_value("2.5"))
                .arg(Arg::new("k2").long("k2").takes_value(true).default_value("1.5"))
                .arg(Arg::new("tau").long("tau").takes_value(true).default_value("3"))
                .arg(Arg::new("guard").long("guard").takes_value(true).default_value("8")),
        )
        .get_matches();

    match matches.subcommand() {
        Some(("extract", m)) => {
            let records = features(m)?;
            write_rows(&records, m)
        }
        Some(("actionness", m)) => {
            let records = time_ordered(features(m)?);

            let params = ActionnessParams {
                smoothing: smoothing_of(m)?,
                weights: weights_of(m)?,
                include_derivatives: !m.is_present("no-deriv"),
            };

            let rows = records
                .iter()
                .zip(compute_actionness(&records, &params))
                .map(|(r, actionness)| ActionnessRow {
                    t: r.t,
                    e: r.e,
                    s: r.s,
                    div: r.div,
                    actionness,
                })
                .collect::<Vec<_>>();

            write_rows(&rows, m)
        }
        Some(("shots", m)) => {
            let records = time_ordered(features(m)?);

            let detection = ShotDetection {
                l1: parse_opt(m, "l1")?,
                l2: parse_opt(m, "l2")?,
                k1: parse(m, "k1")?,
                k2: parse(m, "k2")?,
                tau: parse(m, "tau")?,
                guard: parse(m, "guard")?,
                weights: weights_of(m)?,
                smoothing: smoothing_of(m)?.unwrap_or_else(|| Smoothing::ema(1)),
            };

            let cuts = detection.detect(&records);
            info!("Detected {} cuts", cuts.len());

            write_rows(&cuts, m)
        }
        _ => Err(anyhow!("Unknown command")),
    }
}

/// Decode the input and extract its feature records.
fn features(m: &ArgMatches) -> Result<Vec<FeatureRecord>> {
    let input = m
        .value_of("input")
        .ok_or_else(|| anyhow!("Please supply a video file!"))?;

    let mut decoder =
        AvDecoder::open(input).with_context(|| format!("Failed to open decoder for {input}"))?;

    if m.is_present("dump-format") {
        decoder.dump_format();
    }

    let options = ExtractOptions {
        average: !m.is_present("raw"),
    };

    let records = extract(decoder, options);

    if records.is_empty() {
        warn!("No frames extracted from {input}. Is the codec supported?");
    } else {
        info!("Extracted {} frames from {input}", records.len());
    }

    Ok(records)
}

/// Put records in presentation order before scoring them over time.
fn time_ordered(mut records: Vec<FeatureRecord>) -> Vec<FeatureRecord> {
    if sort_by_time(&mut records) {
        warn!("Frame timestamps are not monotonic, sorting by time");
    }
    records
}

#[derive(Serialize)]
struct ActionnessRow {
    t: f64,
    #[serde(rename = "E")]
    e: f64,
    #[serde(rename = "S")]
    s: f64,
    div: f64,
    actionness: f64,
}

fn write_rows<T: Serialize>(rows: &[T], m: &ArgMatches) -> Result<()> {
    let stdout = std::io::stdout();
    let out = stdout.lock();

    match m.value_of("format") {
        Some("csv") => {
            let mut writer = csv::Writer::from_writer(out);
            for row in rows {
                writer.serialize(row)?;
            }
            writer.flush()?;
        }
        _ => {
            serde_json::to_writer_pretty(out, rows)?;
            println!();
        }
    }

    Ok(())
}

fn parse<T: FromStr>(m: &ArgMatches, name: &str) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    parse_opt(m, name)?.ok_or_else(|| anyhow!("Missing --{name}"))
}

fn parse_opt<T: FromStr>(m: &ArgMatches, name: &str) -> Result<Option<T>>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    m.value_of(name)
        .map(|v| v.parse().with_context(|| format!("Invalid --{name}: {v}")))
        .transpose()
}

fn smoothing_of(m: &ArgMatches) -> Result<Option<Smoothing>> {
    let window = parse(m, "window")?;

    Ok(match m.value_of("smooth") {
        Some("sma") => Some(Smoothing::sma(window)),
        Some("none") => None,
        _ => Some(Smoothing::ema(window)),
    })
}

fn weights_of(m: &ArgMatches) -> Result<(f64, f64, f64)> {
    Ok((parse(m, "we")?, parse(m, "ws")?, parse(m, "wd")?))
}
