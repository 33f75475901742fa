// vnstat output parsing: JSON document first, line-oriented text as fallback.

use regex::Regex;
use serde::Deserialize;
use std::sync::LazyLock;

use crate::models::TrafficTotals;
use crate::units::{Unit, round2, to_megabytes};

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("output is not JSON: {0}")]
    Syntax(#[source] serde_json::Error),
    #[error("JSON document has an unexpected shape: {0}")]
    Shape(#[source] serde_json::Error),
    #[error("invalid number {0:?} in text output")]
    Number(String),
}

#[derive(Debug, Deserialize)]
struct Document {
    #[serde(default)]
    interfaces: Vec<InterfaceRecord>,
}

#[derive(Debug, Deserialize)]
struct InterfaceRecord {
    #[serde(default)]
    traffic: Option<TrafficRecord>,
}

#[derive(Debug, Deserialize)]
struct TrafficRecord {
    #[serde(default)]
    total: Option<Counters>,
    #[serde(default)]
    day: Option<Vec<Counters>>,
}

/// Byte counters; vnstat puts `rx`/`tx` on both total and per-day records.
#[derive(Debug, Default, Clone, Copy, Deserialize)]
struct Counters {
    #[serde(default)]
    rx: f64,
    #[serde(default)]
    tx: f64,
}

/// Accepted per-interface shapes, resolved by which record is present.
#[derive(Debug)]
enum InterfaceTraffic {
    Totals(Counters),
    Daily(Vec<Counters>),
    Missing,
}

impl From<Option<TrafficRecord>> for InterfaceTraffic {
    fn from(record: Option<TrafficRecord>) -> Self {
        match record {
            Some(TrafficRecord {
                total: Some(total), ..
            }) => InterfaceTraffic::Totals(total),
            Some(TrafficRecord { day: Some(days), .. }) => InterfaceTraffic::Daily(days),
            _ => InterfaceTraffic::Missing,
        }
    }
}

impl InterfaceTraffic {
    fn bytes(&self) -> Counters {
        match self {
            InterfaceTraffic::Totals(c) => *c,
            InterfaceTraffic::Daily(days) => days.iter().fold(Counters::default(), |acc, d| {
                Counters {
                    rx: acc.rx + d.rx,
                    tx: acc.tx + d.tx,
                }
            }),
            InterfaceTraffic::Missing => Counters::default(),
        }
    }
}

/// Sum received/transmitted bytes across every interface of a vnstat JSON document.
///
/// Only syntactically invalid input yields [`ParseError::Syntax`]; valid JSON that is
/// not an object counts as no traffic.
pub fn parse_json(raw: &str) -> Result<TrafficTotals, ParseError> {
    let value: serde_json::Value = serde_json::from_str(raw).map_err(ParseError::Syntax)?;
    if !value.is_object() {
        return Ok(TrafficTotals::default());
    }
    let doc: Document = serde_json::from_value(value).map_err(ParseError::Shape)?;

    let bytes = doc
        .interfaces
        .into_iter()
        .map(|iface| InterfaceTraffic::from(iface.traffic).bytes())
        .fold(Counters::default(), |acc, c| Counters {
            rx: acc.rx + c.rx,
            tx: acc.tx + c.tx,
        });

    Ok(TrafficTotals {
        received_mb: round2(Unit::Bytes.to_megabytes(bytes.rx)),
        transmitted_mb: round2(Unit::Bytes.to_megabytes(bytes.tx)),
    })
}

static RX_PATTERN: LazyLock<Regex> = LazyLock::new(|| counter_pattern("rx"));
static TX_PATTERN: LazyLock<Regex> = LazyLock::new(|| counter_pattern("tx"));

fn counter_pattern(label: &str) -> Regex {
    Regex::new(&format!(r"(?i){label}:\s*([0-9.]+)\s*([KMGT]?B)"))
        .expect("counter pattern is a valid regex")
}

fn capture_megabytes(pattern: &Regex, line: &str) -> Result<f64, ParseError> {
    let Some(caps) = pattern.captures(line) else {
        return Ok(0.0);
    };
    let number = &caps[1];
    let value: f64 = number
        .parse()
        .map_err(|_| ParseError::Number(number.to_string()))?;
    Ok(to_megabytes(value, &caps[2]))
}

/// Sum `rx: <n> <unit>` / `tx: <n> <unit>` figures from human-readable vnstat output.
///
/// Only lines mentioning both `rx:` and `tx:` are considered.
pub fn parse_text(raw: &str) -> Result<TrafficTotals, ParseError> {
    let mut received = 0.0;
    let mut transmitted = 0.0;

    for line in raw.lines() {
        let lower = line.to_lowercase();
        if !(lower.contains("rx:") && lower.contains("tx:")) {
            continue;
        }
        received += capture_megabytes(&RX_PATTERN, line)?;
        transmitted += capture_megabytes(&TX_PATTERN, line)?;
    }

    Ok(TrafficTotals {
        received_mb: round2(received),
        transmitted_mb: round2(transmitted),
    })
}

/// Parse raw vnstat output into megabyte totals. Never fails: output that neither
/// parser understands is logged and counted as zero traffic.
pub fn parse_output(raw: &str) -> TrafficTotals {
    let parsed = match parse_json(raw) {
        Err(ParseError::Syntax(e)) => {
            tracing::warn!(error = %e, "vnstat output is not JSON, trying text format");
            parse_text(raw)
        }
        other => other,
    };
    parsed.unwrap_or_else(|e| {
        tracing::error!(error = %e, operation = "parse_output", "vnstat output unusable");
        TrafficTotals::default()
    })
}
