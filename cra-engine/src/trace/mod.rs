//! Trace-file parsers named in the spec: `dns`, `latency`, and
//! `address-penalties`. All three yield the same [`crate::event::AccessEvent`]
//! stream behind a common [`TraceReader`] iterator so the driver is
//! agnostic to the on-disk format once a reader is constructed.

pub mod address;
pub mod dns;
pub mod latency;

use std::io::BufRead;

use thiserror::Error;

use crate::event::AccessEvent;

#[derive(Debug, Error)]
pub enum TraceError {
    #[error("i/o error reading trace: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed trace line {line}: {reason}")]
    Malformed { line: usize, reason: String },
}

/// Lazy, non-restartable sequence of access events read from a trace.
pub trait TraceReader: Iterator<Item = Result<AccessEvent, TraceError>> {}
impl<T: Iterator<Item = Result<AccessEvent, TraceError>>> TraceReader for T {}

/// Which on-disk grammar a trace file follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceFormat {
    Dns,
    Latency,
    AddressPenalties,
}

impl std::str::FromStr for TraceFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dns" => Ok(TraceFormat::Dns),
            "latency" => Ok(TraceFormat::Latency),
            "address-penalties" => Ok(TraceFormat::AddressPenalties),
            other => Err(format!("unknown trace format: {other}")),
        }
    }
}

/// Construct the appropriate reader for `format` over `reader`.
pub fn open<R: BufRead + 'static>(
    format: TraceFormat,
    reader: R,
) -> Box<dyn Iterator<Item = Result<AccessEvent, TraceError>>> {
    match format {
        TraceFormat::Dns => Box::new(dns::DnsTraceReader::new(reader)),
        TraceFormat::Latency => Box::new(latency::LatencyTraceReader::new(reader)),
        TraceFormat::AddressPenalties => {
            Box::new(address::AddressPenaltyTraceReader::new(reader))
        }
    }
}

/// Splits a trace line on whitespace and collects the fields, erroring
/// with the 1-based `line_no` if the field count doesn't match.
fn split_fields(line: &str, line_no: usize, expected: usize) -> Result<Vec<&str>, TraceError> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() != expected {
        return Err(TraceError::Malformed {
            line: line_no,
            reason: format!("expected {expected} fields, found {}", fields.len()),
        });
    }
    Ok(fields)
}

fn parse_f64(field: &str, line_no: usize) -> Result<f64, TraceError> {
    field.parse::<f64>().map_err(|e| TraceError::Malformed {
        line: line_no,
        reason: format!("invalid penalty '{field}': {e}"),
    })
}
