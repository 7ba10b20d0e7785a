//! `address-penalties` trace format: whitespace-split `<op> <hex_addr>
//! <instr_gap> <hit_penalty> <miss_penalty>` lines. The key is the
//! parsed address; `op` and `instr_gap` are consumed but not carried
//! into the resulting [`AccessEvent`], since the engine has no use for
//! them beyond trace bookkeeping.

use std::io::BufRead;

use super::{parse_f64, split_fields, TraceError};
use crate::event::AccessEvent;

fn parse_hex_addr(field: &str, line_no: usize) -> Result<u64, TraceError> {
    let trimmed = field.strip_prefix("0x").unwrap_or(field);
    u64::from_str_radix(trimmed, 16).map_err(|e| TraceError::Malformed {
        line: line_no,
        reason: format!("invalid address '{field}': {e}"),
    })
}

pub struct AddressPenaltyTraceReader<R> {
    lines: std::io::Lines<R>,
    line_no: usize,
}

impl<R: BufRead> AddressPenaltyTraceReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_no: 0,
        }
    }
}

impl<R: BufRead> Iterator for AddressPenaltyTraceReader<R> {
    type Item = Result<AccessEvent, TraceError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let raw = self.lines.next()?;
            self.line_no += 1;
            let line = match raw {
                Ok(l) => l,
                Err(e) => return Some(Err(TraceError::Io(e))),
            };
            if line.trim().is_empty() {
                continue;
            }
            return Some(parse_line(&line, self.line_no));
        }
    }
}

fn parse_line(line: &str, line_no: usize) -> Result<AccessEvent, TraceError> {
    let fields = split_fields(line, line_no, 5)?;
    let key = parse_hex_addr(fields[1], line_no)?;
    let hit_penalty = parse_f64(fields[3], line_no)?;
    let miss_penalty = parse_f64(fields[4], line_no)?;
    Ok(AccessEvent::new(key, hit_penalty, miss_penalty))
}
