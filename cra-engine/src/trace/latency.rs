//! `latency` trace format: whitespace-split `<id> <hit_penalty>
//! <miss_penalty>` lines, where `id` may be a plain `u64` or a decimal
//! value wider than 64 bits (a "bigint"), in which case it is folded to
//! 64 bits by XOR-ing the high and low halves of its `u128` parse.

use std::io::BufRead;

use super::{parse_f64, split_fields, TraceError};
use crate::event::AccessEvent;

pub fn fold_id(raw: &str, line_no: usize) -> Result<u64, TraceError> {
    if let Ok(v) = raw.parse::<u64>() {
        return Ok(v);
    }
    let wide: u128 = raw.parse().map_err(|e| TraceError::Malformed {
        line: line_no,
        reason: format!("invalid id '{raw}': {e}"),
    })?;
    let high = (wide >> 64) as u64;
    let low = wide as u64;
    Ok(high ^ low)
}

pub struct LatencyTraceReader<R> {
    lines: std::io::Lines<R>,
    line_no: usize,
}

impl<R: BufRead> LatencyTraceReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_no: 0,
        }
    }
}

impl<R: BufRead> Iterator for LatencyTraceReader<R> {
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
    let fields = split_fields(line, line_no, 3)?;
    let key = fold_id(fields[0], line_no)?;
    let hit_penalty = parse_f64(fields[1], line_no)?;
    let miss_penalty = parse_f64(fields[2], line_no)?;
    Ok(AccessEvent::new(key, hit_penalty, miss_penalty))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn parses_plain_decimal_ids() {
        let reader = LatencyTraceReader::new(Cursor::new("42 1.0 2.0\n"));
        let events: Vec<_> = reader.collect::<Result<_, _>>().unwrap();
        assert_eq!(events[0].key, 42);
    }

    #[test]
    fn folds_bigint_ids_by_xor_of_halves() {
        let wide: u128 = (7u128 << 64) | 3u128;
        let expected = 7u64 ^ 3u64;
        assert_eq!(fold_id(&wide.to_string(), 1).unwrap(), expected);
    }
}
