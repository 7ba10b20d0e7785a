//! `dns` trace format: whitespace-split `<name> <hit_penalty>
//! <miss_penalty>` lines; the key is a 64-bit non-cryptographic hash of
//! the name.

use std::io::BufRead;
use std::hash::Hasher;

use twox_hash::XxHash64;

use super::{parse_f64, split_fields, TraceError};
use crate::event::AccessEvent;

pub fn hash_name(name: &str) -> u64 {
    let mut hasher = XxHash64::with_seed(0);
    hasher.write(name.as_bytes());
    hasher.finish()
}

pub struct DnsTraceReader<R> {
    lines: std::io::Lines<R>,
    line_no: usize,
}

impl<R: BufRead> DnsTraceReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_no: 0,
        }
    }
}

impl<R: BufRead> Iterator for DnsTraceReader<R> {
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
    let key = hash_name(fields[0]);
    let hit_penalty = parse_f64(fields[1], line_no)?;
    let miss_penalty = parse_f64(fields[2], line_no)?;
    Ok(AccessEvent::new(key, hit_penalty, miss_penalty))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn parses_well_formed_lines() {
        let data = "example.com 1.5 12.0\nother.org 0.2 3.4\n";
        let reader = DnsTraceReader::new(Cursor::new(data));
        let events: Vec<_> = reader.collect::<Result<_, _>>().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].key, hash_name("example.com"));
        assert_eq!(events[0].hit_penalty, 1.5);
        assert_eq!(events[0].miss_penalty, 12.0);
    }

    #[test]
    fn same_name_hashes_to_same_key() {
        assert_eq!(hash_name("example.com"), hash_name("example.com"));
    }

    #[test]
    fn rejects_malformed_lines() {
        let reader = DnsTraceReader::new(Cursor::new("oops\n"));
        let events: Vec<_> = reader.collect();
        assert!(events[0].is_err());
    }

    #[test]
    fn skips_blank_lines() {
        let reader = DnsTraceReader::new(Cursor::new("a 1 2\n\nb 1 2\n"));
        let events: Vec<_> = reader.collect::<Result<_, _>>().unwrap();
        assert_eq!(events.len(), 2);
    }
}
