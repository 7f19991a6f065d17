//! Drives a [`RoadMap`] from a stream of command lines.

use crate::parser::{Parsed, Request, parse_line};
use anyhow::{Context, Result};
use roads_core::{MapError, RoadMap};
use std::io::{BufRead, Write};

/// Counters for one run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub lines: usize,
    pub failed: usize,
}

/// One map plus where its output goes. Descriptions are written to `out`,
/// `ERROR <line>` reports to `err`.
pub struct Session<O, E> {
    map: RoadMap,
    out: O,
    err: E,
    summary: Summary,
}

impl<O: Write, E: Write> Session<O, E> {
    pub fn new(map: RoadMap, out: O, err: E) -> Self {
        Self {
            map,
            out,
            err,
            summary: Summary::default(),
        }
    }

    pub fn map(&self) -> &RoadMap {
        &self.map
    }

    /// Execute every line of `input`. Only I/O failures are returned; a
    /// failing command is reported and the run continues.
    pub fn run<R: BufRead>(&mut self, mut input: R) -> Result<Summary> {
        let mut buf = Vec::new();
        loop {
            buf.clear();
            let read = input
                .read_until(b'\n', &mut buf)
                .context("failed to read input")?;
            if read == 0 {
                break;
            }
            let terminated = buf.last() == Some(&b'\n');
            if terminated {
                buf.pop();
            }
            self.line(&buf, terminated)?;
        }
        self.out.flush().context("failed to flush output")?;
        self.err.flush().context("failed to flush error output")?;
        Ok(self.summary)
    }

    /// Handle one line, without its newline.
    pub fn line(&mut self, line: &[u8], terminated: bool) -> Result<()> {
        self.summary.lines += 1;
        let number = self.summary.lines;
        let outcome = match parse_line(line) {
            Parsed::Ignore => return Ok(()),
            // Input cut off mid-line: never execute a partial command.
            _ if !terminated => None,
            Parsed::Invalid => None,
            Parsed::Request(request) => match self.apply(request) {
                Ok(output) => Some(output),
                Err(err) => {
                    tracing::debug!(line = number, %err, kind = ?err.kind(), "command failed");
                    None
                }
            },
        };
        match outcome {
            Some(Some(text)) => writeln!(self.out, "{}", text).context("failed to write output"),
            Some(None) => Ok(()),
            None => {
                self.summary.failed += 1;
                writeln!(self.err, "ERROR {}", number).context("failed to write error")
            }
        }
    }

    fn apply(&mut self, request: Request<'_>) -> Result<Option<String>, MapError> {
        let map = &mut self.map;
        match request {
            Request::AddRoad {
                city1,
                city2,
                length,
                year,
            } => map.add_road(city1, city2, length, year)?,
            Request::RepairRoad { city1, city2, year } => map.repair_road(city1, city2, year)?,
            Request::DescribeRoute { id } => return Ok(Some(map.route_description(id))),
            Request::CreateRoute { id, first, hops } => map.create_route(id, first, &hops)?,
            Request::NewRoute { id, city1, city2 } => map.new_route(id, city1, city2)?,
            Request::ExtendRoute { id, city } => map.extend_route(id, city)?,
            Request::RemoveRoad { city1, city2 } => map.remove_road(city1, city2)?,
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(script: &str) -> (String, String, Summary) {
        let mut out = Vec::new();
        let mut err = Vec::new();
        let summary = {
            let mut session = Session::new(RoadMap::new(), &mut out, &mut err);
            session.run(script.as_bytes()).unwrap()
        };
        (
            String::from_utf8(out).unwrap(),
            String::from_utf8(err).unwrap(),
            summary,
        )
    }

    #[test]
    fn test_scenario() {
        let script = "\
addRoad;A;B;5;2000
addRoad;B;C;5;1990
addRoad;A;C;12;1990
newRoute;1;A;C
addRoad;C;D;3;2005
extendRoute;1;D
getRouteDescription;1
";
        let (out, err, summary) = run(script);
        assert_eq!(out, "1;A;5;2000;B;5;1990;C;3;2005;D\n");
        assert_eq!(err, "");
        assert_eq!(
            summary,
            Summary {
                lines: 7,
                failed: 0
            }
        );
    }

    #[test]
    fn test_errors_carry_line_numbers() {
        let script = "\
# header

addRoad;A;B;5;2000
addRoad;A;B;5;2000
repairRoad;A;B;1999
bogus
getRouteDescription;1
";
        let (out, err, summary) = run(script);
        assert_eq!(out, "\n");
        assert_eq!(err, "ERROR 4\nERROR 5\nERROR 6\n");
        assert_eq!(summary.failed, 3);
    }

    #[test]
    fn test_unterminated_last_line() {
        let (_, err, _) = run("addRoad;A;B;5;2000\naddRoad;B;C;5;2000");
        assert_eq!(err, "ERROR 2\n");

        let (_, err, _) = run("addRoad;A;B;5;2000\n# trailing comment");
        assert_eq!(err, "");
    }

    #[test]
    fn test_unterminated_line_is_not_executed() {
        let mut out = Vec::new();
        let mut err = Vec::new();
        let mut session = Session::new(RoadMap::new(), &mut out, &mut err);
        session.run("addRoad;A;B;5;2000".as_bytes()).unwrap();
        assert!(session.map().road("A", "B").is_none());
    }

    #[test]
    fn test_batch_create_and_describe() {
        let script = "\
10;Alpha;3;1999;Beta;4;2001;Gamma
10;X;1;1;Y
getRouteDescription;10
getRouteDescription;0
";
        let (out, err, _) = run(script);
        assert_eq!(out, "10;Alpha;3;1999;Beta;4;2001;Gamma\n\n");
        assert_eq!(err, "ERROR 2\n");
    }
}
