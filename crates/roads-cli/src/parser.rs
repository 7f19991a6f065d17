//! Line protocol: one `;`-separated command per line.

use roads_core::map::Hop;

/// A well-formed command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request<'a> {
    AddRoad {
        city1: &'a str,
        city2: &'a str,
        length: u32,
        year: i32,
    },
    RepairRoad {
        city1: &'a str,
        city2: &'a str,
        year: i32,
    },
    DescribeRoute {
        id: u32,
    },
    CreateRoute {
        id: u32,
        first: &'a str,
        hops: Vec<Hop<'a>>,
    },
    NewRoute {
        id: u32,
        city1: &'a str,
        city2: &'a str,
    },
    ExtendRoute {
        id: u32,
        city: &'a str,
    },
    RemoveRoad {
        city1: &'a str,
        city2: &'a str,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Parsed<'a> {
    /// Blank line or comment.
    Ignore,
    Invalid,
    Request(Request<'a>),
}

/// One or more ASCII digits fitting `u32`.
fn parse_unsigned(field: &str) -> Option<u32> {
    if field.is_empty() || !field.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    field.parse().ok()
}

/// Optional `-` followed by one or more ASCII digits, fitting `i32`.
fn parse_signed(field: &str) -> Option<i32> {
    let digits = field.strip_prefix('-').unwrap_or(field);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    field.parse().ok()
}

fn starts_with_digit(field: &str) -> bool {
    field.bytes().next().is_some_and(|b| b.is_ascii_digit())
}

/// Parse one line without its terminating newline.
pub fn parse_line(line: &[u8]) -> Parsed<'_> {
    if line.is_empty() || line[0] == b'#' {
        return Parsed::Ignore;
    }
    if line.iter().any(|&b| b < 0x20) {
        return Parsed::Invalid;
    }
    let Ok(text) = std::str::from_utf8(line) else {
        return Parsed::Invalid;
    };
    let fields: Vec<&str> = text.split(';').collect();
    parse_fields(&fields).map_or(Parsed::Invalid, Parsed::Request)
}

fn parse_fields<'a>(fields: &[&'a str]) -> Option<Request<'a>> {
    if starts_with_digit(fields[0]) {
        return parse_create(fields);
    }
    let request = match *fields {
        ["addRoad", city1, city2, length, year] => Request::AddRoad {
            city1,
            city2,
            length: parse_unsigned(length)?,
            year: parse_signed(year)?,
        },
        ["repairRoad", city1, city2, year] => Request::RepairRoad {
            city1,
            city2,
            year: parse_signed(year)?,
        },
        ["getRouteDescription", id] => Request::DescribeRoute {
            id: parse_unsigned(id)?,
        },
        ["newRoute", id, city1, city2] => Request::NewRoute {
            id: parse_unsigned(id)?,
            city1,
            city2,
        },
        ["extendRoute", id, city] => Request::ExtendRoute {
            id: parse_unsigned(id)?,
            city,
        },
        ["removeRoad", city1, city2] => Request::RemoveRoad { city1, city2 },
        _ => return None,
    };
    Some(request)
}

/// `id;city;length;year;city;…;city`
fn parse_create<'a>(fields: &[&'a str]) -> Option<Request<'a>> {
    if fields.len() < 5 || (fields.len() - 2) % 3 != 0 {
        return None;
    }
    let (id, first, rest) = (fields[0], fields[1], &fields[2..]);
    let hops = rest
        .chunks_exact(3)
        .map(|hop| {
            Some(Hop {
                length: parse_unsigned(hop[0])?,
                year: parse_signed(hop[1])?,
                city: hop[2],
            })
        })
        .collect::<Option<Vec<_>>>()?;
    Some(Request::CreateRoute {
        id: parse_unsigned(id)?,
        first,
        hops,
    })
}
