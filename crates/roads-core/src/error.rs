//! Failure taxonomy for road map operations.

use crate::graph::RouteId;
use std::fmt;

/// Coarse classification of a [`MapError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed or out-of-range arguments.
    Validation,
    /// A referenced city, road or route does not exist.
    NotFound,
    /// The request collides with existing state.
    Conflict,
    /// Several equally good paths exist, so none can be chosen.
    AmbiguousPath,
    /// No path exists.
    Disconnected,
    /// A capacity limit was hit or memory could not be reserved.
    Allocation,
}

/// Storage whose capacity ran out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Cities,
    Roads,
    Adjacency,
    Routes,
    SearchFrontier,
    Scratch,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Resource::Cities => "city index",
            Resource::Roads => "road arena",
            Resource::Adjacency => "city adjacency",
            Resource::Routes => "route storage",
            Resource::SearchFrontier => "search frontier",
            Resource::Scratch => "scratch index",
        };
        f.write_str(name)
    }
}

/// Errors from road map operations. A failed operation never leaves a
/// partial change behind.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MapError {
    #[error("city name must not be empty")]
    EmptyCityName,
    #[error("both ends of the road are {0:?}")]
    SameCity(String),
    #[error("road length must be positive")]
    ZeroLength,
    #[error("year must be non-zero")]
    ZeroYear,
    #[error("route id {0} is outside {min}..={max}", min = RouteId::MIN, max = RouteId::MAX)]
    RouteIdOutOfRange(u32),
    #[error("route must contain at least one road")]
    EmptyRoute,
    #[error("repair year {requested} predates the road's current year {current}")]
    RepairPredatesRoad { current: i32, requested: i32 },
    #[error("city {0:?} appears more than once in the route")]
    RepeatedCity(String),

    #[error("unknown city {0:?}")]
    CityNotFound(String),
    #[error("no road between {0:?} and {1:?}")]
    RoadNotFound(String, String),
    #[error("route {0} does not exist")]
    RouteNotFound(RouteId),

    #[error("a road between {0:?} and {1:?} already exists")]
    RoadExists(String, String),
    #[error("route {0} already exists")]
    RouteExists(RouteId),
    #[error("road between {from:?} and {to:?} has length {actual}, not {expected}")]
    LengthMismatch {
        from: String,
        to: String,
        expected: u32,
        actual: u32,
    },
    #[error("city {city:?} already lies on route {route}")]
    CityOnRoute { route: RouteId, city: String },

    #[error("more than one best path from {from:?} to {to:?}")]
    AmbiguousPath { from: String, to: String },
    #[error("no path from {from:?} to {to:?}")]
    Disconnected { from: String, to: String },

    #[error("out of capacity: {0}")]
    Allocation(Resource),
}

impl MapError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            MapError::EmptyCityName
            | MapError::SameCity(_)
            | MapError::ZeroLength
            | MapError::ZeroYear
            | MapError::RouteIdOutOfRange(_)
            | MapError::EmptyRoute
            | MapError::RepairPredatesRoad { .. }
            | MapError::RepeatedCity(_) => ErrorKind::Validation,
            MapError::CityNotFound(_) | MapError::RoadNotFound(..) | MapError::RouteNotFound(_) => {
                ErrorKind::NotFound
            }
            MapError::RoadExists(..)
            | MapError::RouteExists(_)
            | MapError::LengthMismatch { .. }
            | MapError::CityOnRoute { .. } => ErrorKind::Conflict,
            MapError::AmbiguousPath { .. } => ErrorKind::AmbiguousPath,
            MapError::Disconnected { .. } => ErrorKind::Disconnected,
            MapError::Allocation(_) => ErrorKind::Allocation,
        }
    }
}
