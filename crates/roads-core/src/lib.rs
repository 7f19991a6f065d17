//! In-memory national road network.
//!
//! Provides the ordered index ([`index::Treap`]), the road graph
//! ([`graph::Graph`]), the best-route search ([`engine::shortest_path`]) and
//! the map operations that keep national routes consistent while roads are
//! built, repaired and removed ([`map::RoadMap`]).

pub mod config;
pub mod engine;
pub mod error;
pub mod graph;
pub mod index;
pub mod map;

pub use error::{ErrorKind, MapError};
pub use map::RoadMap;
