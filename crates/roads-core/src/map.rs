//! The road map: road and route operations over the graph.
//!
//! Every mutating operation either commits completely or leaves the map as
//! it found it.

use crate::config::MapConfig;
use crate::engine::{SearchOutcome, SearchRequest, shortest_path};
use crate::error::{MapError, Resource};
use crate::graph::{CityId, Graph, Leg, RoadId, Route, RouteId};
use crate::index::{InsertOutcome, Treap};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt::Write;

/// What it takes to make a road match a given length and year.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoadCheck {
    /// No such road yet.
    MustBuild,
    /// The road exists with an older date.
    MustRepair,
    /// The road exists exactly as described.
    NoActionNeeded,
}

/// Snapshot of one road.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoadView {
    pub length: u32,
    pub date: i32,
    /// Routes running along the road, ascending.
    pub routes: Vec<RouteId>,
}

/// One step of an explicitly given route: the road to `city` and its year.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hop<'a> {
    pub length: u32,
    pub year: i32,
    pub city: &'a str,
}

/// Map-wide counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MapStats {
    pub cities: usize,
    pub roads: usize,
    pub routes: usize,
    /// Sum of route lengths in roads.
    pub route_legs: usize,
}

/// Changes made by a batch route creation, kept so they can be undone.
#[derive(Debug, Default)]
struct Journal {
    cities: usize,
    built: Vec<RoadId>,
    repaired: Vec<(RoadId, i32)>,
}

/// The national road map.
#[derive(Debug, Clone)]
pub struct RoadMap {
    graph: Graph,
    routes: BTreeMap<RouteId, Route>,
}

impl Default for RoadMap {
    fn default() -> Self {
        Self::new()
    }
}

fn check_pair(city1: &str, city2: &str) -> Result<(), MapError> {
    if city1.is_empty() || city2.is_empty() {
        return Err(MapError::EmptyCityName);
    }
    if city1 == city2 {
        return Err(MapError::SameCity(city1.to_owned()));
    }
    Ok(())
}

fn check_segment(length: u32, year: i32) -> Result<(), MapError> {
    if length == 0 {
        return Err(MapError::ZeroLength);
    }
    if year == 0 {
        return Err(MapError::ZeroYear);
    }
    Ok(())
}

impl RoadMap {
    /// An empty map with default configuration.
    pub fn new() -> Self {
        Self::with_config(&MapConfig::default())
    }

    pub fn with_config(config: &MapConfig) -> Self {
        Self {
            graph: Graph::new(config),
            routes: BTreeMap::new(),
        }
    }

    /// Read-only access to the underlying graph.
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    fn resolve(&self, name: &str) -> Result<CityId, MapError> {
        self.graph
            .city_id(name)
            .ok_or_else(|| MapError::CityNotFound(name.to_owned()))
    }

    /// Resolve both cities and the road between them.
    fn resolve_road(&self, city1: &str, city2: &str) -> Result<(CityId, CityId, RoadId), MapError> {
        let a = self.resolve(city1)?;
        let b = self.resolve(city2)?;
        let road = self
            .graph
            .road_between(a, b)
            .ok_or_else(|| MapError::RoadNotFound(city1.to_owned(), city2.to_owned()))?;
        Ok((a, b, road))
    }

    fn road_date(&self, road: RoadId, city1: &str, city2: &str) -> Result<i32, MapError> {
        self.graph
            .road(road)
            .map(|r| r.date())
            .ok_or_else(|| MapError::RoadNotFound(city1.to_owned(), city2.to_owned()))
    }

    fn search_error(&self, outcome: &SearchOutcome, from: CityId, to: CityId) -> MapError {
        let from = self.graph.city_name(from).to_owned();
        let to = self.graph.city_name(to).to_owned();
        match outcome {
            SearchOutcome::Unreachable => MapError::Disconnected { from, to },
            _ => MapError::AmbiguousPath { from, to },
        }
    }

    // ------------------------------------------------------------------
    // Roads
    // ------------------------------------------------------------------

    /// Build a road, creating missing cities.
    pub fn add_road(
        &mut self,
        city1: &str,
        city2: &str,
        length: u32,
        date: i32,
    ) -> Result<(), MapError> {
        check_pair(city1, city2)?;
        check_segment(length, date)?;

        let mark = self.graph.city_count();
        let built = self.build_road(city1, city2, length, date);
        if built.is_err() {
            self.graph.truncate_cities(mark);
        }
        let road = built?;
        tracing::debug!(
            city1,
            city2,
            length,
            date,
            road = road.index(),
            "road built"
        );
        Ok(())
    }

    fn build_road(
        &mut self,
        city1: &str,
        city2: &str,
        length: u32,
        date: i32,
    ) -> Result<RoadId, MapError> {
        if let (Some(a), Some(b)) = (self.graph.city_id(city1), self.graph.city_id(city2))
            && self.graph.road_between(a, b).is_some()
        {
            return Err(MapError::RoadExists(city1.to_owned(), city2.to_owned()));
        }
        let a = self.graph.ensure_city(city1)?;
        let b = self.graph.ensure_city(city2)?;
        self.graph.link_road(a, b, length, date)
    }

    /// Move a road's date forward to `year`.
    pub fn repair_road(&mut self, city1: &str, city2: &str, year: i32) -> Result<(), MapError> {
        check_pair(city1, city2)?;
        if year == 0 {
            return Err(MapError::ZeroYear);
        }
        let (_, _, road) = self.resolve_road(city1, city2)?;
        let current = self.road_date(road, city1, city2)?;
        if year < current {
            return Err(MapError::RepairPredatesRoad {
                current,
                requested: year,
            });
        }
        self.graph.set_date(road, year);
        tracing::debug!(city1, city2, year, "road repaired");
        Ok(())
    }

    /// Classify the road `city1`–`city2` against `length` and `year` without
    /// touching the map.
    pub fn check_road(
        &self,
        city1: &str,
        city2: &str,
        length: u32,
        year: i32,
    ) -> Result<RoadCheck, MapError> {
        check_pair(city1, city2)?;
        check_segment(length, year)?;

        let (Some(a), Some(b)) = (self.graph.city_id(city1), self.graph.city_id(city2)) else {
            return Ok(RoadCheck::MustBuild);
        };
        let road = self.graph.road_between(a, b);
        let Some(road) = road.and_then(|id| self.graph.road(id)) else {
            return Ok(RoadCheck::MustBuild);
        };
        if road.length() != length {
            return Err(MapError::LengthMismatch {
                from: city1.to_owned(),
                to: city2.to_owned(),
                expected: length,
                actual: road.length(),
            });
        }
        match year.cmp(&road.date()) {
            Ordering::Less => Err(MapError::RepairPredatesRoad {
                current: road.date(),
                requested: year,
            }),
            Ordering::Equal => Ok(RoadCheck::NoActionNeeded),
            Ordering::Greater => Ok(RoadCheck::MustRepair),
        }
    }

    /// Look up the road between two cities.
    pub fn road(&self, city1: &str, city2: &str) -> Option<RoadView> {
        let a = self.graph.city_id(city1)?;
        let b = self.graph.city_id(city2)?;
        let road = self.graph.road(self.graph.road_between(a, b)?)?;
        Some(RoadView {
            length: road.length(),
            date: road.date(),
            routes: road.routes().iter().copied().collect(),
        })
    }

    /// Remove a road, rerouting every route that runs along it.
    ///
    /// Each affected route gets the best detour between the road's two ends
    /// that stays off the route's other cities. If any route has no unique
    /// detour nothing changes.
    pub fn remove_road(&mut self, city1: &str, city2: &str) -> Result<(), MapError> {
        check_pair(city1, city2)?;
        let (_, _, road) = self.resolve_road(city1, city2)?;
        let affected: Vec<RouteId> = self
            .graph
            .road(road)
            .map(|r| r.routes().iter().copied().collect())
            .unwrap_or_default();

        let mut detours = Vec::new();
        detours
            .try_reserve_exact(affected.len())
            .map_err(|_| MapError::Allocation(Resource::Scratch))?;
        for id in affected {
            let found = self
                .routes
                .get(&id)
                .and_then(|route| route.position_of(road).map(|position| (route, position)));
            debug_assert!(found.is_some(), "route {id} is not on a road listing it");
            let Some((route, position)) = found else {
                continue;
            };
            let leg = route.legs()[position];
            let request = SearchRequest::new(leg.from, leg.to)
                .avoiding(route)
                .passing_through(leg.to)
                .forbidding(road);
            match shortest_path(&self.graph, &request)? {
                SearchOutcome::Found(path) => detours.push((id, position, path.legs)),
                outcome => return Err(self.search_error(&outcome, leg.from, leg.to)),
            }
        }

        for (id, _, legs) in &detours {
            if let Some(route) = self.routes.get_mut(id) {
                route.reserve(legs.len())?;
            }
        }

        for (id, position, legs) in &detours {
            if let Some(route) = self.routes.get_mut(id) {
                route.splice(*position, legs);
            }
            self.graph.add_route_membership(*id, legs);
            tracing::debug!(route = id.get(), legs = legs.len(), "route rerouted");
        }
        self.graph.unlink_road(road);
        tracing::debug!(city1, city2, rerouted = detours.len(), "road removed");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Routes
    // ------------------------------------------------------------------

    /// Create route `id` along the unique best path from `city1` to `city2`.
    pub fn new_route(&mut self, id: u32, city1: &str, city2: &str) -> Result<(), MapError> {
        let id = RouteId::new(id)?;
        check_pair(city1, city2)?;
        if self.routes.contains_key(&id) {
            return Err(MapError::RouteExists(id));
        }
        let from = self.resolve(city1)?;
        let to = self.resolve(city2)?;

        let legs = match shortest_path(&self.graph, &SearchRequest::new(from, to))? {
            SearchOutcome::Found(path) => path.legs,
            outcome => return Err(self.search_error(&outcome, from, to)),
        };
        self.graph.add_route_membership(id, &legs);
        tracing::debug!(
            route = id.get(),
            city1,
            city2,
            legs = legs.len(),
            "route created"
        );
        self.routes.insert(id, Route::new(id, legs));
        Ok(())
    }

    /// Extend route `id` to `city` from whichever end reaches it best.
    pub fn extend_route(&mut self, id: u32, city: &str) -> Result<(), MapError> {
        let id = RouteId::new(id)?;
        if city.is_empty() {
            return Err(MapError::EmptyCityName);
        }
        let route = self.routes.get(&id).ok_or(MapError::RouteNotFound(id))?;
        let target = self.resolve(city)?;
        if route.contains_city(target) {
            return Err(MapError::CityOnRoute {
                route: id,
                city: city.to_owned(),
            });
        }

        let first = route.first_city();
        let last = route.last_city();
        let head = shortest_path(
            &self.graph,
            &SearchRequest::new(first, target).avoiding(route),
        )?;
        let tail = shortest_path(
            &self.graph,
            &SearchRequest::new(last, target).avoiding(route),
        )?;

        let at_head = match (head.score(), tail.score()) {
            (None, None) => return Err(self.search_error(&head, first, target)),
            (Some(_), None) => true,
            (None, Some(_)) => false,
            (Some(h), Some(t)) => match h.cmp(&t) {
                Ordering::Less => true,
                Ordering::Greater => false,
                Ordering::Equal => {
                    return Err(MapError::AmbiguousPath {
                        from: self.graph.city_name(first).to_owned(),
                        to: city.to_owned(),
                    });
                }
            },
        };
        let (winner, origin) = if at_head { (head, first) } else { (tail, last) };
        let SearchOutcome::Found(path) = winner else {
            return Err(self.search_error(&winner, origin, target));
        };

        let legs: Vec<Leg> = if at_head {
            path.legs.iter().rev().map(|leg| leg.reversed()).collect()
        } else {
            path.legs
        };
        let route = self
            .routes
            .get_mut(&id)
            .ok_or(MapError::RouteNotFound(id))?;
        route.reserve(legs.len())?;
        if at_head {
            route.prepend(&legs);
        } else {
            route.append(&legs);
        }
        self.graph.add_route_membership(id, &legs);
        tracing::debug!(
            route = id.get(),
            city,
            at_head,
            legs = legs.len(),
            "route extended"
        );
        Ok(())
    }

    /// Create route `id` from an explicit city sequence, building or
    /// repairing each road on the way.
    ///
    /// The whole sequence is checked before anything changes: no city may
    /// repeat, and every existing road must match its length and not be newer
    /// than the given year.
    pub fn create_route(&mut self, id: u32, first: &str, hops: &[Hop<'_>]) -> Result<(), MapError> {
        let id = RouteId::new(id)?;
        if hops.is_empty() {
            return Err(MapError::EmptyRoute);
        }
        if self.routes.contains_key(&id) {
            return Err(MapError::RouteExists(id));
        }
        if first.is_empty() {
            return Err(MapError::EmptyCityName);
        }

        let mut seen: Treap<&str, ()> = Treap::seeded(self.graph.seed());
        for city in std::iter::once(first).chain(hops.iter().map(|hop| hop.city)) {
            if city.is_empty() {
                return Err(MapError::EmptyCityName);
            }
            match seen.insert(city, ()) {
                InsertOutcome::Inserted => {}
                InsertOutcome::AlreadyPresent => {
                    return Err(MapError::RepeatedCity(city.to_owned()));
                }
                InsertOutcome::AllocationFailed => {
                    return Err(MapError::Allocation(Resource::Scratch));
                }
            }
        }

        let mut plan = Vec::new();
        plan.try_reserve_exact(hops.len())
            .map_err(|_| MapError::Allocation(Resource::Scratch))?;
        let mut prev = first;
        for hop in hops {
            plan.push(self.check_road(prev, hop.city, hop.length, hop.year)?);
            prev = hop.city;
        }

        let mut journal = Journal {
            cities: self.graph.city_count(),
            ..Journal::default()
        };
        match self.apply_segments(first, hops, &plan, &mut journal) {
            Ok(legs) => {
                self.graph.add_route_membership(id, &legs);
                tracing::debug!(
                    route = id.get(),
                    built = journal.built.len(),
                    repaired = journal.repaired.len(),
                    "route created from segments"
                );
                self.routes.insert(id, Route::new(id, legs));
                Ok(())
            }
            Err(err) => {
                self.undo(journal);
                Err(err)
            }
        }
    }

    fn apply_segments(
        &mut self,
        first: &str,
        hops: &[Hop<'_>],
        plan: &[RoadCheck],
        journal: &mut Journal,
    ) -> Result<Vec<Leg>, MapError> {
        let scratch = || MapError::Allocation(Resource::Scratch);
        let mut legs = Vec::new();
        legs.try_reserve_exact(hops.len()).map_err(|_| scratch())?;
        journal
            .built
            .try_reserve(hops.len())
            .map_err(|_| scratch())?;
        journal
            .repaired
            .try_reserve(hops.len())
            .map_err(|_| scratch())?;

        let mut prev = first;
        for (hop, check) in hops.iter().zip(plan) {
            let from = self.graph.ensure_city(prev)?;
            let to = self.graph.ensure_city(hop.city)?;
            let road = match check {
                RoadCheck::MustBuild => {
                    let road = self.graph.link_road(from, to, hop.length, hop.year)?;
                    journal.built.push(road);
                    road
                }
                RoadCheck::MustRepair | RoadCheck::NoActionNeeded => {
                    let road = self.graph.road_between(from, to).ok_or_else(|| {
                        MapError::RoadNotFound(prev.to_owned(), hop.city.to_owned())
                    })?;
                    if *check == RoadCheck::MustRepair {
                        journal
                            .repaired
                            .push((road, self.road_date(road, prev, hop.city)?));
                        self.graph.set_date(road, hop.year);
                    }
                    road
                }
            };
            legs.push(Leg { road, from, to });
            prev = hop.city;
        }
        Ok(legs)
    }

    fn undo(&mut self, journal: Journal) {
        for road in journal.built.into_iter().rev() {
            self.graph.unlink_road(road);
        }
        for (road, date) in journal.repaired.into_iter().rev() {
            self.graph.set_date(road, date);
        }
        self.graph.truncate_cities(journal.cities);
    }

    /// `id;city;length;year;city;…;city`, or an empty string when there is
    /// no such route.
    pub fn route_description(&self, id: u32) -> String {
        let Some(route) = RouteId::new(id).ok().and_then(|id| self.routes.get(&id)) else {
            return String::new();
        };
        let mut out = format!(
            "{};{}",
            route.id(),
            self.graph.city_name(route.first_city())
        );
        for leg in route.legs() {
            let road = self.graph.road(leg.road);
            debug_assert!(road.is_some(), "route {} uses a removed road", route.id());
            let Some(road) = road else {
                continue;
            };
            let _ = write!(
                out,
                ";{};{};{}",
                road.length(),
                road.date(),
                self.graph.city_name(leg.to)
            );
        }
        out
    }

    pub fn route_exists(&self, id: u32) -> bool {
        RouteId::new(id).is_ok_and(|id| self.routes.contains_key(&id))
    }

    pub fn route(&self, id: RouteId) -> Option<&Route> {
        self.routes.get(&id)
    }

    /// All routes, ascending by id.
    pub fn routes(&self) -> impl Iterator<Item = &Route> {
        self.routes.values()
    }

    pub fn stats(&self) -> MapStats {
        MapStats {
            cities: self.graph.city_count(),
            roads: self.graph.road_count(),
            routes: self.routes.len(),
            route_legs: self.routes.values().map(|r| r.legs().len()).sum(),
        }
    }
}
