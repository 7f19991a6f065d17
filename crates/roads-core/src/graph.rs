//! Graph entities: cities, edge pairs (roads) and routes.
//!
//! Cities live in an append-only arena addressed by [`CityId`]; a name index
//! maps names to ids. Each road is one arena record addressed by [`RoadId`]
//! and seen from both of its ends through the cities' adjacency indexes,
//! which hold handles rather than owning the road.

use crate::config::MapConfig;
use crate::error::{MapError, Resource};
use crate::index::{InsertOutcome, Treap};
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

/// Handle of a city in the city arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CityId(u32);

impl CityId {
    pub fn index(self) -> usize {
        self.0 as usize
    }

    fn from_index(index: usize) -> Self {
        Self(index as u32)
    }
}

/// Handle of a road (edge pair) in the road arena. Stable for the road's
/// lifetime; freed slots are reused by later roads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RoadId(u32);

impl RoadId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// National route number, always within `1..=999`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct RouteId(u32);

impl RouteId {
    pub const MIN: u32 = 1;
    pub const MAX: u32 = 999;

    pub fn new(id: u32) -> Result<Self, MapError> {
        if (Self::MIN..=Self::MAX).contains(&id) {
            Ok(Self(id))
        } else {
            Err(MapError::RouteIdOutOfRange(id))
        }
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for RouteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A named city and its outgoing roads, keyed by destination name.
#[derive(Debug, Clone)]
pub struct City {
    name: String,
    adjacency: Treap<String, RoadId>,
}

impl City {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of roads touching this city.
    pub fn degree(&self) -> usize {
        self.adjacency.len()
    }

    pub fn roads(&self) -> impl Iterator<Item = RoadId> + '_ {
        self.adjacency.values().copied()
    }
}

/// Both directions of a road between two cities. Length and date are shared
/// by the two directions, and so is the set of routes running along it.
#[derive(Debug, Clone)]
pub struct Road {
    ends: [CityId; 2],
    length: u32,
    date: i32,
    routes: BTreeSet<RouteId>,
}

impl Road {
    pub fn ends(&self) -> [CityId; 2] {
        self.ends
    }

    pub fn length(&self) -> u32 {
        self.length
    }

    /// Year of construction or of the latest repair.
    pub fn date(&self) -> i32 {
        self.date
    }

    /// Routes that currently run along this road, in either direction.
    pub fn routes(&self) -> &BTreeSet<RouteId> {
        &self.routes
    }

    /// The end opposite to `from`.
    pub fn other_end(&self, from: CityId) -> CityId {
        if self.ends[0] == from {
            self.ends[1]
        } else {
            self.ends[0]
        }
    }
}

/// One road travelled in a fixed direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Leg {
    pub road: RoadId,
    pub from: CityId,
    pub to: CityId,
}

impl Leg {
    #[must_use]
    pub fn reversed(self) -> Self {
        Self {
            road: self.road,
            from: self.to,
            to: self.from,
        }
    }
}

/// A national route: a simple path of legs with a fixed direction.
#[derive(Debug, Clone)]
pub struct Route {
    id: RouteId,
    legs: Vec<Leg>,
}

impl Route {
    /// `legs` must be non-empty and chained (`legs[i].to == legs[i + 1].from`).
    pub(crate) fn new(id: RouteId, legs: Vec<Leg>) -> Self {
        debug_assert!(!legs.is_empty());
        debug_assert!(legs.windows(2).all(|w| w[0].to == w[1].from));
        Self { id, legs }
    }

    pub fn id(&self) -> RouteId {
        self.id
    }

    pub fn legs(&self) -> &[Leg] {
        &self.legs
    }

    pub fn first_city(&self) -> CityId {
        self.legs[0].from
    }

    pub fn last_city(&self) -> CityId {
        self.legs[self.legs.len() - 1].to
    }

    /// Cities in travel order, both endpoints included.
    pub fn cities(&self) -> impl Iterator<Item = CityId> + '_ {
        std::iter::once(self.first_city()).chain(self.legs.iter().map(|leg| leg.to))
    }

    pub fn contains_city(&self, city: CityId) -> bool {
        self.cities().any(|c| c == city)
    }

    /// Position of the leg that runs along `road`.
    pub fn position_of(&self, road: RoadId) -> Option<usize> {
        self.legs.iter().position(|leg| leg.road == road)
    }

    pub(crate) fn reserve(&mut self, additional: usize) -> Result<(), MapError> {
        self.legs
            .try_reserve(additional)
            .map_err(|_| MapError::Allocation(Resource::Routes))
    }

    /// Replace the leg at `position` with `detour`.
    pub(crate) fn splice(&mut self, position: usize, detour: &[Leg]) {
        self.legs
            .splice(position..=position, detour.iter().copied());
    }

    pub(crate) fn prepend(&mut self, legs: &[Leg]) {
        self.legs.splice(0..0, legs.iter().copied());
    }

    pub(crate) fn append(&mut self, legs: &[Leg]) {
        self.legs.extend_from_slice(legs);
    }
}

/// Slot arena for roads with an optional capacity cap.
#[derive(Debug, Clone, Default)]
struct RoadArena {
    slots: Vec<Option<Road>>,
    vacant: Vec<RoadId>,
    live: usize,
    limit: Option<usize>,
}

impl RoadArena {
    fn allocate(&mut self, road: Road) -> Result<RoadId, MapError> {
        let full = MapError::Allocation(Resource::Roads);
        if self.limit.is_some_and(|limit| self.live >= limit) {
            return Err(full);
        }
        let id = match self.vacant.pop() {
            Some(id) => {
                self.slots[id.index()] = Some(road);
                id
            }
            None => {
                self.slots.try_reserve(1).map_err(|_| full)?;
                self.slots.push(Some(road));
                RoadId((self.slots.len() - 1) as u32)
            }
        };
        self.live += 1;
        Ok(id)
    }

    fn release(&mut self, id: RoadId) -> Option<Road> {
        let road = self.slots.get_mut(id.index())?.take()?;
        self.vacant.push(id);
        self.live -= 1;
        Some(road)
    }

    fn get(&self, id: RoadId) -> Option<&Road> {
        self.slots.get(id.index())?.as_ref()
    }

    fn get_mut(&mut self, id: RoadId) -> Option<&mut Road> {
        self.slots.get_mut(id.index())?.as_mut()
    }
}

/// The road network: cities, roads and their adjacency.
#[derive(Debug, Clone)]
pub struct Graph {
    cities: Vec<City>,
    names: Treap<String, CityId>,
    roads: RoadArena,
    max_degree: Option<usize>,
    /// Seeds the per-city adjacency indexes.
    seeds: ChaCha8Rng,
    seed: u64,
}

impl Graph {
    pub fn new(config: &MapConfig) -> Self {
        let seed = config.index.seed;
        let mut seeds = ChaCha8Rng::seed_from_u64(seed);
        let names = Treap::seeded(seeds.next_u64()).with_limit(config.limits.max_cities);
        Self {
            cities: Vec::new(),
            names,
            roads: RoadArena {
                limit: config.limits.max_roads,
                ..RoadArena::default()
            },
            max_degree: config.limits.max_degree,
            seeds,
            seed,
        }
    }

    /// The configured index seed, for callers building their own indexes.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn city_count(&self) -> usize {
        self.cities.len()
    }

    pub fn road_count(&self) -> usize {
        self.roads.live
    }

    pub fn city_id(&self, name: &str) -> Option<CityId> {
        self.names.find(name).copied()
    }

    pub fn city(&self, id: CityId) -> &City {
        &self.cities[id.index()]
    }

    pub fn city_name(&self, id: CityId) -> &str {
        &self.cities[id.index()].name
    }

    /// All cities in name order.
    pub fn cities(&self) -> impl Iterator<Item = (CityId, &City)> {
        self.names.values().map(|&id| (id, self.city(id)))
    }

    pub fn road(&self, id: RoadId) -> Option<&Road> {
        self.roads.get(id)
    }

    /// The road joining `a` and `b`, if any.
    pub fn road_between(&self, a: CityId, b: CityId) -> Option<RoadId> {
        self.city(a).adjacency.find(self.city_name(b)).copied()
    }

    /// Roads leaving `city`, each with the city at its other end.
    pub fn neighbours(&self, city: CityId) -> impl Iterator<Item = (RoadId, &Road, CityId)> {
        self.city(city).roads().filter_map(move |id| {
            let road = self.roads.get(id)?;
            Some((id, road, road.other_end(city)))
        })
    }

    /// Look up `name`, creating the city when absent.
    pub(crate) fn ensure_city(&mut self, name: &str) -> Result<CityId, MapError> {
        if let Some(id) = self.city_id(name) {
            return Ok(id);
        }
        self.cities
            .try_reserve(1)
            .map_err(|_| MapError::Allocation(Resource::Cities))?;
        let id = CityId::from_index(self.cities.len());
        match self.names.insert(name.to_owned(), id) {
            InsertOutcome::Inserted => {}
            // Looked up above, so only a full index gets here.
            _ => return Err(MapError::Allocation(Resource::Cities)),
        }
        let adjacency = Treap::seeded(self.seeds.next_u64()).with_limit(self.max_degree);
        self.cities.push(City {
            name: name.to_owned(),
            adjacency,
        });
        Ok(id)
    }

    /// Drop every city created after the first `count`. Only valid for
    /// cities that no longer have roads, i.e. when undoing a failed mutation.
    pub(crate) fn truncate_cities(&mut self, count: usize) {
        while self.cities.len() > count {
            let Some(city) = self.cities.pop() else {
                break;
            };
            debug_assert_eq!(city.degree(), 0, "rolled back city still has roads");
            self.names.remove(city.name.as_str());
        }
    }

    /// Create the road `a`–`b` and link it into both adjacency indexes.
    pub(crate) fn link_road(
        &mut self,
        a: CityId,
        b: CityId,
        length: u32,
        date: i32,
    ) -> Result<RoadId, MapError> {
        if self.road_between(a, b).is_some() {
            return Err(MapError::RoadExists(
                self.city_name(a).to_owned(),
                self.city_name(b).to_owned(),
            ));
        }
        let id = self.roads.allocate(Road {
            ends: [a, b],
            length,
            date,
            routes: BTreeSet::new(),
        })?;

        let name_a = self.city_name(a).to_owned();
        let name_b = self.city_name(b).to_owned();
        if self.cities[a.index()].adjacency.insert(name_b.clone(), id) != InsertOutcome::Inserted {
            self.roads.release(id);
            return Err(MapError::Allocation(Resource::Adjacency));
        }
        if self.cities[b.index()].adjacency.insert(name_a, id) != InsertOutcome::Inserted {
            self.cities[a.index()].adjacency.remove(name_b.as_str());
            self.roads.release(id);
            return Err(MapError::Allocation(Resource::Adjacency));
        }
        Ok(id)
    }

    /// Detach `id` from both ends and free its slot.
    pub(crate) fn unlink_road(&mut self, id: RoadId) -> Option<Road> {
        let road = self.roads.release(id)?;
        let [a, b] = road.ends;
        let name_a = self.city_name(a).to_owned();
        let name_b = self.city_name(b).to_owned();
        self.cities[a.index()].adjacency.remove(name_b.as_str());
        self.cities[b.index()].adjacency.remove(name_a.as_str());
        Some(road)
    }

    pub(crate) fn set_date(&mut self, id: RoadId, date: i32) {
        if let Some(road) = self.roads.get_mut(id) {
            road.date = date;
        }
    }

    pub(crate) fn add_route_membership(&mut self, route: RouteId, legs: &[Leg]) {
        for leg in legs {
            if let Some(road) = self.roads.get_mut(leg.road) {
                road.routes.insert(route);
            }
        }
    }
}
