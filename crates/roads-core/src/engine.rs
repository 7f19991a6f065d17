//! Shortest-path search over the road graph.
//!
//! Dijkstra keyed by total length, with the oldest road on a path as the
//! secondary key: among equally long paths the one whose oldest road is the
//! most recent wins. When two or more paths remain equally good the search
//! reports [`SearchOutcome::Ambiguous`] instead of picking one.
//!
//! All working state lives in a [`SearchState`] owned by a single call, so a
//! search only ever borrows the graph.

use crate::error::{MapError, Resource};
use crate::graph::{CityId, Graph, Leg, RoadId, Route};
use crate::index::{InsertOutcome, Treap};
use std::cmp::Ordering;
use tracing::trace;

/// What to search for and what to stay away from.
#[derive(Debug, Clone, Copy)]
pub struct SearchRequest<'a> {
    pub from: CityId,
    pub to: CityId,
    /// Cities of this route may not be entered, except `pass_through`.
    pub avoid: Option<&'a Route>,
    pub pass_through: Option<CityId>,
    /// A road that is skipped without being removed.
    pub forbidden: Option<RoadId>,
}

impl<'a> SearchRequest<'a> {
    pub fn new(from: CityId, to: CityId) -> Self {
        Self {
            from,
            to,
            avoid: None,
            pass_through: None,
            forbidden: None,
        }
    }

    #[must_use]
    pub fn avoiding(mut self, route: &'a Route) -> Self {
        self.avoid = Some(route);
        self
    }

    #[must_use]
    pub fn passing_through(mut self, city: CityId) -> Self {
        self.pass_through = Some(city);
        self
    }

    #[must_use]
    pub fn forbidding(mut self, road: RoadId) -> Self {
        self.forbidden = Some(road);
        self
    }
}

/// Quality of a path. Orders best first: lower cost, then the more recent
/// oldest road.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Score {
    pub cost: u64,
    /// Minimum road date along the path; `i32::MAX` for the empty path.
    pub oldest: i32,
}

impl Ord for Score {
    fn cmp(&self, other: &Self) -> Ordering {
        self.cost
            .cmp(&other.cost)
            .then_with(|| other.oldest.cmp(&self.oldest))
    }
}

impl PartialOrd for Score {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A uniquely best path, legs in travel order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Path {
    pub legs: Vec<Leg>,
    pub score: Score,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    Found(Path),
    /// The target was reached but more than one path is best.
    Ambiguous(Score),
    Unreachable,
}

impl SearchOutcome {
    /// The best score, whenever the target was reached.
    pub fn score(&self) -> Option<Score> {
        match self {
            SearchOutcome::Found(path) => Some(path.score),
            SearchOutcome::Ambiguous(score) => Some(*score),
            SearchOutcome::Unreachable => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Label {
    cost: Option<u64>,
    oldest: i32,
    /// Relaxations that reached the current best (cost, oldest).
    incoming: u32,
    excluded: bool,
    settled: bool,
}

impl Default for Label {
    fn default() -> Self {
        Self {
            cost: None,
            oldest: i32::MAX,
            incoming: 0,
            excluded: false,
            settled: false,
        }
    }
}

/// Per-search working state.
struct SearchState<'g, 'r> {
    graph: &'g Graph,
    request: &'r SearchRequest<'r>,
    labels: Vec<Label>,
    /// Cities in the order they were settled (non-decreasing cost).
    settled: Vec<CityId>,
}

impl<'g, 'r> SearchState<'g, 'r> {
    fn new(graph: &'g Graph, request: &'r SearchRequest<'r>) -> Result<Self, MapError> {
        let scratch = MapError::Allocation(Resource::Scratch);
        let mut labels = Vec::new();
        labels
            .try_reserve_exact(graph.city_count())
            .map_err(|_| scratch.clone())?;
        labels.resize(graph.city_count(), Label::default());

        if let Some(route) = request.avoid {
            for city in route.cities() {
                if Some(city) != request.pass_through && city != request.from {
                    labels[city.index()].excluded = true;
                }
            }
        }

        let mut settled = Vec::new();
        settled.try_reserve(16).map_err(|_| scratch)?;
        Ok(Self {
            graph,
            request,
            labels,
            settled,
        })
    }

    fn label(&self, city: CityId) -> &Label {
        &self.labels[city.index()]
    }

    fn usable(&self, road: RoadId) -> bool {
        self.request.forbidden != Some(road)
    }

    fn run(&mut self) -> Result<(), MapError> {
        let graph = self.graph;
        let from = self.request.from;
        let mut frontier: Treap<(u64, CityId), ()> = Treap::seeded(graph.seed());
        let full = MapError::Allocation(Resource::SearchFrontier);

        self.labels[from.index()] = Label {
            cost: Some(0),
            incoming: 1,
            ..Label::default()
        };
        if frontier.insert((0, from), ()) == InsertOutcome::AllocationFailed {
            return Err(full);
        }

        while let Some(((cost, city), ())) = frontier.pop_first() {
            let label = self.labels[city.index()];
            // Stale entry left behind by a later improvement.
            if label.settled || label.cost != Some(cost) {
                continue;
            }
            self.labels[city.index()].settled = true;
            self.settled
                .try_reserve(1)
                .map_err(|_| MapError::Allocation(Resource::Scratch))?;
            self.settled.push(city);
            if city == self.request.to {
                break;
            }

            for (road_id, road, next) in graph.neighbours(city) {
                if !self.usable(road_id) {
                    continue;
                }
                let target = &mut self.labels[next.index()];
                if target.excluded || target.settled {
                    continue;
                }
                let candidate = cost + u64::from(road.length());
                let oldest = label.oldest.min(road.date());
                match target.cost {
                    Some(best) if candidate > best => {}
                    Some(best) if candidate == best => {
                        if oldest > target.oldest {
                            target.oldest = oldest;
                            target.incoming = 1;
                        } else if oldest == target.oldest {
                            target.incoming += 1;
                        }
                    }
                    _ => {
                        *target = Label {
                            cost: Some(candidate),
                            oldest,
                            incoming: 1,
                            ..*target
                        };
                        if frontier.insert((candidate, next), ()) == InsertOutcome::AllocationFailed
                        {
                            return Err(full);
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Whether the road from `prev` into `city` lies on some best path whose
    /// oldest road is no older than `threshold`.
    fn feeds(&self, prev: CityId, road: RoadId, city: CityId, threshold: i32) -> bool {
        let (Some(prev_cost), Some(cost)) = (self.label(prev).cost, self.label(city).cost) else {
            return false;
        };
        let Some(road_ref) = self.graph.road(road) else {
            return false;
        };
        self.usable(road)
            && self.label(prev).settled
            && road_ref.date() >= threshold
            && prev_cost + u64::from(road_ref.length()) == cost
    }

    /// Count best paths into every settled city, saturating at 2.
    fn count_paths(&self, threshold: i32) -> Result<Vec<u8>, MapError> {
        let mut ways = Vec::new();
        ways.try_reserve_exact(self.labels.len())
            .map_err(|_| MapError::Allocation(Resource::Scratch))?;
        ways.resize(self.labels.len(), 0u8);
        ways[self.request.from.index()] = 1;

        for &city in &self.settled {
            let here = ways[city.index()];
            if here == 0 {
                continue;
            }
            for (road, _, next) in self.graph.neighbours(city) {
                if self.feeds(city, road, next, threshold) {
                    let slot = &mut ways[next.index()];
                    *slot = slot.saturating_add(here).min(2);
                }
            }
        }
        Ok(ways)
    }

    fn outcome(&self) -> Result<SearchOutcome, MapError> {
        let to = self.request.to;
        let target = self.label(to);
        let Some(cost) = target.cost else {
            return Ok(SearchOutcome::Unreachable);
        };
        let score = Score {
            cost,
            oldest: target.oldest,
        };
        if target.incoming > 1 {
            return Ok(SearchOutcome::Ambiguous(score));
        }

        let ways = self.count_paths(score.oldest)?;
        if ways[to.index()] != 1 {
            return Ok(SearchOutcome::Ambiguous(score));
        }

        let mut legs = Vec::new();
        let mut city = to;
        while city != self.request.from {
            let step = self.graph.neighbours(city).find(|&(road, _, prev)| {
                ways[prev.index()] == 1 && self.feeds(prev, road, city, score.oldest)
            });
            let Some((road, _, prev)) = step else {
                return Ok(SearchOutcome::Ambiguous(score));
            };
            legs.try_reserve(1)
                .map_err(|_| MapError::Allocation(Resource::Scratch))?;
            legs.push(Leg {
                road,
                from: prev,
                to: city,
            });
            city = prev;
        }
        legs.reverse();
        Ok(SearchOutcome::Found(Path { legs, score }))
    }
}

/// Find the unique best path for `request`.
///
/// Errors only when working memory runs out; an unreachable or ambiguous
/// target is an ordinary outcome.
pub fn shortest_path(
    graph: &Graph,
    request: &SearchRequest<'_>,
) -> Result<SearchOutcome, MapError> {
    if request.from == request.to {
        return Ok(SearchOutcome::Found(Path {
            legs: Vec::new(),
            score: Score {
                cost: 0,
                oldest: i32::MAX,
            },
        }));
    }

    let mut state = SearchState::new(graph, request)?;
    state.run()?;
    let outcome = state.outcome()?;
    trace!(
        from = graph.city_name(request.from),
        to = graph.city_name(request.to),
        settled = state.settled.len(),
        ?outcome,
        "route search finished"
    );
    Ok(outcome)
}
