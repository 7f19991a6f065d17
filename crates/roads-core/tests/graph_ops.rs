use roads_core::map::{RoadCheck, RoadMap};
use roads_core::{ErrorKind, MapError};

fn snapshot(map: &RoadMap) -> Vec<String> {
    let graph = map.graph();
    let mut lines = Vec::new();
    for (id, city) in graph.cities() {
        for (_, road, other) in graph.neighbours(id) {
            lines.push(format!(
                "{}-{}:{}:{}:{:?}",
                city.name(),
                graph.city_name(other),
                road.length(),
                road.date(),
                road.routes()
            ));
        }
    }
    lines.sort();
    lines
}

#[test]
fn test_add_then_lookup() {
    let mut map = RoadMap::new();
    map.add_road("Warszawa", "Krakow", 300, 1990).unwrap();

    let road = map.road("Krakow", "Warszawa").unwrap();
    assert_eq!(road.length, 300);
    assert_eq!(road.date, 1990);
    assert!(road.routes.is_empty());
    assert_eq!(map.stats().cities, 2);
    assert_eq!(map.stats().roads, 1);
}

#[test]
fn test_add_existing_road_conflicts() {
    let mut map = RoadMap::new();
    map.add_road("A", "B", 1, 2000).unwrap();
    let before = snapshot(&map);

    let err = map.add_road("A", "B", 2, 2001).unwrap_err();
    assert_eq!(err, MapError::RoadExists("A".into(), "B".into()));
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(snapshot(&map), before);
}

#[test]
fn test_adding_a_road_reuses_known_cities() {
    let mut map = RoadMap::new();
    map.add_road("A", "B", 1, 2000).unwrap();
    map.add_road("B", "C", 1, 2000).unwrap();
    map.add_road("C", "A", 1, 2000).unwrap();
    assert_eq!(map.stats().cities, 3);
    assert_eq!(
        map.graph().city(map.graph().city_id("A").unwrap()).degree(),
        2
    );
}

#[test]
fn test_repair_is_monotonic() {
    let mut map = RoadMap::new();
    map.add_road("A", "B", 4, 2000).unwrap();

    let err = map.repair_road("A", "B", 1999).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(map.road("A", "B").unwrap().date, 2000);

    map.repair_road("B", "A", 2000).unwrap();
    map.repair_road("A", "B", 2015).unwrap();
    assert_eq!(map.road("A", "B").unwrap().date, 2015);
    assert_eq!(map.road("B", "A").unwrap().date, 2015);
}

#[test]
fn test_repair_missing_things() {
    let mut map = RoadMap::new();
    map.add_road("A", "B", 4, 2000).unwrap();
    map.add_road("C", "D", 4, 2000).unwrap();

    assert_eq!(
        map.repair_road("A", "X", 2001),
        Err(MapError::CityNotFound("X".into()))
    );
    assert_eq!(
        map.repair_road("A", "C", 2001),
        Err(MapError::RoadNotFound("A".into(), "C".into()))
    );
    assert_eq!(map.repair_road("A", "B", 0), Err(MapError::ZeroYear));
}

#[test]
fn test_check_road_never_mutates() {
    let mut map = RoadMap::new();
    map.add_road("A", "B", 4, 2000).unwrap();
    map.new_route(1, "A", "B").unwrap();
    let before = snapshot(&map);
    let stats = map.stats();

    let probes = [
        ("A", "B", 4, 2000),
        ("A", "B", 4, 2010),
        ("A", "B", 4, 1990),
        ("A", "B", 5, 2000),
        ("A", "Z", 1, 1),
        ("Y", "Z", 1, 1),
        ("A", "A", 1, 1),
        ("A", "B", 0, 1),
    ];
    for (a, b, length, year) in probes {
        let _ = map.check_road(a, b, length, year);
    }

    assert_eq!(snapshot(&map), before);
    assert_eq!(map.stats(), stats);
    assert_eq!(map.check_road("A", "B", 4, 2010), Ok(RoadCheck::MustRepair));
    assert_eq!(map.check_road("Y", "Z", 1, 1), Ok(RoadCheck::MustBuild));
}

#[test]
fn test_remove_road_frees_both_directions() {
    let mut map = RoadMap::new();
    map.add_road("A", "B", 4, 2000).unwrap();
    map.add_road("B", "C", 4, 2000).unwrap();
    map.remove_road("B", "A").unwrap();

    assert!(map.road("A", "B").is_none());
    assert!(map.road("B", "A").is_none());
    assert_eq!(map.stats().roads, 1);
    // Cities outlive their roads.
    assert_eq!(map.stats().cities, 3);

    // The pair can be rebuilt afterwards.
    map.add_road("A", "B", 9, 2020).unwrap();
    assert_eq!(map.road("A", "B").unwrap().length, 9);
}

#[test]
fn test_city_names_are_opaque() {
    let mut map = RoadMap::new();
    map.add_road("Łódź", "Zielona Góra", 10, 1).unwrap();
    map.add_road("zielona góra", "Zielona Góra", 10, 1).unwrap();
    assert_eq!(map.stats().cities, 3);
    assert!(map.road("Łódź", "Zielona Góra").is_some());
}

#[test]
fn test_cities_iterate_in_name_order() {
    let mut map = RoadMap::new();
    map.add_road("M", "C", 1, 1).unwrap();
    map.add_road("X", "A", 1, 1).unwrap();
    let names: Vec<&str> = map.graph().cities().map(|(_, c)| c.name()).collect();
    assert_eq!(names, ["A", "C", "M", "X"]);
}
