//! Store behaviour observed through the public API and listener events.

use mapcluster::compute::projection::{PlanarProjection, WebMercatorProjection};
use mapcluster::compute::simplify::DouglasPeuckerSimplifier;
use mapcluster::prelude::*;
use mapcluster::FeatureId;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[derive(Debug, Clone, PartialEq)]
enum Event {
    Added(Vec<FeatureId>),
    Changed(FeatureId),
    Removed(Vec<FeatureId>),
    AllChanged,
}

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<Event>>,
}

impl Recorder {
    fn take(&self) -> Vec<Event> {
        std::mem::take(&mut *self.events.lock())
    }
}

fn ids(features: &[FeatureRef]) -> Vec<FeatureId> {
    let mut ids: Vec<FeatureId> = features.iter().filter_map(|f| f.id()).collect();
    ids.sort_unstable();
    ids
}

impl FeatureListener for Recorder {
    fn on_features_added(&self, features: &[FeatureRef]) {
        self.events.lock().push(Event::Added(ids(features)));
    }

    fn on_feature_changed(&self, feature: &FeatureRef) {
        self.events
            .lock()
            .push(Event::Changed(feature.id().unwrap_or(FeatureId::MAX)));
    }

    fn on_features_removed(&self, features: &[FeatureRef]) {
        self.events.lock().push(Event::Removed(ids(features)));
    }

    fn on_all_changed(&self) {
        self.events.lock().push(Event::AllChanged);
    }
}

fn planar_store(kind: SpatialIndexKind) -> (FeatureStore, Arc<Recorder>) {
    init_logging();
    let store = FeatureStore::builder().index_kind(kind).build().unwrap();
    let recorder = Arc::new(Recorder::default());
    store.register_listener(recorder.clone());
    (store, recorder)
}

fn point(x: f64, y: f64) -> FeatureRef {
    Feature::new(FeatureGeometry::point(x, y)).into_ref()
}

#[test]
fn test_identities_are_unique_and_increasing() {
    let (store, recorder) = planar_store(SpatialIndexKind::Null);
    let a = point(0.0, 0.0);
    let b = point(1.0, 0.0);
    let c = point(2.0, 0.0);

    store.add(a.clone()).unwrap();
    store.add_all(&[b.clone(), c.clone()]).unwrap();

    assert_eq!(a.id(), Some(0));
    assert_eq!(b.id(), Some(1));
    assert_eq!(c.id(), Some(2));
    assert_eq!(
        recorder.take(),
        vec![Event::Added(vec![0]), Event::Added(vec![1, 2])]
    );
}

#[test]
fn test_set_all_keeps_identity_of_existing_features() {
    let (store, recorder) = planar_store(SpatialIndexKind::KdTree);
    let a = point(0.0, 0.0);
    let b = point(1.0, 0.0);
    store.add_all(&[a.clone(), b.clone()]).unwrap();
    recorder.take();

    let c = point(2.0, 0.0);
    store.set_all(&[b.clone(), c.clone()]).unwrap();

    assert_eq!(b.id(), Some(1));
    assert_eq!(c.id(), Some(2));
    assert!(!a.is_attached());
    assert_eq!(
        recorder.take(),
        vec![Event::Added(vec![2]), Event::Removed(vec![0])]
    );
    assert_eq!(store.len(), 2);
}

#[test]
fn test_set_all_is_idempotent() {
    let (store, recorder) = planar_store(SpatialIndexKind::KdTree);
    let features: Vec<FeatureRef> = (0..20).map(|i| point(f64::from(i), 0.0)).collect();

    store.set_all(&features).unwrap();
    assert_eq!(recorder.take().len(), 1);

    store.set_all(&features).unwrap();
    assert!(recorder.take().is_empty());
    assert_eq!(store.len(), 20);
}

#[test]
fn test_remove_absent_fires_nothing() {
    let (store, recorder) = planar_store(SpatialIndexKind::KdTree);
    store.add(point(0.0, 0.0)).unwrap();
    recorder.take();

    assert!(!store.remove(&point(0.0, 0.0)).unwrap());
    assert!(recorder.take().is_empty());
    assert_eq!(store.len(), 1);
}

#[test]
fn test_remove_then_re_add() {
    let (store, recorder) = planar_store(SpatialIndexKind::Null);
    let a = point(0.0, 0.0);
    store.add(a.clone()).unwrap();
    assert!(store.remove(&a).unwrap());
    assert!(!a.is_attached());

    store.add(a.clone()).unwrap();
    assert_eq!(a.id(), Some(1));
    assert_eq!(
        recorder.take(),
        vec![
            Event::Added(vec![0]),
            Event::Removed(vec![0]),
            Event::Added(vec![1]),
        ]
    );
}

#[test]
fn test_features_belong_to_one_store() {
    let (first, _) = planar_store(SpatialIndexKind::Null);
    let (second, recorder) = planar_store(SpatialIndexKind::Null);
    let a = point(0.0, 0.0);
    first.add(a.clone()).unwrap();

    assert!(matches!(second.add(a.clone()), Err(MapError::InvalidArgument(_))));
    assert!(matches!(second.remove(&a), Err(MapError::InvalidArgument(_))));
    assert!(matches!(
        second.set_all(&[a.clone()]),
        Err(MapError::InvalidArgument(_))
    ));
    assert!(second.is_empty());
    assert!(recorder.take().is_empty());
}

#[test]
fn test_add_all_is_all_or_nothing() {
    let (store, recorder) = planar_store(SpatialIndexKind::Null);
    let a = point(0.0, 0.0);
    store.add(a.clone()).unwrap();
    recorder.take();

    let b = point(1.0, 0.0);
    assert!(store.add_all(&[b.clone(), a.clone()]).is_err());
    assert!(!b.is_attached());
    assert_eq!(store.len(), 1);
    assert!(recorder.take().is_empty());
}

#[test]
fn test_remove_many_reports_partial_removal() {
    let (store, recorder) = planar_store(SpatialIndexKind::KdTree);
    let a = point(0.0, 0.0);
    let b = point(1.0, 0.0);
    store.add_all(&[a.clone(), b.clone()]).unwrap();
    recorder.take();

    assert!(!store.remove_many(&[a.clone(), point(5.0, 5.0)]).unwrap());
    assert_eq!(recorder.take(), vec![Event::Removed(vec![0])]);

    assert_eq!(store.remove_all(), vec![b]);
    assert_eq!(recorder.take(), vec![Event::Removed(vec![1])]);
    assert!(store.remove_all().is_empty());
    assert!(recorder.take().is_empty());
}

#[test]
fn test_update_moves_feature_in_index() {
    let (store, recorder) = planar_store(SpatialIndexKind::KdTree);
    let a = point(0.0, 0.0);
    store.add_all(&[a.clone(), point(100.0, 100.0), point(-100.0, 50.0)]).unwrap();
    recorder.take();

    assert!(store
        .update(&a, |state| state.geometry = FeatureGeometry::point(500.0, 500.0))
        .unwrap());
    assert_eq!(recorder.take(), vec![Event::Changed(0)]);

    let near_origin = MapBounds::new(MapPos::new(-1.0, -1.0), MapPos::new(1.0, 1.0));
    assert!(store.query_bounds(&near_origin).is_empty());
    let near_target = MapBounds::new(MapPos::new(499.0, 499.0), MapPos::new(501.0, 501.0));
    assert_eq!(store.query_bounds(&near_target), vec![a]);

    assert!(!store.update(&point(0.0, 0.0), |_| {}).unwrap());
}

#[test]
fn test_listener_may_reenter_store() {
    struct Echo {
        store: Weak<FeatureStore>,
    }

    impl FeatureListener for Echo {
        fn on_features_added(&self, features: &[FeatureRef]) {
            let Some(store) = self.store.upgrade() else {
                return;
            };
            if features.len() == 1 && features[0].id() == Some(0) {
                store.add(point(9.0, 9.0)).unwrap();
            }
        }
    }

    init_logging();
    let store = Arc::new(FeatureStore::builder().build().unwrap());
    let id = store.register_listener(Arc::new(Echo {
        store: Arc::downgrade(&store),
    }));

    store.add(point(0.0, 0.0)).unwrap();
    assert_eq!(store.len(), 2);
    assert!(store.unregister_listener(id));
    assert_eq!(Arc::strong_count(&store), 1);
}

#[test]
fn test_data_extent_in_map_coordinates() {
    init_logging();
    let store = FeatureStore::builder()
        .projection(Arc::new(WebMercatorProjection::new()))
        .index_kind(SpatialIndexKind::KdTree)
        .build()
        .unwrap();
    store
        .add_all(&[point(-10.0, -5.0), point(20.0, 40.0), point(3.0, 1.0)])
        .unwrap();

    let extent = store.data_extent();
    assert!((extent.min.x + 10.0).abs() < 1e-9);
    assert!((extent.min.y + 5.0).abs() < 1e-9);
    assert!((extent.max.x - 20.0).abs() < 1e-9);
    assert!((extent.max.y - 40.0).abs() < 1e-9);
}

#[test]
fn test_query_visible_culls_and_simplifies() {
    let (store, recorder) = planar_store(SpatialIndexKind::KdTree);
    let wiggly = Feature::new(FeatureGeometry::Line(
        (0..=100)
            .map(|i| {
                let x = f64::from(i);
                (x, if i % 2 == 0 { 0.0 } else { 0.01 })
            })
            .collect(),
    ))
    .with_metadata("kind", "road")
    .into_ref();
    let far = point(10_000.0, 10_000.0);
    let near = point(50.0, 10.0);
    store.add_all(&[wiggly.clone(), far.clone(), near.clone()]).unwrap();

    let bounds = MapBounds::new(MapPos::new(-10.0, -50.0), MapPos::new(110.0, 50.0));
    let view = ViewState::for_bounds(&bounds, 120.0, 10.0);

    let visible = store.query_visible(&view);
    assert_eq!(visible.len(), 2);
    assert!(visible.contains(&wiggly));
    assert!(visible.contains(&near));

    store.set_simplifier(Some(Arc::new(DouglasPeuckerSimplifier::new(1.0))));
    assert_eq!(recorder.take().last(), Some(&Event::AllChanged));

    let visible = store.query_visible(&view);
    let line = visible
        .iter()
        .find(|f| matches!(f.geometry(), FeatureGeometry::Line(_)))
        .unwrap();
    assert!(!Arc::ptr_eq(line, &wiggly));
    assert_eq!(line.id(), wiggly.id());
    assert_eq!(line.metadata_value("kind"), wiggly.metadata_value("kind"));
    match line.geometry() {
        FeatureGeometry::Line(simplified) => assert!(simplified.0.len() < 10),
        _ => unreachable!(),
    }
    assert!(visible.iter().any(|f| Arc::ptr_eq(f, &near)));
    assert_eq!(store.len(), 3);
}

#[test]
fn test_null_index_returns_everything() {
    init_logging();
    let store =
        FeatureStore::with_index(Arc::new(PlanarProjection::new()), SpatialIndexKind::Null);
    store.add_all(&[point(0.0, 0.0), point(1e6, 1e6)]).unwrap();

    let bounds = MapBounds::new(MapPos::new(-1.0, -1.0), MapPos::new(1.0, 1.0));
    let view = ViewState::for_bounds(&bounds, 100.0, 5.0);
    assert_eq!(store.query_visible(&view).len(), 2);
}

#[cfg(feature = "geojson")]
#[test]
fn test_geojson_round_trip_through_store() {
    init_logging();
    let store = FeatureStore::builder().build().unwrap();
    let added = store
        .add_geojson(
            r#"{
                "type": "FeatureCollection",
                "features": [
                    { "type": "Feature", "geometry": { "type": "Point", "coordinates": [1.0, 2.0] },
                      "properties": { "name": "a" } },
                    { "type": "Feature", "geometry": { "type": "Point", "coordinates": [3.0, 4.0] },
                      "properties": { "name": "b" } }
                ]
            }"#,
        )
        .unwrap();
    assert_eq!(added.len(), 2);
    assert_eq!(store.len(), 2);

    let exported = store.to_geojson().unwrap();
    let reparsed = mapcluster::geojson::parse_feature_collection(&exported).unwrap();
    let mut names: Vec<String> = reparsed
        .iter()
        .filter_map(|f| f.metadata_value("name"))
        .filter_map(|v| v.as_str().map(str::to_string))
        .collect();
    names.sort();
    assert_eq!(names, vec!["a", "b"]);
}
