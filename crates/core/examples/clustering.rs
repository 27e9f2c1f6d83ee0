use mapcluster::prelude::*;
use std::sync::Arc;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging (set RUST_LOG=debug to see tree rebuilds)
    env_logger::init();

    println!("=== mapcluster - Clustering ===\n");

    // Store in lon/lat, indexed for frustum culling
    let store = Arc::new(
        FeatureStore::builder()
            .projection(Arc::new(WebMercatorProjection::new()))
            .index_kind(SpatialIndexKind::KdTree)
            .build()?,
    );

    // === LOADING FEATURES ===
    println!("1. Loading cafes");
    println!("----------------");

    let cafes = [
        ("Kohvik Komeet", 24.7453, 59.4370),
        ("Rost", 24.7489, 59.4341),
        ("Gourmet Coffee", 24.7432, 59.4375),
        ("Fotografiska", 24.7367, 59.4402),
        ("Renard", 24.7510, 59.4366),
        ("Kalamaja Kohvik", 24.7325, 59.4462),
        ("Pirita Cafe", 24.8353, 59.4681),
    ];
    let features: Vec<FeatureRef> = cafes
        .iter()
        .map(|&(name, lon, lat)| {
            Feature::new(FeatureGeometry::point(lon, lat))
                .with_metadata("name", name)
                .into_ref()
        })
        .collect();
    store.add_all(&features)?;
    println!("   Added {} features\n", store.len());

    let engine = ClusterEngine::new(
        store.clone(),
        Arc::new(CountingElementBuilder),
        ClusterConfig::default().with_min_cluster_distance(60.0),
    )?;

    // === ZOOMING IN ===
    println!("2. Zooming in");
    println!("-------------");

    let projection = store.projection().clone();
    let center = projection.to_internal(&MapPos::new(24.76, 59.44));
    for (zoom, half_width) in [(10.0, 20_000.0), (13.0, 2_500.0), (16.0, 300.0)] {
        let view_bounds = MapBounds::new(
            center - MapPos::new(half_width, half_width),
            center + MapPos::new(half_width, half_width),
        );
        let view = ViewState::for_bounds(&view_bounds, 1024.0, zoom);

        // Step until the split animation settles
        let mut frames = 0;
        let selection = loop {
            let selection = engine.select_visible(&view, 1.0 / 60.0);
            frames += 1;
            if !selection.animating || frames >= 600 {
                break selection;
            }
        };

        println!(
            "   zoom {:>4}: {} markers after {} frames",
            zoom,
            selection.elements.len(),
            frames
        );
        for element in &selection.elements {
            let pos = element.point_pos().unwrap_or_default();
            match element.metadata_value("count") {
                Some(count) => println!("      cluster of {} at ({:.4}, {:.4})", count, pos.x, pos.y),
                None => println!(
                    "      {} at ({:.4}, {:.4})",
                    element.metadata_value("name").unwrap_or_default(),
                    pos.x,
                    pos.y
                ),
            }
        }
    }
    println!();

    // === EXPANDING A CLUSTER ===
    println!("3. Expanding a cluster");
    println!("----------------------");

    let wide = MapBounds::new(
        center - MapPos::new(20_000.0, 20_000.0),
        center + MapPos::new(20_000.0, 20_000.0),
    );
    let view = ViewState::for_bounds(&wide, 1024.0, 10.0);
    let selection = engine.select_visible(&view, 1.0 / 60.0);
    if let Some(cluster) = selection
        .elements
        .iter()
        .find(|element| element.metadata_value("count").is_some())
    {
        engine.expand_cluster(cluster, 80.0);
        let mut selection = engine.select_visible(&view, 1.0 / 60.0);
        while selection.animating {
            selection = engine.select_visible(&view, 1.0 / 60.0);
        }
        println!("   Expanded into {} markers", selection.elements.len());
    }

    // === REMOVING FEATURES ===
    println!("\n4. Removing features");
    println!("--------------------");

    store.remove(&features[6])?;
    let selection = engine.select_visible(&view, 1.0 / 60.0);
    println!(
        "   {} leaves in the tree, {} markers shown",
        engine.leaf_count(),
        selection.elements.len()
    );

    println!("\n=== Done ===");
    Ok(())
}
