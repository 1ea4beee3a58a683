//! End-to-end pipeline tests on synthetic imagery.
//!
//! A 24x24 scene with a textured "settlement" block in a smooth
//! "forest" matrix is pushed through the whole chain: median composite,
//! derived bands, separability diagnostics, random-forest
//! classification and mask cleanup.

use geo_types::Polygon;
use settlemap_algorithms::classification::{
    build_sample_set, classify, PixelClassifier, RandomForest, RandomForestParams,
};
use settlemap_algorithms::composite::median_composite;
use settlemap_algorithms::imagery::{
    extract_features, CrossSourceIndex, FeatureParams, Scene, SceneCatalog, SceneQuery,
};
use settlemap_algorithms::postprocess::{clean, CleanParams, Connectivity};
use settlemap_algorithms::separability::summarize;
use settlemap_algorithms::texture::GlcmParams;
use settlemap_core::raster::{GeoTransform, MultibandRaster, Raster};
use settlemap_core::region::LabeledRegion;
use settlemap_core::Result;

const SIZE: usize = 24;
const VILLAGE: i32 = 0;
const FOREST: i32 = 6;

fn square(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Polygon<f64> {
    Polygon::new(
        vec![
            (min_x, min_y),
            (max_x, min_y),
            (max_x, max_y),
            (min_x, max_y),
            (min_x, min_y),
        ]
        .into(),
        vec![],
    )
}

fn in_village(row: usize, col: usize) -> bool {
    (4..12).contains(&row) && (4..12).contains(&col)
}

/// One synthetic tile; `offset` separates the two overlapping
/// acquisitions so the composite is distinguishable from either.
fn make_tile(offset: f64) -> MultibandRaster {
    let gt = GeoTransform::new(0.0, 0.0, 1.0, -1.0);
    let mut b1 = Raster::new(SIZE, SIZE);
    let mut b4 = Raster::new(SIZE, SIZE);
    b1.set_transform(gt);
    b4.set_transform(gt);

    for row in 0..SIZE {
        for col in 0..SIZE {
            let (blue, nir) = if in_village(row, col) {
                // Bright, rough fabric: checkerboard texture, low NIR
                let texture = ((row + col) % 2) as f64 * 400.0;
                (1000.0 + texture, 800.0)
            } else {
                // Dark, smooth canopy: high NIR
                (400.0, 2000.0)
            };
            b1.set(row, col, blue + offset).unwrap();
            b4.set(row, col, nir + offset).unwrap();
        }
    }

    MultibandRaster::from_bands(vec![b1, b4], vec!["b1".into(), "b4".into()]).unwrap()
}

fn training_regions() -> Vec<LabeledRegion> {
    vec![
        LabeledRegion::new("villages", VILLAGE, square(5.0, -10.0, 10.0, -5.0)),
        LabeledRegion::new("forest", FOREST, square(14.0, -21.0, 21.0, -14.0)),
    ]
}

struct OneSceneCatalog;

impl SceneCatalog for OneSceneCatalog {
    fn scenes(&self, _query: &SceneQuery) -> Result<Vec<Scene>> {
        let gt = GeoTransform::new(0.0, 0.0, 1.0, -1.0);
        let mut b12 = Raster::filled(SIZE, SIZE, 500.0);
        let mut b8 = Raster::filled(SIZE, SIZE, 1500.0);
        b12.set_transform(gt);
        b8.set_transform(gt);
        Ok(vec![Scene {
            image: MultibandRaster::from_bands(
                vec![b12, b8],
                vec!["B12".into(), "B8".into()],
            )
            .unwrap(),
            acquired: "2018-06-08".to_string(),
            cloud_cover: 3.5,
        }])
    }
}

fn feature_params() -> FeatureParams {
    FeatureParams {
        glcm: GlcmParams {
            radius: 2,
            n_levels: 16,
            distance: 1,
        },
        ..Default::default()
    }
}

fn cross_index() -> CrossSourceIndex {
    CrossSourceIndex {
        band_a: "B12".into(),
        band_b: "B8".into(),
        name: "ndbi".into(),
        query: SceneQuery {
            bounds: (0.0, -(SIZE as f64), SIZE as f64, 0.0),
            start_date: "2018-06-04".into(),
            end_date: "2018-06-12".into(),
        },
    }
}

fn build_features() -> MultibandRaster {
    let tiles = vec![make_tile(0.0), make_tile(10.0)];
    let composite = median_composite(&tiles).unwrap();
    extract_features(&composite, &feature_params(), Some((&OneSceneCatalog, &cross_index())))
        .unwrap()
}

#[test]
fn composite_averages_the_even_tile_pair() {
    let tiles = vec![make_tile(0.0), make_tile(10.0)];
    let composite = median_composite(&tiles).unwrap();
    // Forest b1 is 400 and 410 in the two tiles; even-count median is 405
    assert_eq!(composite.band("b1").unwrap().get(20, 20).unwrap(), 405.0);
}

#[test]
fn features_carry_the_expected_band_layout() {
    let features = build_features();
    assert_eq!(features.band_names(), &["b1", "b4", "ndvi", "ndbi", "diss"]);

    // NDVI contrast between covers
    let ndvi = features.band("ndvi").unwrap();
    assert!(ndvi.get(8, 8).unwrap() < 0.0, "settlement NDVI negative");
    assert!(ndvi.get(20, 20).unwrap() > 0.5, "canopy NDVI high");

    // Texture contrast between covers
    let diss = features.band("diss").unwrap();
    assert!(
        diss.get(8, 8).unwrap() > diss.get(20, 20).unwrap(),
        "settlement fabric rougher than canopy"
    );
}

#[test]
fn separability_report_covers_all_regions_and_bands() {
    let features = build_features();
    let report = summarize(&features, &training_regions(), 1.0).unwrap();

    assert_eq!(report.regions.len(), 2);
    assert_eq!(report.bands.len(), 5);

    let villages = &report.regions[0];
    let forest = &report.regions[1];
    assert!(villages.pixel_count[0] > 0);
    // The means actually separate on NDVI
    let ndvi_idx = 2;
    assert!(villages.mean[ndvi_idx] < forest.mean[ndvi_idx]);
}

#[test]
fn classifier_recovers_the_settlement_block() {
    let features = build_features();
    let samples = build_sample_set(&features, &training_regions(), 1.0).unwrap();
    assert_eq!(samples.class_labels(), vec![VILLAGE, FOREST]);

    let mut forest = RandomForest::new(RandomForestParams {
        seed: 7,
        ..Default::default()
    });
    forest.fit(&samples).unwrap();
    let classified = classify(&features, &forest).unwrap();

    // Sample well inside each cover; GLCM edge effects stay clear
    assert_eq!(classified.get(8, 8).unwrap(), VILLAGE as f64);
    assert_eq!(classified.get(7, 9).unwrap(), VILLAGE as f64);
    assert_eq!(classified.get(18, 18).unwrap(), FOREST as f64);
    assert_eq!(classified.get(20, 6).unwrap(), FOREST as f64);
}

#[test]
fn fixed_seed_makes_the_whole_run_reproducible() {
    let features = build_features();
    let samples = build_sample_set(&features, &training_regions(), 1.0).unwrap();

    let run = |seed: u64| {
        let mut model = RandomForest::new(RandomForestParams {
            n_trees: 5,
            seed,
            ..Default::default()
        });
        model.fit(&samples).unwrap();
        classify(&features, &model).unwrap()
    };

    let a = run(99);
    let b = run(99);
    for row in 0..SIZE {
        for col in 0..SIZE {
            let (x, y) = (a.get(row, col).unwrap(), b.get(row, col).unwrap());
            assert!(
                x == y || (x.is_nan() && y.is_nan()),
                "prediction diverged at ({}, {})",
                row,
                col
            );
        }
    }
}

#[test]
fn end_to_end_mask_isolates_the_settlement() {
    let features = build_features();
    let samples = build_sample_set(&features, &training_regions(), 1.0).unwrap();

    let mut model = RandomForest::new(RandomForestParams {
        seed: 7,
        ..Default::default()
    });
    model.fit(&samples).unwrap();
    let classified = classify(&features, &model).unwrap();

    let params = CleanParams {
        smooth_radius: 2,
        target_class: VILLAGE as f64,
        occupancy_threshold: 0.25,
        component_min_size: 5,
        connectivity: Connectivity::Eight,
    };
    let mask = clean(&classified, &params).unwrap();

    // Settlement core retained
    assert_eq!(mask.get(8, 8).unwrap(), 1);
    // Far corners clear
    assert_eq!(mask.get(1, 1).unwrap(), 0);
    assert_eq!(mask.get(22, 22).unwrap(), 0);

    // Every retained pixel lies in or immediately around the block
    for row in 0..SIZE {
        for col in 0..SIZE {
            if mask.get(row, col).unwrap() == 1 {
                assert!(
                    (2..14).contains(&row) && (2..14).contains(&col),
                    "stray mask pixel at ({}, {})",
                    row,
                    col
                );
            }
        }
    }
}
