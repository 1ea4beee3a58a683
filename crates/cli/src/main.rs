//! settlemap CLI - settlement mapping from multispectral imagery

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, info, Level};
use tracing_subscriber::FmtSubscriber;

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
use settlemap_core::display::{DisplayParams, MapView};
use settlemap_core::io::{read_raster, write_raster, ExportOptions};
use settlemap_core::raster::{MultibandRaster, Raster};
use settlemap_core::region::{LabeledRegion, RegionRecord};

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "settlemap")]
#[command(author, version, about = "Settlement mapping from multispectral imagery", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Median-composite overlapping tiles into a seamless mosaic
    Composite {
        /// Band names, comma separated (e.g. "b1,b4")
        #[arg(long)]
        bands: String,
        /// One tile per flag: comma-separated band files in `--bands` order
        #[arg(long = "tile", required = true)]
        tiles: Vec<String>,
        /// Directory for per-band composite output
        #[arg(short, long)]
        out_dir: PathBuf,
    },
    /// Derive spectral and texture bands from a composite
    Features {
        /// Input band as name=path, repeated
        #[arg(long = "band", required = true)]
        bands: Vec<String>,
        /// Bands for the normalized difference, "a,b" (index = (a-b)/(a+b))
        #[arg(long, default_value = "b4,b1")]
        nd_bands: String,
        /// Band to compute texture dissimilarity on
        #[arg(long, default_value = "b1")]
        texture_band: String,
        /// GLCM window radius in pixels
        #[arg(short, long, default_value = "5")]
        radius: usize,
        /// GLCM quantization levels
        #[arg(long, default_value = "32")]
        levels: usize,
        /// Auxiliary scene band as name=path, repeated (enables the
        /// cross-source built-up index)
        #[arg(long = "aux")]
        aux: Vec<String>,
        /// Bands of the cross-source index, "a,b"
        #[arg(long, default_value = "B12,B8")]
        aux_index: String,
        /// Acquisition date of the auxiliary scene (ISO 8601)
        #[arg(long, default_value = "2018-06-08")]
        aux_date: String,
        /// Cloud cover percentage of the auxiliary scene
        #[arg(long, default_value = "0.0")]
        aux_cloud: f64,
        /// Start of the auxiliary acquisition window (ISO 8601)
        #[arg(long, default_value = "2018-06-04")]
        start_date: String,
        /// End of the auxiliary acquisition window (ISO 8601)
        #[arg(long, default_value = "2018-06-12")]
        end_date: String,
        /// Directory for per-band feature output
        #[arg(short, long)]
        out_dir: PathBuf,
    },
    /// Per-class band statistics over labeled regions
    Separability {
        /// Input band as name=path, repeated
        #[arg(long = "band", required = true)]
        bands: Vec<String>,
        /// Labeled regions file (JSON)
        #[arg(long)]
        regions: PathBuf,
        /// Sampling resolution in map units
        #[arg(short, long, default_value = "3.0")]
        scale: f64,
        /// Emit the report as JSON instead of tables
        #[arg(long)]
        json: bool,
    },
    /// Train a random forest on labeled regions and classify every pixel
    Classify {
        /// Input band as name=path, repeated
        #[arg(long = "band", required = true)]
        bands: Vec<String>,
        /// Labeled regions file (JSON)
        #[arg(long)]
        regions: PathBuf,
        /// Output file (class labels)
        output: PathBuf,
        /// Sampling resolution in map units
        #[arg(short, long, default_value = "3.0")]
        scale: f64,
        /// Number of trees in the forest
        #[arg(short, long, default_value = "5")]
        trees: usize,
        /// Maximum tree depth
        #[arg(long, default_value = "16")]
        depth: usize,
        /// Random seed
        #[arg(long, default_value = "42")]
        seed: u64,
        /// Refuse outputs larger than this many pixels
        #[arg(long)]
        max_pixels: Option<u64>,
    },
    /// Smooth, threshold and sieve a classification into a binary mask
    Clean {
        /// Input classification raster
        input: PathBuf,
        /// Output mask file (1 = settlement, 0 = background)
        output: PathBuf,
        /// Class label to isolate
        #[arg(long, default_value = "0.0")]
        target_class: f64,
        /// Radius of the circular smoothing kernel
        #[arg(long, default_value = "7")]
        smooth_radius: usize,
        /// Occupancy threshold on the smoothed raster
        #[arg(long, default_value = "0.25")]
        threshold: f64,
        /// Minimum connected-component size in pixels
        #[arg(long, default_value = "100")]
        min_patch: usize,
        /// Component connectivity: four, eight
        #[arg(long, default_value = "eight")]
        connectivity: String,
        /// Refuse outputs larger than this many pixels
        #[arg(long)]
        max_pixels: Option<u64>,
    },
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");
}

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap(),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

fn tile_bar(len: usize) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{bar:40.green/white} {pos}/{len} {msg}")
            .unwrap(),
    );
    pb
}

/// Parse a "name=path" band argument.
fn parse_band_spec(spec: &str) -> Result<(String, PathBuf)> {
    let (name, path) = spec
        .split_once('=')
        .with_context(|| format!("Band must be name=path, got: {}", spec))?;
    Ok((name.trim().to_string(), PathBuf::from(path.trim())))
}

/// Load `name=path` band specs into a multiband image.
fn load_stack(specs: &[String]) -> Result<MultibandRaster> {
    let mut names = Vec::with_capacity(specs.len());
    let mut bands = Vec::with_capacity(specs.len());
    for spec in specs {
        let (name, path) = parse_band_spec(spec)?;
        let band = read_raster(&path)
            .with_context(|| format!("Failed to read band {} from {}", name, path.display()))?;
        debug!("Loaded {}: {} x {}", name, band.cols(), band.rows());
        names.push(name);
        bands.push(band);
    }
    let image = MultibandRaster::from_bands(bands, names).context("Inconsistent band stack")?;
    info!(
        "Input: {} bands, {} x {}",
        image.band_count(),
        image.shape().1,
        image.shape().0
    );
    Ok(image)
}

fn load_regions(path: &PathBuf) -> Result<Vec<LabeledRegion>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open regions file {}", path.display()))?;
    let records: Vec<RegionRecord> =
        serde_json::from_reader(std::io::BufReader::new(file)).context("Invalid regions file")?;
    info!("Loaded {} labeled regions", records.len());
    Ok(records.into_iter().map(LabeledRegion::from).collect())
}

fn write_result(raster: &Raster<f64>, path: &PathBuf, max_pixels: Option<u64>) -> Result<()> {
    let pb = spinner("Writing output...");
    write_raster(path, raster, &ExportOptions { max_pixels })
        .context("Failed to write output")?;
    pb.finish_and_clear();
    Ok(())
}

fn write_stack(image: &MultibandRaster, out_dir: &PathBuf) -> Result<()> {
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("Failed to create {}", out_dir.display()))?;
    for name in image.band_names() {
        let path = out_dir.join(format!("{}.tif", name));
        write_raster(&path, image.band(name)?, &ExportOptions::default())
            .with_context(|| format!("Failed to write band {}", name))?;
        info!("Wrote {}", path.display());
    }
    Ok(())
}

fn done(name: &str, path: &PathBuf, elapsed: std::time::Duration) {
    println!("{} saved to: {}", name, path.display());
    println!("  Processing time: {:.2?}", elapsed);
}

fn parse_name_pair(s: &str, flag: &str) -> Result<(String, String)> {
    let parts: Vec<&str> = s.split(',').map(str::trim).collect();
    if parts.len() != 2 {
        anyhow::bail!("{} must be two band names 'a,b', got: {}", flag, s);
    }
    Ok((parts[0].to_string(), parts[1].to_string()))
}

fn parse_connectivity(s: &str) -> Result<Connectivity> {
    match s.to_lowercase().as_str() {
        "four" | "4" => Ok(Connectivity::Four),
        "eight" | "8" => Ok(Connectivity::Eight),
        _ => anyhow::bail!("Unknown connectivity: {}. Use four or eight.", s),
    }
}

/// Catalog over a single scene supplied on the command line.
struct FileCatalog {
    scene_bands: Vec<String>,
    acquired: String,
    cloud_cover: f64,
}

impl SceneCatalog for FileCatalog {
    fn scenes(&self, query: &SceneQuery) -> settlemap_core::Result<Vec<Scene>> {
        if !query.contains_date(&self.acquired) {
            return Ok(Vec::new());
        }
        let mut names = Vec::with_capacity(self.scene_bands.len());
        let mut bands = Vec::with_capacity(self.scene_bands.len());
        for spec in &self.scene_bands {
            let (name, path) = parse_band_spec(spec)
                .map_err(|e| settlemap_core::Error::Other(e.to_string()))?;
            bands.push(read_raster(&path)?);
            names.push(name);
        }
        Ok(vec![Scene {
            image: MultibandRaster::from_bands(bands, names)?,
            acquired: self.acquired.clone(),
            cloud_cover: self.cloud_cover,
        }])
    }
}

/// Map sink that only logs what would be displayed.
struct LogMapView;

impl MapView for LogMapView {
    fn add_layer(
        &mut self,
        name: &str,
        image: &MultibandRaster,
        params: &DisplayParams,
    ) -> settlemap_core::Result<()> {
        let (rows, cols) = image.shape();
        info!(
            "Layer '{}': {} x {}, stretch [{}, {}], {} palette entries",
            name,
            cols,
            rows,
            params.min,
            params.max,
            params.palette.len()
        );
        Ok(())
    }
}

fn single_band_layer(name: &str, band: &Raster<f64>) -> Result<MultibandRaster> {
    MultibandRaster::from_bands(vec![band.clone()], vec![name.to_string()])
        .context("Failed to build display layer")
}

// ─── Main ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match cli.command {
        // ── Composite ────────────────────────────────────────────────
        Commands::Composite {
            bands,
            tiles,
            out_dir,
        } => {
            let names: Vec<String> = bands.split(',').map(|s| s.trim().to_string()).collect();
            let pb = tile_bar(tiles.len());
            pb.set_message("Loading tiles");
            let mut stacks = Vec::with_capacity(tiles.len());
            for tile in &tiles {
                let paths: Vec<&str> = tile.split(',').map(str::trim).collect();
                if paths.len() != names.len() {
                    anyhow::bail!(
                        "Tile has {} files but {} band names were given",
                        paths.len(),
                        names.len()
                    );
                }
                let mut tile_bands = Vec::with_capacity(paths.len());
                for path in &paths {
                    tile_bands.push(
                        read_raster(path)
                            .with_context(|| format!("Failed to read tile band {}", path))?,
                    );
                }
                stacks.push(
                    MultibandRaster::from_bands(tile_bands, names.clone())
                        .context("Inconsistent tile")?,
                );
                pb.inc(1);
            }
            pb.finish_and_clear();
            info!("Compositing {} tiles", stacks.len());

            let start = Instant::now();
            let composite = median_composite(&stacks).context("Failed to composite tiles")?;
            let elapsed = start.elapsed();
            write_stack(&composite, &out_dir)?;
            done("Composite", &out_dir, elapsed);
        }

        // ── Features ─────────────────────────────────────────────────
        Commands::Features {
            bands,
            nd_bands,
            texture_band,
            radius,
            levels,
            aux,
            aux_index,
            aux_date,
            aux_cloud,
            start_date,
            end_date,
            out_dir,
        } => {
            let image = load_stack(&bands)?;
            let (nd_a, nd_b) = parse_name_pair(&nd_bands, "--nd-bands")?;
            let params = FeatureParams {
                nd_band_a: nd_a,
                nd_band_b: nd_b,
                texture_band,
                glcm: GlcmParams {
                    radius,
                    n_levels: levels,
                    ..Default::default()
                },
                ..Default::default()
            };

            let start = Instant::now();
            let features = if aux.is_empty() {
                extract_features(&image, &params, None).context("Failed to derive bands")?
            } else {
                let (aux_a, aux_b) = parse_name_pair(&aux_index, "--aux-index")?;
                let catalog = FileCatalog {
                    scene_bands: aux,
                    acquired: aux_date,
                    cloud_cover: aux_cloud,
                };
                let index = CrossSourceIndex {
                    band_a: aux_a,
                    band_b: aux_b,
                    name: "ndbi".to_string(),
                    query: SceneQuery {
                        bounds: image.bounds(),
                        start_date,
                        end_date,
                    },
                };
                extract_features(&image, &params, Some((&catalog, &index)))
                    .context("Failed to derive bands")?
            };
            let elapsed = start.elapsed();

            write_stack(&features, &out_dir)?;
            done("Features", &out_dir, elapsed);
        }

        // ── Separability ─────────────────────────────────────────────
        Commands::Separability {
            bands,
            regions,
            scale,
            json,
        } => {
            let image = load_stack(&bands)?;
            let regions = load_regions(&regions)?;
            let report =
                summarize(&image, &regions, scale).context("Failed to summarize regions")?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{}", report);
            }
        }

        // ── Classify ─────────────────────────────────────────────────
        Commands::Classify {
            bands,
            regions,
            output,
            scale,
            trees,
            depth,
            seed,
            max_pixels,
        } => {
            let image = load_stack(&bands)?;
            let regions = load_regions(&regions)?;

            let start = Instant::now();
            let samples =
                build_sample_set(&image, &regions, scale).context("Failed to sample regions")?;
            info!(
                "Training on {} samples across {} classes",
                samples.len(),
                samples.class_labels().len()
            );

            let mut forest = RandomForest::new(RandomForestParams {
                n_trees: trees,
                max_depth: depth,
                seed,
                ..Default::default()
            });
            forest.fit(&samples).context("Failed to train classifier")?;

            let pb = spinner("Classifying...");
            let classified = classify(&image, &forest).context("Failed to classify image")?;
            pb.finish_and_clear();
            let elapsed = start.elapsed();

            write_result(&classified, &output, max_pixels)?;

            let mut map = LogMapView;
            map.add_layer(
                "classification",
                &single_band_layer("classification", &classified)?,
                &DisplayParams {
                    min: 0.0,
                    max: (samples.class_labels().len().saturating_sub(1)) as f64,
                    palette: vec![
                        "grey".into(),
                        "yellow".into(),
                        "brown".into(),
                        "blue".into(),
                        "green".into(),
                        "darkgreen".into(),
                        "black".into(),
                    ],
                    ..Default::default()
                },
            )?;
            done("Classification", &output, elapsed);
        }

        // ── Clean ────────────────────────────────────────────────────
        Commands::Clean {
            input,
            output,
            target_class,
            smooth_radius,
            threshold,
            min_patch,
            connectivity,
            max_pixels,
        } => {
            let pb = spinner("Reading raster...");
            let classified = read_raster(&input).context("Failed to read classification")?;
            pb.finish_and_clear();

            let params = CleanParams {
                smooth_radius,
                target_class,
                occupancy_threshold: threshold,
                component_min_size: min_patch,
                connectivity: parse_connectivity(&connectivity)?,
            };

            let start = Instant::now();
            let mask = clean(&classified, &params).context("Failed to clean classification")?;
            let elapsed = start.elapsed();

            let (rows, cols) = (mask.rows(), mask.cols());
            let mut out: Raster<f64> = mask.with_same_meta(rows, cols);
            let mut retained = 0usize;
            for ((row, col), &v) in mask.data().indexed_iter() {
                if v == 1 {
                    retained += 1;
                }
                out.data_mut()[[row, col]] = v as f64;
            }
            info!(
                "Retained {} settlement pixels ({:.1}%)",
                retained,
                100.0 * retained as f64 / mask.len() as f64
            );

            write_result(&out, &output, max_pixels)?;

            let mut map = LogMapView;
            map.add_layer(
                "villages",
                &single_band_layer("villages", &out)?,
                &DisplayParams {
                    min: 0.0,
                    max: 1.0,
                    palette: vec!["black".into(), "red".into()],
                    ..Default::default()
                },
            )?;
            done("Mask", &output, elapsed);
        }
    }

    Ok(())
}
