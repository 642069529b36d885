use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use serde::Serialize;

#[allow(unused_imports)]
use log::{debug, error, info, warn};

use coco_index::build_info::BuildInfo;
use coco_index::coco::{self, AnnotationDocument, AnnotationIndex, Detections, ShapeStats};
use coco_index::logging;
use coco_index::settings::UserSettings;
use coco_index::{CocoError, Config, Result};

const APP_NAME: &str = "coco-index";

#[derive(Parser)]
#[command(
    name = "coco-index",
    version,
    about = "Inspect COCO annotation files and convert annotations to detections",
    after_help = "EXAMPLES:\n  \
                  coco-index summary test/_annotations.coco.json\n  \
                  coco-index detections test/_annotations.coco.json --file-name scan_0.jpg --class-offset -1\n  \
                  coco-index shapes test/_annotations.coco.json --file-name scan_0.jpg --epsilon 2.0\n  \
                  coco-index sam masks.json --largest"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Settings file to use instead of the per-user one
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Counts, class names and validation warnings
    Summary { json: PathBuf },

    /// Print the image record with this file name
    Image { json: PathBuf, file_name: String },

    /// Print the annotations of one image
    Annotations {
        json: PathBuf,
        #[command(flatten)]
        image: ImageSelector,
    },

    /// Convert the annotations of one image to xyxy detections
    Detections {
        json: PathBuf,
        #[command(flatten)]
        image: ImageSelector,
        /// Added to every class id (overrides the settings file)
        #[arg(long, allow_hyphen_values = true)]
        class_offset: Option<i64>,
    },

    /// Decode segmentations of one image and report contour shapes
    Shapes {
        json: PathBuf,
        #[command(flatten)]
        image: ImageSelector,
        /// Contour simplification tolerance in pixels (overrides the settings file)
        #[arg(long)]
        epsilon: Option<f32>,
    },

    /// Convert automatic mask generator output to detections
    Sam {
        json: PathBuf,
        /// Keep only the mask(s) with the largest area
        #[arg(long)]
        largest: bool,
    },

    /// Manage the settings file
    #[command(subcommand)]
    Settings(SettingsCommand),

    /// Show version and build information
    Version,
}

#[derive(Subcommand)]
enum SettingsCommand {
    /// Write the settings file, keeping comments if it already exists
    Init,
    /// Print the settings file location
    Path,
}

#[derive(Args)]
#[group(required = true, multiple = false)]
struct ImageSelector {
    /// Exact file name of the image
    #[arg(long)]
    file_name: Option<String>,

    /// Numeric image id
    #[arg(long)]
    image_id: Option<u64>,
}

#[derive(Serialize)]
struct Summary<'a> {
    #[serde(flatten)]
    stats: coco::DocumentStats,
    classes: Vec<String>,
    warnings: &'a [String],
}

#[derive(Serialize)]
struct DetectionsOutput<'a> {
    image_id: u64,
    file_name: &'a str,
    #[serde(flatten)]
    detections: Detections,
    /// Category name per entry, looked up before any class offset
    class_name: Vec<Option<&'a str>>,
}

#[derive(Serialize)]
struct AnnotationShapes {
    annotation_id: u64,
    category_id: u64,
    mask_area: usize,
    mask_xyxy: Option<[f64; 4]>,
    contours: Vec<ShapeStats>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_buffer = logging::setup_logger(cli.verbose);
    logging::setup_panic_hook(APP_NAME, log_buffer);

    let config = Config::load(cli.settings.as_deref());
    debug!("Effective config: {:?}", config);

    match run(cli.command, &config, cli.settings.as_deref()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(command: Commands, config: &Config, settings_path: Option<&Path>) -> Result<()> {
    match command {
        Commands::Summary { json } => summary(&json, config),
        Commands::Image { json, file_name } => {
            let document = load_document(&json)?;
            match coco::find_image_by_filename(&document, &file_name) {
                Some(image) => print_json(image, config.pretty_json),
                None => {
                    println!("No image named {:?} in {}", file_name, json.display());
                    Ok(())
                }
            }
        }
        Commands::Annotations { json, image } => {
            let document = load_document(&json)?;
            let index = AnnotationIndex::new(&document);
            match resolve_image(&index, &image) {
                Some((_, annotations)) => print_json(&annotations, config.pretty_json),
                None => report_missing(&image, &json),
            }
        }
        Commands::Detections { json, image, class_offset } => {
            let config = config.clone().with_class_id_offset(class_offset);
            let document = load_document(&json)?;
            let index = AnnotationIndex::new(&document);
            match resolve_image(&index, &image) {
                Some((record, annotations)) => {
                    let names = document.category_names();
                    let class_name = annotations
                        .iter()
                        .map(|ann| names.get(&ann.category_id).copied())
                        .collect();
                    let detections = coco::annotations_to_detections(annotations)
                        .with_class_offset(config.class_id_offset)?;
                    info!("{} detection(s) for {}", detections.len(), record.file_name);
                    print_json(
                        &DetectionsOutput {
                            image_id: record.id,
                            file_name: &record.file_name,
                            detections,
                            class_name,
                        },
                        config.pretty_json,
                    )
                }
                None => report_missing(&image, &json),
            }
        }
        Commands::Shapes { json, image, epsilon } => {
            let config = config.clone().with_simplify_epsilon(epsilon);
            shapes(&json, &image, &config)
        }
        Commands::Sam { json, largest } => {
            let masks = coco::load_sam_masks(&json)?;
            let mut detections = Detections::from_sam(&masks)?;
            if largest {
                detections = detections.largest();
            }
            info!("{} generated mask(s) converted", detections.len());
            print_json(&detections, config.pretty_json)
        }
        Commands::Settings(SettingsCommand::Init) => {
            let path = settings_path
                .map(Path::to_path_buf)
                .unwrap_or_else(UserSettings::settings_path);
            UserSettings::load(Some(&path)).save(&path)?;
            println!("{}", path.display());
            Ok(())
        }
        Commands::Settings(SettingsCommand::Path) => {
            let path = settings_path
                .map(Path::to_path_buf)
                .unwrap_or_else(UserSettings::settings_path);
            println!("{}", path.display());
            Ok(())
        }
        Commands::Version => {
            println!("{}", BuildInfo::detailed_info());
            Ok(())
        }
    }
}

fn load_document(path: &Path) -> Result<AnnotationDocument> {
    AnnotationDocument::from_file(path).map_err(|e| {
        if e.is_schema() {
            let has_coco_sections = std::fs::read_to_string(path)
                .map(|content| AnnotationDocument::is_coco_format(&content))
                .unwrap_or(false);
            if has_coco_sections {
                warn!("{} looks like COCO but a record has missing or mistyped fields", path.display());
            } else {
                warn!("{} is not a COCO annotation file (no images/annotations/categories)", path.display());
            }
        }
        e
    })
}

fn resolve_image<'a>(
    index: &AnnotationIndex<'a>,
    selector: &ImageSelector,
) -> Option<(&'a coco::ImageRecord, Vec<&'a coco::Annotation>)> {
    let record = match (&selector.file_name, selector.image_id) {
        (Some(file_name), _) => index.image_by_filename(file_name)?,
        (None, Some(image_id)) => index.document().images.iter().find(|img| img.id == image_id)?,
        (None, None) => return None,
    };
    Some((record, index.annotations_by_image_id(record.id)))
}

fn report_missing(selector: &ImageSelector, json: &Path) -> Result<()> {
    match (&selector.file_name, selector.image_id) {
        (Some(file_name), _) => println!("No image named {:?} in {}", file_name, json.display()),
        (None, Some(image_id)) => println!("No image with id {} in {}", image_id, json.display()),
        (None, None) => {}
    }
    Ok(())
}

fn summary(json: &Path, config: &Config) -> Result<()> {
    let document = load_document(json)?;
    let report = document.validate();
    for warning in &report.warnings {
        warn!("{}", warning);
    }

    print_json(
        &Summary {
            stats: document.stats(),
            classes: document.class_names(&config.excluded_supercategory),
            warnings: &report.warnings,
        },
        config.pretty_json,
    )
}

fn shapes(json: &Path, selector: &ImageSelector, config: &Config) -> Result<()> {
    let document = load_document(json)?;
    let index = AnnotationIndex::new(&document);
    let Some((record, annotations)) = resolve_image(&index, selector) else {
        return report_missing(selector, json);
    };

    let height = record.height as usize;
    let width = record.width as usize;
    let mut output = Vec::with_capacity(annotations.len());

    for ann in annotations {
        let mask = match ann.segmentation.to_mask(height, width) {
            Ok(mask) => mask,
            Err(e) => {
                warn!("Skipping annotation {}: {}", ann.id, e);
                continue;
            }
        };

        let contours = mask
            .to_polygons(config.simplify_epsilon)
            .iter()
            .filter_map(|polygon| ShapeStats::from_polygon(polygon))
            .collect();

        output.push(AnnotationShapes {
            annotation_id: ann.id,
            category_id: ann.category_id,
            mask_area: mask.area(),
            mask_xyxy: mask.bounding_box(),
            contours,
        });
    }

    debug!("Analysed {} mask(s) for {}", output.len(), record.file_name);
    print_json(&output, config.pretty_json)
}

fn print_json<T: Serialize + ?Sized>(value: &T, pretty: bool) -> Result<()> {
    let json = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
    .map_err(CocoError::from_json)?;

    println!("{}", json);
    Ok(())
}
