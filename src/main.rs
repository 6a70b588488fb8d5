use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

use mammo_labeller::config::{add_recent_project, load_config, save_config};
use mammo_labeller::project::expand_path;
use mammo_labeller::{
    classes, ClassificationMode, DetectionMode, FileExtension, ImageSet, ProjectConfig,
    ResultStore, Result,
};

#[derive(Parser)]
#[command(name = "mammo-labeller")]
#[command(about = "Classify and localize findings in mammography image sets")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a project folder with its settings.json
    New(NewArgs),
    /// Show how far a project has progressed
    Status {
        /// Project folder or settings file
        #[arg(value_name = "PROJECT")]
        project: PathBuf,
    },
    /// Open a project in the labelling window
    Annotate {
        /// Project folder or settings file
        #[arg(value_name = "PROJECT")]
        project: PathBuf,
    },
}

#[derive(Args)]
struct NewArgs {
    /// Project name, also the name of the result table
    #[arg(long)]
    name: String,

    /// Folder searched recursively for images
    #[arg(long, value_name = "DIR")]
    data: PathBuf,

    /// Output folder for settings, results and class folders
    #[arg(long, value_name = "DIR")]
    project: PathBuf,

    #[arg(long, default_value = "")]
    author: String,

    #[arg(long, default_value = "")]
    institution: String,

    /// Image file type; the configured default when omitted
    #[arg(long)]
    extension: Option<FileExtension>,

    /// Comma-separated class labels
    #[arg(long, value_delimiter = ',', conflicts_with = "classes_file")]
    classes: Vec<String>,

    /// YAML file with class labels
    #[arg(long, value_name = "FILE")]
    classes_file: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = ClassificationArg::None)]
    classification: ClassificationArg,

    #[arg(long, value_enum, default_value_t = DetectionArg::None)]
    detection: DetectionArg,

    /// Comma-separated object names; empty for an unlimited number
    #[arg(long, value_delimiter = ',')]
    objects: Vec<String>,

    /// Copy each classified image into a folder named after its class
    #[arg(long)]
    copy: bool,

    /// Skip CC views
    #[arg(long)]
    no_cc: bool,

    /// Skip MLO views
    #[arg(long)]
    no_mlo: bool,

    /// Skip 2D mammograms
    #[arg(long)]
    no_mammo: bool,

    /// Skip tomosynthesis reconstructions
    #[arg(long)]
    no_tomo: bool,

    /// Decode compressed DICOM pixel data
    #[arg(long)]
    decode: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum ClassificationArg {
    None,
    Image,
    Location,
}

#[derive(Clone, Copy, ValueEnum)]
enum DetectionArg {
    None,
    Point,
    Box,
    Polygon,
    Mask,
}

impl From<ClassificationArg> for ClassificationMode {
    fn from(arg: ClassificationArg) -> Self {
        match arg {
            ClassificationArg::None => ClassificationMode::None,
            ClassificationArg::Image => ClassificationMode::PerImage,
            ClassificationArg::Location => ClassificationMode::PerLocation,
        }
    }
}

impl From<DetectionArg> for DetectionMode {
    fn from(arg: DetectionArg) -> Self {
        match arg {
            DetectionArg::None => DetectionMode::None,
            DetectionArg::Point => DetectionMode::Point,
            DetectionArg::Box => DetectionMode::BoundingBox,
            DetectionArg::Polygon => DetectionMode::Polygon,
            DetectionArg::Mask => DetectionMode::PolygonMask,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let app_config = load_config();
    let _guard = mammo_labeller::logging::init_logs(&app_config.log_dir());

    let outcome = match cli.command {
        Command::New(args) => new_project(args, app_config.projects.default_extension),
        Command::Status { project } => status(&project),
        Command::Annotate { project } => annotate(&project),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn new_project(args: NewArgs, default_extension: FileExtension) -> Result<()> {
    let class_labels = match &args.classes_file {
        Some(path) => classes::load_class_labels(&expand_path(path))?,
        None => args.classes.into_iter().filter(|c| !c.is_empty()).collect(),
    };

    let config = ProjectConfig {
        project_name: args.name,
        author: args.author,
        institution: args.institution,
        data_folder: expand_path(&args.data),
        project_folder: expand_path(&args.project),
        class_labels,
        classification_mode: args.classification.into(),
        object_detection_mode: args.detection.into(),
        object_names: args.objects.into_iter().filter(|o| !o.is_empty()).collect(),
        copy_files: args.copy,
        eval_cc: !args.no_cc,
        eval_mlo: !args.no_mlo,
        eval_mammo: !args.no_mammo,
        eval_tomo: !args.no_tomo,
        file_extension: args.extension.unwrap_or(default_extension),
        decode: args.decode,
        ..ProjectConfig::default()
    };

    config.validate()?;
    let images = ImageSet::open(&config)?;
    config.prepare_folders()?;
    config.save()?;
    info!(
        "Created project '{}' with {} images",
        config.project_name,
        images.len()
    );

    let mut app_config = load_config();
    add_recent_project(
        &mut app_config,
        config.settings_path().to_string_lossy().into_owned(),
    );
    if let Err(e) = save_config(&app_config) {
        tracing::warn!("Could not update recent projects: {e}");
    }
    Ok(())
}

fn status(project: &std::path::Path) -> Result<()> {
    let config = ProjectConfig::load(&expand_path(project))?;
    let images = ImageSet::open(&config)?;
    let results = ResultStore::new(&config);
    let done = results.completed()?;

    println!("Project:   {}", config.project_name);
    println!("Images:    {} (*.{})", images.len(), config.file_extension);
    println!("Completed: {}", done.len());
    println!("Resume at: {} / {}", (config.img_idx + 1).min(images.len()), images.len());
    Ok(())
}

#[cfg(feature = "gui")]
fn annotate(project: &std::path::Path) -> Result<()> {
    let config = ProjectConfig::load(&expand_path(project))?;
    let mut app_config = load_config();
    add_recent_project(
        &mut app_config,
        config.settings_path().to_string_lossy().into_owned(),
    );
    if let Err(e) = save_config(&app_config) {
        tracing::warn!("Could not update recent projects: {e}");
    }
    mammo_labeller::gui::run(config)
}

#[cfg(not(feature = "gui"))]
fn annotate(_project: &std::path::Path) -> Result<()> {
    Err(mammo_labeller::LabellerError::Config(
        "this build has no labelling window; rebuild with `--features gui`".to_string(),
    ))
}
