use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, warn};

use dataset_builder::config::{IdScheme, MissingPolicy, Settings, DEFAULT_DATA_FILE};
use dataset_builder::error::Result;
use dataset_builder::export::{export_csv, export_relational, write_sqlite};
use dataset_builder::state::{read_dataset, Dataset, RescanSummary, Session};
use dataset_builder::ui;

#[derive(Parser, Debug)]
#[command(name = "dataset-builder", version, about = "Build attribute-tagged image datasets")]
struct Cli {
    /// Enable debug logging
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Scan the image directory, save the dataset and open the editor
    Edit(ScanArgs),

    /// Scan the image directory and save the dataset, without the editor
    Scan(ScanArgs),

    /// Export a saved dataset as one flat CSV file
    ExportCsv {
        /// Dataset document to read
        #[arg(long)]
        dataset_file: PathBuf,

        /// CSV file to write
        #[arg(long)]
        output_file: PathBuf,

        /// Append each item's image path as the last column
        #[arg(long)]
        include_image_path: bool,
    },

    /// Export a saved dataset as items / attributes / attribute_values tables
    ExportDb {
        /// Dataset document to read
        #[arg(long)]
        dataset_file: PathBuf,

        /// SQLite file, or directory for the CSV tables
        #[arg(long)]
        output: PathBuf,

        #[arg(long, value_enum, default_value_t = DbFormat::Sqlite)]
        format: DbFormat,
    },
}

#[derive(Args, Debug)]
struct ScanArgs {
    /// Directory containing the source images
    #[arg(long, env = "DATASET_IMAGE_DIR")]
    image_dir: PathBuf,

    /// Directory for the dataset document, mirrored images and thumbnails
    #[arg(long, env = "DATASET_OUTPUT_DIR", default_value = "dataset")]
    output_dir: PathBuf,

    /// Name of the dataset document inside the output directory
    #[arg(long, default_value = DEFAULT_DATA_FILE)]
    data_file: String,

    /// How item ids are derived from filenames
    #[arg(long, value_enum, default_value_t = IdScheme::UnderscoreDigits)]
    id_scheme: IdScheme,

    /// Drop items whose image is no longer in the directory
    #[arg(long)]
    prune_missing: bool,

    /// Start over if the dataset document cannot be parsed (a copy is kept)
    #[arg(long)]
    recover_corrupt: bool,

    /// Copy images into the output directory and store relative paths
    #[arg(long)]
    copy_images: bool,
}

impl ScanArgs {
    fn into_settings(self) -> Settings {
        Settings {
            data_file: self.data_file,
            id_scheme: self.id_scheme,
            missing: if self.prune_missing {
                MissingPolicy::Prune
            } else {
                MissingPolicy::Retain
            },
            recover_corrupt: self.recover_corrupt,
            copy_images: self.copy_images,
            ..Settings::new(self.image_dir, self.output_dir)
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum DbFormat {
    /// One SQLite database file
    Sqlite,
    /// Three CSV files in a directory
    Csv,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "dataset_builder=debug"
    } else {
        "dataset_builder=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .init();

    match cli.command {
        Commands::Edit(args) => {
            let session = match open_session(args.into_settings()) {
                Ok(session) => session,
                Err(code) => return code,
            };
            match ui::run(session) {
                Ok(()) => ExitCode::SUCCESS,
                Err(e) => {
                    error!("Editor failed: {}", e);
                    ExitCode::FAILURE
                }
            }
        }
        Commands::Scan(args) => match open_session(args.into_settings()) {
            Ok(_) => ExitCode::SUCCESS,
            Err(code) => code,
        },
        Commands::ExportCsv {
            dataset_file,
            output_file,
            include_image_path,
        } => report(
            load_for_export(&dataset_file)
                .and_then(|dataset| export_csv(&dataset, include_image_path).write_file(&output_file)),
        ),
        Commands::ExportDb {
            dataset_file,
            output,
            format,
        } => report(load_for_export(&dataset_file).and_then(|dataset| {
            let tables = export_relational(&dataset);
            match format {
                DbFormat::Sqlite => write_sqlite(&tables, &output),
                DbFormat::Csv => tables.write_csv_dir(&output),
            }
        })),
    }
}

/// Scan, reconcile and save, then print what changed
fn open_session(settings: Settings) -> std::result::Result<Session, ExitCode> {
    info!(
        "📂 Images: {}  Output: {}",
        settings.image_dir.display(),
        settings.data_path().display()
    );

    match Session::open(settings) {
        Ok((session, summary)) => {
            print_summary(session.dataset(), &summary);
            Ok(session)
        }
        Err(e) => {
            error!("{}", e);
            Err(ExitCode::from(e.exit_code()))
        }
    }
}

fn print_summary(dataset: &Dataset, summary: &RescanSummary) {
    let report = &summary.report;
    println!(
        "✅ {} items ({} new, {} moved, {} missing, {} pruned)",
        dataset.items.len(),
        report.added.len(),
        report.moved.len(),
        report.missing.len(),
        report.pruned.len()
    );
    for collision in &summary.collisions {
        println!(
            "⚠️  Id {} claimed by {} and {}; kept {}",
            collision.id, collision.replaced, collision.kept, collision.kept
        );
    }
}

fn load_for_export(path: &std::path::Path) -> Result<Dataset> {
    let dataset = read_dataset(path)?;
    if dataset.items.is_empty() {
        warn!("No items in {}", path.display());
    }
    Ok(dataset)
}

fn report(result: Result<()>) -> ExitCode {
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::from(e.exit_code())
        }
    }
}
