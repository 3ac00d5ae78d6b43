use std::path::{Path, PathBuf};

use alice_ar::{
    extract::{extract_all, extract_one, BatchReport, EntryOutcome, ExtractOptions, Selector},
    Archive,
};
use alice_cg::ImageEncoding;
use clap::{Args, ValueEnum};
use miette::{miette, Context, Result};
use owo_colors::OwoColorize;
use tracing::info;

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, ValueEnum)]
enum ImageFormat {
    #[default]
    Png,
    Webp,
}

impl From<ImageFormat> for ImageEncoding {
    fn from(value: ImageFormat) -> Self {
        match value {
            ImageFormat::Png => ImageEncoding::Png,
            ImageFormat::Webp => ImageEncoding::Webp,
        }
    }
}

#[derive(Args)]
pub struct ExtractArgs {
    /// An input archive, any volume of a linked-volume archive
    #[arg(value_name = "ARCHIVE")]
    archive: PathBuf,

    /// Output file for a single entry, or target directory
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Extract only the entry at this position
    #[arg(short, long, value_name = "N")]
    index: Option<usize>,

    /// Extract only the entry with this name, ignored when an index is given
    #[arg(short, long, value_name = "NAME")]
    name: Option<String>,

    /// Allow overwriting existing files
    #[arg(short, long, default_value_t = false)]
    force: bool,

    /// Format images are converted to
    #[arg(long, value_enum, default_value_t, ignore_case = true)]
    image_format: ImageFormat,

    /// Skip entries which are not images
    #[arg(long, default_value_t = false)]
    images_only: bool,

    /// Write images as they are stored
    #[arg(long, default_value_t = false)]
    raw: bool,

    /// File listing the entries to extract and their order, one name per line
    #[arg(long, value_name = "FILE", conflicts_with_all = ["index", "name"])]
    toc: Option<PathBuf>,
}

impl ExtractArgs {
    pub fn handle(&self) -> Result<()> {
        let (mut archive, format) = alice_ar::open(&self.archive)
            .with_context(|| format!("opening {}", self.archive.display()))?;
        info!("{format} archive with {} entries", archive.len());

        let options = ExtractOptions::builder()
            .force(self.force)
            .images_only(self.images_only)
            .raw(self.raw)
            .image_encoding(self.image_format.into())
            .build();

        match Selector::new(self.index, self.name.clone()) {
            Some(selector) => self.single(archive.as_mut(), &selector, &options),
            None => self.bulk(archive.as_mut(), &options),
        }
    }

    fn single(
        &self,
        archive: &mut dyn Archive,
        selector: &Selector,
        options: &ExtractOptions,
    ) -> Result<()> {
        let report = extract_one(archive, selector, self.output.as_deref(), options)
            .with_context(|| format!("extracting {selector:?}"))?;

        match report.outcome {
            EntryOutcome::Written(_) | EntryOutcome::Transcoded { .. } => {
                println!("{} {}: {}", "✅".green(), report.name, report.outcome);
                Ok(())
            }
            EntryOutcome::Skipped(_) => {
                println!("{}: {}", report.name, report.outcome);
                Ok(())
            }
            EntryOutcome::Conflict(path) => Err(alice_ar::error::Error::Conflict(path).into()),
            outcome => Err(miette!("{}: {outcome}", report.name)),
        }
    }

    fn bulk(&self, archive: &mut dyn Archive, options: &ExtractOptions) -> Result<()> {
        let toc = self
            .toc
            .as_ref()
            .map(|path| {
                alice_ar::toc::read_path(path)
                    .with_context(|| format!("reading {}", path.display()))
            })
            .transpose()?;

        let dir = self.output.as_deref().unwrap_or(Path::new("."));
        let report = extract_all(archive, dir, options, toc.as_deref());
        print_summary(&report, archive.len());
        Ok(())
    }
}

fn print_summary(report: &BatchReport, total: usize) {
    for entry in report.entries.iter().filter(|e| e.outcome.is_problem()) {
        println!("{} {}: {}", "❌".red(), entry.name, entry.outcome.red());
    }
    for name in &report.unmatched {
        println!("{} {name}: {}", "❓".yellow(), "not in archive".yellow());
    }

    let problems = report
        .entries
        .iter()
        .filter(|e| e.outcome.is_problem())
        .count()
        + report.unmatched.len();
    let summary = format!("extracted {} of {total} entries", report.extracted());
    if problems == 0 {
        println!("{}", summary.green());
    } else {
        println!("{}, {}", summary.yellow(), format!("{problems} problems").red());
    }
}
