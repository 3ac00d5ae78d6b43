//! Extracting entries to the filesystem, singly or in bulk.

use std::{
    borrow::Cow,
    fmt,
    fs::{self, File},
    io::{self, Write},
    path::{Path, PathBuf},
};

use alice_cg::{transcode, CgFormat, ImageEncoding};
use bon::Builder;
use tracing::{debug, info, instrument, warn};

use crate::{
    archive::{Archive, LoadedEntry},
    error::{Error, Result},
};

/// Picks the entry of a single-entry extraction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    /// Position in storage order
    Index(usize),
    /// Logical name, compared without regard to case
    Name(String),
}

impl Selector {
    /// Build a selector from optional command line values, an index wins over a name
    pub fn new(index: Option<usize>, name: Option<String>) -> Option<Selector> {
        match (index, name) {
            (Some(index), _) => Some(Selector::Index(index)),
            (None, Some(name)) => Some(Selector::Name(name)),
            (None, None) => None,
        }
    }

    /// Find the index of the selected entry
    pub fn resolve<A: Archive + ?Sized>(&self, archive: &A) -> Result<usize> {
        match self {
            Selector::Index(index) => archive.by_index(*index).map(|e| e.index()),
            Selector::Name(name) => archive.by_name(name).map(|e| e.index()),
        }
    }
}

/// Flags controlling how entries are written
#[derive(Debug, Clone, Copy, Default, Builder)]
pub struct ExtractOptions {
    /// Overwrite existing files
    #[builder(default)]
    pub force: bool,

    /// Skip entries which are not images
    #[builder(default)]
    pub images_only: bool,

    /// Write images as they are stored
    #[builder(default)]
    pub raw: bool,

    /// Encoding images are converted to unless `raw` is set
    #[builder(default)]
    pub image_encoding: ImageEncoding,
}

/// Why an entry was not extracted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// A table of contents was given and does not list the entry
    NotInToc,
    /// Only images were requested
    NotImage,
}

/// What happened to one entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryOutcome {
    /// Written as stored
    Written(PathBuf),
    /// Converted from another image format and written
    Transcoded {
        /// Where the converted image went
        path: PathBuf,
        /// The format the image was stored in
        from: CgFormat,
    },
    /// Deliberately left out
    Skipped(SkipReason),
    /// The output exists and overwriting was not allowed, the file is untouched
    Conflict(PathBuf),
    /// The image could not be converted, nothing was written
    TranscodeFailed(String),
    /// Loading or writing failed
    Failed(String),
}

impl EntryOutcome {
    /// Whether a file was written
    pub fn is_extracted(&self) -> bool {
        matches!(self, EntryOutcome::Written(_) | EntryOutcome::Transcoded { .. })
    }

    /// Whether the outcome needs the user's attention
    pub fn is_problem(&self) -> bool {
        matches!(
            self,
            EntryOutcome::Conflict(_) | EntryOutcome::TranscodeFailed(_) | EntryOutcome::Failed(_)
        )
    }
}

impl fmt::Display for EntryOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryOutcome::Written(path) => write!(f, "written to {}", path.display()),
            EntryOutcome::Transcoded { path, from } => {
                write!(f, "converted from {from} to {}", path.display())
            }
            EntryOutcome::Skipped(SkipReason::NotInToc) => f.write_str("not in table of contents"),
            EntryOutcome::Skipped(SkipReason::NotImage) => f.write_str("not an image"),
            EntryOutcome::Conflict(path) => write!(f, "{} already exists", path.display()),
            EntryOutcome::TranscodeFailed(e) => write!(f, "conversion failed: {e}"),
            EntryOutcome::Failed(e) => write!(f, "failed: {e}"),
        }
    }
}

/// Outcome of one entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryReport {
    /// Position of the entry in storage order
    pub index: usize,
    /// Logical name of the entry
    pub name: String,
    /// What happened
    pub outcome: EntryOutcome,
}

/// Result of a bulk extraction
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Outcomes in the order the entries were visited
    pub entries: Vec<EntryReport>,
    /// Table of contents names without a matching entry
    pub unmatched: Vec<String>,
}

impl BatchReport {
    /// Number of files written
    pub fn extracted(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.outcome.is_extracted())
            .count()
    }

    /// Whether any entry had a problem or a name went unmatched
    pub fn has_problems(&self) -> bool {
        !self.unmatched.is_empty() || self.entries.iter().any(|e| e.outcome.is_problem())
    }
}

/// Turn an entry name into a relative path
///
/// Both `/` and `\` separate components. Empty, `.` and `..` components are dropped, so the result never
/// leaves the directory it is joined to. Returns `None` when nothing is left.
pub fn entry_path(name: &str) -> Option<PathBuf> {
    let path: PathBuf = name
        .split(['/', '\\'])
        .filter(|c| !matches!(*c, "" | "." | ".."))
        .collect();
    (!path.as_os_str().is_empty()).then_some(path)
}

/// Where an entry is written
#[derive(Debug, Clone, Copy)]
enum Target<'a> {
    /// Exactly this file
    File(&'a Path),
    /// A path derived from the entry name below this directory
    Under(&'a Path),
}

fn derived_path(dir: &Path, name: &str, index: usize) -> PathBuf {
    dir.join(entry_path(name).unwrap_or_else(|| PathBuf::from(index.to_string())))
}

fn write_output(path: &Path, data: &[u8], force: bool) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let file = if force {
        File::create(path)
    } else {
        File::create_new(path)
    };
    let mut file = match file {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            return Err(Error::Conflict(path.to_path_buf()))
        }
        Err(e) => return Err(e.into()),
    };
    file.write_all(data)?;
    Ok(())
}

/// Load, convert and write one entry, the entry is released on every path out of here
fn process<A: Archive + ?Sized>(
    archive: &mut A,
    index: usize,
    target: Target<'_>,
    options: &ExtractOptions,
) -> Result<EntryOutcome> {
    let entry = LoadedEntry::acquire(archive, index)?;
    let name = entry.descriptor().name().to_owned();
    let format = CgFormat::detect(&entry);

    if options.images_only && format.is_none() {
        debug!("skipping {name}, not an image");
        return Ok(EntryOutcome::Skipped(SkipReason::NotImage));
    }

    let (data, converted_from) = match format {
        Some(from) if !options.raw => match transcode(&entry, options.image_encoding) {
            Ok(Cow::Borrowed(data)) => (Cow::Borrowed(data), None),
            Ok(Cow::Owned(data)) => (Cow::Owned(data), Some(from)),
            Err(e) => {
                warn!("unable to convert {name}: {e}");
                return Ok(EntryOutcome::TranscodeFailed(e.to_string()));
            }
        },
        _ => (Cow::Borrowed(&*entry), None),
    };

    let path = match target {
        Target::File(path) => path.to_path_buf(),
        Target::Under(dir) => {
            let mut path = derived_path(dir, &name, index);
            if converted_from.is_some() {
                path.set_extension(options.image_encoding.extension());
            }
            path
        }
    };

    match write_output(&path, &data, options.force) {
        Ok(()) => {}
        Err(Error::Conflict(path)) => {
            warn!("not overwriting {}", path.display());
            return Ok(EntryOutcome::Conflict(path));
        }
        Err(e) => return Err(e),
    }

    debug!("wrote {name} to {}", path.display());
    Ok(match converted_from {
        Some(from) => EntryOutcome::Transcoded { path, from },
        None => EntryOutcome::Written(path),
    })
}

/// Extract the selected entry
///
/// The entry goes to `output` when it is a file path, or below `output` when it is an existing directory.
/// Without `output` the path is derived from the entry name in the current directory. A conflicting output
/// is reported in the outcome, I/O errors are returned.
#[instrument(skip(archive, options), err)]
pub fn extract_one<A: Archive + ?Sized>(
    archive: &mut A,
    selector: &Selector,
    output: Option<&Path>,
    options: &ExtractOptions,
) -> Result<EntryReport> {
    let index = selector.resolve(archive)?;
    let name = archive.by_index(index)?.name().to_owned();

    let target = match output {
        Some(path) if path.is_dir() => Target::Under(path),
        Some(path) => Target::File(path),
        None => Target::Under(Path::new(".")),
    };
    let outcome = process(archive, index, target, options)?;
    info!("{name}: {outcome}");

    Ok(EntryReport {
        index,
        name,
        outcome,
    })
}

/// Extract every entry below `dir`
///
/// With a table of contents only the listed entries are extracted, in the order they are listed. The
/// remaining entries are reported as skipped and names without an entry are collected in
/// [`BatchReport::unmatched`]. Problems with single entries are recorded in the report and never stop the
/// batch.
#[instrument(skip(archive, options, toc), fields(dir = %dir.display()))]
pub fn extract_all<A: Archive + ?Sized>(
    archive: &mut A,
    dir: &Path,
    options: &ExtractOptions,
    toc: Option<&[String]>,
) -> BatchReport {
    let mut report = BatchReport::default();

    let order: Vec<usize> = match toc {
        None => (0..archive.len()).collect(),
        Some(names) => {
            let mut listed = vec![false; archive.len()];
            let mut order = Vec::with_capacity(names.len());
            for name in names {
                match archive.table().index_of(name) {
                    Some(index) if !listed[index] => {
                        listed[index] = true;
                        order.push(index);
                    }
                    Some(_) => debug!("{name} is listed twice"),
                    None => {
                        warn!("no entry named {name}");
                        report.unmatched.push(name.clone());
                    }
                }
            }
            order
        }
    };

    let mut listed = vec![toc.is_none(); archive.len()];
    for index in order {
        listed[index] = true;
        let name = archive.entries()[index].name().to_owned();
        let outcome = process(archive, index, Target::Under(dir), options)
            .unwrap_or_else(|e| EntryOutcome::Failed(e.to_string()));
        if let EntryOutcome::Failed(e) = &outcome {
            warn!("{name}: {e}");
        }
        report.entries.push(EntryReport {
            index,
            name,
            outcome,
        });
    }

    for (index, _) in listed.iter().enumerate().filter(|(_, listed)| !**listed) {
        report.entries.push(EntryReport {
            index,
            name: archive.entries()[index].name().to_owned(),
            outcome: EntryOutcome::Skipped(SkipReason::NotInToc),
        });
    }

    info!(
        "extracted {} of {} entries",
        report.extracted(),
        archive.len()
    );
    report
}

#[cfg(test)]
mod test {
    use std::path::PathBuf;

    use pretty_assertions::assert_eq;

    use super::{entry_path, EntryOutcome, ExtractOptions, Selector, SkipReason};
    use alice_cg::ImageEncoding;

    #[test]
    fn index_wins_over_name() {
        assert_eq!(
            Selector::new(Some(2), Some("a".into())),
            Some(Selector::Index(2))
        );
        assert_eq!(
            Selector::new(None, Some("a".into())),
            Some(Selector::Name("a".into()))
        );
        assert_eq!(Selector::new(None, None), None);
    }

    #[test]
    fn entry_paths_stay_relative() {
        assert_eq!(entry_path("cg\\01.qnt"), Some(PathBuf::from("cg/01.qnt")));
        assert_eq!(entry_path("/etc/passwd"), Some(PathBuf::from("etc/passwd")));
        assert_eq!(entry_path("../../x"), Some(PathBuf::from("x")));
        assert_eq!(entry_path("a/./b//c"), Some(PathBuf::from("a/b/c")));
        assert_eq!(entry_path(".."), None);
        assert_eq!(entry_path(""), None);
    }

    #[test]
    fn options_default_to_png() {
        let options = ExtractOptions::builder().force(true).build();
        assert!(options.force);
        assert!(!options.raw);
        assert!(!options.images_only);
        assert_eq!(options.image_encoding, ImageEncoding::Png);
    }

    #[test]
    fn outcome_classes() {
        assert!(EntryOutcome::Written(PathBuf::from("a")).is_extracted());
        assert!(!EntryOutcome::Skipped(SkipReason::NotInToc).is_problem());
        assert!(EntryOutcome::Conflict(PathBuf::from("a")).is_problem());
        assert!(EntryOutcome::TranscodeFailed("bad".into()).is_problem());
    }
}
