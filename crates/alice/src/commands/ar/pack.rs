use std::{
    fs::File,
    io::{BufWriter, Write},
    path::PathBuf,
};

use alice_ar::{
    write::{AfaVersion, AfaWriterOptions},
    AfaWriter,
};
use clap::{Args, ValueEnum};
use itertools::Itertools;
use miette::{miette, Context, IntoDiagnostic, Result};
use tracing::info;
use walkdir::WalkDir;

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, ValueEnum)]
enum Version {
    #[value(name = "1")]
    V1,
    #[default]
    #[value(name = "2")]
    V2,
}

#[derive(Args)]
pub struct PackArgs {
    /// An input directory
    #[arg(value_name = "DIR")]
    directory: PathBuf,

    /// A target AFA file
    #[arg(short, long, value_name = "FILE")]
    output: PathBuf,

    /// AFA revision to write
    #[arg(long, value_enum, default_value_t)]
    afa_version: Version,

    /// Allow overwriting the target
    #[arg(short, long, default_value_t = false)]
    force: bool,
}

impl PackArgs {
    pub fn handle(&self) -> Result<()> {
        info!("creating {}", &self.output.display());

        let files = WalkDir::new(&self.directory)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| !e.file_type().is_dir())
            .collect::<Vec<_>>();

        if files.is_empty() {
            return Err(miette!("directory is empty"));
        }

        let out = if !self.force {
            File::create_new(&self.output)
                .into_diagnostic()
                .context(format!("creating {}", &self.output.display()))?
        } else {
            File::create(&self.output)
                .into_diagnostic()
                .context(format!("creating {}", &self.output.display()))?
        };

        let version = match self.afa_version {
            Version::V1 => AfaVersion::V1,
            Version::V2 => AfaVersion::V2,
        };
        let mut afa = AfaWriter::new(
            BufWriter::new(out),
            AfaWriterOptions::builder().version(version).build(),
        );

        for file in files {
            let relative = file
                .path()
                .strip_prefix(&self.directory)
                .into_diagnostic()?;
            let name = relative
                .components()
                .map(|c| c.as_os_str().to_str())
                .collect::<Option<Vec<_>>>()
                .ok_or(miette!("unable to convert {} to a string", relative.display()))?
                .iter()
                .join("\\");
            info!("packing {name}");

            afa.start_file(&name)
                .context(format!("starting entry for {name}"))?;

            let mut f = File::open(file.path())
                .into_diagnostic()
                .context(format!("opening {}", file.path().display()))?;

            std::io::copy(&mut f, &mut afa)
                .into_diagnostic()
                .context(format!("copying {}", file.path().display()))?;
        }

        afa.finish()
            .context("finalizing afa file")?
            .flush()
            .into_diagnostic()?;

        Ok(())
    }
}
