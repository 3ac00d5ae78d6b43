use std::{fs::File, io::BufWriter, path::PathBuf};

use alice_ex::{CompressionMethod, ExFile};
use clap::{Args, ValueEnum};
use miette::{Context, IntoDiagnostic, Result};
use tracing::{info, warn};

use crate::commands::EncodingArgs;

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
enum Compression {
    None,
    Zlib,
}

#[derive(Args)]
pub struct RewriteArgs {
    /// An input EX file
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// A target EX file
    #[arg(short, long, value_name = "FILE")]
    output: PathBuf,

    /// Change how the block data is stored, kept as it is by default
    #[arg(long, value_enum)]
    compression: Option<Compression>,

    /// Allow overwriting the target
    #[arg(short, long, default_value_t = false)]
    force: bool,

    #[command(flatten)]
    encoding: EncodingArgs,
}

impl RewriteArgs {
    pub fn handle(&self) -> Result<()> {
        let encoding = self.encoding.encoding;
        let mut document = ExFile::read_path(&self.file, encoding)
            .with_context(|| format!("reading {}", self.file.display()))?;
        for warning in document.warnings() {
            warn!("{warning}");
        }

        match self.compression {
            Some(Compression::None) => document.set_compression(CompressionMethod::None),
            Some(Compression::Zlib) => document.set_compression(CompressionMethod::Zlib),
            None => {}
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

        document
            .write(BufWriter::new(out), encoding)
            .with_context(|| format!("writing {}", self.output.display()))?;
        info!(
            "wrote {} blocks to {}",
            document.len(),
            self.output.display()
        );

        Ok(())
    }
}
