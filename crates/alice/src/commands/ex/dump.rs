use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::PathBuf,
};

use alice_ex::ExFile;
use clap::Args;
use encoding_rs::Encoding;
use miette::{Context, IntoDiagnostic, Result};
use tracing::{info, warn};

use crate::commands::{parse_encoding, EncodingArgs};

#[derive(Args)]
pub struct DumpArgs {
    /// An input EX file
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// Write to this file instead of standard output
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Print the document as JSON
    #[arg(long, default_value_t = false, conflicts_with = "split")]
    json: bool,

    /// Write every block to its own file in this directory, the output gets the include lines
    #[arg(long, value_name = "DIR")]
    split: Option<PathBuf>,

    /// Allow overwriting files in the split directory
    #[arg(short, long, default_value_t = false, requires = "split")]
    force: bool,

    /// Encoding of the text output
    #[arg(long, default_value = "utf-8", value_parser = parse_encoding)]
    output_encoding: &'static Encoding,

    #[command(flatten)]
    encoding: EncodingArgs,
}

impl DumpArgs {
    pub fn handle(&self) -> Result<()> {
        let document = ExFile::read_path(&self.file, self.encoding.encoding)
            .with_context(|| format!("reading {}", self.file.display()))?;
        for warning in document.warnings() {
            warn!("{warning}");
        }

        let mut out: Box<dyn Write> = match &self.output {
            Some(path) => Box::new(BufWriter::new(
                File::create(path)
                    .into_diagnostic()
                    .context(format!("creating {}", path.display()))?,
            )),
            None => Box::new(io::stdout().lock()),
        };

        if self.json {
            let json = document.to_json()?;
            out.write_all(json.as_bytes()).into_diagnostic()?;
        } else if let Some(dir) = &self.split {
            let written = document.dump_split(&mut out, dir, self.output_encoding, self.force)?;
            info!("wrote {} files", written.len());
        } else {
            document.dump(&mut out, self.output_encoding)?;
        }

        out.flush().into_diagnostic()
    }
}
