use std::path::PathBuf;

use alice_ar::{
    nested::{open_nested, Nested},
    Archive,
};
use clap::Args;
use encoding_rs::Encoding;
use itertools::Itertools;
use miette::{Context, Result};
use owo_colors::OwoColorize;
use tracing::warn;

use crate::commands::EncodingArgs;

#[derive(Args)]
pub struct ListArgs {
    /// An input archive, any volume of a linked-volume archive
    #[arg(value_name = "ARCHIVE")]
    archive: PathBuf,

    /// Look into entries which are archives or EX documents themselves
    #[arg(short, long, default_value_t = false)]
    recursive: bool,

    #[command(flatten)]
    encoding: EncodingArgs,
}

impl ListArgs {
    pub fn handle(&self) -> Result<()> {
        let (mut archive, format) = alice_ar::open(&self.archive)
            .with_context(|| format!("opening {}", self.archive.display()))?;
        println!(
            "{} {format} archive, {} entries",
            self.archive.display().bold(),
            archive.len()
        );

        self.list(archive.as_mut(), 0)
    }

    fn list(&self, archive: &mut dyn Archive, depth: usize) -> Result<()> {
        let indent = "  ".repeat(depth);
        for index in 0..archive.len() {
            let entry = archive.by_index(index)?;
            println!(
                "{indent}{:>6} {:>10} {}",
                index.dimmed(),
                entry.size(),
                entry.name()
            );

            if self.recursive {
                self.descend(archive, index, depth + 1, self.encoding.encoding)?;
            }
        }
        Ok(())
    }

    fn descend(
        &self,
        archive: &mut dyn Archive,
        index: usize,
        depth: usize,
        encoding: &'static Encoding,
    ) -> Result<()> {
        let indent = "  ".repeat(depth);
        let data = archive.load(index)?;
        archive.release(index);

        match open_nested(data, encoding) {
            Ok(Some(Nested::Archive(mut nested, format))) => {
                println!("{indent}{} {format} archive, {} entries", "↳".cyan(), nested.len());
                self.list(nested.as_mut(), depth)?;
                nested.close();
            }
            Ok(Some(Nested::Document(document))) => {
                println!(
                    "{indent}{} EX document: {}",
                    "↳".cyan(),
                    document.blocks().iter().map(|b| &b.name).join(", ")
                );
                for warning in document.warnings() {
                    warn!("{warning}");
                }
            }
            Ok(None) => {}
            Err(e) => {
                let name = archive.by_index(index)?.name();
                warn!("unable to look into {name}: {e}");
            }
        }
        Ok(())
    }
}
