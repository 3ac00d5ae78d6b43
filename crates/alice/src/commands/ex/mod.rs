pub mod dump;
pub mod rewrite;

#[derive(clap::Subcommand)]
pub enum ExCommands {
    /// Print an EX document as text or JSON
    Dump(dump::DumpArgs),
    /// Read an EX document and write it out again
    Rewrite(rewrite::RewriteArgs),
}

impl ExCommands {
    pub fn handle(&self) -> miette::Result<()> {
        match self {
            ExCommands::Dump(dump) => dump.handle(),
            ExCommands::Rewrite(rewrite) => rewrite.handle(),
        }
    }
}
