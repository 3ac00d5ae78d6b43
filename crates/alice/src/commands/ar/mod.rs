pub mod extract;
pub mod list;
pub mod pack;

#[derive(clap::Subcommand)]
pub enum ArCommands {
    /// Extract entries of an archive
    Extract(extract::ExtractArgs),
    /// List the entries of an archive
    List(list::ListArgs),
    /// Pack a directory into an AFA archive
    Pack(pack::PackArgs),
}

impl ArCommands {
    pub fn handle(&self) -> miette::Result<()> {
        match self {
            ArCommands::Extract(extract) => extract.handle(),
            ArCommands::List(list) => list.handle(),
            ArCommands::Pack(pack) => pack.handle(),
        }
    }
}
