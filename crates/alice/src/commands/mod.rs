use clap::Args;
use encoding_rs::Encoding;

pub mod ar;
pub mod ex;

#[derive(clap::Subcommand)]
pub enum Commands {
    /// Handle AFA, ALD, ALK and FLAT archives
    Ar {
        #[command(subcommand)]
        command: ar::ArCommands,
    },
    /// Handle EX documents
    Ex {
        #[command(subcommand)]
        command: ex::ExCommands,
    },
}

impl Commands {
    pub fn handle(&self) -> miette::Result<()> {
        match self {
            Commands::Ar { command } => command.handle(),
            Commands::Ex { command } => command.handle(),
        }
    }
}

fn parse_encoding(label: &str) -> Result<&'static Encoding, String> {
    Encoding::for_label(label.as_bytes()).ok_or_else(|| format!("unknown text encoding {label:?}"))
}

/// Text encoding of the game data
#[derive(Args, Clone, Copy)]
pub struct EncodingArgs {
    /// Encoding of text stored in EX documents, any WHATWG label
    #[arg(long, env = "ALICE_ENCODING", default_value = "shift_jis", value_parser = parse_encoding)]
    pub encoding: &'static Encoding,
}
