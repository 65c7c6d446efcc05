use std::ffi::OsString;
use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser, PartialEq)]
#[command(name = "gdplay", version, about = "Plays a packed game")]
pub struct PlayerArgs {
    /// Directory to switch to before loading resources.
    #[arg(long, value_name = "PATH")]
    pub cwd: Option<PathBuf>,
}

impl PlayerArgs {
    /// Parses the process arguments, accepting the single-dash `-cwd=` form.
    pub fn parse_normalized<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString>,
    {
        Self::try_parse_from(args.into_iter().map(|arg| normalize(arg.into())))
    }
}

fn normalize(arg: OsString) -> OsString {
    match arg.to_str() {
        Some(text) if text.starts_with("-cwd=") => OsString::from(format!("-{text}")),
        _ => arg,
    }
}
