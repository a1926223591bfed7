//! Renders man pages for `buildbay` and each of its subcommands into
//! `OUT_DIR`, for packaging.

use std::env;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use clap::CommandFactory;
use clap_mangen::Man;

#[path = "src/cli/mod.rs"]
mod cli;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut stdout = io::stdout();
    writeln!(stdout, "cargo:rerun-if-changed=build.rs")?;
    writeln!(stdout, "cargo:rerun-if-changed=src/cli/mod.rs")?;

    let out_dir = env::var_os("OUT_DIR")
        .map(PathBuf::from)
        .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "OUT_DIR was not set"))?;

    let command = cli::Cli::command();
    render(&out_dir, "buildbay", command.clone())?;
    for subcommand in command.get_subcommands() {
        let page = format!("buildbay-{}", subcommand.get_name());
        render(&out_dir, &page, subcommand.clone())?;
    }
    Ok(())
}

fn render(out_dir: &Path, page: &str, command: clap::Command) -> io::Result<()> {
    let mut buffer = Vec::new();
    Man::new(command).render(&mut buffer)?;
    fs::write(out_dir.join(format!("{page}.1")), buffer)
}
