use anyhow::Result;
use clap::{crate_version, App, Arg};
use kiln::build::build_site;
use kiln::config::Config;
use std::path::{Path, PathBuf};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let matches = App::new("kiln")
        .version(crate_version!())
        .about("Builds a static blog from markdown posts and page templates")
        .arg(
            Arg::with_name("project")
                .long("project")
                .short("p")
                .takes_value(true)
                .value_name("DIR")
                .help("A directory at or below the one containing `kiln.yaml`"),
        )
        .arg(
            Arg::with_name("output")
                .long("output")
                .short("o")
                .takes_value(true)
                .value_name("DIR")
                .help("Overrides the configured output directory"),
        )
        .get_matches();

    let project = match matches.value_of("project") {
        Some(dir) => PathBuf::from(dir),
        None => std::env::current_dir()?,
    };
    let config = Config::from_directory(
        &project.canonicalize()?,
        matches.value_of("output").map(Path::new),
    )?;
    build_site(&config)?;
    Ok(())
}
