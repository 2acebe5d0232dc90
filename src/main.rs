mod collectors;
mod config;
mod engine;
mod error;
mod models;
mod ports;
mod util;

use anyhow::Result;
use clap::Parser;
use collectors::{blockdev::SysBlock, filesystem::LocalSpace, fstools::FsTools, hdparm::Hdparm, mounts::ProcMounts};
use config::Config;
use engine::{Ports, RunOptions};
use error::TrimError;
use models::target::Target;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "trimsweep", about = "TRIM the free space of an ext2/3/4 or xfs filesystem", version)]
struct Cli {
    /// Mounted directory or filesystem block device
    #[arg(required_unless_present = "config")]
    target: Option<PathBuf>,

    /// Actually issue TRIM commands (default is a dry run)
    #[arg(long)]
    commit: bool,

    /// More log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Print a JSON summary of the run instead of the text report
    #[arg(long)]
    json: bool,

    /// Print config file path and current values, then exit
    #[arg(long)]
    config: bool,

    /// Skip the root and tool presence checks
    #[arg(long)]
    no_preflight: bool,
}

fn main() {
    let cli = Cli::parse();
    util::logger::init(cli.verbose);

    if cli.config {
        if let Err(e) = run_print_config() {
            eprintln!("trimsweep: {:#}", e);
            std::process::exit(1);
        }
        return;
    }

    let cfg = Config::load();
    match run(&cli, &cfg) {
        Ok(()) => {}
        Err(e) => {
            eprintln!("trimsweep: {}", e);
            std::process::exit(e.exit_code());
        }
    }
}

fn run(cli: &Cli, cfg: &Config) -> Result<(), TrimError> {
    let cancel = engine::cleanup::install_signal_handlers()?;

    if !cli.no_preflight {
        util::preflight::check(&cfg.tools)?;
    }
    let path = cli.target.as_deref().ok_or_else(|| TrimError::TargetInvalid {
        path: PathBuf::new(),
        reason: "no target given".into(),
    })?;
    let target = Target::classify(path)?;

    let hdparm = Hdparm::new(&cfg.tools.hdparm);
    let mounts = ProcMounts::new(&cfg.tools.df);
    let devices = SysBlock::new(hdparm.clone());
    let fs = FsTools::new(cfg.tools.clone());
    let space = LocalSpace::new(hdparm.clone());
    let mut trim = hdparm;

    if cli.commit {
        log::warn!("committing: TRIM commands will be issued to the device");
    }
    let summary = engine::run(
        target,
        cfg,
        &RunOptions { commit: cli.commit, cancel },
        Ports { mounts: &mounts, devices: &devices, fs: &fs, space: &space, trim: &mut trim },
    )?;

    if cli.json {
        let text = serde_json::to_string_pretty(&summary)
            .map_err(|e| TrimError::Io(e.into()))?;
        println!("{}", text);
    } else {
        print!("{}", util::report::generate(&summary));
    }
    Ok(())
}

fn run_print_config() -> Result<()> {
    let cfg = Config::load();
    let path = Config::config_path()
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_else(|| "(unknown)".to_string());
    println!("Config: {}", path);
    println!();
    print!("{}", toml::to_string_pretty(&cfg)?);
    Ok(())
}
