//! The TRIM pipeline: mode selection → device resolution → free-extent
//! discovery → batching and issuing. Each stage finishes before the next.

pub mod batch;
pub mod cleanup;
pub mod mode;
pub mod provider;
pub mod resolver;

use crate::config::Config;
use crate::error::{TrimError, TrimResult};
use crate::models::device::FsType;
use crate::models::summary::RunSummary;
use crate::models::target::Target;
use crate::ports::{DeviceProbe, FsProbe, MountRegistry, SpaceAllocator, TrimExecutor};
use batch::TrimIssuer;
use mode::{OperatingMode, Selection};
use provider::FreeSpaceProvider;
use std::sync::atomic::{AtomicBool, Ordering};

/// Everything the pipeline talks to outside the process.
pub struct Ports<'a> {
    pub mounts:  &'a dyn MountRegistry,
    pub devices: &'a dyn DeviceProbe,
    pub fs:      &'a dyn FsProbe,
    pub space:   &'a dyn SpaceAllocator,
    pub trim:    &'a mut dyn TrimExecutor,
}

pub struct RunOptions<'a> {
    /// Issue destructive commands; otherwise only report them
    pub commit: bool,
    /// Set asynchronously to abandon the run
    pub cancel: &'a AtomicBool,
}

pub fn run(target: Target, cfg: &Config, opts: &RunOptions<'_>, ports: Ports<'_>) -> TrimResult<RunSummary> {
    let space = ports.space;
    let result = run_stages(target, cfg, opts, ports);
    if !opts.cancel.load(Ordering::SeqCst) {
        return result;
    }
    match &result {
        Err(e) => log::debug!("run interrupted ({})", e),
        Ok(_) => log::debug!("run interrupted after the last batch"),
    }
    space.sync();
    Err(TrimError::Interrupted)
}

fn run_stages(target: Target, cfg: &Config, opts: &RunOptions<'_>, ports: Ports<'_>) -> TrimResult<RunSummary> {
    let started_at = chrono::Local::now();

    let table = mode::load_mount_table(ports.mounts)?;
    let sel = mode::select(&target, &table)?;
    let fs_type = detect_fs_type(&sel, ports.fs)?;
    log::info!("{} filesystem on {}", fs_type, sel.fs_device.display());

    let device = resolver::resolve(&sel.fs_device, ports.devices, opts.commit)?;

    let provider = FreeSpaceProvider::prepare(&sel, &fs_type, &device, ports.fs, ports.space, &cfg.online)?;
    if let FreeSpaceProvider::Online(p) = &provider {
        log::info!("free space claimed by {}", p.temp_file().display());
    }
    let stats = {
        let mut issuer = TrimIssuer::new(device.raw.clone(), opts.commit, ports.trim);
        batch::drain(provider.extents(), &cfg.limits, &mut issuer, opts.cancel)?
    };
    drop(provider);

    Ok(RunSummary {
        started_at,
        target,
        mode: sel.mode,
        fs_device: sel.fs_device,
        fs_type,
        device,
        committed: opts.commit,
        stats,
    })
}

/// Mounted filesystems report their type in the mount table; unmounted
/// ones are identified by signature.
fn detect_fs_type(sel: &Selection, fs: &dyn FsProbe) -> TrimResult<FsType> {
    if let Some(m) = &sel.mount {
        return Ok(FsType::from_name(&m.fs_type));
    }
    if sel.mode == OperatingMode::Online {
        return Err(TrimError::FilesystemTypeUnknown(sel.fs_device.clone()));
    }
    match fs.fs_type(&sel.fs_device)? {
        Some(name) if !name.trim().is_empty() => Ok(FsType::from_name(&name)),
        _ => Err(TrimError::FilesystemTypeUnknown(sel.fs_device.clone())),
    }
}
