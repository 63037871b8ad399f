//! Entry points behind the `check`, `install` and `list` subcommands.

use anyhow::{Result, bail};
use log::{debug, info};
use std::path::Path;

use crate::config::BuildConfig;
use crate::configure_log::FileLog;
use crate::download::ArchiveFetcher;
use crate::error::PackageError;
use crate::http::HttpClient;
use crate::package::{Package, PackageContext, PackageOptions, PackageRegistry};
use crate::probe::{FortranLinkProbe, LinkSettings};
use crate::runtime::Runtime;

pub mod output;

use output::ConfigureReport;

/// Look for an existing installation of `name` and record the result.
#[tracing::instrument(skip(runtime, config, options))]
pub fn check<R: Runtime>(
    runtime: &R,
    config: &BuildConfig,
    arch_dir: &Path,
    name: &str,
    options: &PackageOptions,
) -> Result<LinkSettings> {
    let registry = PackageRegistry::with_builtin();
    let package = registry.get(name)?;

    let log = FileLog::new(runtime, arch_dir);
    let prober = FortranLinkProbe::new(runtime, config, &log);
    let fetcher = ArchiveFetcher::new(runtime, HttpClient::with_defaults()?);
    let ctx = PackageContext {
        config,
        options,
        runtime,
        prober: &prober,
        fetcher: &fetcher,
        log: &log,
    };

    check_package(package.as_ref(), &ctx, arch_dir)
}

/// Download, build and verify `name` inside `arch_dir`, then record it.
#[tracing::instrument(skip(runtime, config, options))]
pub async fn install<R: Runtime>(
    runtime: &R,
    config: &BuildConfig,
    arch_dir: &Path,
    name: &str,
    options: &PackageOptions,
) -> Result<LinkSettings> {
    let registry = PackageRegistry::with_builtin();
    let package = registry.get(name)?;

    let log = FileLog::new(runtime, arch_dir);
    let prober = FortranLinkProbe::new(runtime, config, &log);
    let fetcher = ArchiveFetcher::new(runtime, HttpClient::with_defaults()?);
    let ctx = PackageContext {
        config,
        options,
        runtime,
        prober: &prober,
        fetcher: &fetcher,
        log: &log,
    };

    install_package(package.as_ref(), &ctx, arch_dir).await
}

pub fn check_package(
    package: &dyn Package,
    ctx: &PackageContext<'_>,
    arch_dir: &Path,
) -> Result<LinkSettings> {
    let descriptor = package.descriptor();
    descriptor.check_precision(ctx.config.precision)?;
    ctx.log.write(&banner("Checking", &descriptor.name))?;

    match package.detect(ctx)? {
        Some(settings) => {
            info!("Found {} with {}", descriptor.name, settings.lib_line());
            output::record(
                ctx.runtime,
                arch_dir,
                ConfigureReport::found(settings.clone(), ctx.config),
            )?;
            Ok(settings)
        }
        None => {
            output::record(
                ctx.runtime,
                arch_dir,
                ConfigureReport::missing(&descriptor.name, ctx.config),
            )?;
            bail!(PackageError::LinkCheckFailed {
                package: descriptor.name.clone(),
            })
        }
    }
}

pub async fn install_package(
    package: &dyn Package,
    ctx: &PackageContext<'_>,
    arch_dir: &Path,
) -> Result<LinkSettings> {
    let descriptor = package.descriptor();
    descriptor.check_installable()?;
    descriptor.check_precision(ctx.config.precision)?;
    ctx.log.write(&banner("Installing", &descriptor.name))?;

    let result = package.install(ctx, arch_dir).await;
    match result {
        Ok(settings) => {
            output::record(
                ctx.runtime,
                arch_dir,
                ConfigureReport::found(settings.clone(), ctx.config),
            )?;
            Ok(settings)
        }
        Err(e) => {
            // A build that ran but produced nothing usable still leaves a record.
            if let Some(PackageError::LinkCheckFailed { .. }) = e.downcast_ref::<PackageError>() {
                output::record(
                    ctx.runtime,
                    arch_dir,
                    ConfigureReport::missing(&descriptor.name, ctx.config),
                )?;
            }
            Err(e)
        }
    }
}

/// Print every package this tool can handle.
pub fn list() -> Result<()> {
    let registry = PackageRegistry::with_builtin();
    debug!("{} package(s) registered", registry.len());
    for package in registry.iter() {
        println!("{}", describe(package.as_ref()));
    }
    Ok(())
}

fn describe(package: &dyn Package) -> String {
    let d = package.descriptor();
    let mut traits = Vec::new();
    if d.installable && d.downloadable {
        traits.push("installable");
    }
    if !d.supports_single {
        traits.push("double only");
    }
    if traits.is_empty() {
        format!("{:<10} {}", d.name, d.url)
    } else {
        format!("{:<10} {} ({})", d.name, d.url, traits.join(", "))
    }
}

fn banner(action: &str, name: &str) -> String {
    format!(
        "{}\n{} {} library...",
        "=".repeat(80),
        action,
        name.to_uppercase()
    )
}
