//! ARPACK (arpack-ng): implicitly restarted Arnoldi/Lanczos eigensolvers.
//!
//! Sequential builds expose `{s,d,c,z}{n,s}{aupd,eupd}`; the MPI flavour
//! (PARPACK) prefixes the same routines with `p`.

use anyhow::{Result, bail};
use async_trait::async_trait;
use log::{debug, info};
use std::path::Path;

use super::{Package, PackageContext, PackageDescriptor};
use crate::build::{build_command, configure_options, run_build};
use crate::config::{BuildConfig, Precision, ScalarKind};
use crate::error::PackageError;
use crate::probe::LinkSettings;

/// Whether the PARPACK entry points are wanted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Parallelism {
    /// PETSc runs on the uniprocessor MPI stub
    Sequential,
    Distributed,
}

impl Parallelism {
    pub fn from_mpiuni(mpiuni: bool) -> Self {
        if mpiuni {
            Parallelism::Sequential
        } else {
            Parallelism::Distributed
        }
    }
}

/// The key both candidate tables are looked up by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Variant {
    pub parallelism: Parallelism,
    pub scalar: ScalarKind,
    pub precision: Precision,
}

impl Variant {
    pub fn from_config(config: &BuildConfig) -> Self {
        Self {
            parallelism: Parallelism::from_mpiuni(config.mpiuni),
            scalar: config.scalar,
            precision: config.precision,
        }
    }

    /// Routines that must resolve for this variant.
    pub fn functions(self) -> &'static [&'static str] {
        use Parallelism::*;
        use Precision::*;
        use ScalarKind::*;

        match (self.parallelism, self.scalar, self.precision) {
            (Sequential, Real, Single) => &["snaupd", "sneupd", "ssaupd", "sseupd"],
            (Sequential, Real, Double) => &["dnaupd", "dneupd", "dsaupd", "dseupd"],
            (Sequential, Complex, Single) => &["cnaupd", "cneupd"],
            (Sequential, Complex, Double) => &["znaupd", "zneupd"],
            (Distributed, Real, Single) => &["psnaupd", "psneupd", "pssaupd", "psseupd"],
            (Distributed, Real, Double) => &["pdnaupd", "pdneupd", "pdsaupd", "pdseupd"],
            (Distributed, Complex, Single) => &["pcnaupd", "pcneupd"],
            (Distributed, Complex, Double) => &["pznaupd", "pzneupd"],
        }
    }

    /// Library flag sets to try in order; the first that links wins.
    pub fn library_chain(self) -> &'static [&'static [&'static str]] {
        match self.parallelism {
            Parallelism::Sequential => &[&["-larpack"], &["-larpack_LINUX"], &["-larpack_SUN4"]],
            Parallelism::Distributed => &[
                &["-lparpack", "-larpack"],
                &["-lparpack_MPI", "-larpack"],
                &["-lparpack_MPI-LINUX", "-larpack_LINUX"],
                &["-lparpack_MPI-SUN4", "-larpack_SUN4"],
            ],
        }
    }
}

fn owned(words: &[&str]) -> Vec<String> {
    words.iter().map(|w| w.to_string()).collect()
}

/// Function and library candidates for a detection run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidates {
    pub functions: Vec<String>,
    pub libs: Vec<Vec<String>>,
}

pub struct Arpack {
    descriptor: PackageDescriptor,
}

impl Default for Arpack {
    fn default() -> Self {
        Self::new()
    }
}

impl Arpack {
    pub const GUESS_NAME: &'static str = "Arpack";

    pub fn new() -> Self {
        Self {
            descriptor: PackageDescriptor {
                name: "arpack".to_string(),
                url: "https://github.com/opencollab/arpack-ng/archive/3.3.0.tar.gz".to_string(),
                archive: "arpack-ng-3.3.0.tar.gz".to_string(),
                dirname: "arpack-ng-3.3.0".to_string(),
                installable: true,
                downloadable: true,
                supports_single: true,
            },
        }
    }

    /// Candidates for detection. An explicit library override replaces the
    /// built-in chain as a single set.
    pub fn detection_candidates(
        &self,
        config: &BuildConfig,
        lib_override: Option<&[String]>,
    ) -> Candidates {
        let variant = Variant::from_config(config);
        let libs = match lib_override {
            Some(libs) => vec![libs.to_vec()],
            None => variant.library_chain().iter().map(|set| owned(set)).collect(),
        };
        Candidates {
            functions: owned(variant.functions()),
            libs,
        }
    }

    /// Candidates for verifying a fresh build: the PARPACK entry points and
    /// their library pair, whatever the MPI mode.
    pub fn installed_candidates(&self, config: &BuildConfig) -> Candidates {
        let variant = Variant {
            parallelism: Parallelism::Distributed,
            ..Variant::from_config(config)
        };
        Candidates {
            functions: owned(variant.functions()),
            libs: vec![owned(variant.library_chain()[0])],
        }
    }

    fn require_fortran(&self, config: &BuildConfig) -> Result<()> {
        if config.fc.trim().is_empty() {
            return Err(PackageError::MissingFortranCompiler {
                package: self.descriptor.name.clone(),
            }
            .into());
        }
        Ok(())
    }
}

#[async_trait]
impl Package for Arpack {
    fn descriptor(&self) -> &PackageDescriptor {
        &self.descriptor
    }

    #[tracing::instrument(skip(self, ctx))]
    fn detect(&self, ctx: &PackageContext<'_>) -> Result<Option<LinkSettings>> {
        self.require_fortran(ctx.config)?;

        let candidates = self.detection_candidates(ctx.config, ctx.options.libs.as_deref());
        let dirs = match &ctx.options.dir {
            Some(dir) => vec![dir.clone()],
            None => ctx.prober.guess_dirs(Self::GUESS_NAME),
        };
        debug!(
            "Checking ARPACK for {:?} in {} directories",
            candidates.functions,
            dirs.len()
        );

        ctx.prober.fortran_lib(
            &self.descriptor.name,
            &dirs,
            &candidates.libs,
            &candidates.functions,
        )
    }

    #[tracing::instrument(skip(self, ctx))]
    async fn install(&self, ctx: &PackageContext<'_>, arch_dir: &Path) -> Result<LinkSettings> {
        self.require_fortran(ctx.config)?;

        let extern_dir = arch_dir.join("externalpackages");
        let build_dir = extern_dir.join(&self.descriptor.dirname);
        let source = ctx.options.download_source(&self.descriptor);
        ctx.fetcher
            .fetch(&self.descriptor, &source, &extern_dir, &build_dir)
            .await?;

        let options = configure_options(ctx.config, arch_dir);
        let command = build_command(ctx.config, &options);
        run_build(
            ctx.runtime,
            ctx.log,
            &self.descriptor.name,
            &build_dir,
            &command,
        )?;

        let candidates = self.installed_candidates(ctx.config);
        let dirs = vec![arch_dir.join("lib")];
        match ctx.prober.fortran_lib(
            &self.descriptor.name,
            &dirs,
            &candidates.libs,
            &candidates.functions,
        )? {
            Some(settings) => {
                info!("ARPACK installed in {}", arch_dir.display());
                Ok(settings)
            }
            None => bail!(PackageError::LinkCheckFailed {
                package: self.descriptor.name.clone(),
            }),
        }
    }
}
