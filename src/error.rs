//! Package-level failures that callers need to tell apart.

use crate::config::Precision;

/// Errors raised while detecting or installing an external package.
///
/// These travel inside `anyhow::Error`; callers recover them with
/// `downcast_ref::<PackageError>()`.
#[derive(Debug)]
pub enum PackageError {
    /// The bootstrap/configure/make/install chain exited with a failure.
    /// Fatal for the whole configure run.
    BuildFailed {
        package: String,
        status: Option<i32>,
        output: String,
    },
    /// None of the candidate directories and libraries provided the
    /// required symbols.
    LinkCheckFailed { package: String },
    UnsupportedPrecision { package: String, precision: Precision },
    NotDownloadable { package: String },
    MissingFortranCompiler { package: String },
    UnknownPackage(String),
}

impl PackageError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, PackageError::BuildFailed { .. })
    }
}

impl std::fmt::Display for PackageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PackageError::BuildFailed { package, .. } => {
                write!(f, "installation of {} failed.", package.to_uppercase())
            }
            PackageError::LinkCheckFailed { package } => {
                write!(f, "Unable to link with {} library", package.to_uppercase())
            }
            PackageError::UnsupportedPrecision { package, precision } => write!(
                f,
                "{} does not support {} precision",
                package.to_uppercase(),
                precision
            ),
            PackageError::NotDownloadable { package } => write!(
                f,
                "{} cannot be downloaded and built automatically",
                package.to_uppercase()
            ),
            PackageError::MissingFortranCompiler { package } => write!(
                f,
                "{} requires a Fortran compiler; set FC in petscvariables or pass --fc",
                package.to_uppercase()
            ),
            PackageError::UnknownPackage(name) => write!(f, "Unknown package: {}", name),
        }
    }
}

impl std::error::Error for PackageError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_failed_display_and_fatality() {
        let err = PackageError::BuildFailed {
            package: "arpack".to_string(),
            status: Some(2),
            output: "configure: error: no Fortran".to_string(),
        };
        assert_eq!(err.to_string(), "installation of ARPACK failed.");
        assert!(err.is_fatal());
    }

    #[test]
    fn test_non_fatal_errors() {
        let err = PackageError::LinkCheckFailed {
            package: "arpack".to_string(),
        };
        assert_eq!(err.to_string(), "Unable to link with ARPACK library");
        assert!(!err.is_fatal());

        let err = PackageError::UnsupportedPrecision {
            package: "blopex".to_string(),
            precision: Precision::Single,
        };
        assert_eq!(err.to_string(), "BLOPEX does not support single precision");
    }

    #[test]
    fn test_downcast_through_anyhow() {
        let err = anyhow::Error::from(PackageError::UnknownPackage("feast".to_string()));
        assert!(matches!(
            err.downcast_ref::<PackageError>(),
            Some(PackageError::UnknownPackage(name)) if name == "feast"
        ));
    }
}
