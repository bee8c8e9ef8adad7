//! Stale-file fallback. Reuses the previous trading day's data files for
//! whatever the mailbox scan did not deliver.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;

use super::required::RequiredFileSet;
use crate::config::ProductConfig;
use crate::error::FallbackError;

/// OLE2 compound document (legacy `.xls`).
const OLE2_MAGIC: [u8; 4] = [0xD0, 0xCF, 0x11, 0xE0];
/// ZIP container (`.xlsx`).
const ZIP_MAGIC: [u8; 4] = *b"PK\x03\x04";

/// One substitution made by the fallback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Substitution {
    pub from: PathBuf,
    pub to: PathBuf,
}

/// Copies the previous day's files under today's expected names.
#[derive(Debug)]
pub struct FallbackResolver<'a> {
    products: &'a [ProductConfig],
    dir: &'a Path,
}

impl<'a> FallbackResolver<'a> {
    pub fn new(products: &'a [ProductConfig], dir: &'a Path) -> Self {
        Self { products, dir }
    }

    /// Fill every missing entry of `required` from `prev_date`'s file.
    ///
    /// Stops at the first missing or damaged source; files copied before
    /// that stay in place.
    pub fn resolve(
        &self,
        required: &mut RequiredFileSet,
        prev_date: NaiveDate,
    ) -> Result<Vec<Substitution>, FallbackError> {
        let missing: Vec<(usize, String)> = required
            .missing()
            .map(|f| (f.product, f.name.clone()))
            .collect();

        let mut done = Vec::with_capacity(missing.len());
        for (product, expected) in missing {
            let Some(cfg) = self.products.get(product) else {
                return Err(FallbackError::UnknownProduct { name: expected });
            };
            let from = self.dir.join(cfg.file_name(prev_date));
            let to = self.dir.join(&expected);

            verify_source(&from)?;
            std::fs::copy(&from, &to).map_err(|source| FallbackError::Copy {
                from: from.clone(),
                to: to.clone(),
                source,
            })?;
            required.mark_found(&expected);

            tracing::warn!(
                from = %from.display(),
                to = %to.display(),
                "Substituted previous trading day's data file"
            );
            done.push(Substitution { from, to });
        }
        Ok(done)
    }
}

/// Existence and integrity check for a fallback source.
fn verify_source(path: &Path) -> Result<(), FallbackError> {
    let corrupt = |reason: &str| FallbackError::CorruptFallbackSource {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    };

    let meta = match std::fs::metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(FallbackError::MissingFallbackSource {
                path: path.to_path_buf(),
            });
        }
        Err(e) => return Err(corrupt(&e.to_string())),
    };
    if !meta.is_file() {
        return Err(corrupt("not a regular file"));
    }
    if meta.len() == 0 {
        return Err(corrupt("file is empty"));
    }

    let mut magic = [0u8; 4];
    File::open(path)
        .and_then(|mut f| f.read_exact(&mut magic))
        .map_err(|e| corrupt(&e.to_string()))?;
    if magic != OLE2_MAGIC && magic != ZIP_MAGIC {
        return Err(corrupt("not a spreadsheet workbook"));
    }
    Ok(())
}
