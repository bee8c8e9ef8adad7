//! The set of data files a run needs, with their "found" flags.

use chrono::NaiveDate;

use crate::config::ProductConfig;

/// One expected file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequiredFile {
    /// Index into the configured product list.
    pub product: usize,
    pub name: String,
    pub found: bool,
}

/// Expected file names for one date, in product order.
///
/// Complete iff every flag is set; only then may extraction start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequiredFileSet {
    date: NaiveDate,
    files: Vec<RequiredFile>,
}

impl RequiredFileSet {
    /// Compute the file names each product expects for `date`.
    pub fn for_date(products: &[ProductConfig], date: NaiveDate) -> Self {
        let files = products
            .iter()
            .enumerate()
            .map(|(product, cfg)| RequiredFile {
                product,
                name: cfg.file_name(date),
                found: false,
            })
            .collect();
        Self { date, files }
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn contains(&self, name: &str) -> bool {
        self.files.iter().any(|f| f.name == name)
    }

    pub fn is_found(&self, name: &str) -> bool {
        self.files.iter().any(|f| f.name == name && f.found)
    }

    /// Flag `name` as found. Returns `false` when it is not a required name.
    pub fn mark_found(&mut self, name: &str) -> bool {
        let mut hit = false;
        for file in self.files.iter_mut().filter(|f| f.name == name) {
            file.found = true;
            hit = true;
        }
        hit
    }

    pub fn is_complete(&self) -> bool {
        self.files.iter().all(|f| f.found)
    }

    pub fn missing(&self) -> impl Iterator<Item = &RequiredFile> {
        self.files.iter().filter(|f| !f.found)
    }

    pub fn files(&self) -> &[RequiredFile] {
        &self.files
    }
}
