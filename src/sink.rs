use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::parser::ImageRef;
use crate::record::Record;
use crate::source::PageImage;

/// Writes page images under one directory as `page{page}_img{counter}.{ext}`.
pub struct ImageStore {
    dir: PathBuf,
}

impl ImageStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(ImageStore { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn store(&self, page: usize, counter: usize, image: &PageImage) -> Result<ImageRef> {
        let name = format!("page{}_img{}.{}", page, counter, image.format.extension());
        let path = self.dir.join(name);
        fs::write(&path, &image.bytes)?;
        Ok(ImageRef::new(path))
    }
}

/// Pretty-printed JSON array of all records.
pub fn write_records(path: &Path, records: &[Record]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut out = BufWriter::new(fs::File::create(path)?);
    serde_json::to_writer_pretty(&mut out, records)?;
    out.flush()?;
    Ok(())
}
