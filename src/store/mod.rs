use std::fs;
use std::io::ErrorKind;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, Utc};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use log::*;

mod store_error;
pub use store_error::StoreError;

use crate::defaults::{JPEG_QUALITY, TIMESTAMP_FMT};
use crate::drivers::device::Frame;
use crate::model::{Fingerprint, Rotation};

pub type Result<T> = std::result::Result<T, StoreError>;

/// One image written to the store
#[derive(Debug, Clone)]
pub struct CaptureRecord {
    path: PathBuf,
    taken_at: DateTime<Utc>,
    bytes: Vec<u8>,
}

impl CaptureRecord {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn taken_at(&self) -> DateTime<Utc> {
        self.taken_at
    }

    /// The encoded JPEG, exactly as written to disk
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// What a retention pass did
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RetentionReport {
    pub kept: usize,
    pub deleted: usize,
    /// Files named after the fingerprint whose timestamp didn't parse
    pub skipped: usize,
}

/// The directory of captured images.
///
/// Files are named `{fingerprint}_{timestamp}.jpg`, so one directory can be
/// shared by several cameras; retention only ever looks at one fingerprint.
#[derive(Debug, Clone)]
pub struct ImageStore {
    dir: PathBuf,
    width: Option<u32>,
}

impl ImageStore {
    /// Opens the image directory, creating it if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        trace!("Using {} as the image location", dir.display());

        if dir.exists() {
            // And make sure it's actually a dir
            if !dir.is_dir() {
                error!("Path {} is not a directory", dir.display());
                return Err(StoreError::NotADirectory(dir));
            }
        } else {
            fs::create_dir_all(&dir).map_err(StoreError::io(&dir))?;
            info!("Created image directory {}", dir.display());
        }

        Ok(ImageStore { dir, width: None })
    }

    /// Scale every saved image down (or up) to this width, keeping the aspect ratio
    pub fn with_width(mut self, width: Option<u32>) -> Self {
        self.width = width.filter(|w| *w > 0);
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn file_name(fingerprint: &Fingerprint, taken_at: &DateTime<Utc>) -> String {
        format!("{}_{}.jpg", fingerprint, taken_at.format(TIMESTAMP_FMT))
    }

    /// Rotates, encodes and writes one frame.
    pub fn save(&self, fingerprint: &Fingerprint, frame: Frame, rotation: Rotation) -> Result<CaptureRecord> {
        self.save_at(fingerprint, frame, rotation, Utc::now())
    }

    pub fn save_at(
        &self,
        fingerprint: &Fingerprint,
        frame: Frame,
        rotation: Rotation,
        taken_at: DateTime<Utc>,
    ) -> Result<CaptureRecord> {
        let frame = rotation.apply(frame);

        let frame = match self.width {
            Some(width) if width != frame.width() && frame.width() > 0 => {
                let height = (frame.height() as f64 * width as f64 / frame.width() as f64)
                    .round()
                    .max(1.0) as u32;
                trace!("Resizing {}x{} to {}x{}", frame.width(), frame.height(), width, height);
                frame.resize_exact(width, height, FilterType::Lanczos3)
            }
            _ => frame,
        };

        // JPEG has no alpha channel
        let rgb = frame.to_rgb8();
        let mut bytes = Vec::new();
        JpegEncoder::new_with_quality(&mut bytes, JPEG_QUALITY).encode_image(&rgb)?;

        let path = self.dir.join(Self::file_name(fingerprint, &taken_at));
        trace!("Writing captured image to {}", path.display());
        fs::write(&path, &bytes).map_err(StoreError::io(&path))?;

        debug!("Saved image {} ({} bytes)", path.display(), bytes.len());
        Ok(CaptureRecord {
            path,
            taken_at,
            bytes,
        })
    }

    /// Deletes the oldest images of `fingerprint` until at most `max_images` remain.
    ///
    /// Files whose timestamp doesn't parse are left alone. A file that vanished
    /// between listing and deleting counts as deleted.
    pub fn enforce_retention(&self, fingerprint: &Fingerprint, max_images: NonZeroUsize) -> Result<RetentionReport> {
        let prefix = format!("{}_", fingerprint);
        let mut report = RetentionReport::default();
        let mut stamped: Vec<(NaiveDateTime, PathBuf)> = Vec::new();

        for entry in fs::read_dir(&self.dir).map_err(StoreError::io(&self.dir))? {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Couldn't read an entry of {}: {e}", self.dir.display());
                    continue;
                }
            };

            let path = entry.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let Some(stamp) = name
                .strip_prefix(&prefix)
                .and_then(|rest| rest.strip_suffix(".jpg"))
            else {
                continue;
            };

            match NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FMT) {
                Ok(taken_at) => stamped.push((taken_at, path)),
                Err(e) => {
                    warn!("Skipping {name}: `{stamp}` is not a timestamp ({e})");
                    report.skipped += 1;
                }
            }
        }

        let max = max_images.get();
        if stamped.len() <= max {
            report.kept = stamped.len();
            trace!("{} image(s) for {fingerprint}, nothing to delete", report.kept);
            return Ok(report);
        }

        stamped.sort();
        let excess = stamped.len() - max;
        report.kept = max;

        let (deleted, first_failure) = delete_oldest(stamped.drain(..excess).map(|(_, path)| path));
        report.deleted = deleted;

        debug!("Deleted {} image(s) for {fingerprint}", report.deleted);
        match first_failure {
            Some(e) => Err(e),
            None => Ok(report),
        }
    }
}

/// Removes every path, carrying on past failures. Returns how many are gone
/// and the first failure, if any. Already missing counts as gone.
fn delete_oldest(paths: impl IntoIterator<Item = PathBuf>) -> (usize, Option<StoreError>) {
    let mut deleted = 0;
    let mut first_failure = None;
    for path in paths {
        match fs::remove_file(&path) {
            Ok(()) => deleted += 1,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("{} was already removed", path.display());
                deleted += 1;
            }
            Err(e) => {
                error!("Couldn't remove {}: {e}", path.display());
                first_failure.get_or_insert(StoreError::IoError { path, source: e });
            }
        }
    }
    (deleted, first_failure)
}
