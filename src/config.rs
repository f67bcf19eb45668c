//! Everything the loop needs to know, validated once at startup.
//!
//! Settings come either from flags or from a JSON file passed with `--json`.
//! The file takes the same keys as the long flag names:
//!
//! ```json
//! {
//!     "token": "...",
//!     "name": "mk4",
//!     "fingerprint": "at-least-sixteen-characters",
//!     "ip": "192.168.1.20",
//!     "apikey": "...",
//!     "directory": "/var/lib/prusacam",
//!     "maximages": 500,
//!     "rotate": 180,
//!     "camera": "usb-046d_HD_Webcam_C615-video-index0"
//! }
//! ```
use std::fs;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use clap::Parser;
use log::*;
use serde::Deserialize;

use crate::defaults::{self, DEFAULT_MAX_IMAGES, DEFAULT_PRINTER_NAME, MIN_FINGERPRINT_LEN, SNAPSHOT_URL};
use crate::drivers::DeviceError;
use crate::model::{Fingerprint, Rotation};
use crate::remote::{RemoteError, SnapshotUploader, StatusClient};
use crate::store::{ImageStore, StoreError};

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("Fingerprint needs to be at least {MIN_FINGERPRINT_LEN} characters long, got {0}")]
    FingerprintTooShort(usize),
    #[error("Fingerprint can only contain printable ASCII without `/` or `\\`, found {0:?}")]
    BadFingerprint(char),
    #[error("Rotation `{0}` is not allowed, needs to be a multiple of 90")]
    BadRotation(String),
    #[error("Maximum number of images needs to be at least 1")]
    ZeroMaxImages,
    #[error("Missing required setting `{0}`")]
    Missing(&'static str),
    #[error("Could not read configuration file {path}: {source}")]
    FileError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid configuration file {path}: {source}")]
    JsonError {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Image directory: {0}")]
    Directory(#[from] StoreError),
    #[error("Camera `{camera}` could not be verified: {source}")]
    Camera {
        camera: String,
        #[source]
        source: DeviceError,
    },
    #[error("HTTP client: {0}")]
    Remote(#[from] RemoteError),
    #[error("Could not set up logging: {0}")]
    Logging(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Capture webcam snapshots for Prusa Connect, more often while the printer is printing.
///
/// Either pass the settings as flags, or put them in a JSON file and pass
/// that with `--json`.
#[derive(Parser, Debug, Clone)]
#[command(name = "prusacam", version)]
pub struct Cli {
    /// Token created by Prusa Connect
    #[arg(short, long)]
    pub token: Option<String>,

    /// Printer name, used in the logs
    #[arg(short, long, default_value = DEFAULT_PRINTER_NAME)]
    pub name: String,

    /// Unique fingerprint, at least 16 characters long
    #[arg(short, long)]
    pub fingerprint: Option<String>,

    /// Local address of the printer, to check the print status
    #[arg(short, long)]
    pub ip: Option<String>,

    /// PrusaLink API key, found on the printer settings page of Prusa Connect
    #[arg(short = 'k', long)]
    pub apikey: Option<String>,

    /// Directory to store images in [default: $PRUSACAM_IMG_DIR or ./img]
    #[arg(short, long)]
    pub directory: Option<PathBuf>,

    /// Maximum number of images for this camera to keep in the image directory
    #[arg(short, long, default_value_t = DEFAULT_MAX_IMAGES)]
    pub maximages: usize,

    /// JSON configuration file; replaces the settings above
    #[arg(short, long)]
    pub json: Option<PathBuf>,

    /// Rotate images by this many degrees, a multiple of 90
    #[arg(short, long, default_value = "0", allow_hyphen_values = true)]
    pub rotate: String,

    /// Camera device: a path, or a name under /dev/v4l/by-id/. Omit for the Pi camera
    #[arg(short, long)]
    pub camera: Option<String>,

    /// Resize images to this width before saving and uploading
    #[arg(short, long)]
    pub width: Option<u32>,

    /// Snapshot endpoint
    #[arg(long, default_value = SNAPSHOT_URL)]
    pub upload_url: String,

    /// Append logs to this file [default: <NAME>.log]. `-` logs to stderr
    #[arg(short, long)]
    pub log_file: Option<PathBuf>,
}

/// Shape of the `--json` file
#[derive(Debug, Deserialize)]
struct FileConfig {
    token: String,
    #[serde(default)]
    name: Option<String>,
    fingerprint: String,
    ip: String,
    apikey: String,
    directory: PathBuf,
    #[serde(default)]
    maximages: Option<usize>,
    #[serde(default)]
    rotate: Option<f64>,
    #[serde(default)]
    camera: Option<String>,
    #[serde(default)]
    width: Option<u32>,
    #[serde(default)]
    upload_url: Option<String>,
    #[serde(default)]
    logfile: Option<PathBuf>,
}

/// The validated settings for one run. Never changes after startup.
#[derive(Clone)]
pub struct Session {
    pub name: String,
    pub token: String,
    pub fingerprint: Fingerprint,
    pub ip: String,
    pub api_key: String,
    pub upload_url: String,
    pub directory: PathBuf,
    pub max_images: NonZeroUsize,
    pub rotation: Rotation,
    pub width: Option<u32>,
    pub camera: Option<String>,
    pub log_file: Option<PathBuf>,
}

// Hand-written so the token and API key never end up in a log line
impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("name", &self.name)
            .field("fingerprint", &self.fingerprint)
            .field("ip", &self.ip)
            .field("upload_url", &self.upload_url)
            .field("directory", &self.directory)
            .field("max_images", &self.max_images)
            .field("rotation", &self.rotation)
            .field("width", &self.width)
            .field("camera", &self.camera)
            .field("log_file", &self.log_file)
            .finish_non_exhaustive()
    }
}

fn max_images(value: usize) -> Result<NonZeroUsize> {
    NonZeroUsize::new(value).ok_or(ConfigError::ZeroMaxImages)
}

fn required(value: Option<String>, name: &'static str) -> Result<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ConfigError::Missing(name)),
    }
}

/// Where the logs go: `<name>.log` unless told otherwise, `None` for stderr
pub fn log_destination(given: Option<PathBuf>, name: &str) -> Option<PathBuf> {
    match given {
        Some(path) if path.as_os_str() == "-" => None,
        Some(path) => Some(path),
        None => Some(PathBuf::from(format!("{name}.log"))),
    }
}

impl Session {
    /// Reads the JSON file when one is given, the flags otherwise
    pub fn load(cli: Cli) -> Result<Self> {
        match cli.json.clone() {
            Some(path) => Self::from_file(&path, cli),
            None => Self::from_cli(cli),
        }
    }

    pub fn from_cli(cli: Cli) -> Result<Self> {
        // Cheap checks first, so nothing touches the network or the camera with bad input
        let fingerprint = Fingerprint::new(&required(cli.fingerprint, "fingerprint")?)?;
        let rotation: Rotation = cli.rotate.parse()?;
        let max_images = max_images(cli.maximages)?;
        let log_file = log_destination(cli.log_file, &cli.name);

        Ok(Session {
            name: cli.name,
            token: required(cli.token, "token")?,
            fingerprint,
            ip: required(cli.ip, "ip")?,
            api_key: required(cli.apikey, "apikey")?,
            upload_url: cli.upload_url,
            directory: cli
                .directory
                .unwrap_or_else(|| PathBuf::from(defaults::img_dir())),
            max_images,
            rotation,
            width: cli.width,
            camera: cli.camera,
            log_file,
        })
    }

    /// The file wins for every key it sets; the flags only fill in the
    /// upload URL and log file when the file leaves them out.
    pub fn from_file(path: &Path, cli: Cli) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::FileError {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text, path, cli)
    }

    pub fn from_json(text: &str, path: &Path, cli: Cli) -> Result<Self> {
        let file: FileConfig = serde_json::from_str(text).map_err(|source| ConfigError::JsonError {
            path: path.to_path_buf(),
            source,
        })?;

        let fingerprint = Fingerprint::new(&file.fingerprint)?;
        let rotation = match file.rotate {
            Some(degrees) => Rotation::from_float(degrees)?,
            None => Rotation::None,
        };
        let max_images = max_images(file.maximages.unwrap_or(DEFAULT_MAX_IMAGES))?;

        let name = file.name.unwrap_or_else(|| String::from(DEFAULT_PRINTER_NAME));
        let log_file = log_destination(file.logfile.or(cli.log_file), &name);

        Ok(Session {
            name,
            token: required(Some(file.token), "token")?,
            fingerprint,
            ip: required(Some(file.ip), "ip")?,
            api_key: required(Some(file.apikey), "apikey")?,
            upload_url: file.upload_url.unwrap_or(cli.upload_url),
            directory: file.directory,
            max_images,
            rotation,
            width: file.width.or(cli.width),
            camera: file.camera,
            log_file,
        })
    }

    /// Makes sure the image directory exists and is a directory
    pub fn open_store(&self) -> Result<ImageStore> {
        Ok(ImageStore::open(&self.directory)?.with_width(self.width))
    }

    pub fn status_client(&self) -> Result<StatusClient> {
        Ok(StatusClient::new(&self.ip, &self.api_key, defaults::http_timeout())?)
    }

    pub fn uploader(&self) -> Result<SnapshotUploader> {
        Ok(SnapshotUploader::new(
            &self.upload_url,
            &self.token,
            &self.fingerprint,
            defaults::http_timeout(),
        )?)
    }

    pub fn log_summary(&self) {
        info!(
            "Configuration loaded: printer = {}, fingerprint = {}, status = http://{}, images = {} (max {}), rotation = {}, camera = {}",
            self.name,
            self.fingerprint,
            self.ip,
            self.directory.display(),
            self.max_images,
            self.rotation,
            self.camera.as_deref().unwrap_or("raspistill"),
        );
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    const FP: &str = "0123456789abcdef-fp";

    fn cli(args: &[&str]) -> Cli {
        let mut full = vec!["prusacam"];
        full.extend_from_slice(args);
        Cli::try_parse_from(full).unwrap()
    }

    fn full_cli(extra: &[&str]) -> Cli {
        let mut args = vec!["-t", "tok", "-f", FP, "-i", "10.0.0.5", "-k", "key", "-d", "/tmp/prusacam-test"];
        args.extend_from_slice(extra);
        cli(&args)
    }

    #[test]
    fn test_flags_make_a_session() {
        let session = Session::load(full_cli(&["-r", "270", "-m", "25", "-c", "cam0", "-n", "mk4"])).unwrap();
        assert_eq!(session.name, "mk4");
        assert_eq!(session.token, "tok");
        assert_eq!(session.fingerprint.as_str(), FP);
        assert_eq!(session.ip, "10.0.0.5");
        assert_eq!(session.api_key, "key");
        assert_eq!(session.directory, PathBuf::from("/tmp/prusacam-test"));
        assert_eq!(session.max_images.get(), 25);
        assert_eq!(session.rotation, Rotation::CounterClockwise90);
        assert_eq!(session.camera.as_deref(), Some("cam0"));
        assert_eq!(session.upload_url, SNAPSHOT_URL);
    }

    #[test]
    fn test_defaults() {
        let session = Session::load(full_cli(&[])).unwrap();
        assert_eq!(session.name, DEFAULT_PRINTER_NAME);
        assert_eq!(session.max_images.get(), DEFAULT_MAX_IMAGES);
        assert_eq!(session.rotation, Rotation::None);
        assert!(session.camera.is_none());
    }

    #[test]
    fn test_short_fingerprint_fails_first() {
        // Everything else is missing too, but the fingerprint is checked first
        let err = Session::load(cli(&["-f", "short"])).unwrap_err();
        assert!(matches!(err, ConfigError::FingerprintTooShort(5)));
    }

    #[test]
    fn test_fingerprint_with_a_path_fails_at_load() {
        let args = ["-t", "tok", "-f", "printer/camera-0001", "-i", "10.0.0.5", "-k", "key"];
        let err = Session::load(cli(&args)).unwrap_err();
        assert!(matches!(err, ConfigError::BadFingerprint('/')));
    }

    #[test]
    fn test_logs_go_to_a_file_named_after_the_printer() {
        let session = Session::load(full_cli(&["-n", "mk4"])).unwrap();
        assert_eq!(session.log_file, Some(PathBuf::from("mk4.log")));

        let session = Session::load(full_cli(&["-l", "/var/log/prusacam.log"])).unwrap();
        assert_eq!(session.log_file, Some(PathBuf::from("/var/log/prusacam.log")));

        let session = Session::load(full_cli(&["-l", "-"])).unwrap();
        assert_eq!(session.log_file, None);
    }

    #[test]
    fn test_bad_rotation() {
        for r in ["45", "100", "-10", "x"] {
            let err = Session::load(full_cli(&["-r", r])).unwrap_err();
            assert!(matches!(err, ConfigError::BadRotation(_)), "{r}");
        }
        assert_eq!(Session::load(full_cli(&["-r", "-90"])).unwrap().rotation, Rotation::CounterClockwise90);
    }

    #[test]
    fn test_zero_max_images() {
        let err = Session::load(full_cli(&["-m", "0"])).unwrap_err();
        assert!(matches!(err, ConfigError::ZeroMaxImages));
    }

    #[test]
    fn test_missing_required() {
        let err = Session::load(cli(&["-f", FP, "-i", "10.0.0.5", "-k", "key"])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("token")));
    }

    #[test]
    fn test_json_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("printer.json");
        fs::write(
            &path,
            format!(
                r#"{{
                    "token": "tok",
                    "name": "mk3s",
                    "fingerprint": "{FP}",
                    "ip": "10.0.0.6",
                    "apikey": "key",
                    "directory": "/tmp/prusacam-json",
                    "rotate": 90.0,
                    "camera": "usb-cam"
                }}"#
            ),
        )
        .unwrap();

        let path_arg = path.to_string_lossy().into_owned();
        let session = Session::load(cli(&["-j", &path_arg])).unwrap();
        assert_eq!(session.name, "mk3s");
        assert_eq!(session.ip, "10.0.0.6");
        assert_eq!(session.rotation, Rotation::Clockwise90);
        assert_eq!(session.max_images.get(), DEFAULT_MAX_IMAGES);
        assert_eq!(session.directory, PathBuf::from("/tmp/prusacam-json"));
        assert_eq!(session.camera.as_deref(), Some("usb-cam"));
    }

    #[test]
    fn test_json_validation() {
        let path = Path::new("inline.json");
        let base = |fp: &str, rotate: &str| {
            format!(
                r#"{{"token": "t", "fingerprint": "{fp}", "ip": "i", "apikey": "k", "directory": "/tmp/x", "rotate": {rotate}}}"#
            )
        };

        let err = Session::from_json(&base("tiny", "0"), path, full_cli(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::FingerprintTooShort(4)));

        let err = Session::from_json(&base(FP, "45"), path, full_cli(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::BadRotation(_)));

        let err = Session::from_json(r#"{"token": "t"}"#, path, full_cli(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::JsonError { .. }));
    }

    #[test]
    fn test_missing_json_file() {
        let err = Session::load(cli(&["-j", "/nonexistent/prusacam.json"])).unwrap_err();
        assert!(matches!(err, ConfigError::FileError { .. }));
    }

    #[test]
    fn test_directory_that_is_a_file() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("img");
        fs::write(&file, b"oops").unwrap();

        let mut session = Session::load(full_cli(&[])).unwrap();
        session.directory = file;
        assert!(matches!(
            session.open_store(),
            Err(ConfigError::Directory(StoreError::NotADirectory(_)))
        ));
    }

    #[test]
    fn test_debug_hides_secrets() {
        let mut session = Session::load(full_cli(&[])).unwrap();
        session.token = String::from("super-secret-token");
        session.api_key = String::from("hidden-api-key");

        let printed = format!("{session:?}");
        assert!(printed.contains(FP));
        assert!(!printed.contains("super-secret-token"));
        assert!(!printed.contains("hidden-api-key"));
    }
}
