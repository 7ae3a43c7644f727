use crate::domain::models::{Coordinates, ImageRecord};
use crate::domain::ports::ImageSource;
use anyhow::{anyhow, Context, Result};
use base64::{prelude::BASE64_STANDARD, Engine};
use little_exif::endian::Endian;
use little_exif::metadata::Metadata;
use std::fs::{read, read_dir};
use std::path::{Path, PathBuf};
use tracing::warn;

// GPS IFD tag numbers.
const GPS_LATITUDE_REF: u16 = 0x0001;
const GPS_LATITUDE: u16 = 0x0002;
const GPS_LONGITUDE_REF: u16 = 0x0003;
const GPS_LONGITUDE: u16 = 0x0004;

/// Reads image records from a directory tree: file metadata, the whole file
/// base64-encoded, and the GPS position when the EXIF data carries one.
pub struct FileSystemImageSource;

impl FileSystemImageSource {
    pub fn new() -> Self {
        FileSystemImageSource
    }
}

impl Default for FileSystemImageSource {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageSource for FileSystemImageSource {
    fn read_images(&self, root: &Path) -> Result<Vec<ImageRecord>> {
        let files = list_image_files(root)?;

        let mut records = Vec::with_capacity(files.len());
        for path in files {
            records.push(read_record(&path)?);
        }
        Ok(records)
    }
}

/// Function to list image files in a directory and its subdirectories.
fn list_image_files<P: AsRef<Path>>(path: P) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in read_dir(path)? {
        let entry = entry?;
        let path = entry.path();

        if path.is_dir() {
            // Recursively traverse subdirectories
            files.extend(list_image_files(path)?);
        } else if is_image(&path) {
            files.push(path);
        }
    }
    Ok(files)
}

/// Function to check if the path has a supported image extension.
fn is_image(path: &Path) -> bool {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) => matches!(
            ext.to_ascii_lowercase().as_str(),
            "jpg" | "jpeg" | "png" | "webp"
        ),
        None => false, // No extension present
    }
}

fn read_record(path: &Path) -> Result<ImageRecord> {
    let name = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow!("unable to derive a file name from {}", path.display()))?;

    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
        .unwrap_or_default();

    let bytes = read(path).with_context(|| format!("unable to read {}", path.display()))?;

    // Broken or absent EXIF data never blocks ingestion.
    let coordinates = match read_gps_coordinates(path) {
        Ok(coordinates) => coordinates,
        Err(e) => {
            warn!("Error reading GPS data from {}: {}", path.display(), e);
            None
        }
    };

    Ok(ImageRecord {
        name,
        path: path.display().to_string(),
        extension,
        size: bytes.len() as u64,
        base64: BASE64_STANDARD.encode(&bytes),
        coordinates,
    })
}

/// Reads the GPS tags and converts the rational degree/minute/second
/// triplets into signed decimal degrees.
fn read_gps_coordinates(path: &Path) -> Result<Option<Coordinates>> {
    let metadata = Metadata::new_from_path(path)?;

    let latitude = match read_rational_angle(&metadata, GPS_LATITUDE) {
        Some(latitude) => latitude,
        None => return Ok(None),
    };
    let longitude = match read_rational_angle(&metadata, GPS_LONGITUDE) {
        Some(longitude) => longitude,
        None => return Ok(None),
    };

    let latitude = match hemisphere(&metadata, GPS_LATITUDE_REF) {
        Some('S') => -latitude,
        _ => latitude,
    };
    let longitude = match hemisphere(&metadata, GPS_LONGITUDE_REF) {
        Some('W') => -longitude,
        _ => longitude,
    };

    Ok(Some(Coordinates {
        latitude,
        longitude,
    }))
}

fn read_rational_angle(metadata: &Metadata, tag: u16) -> Option<f64> {
    let bytes = metadata
        .get_tag_by_hex(tag, None)
        .next()?
        .value_as_u8_vec(&Endian::Little);
    if bytes.len() < 24 {
        return None;
    }

    // Three unsigned rationals: degrees, minutes, seconds.
    let mut parts = [0f64; 3];
    for (index, chunk) in bytes.chunks(8).take(3).enumerate() {
        let numerator = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]) as f64;
        let denominator = u32::from_le_bytes([chunk[4], chunk[5], chunk[6], chunk[7]]) as f64;
        if denominator == 0.0 {
            return None;
        }
        parts[index] = numerator / denominator;
    }

    Some(parts[0] + parts[1] / 60.0 + parts[2] / 3600.0)
}

fn hemisphere(metadata: &Metadata, tag: u16) -> Option<char> {
    let bytes = metadata
        .get_tag_by_hex(tag, None)
        .next()?
        .value_as_u8_vec(&Endian::Little);
    bytes.first().map(|byte| *byte as char)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{create_dir, File};
    use std::io::Write as _;
    use tempfile::tempdir;

    #[test]
    fn test_is_image() {
        assert!(is_image(Path::new("image.jpg")));
        assert!(is_image(Path::new("image.JPEG")));
        assert!(is_image(Path::new("image.png")));
        assert!(is_image(Path::new("image.webp")));
        assert!(!is_image(Path::new("notes.txt")));
        assert!(!is_image(Path::new("image")));
    }

    #[test]
    fn test_list_image_files() {
        let tmp_dir = tempdir().unwrap();

        File::create(tmp_dir.path().join("image1.JPG")).unwrap();
        File::create(tmp_dir.path().join("notes.txt")).unwrap();

        let sub_dir = tmp_dir.path().join("subdir");
        create_dir(&sub_dir).unwrap();
        File::create(sub_dir.join("image2.png")).unwrap();

        let files = list_image_files(tmp_dir.path()).unwrap();

        assert_eq!(files.len(), 2);
        assert!(files.contains(&tmp_dir.path().join("image1.JPG")));
        assert!(files.contains(&sub_dir.join("image2.png")));
    }

    #[test]
    fn test_read_images_builds_records() {
        let tmp_dir = tempdir().unwrap();
        let path = tmp_dir.path().join("beach.JPG");
        let mut file = File::create(&path).unwrap();
        file.write_all(b"fake image data").unwrap();

        let records = FileSystemImageSource::new()
            .read_images(tmp_dir.path())
            .unwrap();

        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.name, "beach");
        assert_eq!(record.extension, ".jpg");
        assert_eq!(record.size, 15);
        assert_eq!(
            BASE64_STANDARD.decode(&record.base64).unwrap(),
            b"fake image data"
        );
        // Not a real JPEG, so there is no EXIF position to extract.
        assert!(record.coordinates.is_none());
    }
}
