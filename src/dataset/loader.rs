//! MRI Corpus Loader
//!
//! Loads a labeled scan corpus from a directory tree with one subdirectory
//! per class label, decoding and resizing every image up front. The corpus
//! is small enough to live in memory, so loading is a one-shot eager pass
//! before any training begins.

use std::path::{Path, PathBuf};

use image::{imageops::FilterType, ImageReader};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::dataset::encoder::LabelEncoder;
use crate::error::{NeuroscanError, Result};

/// File extensions accepted as corpus images
const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "bmp"];

/// A single decoded scan with its label
#[derive(Debug, Clone)]
pub struct MriSample {
    /// Normalized pixel data in CHW layout, values in [0, 1]
    pub pixels: Vec<f32>,
    /// Class label index into the fitted encoder
    pub label: usize,
    /// Class name (e.g. "glioma")
    pub class_name: String,
    /// Path the image was loaded from
    pub path: PathBuf,
}

/// An in-memory corpus of decoded, uniformly-sized scans
#[derive(Debug, Clone)]
pub struct MriDataset {
    /// All samples, grouped by class in discovery order
    pub samples: Vec<MriSample>,
    /// The fitted label index
    pub classes: LabelEncoder,
    /// Side length of every image (square)
    pub image_size: usize,
    /// Channels per image
    pub channels: usize,
}

impl MriDataset {
    /// Load a corpus from a directory tree.
    ///
    /// Expected layout:
    /// ```text
    /// root_dir/
    /// ├── glioma/
    /// │   ├── 1.png
    /// │   └── 2.png
    /// ├── meningioma/
    /// │   └── ...
    /// └── ...
    /// ```
    ///
    /// Every image is decoded, resized bilinearly to `image_size` square,
    /// and normalized to `[0, 1]` in CHW layout. A class directory with no
    /// images is a schema error; an undecodable file is fatal.
    pub fn from_dir<P: AsRef<Path>>(root_dir: P, image_size: usize) -> Result<Self> {
        let root_dir = root_dir.as_ref();
        info!("Loading MRI corpus from: {:?}", root_dir);

        let mut class_dirs: Vec<String> = Vec::new();
        for entry in std::fs::read_dir(root_dir)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    class_dirs.push(name.to_string());
                }
            }
        }
        class_dirs.sort();

        if class_dirs.is_empty() {
            return Err(NeuroscanError::NoClasses(root_dir.to_path_buf()));
        }

        let classes = LabelEncoder::fit(class_dirs.iter().cloned());
        info!("Found {} classes", classes.len());

        let mut samples = Vec::new();
        for class_name in &class_dirs {
            let class_dir = root_dir.join(class_name);
            let label = classes.encode(class_name)?;
            let mut class_count = 0usize;

            let mut paths: Vec<PathBuf> = WalkDir::new(&class_dir)
                .min_depth(1)
                .max_depth(1)
                .into_iter()
                .filter_map(|e| e.ok())
                .map(|e| e.path().to_path_buf())
                .filter(|p| is_image_path(p))
                .collect();
            paths.sort();

            for path in paths {
                let pixels = load_pixels(&path, image_size)?;
                samples.push(MriSample {
                    pixels,
                    label,
                    class_name: class_name.clone(),
                    path,
                });
                class_count += 1;
            }

            if class_count == 0 {
                return Err(NeuroscanError::EmptyClassDir(class_dir));
            }
            debug!("Class '{}' (label {}): {} samples", class_name, label, class_count);
        }

        info!("Loaded {} total samples", samples.len());

        Ok(Self {
            samples,
            classes,
            image_size,
            channels: 3,
        })
    }

    /// Number of samples in the corpus
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Check if the corpus is empty
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Number of classes
    pub fn num_classes(&self) -> usize {
        self.classes.len()
    }

    /// Class index of every sample, in corpus order
    pub fn labels(&self) -> Vec<usize> {
        self.samples.iter().map(|s| s.label).collect()
    }

    /// Per-class sample counts and totals
    pub fn stats(&self) -> DatasetStats {
        let mut class_counts = vec![0usize; self.num_classes()];
        for sample in &self.samples {
            class_counts[sample.label] += 1;
        }

        DatasetStats {
            total_samples: self.samples.len(),
            num_classes: self.num_classes(),
            class_counts,
            class_names: self.classes.labels().to_vec(),
        }
    }
}

fn is_image_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Decode an image, resize it to a square, and normalize to [0, 1] CHW
pub fn load_pixels(path: &Path, image_size: usize) -> Result<Vec<f32>> {
    let img = ImageReader::open(path)
        .map_err(|e| NeuroscanError::Image(path.to_path_buf(), e.to_string()))?
        .decode()
        .map_err(|e| NeuroscanError::Image(path.to_path_buf(), e.to_string()))?;

    let rgb = img
        .resize_exact(image_size as u32, image_size as u32, FilterType::Triangle)
        .to_rgb8();

    let (height, width) = (image_size, image_size);
    let mut pixels = vec![0.0f32; 3 * height * width];
    for y in 0..height {
        for x in 0..width {
            let pixel = rgb.get_pixel(x as u32, y as u32);
            pixels[y * width + x] = pixel[0] as f32 / 255.0;
            pixels[height * width + y * width + x] = pixel[1] as f32 / 255.0;
            pixels[2 * height * width + y * width + x] = pixel[2] as f32 / 255.0;
        }
    }

    Ok(pixels)
}

/// Summary statistics for a loaded corpus
#[derive(Debug, Clone)]
pub struct DatasetStats {
    pub total_samples: usize,
    pub num_classes: usize,
    pub class_counts: Vec<usize>,
    pub class_names: Vec<String>,
}

impl std::fmt::Display for DatasetStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Corpus Statistics:")?;
        writeln!(f, "  Total samples: {}", self.total_samples)?;
        writeln!(f, "  Number of classes: {}", self.num_classes)?;
        for (name, count) in self.class_names.iter().zip(&self.class_counts) {
            let pct = 100.0 * *count as f64 / self.total_samples.max(1) as f64;
            writeln!(f, "  {:24} {:>5} ({:>5.1}%)", name, count, pct)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use tempfile::TempDir;

    fn write_image(dir: &Path, name: &str, shade: u8) {
        let img = RgbImage::from_pixel(32, 32, Rgb([shade, shade, shade]));
        img.save(dir.join(name)).unwrap();
    }

    fn toy_corpus() -> TempDir {
        let root = TempDir::new().unwrap();
        for (class, shade) in [("glioma", 40u8), ("meningioma", 120), ("pituitary", 220)] {
            let dir = root.path().join(class);
            std::fs::create_dir(&dir).unwrap();
            for i in 0..3 {
                write_image(&dir, &format!("{}.png", i), shade);
            }
        }
        root
    }

    #[test]
    fn test_load_corpus() {
        let root = toy_corpus();
        let dataset = MriDataset::from_dir(root.path(), 16).unwrap();

        assert_eq!(dataset.len(), 9);
        assert_eq!(dataset.num_classes(), 3);
        assert_eq!(
            dataset.classes.labels(),
            ["glioma", "meningioma", "pituitary"]
        );
        for sample in &dataset.samples {
            assert_eq!(sample.pixels.len(), 3 * 16 * 16);
            assert!(sample.pixels.iter().all(|&p| (0.0..=1.0).contains(&p)));
        }
    }

    #[test]
    fn test_empty_class_dir_is_schema_error() {
        let root = toy_corpus();
        std::fs::create_dir(root.path().join("notumor")).unwrap();

        let err = MriDataset::from_dir(root.path(), 16).unwrap_err();
        assert!(matches!(err, NeuroscanError::EmptyClassDir(_)));
    }

    #[test]
    fn test_no_classes_is_schema_error() {
        let root = TempDir::new().unwrap();
        let err = MriDataset::from_dir(root.path(), 16).unwrap_err();
        assert!(matches!(err, NeuroscanError::NoClasses(_)));
    }

    #[test]
    fn test_undecodable_image_fails() {
        let root = toy_corpus();
        std::fs::write(root.path().join("glioma/broken.png"), b"not an image").unwrap();

        let err = MriDataset::from_dir(root.path(), 16).unwrap_err();
        assert!(matches!(err, NeuroscanError::Image(_, _)));
    }

    #[test]
    fn test_missing_root_fails() {
        assert!(MriDataset::from_dir("/nonexistent/corpus", 16).is_err());
    }
}
