//! Label tables for the Places365 classifiers

use crate::error::VisionError;
use crate::npy;
use crate::tensor::Matrix;
use std::fs;
use std::path::Path;
use tracing::info;

pub const CATEGORIES_FILE: &str = "categories_places365.txt";
pub const ENVIRONMENT_FILE: &str = "IO_places365.txt";
pub const ATTRIBUTE_NAMES_FILE: &str = "labels_sunattribute.txt";
pub const ATTRIBUTE_WEIGHTS_FILE: &str = "W_sceneattribute_wideresnet18.npy";

/// Scene attribute names and the projection from pooled features onto them
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeTable {
    pub names: Vec<String>,
    /// `attributes × channels`
    pub weights: Matrix,
}

/// Read-only label data shared by every prediction in a run
#[derive(Debug, Clone, PartialEq)]
pub struct SceneLabels {
    pub categories: Vec<String>,
    /// Per category: 0 indoor, 1 outdoor
    pub environment: Option<Vec<u8>>,
    pub attributes: Option<AttributeTable>,
}

impl SceneLabels {
    pub fn new(categories: Vec<String>) -> Self {
        Self { categories, environment: None, attributes: None }
    }

    pub fn with_environment(mut self, flags: Vec<u8>) -> Result<Self, VisionError> {
        if flags.len() != self.categories.len() {
            return Err(VisionError::Resource(format!(
                "{} environment flags for {} categories",
                flags.len(),
                self.categories.len()
            )));
        }
        self.environment = Some(flags);
        Ok(self)
    }

    pub fn with_attributes(mut self, table: AttributeTable) -> Result<Self, VisionError> {
        if table.names.len() != table.weights.rows() {
            return Err(VisionError::Resource(format!(
                "{} attribute names for a {}-row weight matrix",
                table.names.len(),
                table.weights.rows()
            )));
        }
        self.attributes = Some(table);
        Ok(self)
    }

    /// Load the category names, plus the environment flags and attribute table when
    /// `auxiliary` is set
    pub fn load(resource_dir: &Path, auxiliary: bool) -> Result<Self, VisionError> {
        let categories = parse_categories(&read_resource(resource_dir, CATEGORIES_FILE)?)?;
        let mut labels = Self::new(categories);

        if auxiliary {
            let flags = parse_environment_flags(&read_resource(resource_dir, ENVIRONMENT_FILE)?)?;
            let names = parse_attribute_names(&read_resource(resource_dir, ATTRIBUTE_NAMES_FILE)?);
            let weights_path = resource_dir.join(ATTRIBUTE_WEIGHTS_FILE);
            let bytes = fs::read(&weights_path).map_err(|e| {
                VisionError::Resource(format!("Failed to read {:?}: {}", weights_path, e))
            })?;
            let weights = npy::read_matrix(&bytes)?;
            labels = labels
                .with_environment(flags)?
                .with_attributes(AttributeTable { names, weights })?;
        }

        info!(
            "Loaded {} scene categories from {:?}{}",
            labels.categories.len(),
            resource_dir,
            if auxiliary { " with environment and attribute tables" } else { "" }
        );
        Ok(labels)
    }
}

fn read_resource(dir: &Path, name: &str) -> Result<String, VisionError> {
    let path = dir.join(name);
    fs::read_to_string(&path)
        .map_err(|e| VisionError::Resource(format!("Failed to read {:?}: {}", path, e)))
}

/// Lines look like `/a/airfield 0`; the name drops its `/x/` prefix
pub fn parse_categories(content: &str) -> Result<Vec<String>, VisionError> {
    content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            let token = line.trim().split(' ').next().unwrap_or_default();
            token
                .get(3..)
                .filter(|name| !name.is_empty())
                .map(str::to_string)
                .ok_or_else(|| VisionError::Resource(format!("Malformed category line: {}", line)))
        })
        .collect()
}

/// Lines end with `1` (indoor) or `2` (outdoor)
pub fn parse_environment_flags(content: &str) -> Result<Vec<u8>, VisionError> {
    content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| match line.split_whitespace().last() {
            Some("1") => Ok(0),
            Some("2") => Ok(1),
            _ => Err(VisionError::Resource(format!("Malformed environment line: {}", line))),
        })
        .collect()
}

pub fn parse_attribute_names(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_categories() {
        let content = "/a/airfield 0\n/a/apartment_building/outdoor 8\n\n/b/bakery/shop 30\n";
        let categories = parse_categories(content).unwrap();
        assert_eq!(categories, vec!["airfield", "apartment_building/outdoor", "bakery/shop"]);
        assert!(parse_categories("/a 1\n").is_err());
    }

    #[test]
    fn test_parse_environment_flags() {
        let flags = parse_environment_flags("/a/airfield 2\n/a/alcove 1\n").unwrap();
        assert_eq!(flags, vec![1, 0]);
        assert!(parse_environment_flags("/a/airfield 3\n").is_err());
    }

    #[test]
    fn test_parse_attribute_names() {
        let names = parse_attribute_names("sailing/ boating  \nnatural light\n\n");
        assert_eq!(names, vec!["sailing/ boating", "natural light"]);
    }

    #[test]
    fn test_flag_count_must_match() {
        let labels = SceneLabels::new(vec!["a".into(), "b".into()]);
        assert!(labels.clone().with_environment(vec![0]).is_err());
        assert!(labels.with_environment(vec![0, 1]).is_ok());
    }

    #[test]
    fn test_load_auxiliary_tables() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(CATEGORIES_FILE), "/a/alcove 0\n/b/beach 1\n").unwrap();
        fs::write(dir.path().join(ENVIRONMENT_FILE), "/a/alcove 1\n/b/beach 2\n").unwrap();
        fs::write(dir.path().join(ATTRIBUTE_NAMES_FILE), "open area\nenclosed area\nsand\n").unwrap();
        let payload: Vec<u8> = (0..6).flat_map(|v| (v as f32).to_le_bytes()).collect();
        fs::write(
            dir.path().join(ATTRIBUTE_WEIGHTS_FILE),
            crate::npy::tests::npy_bytes("<f4", false, &[3, 2], &payload),
        )
        .unwrap();

        let labels = SceneLabels::load(dir.path(), true).unwrap();
        assert_eq!(labels.categories, vec!["alcove", "beach"]);
        assert_eq!(labels.environment, Some(vec![0, 1]));
        let attributes = labels.attributes.unwrap();
        assert_eq!(attributes.names.len(), 3);
        assert_eq!(attributes.weights.cols(), 2);

        let plain = SceneLabels::load(dir.path(), false).unwrap();
        assert!(plain.environment.is_none());
    }

    #[test]
    fn test_load_missing_resource() {
        let dir = TempDir::new().unwrap();
        let err = SceneLabels::load(dir.path(), false).unwrap_err();
        assert!(matches!(err, VisionError::Resource(_)));
    }
}
