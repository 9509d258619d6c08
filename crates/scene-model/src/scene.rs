//! Scene manifests.
//!
//! A scene is the top-level container that ties together the background
//! image, region shapes, sensor CSVs, optional event captions, optional
//! camera footage, and the render configuration. Relative paths in the
//! manifest are resolved against the manifest's directory.

use std::path::{Path, PathBuf};

use heatreel_common::error::HeatreelError;
use serde::{Deserialize, Serialize};

use crate::config::RenderConfig;
use crate::event::EventAnnotations;
use crate::region::{parse_shapes, Region, ShapeRecord};
use crate::sensor::{load_sensor_csv, SensorStream};

/// Scene manifest file (`scene.json`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneManifest {
    /// Background image.
    pub background: PathBuf,

    /// JSON shape list, one record per region.
    pub shapes: PathBuf,

    /// Sensor CSVs in region order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub streams: Vec<StreamRef>,

    /// Directory of sensor CSVs, taken in file-name order. Used when
    /// `streams` is empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub streams_dir: Option<PathBuf>,

    /// Event caption file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub events: Option<PathBuf>,

    /// Camera footage, assigned to regions by index.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cameras: Vec<PathBuf>,

    #[serde(default)]
    pub config: RenderConfig,
}

/// Reference to one sensor CSV.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamRef {
    pub csv: PathBuf,

    /// Display name; defaults to the file stem.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// The complete in-memory representation of a loaded scene.
#[derive(Debug, Clone)]
pub struct LoadedScene {
    /// Directory paths are resolved against.
    pub root: PathBuf,

    pub manifest: SceneManifest,

    pub regions: Vec<Region>,

    pub streams: Vec<SensorStream>,

    pub events: EventAnnotations,

    /// Resolved background path.
    pub background: PathBuf,

    /// Resolved camera paths.
    pub cameras: Vec<PathBuf>,
}

impl LoadedScene {
    /// Load a scene manifest and every file it references except media
    /// (background image and camera footage), which are decoded by the
    /// renderer.
    pub fn load(manifest_path: impl AsRef<Path>) -> Result<Self, SceneError> {
        let manifest_path = manifest_path.as_ref();
        let json = std::fs::read_to_string(manifest_path).map_err(|e| SceneError::Io {
            field: "scene".to_string(),
            path: manifest_path.to_path_buf(),
            source: e,
        })?;
        let manifest: SceneManifest =
            serde_json::from_str(&json).map_err(|e| SceneError::Parse {
                path: manifest_path.to_path_buf(),
                source: e,
            })?;
        let root = manifest_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Self::from_manifest(root, manifest)
    }

    /// Resolve and load everything a manifest references.
    pub fn from_manifest(root: PathBuf, manifest: SceneManifest) -> Result<Self, SceneError> {
        let shapes_path = root.join(&manifest.shapes);
        let shapes_json = std::fs::read_to_string(&shapes_path).map_err(|e| SceneError::Io {
            field: "shapes".to_string(),
            path: shapes_path.clone(),
            source: e,
        })?;
        let shapes = parse_shapes(&shapes_json).map_err(|e| SceneError::Parse {
            path: shapes_path,
            source: e,
        })?;

        let stream_refs = resolve_stream_refs(&root, &manifest)?;
        let mut streams = Vec::with_capacity(stream_refs.len());
        for stream_ref in &stream_refs {
            let name = stream_ref.name.clone().unwrap_or_else(|| {
                stream_ref
                    .csv
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default()
            });
            streams.push(load_sensor_csv(
                &stream_ref.csv,
                name,
                &manifest.config.input,
            )?);
        }

        let events = match &manifest.events {
            Some(path) => EventAnnotations::load(root.join(path))?,
            None => EventAnnotations::new(),
        };

        let regions = build_regions(shapes, &streams);
        let background = root.join(&manifest.background);
        let cameras = manifest.cameras.iter().map(|p| root.join(p)).collect();

        tracing::info!(
            regions = regions.len(),
            streams = streams.len(),
            events = events.len(),
            "Scene loaded"
        );

        Ok(Self {
            root,
            manifest,
            regions,
            streams,
            events,
            background,
            cameras,
        })
    }

    pub fn config(&self) -> &RenderConfig {
        &self.manifest.config
    }

    /// Check cross-file consistency and geometry. Returns the first problem.
    pub fn validate(&self) -> Result<(), SceneError> {
        self.config()
            .validate()
            .map_err(|v| SceneError::validation(v.field, v.message))?;

        if self.streams.is_empty() {
            return Err(SceneError::validation("streams", "scene has no sensor streams"));
        }
        if self.regions.len() != self.streams.len() {
            return Err(SceneError::validation(
                "shapes",
                format!(
                    "{} region(s) drawn but {} sensor stream(s) supplied",
                    self.regions.len(),
                    self.streams.len()
                ),
            ));
        }
        if self.cameras.len() > self.regions.len() {
            return Err(SceneError::validation(
                "cameras",
                format!(
                    "{} camera(s) supplied for {} region(s)",
                    self.cameras.len(),
                    self.regions.len()
                ),
            ));
        }
        for region in &self.regions {
            region.shape.validate().map_err(|message| {
                SceneError::validation(format!("shapes[{}]", region.index), message)
            })?;
        }

        if !self.background.exists() {
            return Err(SceneError::Io {
                field: "background".to_string(),
                path: self.background.clone(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "file not found"),
            });
        }
        for (idx, camera) in self.cameras.iter().enumerate() {
            if !camera.exists() {
                return Err(SceneError::Io {
                    field: format!("cameras[{idx}]"),
                    path: camera.clone(),
                    source: std::io::Error::new(std::io::ErrorKind::NotFound, "file not found"),
                });
            }
        }

        Ok(())
    }
}

fn resolve_stream_refs(root: &Path, manifest: &SceneManifest) -> Result<Vec<StreamRef>, SceneError> {
    if !manifest.streams.is_empty() {
        return Ok(manifest
            .streams
            .iter()
            .map(|s| StreamRef {
                csv: root.join(&s.csv),
                name: s.name.clone(),
            })
            .collect());
    }

    let Some(dir) = &manifest.streams_dir else {
        return Ok(Vec::new());
    };
    let dir = root.join(dir);
    let entries = std::fs::read_dir(&dir).map_err(|e| SceneError::Io {
        field: "streams_dir".to_string(),
        path: dir.clone(),
        source: e,
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| SceneError::Io {
            field: "streams_dir".to_string(),
            path: dir.clone(),
            source: e,
        })?;
        let path = entry.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();

    Ok(files
        .into_iter()
        .map(|csv| StreamRef { csv, name: None })
        .collect())
}

/// Pair shapes with streams by index. The shape's own name wins, then the
/// stream's, then a positional fallback.
fn build_regions(shapes: Vec<ShapeRecord>, streams: &[SensorStream]) -> Vec<Region> {
    shapes
        .into_iter()
        .enumerate()
        .map(|(index, record)| {
            let name = record
                .name
                .filter(|n| !n.is_empty())
                .or_else(|| {
                    streams
                        .get(index)
                        .map(|s| s.name.clone())
                        .filter(|n| !n.is_empty())
                })
                .unwrap_or_else(|| format!("Area {}", index + 1));
            Region::new(index, name, record.shape)
        })
        .collect()
}

/// Errors that can occur when loading or validating scenes.
#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    #[error("I/O error for `{field}` at {path}: {source}")]
    Io {
        field: String,
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Parse error in {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("CSV error in {path}{}: {message}", .line.map(|l| format!(" line {l}")).unwrap_or_default())]
    Csv {
        path: PathBuf,
        line: Option<u64>,
        message: String,
    },

    #[error("Event file error in {path} line {line}: {message}")]
    Events {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("Invalid `{field}`: {message}")]
    Validation { field: String, message: String },
}

impl SceneError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Manifest field the error belongs to.
    pub fn field(&self) -> String {
        match self {
            Self::Io { field, .. } | Self::Validation { field, .. } => field.clone(),
            Self::Parse { path, .. } => path.display().to_string(),
            Self::Csv { .. } => "streams".to_string(),
            Self::Events { .. } => "events".to_string(),
        }
    }
}

impl From<SceneError> for HeatreelError {
    fn from(err: SceneError) -> Self {
        match err {
            SceneError::Io { path, source, .. }
                if source.kind() == std::io::ErrorKind::NotFound =>
            {
                HeatreelError::FileNotFound { path }
            }
            other => HeatreelError::config(other.field(), other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, name: &str, content: &str) {
        std::fs::write(dir.join(name), content).unwrap();
    }

    fn three_region_scene(dir: &Path) {
        std::fs::create_dir_all(dir.join("csv")).unwrap();
        write(dir, "bg.png", "not decoded here");
        write(
            dir,
            "shapes.json",
            r#"[
                {"type": "rectangle", "start": [0, 0], "end": [10, 10]},
                {"type": "circle", "centre": [30, 30], "radius": 5, "name": "Pond"},
                {"type": "poly", "points": [[50, 50], [60, 50], [55, 60]]}
            ]"#,
        );
        write(&dir.join("csv"), "b_gate.csv", "0,1\n");
        write(&dir.join("csv"), "a_hall.csv", "0,2\n");
        write(&dir.join("csv"), "c_yard.csv", "0,3\n");
        write(dir, "events.txt", "0 Opening\n");
        write(
            dir,
            "scene.json",
            r#"{
                "background": "bg.png",
                "shapes": "shapes.json",
                "streams_dir": "csv",
                "events": "events.txt",
                "config": {"scale": {"max": 10}}
            }"#,
        );
    }

    #[test]
    fn loads_streams_dir_in_name_order() {
        let tmp = tempfile::tempdir().unwrap();
        three_region_scene(tmp.path());

        let scene = LoadedScene::load(tmp.path().join("scene.json")).unwrap();
        let names: Vec<&str> = scene.regions.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["a_hall", "Pond", "c_yard"]);
        assert_eq!(scene.streams[0].samples[0].value, 2.0);
        assert_eq!(scene.events.get(0), Some("Opening"));
        assert_eq!(scene.config().scale.max, 10.0);
        scene.validate().unwrap();
    }

    #[test]
    fn count_mismatch_is_a_validation_error() {
        let tmp = tempfile::tempdir().unwrap();
        three_region_scene(tmp.path());
        std::fs::remove_file(tmp.path().join("csv").join("c_yard.csv")).unwrap();

        let scene = LoadedScene::load(tmp.path().join("scene.json")).unwrap();
        let err = scene.validate().unwrap_err();
        assert_eq!(err.field(), "shapes");

        let converted: HeatreelError = err.into();
        assert!(converted.is_config());
    }

    #[test]
    fn too_many_cameras_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        three_region_scene(tmp.path());
        let mut scene = LoadedScene::load(tmp.path().join("scene.json")).unwrap();
        scene.cameras = vec![tmp.path().join("bg.png"); 4];
        assert_eq!(scene.validate().unwrap_err().field(), "cameras");
    }

    #[test]
    fn missing_shapes_file_maps_to_file_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        write(
            tmp.path(),
            "scene.json",
            r#"{"background": "bg.png", "shapes": "nope.json"}"#,
        );
        let err = LoadedScene::load(tmp.path().join("scene.json")).unwrap_err();
        match HeatreelError::from(err) {
            HeatreelError::FileNotFound { path } => assert!(path.ends_with("nope.json")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn malformed_geometry_names_the_shape() {
        let tmp = tempfile::tempdir().unwrap();
        three_region_scene(tmp.path());
        write(
            tmp.path(),
            "shapes.json",
            r#"[
                {"type": "rectangle", "start": [0, 0], "end": [10, 10]},
                {"type": "circle", "centre": [30, 30], "radius": 0},
                {"type": "poly", "points": [[50, 50], [60, 50], [55, 60]]}
            ]"#,
        );
        let scene = LoadedScene::load(tmp.path().join("scene.json")).unwrap();
        assert_eq!(scene.validate().unwrap_err().field(), "shapes[1]");
    }
}
