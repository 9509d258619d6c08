//! Sensor stream types and CSV loading.
//!
//! Each region is driven by one CSV of `time,value` rows. Time is converted
//! to seconds and floored to an integer second; several samples may land on
//! the same second and are averaged later by the resampler.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::scene::SceneError;

/// One raw observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorSample {
    pub second: i64,
    pub value: f64,
}

impl SensorSample {
    pub fn new(second: i64, value: f64) -> Self {
        Self { second, value }
    }
}

/// Ordered raw samples of one input source.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SensorStream {
    pub name: String,
    pub samples: Vec<SensorSample>,
}

impl SensorStream {
    pub fn new(name: impl Into<String>, samples: Vec<SensorSample>) -> Self {
        Self {
            name: name.into(),
            samples,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// First and last observed seconds, if any samples exist.
    pub fn observed_range(&self) -> Option<(i64, i64)> {
        let min = self.samples.iter().map(|s| s.second).min()?;
        let max = self.samples.iter().map(|s| s.second).max()?;
        Some((min, max))
    }
}

/// Unit of the time column in sensor CSVs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeUnit {
    Seconds,
    #[default]
    Minutes,
}

impl TimeUnit {
    fn to_seconds(self, t: f64) -> f64 {
        match self {
            Self::Seconds => t,
            Self::Minutes => t * 60.0,
        }
    }
}

/// How sensor CSVs are laid out.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamFormat {
    /// First row is a header and is skipped.
    pub has_headers: bool,

    pub time_unit: TimeUnit,
}

impl Default for StreamFormat {
    fn default() -> Self {
        Self {
            has_headers: false,
            time_unit: TimeUnit::Minutes,
        }
    }
}

/// Load one sensor CSV.
///
/// Rows with an empty value cell are skipped; anything else that fails to
/// parse is reported with its line number.
pub fn load_sensor_csv(
    path: impl AsRef<Path>,
    name: impl Into<String>,
    format: &StreamFormat,
) -> Result<SensorStream, SceneError> {
    let path = path.as_ref();
    let file = std::fs::File::open(path).map_err(|e| SceneError::Io {
        field: "streams".to_string(),
        path: path.to_path_buf(),
        source: e,
    })?;
    read_sensor_csv(file, path.to_path_buf(), name, format)
}

/// Parse sensor CSV content from any reader; `path` is used in errors only.
pub fn read_sensor_csv<R: std::io::Read>(
    reader: R,
    path: PathBuf,
    name: impl Into<String>,
    format: &StreamFormat,
) -> Result<SensorStream, SceneError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(format.has_headers)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut samples = Vec::new();
    for result in csv_reader.records() {
        let record = result.map_err(|e| SceneError::Csv {
            path: path.clone(),
            line: e.position().map(|p| p.line()),
            message: e.to_string(),
        })?;
        let line = record.position().map(|p| p.line());
        let csv_error = |message: String| SceneError::Csv {
            path: path.clone(),
            line,
            message,
        };

        if record.iter().all(str::is_empty) {
            continue;
        }
        let (Some(time), Some(value)) = (record.get(0), record.get(1)) else {
            return Err(csv_error(format!(
                "expected `time,value`, got {} field(s)",
                record.len()
            )));
        };
        if value.is_empty() {
            continue;
        }

        let time: f64 = time
            .parse()
            .map_err(|_| csv_error(format!("invalid time `{time}`")))?;
        let value: f64 = value
            .parse()
            .map_err(|_| csv_error(format!("invalid value `{value}`")))?;
        if !time.is_finite() {
            return Err(csv_error(format!("non-finite time `{time}`")));
        }
        if value.is_nan() {
            continue;
        }

        let second = format.time_unit.to_seconds(time).floor() as i64;
        samples.push(SensorSample::new(second, value));
    }

    let stream = SensorStream::new(name, samples);
    tracing::debug!(
        path = %path.display(),
        samples = stream.samples.len(),
        range = ?stream.observed_range(),
        "Loaded sensor stream"
    );
    Ok(stream)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(content: &str, format: &StreamFormat) -> Result<SensorStream, SceneError> {
        read_sensor_csv(
            content.as_bytes(),
            PathBuf::from("mem.csv"),
            "mem",
            format,
        )
    }

    #[test]
    fn minutes_are_converted_and_floored() {
        let stream = parse("0.5,10\n1.01,20\n2,30\n", &StreamFormat::default()).unwrap();
        let seconds: Vec<i64> = stream.samples.iter().map(|s| s.second).collect();
        assert_eq!(seconds, vec![30, 60, 120]);
        assert_eq!(stream.observed_range(), Some((30, 120)));
    }

    #[test]
    fn seconds_with_header() {
        let format = StreamFormat {
            has_headers: true,
            time_unit: TimeUnit::Seconds,
        };
        let stream = parse("time,value\n1.9,4.5\n3,5\n", &format).unwrap();
        assert_eq!(stream.samples[0], SensorSample::new(1, 4.5));
        assert_eq!(stream.samples[1], SensorSample::new(3, 5.0));
    }

    #[test]
    fn empty_values_are_skipped() {
        let format = StreamFormat {
            has_headers: false,
            time_unit: TimeUnit::Seconds,
        };
        let stream = parse("1,4\n2,\n3,6\n", &format).unwrap();
        assert_eq!(stream.samples.len(), 2);
    }

    #[test]
    fn bad_value_reports_line() {
        let format = StreamFormat {
            has_headers: false,
            time_unit: TimeUnit::Seconds,
        };
        let err = parse("1,4\n2,lots\n", &format).unwrap_err();
        match err {
            SceneError::Csv { line, message, .. } => {
                assert_eq!(line, Some(2));
                assert!(message.contains("lots"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn empty_file_yields_empty_stream() {
        let stream = parse("", &StreamFormat::default()).unwrap();
        assert!(stream.is_empty());
        assert_eq!(stream.observed_range(), None);
    }
}
