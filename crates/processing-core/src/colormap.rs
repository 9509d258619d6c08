//! Continuous colormaps.
//!
//! Each map is a lookup table of evenly spaced colour stops sampled from the
//! reference palette, interpolated linearly in RGB. The first and last stops
//! are returned exactly at the ends of the range.

use std::fmt;
use std::str::FromStr;

use heatreel_common::error::HeatreelError;
use image::Rgb;

const VIRIDIS: &[[u8; 3]] = &[
    [0x44, 0x01, 0x54],
    [0x48, 0x28, 0x78],
    [0x3e, 0x49, 0x89],
    [0x31, 0x68, 0x8e],
    [0x26, 0x82, 0x8e],
    [0x1f, 0x9e, 0x89],
    [0x35, 0xb7, 0x79],
    [0x6e, 0xce, 0x58],
    [0xb5, 0xde, 0x2b],
    [0xfd, 0xe7, 0x25],
];

const PLASMA: &[[u8; 3]] = &[
    [0x0d, 0x08, 0x87],
    [0x46, 0x03, 0x9f],
    [0x72, 0x01, 0xa8],
    [0x9c, 0x17, 0x9e],
    [0xbd, 0x37, 0x86],
    [0xd8, 0x57, 0x6b],
    [0xed, 0x79, 0x53],
    [0xfb, 0x9f, 0x3a],
    [0xfd, 0xca, 0x26],
    [0xf0, 0xf9, 0x21],
];

const INFERNO: &[[u8; 3]] = &[
    [0x00, 0x00, 0x04],
    [0x1b, 0x0c, 0x41],
    [0x4a, 0x0c, 0x6b],
    [0x78, 0x1c, 0x6d],
    [0xa5, 0x2c, 0x60],
    [0xcf, 0x44, 0x46],
    [0xed, 0x69, 0x25],
    [0xfb, 0x9b, 0x06],
    [0xf7, 0xd1, 0x3d],
    [0xfc, 0xff, 0xa4],
];

const MAGMA: &[[u8; 3]] = &[
    [0x00, 0x00, 0x04],
    [0x18, 0x0f, 0x3d],
    [0x44, 0x0f, 0x76],
    [0x72, 0x1f, 0x81],
    [0x9e, 0x2f, 0x7f],
    [0xcd, 0x40, 0x71],
    [0xf1, 0x60, 0x5d],
    [0xfd, 0x96, 0x68],
    [0xfe, 0xca, 0x8d],
    [0xfc, 0xfd, 0xbf],
];

const CIVIDIS: &[[u8; 3]] = &[
    [0x00, 0x20, 0x4d],
    [0x00, 0x33, 0x6f],
    [0x39, 0x48, 0x6b],
    [0x57, 0x5d, 0x6d],
    [0x70, 0x71, 0x73],
    [0x8a, 0x87, 0x79],
    [0xa6, 0x9d, 0x75],
    [0xc4, 0xb5, 0x6c],
    [0xe4, 0xcf, 0x5b],
    [0xff, 0xea, 0x46],
];

const GRAY: &[[u8; 3]] = &[[0, 0, 0], [255, 255, 255]];

const JET: &[[u8; 3]] = &[
    [0x00, 0x00, 0x7f],
    [0x00, 0x00, 0xff],
    [0x00, 0x7f, 0xff],
    [0x00, 0xff, 0xff],
    [0x7f, 0xff, 0x7f],
    [0xff, 0xff, 0x00],
    [0xff, 0x7f, 0x00],
    [0xff, 0x00, 0x00],
    [0x7f, 0x00, 0x00],
];

const COOLWARM: &[[u8; 3]] = &[
    [0x3b, 0x4c, 0xc0],
    [0x67, 0x88, 0xee],
    [0x9a, 0xbb, 0xff],
    [0xc9, 0xd7, 0xf0],
    [0xed, 0xd1, 0xc2],
    [0xf7, 0xa8, 0x89],
    [0xe2, 0x69, 0x52],
    [0xb4, 0x04, 0x26],
];

/// Palette family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColormapKind {
    Viridis,
    Plasma,
    Inferno,
    Magma,
    Cividis,
    Gray,
    Jet,
    Coolwarm,
}

impl ColormapKind {
    pub const ALL: [ColormapKind; 8] = [
        Self::Viridis,
        Self::Plasma,
        Self::Inferno,
        Self::Magma,
        Self::Cividis,
        Self::Gray,
        Self::Jet,
        Self::Coolwarm,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Viridis => "viridis",
            Self::Plasma => "plasma",
            Self::Inferno => "inferno",
            Self::Magma => "magma",
            Self::Cividis => "cividis",
            Self::Gray => "gray",
            Self::Jet => "jet",
            Self::Coolwarm => "coolwarm",
        }
    }

    fn stops(self) -> &'static [[u8; 3]] {
        match self {
            Self::Viridis => VIRIDIS,
            Self::Plasma => PLASMA,
            Self::Inferno => INFERNO,
            Self::Magma => MAGMA,
            Self::Cividis => CIVIDIS,
            Self::Gray => GRAY,
            Self::Jet => JET,
            Self::Coolwarm => COOLWARM,
        }
    }
}

/// A named colormap, possibly reversed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Colormap {
    pub kind: ColormapKind,
    pub reversed: bool,
}

/// Colormap name that is not one of the known palettes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown colormap `{0}` (expected one of viridis, plasma, inferno, magma, cividis, gray, jet, coolwarm, optionally with `_r`)")]
pub struct UnknownColormap(pub String);

impl From<UnknownColormap> for HeatreelError {
    fn from(err: UnknownColormap) -> Self {
        HeatreelError::config("scale.colormap", err.to_string())
    }
}

impl FromStr for Colormap {
    type Err = UnknownColormap;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_lowercase();
        let (base, reversed) = match name.strip_suffix("_r") {
            Some(base) => (base, true),
            None => (name.as_str(), false),
        };
        let base = if base == "grey" { "gray" } else { base };
        ColormapKind::ALL
            .into_iter()
            .find(|k| k.as_str() == base)
            .map(|kind| Colormap { kind, reversed })
            .ok_or_else(|| UnknownColormap(s.to_string()))
    }
}

impl fmt::Display for Colormap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind.as_str())?;
        if self.reversed {
            f.write_str("_r")?;
        }
        Ok(())
    }
}

impl Colormap {
    pub fn new(kind: ColormapKind) -> Self {
        Self {
            kind,
            reversed: false,
        }
    }

    /// Colour at normalized position `t`, clamped to `[0, 1]`.
    pub fn sample(&self, t: f64) -> Rgb<u8> {
        let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
        let t = if self.reversed { 1.0 - t } else { t };
        let stops = self.kind.stops();

        let pos = t * (stops.len() - 1) as f64;
        let idx = (pos.floor() as usize).min(stops.len() - 2);
        let frac = pos - idx as f64;
        let (a, b) = (stops[idx], stops[idx + 1]);

        let lerp = |c: usize| {
            let v = a[c] as f64 + (b[c] as f64 - a[c] as f64) * frac;
            v.round().clamp(0.0, 255.0) as u8
        };
        Rgb([lerp(0), lerp(1), lerp(2)])
    }

    /// The colours at the bottom and top of the range.
    pub fn endpoints(&self) -> (Rgb<u8>, Rgb<u8>) {
        (self.sample(0.0), self.sample(1.0))
    }
}

/// Maps sensor values to colours for one render.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorMapper {
    pub colormap: Colormap,
    pub vmin: f64,
    pub vmax: f64,
    pub missing: Rgb<u8>,
}

impl ColorMapper {
    pub fn new(colormap: Colormap, vmin: f64, vmax: f64, missing: Rgb<u8>) -> Self {
        Self {
            colormap,
            vmin,
            vmax,
            missing,
        }
    }

    /// `None` (or a non-finite value) maps to the missing colour; anything
    /// else is clamped into `[vmin, vmax]` first.
    pub fn map(&self, value: Option<f64>) -> Rgb<u8> {
        map_value(value, self.vmin, self.vmax, &self.colormap, self.missing)
    }
}

pub fn map_value(
    value: Option<f64>,
    vmin: f64,
    vmax: f64,
    colormap: &Colormap,
    missing: Rgb<u8>,
) -> Rgb<u8> {
    let Some(value) = value.filter(|v| v.is_finite()) else {
        return missing;
    };
    let span = vmax - vmin;
    let t = if span > 0.0 {
        (value.clamp(vmin, vmax) - vmin) / span
    } else {
        0.0
    };
    colormap.sample(t)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MISSING: Rgb<u8> = Rgb([128, 128, 128]);

    #[test]
    fn bounds_map_to_endpoints() {
        for kind in ColormapKind::ALL {
            let stops = kind.stops();
            let first = Rgb(stops[0]);
            let last = Rgb(stops[stops.len() - 1]);

            let mapper = ColorMapper::new(Colormap::new(kind), -5.0, 20.0, MISSING);
            assert_eq!(mapper.map(Some(-5.0)), first, "{}", kind.as_str());
            assert_eq!(mapper.map(Some(20.0)), last, "{}", kind.as_str());

            let reversed = ColorMapper::new(
                Colormap {
                    kind,
                    reversed: true,
                },
                -5.0,
                20.0,
                MISSING,
            );
            assert_eq!(reversed.map(Some(-5.0)), last);
            assert_eq!(reversed.map(Some(20.0)), first);
            assert_eq!(reversed.colormap.endpoints(), (last, first));
        }
    }

    #[test]
    fn values_outside_bounds_are_clamped() {
        let mapper = ColorMapper::new(Colormap::new(ColormapKind::Viridis), 0.0, 10.0, MISSING);
        assert_eq!(mapper.map(Some(-100.0)), mapper.map(Some(0.0)));
        assert_eq!(mapper.map(Some(1e9)), mapper.map(Some(10.0)));
    }

    #[test]
    fn missing_ignores_bounds() {
        for (lo, hi) in [(0.0, 1.0), (-1e6, 1e6), (50.0, 51.0)] {
            let mapper = ColorMapper::new(Colormap::new(ColormapKind::Jet), lo, hi, MISSING);
            assert_eq!(mapper.map(None), MISSING);
            assert_eq!(mapper.map(Some(f64::NAN)), MISSING);
        }
    }

    #[test]
    fn gray_midpoint_interpolates() {
        let gray = Colormap::new(ColormapKind::Gray);
        assert_eq!(gray.sample(0.5), Rgb([128, 128, 128]));
    }

    #[test]
    fn names_parse_with_reverse_suffix() {
        let cmap: Colormap = "Magma_r".parse().unwrap();
        assert_eq!(cmap.kind, ColormapKind::Magma);
        assert!(cmap.reversed);
        assert_eq!(cmap.to_string(), "magma_r");
        assert_eq!("grey".parse::<Colormap>().unwrap().kind, ColormapKind::Gray);
    }

    #[test]
    fn unknown_name_is_a_config_error() {
        let err = "rainbowz".parse::<Colormap>().unwrap_err();
        let err: HeatreelError = err.into();
        assert!(err.is_config());
        assert!(err.to_string().contains("rainbowz"));
    }
}
