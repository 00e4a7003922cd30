//! Processing options handed to the transformer.
//!
//! Built once from `[image]` at startup and shared read-only.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use thiserror::Error;

use crate::config::ImageConfig;
use crate::image::ImageFormat;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum OptionError {
    #[error("invalid hex color: {0}")]
    InvalidColor(String),
    #[error("unknown gravity: {0}")]
    UnknownGravity(String),
    #[error("unknown resize type: {0}")]
    UnknownResize(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResizeType {
    #[default]
    Fit,
    Fill,
    Crop,
}

impl FromStr for ResizeType {
    type Err = OptionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fit" => Ok(ResizeType::Fit),
            "fill" => Ok(ResizeType::Fill),
            "crop" => Ok(ResizeType::Crop),
            _ => Err(OptionError::UnknownResize(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum GravityType {
    #[default]
    Center,
    North,
    East,
    South,
    West,
    NorthWest,
    NorthEast,
    SouthWest,
    SouthEast,
    Smart,
    FocusPoint,
}

impl GravityType {
    pub fn short_name(&self) -> &'static str {
        match self {
            GravityType::Center => "ce",
            GravityType::North => "no",
            GravityType::East => "ea",
            GravityType::South => "so",
            GravityType::West => "we",
            GravityType::NorthWest => "nowe",
            GravityType::NorthEast => "noea",
            GravityType::SouthWest => "sowe",
            GravityType::SouthEast => "soea",
            GravityType::Smart => "sm",
            GravityType::FocusPoint => "fp",
        }
    }
}

impl FromStr for GravityType {
    type Err = OptionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "ce" => GravityType::Center,
            "no" => GravityType::North,
            "ea" => GravityType::East,
            "so" => GravityType::South,
            "we" => GravityType::West,
            "nowe" => GravityType::NorthWest,
            "noea" => GravityType::NorthEast,
            "sowe" => GravityType::SouthWest,
            "soea" => GravityType::SouthEast,
            "sm" => GravityType::Smart,
            "fp" => GravityType::FocusPoint,
            _ => return Err(OptionError::UnknownGravity(s.to_string())),
        })
    }
}

impl fmt::Display for GravityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

/// Gravity plus the focus point used by `fp`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Gravity {
    pub kind: GravityType,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const WHITE: Rgb = Rgb { r: 255, g: 255, b: 255 };
}

impl Default for Rgb {
    fn default() -> Self {
        Rgb::WHITE
    }
}

impl FromStr for Rgb {
    type Err = OptionError;

    /// `fff` or `ffffff`, no leading `#`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || OptionError::InvalidColor(s.to_string());
        if !s.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(invalid());
        }
        let channel = |hex: &str| u8::from_str_radix(hex, 16).map_err(|_| invalid());
        match s.len() {
            3 => Ok(Rgb {
                r: channel(&s[0..1])? * 17,
                g: channel(&s[1..2])? * 17,
                b: channel(&s[2..3])? * 17,
            }),
            6 => Ok(Rgb {
                r: channel(&s[0..2])?,
                g: channel(&s[2..4])?,
                b: channel(&s[4..6])?,
            }),
            _ => Err(invalid()),
        }
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WatermarkOptions {
    pub enabled: bool,
    pub opacity: f64,
    pub replicate: bool,
    pub gravity: GravityType,
    pub offset_x: i32,
    pub offset_y: i32,
    pub scale: f64,
}

impl Default for WatermarkOptions {
    fn default() -> Self {
        Self {
            enabled: false,
            opacity: 1.0,
            replicate: false,
            gravity: GravityType::Center,
            offset_x: 0,
            offset_y: 0,
            scale: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessingOptions {
    pub resize: ResizeType,
    pub width: u32,
    pub height: u32,
    pub dpr: f64,
    pub gravity: Gravity,
    pub enlarge: bool,
    pub expand: bool,
    pub format: ImageFormat,
    pub quality: u8,
    pub flatten: bool,
    pub background: Rgb,
    pub blur: f32,
    pub sharpen: f32,
    pub jpeg_progressive: bool,
    pub png_interlaced: bool,
    pub max_gif_frames: u32,
    pub watermark: WatermarkOptions,
}

impl Default for ProcessingOptions {
    fn default() -> Self {
        Self {
            resize: ResizeType::Fit,
            width: 0,
            height: 0,
            dpr: 1.0,
            gravity: Gravity::default(),
            enlarge: false,
            expand: false,
            format: ImageFormat::Jpeg,
            quality: 85,
            flatten: false,
            background: Rgb::WHITE,
            blur: 0.0,
            sharpen: 0.0,
            jpeg_progressive: false,
            png_interlaced: false,
            max_gif_frames: 1,
            watermark: WatermarkOptions::default(),
        }
    }
}

impl ProcessingOptions {
    /// Process-wide defaults. An unparseable `image.type` falls back to JPEG;
    /// config validation rejects it before this is reached.
    pub fn from_config(image: &ImageConfig) -> Self {
        Self {
            width: image.width,
            height: image.height,
            quality: image.quality,
            format: image.format.parse().unwrap_or(ImageFormat::Jpeg),
            jpeg_progressive: image.jpeg_progressive,
            png_interlaced: image.png_interlaced,
            max_gif_frames: image.max_gif_frames,
            watermark: WatermarkOptions {
                opacity: image.watermark_opacity,
                ..WatermarkOptions::default()
            },
            ..Self::default()
        }
    }
}
