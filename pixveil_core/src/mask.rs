//! Key-driven arithmetic and positional masking.
//!
//! `add` is an exact two-sided inverse for any key. `multiply` inverts with
//! floor division, which only recovers every byte for keys of ±1; other keys
//! are reported through [`MaskSpec::fidelity_advisory`]. `swap` exchanges two
//! pixel triplets and is its own inverse.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::buffer::PixelBuffer;
use crate::error::TransformError;

const BYTE_MODULUS: i64 = 256;

/// Deserializes through [`FromStr`], so unknown names in a config file surface
/// as `UnsupportedMode`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum MaskMode {
    Add,
    Multiply,
    Swap,
}

impl MaskMode {
    pub fn name(self) -> &'static str {
        match self {
            MaskMode::Add => "add",
            MaskMode::Multiply => "multiply",
            MaskMode::Swap => "swap",
        }
    }
}

impl fmt::Display for MaskMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for MaskMode {
    type Err = TransformError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "add" => Ok(MaskMode::Add),
            "multiply" => Ok(MaskMode::Multiply),
            "swap" => Ok(MaskMode::Swap),
            other => Err(TransformError::UnsupportedMode(other.to_string())),
        }
    }
}

impl TryFrom<String> for MaskMode {
    type Error = TransformError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Pair of pixel coordinates; `x` is the row and `y` the column.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coordinates {
    pub x1: usize,
    pub y1: usize,
    pub x2: usize,
    pub y2: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MaskKey {
    Scalar(i64),
    Coordinates(Coordinates),
}

impl fmt::Display for MaskKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MaskKey::Scalar(value) => write!(f, "{value}"),
            MaskKey::Coordinates(c) => write!(f, "{},{},{},{}", c.x1, c.y1, c.x2, c.y2),
        }
    }
}

impl FromStr for MaskKey {
    type Err = TransformError;

    /// Parses `"50"` as a scalar and `"x1,y1,x2,y2"` as coordinates.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        match parts.as_slice() {
            [single] => single
                .parse::<i64>()
                .map(MaskKey::Scalar)
                .map_err(|_| TransformError::InvalidKey(format!("'{s}' is not an integer"))),
            [x1, y1, x2, y2] => {
                let parse = |part: &str| {
                    part.parse::<usize>().map_err(|_| {
                        TransformError::InvalidKey(format!(
                            "coordinate '{part}' is not a non-negative integer"
                        ))
                    })
                };
                Ok(MaskKey::Coordinates(Coordinates {
                    x1: parse(x1)?,
                    y1: parse(y1)?,
                    x2: parse(x2)?,
                    y2: parse(y2)?,
                }))
            }
            _ => Err(TransformError::InvalidKey(format!(
                "expected an integer or four coordinates, got {} values",
                parts.len()
            ))),
        }
    }
}

/// A mode paired with a key of the matching shape.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MaskSpec {
    Add(i64),
    Multiply(i64),
    Swap(Coordinates),
}

impl MaskSpec {
    pub fn new(mode: MaskMode, key: MaskKey) -> Result<Self, TransformError> {
        match (mode, key) {
            (MaskMode::Add, MaskKey::Scalar(k)) => Ok(MaskSpec::Add(k)),
            (MaskMode::Multiply, MaskKey::Scalar(0)) => Err(TransformError::InvalidKey(
                "multiply key must be non-zero".into(),
            )),
            (MaskMode::Multiply, MaskKey::Scalar(k)) => Ok(MaskSpec::Multiply(k)),
            (MaskMode::Swap, MaskKey::Coordinates(c)) => Ok(MaskSpec::Swap(c)),
            (MaskMode::Swap, MaskKey::Scalar(_)) => Err(TransformError::InvalidKey(
                "swap requires a key of four coordinates (x1,y1,x2,y2)".into(),
            )),
            (mode, MaskKey::Coordinates(_)) => Err(TransformError::InvalidKey(format!(
                "{mode} requires an integer key"
            ))),
        }
    }

    pub fn mode(&self) -> MaskMode {
        match self {
            MaskSpec::Add(_) => MaskMode::Add,
            MaskSpec::Multiply(_) => MaskMode::Multiply,
            MaskSpec::Swap(_) => MaskMode::Swap,
        }
    }

    pub fn apply(&self, buffer: PixelBuffer) -> Result<PixelBuffer, TransformError> {
        match *self {
            MaskSpec::Add(key) => Ok(buffer.map_samples(|p| add_forward(p, key))),
            MaskSpec::Multiply(key) => Ok(buffer.map_samples(|p| multiply_forward(p, key))),
            MaskSpec::Swap(coords) => swap_pixels(buffer, coords),
        }
    }

    pub fn invert(&self, buffer: PixelBuffer) -> Result<PixelBuffer, TransformError> {
        match *self {
            MaskSpec::Add(key) => {
                Ok(buffer.map_samples(|p| add_forward(p, -(key % BYTE_MODULUS))))
            }
            MaskSpec::Multiply(key) => Ok(buffer.map_samples(|p| multiply_inverse(p, key))),
            MaskSpec::Swap(coords) => swap_pixels(buffer, coords),
        }
    }

    /// Returns `FidelityLoss` when the inverse cannot recover every byte value.
    pub fn fidelity_advisory(&self) -> Option<TransformError> {
        match *self {
            MaskSpec::Multiply(key) => {
                let exact = (0..=u8::MAX)
                    .all(|p| multiply_inverse(multiply_forward(p, key), key) == p);
                (!exact).then_some(TransformError::FidelityLoss { key })
            }
            MaskSpec::Add(_) | MaskSpec::Swap(_) => None,
        }
    }
}

pub fn apply(
    buffer: PixelBuffer,
    mode: MaskMode,
    key: MaskKey,
) -> Result<PixelBuffer, TransformError> {
    MaskSpec::new(mode, key)?.apply(buffer)
}

pub fn invert(
    buffer: PixelBuffer,
    mode: MaskMode,
    key: MaskKey,
) -> Result<PixelBuffer, TransformError> {
    MaskSpec::new(mode, key)?.invert(buffer)
}

fn add_forward(p: u8, key: i64) -> u8 {
    (i64::from(p) + key.rem_euclid(BYTE_MODULUS)).rem_euclid(BYTE_MODULUS) as u8
}

fn multiply_forward(p: u8, key: i64) -> u8 {
    (i64::from(p) * key.rem_euclid(BYTE_MODULUS)).rem_euclid(BYTE_MODULUS) as u8
}

fn multiply_inverse(p: u8, key: i64) -> u8 {
    floor_div(i64::from(p), key).rem_euclid(BYTE_MODULUS) as u8
}

/// Division rounding toward negative infinity, for either divisor sign.
fn floor_div(a: i64, b: i64) -> i64 {
    let q = a / b;
    if a % b != 0 && ((a < 0) != (b < 0)) {
        q - 1
    } else {
        q
    }
}

fn swap_pixels(mut buffer: PixelBuffer, c: Coordinates) -> Result<PixelBuffer, TransformError> {
    let (Some(first), Some(second)) = (buffer.pixel(c.x1, c.y1), buffer.pixel(c.x2, c.y2)) else {
        return Err(TransformError::InvalidKey(format!(
            "swap coordinates ({}, {}) / ({}, {}) fall outside a {}x{} buffer",
            c.x1,
            c.y1,
            c.x2,
            c.y2,
            buffer.height(),
            buffer.width()
        )));
    };
    buffer.set_pixel(c.x1, c.y1, second);
    buffer.set_pixel(c.x2, c.y2, first);
    Ok(buffer)
}
