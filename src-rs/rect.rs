use serde::Serialize;

use crate::error::DispatchError;

/// Selection rectangle in origin + size form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Rectangle {
    x: i64,
    y: i64,
    width: i64,
    height: i64,
}

impl Rectangle {
    pub fn new(x: i64, y: i64, width: i64, height: i64) -> Result<Self, DispatchError> {
        if width < 0 || height < 0 {
            return Err(DispatchError::InvalidSelection {
                detail: format!("computed size {width}x{height} has a negative dimension"),
            });
        }
        Ok(Self {
            x,
            y,
            width,
            height,
        })
    }

    /// Replaces the second corner of a selection with the rectangle's dimensions.
    /// Expects `x2 >= x1` and `y2 >= y1`, the way editors report selection bounds.
    pub fn from_corners(x1: i64, y1: i64, x2: i64, y2: i64) -> Result<Self, DispatchError> {
        match (x2.checked_sub(x1), y2.checked_sub(y1)) {
            (Some(width), Some(height)) => Self::new(x1, y1, width, height),
            _ => Err(DispatchError::InvalidSelection {
                detail: format!("corners ({x1},{y1})-({x2},{y2}) are out of range"),
            }),
        }
    }

    pub fn x(&self) -> i64 {
        self.x
    }

    pub fn y(&self) -> i64 {
        self.y
    }

    pub fn width(&self) -> i64 {
        self.width
    }

    pub fn height(&self) -> i64 {
        self.height
    }

    pub fn fields(&self) -> [i64; 4] {
        [self.x, self.y, self.width, self.height]
    }

    pub fn area(&self) -> u64 {
        self.width
            .unsigned_abs()
            .saturating_mul(self.height.unsigned_abs())
    }
}

/// Parses `A,B,C,D` into four integers.
pub fn parse_quad(raw: &str) -> anyhow::Result<[i64; 4]> {
    let parts = raw
        .split(',')
        .map(|part| part.trim().parse::<i64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| anyhow::anyhow!("expected four comma-separated integers in {raw:?}: {err}"))?;
    match parts.as_slice() {
        [a, b, c, d] => Ok([*a, *b, *c, *d]),
        _ => anyhow::bail!(
            "expected four comma-separated integers in {raw:?}, got {}",
            parts.len()
        ),
    }
}
