use std::path::Path;

use serde::Serialize;

use crate::error::{DispatchError, ToolFailure};
use crate::rect::Rectangle;

/// What the host will see when it loads the tool's output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetImage {
    pub width: u32,
    pub height: u32,
    pub reselect_fits: bool,
}

pub fn inspect_target(
    program: &str,
    path: &Path,
    rect: &Rectangle,
) -> Result<TargetImage, DispatchError> {
    let (width, height) = image::image_dimensions(path).map_err(|err| ToolFailure::MissingOutput {
        program: program.to_string(),
        path: path.display().to_string(),
        reason: err.to_string(),
    })?;

    let reselect_fits = rect.x() >= 0
        && rect.y() >= 0
        && rect.x().saturating_add(rect.width()) <= i64::from(width)
        && rect.y().saturating_add(rect.height()) <= i64::from(height);
    if !reselect_fits {
        tracing::warn!(
            path = %path.display(),
            width,
            height,
            rect = ?rect.fields(),
            "reselect rectangle extends past the output image"
        );
    }

    Ok(TargetImage {
        width,
        height,
        reselect_fits,
    })
}
