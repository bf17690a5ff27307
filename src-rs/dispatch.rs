use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::command::{BuildCommand, CommandLine, PixelizationRequest};
use crate::error::DispatchError;
use crate::naming::{next_name, require_utf8, NamingPolicy};
use crate::rect::Rectangle;

/// JPEG DCT block size. Selections aligned to this grid lose the least.
pub const DCT_GRID_SPACING: (u32, u32) = (8, 8);

/// Everything the host hands over for one dispatch.
#[derive(Debug, Clone)]
pub struct DispatchInput<'a> {
    pub has_selection: bool,
    /// `(x1, y1, x2, y2)` as reported by the editor.
    pub selection_bounds: (i64, i64, i64, i64),
    pub source_path: &'a Path,
    pub request: PixelizationRequest,
    pub max_selection_size: u64,
    pub naming_policy: NamingPolicy,
    pub suffix_base: &'a str,
}

/// Grid setting the host should apply to an image so the user can align
/// further selections to DCT blocks. Image-local; global preferences stay
/// untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GridInstruction {
    pub image: PathBuf,
    pub offset: (u32, u32),
    pub spacing: (u32, u32),
}

impl GridInstruction {
    pub fn dct_blocks(image: &Path) -> Self {
        Self {
            image: image.to_path_buf(),
            offset: (0, 0),
            spacing: DCT_GRID_SPACING,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DispatchResult {
    pub command: CommandLine,
    pub source_path: PathBuf,
    pub target_path: PathBuf,
    /// Region to reselect in the target image.
    pub rectangle: Rectangle,
    pub selection_size: u64,
    pub grid: Vec<GridInstruction>,
}

pub fn dispatch(
    input: &DispatchInput<'_>,
    builder: &impl BuildCommand,
) -> Result<DispatchResult, DispatchError> {
    if !input.has_selection {
        return Err(DispatchError::NoSelection);
    }

    let (x1, y1, x2, y2) = input.selection_bounds;
    let rect = Rectangle::from_corners(x1, y1, x2, y2)?;
    let selection_size = rect.area();

    if selection_size > input.max_selection_size {
        return Err(DispatchError::SelectionTooLarge {
            actual: selection_size,
            limit: input.max_selection_size,
            ratio: selection_size as f64 / input.max_selection_size.max(1) as f64,
        });
    }

    require_utf8(input.source_path)?;
    let target_path = next_name(
        input.source_path,
        input.naming_policy,
        input.suffix_base,
        &rect,
    );
    let command = builder.build(input.source_path, &target_path, &rect, &input.request);
    tracing::debug!(
        policy = input.naming_policy.as_str(),
        target_path = %target_path.display(),
        selection_size,
        "dispatch planned"
    );

    Ok(DispatchResult {
        grid: vec![
            GridInstruction::dct_blocks(input.source_path),
            GridInstruction::dct_blocks(&target_path),
        ],
        command,
        source_path: input.source_path.to_path_buf(),
        target_path,
        rectangle: rect,
        selection_size,
    })
}
