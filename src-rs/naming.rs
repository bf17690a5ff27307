//! Target file naming.
//!
//! Every policy is a pure function of the source path, the suffix base and
//! (for the coordinate policies) the selection rectangle. The incremental
//! policy reads its counter back out of the current file name, so renaming a
//! file by hand changes what comes next.

use std::path::{Path, PathBuf};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::DispatchError;
use crate::rect::Rectangle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
pub enum NamingPolicy {
    /// `<base><suffix><x>x<y>x<w>x<h>.<ext>`
    #[serde(rename = "rect_coords", alias = "coords")]
    #[value(name = "rect_coords", alias = "coords")]
    CoordsSuffix,
    /// Same as rect_coords with hex fields
    #[serde(rename = "rect_coords_hex", alias = "hex")]
    #[value(name = "rect_coords_hex", alias = "hex")]
    CoordsSuffixHex,
    /// `<base><suffix><n+1>.<ext>`
    #[serde(rename = "incremental", alias = "increment")]
    #[value(name = "incremental", alias = "increment")]
    IncrementalSuffix,
    /// `<base><suffix>.<ext>` (CropGUI style)
    #[serde(rename = "cropgui", alias = "plain")]
    #[value(name = "cropgui", alias = "plain")]
    PlainSuffix,
}

impl NamingPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            NamingPolicy::CoordsSuffix => "rect_coords",
            NamingPolicy::CoordsSuffixHex => "rect_coords_hex",
            NamingPolicy::IncrementalSuffix => "incremental",
            NamingPolicy::PlainSuffix => "cropgui",
        }
    }
}

/// A source path split into parent directory, base name and extension.
/// The extension never includes the dot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileParts {
    pub parent: PathBuf,
    pub base: String,
    pub extension: String,
}

impl FileParts {
    pub fn from_path(path: &Path) -> Self {
        let parent = path.parent().map(Path::to_path_buf).unwrap_or_default();
        let base = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let extension = path
            .extension()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            parent,
            base,
            extension,
        }
    }
}

/// Names are built as text and handed to jpegpixi as text, so the source path
/// must be valid UTF-8.
pub fn require_utf8(path: &Path) -> Result<&str, DispatchError> {
    path.to_str().ok_or_else(|| DispatchError::NonUtf8Path {
        path: path.display().to_string(),
    })
}

/// Generates the target path from the source path using `policy`.
pub fn next_name(
    source: &Path,
    policy: NamingPolicy,
    suffix_base: &str,
    rect: &Rectangle,
) -> PathBuf {
    let parts = FileParts::from_path(source);
    let file_name = match policy {
        NamingPolicy::CoordsSuffix => {
            let id = join_fields(rect, |v| v.to_string());
            join_extension(&format!("{}{suffix_base}{id}", parts.base), &parts.extension)
        }
        NamingPolicy::CoordsSuffixHex => {
            let id = join_fields(rect, hex);
            join_extension(&format!("{}{suffix_base}{id}", parts.base), &parts.extension)
        }
        NamingPolicy::IncrementalSuffix => {
            next_name_incremental(&parts.base, &parts.extension, suffix_base)
        }
        NamingPolicy::PlainSuffix => {
            join_extension(&format!("{}{suffix_base}", parts.base), &parts.extension)
        }
    };
    parts.parent.join(file_name)
}

/// With `-pixi` as the suffix base, turns `name-pixi<n>` into `name-pixi<n+1>`
/// and appends `-pixi1` when the suffix base is missing.
///
/// The rightmost occurrence of the suffix base wins. Anything after it that
/// is not a plain number counts as 0.
pub fn next_name_incremental(base: &str, extension: &str, suffix_base: &str) -> String {
    let found = if suffix_base.is_empty() {
        None
    } else {
        base.rfind(suffix_base)
    };

    let stem = match found {
        None => format!("{base}{suffix_base}1"),
        Some(at) => {
            let prefix = &base[..at];
            let trailing = &base[at + suffix_base.len()..];
            let number = increment_counter(trailing);
            format!("{prefix}{suffix_base}{number}")
        }
    };
    join_extension(&stem, extension)
}

/// Adds one to the decimal counter in `trailing`, working on the digits
/// directly so there is no upper bound. Surrounding whitespace and a leading
/// `+` are allowed; anything else that is not a plain number counts as 0.
fn increment_counter(trailing: &str) -> String {
    let digits = trailing.trim();
    let digits = digits.strip_prefix('+').unwrap_or(digits);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return "1".to_string();
    }

    let mut out: Vec<u8> = digits.trim_start_matches('0').bytes().collect();
    let mut carry = true;
    for digit in out.iter_mut().rev() {
        if *digit == b'9' {
            *digit = b'0';
        } else {
            *digit += 1;
            carry = false;
            break;
        }
    }
    if carry {
        out.insert(0, b'1');
    }
    String::from_utf8(out).unwrap_or_else(|_| "1".to_string())
}

fn join_fields(rect: &Rectangle, render: impl Fn(i64) -> String) -> String {
    rect.fields()
        .into_iter()
        .map(render)
        .collect::<Vec<_>>()
        .join("x")
}

fn hex(value: i64) -> String {
    if value < 0 {
        format!("-{:#x}", value.unsigned_abs())
    } else {
        format!("{value:#x}")
    }
}

fn join_extension(stem: &str, extension: &str) -> String {
    if extension.is_empty() {
        stem.to_string()
    } else {
        format!("{stem}.{extension}")
    }
}
