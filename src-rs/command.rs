use std::fmt;
use std::path::Path;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::rect::Rectangle;

pub const DEFAULT_PROGRAM: &str = "jpegpixi";

/// Interpolation method passed to `jpegpixi -m`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    #[serde(alias = "av")]
    #[value(alias = "av")]
    Average,
    #[serde(alias = "li")]
    #[value(alias = "li")]
    Linear,
    #[serde(alias = "qu")]
    #[value(alias = "qu")]
    Quadratic,
    #[serde(alias = "cu")]
    #[value(alias = "cu")]
    Cubic,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Average => "average",
            Method::Linear => "linear",
            Method::Quadratic => "quadratic",
            Method::Cubic => "cubic",
        }
    }
}

/// Interpolation direction, the `D:` prefix of a jpegpixi block spec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
pub enum Direction {
    #[serde(rename = "2d", alias = "2")]
    #[value(name = "2d", alias = "2")]
    TwoD,
    #[serde(rename = "vertical", alias = "v")]
    #[value(name = "vertical", alias = "v")]
    Vertical,
    #[serde(rename = "horizontal", alias = "h")]
    #[value(name = "horizontal", alias = "h")]
    Horizontal,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::TwoD => "2d",
            Direction::Vertical => "vertical",
            Direction::Horizontal => "horizontal",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelizationRequest {
    pub method: Method,
    pub direction: Direction,
}

/// Argument vector for the external tool. Tokens are passed as discrete
/// process arguments, never through a shell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CommandLine(Vec<String>);

impl CommandLine {
    pub fn program(&self) -> &str {
        self.0.first().map(String::as_str).unwrap_or_default()
    }

    pub fn args(&self) -> &[String] {
        self.0.get(1..).unwrap_or_default()
    }

    pub fn tokens(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(" "))
    }
}

pub trait BuildCommand {
    fn build(
        &self,
        source: &Path,
        target: &Path,
        rect: &Rectangle,
        request: &PixelizationRequest,
    ) -> CommandLine;
}

#[derive(Debug, Clone)]
pub struct JpegpixiCommand {
    program: String,
}

impl JpegpixiCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for JpegpixiCommand {
    fn default() -> Self {
        Self::new(DEFAULT_PROGRAM)
    }
}

impl BuildCommand for JpegpixiCommand {
    fn build(
        &self,
        source: &Path,
        target: &Path,
        rect: &Rectangle,
        request: &PixelizationRequest,
    ) -> CommandLine {
        let block_spec = format!(
            "{}:{},{},{},{}",
            request.direction.as_str(),
            rect.x(),
            rect.y(),
            rect.width(),
            rect.height()
        );
        CommandLine(vec![
            self.program.clone(),
            "-m".to_string(),
            request.method.as_str().to_string(),
            source.to_string_lossy().into_owned(),
            target.to_string_lossy().into_owned(),
            block_spec,
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear_2d() -> PixelizationRequest {
        PixelizationRequest {
            method: Method::Linear,
            direction: Direction::TwoD,
        }
    }

    #[test]
    fn builds_tokens_in_order() {
        let rect = Rectangle::new(5, 6, 7, 8).unwrap();
        let cmd = JpegpixiCommand::default().build(
            Path::new("a.jpg"),
            Path::new("b.jpg"),
            &rect,
            &linear_2d(),
        );
        assert_eq!(
            cmd.tokens(),
            ["jpegpixi", "-m", "linear", "a.jpg", "b.jpg", "2d:5,6,7,8"]
        );
        assert_eq!(cmd.program(), "jpegpixi");
        assert_eq!(cmd.args().len(), 5);
    }

    #[test]
    fn paths_with_spaces_stay_single_tokens() {
        let rect = Rectangle::new(0, 0, 8, 8).unwrap();
        let request = PixelizationRequest {
            method: Method::Cubic,
            direction: Direction::Horizontal,
        };
        let cmd = JpegpixiCommand::new("/opt/bin/jpegpixi").build(
            Path::new("my photos/a b.jpg"),
            Path::new("my photos/a b-pixi.jpg"),
            &rect,
            &request,
        );
        assert_eq!(cmd.tokens()[3], "my photos/a b.jpg");
        assert_eq!(cmd.tokens()[4], "my photos/a b-pixi.jpg");
        assert_eq!(cmd.tokens()[5], "horizontal:0,0,8,8");
    }

    #[test]
    fn short_codes_parse_as_aliases() {
        assert_eq!(Method::from_str("li", false).unwrap(), Method::Linear);
        assert_eq!(Method::from_str("av", false).unwrap(), Method::Average);
        assert_eq!(Direction::from_str("2", false).unwrap(), Direction::TwoD);
        assert_eq!(Direction::from_str("v", false).unwrap(), Direction::Vertical);
    }

    #[test]
    fn request_deserializes_from_long_and_short_names() {
        let long: PixelizationRequest =
            serde_json::from_str(r#"{"method":"quadratic","direction":"vertical"}"#).unwrap();
        let short: PixelizationRequest =
            serde_json::from_str(r#"{"method":"qu","direction":"v"}"#).unwrap();
        assert_eq!(long, short);
    }
}
