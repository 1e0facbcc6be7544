//! Markup languages accepted as input and representations produced as output.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use super::error::ValidationError;

/// Source markup language of a formula.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum InputType {
    #[default]
    #[serde(rename = "TeX")]
    Tex,
    #[serde(rename = "MathML")]
    MathMl,
    #[serde(rename = "AsciiMath")]
    AsciiMath,
}

impl InputType {
    pub fn as_str(self) -> &'static str {
        match self {
            InputType::Tex => "TeX",
            InputType::MathMl => "MathML",
            InputType::AsciiMath => "AsciiMath",
        }
    }
}

impl fmt::Display for InputType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InputType {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "TeX" | "tex" => Ok(InputType::Tex),
            "MathML" | "mathml" => Ok(InputType::MathMl),
            "AsciiMath" | "asciimath" => Ok(InputType::AsciiMath),
            other => Err(ValidationError::UnknownInputType {
                value: other.to_string(),
            }),
        }
    }
}

/// Target representations with a registered renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputType {
    Html,
    Svg,
    Png,
    Mml,
}

impl OutputType {
    pub const ALL: [OutputType; 4] = [
        OutputType::Html,
        OutputType::Svg,
        OutputType::Png,
        OutputType::Mml,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            OutputType::Html => "html",
            OutputType::Svg => "svg",
            OutputType::Png => "png",
            OutputType::Mml => "mml",
        }
    }
}

impl fmt::Display for OutputType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_type_accepts_canonical_and_lowercase_names() {
        assert_eq!("TeX".parse::<InputType>().unwrap(), InputType::Tex);
        assert_eq!("mathml".parse::<InputType>().unwrap(), InputType::MathMl);
        assert_eq!(
            " AsciiMath ".parse::<InputType>().unwrap(),
            InputType::AsciiMath
        );
    }

    #[test]
    fn input_type_rejects_unknown_names() {
        let err = "LaTeX3".parse::<InputType>().unwrap_err();
        assert_eq!(
            err,
            ValidationError::UnknownInputType {
                value: "LaTeX3".to_string()
            }
        );
    }

    #[test]
    fn input_type_serde_uses_display_names() {
        let json = serde_json::to_string(&InputType::MathMl).unwrap();
        assert_eq!(json, "\"MathML\"");
        let parsed: InputType = serde_json::from_str("\"AsciiMath\"").unwrap();
        assert_eq!(parsed, InputType::AsciiMath);
    }
}
