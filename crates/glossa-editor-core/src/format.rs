//! Formatting commands the toolbar can issue against the live selection.
//!
//! Names and values follow the browser `execCommand` vocabulary so the DOM
//! surface can pass them through untouched.

use smol_str::SmolStr;

/// Font families offered by the toolbar: `(label, css value)`.
pub const FONT_FAMILIES: &[(&str, &str)] = &[
    ("Arial", "Arial, sans-serif"),
    ("Times New Roman", "Times New Roman, serif"),
    ("Courier New", "Courier New, monospace"),
    ("Georgia", "Georgia, serif"),
    ("Verdana", "Verdana, sans-serif"),
];

/// Font sizes offered by the toolbar: `(label, execCommand size)`.
pub const FONT_SIZES: &[(&str, u8)] = &[
    ("Tiny", 1),
    ("Small", 2),
    ("Normal", 3),
    ("Large", 4),
    ("Larger", 5),
    ("X-Large", 6),
    ("XX-Large", 7),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatCommand {
    Undo,
    Redo,
    Bold,
    Italic,
    Underline,
    StrikeThrough,
    JustifyLeft,
    JustifyCenter,
    JustifyRight,
    JustifyFull,
    /// Legacy HTML size, 1 through 7.
    FontSize(u8),
    /// CSS font-family list.
    FontName(SmolStr),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormatError {
    #[error("unknown formatting command `{0}`")]
    UnknownCommand(String),
    #[error("`{command}` needs a value")]
    MissingValue { command: &'static str },
    #[error("font size must be between 1 and 7, got `{0}`")]
    InvalidFontSize(String),
}

impl FormatCommand {
    /// The `execCommand` name.
    pub fn command_name(&self) -> &'static str {
        match self {
            FormatCommand::Undo => "undo",
            FormatCommand::Redo => "redo",
            FormatCommand::Bold => "bold",
            FormatCommand::Italic => "italic",
            FormatCommand::Underline => "underline",
            FormatCommand::StrikeThrough => "strikeThrough",
            FormatCommand::JustifyLeft => "justifyLeft",
            FormatCommand::JustifyCenter => "justifyCenter",
            FormatCommand::JustifyRight => "justifyRight",
            FormatCommand::JustifyFull => "justifyFull",
            FormatCommand::FontSize(_) => "fontSize",
            FormatCommand::FontName(_) => "fontName",
        }
    }

    /// The `execCommand` value argument, if the command takes one.
    pub fn value(&self) -> Option<String> {
        match self {
            FormatCommand::FontSize(size) => Some(size.to_string()),
            FormatCommand::FontName(name) => Some(name.to_string()),
            _ => None,
        }
    }

    /// Parse a command name plus optional value, as sent by a toolbar.
    pub fn parse(name: &str, value: Option<&str>) -> Result<Self, FormatError> {
        let cmd = match name {
            "undo" => FormatCommand::Undo,
            "redo" => FormatCommand::Redo,
            "bold" => FormatCommand::Bold,
            "italic" => FormatCommand::Italic,
            "underline" => FormatCommand::Underline,
            "strikeThrough" => FormatCommand::StrikeThrough,
            "justifyLeft" => FormatCommand::JustifyLeft,
            "justifyCenter" => FormatCommand::JustifyCenter,
            "justifyRight" => FormatCommand::JustifyRight,
            "justifyFull" => FormatCommand::JustifyFull,
            "fontSize" => {
                let raw = value.ok_or(FormatError::MissingValue {
                    command: "fontSize",
                })?;
                match raw.trim().parse::<u8>() {
                    Ok(size @ 1..=7) => FormatCommand::FontSize(size),
                    _ => return Err(FormatError::InvalidFontSize(raw.to_owned())),
                }
            }
            "fontName" => match value.map(str::trim) {
                Some(family) if !family.is_empty() => FormatCommand::FontName(family.into()),
                _ => {
                    return Err(FormatError::MissingValue {
                        command: "fontName",
                    });
                }
            },
            other => return Err(FormatError::UnknownCommand(other.to_owned())),
        };
        Ok(cmd)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_commands() {
        assert_eq!(FormatCommand::parse("bold", None), Ok(FormatCommand::Bold));
        assert_eq!(
            FormatCommand::parse("justifyFull", Some("ignored")),
            Ok(FormatCommand::JustifyFull)
        );
        assert_eq!(
            FormatCommand::parse("strikeThrough", None).unwrap().command_name(),
            "strikeThrough"
        );
    }

    #[test]
    fn test_parse_font_size() {
        assert_eq!(
            FormatCommand::parse("fontSize", Some("4")),
            Ok(FormatCommand::FontSize(4))
        );
        assert_eq!(
            FormatCommand::parse("fontSize", Some("9")),
            Err(FormatError::InvalidFontSize("9".into()))
        );
        assert!(matches!(
            FormatCommand::parse("fontSize", None),
            Err(FormatError::MissingValue { .. })
        ));
    }

    #[test]
    fn test_toolbar_values_parse() {
        for (_, family) in FONT_FAMILIES {
            let cmd = FormatCommand::parse("fontName", Some(*family)).unwrap();
            assert_eq!(cmd.value().as_deref(), Some(*family));
        }
        for (_, size) in FONT_SIZES {
            let cmd = FormatCommand::parse("fontSize", Some(size.to_string().as_str())).unwrap();
            assert_eq!(cmd.value(), Some(size.to_string()));
        }
    }

    #[test]
    fn test_unknown_command() {
        let err = FormatCommand::parse("insertHTML", Some("<b>x</b>")).unwrap_err();
        assert_eq!(err.to_string(), "unknown formatting command `insertHTML`");
    }
}
