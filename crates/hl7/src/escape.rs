//! HL7v2 escape sequences.
//!
//! A single table maps each delimiter character to its escape sequence. Both [`escape`] and
//! [`unescape`] are driven from it, so the two directions can never drift apart.
//!
//! Only the five delimiter escapes are translated. Any other escape sequence (formatting codes
//! such as `\.br\`, hexadecimal `\X0D\`, highlight markers) is passed through untouched.

use std::borrow::Cow;

/// The escape character used by the default encoding characters `^~\&`.
pub const ESCAPE_CHAR: char = '\\';

/// A delimiter that must be escaped when it appears in data.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EscapeSequence {
    /// `|` ↔ `\F\`
    FieldSeparator,
    /// `^` ↔ `\S\`
    ComponentSeparator,
    /// `~` ↔ `\R\`
    RepetitionSeparator,
    /// `&` ↔ `\T\`
    SubcomponentSeparator,
    /// `\` ↔ `\E\`
    EscapeCharacter,
}

impl EscapeSequence {
    pub const ALL: [EscapeSequence; 5] = [
        EscapeSequence::FieldSeparator,
        EscapeSequence::ComponentSeparator,
        EscapeSequence::RepetitionSeparator,
        EscapeSequence::SubcomponentSeparator,
        EscapeSequence::EscapeCharacter,
    ];

    /// The literal delimiter character.
    pub fn character(self) -> char {
        match self {
            Self::FieldSeparator => '|',
            Self::ComponentSeparator => '^',
            Self::RepetitionSeparator => '~',
            Self::SubcomponentSeparator => '&',
            Self::EscapeCharacter => ESCAPE_CHAR,
        }
    }

    /// The code letter between the escape characters (`F` in `\F\`).
    pub fn code(self) -> char {
        match self {
            Self::FieldSeparator => 'F',
            Self::ComponentSeparator => 'S',
            Self::RepetitionSeparator => 'R',
            Self::SubcomponentSeparator => 'T',
            Self::EscapeCharacter => 'E',
        }
    }

    /// The full escape sequence, for example `\F\`.
    pub fn sequence(self) -> &'static str {
        match self {
            Self::FieldSeparator => "\\F\\",
            Self::ComponentSeparator => "\\S\\",
            Self::RepetitionSeparator => "\\R\\",
            Self::SubcomponentSeparator => "\\T\\",
            Self::EscapeCharacter => "\\E\\",
        }
    }

    pub fn from_character(c: char) -> Option<Self> {
        Self::ALL.into_iter().find(|e| e.character() == c)
    }

    pub fn from_code(c: char) -> Option<Self> {
        Self::ALL.into_iter().find(|e| e.code() == c)
    }
}

/// Escapes delimiter characters in `text` so it can be stored as a single HL7 value.
pub fn escape(text: &str) -> Cow<'_, str> {
    if !text.chars().any(|c| EscapeSequence::from_character(c).is_some()) {
        return Cow::Borrowed(text);
    }

    let mut out = String::with_capacity(text.len() + 8);
    for c in text.chars() {
        match EscapeSequence::from_character(c) {
            Some(seq) => out.push_str(seq.sequence()),
            None => out.push(c),
        }
    }
    Cow::Owned(out)
}

/// Replaces delimiter escape sequences in `text` with the characters they stand for.
pub fn unescape(text: &str) -> Cow<'_, str> {
    if !text.contains(ESCAPE_CHAR) {
        return Cow::Borrowed(text);
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find(ESCAPE_CHAR) {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        match after.find(ESCAPE_CHAR) {
            Some(end) => {
                let body = &after[..end];
                let mut chars = body.chars();
                let decoded = match (chars.next(), chars.next()) {
                    (Some(code), None) => EscapeSequence::from_code(code),
                    _ => None,
                };
                match decoded {
                    Some(seq) => out.push(seq.character()),
                    None => {
                        out.push(ESCAPE_CHAR);
                        out.push_str(body);
                        out.push(ESCAPE_CHAR);
                    }
                }
                rest = &after[end + 1..];
            }
            None => {
                // Unterminated sequence, keep the remainder verbatim.
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    Cow::Owned(out)
}
