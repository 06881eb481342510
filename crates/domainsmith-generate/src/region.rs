//! Regions of a rendered artifact and the customization marker.
//!
//! The renderer writes these section headers and markers and the extractor
//! scans for them; changing either is a breaking change for every artifact
//! generated before.

/// Token that classifies an artifact line as user-authored.
pub const MARKER: &str = "CUSTOM";

/// Trailing comment the renderer appends to preserved entries.
pub const MARKER_COMMENT: &str = "# CUSTOM";

/// Sections whose entries may be preserved across regenerations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Region {
    Fields,
    Associations,
    Joins,
    Filters,
    Metadata,
}

impl Region {
    pub const ALL: [Region; 5] = [
        Region::Fields,
        Region::Associations,
        Region::Joins,
        Region::Filters,
        Region::Metadata,
    ];

    /// Dotted table path of the region's section header.
    pub fn path(self) -> &'static [&'static str] {
        match self {
            Region::Fields => &["source", "columns"],
            Region::Associations => &["associations"],
            Region::Joins => &["joins"],
            Region::Filters => &["filters"],
            Region::Metadata => &["metadata"],
        }
    }

    /// Header line as rendered, e.g. `[source.columns]`.
    pub fn header(self) -> String {
        format!("[{}]", self.path().join("."))
    }

    pub fn from_path(path: &[String]) -> Option<Region> {
        Region::ALL.into_iter().find(|region| {
            let expected = region.path();
            expected.len() == path.len()
                && expected.iter().zip(path).all(|(left, right)| *left == right.as_str())
        })
    }
}

/// Split a TOML line into its code and the text of its trailing comment.
///
/// A `#` inside a basic or literal string does not start a comment.
pub fn split_comment(line: &str) -> (&str, Option<&str>) {
    #[derive(Clone, Copy, PartialEq)]
    enum State {
        Code,
        Basic,
        Literal,
    }

    let mut state = State::Code;
    let mut escaped = false;
    for (index, ch) in line.char_indices() {
        match state {
            State::Code => match ch {
                '#' => return (&line[..index], Some(&line[index + 1..])),
                '"' => state = State::Basic,
                '\'' => state = State::Literal,
                _ => {}
            },
            State::Basic => {
                if escaped {
                    escaped = false;
                } else if ch == '\\' {
                    escaped = true;
                } else if ch == '"' {
                    state = State::Code;
                }
            }
            State::Literal => {
                if ch == '\'' {
                    state = State::Code;
                }
            }
        }
    }
    (line, None)
}

/// Whether the line's comment carries the marker as a whole word.
pub fn is_marked(line: &str) -> bool {
    let (_, comment) = split_comment(line);
    comment.is_some_and(|text| {
        text.split(|ch: char| !(ch.is_ascii_alphanumeric() || ch == '_'))
            .any(|word| word == MARKER)
    })
}
