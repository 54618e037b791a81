//! Parses the relocation map files the pool compaction stage emits.
//! The format is a plain sectioned text file: `[section]` headers followed
//! by `key = value` lines. Values are strings at this level; the consumer
//! decides what they mean (the translator reads `[pool]` pairs as old/new
//! constant pool indices and `[natives]`/`lowest-id` as the native object
//! threshold). `;` or `#` starts a comment, blank lines are ignored.

// TODO: A writer for this format would let the compactor share the
// round-trip tests; so far only the consumer side lives in Rust.

/// The parsed file: sections in the order they appeared.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MapFileData {
    sections: Vec<Section>,
}
impl MapFileData {
    /// The first section with that name.
    #[must_use]
    pub fn section(&self, name: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.name == name)
    }

    /// The number of sections
    #[must_use]
    pub fn len(&self) -> usize {
        self.sections.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn sections(&self) -> impl Iterator<Item = &Section> {
        self.sections.iter()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    name: String,
    entries: Vec<(String, String)>,
}
impl Section {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Entries in file order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// All errors carry the 1-based line the parser was on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MapFileParseError {
    /// A key/value line appeared before any `[section]` header
    EntryOutsideSection { line: usize },
    /// A section header without its closing bracket
    UnterminatedSectionHeader { line: usize },
    /// A section header with nothing between the brackets
    EmptySectionName { line: usize },
    /// A non-comment line without a `=` separator
    ExpectedSeparator { line: usize },
    /// The key side of a pair was empty
    EmptyKey { line: usize },
    /// The value side of a pair was empty
    EmptyValue { line: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MapFileWarning<'a> {
    /// The key appeared twice within one section; the later value wins
    DuplicateKey { key: &'a str, line: usize },
}

pub fn parse_mapfile<'a>(
    input: &'a str,
    mut warning_output: impl FnMut(MapFileWarning<'a>),
) -> Result<MapFileData, MapFileParseError> {
    let mut sections: Vec<Section> = Vec::new();

    for (idx, raw_line) in input.lines().enumerate() {
        let line = idx + 1;
        let text = strip_comment(raw_line).trim();
        if text.is_empty() {
            continue;
        }

        if let Some(rest) = text.strip_prefix('[') {
            let name = rest
                .strip_suffix(']')
                .ok_or(MapFileParseError::UnterminatedSectionHeader { line })?
                .trim();
            if name.is_empty() {
                return Err(MapFileParseError::EmptySectionName { line });
            }
            sections.push(Section {
                name: name.to_owned(),
                entries: Vec::new(),
            });
        } else {
            let (key, value) = text
                .split_once('=')
                .ok_or(MapFileParseError::ExpectedSeparator { line })?;
            let key = key.trim();
            let value = value.trim();
            if key.is_empty() {
                return Err(MapFileParseError::EmptyKey { line });
            }
            if value.is_empty() {
                return Err(MapFileParseError::EmptyValue { line });
            }

            let section = sections
                .last_mut()
                .ok_or(MapFileParseError::EntryOutsideSection { line })?;
            if let Some(slot) = section.entries.iter_mut().find(|(k, _)| k == key) {
                warning_output(MapFileWarning::DuplicateKey { key, line });
                slot.1 = value.to_owned();
            } else {
                section.entries.push((key.to_owned(), value.to_owned()));
            }
        }
    }

    Ok(MapFileData { sections })
}

/// Parses a pool index as the compactor writes them: decimal, or hex with a
/// `0x` prefix.
#[must_use]
pub fn parse_index(text: &str) -> Option<u16> {
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        u16::from_str_radix(hex, 16).ok()
    } else {
        text.parse().ok()
    }
}

fn strip_comment(line: &str) -> &str {
    match line.find(|c| c == ';' || c == '#') {
        Some(pos) => &line[..pos],
        None => line,
    }
}

#[cfg(test)]
mod tests {
    use crate::{parse_index, parse_mapfile, MapFileParseError, MapFileWarning};

    #[test]
    fn test_basic_file_parsing() {
        let file = "[pool]\n1 = 1\n3 = 2\n16 = 0x3\n\n[natives]\nlowest-id = 0xd0\n";

        let result = parse_mapfile(file, |_| {}).unwrap();
        assert_eq!(result.len(), 2);

        let pool = result.section("pool").unwrap();
        assert_eq!(pool.get("1"), Some("1"));
        assert_eq!(pool.get("3"), Some("2"));
        assert_eq!(pool.get("16"), Some("0x3"));
        assert_eq!(pool.get("2"), None);
        assert_eq!(pool.entries().count(), 3);

        let natives = result.section("natives").unwrap();
        assert_eq!(natives.get("lowest-id"), Some("0xd0"));
    }

    #[test]
    fn test_comments_and_blank_lines() {
        let file = "; emitted by the pool compactor\n\n[pool]\n2 = 1 # string constant\n   \n# done\n";

        let result = parse_mapfile(file, |_| {}).unwrap();
        assert_eq!(result.section("pool").unwrap().get("2"), Some("1"));
    }

    #[test]
    fn test_duplicate_key_warns_and_later_value_wins() {
        let file = "[pool]\n3 = 1\n3 = 2\n";

        let mut warnings = Vec::new();
        let result = parse_mapfile(file, |w| warnings.push(w)).unwrap();
        assert_eq!(
            warnings,
            vec![MapFileWarning::DuplicateKey { key: "3", line: 3 }]
        );
        assert_eq!(result.section("pool").unwrap().get("3"), Some("2"));
        assert_eq!(result.section("pool").unwrap().entries().count(), 1);
    }

    #[test]
    fn test_errors_carry_line_numbers() {
        assert_eq!(
            parse_mapfile("3 = 1\n", |_| {}),
            Err(MapFileParseError::EntryOutsideSection { line: 1 })
        );
        assert_eq!(
            parse_mapfile("[pool\n", |_| {}),
            Err(MapFileParseError::UnterminatedSectionHeader { line: 1 })
        );
        assert_eq!(
            parse_mapfile("[ ]\n", |_| {}),
            Err(MapFileParseError::EmptySectionName { line: 1 })
        );
        assert_eq!(
            parse_mapfile("[pool]\nbroken\n", |_| {}),
            Err(MapFileParseError::ExpectedSeparator { line: 2 })
        );
        assert_eq!(
            parse_mapfile("[pool]\n = 2\n", |_| {}),
            Err(MapFileParseError::EmptyKey { line: 2 })
        );
        assert_eq!(
            parse_mapfile("[pool]\n3 =\n", |_| {}),
            Err(MapFileParseError::EmptyValue { line: 2 })
        );
    }

    #[test]
    fn test_index_parsing() {
        assert_eq!(parse_index("0"), Some(0));
        assert_eq!(parse_index("208"), Some(208));
        assert_eq!(parse_index("0xd0"), Some(0xd0));
        assert_eq!(parse_index("0XD0"), Some(0xd0));
        assert_eq!(parse_index("0x"), None);
        assert_eq!(parse_index("65536"), None);
        assert_eq!(parse_index("-1"), None);
        assert_eq!(parse_index("abc"), None);
    }
}
