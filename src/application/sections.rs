//! Section-oriented text model of smb.conf.
//!
//! Parsing keeps every line verbatim so that `parse(text).to_string() == text`
//! for any input. Only the lines a mutation touches are regenerated.

use std::fmt;

/// Classification of one raw line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind<'a> {
    Blank,
    Comment,
    /// `key = value`, split on the first `=`, both sides trimmed.
    Entry { key: &'a str, value: &'a str },
    /// Anything else (no `=`); kept as is.
    Opaque,
}

/// Classifies a raw line that is not a section header.
#[must_use]
pub fn classify(line: &str) -> LineKind<'_> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return LineKind::Blank;
    }
    if trimmed.starts_with('#') || trimmed.starts_with(';') {
        return LineKind::Comment;
    }
    match trimmed.split_once('=') {
        Some((key, value)) => LineKind::Entry {
            key: key.trim(),
            value: value.trim(),
        },
        None => LineKind::Opaque,
    }
}

/// Folds a key for comparison: lower-case with all whitespace removed.
#[must_use]
pub fn normalize_key(key: &str) -> String {
    key.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Name between the brackets if `line` is a section header.
#[must_use]
pub fn header_name(line: &str) -> Option<&str> {
    let trimmed = line.trim();
    if trimmed.len() >= 2 && trimmed.starts_with('[') && trimmed.ends_with(']') {
        Some(trimmed[1..trimmed.len() - 1].trim())
    } else {
        None
    }
}

/// One `[name]` section: its header line and the raw lines up to the next header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    header: String,
    name: String,
    lines: Vec<String>,
}

impl Section {
    /// Creates a section with a `[name]` header and the given body lines.
    #[must_use]
    pub fn new(name: &str, lines: Vec<String>) -> Self {
        Self {
            header: format!("[{name}]"),
            name: name.to_string(),
            lines,
        }
    }

    /// Header name as written in the file.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the header names `name`, ignoring ASCII case.
    #[must_use]
    pub fn is_named(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    /// Raw body lines.
    #[must_use]
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// `(key, value)` pairs in file order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.lines.iter().filter_map(|line| match classify(line) {
            LineKind::Entry { key, value } => Some((key, value)),
            _ => None,
        })
    }

    /// Value of the first entry whose normalized key equals `normalized`.
    #[must_use]
    pub fn get(&self, normalized: &str) -> Option<&str> {
        self.entries()
            .find(|(key, _)| normalize_key(key) == normalized)
            .map(|(_, value)| value)
    }

    /// Rewrites every existing entry whose key `lookup` maps to a value.
    ///
    /// Indentation and the key spelling are kept; entries are never added.
    /// Returns the number of lines rewritten.
    pub fn rewrite_entries<F>(&mut self, mut lookup: F) -> usize
    where
        F: FnMut(&str) -> Option<String>,
    {
        let mut rewritten = 0;
        for line in &mut self.lines {
            let replacement = match classify(line) {
                LineKind::Entry { key, value } => lookup(&normalize_key(key))
                    .filter(|new_value| new_value != value)
                    .map(|new_value| {
                        let indent = &line[..line.len() - line.trim_start().len()];
                        format!("{indent}{key} = {new_value}")
                    }),
                _ => None,
            };
            if let Some(new_line) = replacement {
                *line = new_line;
                rewritten += 1;
            }
        }
        rewritten
    }

    /// Replaces the body, keeping the old body's trailing blank lines.
    pub fn replace_body(&mut self, body: Vec<String>) {
        let trailing_blanks = self
            .lines
            .iter()
            .rev()
            .take_while(|line| line.trim().is_empty())
            .count();
        let tail = self.lines.split_off(self.lines.len() - trailing_blanks);
        self.lines = body;
        self.lines.extend(tail);
    }

    fn ends_with_blank(&self) -> bool {
        self.lines.last().is_some_and(|line| line.trim().is_empty())
    }
}

/// Parsed smb.conf: preamble lines plus sections in file order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigDocument {
    preamble: Vec<String>,
    sections: Vec<Section>,
    trailing_newline: bool,
}

impl ConfigDocument {
    /// Parses config text. Never fails; unrecognized lines are kept verbatim.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let trailing_newline = text.ends_with('\n');
        let body = text.strip_suffix('\n').unwrap_or(text);

        let mut doc = Self {
            trailing_newline,
            ..Self::default()
        };
        if text.is_empty() {
            return doc;
        }

        for line in body.split('\n') {
            if let Some(name) = header_name(line) {
                doc.sections.push(Section {
                    header: line.to_string(),
                    name: name.to_string(),
                    lines: Vec::new(),
                });
            } else if let Some(section) = doc.sections.last_mut() {
                section.lines.push(line.to_string());
            } else {
                doc.preamble.push(line.to_string());
            }
        }

        doc
    }

    /// Lines before the first header.
    #[must_use]
    pub fn preamble(&self) -> &[String] {
        &self.preamble
    }

    #[must_use]
    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// First section named `name`, ignoring ASCII case.
    #[must_use]
    pub fn section(&self, name: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.is_named(name))
    }

    /// Mutable first section named `name`, ignoring ASCII case.
    pub fn section_mut(&mut self, name: &str) -> Option<&mut Section> {
        self.sections.iter_mut().find(|s| s.is_named(name))
    }

    /// Section whose header name is exactly `name`.
    #[must_use]
    pub fn find_exact(&self, name: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.name == name)
    }

    /// Mutable section whose header name is exactly `name`.
    pub fn find_exact_mut(&mut self, name: &str) -> Option<&mut Section> {
        self.sections.iter_mut().find(|s| s.name == name)
    }

    /// Removes every section whose header name is exactly `name`.
    ///
    /// Returns whether anything was removed.
    pub fn remove_exact(&mut self, name: &str) -> bool {
        let before = self.sections.len();
        self.sections.retain(|s| s.name != name);
        self.sections.len() != before
    }

    /// Appends a section at the end, separated from prior content by a blank line.
    pub fn push_section(&mut self, section: Section) {
        let needs_gap = match self.sections.last_mut() {
            Some(last) if !last.ends_with_blank() => {
                last.lines.push(String::new());
                false
            }
            Some(_) => false,
            None => !self.preamble.is_empty(),
        };
        if needs_gap && self.preamble.last().is_some_and(|l| !l.trim().is_empty()) {
            self.preamble.push(String::new());
        }
        self.sections.push(section);
        self.trailing_newline = true;
    }
}

impl fmt::Display for ConfigDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        let mut emit = |f: &mut fmt::Formatter<'_>, line: &str| -> fmt::Result {
            if !first {
                f.write_str("\n")?;
            }
            first = false;
            f.write_str(line)
        };

        for line in &self.preamble {
            emit(f, line)?;
        }
        for section in &self.sections {
            emit(f, &section.header)?;
            for line in &section.lines {
                emit(f, line)?;
            }
        }

        if self.trailing_newline {
            f.write_str("\n")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
# Samba config
; managed by samba-manager

[global]
   workgroup = WORKGROUP
   server string = %h server
   log file = /var/log/samba/log.%m
   this line has no equals sign

[Homes]
   comment = Home Directories
   browsable = no

[printers]
   path = /var/spool/samba
[alice-share-Docs]
   path = /home/samba/alice/docs
   valid users = bob carol
";

    #[test]
    fn test_round_trip_is_byte_exact() {
        for text in [
            SAMPLE,
            "",
            "\n",
            "\n\n",
            "[global]",
            "[global]\n",
            "  # only a comment",
            "preamble = 1\n[a]\nk=v\n\n\n",
            "[a]\r\n  k = v\r\n",
            "[ spaced ]\n\tkey\t=\tvalue\t\n",
        ] {
            assert_eq!(ConfigDocument::parse(text).to_string(), text, "input: {text:?}");
        }
    }

    #[test]
    fn test_sections_and_preamble() {
        let doc = ConfigDocument::parse(SAMPLE);
        assert_eq!(doc.preamble().len(), 3);
        let names: Vec<_> = doc.sections().iter().map(Section::name).collect();
        assert_eq!(names, ["global", "Homes", "printers", "alice-share-Docs"]);
        assert!(doc.section("homes").is_some());
        assert!(doc.find_exact("homes").is_none());
    }

    #[test]
    fn test_entry_lookup_is_case_and_space_insensitive() {
        let doc = ConfigDocument::parse(SAMPLE);
        let global = doc.section("global").unwrap();
        assert_eq!(global.get("serverstring"), Some("%h server"));
        assert_eq!(global.get("workgroup"), Some("WORKGROUP"));
        assert_eq!(normalize_key("  Server   String "), "serverstring");
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify("   "), LineKind::Blank);
        assert_eq!(classify("  ; note"), LineKind::Comment);
        assert_eq!(classify("# note = x"), LineKind::Comment);
        assert_eq!(
            classify("  a = b = c "),
            LineKind::Entry { key: "a", value: "b = c" }
        );
        assert_eq!(classify("garbage"), LineKind::Opaque);
    }

    #[test]
    fn test_rewrite_keeps_position_and_unknown_lines() {
        let mut doc = ConfigDocument::parse(SAMPLE);
        let global = doc.section_mut("global").unwrap();
        let count = global.rewrite_entries(|key| (key == "workgroup").then(|| "OFFICE".to_string()));
        assert_eq!(count, 1);

        let expected = SAMPLE.replace("   workgroup = WORKGROUP", "   workgroup = OFFICE");
        assert_eq!(doc.to_string(), expected);
    }

    #[test]
    fn test_rewrite_never_inserts() {
        let mut doc = ConfigDocument::parse(SAMPLE);
        let global = doc.section_mut("global").unwrap();
        let count = global.rewrite_entries(|key| (key == "security").then(|| "user".to_string()));
        assert_eq!(count, 0);
        assert_eq!(doc.to_string(), SAMPLE);
    }

    #[test]
    fn test_push_section_separates_with_blank_line() {
        let mut doc = ConfigDocument::parse("[global]\n   workgroup = W\n");
        doc.push_section(Section::new("bob-share-1", vec!["   path = /x".into()]));
        assert_eq!(
            doc.to_string(),
            "[global]\n   workgroup = W\n\n[bob-share-1]\n   path = /x\n"
        );

        let mut empty = ConfigDocument::parse("");
        empty.push_section(Section::new("a", vec!["   k = v".into()]));
        assert_eq!(empty.to_string(), "[a]\n   k = v\n");
    }

    #[test]
    fn test_remove_and_replace_body() {
        let mut doc = ConfigDocument::parse("[a]\n k = 1\n\n[b]\n k = 2\n\n[c]\n k = 3\n");
        assert!(doc.remove_exact("b"));
        assert!(!doc.remove_exact("b"));
        doc.find_exact_mut("a")
            .unwrap()
            .replace_body(vec![" k = 9".into(), " j = 8".into()]);
        assert_eq!(doc.to_string(), "[a]\n k = 9\n j = 8\n\n[c]\n k = 3\n");
    }
}
