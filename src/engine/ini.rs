//! Minimal INI reader for layout and skin files
//!
//! Only what the layout engine's files need: `[Section]` headers,
//! `key=value` pairs, `;`/`#` comment lines. Section and key lookups are
//! case-insensitive and the first occurrence of a key wins. Files may be
//! UTF-8 (with or without BOM) or UTF-16LE with BOM, which the engine writes.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default)]
pub struct IniSection {
    pub name: String,
    entries: Vec<(String, String)>,
}

impl IniSection {
    /// First value for `key`, compared case-insensitively
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// Entries in file order, duplicates included
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

#[derive(Debug, Clone, Default)]
pub struct IniDocument {
    sections: Vec<IniSection>,
}

impl IniDocument {
    pub fn read(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).with_context(|| format!("Failed to read {:?}", path))?;
        Ok(Self::parse(&decode_text(&bytes)))
    }

    pub fn parse(text: &str) -> Self {
        let mut sections: Vec<IniSection> = Vec::new();
        // Index into `sections` of the section currently being filled
        let mut current: Option<usize> = None;

        for raw_line in text.lines() {
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
                continue;
            }

            if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
                let name = name.trim();
                // Repeated headers continue the earlier section
                current = match sections
                    .iter()
                    .position(|s| s.name.eq_ignore_ascii_case(name))
                {
                    Some(index) => Some(index),
                    None => {
                        sections.push(IniSection {
                            name: name.to_string(),
                            entries: Vec::new(),
                        });
                        Some(sections.len() - 1)
                    }
                };
                continue;
            }

            let (Some(index), Some((key, value))) = (current, line.split_once('=')) else {
                continue;
            };
            let key = key.trim();
            if key.is_empty() {
                continue;
            }
            sections[index]
                .entries
                .push((key.to_string(), value.trim().to_string()));
        }

        Self { sections }
    }

    pub fn section(&self, name: &str) -> Option<&IniSection> {
        self.sections
            .iter()
            .find(|s| s.name.eq_ignore_ascii_case(name))
    }

    pub fn sections(&self) -> impl Iterator<Item = &IniSection> {
        self.sections.iter()
    }
}

/// Decode file bytes, honouring UTF-8 and UTF-16LE byte order marks
fn decode_text(bytes: &[u8]) -> String {
    if let Some(rest) = bytes.strip_prefix(&[0xFF, 0xFE]) {
        let units: Vec<u16> = rest
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    let bytes = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}
