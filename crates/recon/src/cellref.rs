//! A1-style cell addressing.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer};

use crate::error::ReconError;

/// Convert a 0-indexed column to letters (0 → A, 26 → AA).
pub fn col_to_letters(col: usize) -> String {
    let mut result = String::new();
    let mut n = col;
    loop {
        result.insert(0, (b'A' + (n % 26) as u8) as char);
        if n < 26 {
            break;
        }
        n = n / 26 - 1;
    }
    result
}

/// Convert column letters to a 0-indexed column (A → 0, AA → 26).
pub fn letters_to_col(letters: &str) -> Option<usize> {
    if letters.is_empty() || !letters.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    let mut col: usize = 0;
    for ch in letters.chars() {
        col = col * 26 + (ch.to_ascii_uppercase() as usize - 'A' as usize + 1);
    }
    Some(col - 1)
}

/// A 0-indexed cell position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellRef {
    pub row: usize,
    pub col: usize,
}

impl CellRef {
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }

    /// Build from a 1-based row and column letters.
    pub fn at(row1: usize, letters: &str) -> Option<Self> {
        Some(Self {
            row: row1.checked_sub(1)?,
            col: letters_to_col(letters)?,
        })
    }

    pub fn a1(&self) -> String {
        format!("{}{}", col_to_letters(self.col), self.row + 1)
    }
}

impl FromStr for CellRef {
    type Err = ReconError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().replace('$', "");
        let split = s.find(|c: char| c.is_ascii_digit()).unwrap_or(s.len());
        let (letters, digits) = s.split_at(split);
        let row: usize = digits
            .parse()
            .map_err(|_| ReconError::ConfigValidation(format!("bad cell reference '{s}'")))?;
        CellRef::at(row, letters)
            .ok_or_else(|| ReconError::ConfigValidation(format!("bad cell reference '{s}'")))
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.a1())
    }
}

/// A cell on a named sheet, written `Sheet!B4` or `'Sheet name'!B4`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SheetCell {
    pub sheet: String,
    pub cell: CellRef,
}

impl SheetCell {
    pub fn new(sheet: impl Into<String>, cell: CellRef) -> Self {
        Self {
            sheet: sheet.into(),
            cell,
        }
    }

    /// Reference text for use inside a formula.
    pub fn formula_ref(&self) -> String {
        format!("{}!{}", quote_sheet(&self.sheet), self.cell.a1())
    }
}

impl FromStr for SheetCell {
    type Err = ReconError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (sheet, cell) = s
            .rsplit_once('!')
            .ok_or_else(|| ReconError::ConfigValidation(format!("expected Sheet!A1, got '{s}'")))?;
        let sheet = sheet.trim().trim_matches('\'').to_string();
        if sheet.is_empty() {
            return Err(ReconError::ConfigValidation(format!("missing sheet name in '{s}'")));
        }
        Ok(Self {
            sheet,
            cell: cell.parse()?,
        })
    }
}

impl fmt::Display for SheetCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.formula_ref())
    }
}

impl<'de> Deserialize<'de> for SheetCell {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

impl<'de> Deserialize<'de> for CellRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A 0-indexed column, written as letters in profiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Column(pub usize);

impl Column {
    pub fn index(self) -> usize {
        self.0
    }

    pub fn letters(self) -> String {
        col_to_letters(self.0)
    }
}

impl FromStr for Column {
    type Err = ReconError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        letters_to_col(s.trim())
            .map(Column)
            .ok_or_else(|| ReconError::ConfigValidation(format!("bad column '{s}'")))
    }
}

impl<'de> Deserialize<'de> for Column {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Quote a sheet name for a formula reference.
pub fn quote_sheet(name: &str) -> String {
    format!("'{}'", name.replace('\'', "''"))
}
