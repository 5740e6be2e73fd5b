//! 孔位编号
//!
//! `WellId` 以 "A1" 形式书写：行字母 + 列号（从 1 开始）。
//! 派生的 `Ord` 为行优先顺序（A1 < A2 < … < A12 < B1），规划器依赖该顺序。

use std::fmt;
use std::str::FromStr;

use crate::constants::{MAX_PLATE_COLUMNS, MAX_PLATE_ROWS};
use crate::error::LabwareError;

/// 板内孔位
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WellId {
    /// 行索引（0 = A）
    row: u8,
    /// 列号（1 起）
    column: u8,
}

impl WellId {
    /// 由行索引（0 = A）和列号（1 起）构造
    pub fn new(row: u8, column: u8) -> Result<Self, LabwareError> {
        if row >= MAX_PLATE_ROWS || column == 0 || column > MAX_PLATE_COLUMNS {
            return Err(LabwareError::WellOutOfRange {
                well: format!("row {} column {}", row, column),
                max_rows: MAX_PLATE_ROWS,
                max_columns: MAX_PLATE_COLUMNS,
            });
        }
        Ok(Self { row, column })
    }

    /// 行索引（0 = A）
    #[inline]
    pub fn row(self) -> u8 {
        self.row
    }

    /// 行字母
    #[inline]
    pub fn row_letter(self) -> char {
        (b'A' + self.row) as char
    }

    /// 列号（1 起）
    #[inline]
    pub fn column(self) -> u8 {
        self.column
    }

    /// 平移孔位，越界时返回错误
    pub fn offset(self, rows: u8, columns: u8) -> Result<Self, LabwareError> {
        let row = self.row.checked_add(rows);
        let column = self.column.checked_add(columns);
        match (row, column) {
            (Some(row), Some(column)) => Self::new(row, column),
            _ => Err(LabwareError::WellOutOfRange {
                well: self.to_string(),
                max_rows: MAX_PLATE_ROWS,
                max_columns: MAX_PLATE_COLUMNS,
            }),
        }
    }
}

impl fmt::Display for WellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.row_letter(), self.column)
    }
}

impl FromStr for WellId {
    type Err = LabwareError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let mut chars = trimmed.chars();
        let letter = chars
            .next()
            .filter(|c| c.is_ascii_alphabetic())
            .ok_or_else(|| LabwareError::InvalidWellId(s.to_string()))?
            .to_ascii_uppercase();
        let column: u8 = chars
            .as_str()
            .parse()
            .map_err(|_| LabwareError::InvalidWellId(s.to_string()))?;
        let row = letter as u8 - b'A';
        Self::new(row, column).map_err(|_| LabwareError::WellOutOfRange {
            well: trimmed.to_string(),
            max_rows: MAX_PLATE_ROWS,
            max_columns: MAX_PLATE_COLUMNS,
        })
    }
}

impl TryFrom<&str> for WellId {
    type Error = LabwareError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for WellId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for WellId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// 目标孔位：板序号 + 板内孔位
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WellRef {
    /// 板序号（0 起）
    pub plate: usize,
    pub well: WellId,
}

impl WellRef {
    pub fn new(plate: usize, well: WellId) -> Self {
        Self { plate, well }
    }
}

impl fmt::Display for WellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "plate{}:{}", self.plate + 1, self.well)
    }
}

/// 解析行字母串，如 "ABCDEFGH" 或 "A-H"
pub fn parse_rows(spec: &str) -> Result<Vec<u8>, LabwareError> {
    let spec = spec.trim();
    let to_index = |c: char| -> Result<u8, LabwareError> {
        let c = c.to_ascii_uppercase();
        if !c.is_ascii_uppercase() || (c as u8 - b'A') >= MAX_PLATE_ROWS {
            return Err(LabwareError::InvalidWellId(spec.to_string()));
        }
        Ok(c as u8 - b'A')
    };

    if let Some((start, end)) = spec.split_once('-') {
        let (mut s, mut e) = (start.chars(), end.chars());
        match (s.next(), s.next(), e.next(), e.next()) {
            (Some(a), None, Some(b), None) => {
                let (a, b) = (to_index(a)?, to_index(b)?);
                if a > b {
                    return Err(LabwareError::InvalidWellId(spec.to_string()));
                }
                Ok((a..=b).collect())
            },
            _ => Err(LabwareError::InvalidWellId(spec.to_string())),
        }
    } else {
        spec.chars().map(to_index).collect()
    }
}
