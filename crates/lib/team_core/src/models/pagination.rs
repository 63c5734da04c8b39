//! Paging and sorting for list endpoints.

use std::fmt;

use crate::error::{Result, TeamError};

pub const DEFAULT_PER_PAGE: u64 = 50;
pub const MAX_PER_PAGE: u64 = 100;

/// Requested page window. `count` is filled in by the store with the total
/// number of matching rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: u64,
    pub per_page: u64,
    pub count: u64,
}

impl Pagination {
    pub fn new(page: Option<u64>, per_page: Option<u64>) -> Result<Self> {
        let page = page.unwrap_or(1);
        if page == 0 {
            return Err(TeamError::Validation("page must be at least 1".into()));
        }
        let per_page = per_page.unwrap_or(DEFAULT_PER_PAGE);
        if per_page == 0 || per_page > MAX_PER_PAGE {
            return Err(TeamError::Validation(format!(
                "per_page must be between 1 and {MAX_PER_PAGE}"
            )));
        }
        Ok(Self {
            page,
            per_page,
            count: 0,
        })
    }

    pub fn offset(&self) -> u64 {
        (self.page - 1) * self.per_page
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: DEFAULT_PER_PAGE,
            count: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        })
    }
}

/// One `ORDER BY` term. `name` is always one of the allowed column names,
/// never caller text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortField {
    pub name: &'static str,
    pub dir: SortDirection,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortParams {
    pub fields: Vec<SortField>,
}

impl SortParams {
    /// Parses `field [asc|desc], field [asc|desc]`. Unknown fields or
    /// directions are rejected.
    pub fn parse(raw: Option<&str>, allowed: &[&'static str], default: SortField) -> Result<Self> {
        let raw = match raw.map(str::trim) {
            None | Some("") => {
                return Ok(Self {
                    fields: vec![default],
                });
            }
            Some(raw) => raw,
        };

        let mut fields = Vec::new();
        for term in raw.split(',') {
            let mut parts = term.split_whitespace();
            let Some(field) = parts.next() else {
                continue;
            };
            let name = allowed
                .iter()
                .copied()
                .find(|a| a.eq_ignore_ascii_case(field))
                .ok_or_else(|| TeamError::Validation(format!("cannot sort by '{field}'")))?;
            let dir = match parts.next().map(str::to_ascii_lowercase).as_deref() {
                None | Some("asc") => SortDirection::Asc,
                Some("desc") => SortDirection::Desc,
                Some(other) => {
                    return Err(TeamError::Validation(format!(
                        "unknown sort direction '{other}'"
                    )));
                }
            };
            if parts.next().is_some() {
                return Err(TeamError::Validation(format!("malformed sort term '{term}'")));
            }
            fields.push(SortField { name, dir });
        }

        if fields.is_empty() {
            fields.push(default);
        }
        Ok(Self { fields })
    }

    /// Renders an `ORDER BY` body, prefixing every column with `prefix`.
    pub fn order_clause(&self, prefix: &str) -> String {
        self.fields
            .iter()
            .map(|f| format!("{prefix}{} {}", f.name, f.dir))
            .collect::<Vec<_>>()
            .join(", ")
    }
}
