//! Fixed row layouts of the spreadsheet tables
//!
//! Every table starts at column A with a header on row 1. Parsing a row never panics
//! on short rows; a missing required cell yields a [`RowDataError`].

use anyhow::Result;
use serde_json::{Map, Value, json};

use super::issues::RowDataError;
use crate::api::Label;
use crate::api::sheets::{TableRange, cell, optional_cell};

/// Where a table lives and which columns receive write-backs
#[derive(Debug, Clone, Copy)]
pub struct TableSpec {
    pub range: &'static str,
    pub label: Label,
    pub uid_column: usize,
    pub created_column: Option<usize>,
    pub updated_column: Option<usize>,
    /// Match rows without a uid to an existing node of the same name
    pub adopt_by_name: bool,
}

impl TableSpec {
    pub fn table_range(&self) -> Result<TableRange> {
        TableRange::parse(self.range)
    }

    pub fn has_timestamps(&self) -> bool {
        self.created_column.is_some() || self.updated_column.is_some()
    }
}

pub mod attribute_columns {
    pub const NAME: usize = 0;
    pub const UID: usize = 1;
}

pub mod business_columns {
    pub const NAME: usize = 0;
    pub const DESCRIPTION: usize = 1;
    pub const ATTRIBUTES: usize = 2;
    pub const UID: usize = 3;
    pub const IMAGE: usize = 4;
    pub const LOGO: usize = 5;
    pub const CREATED_AT: usize = 6;
    pub const UPDATED_AT: usize = 7;
}

pub mod promotion_columns {
    pub const NAME: usize = 0;
    pub const BUSINESS: usize = 1;
    pub const PERCENTAGE: usize = 2;
    pub const DESCRIPTION: usize = 3;
    pub const ATTRIBUTES: usize = 4;
    pub const UID: usize = 6;
}

pub mod road_columns {
    pub const NAME: usize = 0;
    pub const NEXT_TOLL: usize = 1;
    pub const UID: usize = 2;
}

pub mod toll_columns {
    pub const NAME: usize = 0;
    pub const SELECT_TYPE: usize = 1;
    pub const ATTRIBUTE: usize = 2;
    pub const NEXT_TOLL: usize = 3;
    pub const UID: usize = 4;
    pub const CREATED_AT: usize = 5;
    pub const UPDATED_AT: usize = 6;
}

pub const ATTRIBUTES: TableSpec = TableSpec {
    range: "attributes!A2:B",
    label: Label::Attribute,
    uid_column: attribute_columns::UID,
    created_column: None,
    updated_column: None,
    adopt_by_name: true,
};

pub const BUSINESSES: TableSpec = TableSpec {
    range: "businesses!A2:H",
    label: Label::Business,
    uid_column: business_columns::UID,
    created_column: Some(business_columns::CREATED_AT),
    updated_column: Some(business_columns::UPDATED_AT),
    adopt_by_name: false,
};

pub const PROMOTIONS: TableSpec = TableSpec {
    range: "promotions!A2:G",
    label: Label::Promotion,
    uid_column: promotion_columns::UID,
    created_column: None,
    updated_column: None,
    adopt_by_name: false,
};

pub const ROADS: TableSpec = TableSpec {
    range: "roads!A2:C",
    label: Label::Road,
    uid_column: road_columns::UID,
    created_column: None,
    updated_column: None,
    adopt_by_name: false,
};

pub const TOLLS: TableSpec = TableSpec {
    range: "tolls!A2:G",
    label: Label::Toll,
    uid_column: toll_columns::UID,
    created_column: Some(toll_columns::CREATED_AT),
    updated_column: Some(toll_columns::UPDATED_AT),
    adopt_by_name: false,
};

/// Split a comma-separated attribute list, trimming names and dropping blanks and repeats
pub fn parse_name_list(value: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for name in value.split(',').map(str::trim) {
        if !name.is_empty() && !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }
    names
}

fn required(row: &[String], index: usize, column: &'static str) -> Result<String, RowDataError> {
    optional_cell(row, index).ok_or(RowDataError::MissingCell { column })
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttributeRow {
    pub name: String,
    pub uid: Option<String>,
}

impl AttributeRow {
    pub fn parse(row: &[String]) -> Result<Self, RowDataError> {
        Ok(Self {
            name: required(row, attribute_columns::NAME, "name")?,
            uid: optional_cell(row, attribute_columns::UID),
        })
    }

    pub fn properties(&self) -> Map<String, Value> {
        let mut props = Map::new();
        props.insert("name".into(), json!(self.name));
        props
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BusinessRow {
    pub name: String,
    pub description: String,
    pub attributes: Vec<String>,
    pub uid: Option<String>,
    pub image: String,
    pub logo: String,
}

impl BusinessRow {
    pub fn parse(row: &[String]) -> Result<Self, RowDataError> {
        use business_columns::*;
        Ok(Self {
            name: required(row, NAME, "name")?,
            description: cell(row, DESCRIPTION).to_string(),
            attributes: parse_name_list(cell(row, ATTRIBUTES)),
            uid: optional_cell(row, UID),
            image: cell(row, IMAGE).to_string(),
            logo: cell(row, LOGO).to_string(),
        })
    }

    pub fn properties(&self) -> Map<String, Value> {
        let mut props = Map::new();
        props.insert("name".into(), json!(self.name));
        props.insert("description".into(), json!(self.description));
        props.insert("image".into(), json!(self.image));
        props.insert("logo".into(), json!(self.logo));
        props
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PromotionRow {
    pub name: String,
    pub business: String,
    pub percentage: Option<f64>,
    pub description: String,
    pub attributes: Vec<String>,
    pub uid: Option<String>,
}

impl PromotionRow {
    pub fn parse(row: &[String]) -> Result<Self, RowDataError> {
        use promotion_columns::*;
        Ok(Self {
            name: required(row, NAME, "name")?,
            business: required(row, BUSINESS, "business")?,
            percentage: parse_percentage(cell(row, PERCENTAGE))?,
            description: cell(row, DESCRIPTION).to_string(),
            attributes: parse_name_list(cell(row, ATTRIBUTES)),
            uid: optional_cell(row, UID),
        })
    }

    pub fn properties(&self) -> Map<String, Value> {
        let mut props = Map::new();
        props.insert("name".into(), json!(self.name));
        props.insert("percentage".into(), json!(self.percentage));
        props.insert("description".into(), json!(self.description));
        props
    }
}

/// `15`, `15%` and `12.5 %` are accepted; blank means no percentage
fn parse_percentage(value: &str) -> Result<Option<f64>, RowDataError> {
    let trimmed = value.trim().trim_end_matches('%').trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    trimmed
        .parse::<f64>()
        .map(Some)
        .map_err(|e| RowDataError::InvalidCell {
            column: "percentage",
            value: value.to_string(),
            reason: e.to_string(),
        })
}

#[derive(Debug, Clone, PartialEq)]
pub struct RoadRow {
    pub name: String,
    pub next_toll: String,
    pub uid: Option<String>,
}

impl RoadRow {
    pub fn parse(row: &[String]) -> Result<Self, RowDataError> {
        Ok(Self {
            name: required(row, road_columns::NAME, "name")?,
            next_toll: required(row, road_columns::NEXT_TOLL, "next toll")?,
            uid: optional_cell(row, road_columns::UID),
        })
    }
}

/// Any row of the tolls table: a run header when `toll` is set, else a continuation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TollRow {
    pub toll: Option<String>,
    pub select_type: String,
    pub attribute: Option<String>,
    pub next_toll: Option<String>,
    pub uid: Option<String>,
}

impl TollRow {
    pub fn parse(row: &[String]) -> Self {
        use toll_columns::*;
        Self {
            toll: optional_cell(row, NAME),
            select_type: cell(row, SELECT_TYPE).to_string(),
            attribute: optional_cell(row, ATTRIBUTE),
            next_toll: optional_cell(row, NEXT_TOLL),
            uid: optional_cell(row, UID),
        }
    }

    pub fn is_header(&self) -> bool {
        self.toll.is_some()
    }

    /// Node properties of a header row
    pub fn properties(&self) -> Option<Map<String, Value>> {
        let name = self.toll.as_ref()?;
        let mut props = Map::new();
        props.insert("name".into(), json!(name));
        props.insert("select_type".into(), json!(self.select_type));
        Some(props)
    }
}
