//! Resolution and relocation of uploaded business images
//!
//! An object dropped in the staging bucket is matched to exactly one Business by its
//! file name, copied to the production bucket under a fresh uid and recorded in the
//! business row. Every attempt, successful or not, leaves an audit entry.

pub mod audit;
pub mod name;

use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};

pub use audit::{AuditEntry, AuditLog, Outcome};
pub use name::{ImageVariant, UploadName};

use crate::api::graph::query::decode_named_nodes;
use crate::api::graph::{GraphQuery, GraphStore, Label, NamedNode};
use crate::api::sheets::{TabularSource, ValueWrite, cell};
use crate::api::storage::{ObjectLocation, ObjectStore};
use crate::config::{AuditConfig, StorageConfig};
use crate::sync::entity::mint_uid;
use crate::sync::schema::{self, business_columns};

/// Why an upload was rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadError {
    /// Nothing usable is left of the object name
    InvalidName { object: String },
    /// Zero or several businesses match the name
    AmbiguousMatch { name: String, matches: Vec<String> },
    /// The matched business has no row in the businesses sheet
    RowNotFound { name: String },
}

impl std::fmt::Display for UploadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UploadError::InvalidName { object } => {
                write!(f, "'{}' does not name a business", object)
            }
            UploadError::AmbiguousMatch { name, matches } if matches.is_empty() => {
                write!(f, "no business matches \"{}\"", name)
            }
            UploadError::AmbiguousMatch { name, matches } => write!(
                f,
                "{} businesses match \"{}\": {}",
                matches.len(),
                name,
                matches.join(", ")
            ),
            UploadError::RowNotFound { name } => {
                write!(f, "business \"{}\" has no row in the businesses sheet", name)
            }
        }
    }
}

impl std::error::Error for UploadError {}

/// Where an upload ended up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOutcome {
    pub business: NamedNode,
    pub variant: ImageVariant,
    /// uid minted for the image; empty on a dry run
    pub image_uid: String,
    pub destination: Option<ObjectLocation>,
    /// Cell that received the uid
    pub cell: String,
}

pub struct UploadResolver<'a> {
    graph: &'a dyn GraphStore,
    sheet: &'a dyn TabularSource,
    store: &'a dyn ObjectStore,
    storage: StorageConfig,
    audit: AuditLog<'a>,
    dry_run: bool,
    now: Option<String>,
}

impl<'a> UploadResolver<'a> {
    pub fn new(
        graph: &'a dyn GraphStore,
        sheet: &'a dyn TabularSource,
        store: &'a dyn ObjectStore,
        storage: StorageConfig,
        audit: AuditConfig,
    ) -> Self {
        Self {
            graph,
            sheet,
            store,
            storage,
            audit: AuditLog::new(sheet, audit),
            dry_run: false,
            now: None,
        }
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Fix the audit timestamp
    pub fn with_timestamp(mut self, now: impl Into<String>) -> Self {
        self.now = Some(now.into());
        self
    }

    fn timestamp(&self) -> String {
        self.now
            .clone()
            .unwrap_or_else(|| Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    /// Resolve `object` to a business, relocate it and record its uid
    pub async fn handle(&self, object: &str) -> Result<UploadOutcome> {
        log::info!("Processing upload {}", object);

        match self.resolve(object).await? {
            Ok(resolved) => self.relocate(object, resolved).await,
            Err(rejection) => {
                log::warn!("Rejected upload {}: {}", object, rejection);
                if !self.dry_run {
                    self.record(object, Outcome::Rejected, rejection.to_string())
                        .await?;
                }
                Err(rejection.into())
            }
        }
    }

    /// Outer error is transport, inner is a rejection of the upload itself
    async fn resolve(&self, object: &str) -> Result<Result<Resolved, UploadError>> {
        let name = match UploadName::parse(object) {
            Ok(name) => name,
            Err(e) => return Ok(Err(e)),
        };

        let records = self
            .graph
            .query(&GraphQuery::NameMatches {
                label: Label::Business,
                pattern: name.pattern(),
            })
            .await
            .context("Failed to look up business by name")?;
        let mut matches = decode_named_nodes(&records)?;

        if matches.len() != 1 {
            return Ok(Err(UploadError::AmbiguousMatch {
                name: name.key,
                matches: matches.into_iter().map(|m| m.name).collect(),
            }));
        }
        let business = matches.remove(0);

        let range = schema::BUSINESSES.table_range()?;
        let rows = self
            .sheet
            .read(&range)
            .await
            .with_context(|| format!("Failed to read {}", range))?;

        let wanted = name::normalize(&business.name);
        let Some((row_index, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, row)| name::normalize(cell(row, business_columns::NAME)) == wanted)
        else {
            return Ok(Err(UploadError::RowNotFound {
                name: business.name,
            }));
        };

        let (column, value) = match name.variant {
            ImageVariant::Image => (business_columns::IMAGE, cell(row, business_columns::IMAGE)),
            ImageVariant::Logo => (business_columns::LOGO, cell(row, business_columns::LOGO)),
        };

        Ok(Ok(Resolved {
            business,
            variant: name.variant,
            cell: range.cell(column, row_index),
            current: value.to_string(),
        }))
    }

    async fn relocate(&self, object: &str, resolved: Resolved) -> Result<UploadOutcome> {
        let Resolved {
            business,
            variant,
            cell,
            current,
        } = resolved;

        if self.dry_run {
            log::info!(
                "(dry run) {} would become the {} of \"{}\" ({})",
                object,
                variant,
                business.name,
                cell
            );
            return Ok(UploadOutcome {
                business,
                variant,
                image_uid: String::new(),
                destination: None,
                cell,
            });
        }

        let image_uid = mint_uid();
        let source = ObjectLocation::new(&self.storage.staging_bucket, object);
        let destination = ObjectLocation::new(
            &self.storage.production_bucket,
            format!("{}.{}", image_uid, self.storage.extension),
        );

        self.store.copy(&source, &destination).await?;
        self.store.delete(&source).await?;

        let value = match variant {
            ImageVariant::Logo => image_uid.clone(),
            ImageVariant::Image if current.is_empty() => image_uid.clone(),
            ImageVariant::Image => format!("{},{}", current, image_uid),
        };
        self.sheet
            .write_batch(vec![ValueWrite::cell(cell.clone(), value)])
            .await
            .with_context(|| format!("Failed to record {} in {}", image_uid, cell))?;

        log::info!(
            "Moved {} to {} as the {} of \"{}\"",
            source,
            destination,
            variant,
            business.name
        );
        self.record(
            object,
            Outcome::Relocated,
            format!("{} of \"{}\" at {}", variant, business.name, destination),
        )
        .await?;

        Ok(UploadOutcome {
            business,
            variant,
            image_uid,
            destination: Some(destination),
            cell,
        })
    }

    async fn record(&self, object: &str, outcome: Outcome, detail: String) -> Result<()> {
        let entry = AuditEntry {
            timestamp: self.timestamp(),
            object: object.to_string(),
            outcome,
            detail,
        };
        self.audit.record(&entry).await
    }
}

/// A business row an upload belongs to
struct Resolved {
    business: NamedNode,
    variant: ImageVariant,
    cell: String,
    /// Current value of the target cell
    current: String,
}
