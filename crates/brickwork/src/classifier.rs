//! Decides how a modified column is applied.

use std::fmt;

use brickwork_schema::{ColumnChanges, ColumnOperation, MigrationPlan};
use serde::{Deserialize, Serialize};

use crate::adapter::{AdapterCapabilities, Capability};

/// How a column modify is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModifyStrategy {
    /// `ALTER COLUMN` in place
    Alter,
    /// Drop the column and add it again. Discards the column's data.
    DropAndAdd,
}

impl fmt::Display for ModifyStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModifyStrategy::Alter => write!(f, "alter"),
            ModifyStrategy::DropAndAdd => write!(f, "drop-and-add"),
        }
    }
}

/// Only nullability and default changes can be altered in place, and only
/// when the adapter supports `ALTER COLUMN`.
pub fn classify<C: AdapterCapabilities + ?Sized>(
    changes: &ColumnChanges,
    caps: &C,
) -> ModifyStrategy {
    let structural =
        changes.column_type.is_some() || changes.foreign_key.is_some() || changes.unique.is_some();
    if structural || !caps.supports(Capability::AlterColumn) {
        ModifyStrategy::DropAndAdd
    } else {
        ModifyStrategy::Alter
    }
}

/// A column whose data is discarded because it is dropped and re-added.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecreatedColumn {
    pub collection: String,
    pub table: String,
    pub column: String,
}

/// Every column the plans would recreate on this adapter.
pub fn recreated_columns<C: AdapterCapabilities + ?Sized>(
    plans: &[MigrationPlan],
    caps: &C,
) -> Vec<RecreatedColumn> {
    let mut out = Vec::new();
    for plan in plans {
        for table in &plan.tables {
            for op in &table.column_operations {
                if let ColumnOperation::Modify { column, changes } = op {
                    if classify(changes, caps) == ModifyStrategy::DropAndAdd {
                        out.push(RecreatedColumn {
                            collection: plan.collection_key.clone(),
                            table: table.table_name.clone(),
                            column: column.name.clone(),
                        });
                    }
                }
            }
        }
    }
    out
}
