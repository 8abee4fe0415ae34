//! Migration ordering.
//!
//! Tables reference only tables of a lower tier: document, then versions,
//! then document-fields and bricks, then repeaters by nesting depth. Creates
//! and modifies run by ascending tier, removals afterwards deepest first.

use brickwork_schema::{MigrationPlan, MigrationType, TableKey, TableMigration, TableType};

/// Removal priorities count down from here.
pub const REMOVAL_PRIORITY_BASE: u32 = 10_000;

/// Dependency depth of a table.
pub fn tier(table_type: TableType, key: &TableKey) -> u32 {
    match table_type {
        TableType::Document => 0,
        TableType::Versions => 1,
        TableType::DocumentFields | TableType::Brick => 2,
        TableType::Repeater => 3 + key.repeater.len().saturating_sub(1) as u32,
    }
}

pub fn priority(migration_type: MigrationType, table_type: TableType, key: &TableKey) -> u32 {
    let tier = tier(table_type, key);
    match migration_type {
        MigrationType::Create | MigrationType::Modify => tier,
        MigrationType::Remove => REMOVAL_PRIORITY_BASE - tier,
    }
}

/// Assign priorities to a plan's table migrations and sort them.
///
/// The sort is stable, so tables of equal priority keep compile order.
pub fn order(plan: &mut MigrationPlan) {
    for table in &mut plan.tables {
        if let (Some(table_type), Some(key)) = (table.table_type, &table.key) {
            table.priority = priority(table.migration_type, table_type, key);
        }
    }
    plan.tables.sort_by_key(|t| t.priority);
}

/// Every table migration of every plan in one global execution order.
pub fn order_all(plans: &[MigrationPlan]) -> Vec<(&MigrationPlan, &TableMigration)> {
    let mut all: Vec<_> = plans
        .iter()
        .flat_map(|plan| plan.tables.iter().map(move |table| (plan, table)))
        .collect();
    all.sort_by_key(|(_, table)| table.priority);
    all
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(brick: Option<&str>, repeater: &[&str]) -> TableKey {
        TableKey {
            collection: "page".into(),
            brick: brick.map(str::to_string),
            repeater: repeater.iter().map(|r| r.to_string()).collect(),
        }
    }

    fn migration(
        migration_type: MigrationType,
        table_type: TableType,
        key: TableKey,
    ) -> TableMigration {
        TableMigration {
            migration_type,
            priority: 0,
            table_name: crate::naming::table_name("bw", table_type, &key),
            table_type: Some(table_type),
            key: Some(key),
            column_operations: Vec::new(),
        }
    }

    #[test]
    fn tiers_follow_nesting() {
        assert_eq!(tier(TableType::Document, &key(None, &[])), 0);
        assert_eq!(tier(TableType::Versions, &key(None, &[])), 1);
        assert_eq!(tier(TableType::Brick, &key(Some("hero"), &[])), 2);
        assert_eq!(tier(TableType::Repeater, &key(Some("hero"), &["links"])), 3);
        assert_eq!(tier(TableType::Repeater, &key(Some("hero"), &["links", "tags"])), 4);
    }

    #[test]
    fn removals_run_deepest_first_after_creates() {
        let mut plan = MigrationPlan::new("page");
        plan.tables = vec![
            migration(MigrationType::Remove, TableType::Document, key(None, &[])),
            migration(MigrationType::Remove, TableType::Repeater, key(Some("hero"), &["links"])),
            migration(MigrationType::Create, TableType::Repeater, key(Some("seo"), &["urls"])),
            migration(MigrationType::Remove, TableType::Brick, key(Some("hero"), &[])),
            migration(MigrationType::Create, TableType::Brick, key(Some("seo"), &[])),
        ];
        order(&mut plan);

        let names: Vec<_> = plan.tables.iter().map(|t| t.table_name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "bw_document__page__seo",
                "bw_document__page__seo__urls",
                "bw_document__page__hero__links",
                "bw_document__page__hero",
                "bw_document__page",
            ]
        );
        assert_eq!(plan.tables[0].priority, 2);
        assert_eq!(plan.tables[4].priority, REMOVAL_PRIORITY_BASE);
    }

    #[test]
    fn global_order_interleaves_plans() {
        let mut news = MigrationPlan::new("news");
        news.tables = vec![migration(
            MigrationType::Create,
            TableType::DocumentFields,
            TableKey {
                collection: "news".into(),
                ..Default::default()
            },
        )];
        let mut page = MigrationPlan::new("page");
        page.tables = vec![migration(MigrationType::Create, TableType::Document, key(None, &[]))];
        order(&mut news);
        order(&mut page);

        let plans = [news, page];
        let all: Vec<_> = order_all(&plans)
            .into_iter()
            .map(|(plan, table)| (plan.collection_key.as_str(), table.priority))
            .collect();
        assert_eq!(all, vec![("page", 0), ("news", 2)]);
    }
}
