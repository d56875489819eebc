use std::path::Path;

use yomu_core::identity::load_conflicts;
use yomu_core::LibSqlStore;

use crate::commands::common::{format_conflict_lines, ConflictItem};
use crate::error::CliError;

pub async fn run_conflicts(limit: usize, as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let store = LibSqlStore::open(db_path).await?;
    let mut conflicts = load_conflicts(&store).await?;
    conflicts.truncate(limit);

    if as_json {
        let json_items = conflicts
            .iter()
            .map(ConflictItem::from)
            .collect::<Vec<ConflictItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
        return Ok(());
    }

    if conflicts.is_empty() {
        println!("No sync conflicts recorded.");
        return Ok(());
    }

    for line in format_conflict_lines(&conflicts) {
        println!("{line}");
    }
    Ok(())
}
