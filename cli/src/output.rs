//! Output formatting utilities

use arrow::array::{Array, BooleanArray};
use chrono::NaiveDate;
use serde::Serialize;
use tmdb_index_core::columns;
use tmdb_index_core::error::Result;
use tmdb_index_core::planner::watermark;
use tmdb_index_core::{ChangeSummary, KeyedTable, SyncReport};

/// Facts about one table file, as printed by `show`
#[derive(Debug, Serialize)]
pub struct TableInfo {
    pub path: String,
    pub file_size: u64,
    pub rows: usize,
    pub columns: Vec<ColumnInfo>,
    pub max_id: Option<u32>,
    pub watermark: Option<NaiveDate>,
    pub fetched: Option<usize>,
    pub never_fetched: Option<usize>,
    pub in_export: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
    pub nulls: usize,
}

impl TableInfo {
    pub fn from_table(path: &str, file_size: u64, table: &KeyedTable) -> Result<Self> {
        let schema = table.schema();
        let columns = schema
            .fields()
            .iter()
            .zip(table.batch().columns())
            .map(|(field, array)| ColumnInfo {
                name: field.name().clone(),
                data_type: field.data_type().to_string(),
                nulls: array.null_count(),
            })
            .collect();

        let retrieved_nulls = table.column(columns::RETRIEVED_AT).map(|c| c.null_count());
        let in_export = table
            .column(columns::IN_EXPORT)
            .and_then(|c| c.as_any().downcast_ref::<BooleanArray>())
            .map(|flags| flags.true_count());

        Ok(Self {
            path: path.to_string(),
            file_size,
            rows: table.height(),
            columns,
            max_id: table.max_id(),
            watermark: watermark(table)?,
            fetched: retrieved_nulls.map(|nulls| table.height() - nulls),
            never_fetched: retrieved_nulls,
            in_export,
        })
    }
}

/// Pretty printer for tmdb-index output
pub struct PrettyPrinter;

impl PrettyPrinter {
    /// Print the outcome of a sync run
    pub fn print_sync_report(path: &str, report: &SyncReport, changes: &ChangeSummary, dry_run: bool) {
        let entity = report
            .entity
            .map(|e| e.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        println!("🔄 Sync {entity}: {path}");

        match (report.dates_replayed.first(), report.dates_replayed.last()) {
            (Some(first), Some(last)) => println!(
                "├─ Change feed: {} of {} day(s) replayed ({first} → {last}), {} events",
                report.dates_replayed.len(),
                report.dates_planned,
                report.change_events
            ),
            _ => println!("├─ Change feed: up to date"),
        }
        println!("├─ Export: {} ids", report.export_size);
        println!("├─ Lookups: {}", report.lookups);
        println!(
            "│  ├─ Selected: {} changed, {} backfill, {} refresh",
            report.selected_changed, report.selected_backfill, report.selected_refresh
        );
        println!(
            "│  └─ Results: {} found, {} not found",
            report.lookups_succeeded, report.lookups_not_found
        );
        println!("├─ Rows: {} → {}", report.rows_before, report.rows_after);

        println!("{}", sync_changes_line(changes));

        if dry_run {
            println!("└─ 🟡 Dry run: table not written");
        } else {
            println!("└─ ✅ Table written");
        }
    }

    /// Print the change summary between two table files
    pub fn print_diff(old: &str, new: &str, changes: &ChangeSummary) {
        println!("🔍 Diff Results: {old} → {new}");
        if changes.has_changes() {
            println!("├─ ❌ Rows: {} changed", changes.total_changes());
            println!("│  ├─ Added: {}", changes.added);
            println!("│  ├─ Removed: {}", changes.removed);
            println!("│  └─ Updated: {}", changes.updated);
        } else {
            println!("├─ ✅ Rows: unchanged");
        }
        println!("└─ Summary: {changes}");
    }

    /// Print table file information
    pub fn print_table_info(info: &TableInfo) {
        println!("📦 Table: {}", info.path);
        println!("├─ Size: {}", format_bytes(info.file_size));
        println!("├─ Rows: {}", info.rows);
        match info.max_id {
            Some(max_id) => println!("├─ Max id: {max_id}"),
            None => println!("├─ Max id: -"),
        }
        match info.watermark {
            Some(date) => println!("├─ Watermark: {date}"),
            None => println!("├─ Watermark: none (next sync starts at the epoch)"),
        }
        if let (Some(fetched), Some(never)) = (info.fetched, info.never_fetched) {
            println!("├─ External ids: {fetched} fetched, {never} never fetched");
        }
        if let Some(in_export) = info.in_export {
            println!("├─ In export: {in_export}");
        }

        println!("└─ Columns: {}", info.columns.len());
        for (i, column) in info.columns.iter().enumerate() {
            let prefix = if i == info.columns.len() - 1 {
                "   └─"
            } else {
                "   ├─"
            };
            println!(
                "{prefix} {} ({}, {} nulls)",
                column.name, column.data_type, column.nulls
            );
        }
    }
}

/// JSON formatter for machine-readable output
pub struct JsonFormatter;

impl JsonFormatter {
    pub fn format_sync_report(report: &SyncReport, changes: &ChangeSummary, dry_run: bool) -> Result<String> {
        let json = serde_json::json!({
            "report": report,
            "changes": changes,
            "dry_run": dry_run,
        });
        Ok(serde_json::to_string_pretty(&json)?)
    }

    pub fn format_diff(changes: &ChangeSummary) -> Result<String> {
        Ok(serde_json::to_string_pretty(changes)?)
    }

    pub fn format_table_info(info: &TableInfo) -> Result<String> {
        Ok(serde_json::to_string_pretty(info)?)
    }
}

/// Tree line for the changes a sync applied
fn sync_changes_line(changes: &ChangeSummary) -> String {
    if changes.has_changes() {
        format!("├─ 📝 Changes: {changes}")
    } else {
        "├─ ✅ Changes: none".to_string()
    }
}

/// Format bytes in human-readable format
fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.1} {}", size, UNITS[unit_index])
    }
}
