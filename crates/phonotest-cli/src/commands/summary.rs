//! The `phonotest summary` command.

use std::path::PathBuf;

use anyhow::Result;
use comfy_table::{Cell, Table};

use phonotest_core::model::Category;
use phonotest_core::report::ReportKind;
use phonotest_core::statistics::{OrganizerKey, PositionStats, ResultSummary};

pub async fn execute(
    category: Category,
    organize_by: OrganizerKey,
    config: Option<PathBuf>,
) -> Result<()> {
    let experiment = super::load_experiment(config)?;
    let summary = experiment
        .summarize(ReportKind::new(category, organize_by))
        .await?;

    if summary.groups.is_empty() {
        println!("No {}.", summary.title());
        return Ok(());
    }

    println!("{}", summary.title());
    println!("{}", render_table(&summary));
    Ok(())
}

fn percent(value: Option<f64>) -> String {
    value
        .map(|v| format!("{:.1}%", v * 100.0))
        .unwrap_or_else(|| "-".into())
}

fn millis(value: Option<f64>) -> String {
    value
        .map(|v| format!("{v:.0}ms"))
        .unwrap_or_else(|| "-".into())
}

fn position_cells(stats: &PositionStats) -> [Cell; 3] {
    [
        Cell::new(stats.responses),
        Cell::new(percent(stats.accuracy)),
        Cell::new(millis(stats.mean_reaction_time)),
    ]
}

fn render_table(summary: &ResultSummary) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        summary.organizer.to_string(),
        "Pre N".into(),
        "Pre Acc".into(),
        "Pre RT".into(),
        "Post N".into(),
        "Post Acc".into(),
        "Post RT".into(),
        "Change".into(),
    ]);

    for group in &summary.groups {
        let mut row = vec![Cell::new(&group.key)];
        row.extend(position_cells(&group.pre));
        row.extend(position_cells(&group.post));
        row.push(Cell::new(
            group
                .accuracy_change()
                .map(|d| format!("{:+.1}pp", d * 100.0))
                .unwrap_or_else(|| "-".into()),
        ));
        table.add_row(row);
    }

    table
}
