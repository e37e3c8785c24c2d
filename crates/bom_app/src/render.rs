use bom_core::{CollectionView, PartStatus};
use bom_ingest::RunSummary;

const STATUS_WIDTH: usize = 10;

/// One-line progress report for a snapshot.
pub fn progress_line(view: &CollectionView) -> String {
    let counts = view.counts;
    let settled = counts.identified + counts.failed;
    let percent = if counts.total() > 0 {
        settled as f64 / counts.total() as f64 * 100.0
    } else {
        0.0
    };
    format!(
        "Parts: {} | identified {} | failed {} | searching {} | pending {} ({:.0}%)",
        counts.total(),
        counts.identified,
        counts.failed,
        counts.searching,
        counts.pending,
        percent
    )
}

/// Fixed-width table of all rows, in collection order.
pub fn table(view: &CollectionView) -> String {
    let part_width = column_width("Part Number", view.rows.iter().map(|r| r.part_number.as_str()));
    let type_width = column_width("Part Type", view.rows.iter().map(|r| r.product_type.as_str()));
    let maker_width = column_width(
        "Manufacturer",
        view.rows.iter().map(|r| r.manufacturer.as_str()),
    );

    let mut lines = Vec::with_capacity(view.rows.len() + 2);
    lines.push(format!(
        "{:<part_width$}  {:<type_width$}  {:<maker_width$}  {}",
        "Part Number", "Part Type", "Manufacturer", "Status"
    ));
    lines.push("-".repeat(part_width + type_width + maker_width + STATUS_WIDTH + 6));
    for row in &view.rows {
        lines.push(format!(
            "{:<part_width$}  {:<type_width$}  {:<maker_width$}  {}",
            row.part_number,
            row.product_type,
            row.manufacturer,
            status_label(row.status)
        ));
    }
    let mut out = lines
        .iter()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n");
    out.push('\n');
    out
}

pub fn summary_line(summary: &RunSummary) -> String {
    let mut line = format!(
        "Run {}: {} identified, {} failed, {} unresolved of {}",
        summary.run_id, summary.identified, summary.failed, summary.unresolved, summary.total
    );
    let skipped = summary.decode_warnings + summary.format_errors;
    if skipped > 0 {
        line.push_str(&format!(" ({skipped} stream frames skipped)"));
    }
    line
}

fn status_label(status: PartStatus) -> &'static str {
    match status {
        PartStatus::Pending => "pending",
        PartStatus::Searching => "searching",
        PartStatus::Identified => "ok",
        PartStatus::Failed => "FAILED",
    }
}

fn column_width<'a>(header: &str, values: impl Iterator<Item = &'a str>) -> usize {
    values
        .map(|value| value.chars().count())
        .chain(std::iter::once(header.len()))
        .max()
        .unwrap_or(0)
}
