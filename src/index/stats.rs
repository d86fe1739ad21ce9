use crate::index::tree::SpatialIndex;
use crate::index::types::{IndexFile, IndexStats, OpenMode, RecordKind};
use anyhow::{Context, Result};
use std::path::Path;

/// Load statistics for the index at `path` without modifying it
pub fn load_stats(path: &Path) -> Result<IndexStats> {
    let index_path = IndexFile::Structure.path_for(path);
    let index = SpatialIndex::open(&index_path, OpenMode::ReadOnly)
        .with_context(|| format!("Failed to open index {}", index_path.display()))?;
    Ok(index.stats())
}

/// Display index statistics
pub fn show_stats(path: &Path, json: bool) -> Result<()> {
    let stats = load_stats(path)?;

    if json {
        let out = serde_json::to_string_pretty(&stats).context("Failed to serialize stats")?;
        println!("{}", out);
        return Ok(());
    }

    let kind = match stats.record_kind {
        RecordKind::Point => "point",
        RecordKind::Rectangle => "rectangle",
    };

    println!("Index Statistics");
    println!("================");
    println!();
    println!("Index file:       {}", stats.path.display());
    println!("Record kind:      {}", kind);
    println!("Record count:     {}", stats.count);
    println!("Page size:        {}", format_size(stats.page_size as u64));
    println!("Pages:            {}", stats.page_count);
    println!("Tree height:      {}", stats.height);
    match stats.extent {
        Some(extent) => println!("Extent:           {}", extent),
        None => println!("Extent:           (empty)"),
    }

    println!();
    println!("Structure size:   {}", format_size(stats.structure_bytes));
    println!("Identifier size:  {}", format_size(stats.ids_bytes));
    println!(
        "Total size:       {}",
        format_size(stats.structure_bytes + stats.ids_bytes)
    );

    Ok(())
}

/// Format byte size to human readable
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}
