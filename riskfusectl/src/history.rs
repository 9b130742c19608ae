use anyhow::{Context, Result};
use riskfuse_core::HistoryStore;
use riskfuse_model::{
    DateWindow, HistoryEntry, HistoryEntryId, HistoryFilter, HistoryStatus, ScoreBand, StatusTab,
};

pub async fn list(
    store: &HistoryStore,
    status: StatusTab,
    band: ScoreBand,
    search: Option<String>,
    since: DateWindow,
    json: bool,
) -> Result<()> {
    let mut filter = HistoryFilter::default()
        .with_tab(status)
        .with_score_band(band)
        .with_since(since);
    if let Some(term) = search {
        filter = filter.with_search(term);
    }

    let entries = store
        .list(&filter)
        .await
        .context("failed to read scan history")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }
    if entries.is_empty() {
        println!("no matching entries");
        return Ok(());
    }
    for entry in &entries {
        println!("{}", format_entry(entry));
    }
    Ok(())
}

fn format_entry(entry: &HistoryEntry) -> String {
    let when = entry.timestamp.format("%Y-%m-%d %H:%M:%S");
    match entry.status {
        HistoryStatus::Completed => format!(
            "{}  {}  {:>3}  {:<10}  {}",
            entry.id,
            when,
            entry.score.map(|s| s.to_string()).unwrap_or_default(),
            entry.label.map(|l| l.to_string()).unwrap_or_default(),
            entry.file_name
        ),
        HistoryStatus::Error => format!(
            "{}  {}  ---  {:<10}  {} ({})",
            entry.id,
            when,
            "error",
            entry.file_name,
            entry.error.as_deref().unwrap_or("unknown error")
        ),
    }
}

pub async fn stats(store: &HistoryStore) -> Result<()> {
    let stats = store
        .stats()
        .await
        .context("failed to read scan history")?;
    println!("total       {}", stats.total);
    println!("clean       {}", stats.clean);
    println!("suspicious  {}", stats.suspicious);
    println!("malicious   {}", stats.malicious);
    println!("failed      {}", stats.failed);
    Ok(())
}

pub async fn remove(store: &HistoryStore, id: HistoryEntryId) -> Result<()> {
    if store
        .remove(id)
        .await
        .context("failed to update scan history")?
    {
        println!("removed {id}");
    } else {
        anyhow::bail!("no history entry with id {id}");
    }
    Ok(())
}

pub async fn clear(store: &HistoryStore) -> Result<()> {
    store
        .clear()
        .await
        .context("failed to clear scan history")?;
    println!("history cleared");
    Ok(())
}
