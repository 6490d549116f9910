use crate::scout::item::Item;
use anyhow::{Context, Result};
use chrono::Local;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Hands kept items to whatever summarizes them downstream.
pub trait Sink {
    /// Returns where the batch went, or `None` when there was nothing to write.
    fn persist(&self, label: &str, items: &[Item]) -> Result<Option<PathBuf>>;
}

/// Appends batches to one markdown file per day and label.
pub struct MarkdownSink {
    raw_dir: PathBuf,
}

impl MarkdownSink {
    pub fn new(raw_dir: &Path) -> Self {
        Self {
            raw_dir: raw_dir.to_path_buf(),
        }
    }
}

pub fn render_item(item: &Item) -> String {
    let mut out = String::new();
    let mut header = format!("### {}", item.origin);
    if !item.author.is_empty() {
        header.push_str(&format!(" by @{}", item.author));
    }
    let thread = item.thread.as_deref().filter(|t| !t.is_empty());
    if let Some(thread) = thread {
        header.push_str(&format!(" (thread, {} parts)", thread.len()));
    }
    out.push_str(&header);
    out.push_str("\n\n");

    match thread {
        Some(thread) => {
            for (i, part) in thread.iter().enumerate() {
                out.push_str(&format!("**[{}/{}]**\n{}\n\n", i + 1, thread.len(), part.text.trim()));
            }
        }
        None => {
            out.push_str(item.text.trim());
            out.push_str("\n\n");
        }
    }

    let e = &item.engagement;
    let mut stats = format!("likes {}  shares {}  replies {}", e.likes, e.shares, e.replies);
    if let Some(views) = e.impressions.filter(|v| *v > 0) {
        stats.push_str(&format!("  views {views}"));
    }
    stats.push_str(&format!("  | id: {}", item.id));
    if let Some(conv) = item.conversation_id.as_deref().filter(|_| thread.is_some()) {
        stats.push_str(&format!("  | conv: {conv}"));
    }
    out.push_str(&stats);
    out.push_str("\n\n---\n\n");
    out
}

impl Sink for MarkdownSink {
    fn persist(&self, label: &str, items: &[Item]) -> Result<Option<PathBuf>> {
        if items.is_empty() {
            return Ok(None);
        }
        fs::create_dir_all(&self.raw_dir)
            .with_context(|| format!("failed to create {}", self.raw_dir.display()))?;

        let now = Local::now();
        let date = now.format("%Y-%m-%d").to_string();
        let path = self.raw_dir.join(format!("{date}_{label}.md"));
        let is_new = !path.exists();

        let mut body = String::new();
        if is_new {
            body.push_str(&format!("# Scout {label} - {date}\n\n"));
        }
        body.push_str(&format!("\n## {} ({} items)\n\n", now.format("%H:%M"), items.len()));
        for item in items {
            body.push_str(&render_item(item));
        }

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("failed to open {}", path.display()))?;
        file.write_all(body.as_bytes())
            .with_context(|| format!("failed to append {}", path.display()))?;
        Ok(Some(path))
    }
}
