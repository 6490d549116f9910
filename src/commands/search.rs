use crate::commands::{CommandReport, open_session};
use crate::scout::collector::build_collector;
use crate::scout::dedup;
use crate::scout::paths::resolve_paths;
use crate::scout::sink::{MarkdownSink, Sink};
use crate::scout::util::truncate_with_ellipsis;
use anyhow::Result;

#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub query: String,
    pub limit: Option<usize>,
}

/// Ad-hoc query. Leaves the seen-set, cursors and ledger untouched.
pub fn run(opts: &SearchOptions) -> Result<CommandReport> {
    let mut report = CommandReport::new("search");
    let paths = resolve_paths()?;
    let session = open_session(&paths, &mut report, false)?;
    let collector = build_collector(&session.watchlist)?;
    let limit = opts.limit.unwrap_or(session.watchlist.schedule.search_limit);

    let items = collector.search(&opts.query, limit)?;
    let fetched = items.len();
    let (mut items, excluded) =
        dedup::filter_exclude(items, &session.watchlist.filters.exclude_keywords);
    for item in &mut items {
        item.origin = format!("search:{}", opts.query);
    }

    report.detail(format!("query={} limit={limit}", opts.query));
    report.detail(format!(
        "fetched={fetched} excluded={excluded} kept={}",
        items.len()
    ));
    for item in &items {
        report.detail(format!(
            "@{} likes={} shares={} {}",
            item.author,
            item.engagement.likes,
            item.engagement.shares,
            truncate_with_ellipsis(&item.text, 80)
        ));
    }

    match MarkdownSink::new(&paths.raw_dir).persist("search", &items) {
        Ok(Some(path)) => report.detail(format!("raw.file={}", path.display())),
        Ok(None) => {}
        Err(err) => report.warning(format!("raw.write_failed={err:#}")),
    }
    report.attach(&items)?;
    Ok(report)
}
