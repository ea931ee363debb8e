use async_trait::async_trait;
use forum_search::domain::{
    models::SearchResult,
    ports::outbound::{ProgressSink, SearchProgress},
    search::SearchOutcome,
    ProgressError,
};
use time::macros::format_description;

const PREVIEW_CHARS: usize = 120;

/// Progress lines on stderr, keeping stdout for results.
pub struct StderrProgress;

#[async_trait]
impl ProgressSink for StderrProgress {
    async fn render(&self, progress: &SearchProgress) -> Result<(), ProgressError> {
        eprintln!("{}", progress.status_text());
        Ok(())
    }
}

pub fn print_outcome(outcome: &SearchOutcome, page: usize) {
    println!("{}", outcome.headline());

    if let Some(summary) = outcome.summary() {
        for line in &summary.conditions {
            println!("  {line}");
        }
        println!("  Order: {}", summary.order);
    }

    let Some(pages) = outcome.pages() else {
        return;
    };
    if pages.total_items() == 0 {
        return;
    }

    let index = pages.clamp(page.saturating_sub(1));
    println!();
    println!("{}", pages.label(index));
    let offset = index * pages.per_page();
    for (n, result) in pages.page(index).unwrap_or_default().iter().enumerate() {
        println!("{}", format_result(offset + n + 1, result));
    }
}

pub fn format_result(rank: usize, result: &SearchResult) -> String {
    let created = result
        .thread
        .created_at
        .format(format_description!("[year]-[month]-[day]"))
        .unwrap_or_default();
    let tags = if result.thread.applied_tags.is_empty() {
        String::new()
    } else {
        format!(" [{}]", result.thread.applied_tags.join(", "))
    };

    format!(
        "{rank}. {}{tags}\n   {} reactions, {} replies, created {created}\n   {}",
        result.thread.name,
        result.stats.reaction_count,
        result.stats.reply_count,
        preview(&result.first_message.content),
    )
}

fn preview(content: &str) -> String {
    let flat = content.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= PREVIEW_CHARS {
        return flat;
    }
    let cut: String = flat.chars().take(PREVIEW_CHARS).collect();
    format!("{}...", cut.trim_end())
}
