use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use forum_search::domain::{models::UserId, search::SearchRequest};

#[derive(Debug, Parser)]
#[command(name = "forum-search")]
#[command(about = "Search the threads of a forum channel")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Search a forum snapshot
    Search(SearchArgs),
    /// Print the keyword query syntax guide
    Syntax,
}

#[derive(Debug, Args)]
pub struct SearchArgs {
    /// JSON snapshot of the forum to search
    #[arg(long)]
    pub snapshot: PathBuf,

    /// Channel to search; defaults to the snapshot's channel
    #[arg(long)]
    pub channel: Option<u64>,

    /// Tags a thread must carry (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub tags: Vec<String>,

    /// Tags a thread must not carry (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub exclude_tags: Vec<String>,

    /// Keyword query, see `forum-search syntax`
    #[arg(long, short)]
    pub query: Option<String>,

    /// Comma-separated words that exclude a thread
    #[arg(long)]
    pub exclude_keywords: Option<String>,

    #[arg(long)]
    pub author: Option<u64>,

    #[arg(long)]
    pub exclude_author: Option<u64>,

    /// Earliest creation date (YYYY-MM-DD or relative like 7d)
    #[arg(long)]
    pub from: Option<String>,

    /// Latest creation date, inclusive
    #[arg(long)]
    pub until: Option<String>,

    #[arg(long)]
    pub min_reactions: Option<u64>,

    #[arg(long)]
    pub min_replies: Option<u64>,

    /// Sort order, e.g. reactions_desc, newest, oldest, active
    #[arg(long)]
    pub order: Option<String>,

    /// Page to print, starting at 1
    #[arg(long, default_value_t = 1)]
    pub page: usize,

    /// Cancel the search after this many seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Who is searching, for search history
    #[arg(long, default_value_t = 0)]
    pub user: u64,

    /// Print cache statistics as JSON after the search
    #[arg(long)]
    pub show_cache_stats: bool,
}

impl SearchArgs {
    pub fn to_request(&self) -> SearchRequest {
        SearchRequest {
            tags: self.tags.clone(),
            exclude_tags: self.exclude_tags.clone(),
            query: self.query.clone(),
            exclude_keywords: self.exclude_keywords.clone(),
            author: self.author.map(UserId::new),
            exclude_author: self.exclude_author.map(UserId::new),
            start_date: self.from.clone(),
            end_date: self.until.clone(),
            min_reactions: self.min_reactions,
            min_replies: self.min_replies,
            order: self.order.clone(),
        }
    }
}
