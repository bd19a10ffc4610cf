//! Subcommands and their output

use anyhow::Context;
use chrono::{Months, NaiveDate, Utc};
use clap::{Args as ClapArgs, Subcommand};
use grant_sdk::{
    parse_sort, EntityType, Facet, FetchOutcome, FilterState, Grant, GrantClient, Institute,
    PopularSearchParams, Recipient, SearchCategory, SortConfig, TermFacet,
};
use serde::Serialize;
use tracing::{debug, info};

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Search grants
    Search(SearchArgs),

    /// List recipients, largest funding first
    Recipients {
        /// Number of pages to load
        #[arg(short, long, default_value = "1", value_parser = clap::value_parser!(u32).range(1..))]
        pages: u32,
    },

    /// List research institutes
    Institutes {
        /// Number of pages to load
        #[arg(short, long, default_value = "1", value_parser = clap::value_parser!(u32).range(1..))]
        pages: u32,
    },

    /// Show the values available for each filter
    Filters,

    /// Show popular search terms
    Popular(PopularArgs),

    /// List or toggle bookmarks
    #[command(subcommand)]
    Bookmarks(BookmarkCommands),
}

#[derive(Debug, Clone, ClapArgs)]
pub struct SearchArgs {
    /// Recipient name contains
    #[arg(long)]
    pub recipient: Option<String>,

    /// Institute name contains
    #[arg(long)]
    pub institute: Option<String>,

    /// Grant title contains
    #[arg(long)]
    pub grant: Option<String>,

    /// Funding agency (repeatable)
    #[arg(long = "agency")]
    pub agencies: Vec<String>,

    /// Country (repeatable)
    #[arg(long = "country")]
    pub countries: Vec<String>,

    /// Province (repeatable)
    #[arg(long = "province")]
    pub provinces: Vec<String>,

    /// City (repeatable)
    #[arg(long = "city")]
    pub cities: Vec<String>,

    /// Year range, e.g. 2015-2020
    #[arg(long, value_parser = parse_year_range)]
    pub years: Option<(i32, i32)>,

    /// Agreement value range, e.g. 0-500000
    #[arg(long, value_parser = parse_value_range)]
    pub value: Option<(f64, f64)>,

    /// Agreements starting on or after (YYYY-MM-DD)
    #[arg(long)]
    pub from: Option<NaiveDate>,

    /// Agreements starting on or before (YYYY-MM-DD)
    #[arg(long)]
    pub to: Option<NaiveDate>,

    /// Sort as field:direction
    #[arg(long, default_value = "date:desc", value_parser = parse_sort_arg)]
    pub sort: SortConfig,

    /// Number of pages to load
    #[arg(short, long, default_value = "1", value_parser = clap::value_parser!(u32).range(1..))]
    pub pages: u32,

    /// Print metrics for the loaded grants
    #[arg(long)]
    pub analytics: bool,
}

#[derive(Debug, Clone, ClapArgs)]
pub struct PopularArgs {
    /// Window start (default: one year ago)
    #[arg(long)]
    pub from: Option<NaiveDate>,

    /// Window end (default: today)
    #[arg(long)]
    pub to: Option<NaiveDate>,

    /// Only terms from one search box
    #[arg(long, value_parser = parse_category)]
    pub category: Option<SearchCategory>,

    /// Number of pages to load
    #[arg(short, long, default_value = "1", value_parser = clap::value_parser!(u32).range(1..))]
    pub pages: u32,
}

#[derive(Debug, Clone, Subcommand)]
pub enum BookmarkCommands {
    /// List bookmarked ids
    List {
        /// grant, recipient or institute
        #[arg(value_parser = parse_entity)]
        entity: EntityType,
    },

    /// Bookmark an entity, or remove the bookmark if it exists
    Toggle {
        /// grant, recipient or institute
        #[arg(value_parser = parse_entity)]
        entity: EntityType,

        /// Entity id
        id: i64,
    },
}

pub async fn execute(client: &GrantClient, command: Command, json: bool) -> anyhow::Result<()> {
    match command {
        Command::Search(args) => search(client, args, json).await,
        Command::Recipients { pages } => recipients(client, pages, json).await,
        Command::Institutes { pages } => institutes(client, pages, json).await,
        Command::Filters => {
            let options = client.filter_options().await?;
            if json {
                return print_json(&options);
            }
            println!("Agencies:  {}", options.agencies.join(", "));
            println!("Countries: {}", options.countries.join(", "));
            println!("Provinces: {}", options.provinces.join(", "));
            println!("Cities:    {}", options.cities.join(", "));
            Ok(())
        }
        Command::Popular(args) => popular(client, args, json).await,
        Command::Bookmarks(command) => bookmarks(client, command, json).await,
    }
}

async fn search(client: &GrantClient, args: SearchArgs, json: bool) -> anyhow::Result<()> {
    let limits = *client.request_builder().limits();
    let mut filters = FilterState::new()
        .with_values(Facet::Agency, args.agencies)
        .with_values(Facet::Country, args.countries)
        .with_values(Facet::Province, args.provinces)
        .with_values(Facet::City, args.cities);
    if let Some((start, end)) = args.years {
        filters = filters.with_year_range(start, end);
    }
    if let Some((min, max)) = args.value {
        filters = filters.with_value_range(min, max);
    }
    if args.from.is_some() || args.to.is_some() {
        filters = filters.with_date_range(
            args.from.unwrap_or(limits.date_min),
            args.to.unwrap_or(limits.date_max),
        );
    }

    let terms = [
        (TermFacet::Recipient, args.recipient),
        (TermFacet::Institute, args.institute),
        (TermFacet::Grant, args.grant),
    ]
    .into_iter()
    .filter_map(|(facet, term)| term.map(|term| (facet, term)));

    let params = client.build_search(terms, &filters, args.sort)?;
    for filter in params.active_filters() {
        debug!(%filter, "Active filter");
    }

    client.search(&params).await?;
    let loaded = load_more(args.pages, || client.search_more(&params)).await?;
    info!(pages = loaded, "Search loaded");

    let results = client
        .search_results(&params)
        .await
        .context("search results missing from cache")?;

    if args.analytics {
        client.load_recipients().await?;
        let analytics = client.analytics(&params).await;
        if json {
            return print_json(&analytics);
        }
        println!("Grants loaded:     {} of {}", results.len(), results.total_count);
        println!("Total funding:     {:.2}", analytics.total_funding);
        println!("Funding growth:    {}", analytics.growth.text);
        println!("Specialization:    {}", analytics.specialization.text);
        println!(
            "Top 3 recipients:  {:.1}% ({})",
            analytics.concentration.concentration,
            analytics.concentration.rating.label()
        );
        println!("Average duration:  {}", analytics.duration.text);
        println!("Active recipients: {}", analytics.active_recipients.text);
        return Ok(());
    }

    if json {
        return print_json(&results.items);
    }
    for grant in &results.items {
        print_grant(grant);
    }
    println!(
        "-- {} of {} grants{}",
        results.len(),
        results.total_count,
        if results.has_more() { ", more available" } else { "" }
    );
    Ok(())
}

async fn recipients(client: &GrantClient, pages: u32, json: bool) -> anyhow::Result<()> {
    client.load_recipients().await?;
    load_more(pages, || client.more_recipients()).await?;

    let results = client
        .recipients()
        .await
        .context("recipients missing from cache")?;
    if json {
        return print_json(&results.items);
    }
    for recipient in &results.items {
        print_recipient(recipient);
    }
    println!("-- {} of {} recipients", results.len(), results.total_count);
    Ok(())
}

async fn institutes(client: &GrantClient, pages: u32, json: bool) -> anyhow::Result<()> {
    client.load_institutes().await?;
    load_more(pages, || client.more_institutes()).await?;

    let results = client
        .institutes()
        .await
        .context("institutes missing from cache")?;
    if json {
        return print_json(&results.items);
    }
    for institute in &results.items {
        print_institute(institute);
    }
    println!("-- {} of {} institutes", results.len(), results.total_count);
    Ok(())
}

async fn popular(client: &GrantClient, args: PopularArgs, json: bool) -> anyhow::Result<()> {
    let today = Utc::now().date_naive();
    let to = args.to.unwrap_or(today);
    let from = match args.from {
        Some(from) => from,
        None => to
            .checked_sub_months(Months::new(12))
            .context("date out of range")?,
    };
    let mut params = PopularSearchParams::new(from, to);
    if let Some(category) = args.category {
        params = params.with_category(category);
    }

    client.popular_searches(&params).await?;
    load_more(args.pages, || client.more_popular_searches(&params)).await?;

    let results = client
        .popular_results(&params)
        .await
        .context("popular searches missing from cache")?;
    if json {
        return print_json(&results.items);
    }
    for term in &results.items {
        println!("{:>10}  {:>6}  {}", term.category.as_str(), term.count, term.text);
    }
    Ok(())
}

async fn bookmarks(client: &GrantClient, command: BookmarkCommands, json: bool) -> anyhow::Result<()> {
    match command {
        BookmarkCommands::List { entity } => {
            let ids = client.load_bookmarks(entity).await?;
            if json {
                return print_json(&ids);
            }
            for id in ids {
                println!("{}", id);
            }
        }
        BookmarkCommands::Toggle { entity, id } => {
            let current = client.load_bookmarks(entity).await?;
            let bookmarked = client
                .toggle_bookmark(entity, id, current.contains(&id))
                .await?;
            if json {
                return print_json(&serde_json::json!({ "id": id, "bookmarked": bookmarked }));
            }
            println!(
                "{} {} {}",
                entity,
                id,
                if bookmarked { "bookmarked" } else { "removed from bookmarks" }
            );
        }
    }
    Ok(())
}

/// Run `fetch_more` until `pages` pages are loaded or nothing is left
///
/// Returns the number of pages loaded, counting the first.
async fn load_more<F, Fut>(pages: u32, mut fetch_more: F) -> anyhow::Result<u32>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = grant_sdk::Result<FetchOutcome>>,
{
    let mut loaded = 1;
    while loaded < pages {
        match fetch_more().await? {
            FetchOutcome::Loaded { .. } => loaded += 1,
            FetchOutcome::Skipped | FetchOutcome::Stale => break,
        }
    }
    Ok(loaded)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_grant(grant: &Grant) {
    println!(
        "{:>8}  {:>14}  {:<10}  {:<6}  {}",
        grant.grant_id,
        grant
            .agreement_value
            .map(|v| format!("{:.2}", v))
            .unwrap_or_else(|| "-".into()),
        grant.agreement_start_date.as_deref().map(date_part).unwrap_or("-"),
        grant.org.as_deref().unwrap_or("-"),
        grant.agreement_title_en.as_deref().unwrap_or("(untitled)")
    );
}

fn print_recipient(recipient: &Recipient) {
    println!(
        "{:>8}  {:>16}  {:>5}  {}",
        recipient.recipient_id,
        recipient
            .total_funding
            .map(|v| format!("{:.2}", v))
            .unwrap_or_else(|| "-".into()),
        recipient.grant_count.unwrap_or(0),
        recipient.legal_name.as_deref().unwrap_or("(unnamed)")
    );
}

fn print_institute(institute: &Institute) {
    let place: Vec<&str> = [&institute.city, &institute.province, &institute.country]
        .into_iter()
        .filter_map(|part| part.as_deref())
        .collect();
    println!(
        "{:>8}  {:>5}  {}  ({})",
        institute.institute_id,
        institute.recipient_count.unwrap_or(0),
        institute.name.as_deref().unwrap_or("(unnamed)"),
        if place.is_empty() { "-".to_string() } else { place.join(", ") }
    );
}

fn date_part(timestamp: &str) -> &str {
    timestamp.get(..10).unwrap_or(timestamp)
}

// ==================== Argument parsers ====================

fn split_range(s: &str) -> Result<(&str, &str), String> {
    s.split_once('-')
        .or_else(|| s.split_once(".."))
        .ok_or_else(|| format!("expected START-END, got '{}'", s))
}

fn parse_year_range(s: &str) -> Result<(i32, i32), String> {
    let (start, end) = split_range(s)?;
    let start = start.trim().parse().map_err(|e| format!("start year: {}", e))?;
    let end = end.trim().parse().map_err(|e| format!("end year: {}", e))?;
    Ok((start, end))
}

fn parse_value_range(s: &str) -> Result<(f64, f64), String> {
    let (min, max) = split_range(s)?;
    let min = min.trim().parse().map_err(|e| format!("minimum: {}", e))?;
    let max = max.trim().parse().map_err(|e| format!("maximum: {}", e))?;
    Ok((min, max))
}

fn parse_sort_arg(s: &str) -> Result<SortConfig, String> {
    parse_sort(s).map_err(|e| e.to_string())
}

fn parse_entity(s: &str) -> Result<EntityType, String> {
    EntityType::parse(s).ok_or_else(|| format!("unknown entity type '{}'", s))
}

fn parse_category(s: &str) -> Result<SearchCategory, String> {
    match EntityType::parse(s) {
        Some(EntityType::Grant) => Ok(SearchCategory::Grant),
        Some(EntityType::Recipient) => Ok(SearchCategory::Recipient),
        Some(EntityType::Institute) => Ok(SearchCategory::Institute),
        None => Err(format!("unknown search category '{}'", s)),
    }
}
