//! CLI entry point for `famarchive`.

use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{NaiveDate, Utc};
use clap::{CommandFactory, Parser, Subcommand};
use humansize::{format_size, BINARY};
use indicatif::{ProgressBar, ProgressStyle};

use famarchive::backend::local::{LocalBlobStore, LocalCatalog};
use famarchive::config::{self, Config};
use famarchive::enrich::gemini::GeminiEnricher;
use famarchive::enrich::{DisabledEnricher, Enricher};
use famarchive::export::{self, ExportContext, ExportFormat};
use famarchive::model::item::parse_shared_with;
use famarchive::model::{Category, ItemDraft, ItemType, PendingFile, Viewer, VisibleItem};
use famarchive::search::{ItemFilters, OwnerFilter};
use famarchive::sync::{ArchiveView, Synchronizer, UploadState};

#[derive(Parser)]
#[command(
    name = "famarchive",
    version,
    about = "Catalog family items and their scanned files"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Act as this user id (default: identity.user_id from the config)
    #[arg(long, global = true, env = "FAMARCHIVE_USER")]
    user: Option<String>,

    /// Email of the acting user (default: identity.email from the config)
    #[arg(long, global = true, env = "FAMARCHIVE_EMAIL")]
    email: Option<String>,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// Metadata flags shared by `add` and `edit`.
#[derive(clap::Args)]
struct ItemArgs {
    /// Related date as free text ("Summer 1952")
    #[arg(long)]
    date: Option<String>,
    /// Where the physical item is kept
    #[arg(long)]
    location: Option<String>,
    /// Description (may contain HTML)
    #[arg(long)]
    description: Option<String>,
    /// Comma-separated emails to share with
    #[arg(long, value_name = "EMAILS")]
    share: Option<String>,
    /// Files to attach
    #[arg(short, long = "file", value_name = "PATH")]
    files: Vec<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Save --user and --email as the default identity in the config file
    Init,
    /// Add an item, optionally with files
    Add {
        title: String,
        /// Item type (e.g. photo, "letter/correspondence")
        #[arg(short = 't', long = "type", value_parser = parse_item_type)]
        item_type: ItemType,
        /// Category (e.g. "family history", military)
        #[arg(short, long, value_parser = parse_category)]
        category: Category,
        #[command(flatten)]
        args: ItemArgs,
    },
    /// Edit an item you own and attach more files
    Edit {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(short = 't', long = "type", value_parser = parse_item_type)]
        item_type: Option<ItemType>,
        #[arg(short, long, value_parser = parse_category)]
        category: Option<Category>,
        #[command(flatten)]
        args: ItemArgs,
    },
    /// List visible items
    List {
        /// Search title, description and transcription
        #[arg(short, long)]
        search: Option<String>,
        /// all, owned or shared
        #[arg(long, default_value = "all")]
        owner: OwnerFilter,
        #[arg(short, long, value_parser = parse_category)]
        category: Option<Category>,
        #[arg(short = 't', long = "type", value_parser = parse_item_type)]
        item_type: Option<ItemType>,
        /// Created on or after this date (YYYY-MM-DD)
        #[arg(long)]
        from: Option<NaiveDate>,
        /// Created on or before this date (YYYY-MM-DD)
        #[arg(long)]
        to: Option<NaiveDate>,
        #[arg(short, long, default_value_t = 1)]
        page: usize,
        /// Show only the most recent items
        #[arg(long)]
        recent: bool,
        #[arg(long)]
        json: bool,
    },
    /// Show one item
    Show {
        id: String,
        #[arg(long)]
        json: bool,
    },
    /// Delete an item you own and its files
    Delete { id: String },
    /// Show storage usage
    Quota {
        #[arg(long)]
        json: bool,
    },
    /// Export visible items
    Export {
        /// csv or sql (default: export.default_format)
        #[arg(short, long)]
        format: Option<ExportFormat>,
        /// Output file (default: family_archive_export_<date>.<ext>)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

fn parse_item_type(s: &str) -> Result<ItemType, String> {
    s.parse()
}

fn parse_category(s: &str) -> Result<Category, String> {
    s.parse()
}

/// Collaborators backing the CLI, owned for the duration of one command.
struct Backend {
    catalog: LocalCatalog,
    blobs: LocalBlobStore,
    enricher: Box<dyn Enricher>,
}

impl Backend {
    fn open(config: &Config) -> anyhow::Result<Self> {
        let dir = config::data_dir(config);
        let catalog = LocalCatalog::open(&dir)
            .with_context(|| format!("opening catalog in {}", dir.display()))?;
        let blobs = LocalBlobStore::open(&dir)
            .with_context(|| format!("opening blob store in {}", dir.display()))?;

        let enricher: Box<dyn Enricher> = if !config.enrichment.enabled {
            Box::new(DisabledEnricher)
        } else if let Some(gemini) = GeminiEnricher::from_config(&config.enrichment) {
            Box::new(gemini)
        } else {
            tracing::warn!(
                env = config::API_KEY_ENV,
                "No enrichment API key configured; files will not be transcribed"
            );
            Box::new(DisabledEnricher)
        };

        Ok(Self {
            catalog,
            blobs,
            enricher,
        })
    }

    fn synchronizer<'a>(&'a self, config: &Config) -> Synchronizer<'a> {
        Synchronizer::new(
            &self.catalog,
            &self.blobs,
            self.enricher.as_ref(),
            config.limits.sync_limits(),
        )
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = config::load_config();

    // Configure logging: stderr + optional log file
    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);

    match cli.command {
        Commands::Init => cmd_init(config, cli.user, cli.email),
        Commands::Completions { shell } => cmd_completions(shell),
        Commands::Manpage => cmd_manpage(),
        command => {
            let viewer = resolve_viewer(cli.user, cli.email, &config)?;
            let backend = Backend::open(&config)?;
            let sync = backend.synchronizer(&config);
            run(command, &sync, &viewer, &config)
        }
    }
}

fn run(
    command: Commands,
    sync: &Synchronizer<'_>,
    viewer: &Viewer,
    config: &Config,
) -> anyhow::Result<()> {
    match command {
        Commands::Add {
            title,
            item_type,
            category,
            args,
        } => {
            let mut draft = ItemDraft::new(title, item_type, category);
            apply_item_args(&mut draft, &args);
            cmd_save(sync, viewer, draft, None, &args.files)
        }
        Commands::Edit {
            id,
            title,
            item_type,
            category,
            args,
        } => {
            let existing = sync.visible_item(viewer, &id)?;
            let mut draft = ItemDraft::from_item(&existing);
            if let Some(title) = title {
                draft.title = title;
            }
            if let Some(item_type) = item_type {
                draft.item_type = item_type;
            }
            if let Some(category) = category {
                draft.category = category;
            }
            apply_item_args(&mut draft, &args);
            cmd_save(sync, viewer, draft, Some(&existing), &args.files)
        }
        Commands::List {
            search,
            owner,
            category,
            item_type,
            from,
            to,
            page,
            recent,
            json,
        } => {
            let mut view = ArchiveView::new(config.display.page_size);
            view.refresh(sync, viewer)?;
            if recent {
                let items = view.recent(config.display.recent_limit).to_vec();
                return print_items(&items, 1, 1, &[], json, config);
            }
            view.set_search(search.unwrap_or_default());
            view.set_filters(ItemFilters {
                owner,
                category,
                item_type,
                date_from: from,
                date_to: to,
            });
            view.set_page(page);
            print_items(
                &view.page_items(),
                view.page(),
                view.page_count(),
                &view.categories(),
                json,
                config,
            )
        }
        Commands::Show { id, json } => {
            let item = sync.visible_item(viewer, &id)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&item)?);
            } else {
                print_item_detail(&item, config);
            }
            Ok(())
        }
        Commands::Delete { id } => {
            let report = sync.delete_item_by_id(viewer, &id)?;
            println!(
                "  Deleted {id} ({} released)",
                format_size(report.bytes_released, BINARY)
            );
            for path in &report.orphaned_paths {
                eprintln!("  warning: could not remove stored file {path}");
            }
            if let Some(err) = report.quota_error {
                eprintln!("  warning: {err}");
            }
            Ok(())
        }
        Commands::Quota { json } => {
            let quota = sync.storage_quota(
                viewer,
                config.limits.storage_quota,
                config.limits.quota_warning_threshold,
            )?;
            if json {
                println!("{}", serde_json::to_string_pretty(&quota)?);
            } else {
                println!();
                println!("  {}", quota.summary());
                println!("  {:<12} {}", "Remaining", format_size(quota.remaining(), BINARY));
                if quota.is_near_limit() {
                    println!("  You are close to your storage limit.");
                }
                println!();
            }
            Ok(())
        }
        Commands::Export { format, output } => {
            cmd_export(sync, viewer, config, format, output.as_deref())
        }
        Commands::Init | Commands::Completions { .. } | Commands::Manpage => Ok(()),
    }
}

/// Viewer from flags, falling back to the configured identity.
fn resolve_viewer(
    user: Option<String>,
    email: Option<String>,
    config: &Config,
) -> anyhow::Result<Viewer> {
    let id = user.or_else(|| config.identity.user_id.clone());
    let email = email.or_else(|| config.identity.email.clone());
    match (id, email) {
        (Some(id), Some(email)) => {
            let viewer = Viewer::new(id, email);
            viewer.validate()?;
            Ok(viewer)
        }
        _ => anyhow::bail!(
            "No identity given. Pass --user and --email, or run `famarchive init`."
        ),
    }
}

fn apply_item_args(draft: &mut ItemDraft, args: &ItemArgs) {
    if let Some(ref date) = args.date {
        draft.related_date = date.clone();
    }
    if let Some(ref location) = args.location {
        draft.physical_location = location.clone();
    }
    if let Some(ref description) = args.description {
        draft.description = description.clone();
    }
    if let Some(ref share) = args.share {
        draft.shared_with = parse_shared_with(share);
    }
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let log_dir = config::data_dir(config);
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, "famarchive.log");
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

fn cmd_init(
    mut config: Config,
    user: Option<String>,
    email: Option<String>,
) -> anyhow::Result<()> {
    let (Some(user), Some(email)) = (user, email) else {
        anyhow::bail!("`famarchive init` needs both --user and --email");
    };
    Viewer::new(user.clone(), email.clone()).validate()?;
    config.identity.user_id = Some(user);
    config.identity.email = Some(email);
    config::save_config(&config)?;
    if let Some(path) = config::config_file_path() {
        println!("  Saved identity to {}", path.display());
    }
    Ok(())
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "famarchive", &mut std::io::stdout());
    Ok(())
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> anyhow::Result<()> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::Write::write_all(&mut std::io::stdout(), &buf)?;
    Ok(())
}

/// Create or update an item, uploading `paths` with a progress bar.
fn cmd_save(
    sync: &Synchronizer<'_>,
    viewer: &Viewer,
    draft: ItemDraft,
    existing: Option<&VisibleItem>,
    paths: &[PathBuf],
) -> anyhow::Result<()> {
    let files = paths
        .iter()
        .map(|p| PendingFile::from_path(p))
        .collect::<Result<Vec<_>, _>>()?;

    let pb = ProgressBar::new(100);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {msg}")
            .expect("valid template")
            .progress_chars("#>-"),
    );
    if files.is_empty() {
        pb.set_draw_target(indicatif::ProgressDrawTarget::hidden());
    }

    let observer = |state: &UploadState| {
        pb.set_position(u64::from(state.percent()));
        pb.set_message(state.message());
        true
    };
    let result = sync.save_item(
        viewer,
        draft,
        existing.map(|v| &v.item),
        &files,
        Some(&observer),
    );
    pb.finish_and_clear();
    let saved = result?;

    let verb = if saved.created { "Created" } else { "Updated" };
    println!("  {verb} {}", saved.id);
    for attachment in &saved.attachments {
        let note = if attachment.has_transcription {
            " (transcribed)"
        } else if attachment.has_ai_description {
            " (described)"
        } else {
            ""
        };
        println!(
            "    + {} {}{}",
            attachment.name,
            format_size(attachment.size, BINARY),
            note
        );
    }
    if let Some(err) = saved.quota_error {
        eprintln!("  warning: {err}");
    }
    Ok(())
}

fn cmd_export(
    sync: &Synchronizer<'_>,
    viewer: &Viewer,
    config: &Config,
    format: Option<ExportFormat>,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    let format = match format {
        Some(f) => f,
        None => config
            .export
            .default_format
            .parse()
            .map_err(|e: String| anyhow::anyhow!(e))?,
    };
    let items = sync.load_visible_items(viewer)?;

    let now = Utc::now();
    let output = match output {
        Some(path) => path.to_path_buf(),
        None => {
            let name = export::default_file_name(format, now.date_naive());
            match config.export.default_output_dir {
                Some(ref dir) => dir.join(name),
                None => PathBuf::from(name),
            }
        }
    };

    let context = ExportContext {
        generated_at: now,
        user_email: viewer.email.clone(),
    };
    export::export_to_file(&items, format, &context, &output)?;
    println!(
        "  Exported {} item(s) as {} to {}",
        items.len(),
        format.extension(),
        output.display()
    );
    Ok(())
}

/// Print items as a table or as JSON. `categories` lists every category in
/// the loaded archive, shown under the table as a hint for `--category`.
fn print_items(
    items: &[VisibleItem],
    page: usize,
    page_count: usize,
    categories: &[Category],
    json: bool,
    config: &Config,
) -> anyhow::Result<()> {
    if json {
        let output = serde_json::json!({
            "page": page,
            "page_count": page_count,
            "items": items,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!();
    if items.is_empty() {
        println!("  No items");
        println!();
        return Ok(());
    }

    println!(
        "  {:<14} {:<16} {:<36} {:<18} {:<7} {:>10}",
        "ID", "Created", "Title", "Category", "Owner", "Files"
    );
    println!("  {}", "-".repeat(106));
    for item in items {
        let created = item
            .created_at
            .map(|t| t.format(&config.general.date_format).to_string())
            .unwrap_or_default();
        let title: String = item.title.chars().take(35).collect();
        let owner = if item.is_owner { "mine" } else { "shared" };
        println!(
            "  {:<14} {:<16} {:<36} {:<18} {:<7} {:>10}",
            item.id,
            created,
            title,
            item.category.label(),
            owner,
            format_size(item.total_file_size(), BINARY)
        );
    }
    println!();
    println!("  Page {page} of {page_count}");
    if !categories.is_empty() {
        let names: Vec<&str> = categories.iter().map(|c| c.label()).collect();
        println!("  Categories: {}", names.join(", "));
    }
    println!();
    Ok(())
}

fn print_item_detail(item: &VisibleItem, config: &Config) {
    let date = |t: Option<chrono::DateTime<Utc>>| {
        t.map(|t| t.format(&config.general.date_format).to_string())
            .unwrap_or_else(|| "-".into())
    };

    println!();
    println!("  {}", item.title);
    println!("  {}", "=".repeat(item.title.chars().count().max(8)));
    println!("  {:<12} {}", "ID", item.id);
    println!("  {:<12} {}", "Type", item.item_type);
    println!("  {:<12} {}", "Category", item.category);
    if !item.related_date.is_empty() {
        println!("  {:<12} {}", "Date", item.related_date);
    }
    if !item.physical_location.is_empty() {
        println!("  {:<12} {}", "Location", item.physical_location);
    }
    let owner = if item.is_owner { " (you)" } else { "" };
    println!("  {:<12} {}{owner}", "Owner", item.owner_email);
    if !item.shared_with.is_empty() {
        println!("  {:<12} {}", "Shared with", item.shared_with.join(", "));
    }
    println!("  {:<12} {}", "Created", date(item.created_at));
    println!("  {:<12} {}", "Updated", date(item.updated_at));

    let description = famarchive::search::strip_html(&item.description);
    if !description.is_empty() {
        println!();
        println!("  {description}");
    }

    if let Some(thumb) = item.thumbnail() {
        println!("  {:<12} {}", "Thumbnail", thumb.url);
    }

    if !item.files.is_empty() {
        println!();
        println!("  Files:");
        for file in &item.files {
            println!(
                "    {} ({}, {})",
                file.name,
                file.mime_type,
                format_size(file.size, BINARY)
            );
            if let Some(ref text) = file.ai_description {
                println!("      {text}");
            }
        }
    }

    if !item.transcription.is_empty() {
        println!();
        println!("  Transcription:");
        for line in item.transcription.lines() {
            println!("    {line}");
        }
    }
    println!();
}
