use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, level_filters::LevelFilter, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod cli_style;
use cli_style::{
    get_styles, print_empty_list, print_error, print_key_value, print_key_value_highlight,
    print_section_footer, print_section_header, print_success, print_trend, print_warning,
    TableBuilder,
};

use profile_metrics::config::{AppConfig, CliConfig, FileConfig};
use profile_metrics::metrics::{MetricsEngine, MetricsError};
use profile_metrics::profile_store::{
    MetricsOrder, SqliteProfileStore, TagKey, TagMetrics, TagMetricsStore, TagType,
};

fn parse_path(s: &str) -> Result<PathBuf> {
    let original_path = PathBuf::from(s);
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

fn parse_tag_type(s: &str) -> Result<TagType, String> {
    TagType::parse(s).ok_or_else(|| format!("unknown tag type '{}'", s))
}

fn parse_order(s: &str) -> Result<MetricsOrder, String> {
    MetricsOrder::parse(s).ok_or_else(|| format!("cannot order by '{}'", s))
}

#[derive(Parser, Debug)]
#[command(styles=get_styles(), version, about = "Computes and inspects per-tag profile metrics")]
struct CliArgs {
    /// Path to the SQLite profile database file.
    #[clap(long, value_parser = parse_path)]
    pub db: Option<PathBuf>,

    /// Path to a TOML config file. Its values override the command line.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Recomputes the metrics of every tag carried by a public entity.
    Recalculate {
        /// Only recompute tags of this type (technology, skill, generic).
        #[clap(long = "type", value_parser = parse_tag_type)]
        tag_type: Option<TagType>,

        /// Recompute even when stored metrics already carry the current version.
        #[clap(long)]
        force: bool,

        /// Print the top skills and technologies after the pass.
        #[clap(short, long)]
        verbose: bool,

        /// Number of entries in the verbose top lists.
        #[clap(long, default_value_t = 10)]
        top: usize,
    },

    /// Shows the stored metrics of one tag.
    Show {
        tag: String,
        #[clap(value_parser = parse_tag_type)]
        tag_type: TagType,
    },

    /// Lists stored metrics, best first.
    List {
        #[clap(long = "type", value_parser = parse_tag_type)]
        tag_type: Option<TagType>,

        /// relevance_score, proficiency, entity_count, frequency, last_used,
        /// experience_years or diversity_score.
        #[clap(long, default_value = "relevance_score", value_parser = parse_order)]
        order_by: MetricsOrder,

        #[clap(long, default_value_t = 20)]
        limit: usize,
    },
}

fn main() -> ExitCode {
    let cli_args = CliArgs::parse();

    if let Err(e) = tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
    {
        eprintln!("Failed to initialize logging: {}", e);
    }

    match run(cli_args) {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            print_error(&format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}

fn run(cli_args: CliArgs) -> Result<ExitCode> {
    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading config from {:?}", path);
            Some(FileConfig::load(path)?)
        }
        None => None,
    };
    let cli_config = CliConfig {
        db_path: cli_args.db.clone(),
    };
    let config = AppConfig::resolve(&cli_config, file_config)?;

    match cli_args.command {
        Command::Recalculate {
            tag_type,
            force,
            verbose,
            top,
        } => recalculate(config, tag_type, force, verbose, top),
        Command::Show { tag, tag_type } => show(config, TagKey::new(tag, tag_type)),
        Command::List {
            tag_type,
            order_by,
            limit,
        } => list(config, tag_type, order_by, limit),
    }
}

fn open_store(config: &AppConfig) -> Result<Arc<SqliteProfileStore>> {
    let store = SqliteProfileStore::new(&config.db_path)
        .with_context(|| format!("Failed to open profile database {:?}", config.db_path))?;
    Ok(Arc::new(store))
}

fn recalculate(
    config: AppConfig,
    tag_type: Option<TagType>,
    force: bool,
    verbose: bool,
    top: usize,
) -> Result<ExitCode> {
    if !config.metrics.enabled {
        warn!("metrics.enabled is false, refusing to recalculate");
        print_error("Metrics calculation is disabled in configuration");
        return Ok(ExitCode::FAILURE);
    }

    let store = open_store(&config)?;
    let engine = MetricsEngine::new(store.clone(), store.clone(), config.metrics.clone());

    if !force && engine.is_up_to_date()? {
        print_success(&format!(
            "Metrics already at version {}, use --force to recalculate",
            config.metrics.version
        ));
        let last_run_id = store.last_run()?.map(|run| run.id);
        print_stored_summary(
            store.as_ref(),
            &config.metrics.version,
            last_run_id,
            verbose,
            top,
        )?;
        return Ok(ExitCode::SUCCESS);
    }

    let summary = match engine.calculate_all_metrics(tag_type) {
        Ok(summary) => summary,
        Err(MetricsError::PassAborted { processed, source }) => {
            print_error(&format!(
                "Metrics pass failed after {} tags: {:#}",
                processed, source
            ));
            return Ok(ExitCode::FAILURE);
        }
        Err(e) => return Err(e.into()),
    };

    print_success(&format!(
        "Processed {} tags in {:.2}s",
        summary.tags_processed,
        summary.elapsed.as_secs_f64()
    ));
    if summary.pruned > 0 {
        print_warning(&format!("Pruned {} records of unused tags", summary.pruned));
    }

    print_stored_summary(
        store.as_ref(),
        &config.metrics.version,
        Some(summary.run_id),
        verbose,
        top,
    )?;

    Ok(ExitCode::SUCCESS)
}

/// Per-type record counts and, when verbose, the top skills and technologies.
fn print_stored_summary(
    store: &dyn TagMetricsStore,
    version: &str,
    run_id: Option<i64>,
    verbose: bool,
    top: usize,
) -> Result<()> {
    print_section_header("Stored metrics");
    print_key_value("Version", version);
    if let Some(run_id) = run_id {
        print_key_value("Run", &run_id.to_string());
    }
    for (tag_type, count) in store.count_metrics_by_type()? {
        print_key_value(tag_type.as_str(), &count.to_string());
    }
    print_section_footer();

    if verbose {
        for (title, tag_type) in [
            ("Top skills", TagType::Skill),
            ("Top technologies", TagType::Technology),
        ] {
            print_section_header(title);
            let metrics =
                store.list_tag_metrics(Some(tag_type), MetricsOrder::RelevanceScore, top)?;
            print_metrics_table(&metrics);
            print_section_footer();
        }
    }
    Ok(())
}

fn show(config: AppConfig, key: TagKey) -> Result<ExitCode> {
    let store = open_store(&config)?;
    let Some(metrics) = store.get_tag_metrics(&key)? else {
        print_error(&format!("No metrics for {}", key));
        return Ok(ExitCode::FAILURE);
    };

    print_section_header(&key.to_string());
    print_key_value_highlight("Relevance", &format!("{:.2}", metrics.relevance_score));
    print_key_value("Proficiency", &format!("{:.2}", metrics.proficiency));
    print_key_value("Experience", &format!("{:.2} years", metrics.experience_years));
    print_key_value("Entities", &metrics.entity_count.to_string());
    print_key_value("Frequency", &format!("{:.4}", metrics.frequency));
    print_key_value("Diversity", &format!("{:.4}", metrics.diversity_score));
    print_key_value("Last used", &format_last_used(&metrics));
    print_trend("Trend", metrics.growth_trend.as_str());
    for (flavor, count) in &metrics.distribution.by_flavor {
        print_key_value(&format!("flavor {}", flavor), &count.to_string());
    }
    for (category, count) in &metrics.distribution.by_category {
        print_key_value(&format!("category {}", category), &count.to_string());
    }
    print_key_value("Calculated", &metrics.calculated_at.to_rfc3339());
    print_key_value("Version", &metrics.metrics_version);
    print_section_footer();

    Ok(ExitCode::SUCCESS)
}

fn list(
    config: AppConfig,
    tag_type: Option<TagType>,
    order_by: MetricsOrder,
    limit: usize,
) -> Result<ExitCode> {
    let store = open_store(&config)?;
    if let Some(run) = store.last_run()? {
        print_key_value(
            "Last pass",
            &format!(
                "#{} {} at {} ({} tags)",
                run.id,
                run.status.as_str(),
                run.started_at.to_rfc3339(),
                run.tags_processed
            ),
        );
    }
    let metrics = store.list_tag_metrics(tag_type, order_by, limit)?;
    print_metrics_table(&metrics);
    Ok(ExitCode::SUCCESS)
}

fn format_last_used(metrics: &TagMetrics) -> String {
    metrics
        .last_used
        .map(|d| d.to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn print_metrics_table(metrics: &[TagMetrics]) {
    if metrics.is_empty() {
        print_empty_list("No metrics stored");
        return;
    }

    let mut table = TableBuilder::new(vec![
        "#",
        "Tag",
        "Type",
        "Relevance",
        "Proficiency",
        "Years",
        "Entities",
        "Last used",
        "Trend",
    ]);
    for (i, m) in metrics.iter().enumerate() {
        table.add_row(vec![
            (i + 1).to_string(),
            m.tag_name.clone(),
            m.tag_type.to_string(),
            format!("{:.2}", m.relevance_score),
            format!("{:.2}", m.proficiency),
            format!("{:.2}", m.experience_years),
            m.entity_count.to_string(),
            format_last_used(m),
            m.growth_trend.to_string(),
        ]);
    }
    table.print();
}
