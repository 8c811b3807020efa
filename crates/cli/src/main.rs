use anyhow::{Context, Result, bail};
use archive_core::config::{Config, ProjectPaths, files_with_extension};
use archive_core::extract::{extract_meeting, extract_topics};
use archive_core::segment::find_topic_markers;
use archive_core::structured::write_record;
use archive_core::wxr::{Post, read_post_file, read_posts, write_item};
use clap::{Parser, Subcommand};
use enrich::batch::{BatchReport, IMAGE_REPORT, MATERIAL_REPORT, run_batch, write_report};
use enrich::images::{has_photo_ids, process_images_file};
use enrich::materials::{file_has_downloadable_materials, process_materials_file};
use enrich::record::EnrichSettings;
use enrich::verify::verify_record;
use enrich::HttpFetcher;
use schemars::schema_for;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Once;
use std::time::Duration;
use time::OffsetDateTime;
use time::macros::format_description;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "wpmigrate")]
#[command(about = "WordPress meeting archive migration toolkit", long_about = None)]
struct Cli {
    /// Project root; configured paths resolve against it
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    /// Config file (default: <root>/wpmigrate.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging (WPMIGRATE_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write each archive post of the export to its own XML file
    Split,
    /// List archive posts with topic counts
    Explore,
    /// Build structured JSON and XML records from individual post files
    Extract { file: Option<PathBuf> },
    /// Render structured JSON records to Markdown pages
    Render { file: Option<PathBuf> },
    /// Download speaker photos from the live pages
    Images { file: Option<PathBuf> },
    /// Download slides and documents
    Materials { file: Option<PathBuf> },
    /// Check frontmatter of the generated Markdown pages
    Validate,
    /// Compare a structured record against its live page
    Verify { file: PathBuf },
    /// Export canonical JSON Schemas to the ./schemas directory
    Schema {
        #[command(subcommand)]
        command: SchemaCommands,
    },
}

#[derive(Subcommand)]
enum SchemaCommands {
    /// Export JSON Schema files for canonical types
    Export {
        /// Output directory (default: ./schemas)
        #[arg(long, default_value = "schemas")]
        out_dir: PathBuf,
    },
}

static INIT: Once = Once::new();

fn init_tracing(verbose: bool) {
    INIT.call_once(|| {
        let default = if verbose { "debug" } else { "info" };
        let filter = EnvFilter::try_from_env("WPMIGRATE_LOG").unwrap_or_else(|_| EnvFilter::new(default));
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    });
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let project = || Project::load(&cli.root, cli.config.as_deref());

    match cli.command {
        Commands::Schema {
            command: SchemaCommands::Export { out_dir },
        } => schema_export(&out_dir),
        Commands::Split => split(&project()?.paths),
        Commands::Explore => explore(&project()?.paths),
        Commands::Extract { file } => extract(&project()?.paths, file.as_deref()),
        Commands::Render { file } => render(&project()?.paths, file.as_deref()),
        Commands::Images { file } => images(&project()?, file.as_deref()),
        Commands::Materials { file } => materials(&project()?, file.as_deref()),
        Commands::Validate => validate(&project()?.paths),
        Commands::Verify { file } => verify(&project()?, &file),
    }
}

/// Loaded configuration and the directories it resolves to.
struct Project {
    config: Config,
    paths: ProjectPaths,
}

impl Project {
    fn load(root: &Path, config_file: Option<&Path>) -> Result<Self> {
        let config = Config::load(root, config_file)?;
        let paths = ProjectPaths::new(root, &config.paths);
        Ok(Self { config, paths })
    }
}

fn load_export(paths: &ProjectPaths) -> Result<Vec<Post>> {
    let xml = fs::read_to_string(&paths.export_file)
        .with_context(|| format!("failed to read export {}", paths.export_file.display()))?;
    let posts = read_posts(&xml).with_context(|| format!("failed to parse {}", paths.export_file.display()))?;
    Ok(posts)
}

fn split(paths: &ProjectPaths) -> Result<()> {
    let posts = load_export(paths)?;
    paths.ensure()?;

    let mut written = 0;
    let mut failed = 0;
    let archives: Vec<&Post> = posts.iter().filter(|post| post.is_archive()).collect();
    for post in &archives {
        let target = paths.individual_posts_dir.join(format!("{}.xml", post.file_stem()));
        let result = write_item(post)
            .map_err(anyhow::Error::from)
            .and_then(|xml| fs::write(&target, xml).map_err(anyhow::Error::from));
        match result {
            Ok(()) => {
                tracing::debug!("wrote {}", target.display());
                written += 1;
            }
            Err(err) => {
                tracing::error!("failed to write {}: {err:#}", target.display());
                failed += 1;
            }
        }
    }

    println!("Items in export: {}", posts.len());
    println!("Archive posts: {}", archives.len());
    println!("Written: {written}  Failed: {failed}");
    println!("Output: {}", paths.individual_posts_dir.display());
    Ok(())
}

#[derive(Serialize)]
struct ExploredPost {
    post_id: String,
    title: String,
    post_date: String,
    topic_markers: usize,
    first_topic: Option<String>,
    content_chars: usize,
}

fn explore(paths: &ProjectPaths) -> Result<()> {
    let posts = load_export(paths)?;
    let explored: Vec<ExploredPost> = posts
        .iter()
        .filter(|post| post.is_archive())
        .map(|post| ExploredPost {
            post_id: post.post_id.clone(),
            title: post.title.clone(),
            post_date: post.post_date.clone(),
            topic_markers: find_topic_markers(&post.content).len(),
            first_topic: extract_topics(&post.content)
                .into_iter()
                .map(|topic| topic.presentation.title)
                .find(|title| !title.is_empty()),
            content_chars: post.content.chars().count(),
        })
        .collect();

    for post in &explored {
        println!(
            "{:>6}  {}  topics={}  chars={}  {}",
            post.post_id,
            post.post_date,
            post.topic_markers,
            post.content_chars,
            post.title
        );
        if let Some(first) = &post.first_topic {
            println!("        first topic: {first}");
        }
    }

    let with_topics = explored.iter().filter(|post| post.topic_markers > 0).count();
    let total_topics: usize = explored.iter().map(|post| post.topic_markers).sum();
    println!();
    println!("Items in export: {}", posts.len());
    println!("Archive posts: {}", explored.len());
    println!("With TOPIC markers: {with_topics}");
    println!("Total topics: {total_topics}");

    paths.ensure()?;
    let out = paths.reports_dir.join("archive-posts.json");
    fs::write(&out, serde_json::to_string_pretty(&explored)?)?;
    println!("Wrote {}", out.display());
    Ok(())
}

fn extract_file(paths: &ProjectPaths, path: &Path) -> Result<usize> {
    let posts = read_post_file(path).with_context(|| format!("failed to parse {}", path.display()))?;
    if posts.is_empty() {
        bail!("{} contains no <item>", path.display());
    }
    for post in &posts {
        let meeting = extract_meeting(post)?;
        let json_path = paths.structured_json_dir.join(format!("{}.json", post.file_stem()));
        let xml_path = paths.xml_for_json(&json_path);
        write_record(&meeting, &json_path, xml_path.as_deref())?;
        tracing::info!(
            "{}: {} topics, {} speakers, {} materials",
            json_path.display(),
            meeting.topics.len(),
            meeting.speaker_count(),
            meeting.material_count()
        );
    }
    Ok(posts.len())
}

fn extract(paths: &ProjectPaths, file: Option<&Path>) -> Result<()> {
    paths.ensure()?;

    if let Some(file) = file {
        let count = extract_file(paths, file)?;
        println!("Extracted {count} record(s) from {}", file.display());
        return Ok(());
    }

    let files = files_with_extension(&paths.individual_posts_dir, "xml")?;
    let mut records = 0;
    let mut failed = 0;
    for path in &files {
        match extract_file(paths, path) {
            Ok(count) => records += count,
            Err(err) => {
                tracing::error!("{}: {err:#}", path.display());
                failed += 1;
            }
        }
    }
    println!("Post files: {}", files.len());
    println!("Records written: {records}  Failed files: {failed}");
    println!("JSON: {}", paths.structured_json_dir.display());
    println!("XML: {}", paths.structured_xml_dir.display());
    Ok(())
}

fn render(paths: &ProjectPaths, file: Option<&Path>) -> Result<()> {
    let files = match file {
        Some(file) => vec![file.to_path_buf()],
        None => files_with_extension(&paths.structured_json_dir, "json")?,
    };
    let summary = site::render_records(&files, &paths.content_dir)?;
    println!("Rendered: {}  Failed: {}", summary.written.len(), summary.failed);
    println!("Output: {}", paths.content_dir.display());
    Ok(())
}

fn print_batch(report: &BatchReport, report_path: &Path) {
    println!("Files: {}  Processed: {}", report.total_files, report.processed_files);
    println!("Downloaded: {}  Failed: {}", report.total_downloaded, report.total_failed);
    for file in report.files.iter().filter(|file| file.error.is_some()) {
        println!("  {}: {}", file.filename, file.error.as_deref().unwrap_or_default());
    }
    println!("Report: {}", report_path.display());
}

fn images(project: &Project, file: Option<&Path>) -> Result<()> {
    let Project { config, paths } = project;
    let settings = EnrichSettings::new(paths, config);
    let fetcher = HttpFetcher::new(&config.fetch)?;

    if let Some(file) = file {
        let counts = process_images_file(file, paths.xml_for_json(file).as_deref(), &fetcher, &settings)?;
        println!("Downloaded: {}  Failed: {}", counts.downloaded, counts.failed);
        return Ok(());
    }

    let files: Vec<PathBuf> = files_with_extension(&paths.structured_json_dir, "json")?
        .into_iter()
        .filter(|path| has_photo_ids(path))
        .collect();
    let report = run_batch(&files, Duration::from_millis(config.fetch.delay_ms), |path| {
        process_images_file(path, paths.xml_for_json(path).as_deref(), &fetcher, &settings)
    });
    let report_path = paths.reports_dir.join(IMAGE_REPORT);
    write_report(&report, &report_path)?;
    print_batch(&report, &report_path);
    Ok(())
}

fn materials(project: &Project, file: Option<&Path>) -> Result<()> {
    let Project { config, paths } = project;
    let settings = EnrichSettings::new(paths, config);
    let fetcher = HttpFetcher::new(&config.fetch)?;

    if let Some(file) = file {
        let counts = process_materials_file(file, paths.xml_for_json(file).as_deref(), &fetcher, &settings)?;
        println!("Downloaded: {}  Failed: {}", counts.downloaded, counts.failed);
        return Ok(());
    }

    let files: Vec<PathBuf> = files_with_extension(&paths.structured_json_dir, "json")?
        .into_iter()
        .filter(|path| file_has_downloadable_materials(path))
        .collect();
    let report = run_batch(&files, Duration::from_millis(config.fetch.delay_ms), |path| {
        process_materials_file(path, paths.xml_for_json(path).as_deref(), &fetcher, &settings)
    });
    let report_path = paths.reports_dir.join(MATERIAL_REPORT);
    write_report(&report, &report_path)?;
    print_batch(&report, &report_path);
    Ok(())
}

fn validate(paths: &ProjectPaths) -> Result<()> {
    let report = site::validate_dir(&paths.content_dir)?;
    let total = report.total_files;

    println!("Markdown files: {total}");
    println!("With frontmatter: {}/{total} ({}%)", report.has_frontmatter, report.percent(report.has_frontmatter));
    println!("With title: {}/{total} ({}%)", report.has_title, report.percent(report.has_title));
    println!("With date: {}/{total} ({}%)", report.has_date, report.percent(report.has_date));
    println!(
        "With description: {}/{total} ({}%)",
        report.has_description,
        report.percent(report.has_description)
    );
    println!(
        "With speakers: {}/{total} (avg {:.1})",
        report.has_speakers,
        report.avg_speakers()
    );
    println!("With topics: {}/{total} (avg {:.1})", report.has_topics, report.avg_topics());
    println!(
        "With materials: {}/{total} (avg {:.1})",
        report.has_materials,
        report.avg_materials()
    );
    println!(
        "Totals: {} speakers, {} topics, {} materials",
        report.total_speakers, report.total_topics, report.total_materials
    );

    if !report.issues.is_empty() {
        println!();
        println!("Issues ({}):", report.issues.len());
        for issue in report.issues.iter().take(10) {
            println!("  {issue}");
        }
        if report.issues.len() > 10 {
            println!("  ... and {} more", report.issues.len() - 10);
        }
    }
    Ok(())
}

fn verify(project: &Project, file: &Path) -> Result<()> {
    let Project { config, paths } = project;
    let fetcher = HttpFetcher::new(&config.fetch)?;
    let report = verify_record(file, &fetcher, &config.fetch)?;

    for topic in &report.topics {
        println!(
            "Topic {}: speakers {}  title {:.2}  materials {}/{}",
            topic.topic_id,
            if topic.speakers_found { "ok" } else { "missing" },
            topic.title_similarity,
            topic.materials_found,
            topic.materials_expected
        );
    }
    println!(
        "Topics: record {} / page {}{}",
        report.expected_topics,
        report.page_topics,
        if report.topic_count_match { "" } else { " (mismatch)" }
    );
    println!("Accuracy: {:.1}%", report.accuracy);
    for warning in &report.warnings {
        println!("  warning: {warning}");
    }

    let stamp = OffsetDateTime::now_utc()
        .format(format_description!("[year][month][day]-[hour][minute][second]"))
        .unwrap_or_default();
    let stem = file
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "record".to_string());
    fs::create_dir_all(&paths.reports_dir)?;
    let out = paths.reports_dir.join(format!("verification-{stem}-{stamp}.json"));
    fs::write(&out, serde_json::to_string_pretty(&report)?)?;
    println!("Report: {}", out.display());
    Ok(())
}

fn schema_export(out_dir: &Path) -> Result<()> {
    fs::create_dir_all(out_dir)?;

    // Export Meeting schema
    let meeting_schema = schema_for!(archive_core::schema::Meeting);
    fs::write(out_dir.join("Meeting.schema.json"), serde_json::to_string_pretty(&meeting_schema)?)?;

    // Export Topic schema
    let topic_schema = schema_for!(archive_core::schema::Topic);
    fs::write(out_dir.join("Topic.schema.json"), serde_json::to_string_pretty(&topic_schema)?)?;

    // Export Speaker schema
    let speaker_schema = schema_for!(archive_core::schema::Speaker);
    fs::write(out_dir.join("Speaker.schema.json"), serde_json::to_string_pretty(&speaker_schema)?)?;

    // Export Material schema
    let material_schema = schema_for!(archive_core::schema::Material);
    fs::write(out_dir.join("Material.schema.json"), serde_json::to_string_pretty(&material_schema)?)?;

    println!("Exported schemas to {}", out_dir.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_export_runs_without_project_config() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("schemas");
        let cli = Cli::try_parse_from([
            "wpmigrate",
            "--config",
            "missing.toml",
            "schema",
            "export",
            "--out-dir",
            out.to_str().unwrap(),
        ])
        .unwrap();
        let Commands::Schema {
            command: SchemaCommands::Export { out_dir },
        } = cli.command
        else {
            panic!("expected schema export");
        };
        schema_export(&out_dir).unwrap();
        for name in ["Meeting", "Topic", "Speaker", "Material"] {
            assert!(out.join(format!("{name}.schema.json")).exists());
        }
    }

    #[test]
    fn project_resolves_paths_and_reports_bad_config() {
        let dir = tempfile::tempdir().unwrap();
        let project = Project::load(dir.path(), None).unwrap();
        assert_eq!(project.paths.export_file, dir.path().join("migration/export.xml"));
        assert_eq!(project.config.fetch.timeout_secs, 15);
        assert!(Project::load(dir.path(), Some(dir.path().join("missing.toml").as_path())).is_err());
    }
}
