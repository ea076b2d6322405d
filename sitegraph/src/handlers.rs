use anyhow::Context;
use clap::ArgMatches;
use clap::error::ErrorKind;
use colored::Colorize;
use sitegraph_core::config::{expand_path, parse_auth, parse_base_url};
use sitegraph_core::crawl::{
    CrawlOptions, ScreenshotSettings, capture_screenshots, execute_crawl, generate_sitemap_dot,
};
use sitegraph_core::{ConfigError, RunLog};
use sitegraph_scanner::CrawlConfig;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

pub const EXIT_OK: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
/// Invalid argument combination, reported before any network activity.
pub const EXIT_CONFIG: i32 = 85;

/// Exit code for an argument parsing failure. Missing or conflicting flags
/// are configuration errors; `--help` and `--version` keep clap's code 0.
pub fn parse_error_exit_code(err: &clap::Error) -> i32 {
    match err.kind() {
        ErrorKind::MissingRequiredArgument | ErrorKind::ArgumentConflict => EXIT_CONFIG,
        _ => err.exit_code(),
    }
}

fn string_arg(args: &ArgMatches, id: &str) -> Option<String> {
    args.get_one::<String>(id).cloned()
}

/// Validates the `crawl` arguments and turns them into run options.
pub fn build_crawl_options(args: &ArgMatches) -> Result<CrawlOptions, ConfigError> {
    let auth = parse_auth(
        args.get_one::<String>("auth-url").map(String::as_str),
        args.get_one::<String>("auth-payload").map(String::as_str),
    )?;

    let raw_base = args
        .get_one::<String>("BASE_URL")
        .map(String::as_str)
        .unwrap_or_default();
    let base_url = parse_base_url(raw_base)?;

    let timeout = args.get_one::<u64>("timeout").copied().unwrap_or(10);

    let crawl = CrawlConfig::new(base_url)
        .with_fold_ids(args.get_flag("ignore-id"))
        .with_skip_self(args.get_flag("skip-self"))
        .with_skip_base(args.get_flag("skip-base"))
        .with_skip_base_back(args.get_flag("skip-base-back"))
        .with_skip_auth(string_arg(args, "skip-auth"))
        .with_skip_download(string_arg(args, "skip-download"))
        .with_max_depth(args.get_one::<usize>("max-depth").copied())
        .with_timeout(Duration::from_secs(timeout));

    let screenshots = args.get_flag("get-screenshots").then(|| ScreenshotSettings {
        dir: args
            .get_one::<String>("screenshot-dir")
            .map(|dir| expand_path(dir))
            .unwrap_or_else(|| PathBuf::from("screenshots")),
        skip: string_arg(args, "skip-screenshot"),
    });

    let log_file = args
        .get_one::<String>("log-file")
        .map(|path| expand_path(path))
        .unwrap_or_else(|| PathBuf::from("sitegraph.log"));

    Ok(CrawlOptions {
        crawl,
        auth,
        screenshots,
        log_file,
        show_progress_bars: !args.get_flag("quiet"),
    })
}

/// Crawls, optionally screenshots, and returns the DOT text.
pub async fn run_crawl(options: &CrawlOptions) -> anyhow::Result<String> {
    let mut session = execute_crawl(options)
        .await
        .with_context(|| format!("Crawl of {} failed", options.crawl.base_url))?;

    if let Some(ref settings) = options.screenshots {
        capture_screenshots(
            &mut session.output.graph,
            settings,
            &session.cookies,
            options.show_progress_bars,
        )
        .await;
    }

    info!("Final sitemap: {}", session.output.graph);
    Ok(generate_sitemap_dot(
        &session.output.graph,
        options.screenshots.is_some(),
    ))
}

/// Entry point of the `crawl` subcommand. Returns the process exit code.
pub async fn handle_crawl(args: &ArgMatches) -> i32 {
    let options = match build_crawl_options(args) {
        Ok(options) => options,
        Err(e) => {
            eprintln!("{} {}", "error:".red().bold(), e);
            return EXIT_CONFIG;
        }
    };

    let _log = RunLog::open(&options.log_file);
    info!("Starting crawl of {}", options.crawl.base_url);

    match run_crawl(&options).await {
        Ok(dot) => {
            print!("{}", dot);
            EXIT_OK
        }
        Err(e) => {
            tracing::error!("{:#}", e);
            eprintln!("{} {:#}", "error:".red().bold(), e);
            EXIT_FAILURE
        }
    }
}
