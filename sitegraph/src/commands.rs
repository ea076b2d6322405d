use crate::CLAP_STYLING;
use clap::{arg, command};
use sitegraph_core::logging::DEFAULT_LOG_FILE;
use sitegraph_core::screenshot::DEFAULT_SCREENSHOT_DIR;

pub fn command_argument_builder() -> clap::Command {
    clap::Command::new("sitegraph")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("sitegraph")
        .about("Crawl a website and print its link graph as Graphviz DOT")
        .styles(CLAP_STYLING)
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            command!("crawl")
                .about(
                    "Crawl every same-origin page reachable from BASE_URL and write the sitemap \
                graph to stdout.",
                )
                .arg(
                    arg!(<BASE_URL>)
                        .required(true)
                        .help("Root of the site, e.g. http://localhost:8080/"),
                )
                .arg(
                    arg!(--"auth-url" <URL>)
                        .required(false)
                        .help("Login endpoint that receives a form POST before crawling"),
                )
                .arg(
                    arg!(--"auth-payload" <JSON>)
                        .required(false)
                        .help(
                            "Form fields for the login POST as a JSON object, e.g. \
                        '{\"username\": \"foo\", \"password\": \"bar\"}'",
                        ),
                )
                .arg(
                    arg!(--"ignore-id")
                        .required(false)
                        .help("Fold numeric path segments so /item/1 and /item/2 are one node"),
                )
                .arg(
                    arg!(--"skip-self")
                        .required(false)
                        .help("Don't draw edges from a page to itself"),
                )
                .arg(
                    arg!(--"skip-base")
                        .required(false)
                        .help("Remove the base URL node from the graph"),
                )
                .arg(
                    arg!(--"skip-base-back")
                        .required(false)
                        .help("Don't draw edges pointing back to the base URL"),
                )
                .arg(
                    arg!(--"skip-auth" <SUBSTR>)
                        .required(false)
                        .help("Never follow or draw URLs containing this text, e.g. 'logout'"),
                )
                .arg(
                    arg!(--"skip-download" <SUBSTR>)
                        .required(false)
                        .help("Never fetch URLs containing this text, e.g. '/download/'"),
                )
                .arg(
                    arg!(--"get-screenshots")
                        .required(false)
                        .help("Render every page with headless Chromium and use it as node image"),
                )
                .arg(
                    arg!(--"skip-screenshot" <SUBSTR>)
                        .required(false)
                        .help("Don't screenshot URLs containing this text")
                        .requires("get-screenshots"),
                )
                .arg(
                    arg!(--"screenshot-dir" <PATH>)
                        .required(false)
                        .help("Where screenshots are written")
                        .default_value(DEFAULT_SCREENSHOT_DIR),
                )
                .arg(
                    arg!(--"max-depth" <DEPTH>)
                        .required(false)
                        .help("Don't follow links found deeper than this many hops from the base")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    arg!(--"timeout" <SECONDS>)
                        .required(false)
                        .help("Per request timeout")
                        .value_parser(clap::value_parser!(u64).range(1..))
                        .default_value("10"),
                )
                .arg(
                    arg!(--"log-file" <PATH>)
                        .required(false)
                        .help("File the crawl log is appended to")
                        .default_value(DEFAULT_LOG_FILE),
                )
                .arg(
                    arg!(-q --"quiet")
                        .required(false)
                        .help("Hide the progress spinner"),
                ),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_is_well_formed() {
        command_argument_builder().debug_assert();
    }

    #[test]
    fn test_crawl_defaults() {
        let matches = command_argument_builder()
            .try_get_matches_from(["sitegraph", "crawl", "http://localhost:8080/"])
            .unwrap();
        let (name, crawl) = matches.subcommand().unwrap();

        assert_eq!(name, "crawl");
        assert_eq!(
            crawl.get_one::<String>("BASE_URL").map(String::as_str),
            Some("http://localhost:8080/")
        );
        assert_eq!(crawl.get_one::<u64>("timeout"), Some(&10));
        assert_eq!(
            crawl.get_one::<String>("screenshot-dir").map(String::as_str),
            Some("screenshots")
        );
        assert!(!crawl.get_flag("ignore-id"));
        assert!(crawl.get_one::<usize>("max-depth").is_none());
    }

    #[test]
    fn test_skip_screenshot_requires_screenshots() {
        let result = command_argument_builder().try_get_matches_from([
            "sitegraph",
            "crawl",
            "http://localhost/",
            "--skip-screenshot",
            "logout",
        ]);
        assert!(result.is_err());
    }
}
