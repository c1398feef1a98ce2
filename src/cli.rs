// src/cli.rs
// =============================================================================
// This file defines our command-line interface using the `clap` crate.
//
// Two subcommands:
// - crawl: audit one site in-process and print what was found
// - serve: run the HTTP API so crawls can be started and watched remotely
//
// Every flag is optional and only overrides the matching setting from the
// environment (see config.rs).
//
// Rust concepts:
// - Structs: Custom data types that group related data
// - Enums: Types that can be one of several variants
// - Derive macros: Automatically generate code for our types
// =============================================================================

use clap::{Parser, Subcommand};

// This struct represents our entire CLI application
//
// #[derive(Parser)] tells clap to automatically generate parsing code
// The #[command(...)] attributes configure how the CLI behaves
#[derive(Parser, Debug)]
#[command(
    name = "site-auditor",
    version,
    about = "Crawls a website and reports broken links, script errors and other page defects",
    long_about = "site-auditor crawls a website breadth-first from a start URL, staying on the same host, \
                  and reports broken links, JavaScript errors, missing images, console errors, dead buttons, \
                  slow pages, images without alt text and forms that cannot submit."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Crawl a website and print the findings
    ///
    /// Example: site-auditor crawl https://example.com --max-pages 20 --max-depth 2
    Crawl {
        /// Start URL (http or https)
        url: String,

        /// Stop after this many pages (default: 50)
        #[arg(long)]
        max_pages: Option<usize>,

        /// How many link hops to follow from the start URL (default: 3)
        ///
        /// Depth 0 = just the start page
        /// Depth 1 = start page + the pages it links to
        #[arg(long)]
        max_depth: Option<usize>,

        /// Output results in JSON format instead of a table
        #[arg(long)]
        json: bool,

        /// Skip probing discovered links for reachability
        #[arg(long)]
        no_link_check: bool,
    },

    /// Start the HTTP API
    ///
    /// Example: site-auditor serve --bind 127.0.0.1:8080
    Serve {
        /// Address to listen on (default: 0.0.0.0:3000)
        #[arg(long)]
        bind: Option<String>,
    },
}

// -----------------------------------------------------------------------------
// BEGINNER NOTES:
//
// 1. Why Option<usize> instead of default_value_t?
//    - None means "the user did not pass the flag"
//    - That lets the environment (or the built-in default) decide instead
//
// 2. How does clap name the flags?
//    - Field max_pages becomes --max-pages (snake_case -> kebab-case)
//    - A bool field becomes a switch: present = true, absent = false
// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crawl_flags() {
        let cli = Cli::try_parse_from([
            "site-auditor",
            "crawl",
            "https://example.test/",
            "--max-pages",
            "5",
            "--json",
            "--no-link-check",
        ])
        .unwrap();

        match cli.command {
            Commands::Crawl {
                url,
                max_pages,
                max_depth,
                json,
                no_link_check,
            } => {
                assert_eq!(url, "https://example.test/");
                assert_eq!(max_pages, Some(5));
                assert_eq!(max_depth, None);
                assert!(json);
                assert!(no_link_check);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_serve_bind() {
        let cli = Cli::try_parse_from(["site-auditor", "serve", "--bind", "127.0.0.1:8080"]).unwrap();
        assert!(matches!(cli.command, Commands::Serve { bind: Some(b) } if b == "127.0.0.1:8080"));
    }

    #[test]
    fn test_crawl_requires_url() {
        assert!(Cli::try_parse_from(["site-auditor", "crawl"]).is_err());
    }
}
