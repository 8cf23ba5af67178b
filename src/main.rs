mod cli;

use clap::Parser;
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use clawguard::config::Config;
use clawguard::output::{format_report, OutputFormat};
use clawguard::pipeline::{CancelToken, Pipeline};
use clawguard::rules::RuleLibrary;

use cli::{Cli, Commands};

/// Exit code for parse errors, rule-load errors, and internal failures.
const EXIT_ERROR: i32 = 4;

fn main() {
    // Logs go to stderr so stdout stays clean for --json / --quiet.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Scan {
            path,
            no_llm,
            json,
            output,
            quiet,
            config,
        } => {
            let mut config = Config::load(config.as_deref()).unwrap_or_else(|e| {
                eprintln!("Error: {e}");
                std::process::exit(EXIT_ERROR);
            });
            if no_llm {
                config.analyzers.semantic = false;
            }

            let pipeline = Pipeline::new(&config).unwrap_or_else(|e| {
                eprintln!("Error: {e}");
                std::process::exit(EXIT_ERROR);
            });

            let report = pipeline
                .scan(&path, &CancelToken::new())
                .unwrap_or_else(|e| {
                    eprintln!("Error: {e}");
                    std::process::exit(EXIT_ERROR);
                });

            let format = if json {
                OutputFormat::Json
            } else if quiet {
                OutputFormat::Quiet
            } else {
                OutputFormat::Pretty
            };
            let rendered = format_report(&report, format);

            match output {
                Some(out_path) => {
                    std::fs::write(&out_path, &rendered).unwrap_or_else(|e| {
                        eprintln!("Error writing output: {e}");
                        std::process::exit(EXIT_ERROR);
                    });
                    eprintln!("Report written to {}", out_path.display());
                }
                None => print!("{rendered}"),
            }

            std::process::exit(report.score.recommendation.exit_code());
        }

        Commands::ListRules { config } => {
            let config = Config::load(config.as_deref()).unwrap_or_else(|e| {
                eprintln!("Error: {e}");
                std::process::exit(EXIT_ERROR);
            });
            let library = RuleLibrary::load(config.rules_dir.as_deref()).unwrap_or_else(|e| {
                eprintln!("Error: {e}");
                std::process::exit(EXIT_ERROR);
            });

            println!("{}", "Loaded Rules".bold().underline());
            println!();
            println!("  {}", "regex dialect".bold());
            for rule in library.regex_rules() {
                println!(
                    "    [{sev:>8}] {id:<28} {desc} ({cat})",
                    sev = rule.severity,
                    id = rule.id,
                    desc = rule.description,
                    cat = rule.category,
                );
            }
            println!();
            println!("  {}", "pattern dialect".bold());
            for rule in library.pattern_rules() {
                println!(
                    "    [{sev:>8}] {id:<28} {desc} ({cat})",
                    sev = rule.severity,
                    id = rule.id,
                    desc = rule.description,
                    cat = rule.category,
                );
            }
            println!();
            println!("  Total: {} rules", library.len());
        }
    }
}
