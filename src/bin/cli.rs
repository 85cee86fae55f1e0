//! StoryTime CLI
//!
//! One-shot commands against the hosted story endpoints:
//! - List, show, save, and delete stories
//! - Ask for writing suggestions or an illustration
//! - List a story's characters
//! - Generate a config file

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;

use storytime::markup::{count_words, is_blank, paragraph, strip_markup};
use storytime::remote::{HttpRemote, RemoteService};
use storytime::story::{
    character_display_name, filter_character_entries, filter_story_entries, story_filename,
    STORY_EXTENSION,
};
use storytime::{Config, Language};

#[derive(Parser)]
#[command(name = "storytime-cli")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Manage StoryTime stories from the command line")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: search the standard locations)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format (table, json)
    #[arg(short, long, default_value = "table", global = true)]
    pub format: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List saved stories
    List,

    /// Print a story as plain text
    Show {
        /// Story name or filename
        story: String,
    },

    /// Save a story from a file or stdin
    Save {
        /// Story name
        #[arg(short, long)]
        name: String,
        /// Plain text file, one paragraph per line (default: stdin)
        #[arg(short = 'F', long)]
        file: Option<PathBuf>,
    },

    /// Delete a story
    Delete {
        /// Story name or filename
        story: String,
        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// Ask for writing suggestions
    Suggest {
        /// Text to get ideas for
        text: Option<String>,
        /// Read the text from a file
        #[arg(short = 'F', long)]
        file: Option<PathBuf>,
        /// Language of the suggestions
        #[arg(short, long, default_value = "English")]
        language: String,
    },

    /// Generate an illustration
    Image {
        /// Text to illustrate
        text: Option<String>,
        /// Read the text from a file
        #[arg(short = 'F', long)]
        file: Option<PathBuf>,
    },

    /// List the characters of a story
    Characters {
        /// Story name or filename
        story: String,
    },

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_with_env(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => Config::load_default(),
    };
    storytime::logging::init(&config.logging).context("initialising logging")?;

    if let Commands::Config { output } = &cli.command {
        let template = storytime::config::generate_default_config();
        match output {
            Some(path) => {
                // Create parent directory if needed
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::write(path, &template)?;
                println!("Config written to {:?}", path);
            }
            None => print!("{}", template),
        }
        return Ok(());
    }

    let remote = HttpRemote::new(config.endpoints.clone(), &config.http)
        .context("building HTTP client")?;

    match cli.command {
        Commands::List => {
            let stories = filter_story_entries(remote.list().await?);
            if cli.format == "json" {
                println!("{}", serde_json::to_string_pretty(&stories)?);
            } else if stories.is_empty() {
                println!("No stories saved yet.");
            } else {
                println!("{:<40} {:>8} {}", "Story", "Size", "Modified");
                println!("{}", "-".repeat(70));
                for entry in stories {
                    let size = entry.size.map(|s| s.to_string()).unwrap_or_default();
                    let modified = entry
                        .last_modified
                        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                        .unwrap_or_default();
                    println!("{:<40} {:>8} {}", entry.filename, size, modified);
                }
            }
        }

        Commands::Show { story } => {
            let filename = resolve_story(&story);
            let content = remote.load(&filename).await?;
            if cli.format == "json" {
                let body = serde_json::json!({
                    "filename": filename,
                    "words": count_words(&content),
                    "content": content,
                });
                println!("{}", serde_json::to_string_pretty(&body)?);
            } else {
                println!("--- {} ({} words) ---", filename, count_words(&content));
                println!("{}", strip_markup(&content.replace("</p>", "</p>\n")).trim_end());
            }
        }

        Commands::Save { name, file } => {
            let text = read_text(None, file.as_ref())?;
            let markup: String = text.lines().map(paragraph).collect();
            if is_blank(&markup) {
                bail!("Nothing to save!");
            }
            let filename = remote.save(&name, &markup).await?;
            println!("Saved as {}", filename);
        }

        Commands::Delete { story, yes } => {
            let filename = resolve_story(&story);
            if !yes && !confirm(&format!(
                "Are you sure you want to delete \"{}\"?",
                filename.trim_end_matches(STORY_EXTENSION)
            ))? {
                println!("Cancelled");
                return Ok(());
            }
            remote.delete(&filename).await?;
            println!("Story deleted successfully");
        }

        Commands::Suggest {
            text,
            file,
            language,
        } => {
            let language: Language = language.parse().map_err(anyhow::Error::msg)?;
            let text = read_text(text, file.as_ref())?;
            if text.trim().is_empty() {
                bail!("Write some text first to get suggestions!");
            }
            match remote.suggestions(&text, language).await? {
                Some(suggestions) => println!("{}", suggestions),
                None => println!("No suggestions available"),
            }
        }

        Commands::Image { text, file } => {
            let text = read_text(text, file.as_ref())?;
            if text.trim().is_empty() {
                bail!("Write some text first to generate an image!");
            }
            match remote.generate_image(&text).await? {
                Some(url) => println!("{}", url),
                None => bail!("Failed to generate image"),
            }
        }

        Commands::Characters { story } => {
            let filename = resolve_story(&story);
            let characters = filter_character_entries(remote.list().await?, &filename);
            if cli.format == "json" {
                println!("{}", serde_json::to_string_pretty(&characters)?);
            } else if characters.is_empty() {
                println!("No characters for {}", filename);
            } else {
                for entry in &characters {
                    println!(
                        "{:<24} {}",
                        character_display_name(&filename, &entry.filename),
                        entry.filename
                    );
                }
            }
        }

        Commands::Config { .. } => unreachable!("handled above"),
    }

    Ok(())
}

/// Accept either a story name or its filename
fn resolve_story(story: &str) -> String {
    if story.ends_with(STORY_EXTENSION) {
        story.to_string()
    } else {
        story_filename(story)
    }
}

/// Text from the argument, the file, or stdin, in that order
fn read_text(text: Option<String>, file: Option<&PathBuf>) -> anyhow::Result<String> {
    if let Some(text) = text {
        return Ok(text);
    }
    match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display())),
        None => std::io::read_to_string(std::io::stdin()).context("reading stdin"),
    }
}

fn confirm(question: &str) -> anyhow::Result<bool> {
    print!("{} [y/N] ", question);
    std::io::stdout().flush()?;
    let mut answer = String::new();
    std::io::stdin().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_story() {
        assert_eq!(resolve_story("My Tale"), "My_Tale.txt");
        assert_eq!(resolve_story("done.txt"), "done.txt");
    }

    #[test]
    fn test_cli_parses_subcommands() {
        let cli = Cli::parse_from(["storytime-cli", "delete", "tale", "--yes"]);
        assert!(matches!(cli.command, Commands::Delete { yes: true, .. }));

        let cli = Cli::parse_from(["storytime-cli", "suggest", "-l", "French", "a storm"]);
        match cli.command {
            Commands::Suggest { text, language, .. } => {
                assert_eq!(text.as_deref(), Some("a storm"));
                assert_eq!(language, "French");
            }
            _ => panic!("expected suggest"),
        }
    }
}
