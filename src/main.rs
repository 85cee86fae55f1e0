//! StoryTime interactive shell
//!
//! Walks through the whole flow in a terminal: boot, landing page, about
//! page, and the story editor with its canvas and character sheets.
//!
//! Run with: cargo run --bin storytime -- [--offline] [--config <path>]

use anyhow::Context;
use clap::Parser;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::broadcast::{self, error::TryRecvError};

use storytime::markup::{paragraph, strip_markup};
use storytime::remote::{HttpRemote, MemoryRemote, RemoteService};
use storytime::session::{Ambient, TECH_STACK};
use storytime::story::{story_filename, STORY_EXTENSION};
use storytime::{AppEvent, Config, Language, Operation, StoryApp, View};

#[derive(Parser)]
#[command(name = "storytime")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Write short stories with AI-assisted ideas and illustrations")]
struct Args {
    /// Config file (default: search the standard locations)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Keep everything in memory instead of using the hosted store
    #[arg(long)]
    offline: bool,
}

enum Flow {
    Continue,
    Quit,
}

type Input = Lines<BufReader<Stdin>>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::load_with_env(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => Config::load_default(),
    };
    storytime::logging::init(&config.logging).context("initialising logging")?;

    tracing::info!("StoryTime v{}", env!("CARGO_PKG_VERSION"));

    let remote: Arc<dyn RemoteService> = if args.offline {
        tracing::info!("Offline mode: stories are kept in memory");
        Arc::new(MemoryRemote::new())
    } else {
        Arc::new(
            HttpRemote::new(config.endpoints.clone(), &config.http)
                .context("building HTTP client")?,
        )
    };

    let mut app = StoryApp::new(config, remote);
    let mut events = app.subscribe();
    let mut input: Input = BufReader::new(tokio::io::stdin()).lines();

    app.launch();
    let mut shown = app.view();
    show_view(&app);

    loop {
        let typed = tokio::select! {
            line = input.next_line() => {
                let Some(line) = line? else { break };
                let flow = handle_line(&mut app, &mut input, line.trim()).await?;
                if let Flow::Quit = flow {
                    break;
                }
                true
            }
            applied = app.next_completion() => {
                if !applied {
                    break;
                }
                false
            }
        };

        drain_events(&app, &mut events);
        if app.view() != shown {
            shown = app.view();
            show_view(&app);
        } else if typed {
            prompt(&app);
        }
    }

    tracing::info!("Goodbye");
    Ok(())
}

fn prompt(app: &StoryApp) {
    print!("{}> ", app.view());
    let _ = std::io::stdout().flush();
}

fn show_view(app: &StoryApp) {
    match app.view() {
        View::Booting => println!("Loading StoryTime..."),
        View::Landing => {
            println!();
            println!("  StoryTime: where stories come alive");
            println!();
            println!("  start   Start writing");
            println!("  about   About StoryTime");
            println!("  theme   Toggle light/dark theme");
            println!("  quit    Leave");
            prompt(app);
        }
        View::About => {
            println!();
            println!("  StoryTime helps you write short stories with AI-generated ideas");
            println!("  and illustrations, a story map canvas, and character sheets.");
            println!("  Built with: {}", TECH_STACK.join(", "));
            println!("  (type 'tech' to see what is spinning, 'back' to return)");
            prompt(app);
        }
        View::Starting => println!("Preparing your writing space..."),
        View::Editor => {
            println!();
            println!("Editor ready. Type 'help' for commands.");
            prompt(app);
        }
    }
}

fn print_editor_help() {
    println!("Story:");
    println!("  name <text>            set the story name");
    println!("  write <text>           append a paragraph");
    println!("  show                   print the story");
    println!("  new | save | delete    manage the current story");
    println!("  list | load <name>     browse saved stories");
    println!("  lang [language]        show or set the suggestion language");
    println!("  suggest | image        ask for ideas or an illustration");
    println!("Canvas:");
    println!("  canvas open|close|clear|export|save|load");
    println!("  canvas color <#rrggbb> | canvas line <x1> <y1> <x2> <y2>");
    println!("Characters:");
    println!("  char list|show|save|clear | char set <field> <value> | char load <name>");
    println!("Other:");
    println!("  theme | back | quit");
}

/// Print new events, plus the data a successful operation produced
fn drain_events(app: &StoryApp, events: &mut broadcast::Receiver<AppEvent>) {
    loop {
        let event = match events.try_recv() {
            Ok(event) => event,
            Err(TryRecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Missed events");
                continue;
            }
            Err(_) => break,
        };

        println!("{}", event);
        if !event.outcome.is_success() {
            continue;
        }
        match event.operation {
            Operation::ListStories => {
                for entry in app.editor().stories() {
                    println!("  {}", entry.filename);
                }
            }
            Operation::ListCharacters => {
                for name in app.roster().names() {
                    println!("  {}", name);
                }
            }
            Operation::LoadStory => print_story(app),
            Operation::Suggestions => {
                if let Some(text) = app.editor().suggestions() {
                    println!("{}", text);
                }
            }
            Operation::GenerateImage => {
                if let Some(url) = app.editor().image_url() {
                    println!("  {}", url);
                }
            }
            Operation::LoadCharacter => print_character(app),
            _ => {}
        }
    }
}

fn print_story(app: &StoryApp) {
    let editor = app.editor();
    let title = if editor.name().is_empty() {
        "(untitled)"
    } else {
        editor.name()
    };
    println!("--- {} ({} words) ---", title, editor.word_count());
    println!("{}", strip_markup(&editor.content().replace("</p>", "</p>\n")).trim_end());
}

fn print_character(app: &StoryApp) {
    let c = app.roster().current();
    println!("  name:        {}", c.name);
    println!("  age:         {}", c.age);
    println!("  description: {}", c.description);
    println!("  traits:      {}", c.traits);
    println!("  backstory:   {}", c.backstory);
}

async fn handle_line(app: &mut StoryApp, input: &mut Input, line: &str) -> anyhow::Result<Flow> {
    let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
    let rest = rest.trim();

    match (app.view(), command) {
        (_, "") => {}
        (_, "quit" | "exit") => return Ok(Flow::Quit),
        (_, "theme") => println!("Theme: {:?}", app.toggle_theme()),
        (View::Landing, "start") => {
            app.start_writing();
        }
        (View::Landing, "about") => {
            app.show_about();
        }
        (View::About, "tech") => {
            if let Some(item) = app.ambient().get(Ambient::TechRotator).and_then(|h| h.tech_item()) {
                println!("  {}", item);
            }
        }
        (View::Editor, cmd) => handle_editor(app, input, cmd, rest).await?,
        (_, "back") => {
            if !app.back() {
                println!("Nothing to go back to");
            }
        }
        (view, cmd) => println!("'{}' is not available on the {} page", cmd, view),
    }
    Ok(Flow::Continue)
}

async fn handle_editor(
    app: &mut StoryApp,
    input: &mut Input,
    command: &str,
    rest: &str,
) -> anyhow::Result<()> {
    match command {
        "help" => print_editor_help(),
        "name" => app.set_name(rest),
        "write" => {
            let content = format!("{}{}", app.editor().content(), paragraph(rest));
            app.set_content(content);
            println!("{} words", app.editor().word_count());
        }
        "show" => print_story(app),
        "new" => {
            app.new_story();
            println!("Started a new story");
        }
        "save" => app.save(),
        "delete" => {
            let confirmed = match app.delete_prompt() {
                Some(question) => {
                    print!("{} [y/N] ", question);
                    std::io::stdout().flush()?;
                    let answer = input.next_line().await?.unwrap_or_default();
                    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
                }
                None => false,
            };
            app.delete(|_| confirmed);
        }
        "list" => app.list_stories(),
        "load" => {
            if rest.is_empty() {
                println!("Usage: load <name>");
            } else if rest.ends_with(STORY_EXTENSION) {
                app.load(rest);
            } else {
                app.load(story_filename(rest));
            }
        }
        "lang" => {
            if rest.is_empty() {
                for language in Language::ALL {
                    let marker = if language == app.editor().language() { "*" } else { " " };
                    println!(" {} {} ({})", marker, language.native_label(), language.tag());
                }
            } else {
                match rest.parse::<Language>() {
                    Ok(language) => app.set_language(language),
                    Err(e) => println!("{}", e),
                }
            }
        }
        "suggest" => app.suggestions(),
        "image" => app.generate_image(),
        "canvas" => handle_canvas(app, rest),
        "char" => handle_character(app, rest),
        "back" => {
            app.back();
        }
        other => println!("Unknown command '{}'. Type 'help'.", other),
    }
    Ok(())
}

fn handle_canvas(app: &mut StoryApp, args: &str) {
    let mut parts = args.split_whitespace();
    match parts.next() {
        Some("open") => app.open_canvas(),
        Some("close") => app.close_canvas(),
        Some("clear") => {
            if !app.clear_canvas() {
                println!("Open the canvas first");
            }
        }
        Some("color") => match parts.next() {
            Some(color) => {
                if !app.set_brush_color(color) {
                    println!("Colour not applied (open the canvas, use #rrggbb)");
                }
            }
            None => println!("Usage: canvas color <#rrggbb>"),
        },
        Some("line") => {
            let coords: Vec<i32> = parts.filter_map(|p| p.parse().ok()).collect();
            match coords[..] {
                [x1, y1, x2, y2] => {
                    if !app.draw_line((x1, y1), (x2, y2)) {
                        println!("Open the canvas first");
                    }
                }
                _ => println!("Usage: canvas line <x1> <y1> <x2> <y2>"),
            }
        }
        Some("export") => app.export_canvas(),
        Some("save") => app.save_canvas(),
        Some("load") => app.load_canvas(),
        _ => println!("Usage: canvas open|close|clear|color|line|export|save|load"),
    }
}

fn handle_character(app: &mut StoryApp, args: &str) {
    let (sub, rest) = args.split_once(' ').unwrap_or((args, ""));
    let rest = rest.trim();
    match sub {
        "list" => app.list_characters(None),
        "show" => print_character(app),
        "set" => {
            let (field, value) = rest.split_once(' ').unwrap_or((rest, ""));
            if !app.set_character_field(field, value.trim()) {
                println!("Fields: name, age, description, traits, backstory");
            }
        }
        "save" => app.save_character(),
        "load" => {
            if rest.ends_with(STORY_EXTENSION) {
                app.load_character(rest);
            } else {
                match app.editor().current_base() {
                    Some(base) => {
                        let filename = storytime::story::character_filename(base, rest);
                        app.load_character(filename);
                    }
                    None => println!("Load a story first"),
                }
            }
        }
        "clear" => app.clear_character(),
        _ => println!("Usage: char list|show|set|save|load|clear"),
    }
}
