//! Headless mode for the crafting game.
//!
//! A simple line-oriented protocol suitable for a terminal or for scripts:
//! every line is a `#` command, every reply line starts with a `[TAG]`.

use genesis_core::{
    Category, CombineError, CombineResult, Concept, EngineConfig, GameSession, SessionError,
    WorldProfile, WorldVisual,
};
use std::io::{self, BufRead, Write};

/// Setup values given on the command line.
#[derive(Debug, Default)]
pub struct Setup {
    pub name: Option<String>,
    pub powers: Option<String>,
    pub world: Option<String>,
}

/// Parse setup values from command line arguments.
pub fn parse_setup_from_args(args: &[String]) -> Setup {
    let mut setup = Setup::default();

    let mut i = 0;
    while i < args.len() {
        let slot = match args[i].as_str() {
            "--name" => Some(&mut setup.name),
            "--trait" => Some(&mut setup.powers),
            "--world" => Some(&mut setup.world),
            _ => None,
        };
        if let (Some(slot), Some(value)) = (slot, args.get(i + 1)) {
            *slot = Some(value.clone());
            i += 1;
        }
        i += 1;
    }

    setup
}

/// Ask on stdin for anything the command line left out.
pub fn complete_setup(setup: Setup) -> io::Result<WorldProfile> {
    let name = match setup.name {
        Some(name) => name,
        None => ask("Your divine name", "Cronos")?,
    };
    let powers = match setup.powers {
        Some(powers) => powers,
        None => ask("Your powers", "Mastery over time")?,
    };
    let world = match setup.world {
        Some(world) => world,
        None => ask("The planet you will shape", "Earth Prime")?,
    };
    Ok(WorldProfile::new(name, powers, world))
}

fn ask(question: &str, default: &str) -> io::Result<String> {
    print!("{question} [{default}]: ");
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    let answer = line.trim();
    Ok(if answer.is_empty() {
        default.to_string()
    } else {
        answer.to_string()
    })
}

/// Run the game loop until `#quit` or end of input.
pub async fn run_headless(session: &GameSession, config: &EngineConfig) -> Result<(), SessionError> {
    let profile = session.profile();
    println!("=== Genesis ===");
    println!("{}, whose powers are {}, shapes {}.", profile.actor_name, profile.actor_trait, profile.world_name);
    println!("Known elements: {}", session.store().len());
    println!();
    print_help();
    println!();

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                eprintln!("Error reading input: {e}");
                break;
            }
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let Some(command) = line.strip_prefix('#') else {
            println!("[ERROR] Unknown input. Type #help for help.");
            continue;
        };
        let (verb, rest) = command
            .split_once(char::is_whitespace)
            .map(|(verb, rest)| (verb, rest.trim()))
            .unwrap_or((command, ""));

        match verb {
            "quit" | "exit" => {
                println!("Goodbye!");
                break;
            }
            "combine" => combine(session, rest).await,
            "list" => list(session),
            "chronicle" => {
                let limit = rest.parse().unwrap_or(10);
                for entry in session.chronicle().entries().into_iter().take(limit) {
                    println!("[CHRONICLE] {entry}");
                }
            }
            "visual" => visual(session, config).await,
            "reset" => match session.reset().await {
                Ok(()) => println!("[RESET] Only the four elements remain."),
                Err(e) => println!("[ERROR] {e}"),
            },
            "status" => {
                println!("[STATUS]");
                println!("  God: {} ({})", profile.actor_name, profile.actor_trait);
                println!("  World: {}", profile.world_name);
                println!("  Elements: {}", session.store().len());
                println!("  Discovered: {}", session.store().derived_count());
            }
            "help" => print_help(),
            _ => println!("[ERROR] Unknown command. Type #help for help."),
        }
        stdout.flush().ok();
    }

    Ok(())
}

fn print_help() {
    println!("[HELP]");
    println!("  #combine <a> <b>   Combine two elements (use 'A + B' for names with spaces)");
    println!("  #list              Show known elements by category");
    println!("  #chronicle [n]     Show the latest n chronicle entries");
    println!("  #visual            Redraw the world");
    println!("  #status            Show the world status");
    println!("  #reset             Destroy the world and start over");
    println!("  #quit              Exit the game");
}

async fn combine(session: &GameSession, args: &str) {
    let Some((a, b)) = split_pair(args) else {
        println!("[ERROR] Usage: #combine <a> <b>");
        return;
    };
    let (Some(a), Some(b)) = (resolve(session, a), resolve(session, b)) else {
        println!("[ERROR] Unknown element. Type #list to see what exists.");
        return;
    };

    print!("[FORMING] {} + {}", a.name, b.name);
    io::stdout().flush().ok();

    let result = session.combine(&a.id, &b.id).await;
    println!();

    match result {
        Ok(CombineResult::Created { concept, provenance }) => {
            let note = if provenance.is_fallback() { " (backup magic)" } else { "" };
            println!("[CREATED] {} {}{note}", concept.glyph, concept.name);
            if !concept.description.is_empty() {
                println!("  {}", concept.description);
            }
        }
        Ok(CombineResult::AlreadyKnown { concept, .. }) => {
            println!("[KNOWN] {} {}", concept.glyph, concept.name);
        }
        Ok(CombineResult::DuplicateName { candidate, .. }) => {
            println!("[DUPLICATE] {} already exists; nothing new emerged.", candidate.name);
        }
        Err(SessionError::Combine(CombineError::Busy)) => {
            println!("[BUSY] Another creation is still forming.");
        }
        Err(e) => println!("[ERROR] {e}"),
    }
}

/// Split `A + B` or `a b` into two element references.
fn split_pair(args: &str) -> Option<(&str, &str)> {
    let (a, b) = match args.split_once('+') {
        Some(pair) => pair,
        None => args.split_once(char::is_whitespace)?,
    };
    let (a, b) = (a.trim(), b.trim());
    (!a.is_empty() && !b.is_empty()).then_some((a, b))
}

/// Find an element by id, then by name.
fn resolve(session: &GameSession, reference: &str) -> Option<Concept> {
    let store = session.store();
    store.get(reference).or_else(|| store.find_by_name(reference))
}

fn list(session: &GameSession) {
    for (category, concepts) in session.store().by_category() {
        if concepts.is_empty() {
            continue;
        }
        println!("[{}]", category_label(category));
        for concept in concepts {
            println!("  {} {} ({})", concept.glyph, concept.name, concept.id);
        }
    }
}

fn category_label(category: Category) -> String {
    category.as_str().to_uppercase()
}

async fn visual(session: &GameSession, config: &EngineConfig) {
    match session.regenerate_visual().await {
        WorldVisual::Rendered(image) => {
            let extension = image.media_type.rsplit('/').next().unwrap_or("png");
            let path = config.save_dir.join(format!("world.{extension}"));
            let written = async {
                tokio::fs::create_dir_all(&config.save_dir).await?;
                tokio::fs::write(&path, &image.bytes).await
            }
            .await;
            match written {
                Ok(()) => println!("[VISUAL] {}", path.display()),
                Err(e) => println!("[ERROR] Could not write image: {e}"),
            }
        }
        WorldVisual::Url(url) => println!("[VISUAL] {url}"),
    }
}
