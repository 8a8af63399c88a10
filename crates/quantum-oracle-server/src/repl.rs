//! Interactive REPL for flipping coins and asking the Magic 8 Ball.
//!
//! Launch with `quantum-oracle repl` to enter interactive mode.
//! Type `/help` for available commands, Tab for completion.

use std::sync::Arc;

use rustyline::completion::{Completer, Pair};
use rustyline::config::CompletionType;
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::{
    Cmd, ConditionalEventHandler, Config, Editor, Event, EventContext, EventHandler, Helper,
    KeyEvent, RepeatCount,
};
use tokio::runtime::Handle;

use crate::oracle::Oracle;

/// Available REPL commands.
const COMMANDS: &[(&str, &str)] = &[
    ("/flip", "Flip the quantum coin"),
    ("/ask", "Ask the Magic 8 Ball a question"),
    ("/history", "Show the last 10 flips"),
    ("/stats", "Show heads/tails statistics"),
    ("/sources", "Show the configured source chains"),
    ("/clear", "Clear the screen"),
    ("/help", "Show available commands"),
    ("/exit", "Quit the REPL"),
];

/// REPL helper for tab completion.
#[derive(Default)]
struct OracleHelper;

impl Completer for OracleHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &rustyline::Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let input = &line[..pos];

        if !input.contains(' ') {
            let matches: Vec<Pair> = COMMANDS
                .iter()
                .filter(|(cmd, _)| cmd.starts_with(input))
                .map(|(cmd, desc)| Pair {
                    display: format!("{cmd:<16} {desc}"),
                    replacement: format!("{cmd} "),
                })
                .collect();
            return Ok((0, matches));
        }

        Ok((pos, Vec::new()))
    }
}

impl Hinter for OracleHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &rustyline::Context<'_>) -> Option<String> {
        if pos < line.len() || line.is_empty() {
            return None;
        }
        if line.starts_with('/') && !line.contains(' ') {
            for (cmd, _) in COMMANDS {
                if cmd.starts_with(line) && *cmd != line {
                    return Some(cmd[line.len()..].to_string());
                }
            }
        }
        None
    }
}

impl Highlighter for OracleHelper {}
impl Validator for OracleHelper {}
impl Helper for OracleHelper {}

struct TabCompleteOrAcceptHint;

impl ConditionalEventHandler for TabCompleteOrAcceptHint {
    fn handle(
        &self,
        _evt: &Event,
        _n: RepeatCount,
        _positive: bool,
        ctx: &EventContext<'_>,
    ) -> Option<Cmd> {
        if ctx.has_hint() {
            Some(Cmd::CompleteHint)
        } else {
            Some(Cmd::Complete)
        }
    }
}

/// Run the interactive REPL.
///
/// Blocks on `runtime` for each action, so call it from a blocking thread
/// (`tokio::task::spawn_blocking`), not from inside an async task.
pub fn run(oracle: Arc<Oracle>, runtime: Handle) -> anyhow::Result<()> {
    eprintln!();
    eprintln!(
        "  \x1b[35m\u{25c9}\x1b[0m \x1b[1mquantum-oracle v{}\x1b[0m \x1b[90m\u{2014} Quantum coin & Magic 8 Ball\x1b[0m",
        env!("CARGO_PKG_VERSION")
    );
    eprintln!();
    eprintln!(
        "    Press \x1b[36m/\x1b[0m to browse commands, \x1b[90mTab\x1b[0m to complete, \x1b[90m/exit\x1b[0m to quit."
    );
    eprintln!();

    let config = Config::builder()
        .history_ignore_space(true)
        .auto_add_history(true)
        .completion_type(CompletionType::List)
        .completion_prompt_limit(20)
        .build();

    let mut rl: Editor<OracleHelper, rustyline::history::DefaultHistory> =
        Editor::with_config(config)?;
    rl.set_helper(Some(OracleHelper));
    rl.bind_sequence(
        KeyEvent::from('\t'),
        EventHandler::Conditional(Box::new(TabCompleteOrAcceptHint)),
    );

    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .unwrap_or_else(|_| ".".to_string());
    let hist_path = std::path::PathBuf::from(&home).join(".quantum_oracle_history");
    if hist_path.exists() {
        let _ = rl.load_history(&hist_path);
    }

    let prompt = " \x1b[35moracle>\x1b[0m ";

    loop {
        match rl.readline(prompt) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                let input = line.strip_prefix('/').unwrap_or(line);
                if input.is_empty() {
                    cmd_help();
                    continue;
                }

                let mut parts = input.splitn(2, ' ');
                let cmd = parts.next().unwrap_or("");
                let args = parts.next().unwrap_or("").trim();

                match cmd {
                    "exit" | "quit" => {
                        eprintln!("  \x1b[90m\u{2728}\x1b[0m Goodbye!");
                        break;
                    }
                    "help" | "h" | "?" => cmd_help(),
                    "clear" | "cls" => eprint!("\x1b[2J\x1b[H"),
                    "flip" | "f" => cmd_flip(&oracle, &runtime),
                    "ask" | "shake" => cmd_ask(&oracle, &runtime, args),
                    "history" => cmd_history(&oracle),
                    "stats" => cmd_stats(&oracle),
                    "sources" => cmd_sources(&oracle),
                    _ => {
                        eprintln!("  Unknown command '/{cmd}'. Type /help for commands.");
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                eprintln!("  \x1b[90m(Ctrl+C)\x1b[0m Type \x1b[1m/exit\x1b[0m to quit.");
            }
            Err(ReadlineError::Eof) => {
                eprintln!("  \x1b[90m\u{2728}\x1b[0m Goodbye!");
                break;
            }
            Err(err) => {
                eprintln!("  Error: {err}");
                break;
            }
        }
    }

    let _ = rl.save_history(&hist_path);

    Ok(())
}

fn cmd_help() {
    eprintln!();
    eprintln!("  Commands:");
    eprintln!();
    for (cmd, desc) in COMMANDS {
        eprintln!("    {cmd:<18} {desc}");
    }
    eprintln!();
}

fn cmd_flip(oracle: &Oracle, runtime: &Handle) {
    eprintln!("  \x1b[90mFlipping...\x1b[0m");
    match runtime.block_on(oracle.flip()) {
        Ok(outcome) => {
            let marker = if outcome.fallback { " \x1b[33m(pseudo-random)\x1b[0m" } else { "" };
            eprintln!(
                "  \x1b[1m{}\x1b[0m  \x1b[90mbyte {} via {}\x1b[0m{marker}",
                outcome.side.to_string().to_uppercase(),
                outcome.value,
                outcome.source
            );
        }
        Err(e) => eprintln!("  \x1b[31m{e}\x1b[0m"),
    }
}

fn cmd_ask(oracle: &Oracle, runtime: &Handle, question: &str) {
    let question = (!question.is_empty()).then_some(question);
    eprintln!("  \x1b[90mShaking...\x1b[0m");
    match runtime.block_on(oracle.ask(question)) {
        Ok(outcome) => {
            eprintln!(
                "  \x1b[1m{}\x1b[0m  \x1b[90mbyte {} via {}\x1b[0m",
                outcome.answer, outcome.value, outcome.source
            );
        }
        Err(e) => eprintln!("  \x1b[31m{e}\x1b[0m"),
    }
}

fn cmd_history(oracle: &Oracle) {
    let history = oracle.history();
    if history.is_empty() {
        eprintln!("  No flips yet.");
        return;
    }
    let line: Vec<String> = history.iter().map(|s| s.to_string()).collect();
    eprintln!("  {}", line.join(" "));
}

fn cmd_stats(oracle: &Oracle) {
    let stats = oracle.stats();
    eprintln!();
    eprintln!("  Flips: {}", stats.total);
    eprintln!("    Heads: {}", stats.heads);
    eprintln!("    Tails: {}", stats.tails);
    if let Some(secs) = oracle.cooldown_remaining() {
        eprintln!("  Rate limited, retry in {secs}s");
    }
    eprintln!();
}

fn cmd_sources(oracle: &Oracle) {
    eprintln!();
    for (name, acquirer) in [("Coin", oracle.coin_acquirer()), ("Ball", oracle.ball_acquirer())] {
        eprintln!("  {name} chain:");
        for (i, endpoint) in acquirer.sources().iter().enumerate() {
            eprintln!(
                "    {}. {:<20} {} ({}s)",
                i + 1,
                endpoint.source.label(),
                endpoint.url,
                endpoint.timeout.as_secs()
            );
        }
    }
    eprintln!();
}
