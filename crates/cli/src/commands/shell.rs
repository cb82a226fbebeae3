//! `incarforge shell`: interactive selection session.

use super::{Collaborators, connect, exporter_for, load_config, parse_key_value, start_session};
use incarforge_config::AppConfig;
use incarforge_engine::{GenerationOutcome, Session, SelectionChange};
use std::io::Write;
use std::path::PathBuf;
use tokio::io::{self, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

/// One parsed shell line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    Select(Vec<String>),
    Deselect(String),
    Clear(String),
    Enable(String),
    Disable(String),
    Set(String, String),
    Unset(String),
    Show,
    Preview,
    Generate,
    Save(Option<String>),
    Reset,
    Help,
    Quit,
}

impl ShellCommand {
    pub fn parse(line: &str) -> Result<Self, String> {
        let mut words = line.split_whitespace();
        let command = words.next().unwrap_or_default().to_ascii_lowercase();
        let rest: Vec<&str> = words.collect();

        let one = |what: &str| -> Result<String, String> {
            match rest.as_slice() {
                [] => Err(format!("usage: {command} <{what}>")),
                parts => Ok(parts.join(" ")),
            }
        };

        match command.as_str() {
            "select" | "s" => {
                if rest.is_empty() {
                    Err("usage: select <task>...".into())
                } else {
                    Ok(Self::Select(rest.iter().map(|s| s.to_string()).collect()))
                }
            }
            "deselect" | "d" => one("task").map(Self::Deselect),
            "clear" => one("category").map(Self::Clear),
            "enable" => one("section").map(Self::Enable),
            "disable" => one("section").map(Self::Disable),
            "set" => match rest.as_slice() {
                [pair] => parse_key_value(pair).map(|(k, v)| Self::Set(k, v)),
                [key, value @ ..] if !value.is_empty() => Ok(Self::Set(key.to_string(), value.join(" "))),
                _ => Err("usage: set KEY=VALUE".into()),
            },
            "unset" => one("key").map(Self::Unset),
            "show" => Ok(Self::Show),
            "preview" => Ok(Self::Preview),
            "generate" | "gen" => Ok(Self::Generate),
            "save" => Ok(Self::Save(rest.first().map(|s| s.to_string()))),
            "reset" => Ok(Self::Reset),
            "help" | "?" => Ok(Self::Help),
            "quit" | "exit" | ":q" => Ok(Self::Quit),
            "" => Err("empty command".into()),
            other => Err(format!("unknown command '{other}', try 'help'")),
        }
    }
}

const HELP: &str = "\
  select <task>...      select tasks (constraints applied)
  deselect <task>       deselect a task
  clear <category>      clear a category
  enable|disable <sec>  toggle a standard section
  set KEY=VALUE         add a custom override
  unset KEY             remove a custom override
  show                  selection, sections and assembled parameters
  preview               task parameters of the selection
  generate              render the INCAR
  save [PATH]           write the last generated INCAR (- for stdout)
  reset                 clear everything
  quit                  leave";

struct Shell<'a> {
    config: &'a AppConfig,
    collaborators: &'a Collaborators,
    session: Session,
    last: Option<GenerationOutcome>,
}

impl Shell<'_> {
    /// Run one command. Returns `false` when the shell should exit.
    async fn execute(&mut self, command: ShellCommand) -> bool {
        self.session.poll_derivations();

        match command {
            ShellCommand::Select(names) => {
                for name in names {
                    let Some(key) = self.session.resolve(&name) else {
                        println!("  Unknown task: {name}");
                        continue;
                    };
                    match self.session.select(&key) {
                        Ok(change) => report(&change),
                        Err(e) => println!("  {e}"),
                    }
                }
            }
            ShellCommand::Deselect(name) => {
                let key = self.session.resolve(&name).unwrap_or(name);
                match self.session.deselect(&key) {
                    Ok(change) => report(&change),
                    Err(e) => println!("  {e}"),
                }
            }
            ShellCommand::Clear(category) => match self.session.clear_category(&category) {
                Ok(change) => report(&change),
                Err(e) => println!("  {e}"),
            },
            ShellCommand::Enable(section) => self.toggle(&section, true),
            ShellCommand::Disable(section) => self.toggle(&section, false),
            ShellCommand::Set(key, value) => {
                self.session.add_custom(key.as_str(), value.as_str());
                println!("  {key} = {value}");
            }
            ShellCommand::Unset(key) => {
                let removed = self.session.remove_custom_key(&key);
                println!("  removed {removed} override(s) for {key}");
            }
            ShellCommand::Show => self.show(),
            ShellCommand::Preview => {
                let preview = self
                    .session
                    .preview_task_parameters(self.collaborators.catalog.as_ref())
                    .await;
                if preview.sections.is_empty() {
                    println!("  No task parameters");
                }
                for (task, params) in &preview.sections {
                    println!("  # {task}");
                    for (key, value) in params {
                        println!("    {key} = {value}");
                    }
                }
                for (task, error) in &preview.failures {
                    println!("  ⚠️  {task}: {error}");
                }
            }
            ShellCommand::Generate => {
                self.session.settle_derivations().await;
                match self.session.generate(self.collaborators.renderer.as_ref()).await {
                    Ok(outcome) => {
                        println!("{}", outcome.text);
                        println!("\n  Parameters: {} | Lines: {}", outcome.param_count, outcome.line_count);
                        self.last = Some(outcome);
                    }
                    Err(e) => println!("  ❌ {e}"),
                }
            }
            ShellCommand::Save(target) => {
                let target = target.unwrap_or_else(|| self.config.output.filename.clone());
                let content = self.last.as_ref().map(|o| o.text.as_str()).unwrap_or_default();
                match exporter_for(&target).export(content).await {
                    Ok(receipt) => println!("  ✅ Saved {} bytes to {}", receipt.bytes, receipt.target),
                    Err(e) => println!("  ❌ {e}"),
                }
            }
            ShellCommand::Reset => {
                self.session.reset();
                self.last = None;
                println!("  Session reset");
            }
            ShellCommand::Help => println!("{HELP}"),
            ShellCommand::Quit => return false,
        }
        true
    }

    fn toggle(&mut self, section: &str, enabled: bool) {
        match self.session.set_section_enabled(section, enabled) {
            Ok(()) => println!("  {section}: {}", if enabled { "on" } else { "off" }),
            Err(e) => println!("  {e}"),
        }
    }

    fn show(&self) {
        let selection: Vec<_> = self.session.selection().iter().collect();
        println!("  Selected:  {}", if selection.is_empty() { "(none)".to_string() } else { selection.join(", ") });

        let sections: Vec<String> = self
            .session
            .sections()
            .flags()
            .iter()
            .map(|(k, on)| format!("{k}:{}", if *on { "on" } else { "off" }))
            .collect();
        println!("  Sections:  {}", sections.join(" "));

        for (i, param) in self.session.custom().iter().enumerate() {
            println!("  Custom[{i}]: {} = {}", param.key, param.value);
        }
        if self.session.hooks().in_flight() > 0 {
            println!("  Calculators running: {}", self.session.hooks().in_flight());
        }

        let assembled = self.session.assemble();
        println!("\n  Assembled ({} parameters):", assembled.len());
        for (key, value) in &assembled.params {
            println!("    {key} = {value}");
        }
    }
}

fn report(change: &SelectionChange) {
    if let Some(added) = &change.added {
        println!("  + {added}");
    }
    for removed in &change.removed {
        println!("  - {removed}");
    }
}

pub async fn run(offline: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    let collaborators = connect(&config, offline.as_deref()).await?;
    let session = start_session(&config, &collaborators, true);

    println!();
    println!("  incarforge - Interactive Session");
    println!("  Catalog:   {}", collaborators.describe());
    println!("  Selected:  {}", session.selection().to_vec().join(", "));
    println!("  Type 'help' for commands, 'quit' to leave.");
    println!();

    let mut shell = Shell {
        config: &config,
        collaborators: &collaborators,
        session,
        last: None,
    };

    let (tx, mut rx) = mpsc::channel::<String>(32);
    tokio::spawn(async move {
        let mut lines = BufReader::new(io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if tx.send(line).await.is_err() {
                break;
            }
        }
    });

    prompt()?;
    while let Some(line) = rx.recv().await {
        if line.trim().is_empty() {
            prompt()?;
            continue;
        }
        match ShellCommand::parse(&line) {
            Ok(command) => {
                if !shell.execute(command).await {
                    break;
                }
            }
            Err(e) => println!("  {e}"),
        }
        prompt()?;
    }

    println!("\n  Goodbye!\n");
    Ok(())
}

fn prompt() -> std::io::Result<()> {
    print!("  incar > ");
    std::io::stdout().flush()
}
