//! The numbered interactive menu.
//!
//! By default input comes through `rustyline`; a plain stdin fallback is used
//! with `--no-default-features`. Errors inside the loop are printed and the
//! menu is shown again.

use anyhow::{anyhow, bail, Context, Result};
use chatgraph_dgraph::GraphClient;
use chatgraph_ingest_csv::DataSet;
use chatgraph_loader::{create_all, drop_all, LoadOptions};
use chatgraph_queries as queries;
use colored::Colorize;
#[cfg(not(feature = "repl-rustyline"))]
use std::io::{self, Write};

use crate::print::Output;

pub const MENU_OPTIONS: [(u8, &str); 8] = [
    (1, "Create data"),
    (2, "Search groups by user name"),
    (3, "Search first n messages from number to number"),
    (4, "Range of statuses in date order"),
    (5, "Number of users and their information"),
    (6, "Delete statuses up to a date"),
    (7, "Drop all"),
    (8, "Exit"),
];

pub struct MenuSettings {
    pub dataset: DataSet,
    pub load: LoadOptions,
    /// Leave the data in place when choosing "Exit".
    pub keep_on_exit: bool,
    pub output: Output,
}

/// Where menu answers come from.
pub trait LineSource {
    /// `None` at end of input.
    fn read_line(&mut self, prompt: &str) -> Result<Option<String>>;
}

#[cfg(feature = "repl-rustyline")]
pub struct Terminal {
    editor: rustyline::DefaultEditor,
}

#[cfg(feature = "repl-rustyline")]
impl Terminal {
    pub fn new() -> Result<Self> {
        let editor =
            rustyline::DefaultEditor::new().map_err(|e| anyhow!("failed to init rustyline: {e}"))?;
        Ok(Self { editor })
    }
}

#[cfg(feature = "repl-rustyline")]
impl LineSource for Terminal {
    fn read_line(&mut self, prompt: &str) -> Result<Option<String>> {
        use rustyline::error::ReadlineError;

        loop {
            match self.editor.readline(prompt) {
                Ok(line) => {
                    if !line.trim().is_empty() {
                        self.editor
                            .add_history_entry(line.as_str())
                            .map_err(|e| anyhow!("failed to record history: {e}"))?;
                    }
                    return Ok(Some(line));
                }
                Err(ReadlineError::Eof) => return Ok(None),
                Err(ReadlineError::Interrupted) => continue,
                Err(e) => return Err(anyhow!("readline error: {e}")),
            }
        }
    }
}

#[cfg(not(feature = "repl-rustyline"))]
pub struct Terminal;

#[cfg(not(feature = "repl-rustyline"))]
impl Terminal {
    pub fn new() -> Result<Self> {
        Ok(Self)
    }
}

#[cfg(not(feature = "repl-rustyline"))]
impl LineSource for Terminal {
    fn read_line(&mut self, prompt: &str) -> Result<Option<String>> {
        print!("{prompt}");
        io::stdout().flush()?;
        let mut line = String::new();
        if io::stdin().read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line))
    }
}

enum MenuControl {
    Continue,
    Exit,
}

pub fn print_menu() {
    println!();
    for (key, label) in MENU_OPTIONS {
        println!("{} -- {label}", key.to_string().cyan().bold());
    }
}

/// Run the menu until "Exit" or end of input.
///
/// End of input leaves without dropping anything.
pub fn run_menu<C>(client: &C, settings: &MenuSettings, input: &mut dyn LineSource) -> Result<()>
where
    C: GraphClient + ?Sized,
{
    loop {
        print_menu();
        let Some(choice) = input.read_line("Enter your choice: ")? else {
            return Ok(());
        };
        let choice = choice.trim();
        if choice.is_empty() {
            continue;
        }

        match dispatch(client, settings, input, choice) {
            Ok(MenuControl::Continue) => {}
            Ok(MenuControl::Exit) => return Ok(()),
            Err(e) => eprintln!("{} {e:#}", "error:".red().bold()),
        }
    }
}

fn ask(input: &mut dyn LineSource, prompt: &str) -> Result<String> {
    input
        .read_line(prompt)?
        .map(|s| s.trim().to_string())
        .ok_or_else(|| anyhow!("input closed"))
}

fn ask_number(input: &mut dyn LineSource, prompt: &str) -> Result<i64> {
    let raw = ask(input, prompt)?;
    raw.parse::<i64>()
        .with_context(|| format!("`{raw}` is not a whole number"))
}

fn dispatch<C>(
    client: &C,
    settings: &MenuSettings,
    input: &mut dyn LineSource,
    choice: &str,
) -> Result<MenuControl>
where
    C: GraphClient + ?Sized,
{
    let out = settings.output;
    match choice {
        "1" => {
            let report = create_all(client, &settings.dataset, settings.load)?;
            out.report(&report)?;
        }
        "2" => {
            let name = ask(input, "Name: ")?;
            let groups = queries::groups_by_user(client, &name)?;
            out.groups(&name, &groups)?;
        }
        "3" => {
            let n = ask_number(input, "Limit messages: ")?;
            let from = ask_number(input, "From number: ")?;
            let to = ask_number(input, "To number: ")?;
            out.messages(&queries::messages_between(client, n, from, to)?)?;
        }
        "4" => {
            let first = ask_number(input, "Amount of statuses to show: ")?;
            let offset = ask_number(input, "Amount of statuses to skip: ")?;
            out.statuses(&queries::statuses_page(client, first, offset)?)?;
        }
        "5" => out.users(&queries::users_overview(client)?)?,
        "6" => {
            let date = ask(input, "Delete statuses posted on or before (YYYY-MM-DD): ")?;
            out.deleted(&queries::delete_statuses_through(client, &date)?)?;
        }
        "7" => {
            drop_all(client)?;
            out.done("all data dropped")?;
        }
        "8" => {
            if !settings.keep_on_exit {
                drop_all(client)?;
                out.done("all data dropped")?;
            }
            return Ok(MenuControl::Exit);
        }
        other => bail!("unknown option `{other}` (choose 1-8)"),
    }
    Ok(MenuControl::Continue)
}
