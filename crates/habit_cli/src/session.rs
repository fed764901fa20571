//! Line-mode presentation over the habit store.
//!
//! # Responsibility
//! - Keep cursor position and the last status message; nothing else.
//! - Translate typed commands into store/model calls.
//!
//! # Invariants
//! - The displayed list is always a snapshot taken from the store.
//! - Store errors are shown to the user and never end the session.

use habit_core::{Clock, Habit, HabitStore, StoreError};
use log::warn;
use std::io::{self, BufRead, Write};

const HELP: &str = "commands: up|k, down|j, toggle|t|<enter>, add <name>, delete|d, list|l, help|h, quit|q";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Up,
    Down,
    Toggle,
    Add(String),
    Delete,
    List,
    Help,
    Quit,
}

impl Command {
    pub fn parse(line: &str) -> Result<Self, String> {
        let trimmed = line.trim();
        let (word, rest) = match trimmed.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (trimmed, ""),
        };

        match word.to_ascii_lowercase().as_str() {
            "" | "t" | "toggle" => Ok(Self::Toggle),
            "k" | "up" => Ok(Self::Up),
            "j" | "down" => Ok(Self::Down),
            "d" | "delete" => Ok(Self::Delete),
            "l" | "list" => Ok(Self::List),
            "h" | "help" | "?" => Ok(Self::Help),
            "q" | "quit" | "exit" => Ok(Self::Quit),
            "a" | "add" if rest.is_empty() => Err("usage: add <name>".to_string()),
            "a" | "add" => Ok(Self::Add(rest.to_string())),
            other => Err(format!("unknown command `{other}`; type `help`")),
        }
    }
}

enum Flow {
    Continue,
    Quit,
}

pub struct Session<'a> {
    store: &'a HabitStore,
    clock: &'a dyn Clock,
    habits: Vec<Habit>,
    cursor: usize,
    status: Option<String>,
}

impl<'a> Session<'a> {
    pub fn new(store: &'a HabitStore, clock: &'a dyn Clock) -> Self {
        Self {
            habits: store.get_habits(),
            store,
            clock,
            cursor: 0,
            status: None,
        }
    }

    /// Reads commands until `quit` or end of input.
    pub fn run(&mut self, mut input: impl BufRead, mut output: impl Write) -> io::Result<()> {
        self.render(&mut output)?;
        let mut line = String::new();
        loop {
            write!(output, "> ")?;
            output.flush()?;

            line.clear();
            if input.read_line(&mut line)? == 0 {
                writeln!(output)?;
                return Ok(());
            }

            let flow = match Command::parse(&line) {
                Ok(command) => self.apply(command),
                Err(message) => {
                    self.status = Some(message);
                    Flow::Continue
                }
            };
            if let Flow::Quit = flow {
                return Ok(());
            }
            self.render(&mut output)?;
        }
    }

    fn apply(&mut self, command: Command) -> Flow {
        match command {
            Command::Up => self.cursor = self.cursor.saturating_sub(1),
            Command::Down => {
                if self.cursor + 1 < self.habits.len() {
                    self.cursor += 1;
                }
            }
            Command::Toggle => self.toggle_selected(),
            Command::Add(name) => self.add(name),
            Command::Delete => self.delete_selected(),
            Command::List => self.refresh(),
            Command::Help => self.status = Some(HELP.to_string()),
            Command::Quit => return Flow::Quit,
        }
        Flow::Continue
    }

    fn toggle_selected(&mut self) {
        let Some(selected) = self.habits.get_mut(self.cursor) else {
            self.status = Some("no habit selected".to_string());
            return;
        };
        let completed = selected.toggle_today(self.clock);
        let result = self
            .store
            .update_completion(selected.id, self.clock.today(), completed);
        self.finish("toggle", result);
    }

    fn add(&mut self, name: String) {
        let habit = match Habit::new_with_clock(name, self.clock) {
            Ok(habit) => habit,
            Err(err) => {
                self.status = Some(err.to_string());
                return;
            }
        };
        let result = self.store.add_habit(&habit);
        self.finish("add", result);
    }

    fn delete_selected(&mut self) {
        let Some(selected) = self.habits.get(self.cursor) else {
            self.status = Some("no habit selected".to_string());
            return;
        };
        let result = self.store.delete_habit(selected.id);
        self.finish("delete", result);
    }

    /// Re-syncs the view from the store, which also discards any local edit
    /// that failed to persist.
    fn finish(&mut self, action: &str, result: Result<(), StoreError>) {
        if let Err(err) = result {
            warn!(
                "event=ui_action module=cli status=error action={} error_code={}",
                action,
                err.code()
            );
            self.status = Some(format!("{action} failed: {err}"));
        }
        self.refresh();
    }

    fn refresh(&mut self) {
        self.habits = self.store.get_habits();
        if self.cursor >= self.habits.len() {
            self.cursor = self.habits.len().saturating_sub(1);
        }
    }

    fn render(&mut self, output: &mut impl Write) -> io::Result<()> {
        writeln!(output, "Habit Tracker")?;
        writeln!(output)?;
        if self.habits.is_empty() {
            writeln!(output, "  (no habits yet; `add <name>` to create one)")?;
        }
        for (index, habit) in self.habits.iter().enumerate() {
            let cursor = if index == self.cursor { '>' } else { ' ' };
            let checked = if habit.is_completed_today(self.clock) {
                'x'
            } else {
                ' '
            };
            writeln!(
                output,
                "{cursor} [{checked}] {} ({:.2}%)",
                habit.name,
                habit.completion_rate()
            )?;
        }
        if let Some(status) = self.status.take() {
            writeln!(output)?;
            writeln!(output, "{status}")?;
        }
        Ok(())
    }
}
