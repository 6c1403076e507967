//! Command-line grammar for the operator console and the client REPL
//!
//! Commands are whitespace-separated words parsed with nom; argument counts
//! are checked per command name before anything touches the store.

use crate::error::{LedgerError, Result};
use nom::{
    bytes::complete::take_while1,
    character::complete::{multispace0, multispace1},
    multi::separated_list1,
    sequence::delimited,
    IResult,
};

/// A parsed console command: a name and its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    pub name: String,
    pub args: Vec<String>,
}

/// Commands accepted on the server's operator console.
const ADMIN_COMMANDS: &[(&str, usize)] = &[
    ("append", 2),
    ("read", 1),
    ("remove", 1),
    ("load", 0),
    ("store", 0),
    ("help", 0),
    ("exit", 0),
];

/// Commands accepted by the client REPL (the wire protocol carries no
/// remove/load/store).
const CLIENT_COMMANDS: &[(&str, usize)] = &[
    ("append", 2),
    ("read", 1),
    ("help", 0),
    ("exit", 0),
];

fn word(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| !c.is_whitespace())(input)
}

fn words(input: &str) -> IResult<&str, Vec<&str>> {
    delimited(multispace0, separated_list1(multispace1, word), multispace0)(input)
}

fn parse_line(line: &str, commands: &[(&str, usize)]) -> Result<Option<ParsedCommand>> {
    if line.trim().is_empty() {
        return Ok(None);
    }
    let (rest, parts) = words(line)
        .map_err(|e| LedgerError::Command(format!("failed to parse command line: {:?}", e)))?;
    if !rest.is_empty() {
        return Err(LedgerError::Command(format!(
            "trailing input after command: '{}'",
            rest
        )));
    }

    let name = parts[0];
    let args: Vec<String> = parts[1..].iter().map(|s| s.to_string()).collect();
    match commands.iter().find(|(cmd, _)| *cmd == name) {
        Some((_, arity)) if *arity == args.len() => Ok(Some(ParsedCommand {
            name: name.to_string(),
            args,
        })),
        Some((_, arity)) => Err(LedgerError::Command(format!(
            "'{}' takes {} argument(s), got {}",
            name,
            arity,
            args.len()
        ))),
        None => Err(LedgerError::Command(format!("unknown command: '{}'", name))),
    }
}

/// Parse one operator-console line; `Ok(None)` for a blank line.
pub fn parse_admin(line: &str) -> Result<Option<ParsedCommand>> {
    parse_line(line, ADMIN_COMMANDS)
}

/// Parse one client-REPL line; `Ok(None)` for a blank line.
pub fn parse_client(line: &str) -> Result<Option<ParsedCommand>> {
    parse_line(line, CLIENT_COMMANDS)
}

/// Print the operator console's command list.
pub fn admin_help() {
    println!("Available commands:");
    println!("  append <key> <value>  - append a value to a key's list");
    println!("  read <key>            - show a key's values");
    println!("  remove <key>          - delete a key and show what it held");
    println!("  load                  - reload the store from the snapshot file");
    println!("  store                 - write the store to the snapshot file");
    println!("  help                  - show this help message");
    println!("  exit                  - stop the server");
}

/// Print the client REPL's command list.
pub fn client_help() {
    println!("Available commands:");
    println!("  append <key> <value>  - append a value to a key's list");
    println!("  read <key>            - show a key's values");
    println!("  help                  - show this help message");
    println!("  exit                  - quit the client");
}
