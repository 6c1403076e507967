//! Interactive client REPL for a ledgerkv server

use ledgerkv::console::{self, ParsedCommand};
use ledgerkv::Client;
use std::env;
use std::io::{self, Write};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();
    let server_addr = args.get(1).unwrap_or(&"127.0.0.1:7600".to_string()).clone();

    println!("Connecting to ledgerkv server at {}...", server_addr);
    let mut client = Client::connect(&server_addr).await?;
    println!("Connected!");
    console::client_help();

    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            break;
        }

        let parsed = match console::parse_client(&input) {
            Ok(Some(parsed)) => parsed,
            Ok(None) => continue,
            Err(e) => {
                println!("Error: {}", e);
                continue;
            }
        };

        if parsed.name == "exit" {
            break;
        }
        if let Err(e) = run_command(&mut client, parsed).await {
            println!("Error: {}", e);
        }
    }

    println!("Goodbye!");
    client.close().await?;
    Ok(())
}

async fn run_command(
    client: &mut Client,
    parsed: ParsedCommand,
) -> Result<(), Box<dyn std::error::Error>> {
    match parsed.name.as_str() {
        "append" => {
            let existed_before = client.append(&parsed.args[0], &parsed.args[1]).await?;
            if existed_before {
                println!("=> Existed before!");
            } else {
                println!("=> Just created!");
            }
        }
        "read" => {
            let values = client.read(&parsed.args[0]).await?;
            println!(
                "=> Read '{}' values (len: {}): {:?}",
                parsed.args[0],
                values.len(),
                values
            );
        }
        "help" => console::client_help(),
        other => println!("Unknown command: {}", other),
    }
    Ok(())
}
