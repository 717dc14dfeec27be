#![cfg(not(tarpaulin_include))]
use stock_ledger::config::{Config, SharedStore};
use stock_ledger::downloader;
use stock_ledger::loader::split_args;
use stock_ledger::{Ledger, LedgerError, Operation, StockLedger};

use std::fs;
use std::io::{self, Write};
use std::time::Instant;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::from_env()?;
    let store = config.open_store()?;
    let ledger = config.ledger(store.as_ref());

    println!("Stock ledger on {} ({} writes). Type 'help' for commands.", ledger.range(), ledger.write_mode());

    let mut start_time = Instant::now();
    let mut status = String::from("ok");
    loop {
        let elapsed_time = start_time.elapsed().as_secs_f64();
        print!("[{:.1}] ({}) > ", elapsed_time, status);
        io::stdout().flush()?;

        let mut line = String::new();
        if io::stdin().read_line(&mut line)? == 0 {
            break;
        }
        start_time = Instant::now();

        let args = split_args(line.trim());
        let Some(command) = args.first().map(String::as_str) else {
            status = String::from("invalid command");
            continue;
        };

        status = match command {
            "q" | "quit" => break,
            "help" => {
                print_help();
                String::from("ok")
            }
            _ => match run_command(&ledger, command, &args[1..]) {
                Ok(()) => String::from("ok"),
                Err(e) => {
                    eprintln!("⚠️ {e}");
                    e.kind().to_string()
                }
            },
        };
    }

    Ok(())
}

fn run_command(
    ledger: &StockLedger<&SharedStore>,
    command: &str,
    args: &[String],
) -> Result<(), LedgerError> {
    match (command, args) {
        ("sites", []) => {
            let table = ledger.read_ledger()?;
            for site in table.sites() {
                println!("📌 {} ({} parts)", site, table.rows_for_site(site).count());
            }
            Ok(())
        }
        ("show" | "refresh", []) => {
            let table = ledger.read_ledger()?;
            for site in table.sites() {
                print_site(&table, site);
            }
            print_duplicates(&table);
            Ok(())
        }
        ("show", [site]) => {
            let table = ledger.read_ledger()?;
            if table.rows_for_site(site).next().is_none() {
                println!("no rows for site {site:?}");
            } else {
                print_site(&table, site);
            }
            Ok(())
        }
        ("add" | "sub", [site, part, quantity]) => {
            let operation = if command == "add" {
                Operation::Increase
            } else {
                Operation::Decrease
            };
            let quantity: i64 = quantity.parse().map_err(|_| {
                LedgerError::validation(format!("quantity {quantity:?} is not a whole number"))
            })?;
            let outcome = ledger.apply_delta(site, part, quantity, operation)?;
            println!(
                "✅ Stock actualizado para {} - {}: {} -> {}{}",
                outcome.site,
                outcome.part,
                outcome.previous_value,
                outcome.new_value,
                if outcome.created { " (new entry)" } else { "" }
            );
            if outcome.duplicate_rows > 0 {
                println!(
                    "⚠️ {} duplicate row(s) share this key; only the first was updated",
                    outcome.duplicate_rows
                );
            }
            Ok(())
        }
        ("export", [format, path, rest @ ..]) if rest.len() <= 1 => {
            let table = ledger.read_ledger()?;
            let site = rest.first().map(String::as_str);
            let bytes = export_bytes(&table, format, site)?;
            fs::write(path, bytes).map_err(|e| LedgerError::io("export", format!("{path}: {e}")))?;
            println!("wrote {path}");
            Ok(())
        }
        _ => Err(LedgerError::validation(format!(
            "unknown command or wrong arguments: {command} (try 'help')"
        ))),
    }
}

fn export_bytes(table: &Ledger, format: &str, site: Option<&str>) -> Result<Vec<u8>, LedgerError> {
    match format {
        "csv" => Ok(downloader::to_csv(table, site).into_bytes()),
        #[cfg(feature = "web")]
        "xlsx" => downloader::to_xlsx(table, site).map_err(|e| LedgerError::io("export", e)),
        #[cfg(not(feature = "web"))]
        "xlsx" => Err(LedgerError::validation("XLSX export requires the 'web' feature")),
        other => Err(LedgerError::validation(format!("unknown export format {other:?}"))),
    }
}

fn print_site(table: &Ledger, site: &str) {
    println!("📌 {site}");
    println!("  {:<20} {:<30} {:>12} {:>12}", "Parte", "Descripción", "Stock Físico", "Stock Óptimo");
    for row in table.rows_for_site(site) {
        println!(
            "  {:<20} {:<30} {:>12} {:>12}",
            row.part, row.description, row.physical_stock, row.optimal_stock
        );
    }
}

fn print_duplicates(table: &Ledger) {
    for ((site, part), extra) in table.duplicate_keys() {
        println!("⚠️ {site}/{part} appears {} times in the sheet", extra + 1);
    }
}

fn print_help() {
    println!("Commands:");
    println!("  sites: List sites");
    println!("  show [site]: Show stock, for one site or all of them");
    println!("  refresh: Re-read the sheet and show everything");
    println!("  add <site> <part> <qty>: Increase stock (creates the entry if missing)");
    println!("  sub <site> <part> <qty>: Decrease stock, never below zero");
    println!("  export <csv|xlsx> <file> [site]: Write the ledger to a file");
    println!("  q: Quit");
    println!("Quote arguments with spaces: add \"SAN JUAN\" 1750349661 5");
}
