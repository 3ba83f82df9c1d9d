//! Clap command tree definition.

use clap::{Arg, ArgAction, Command};

/// Build the complete CLI command tree.
pub fn build_cli() -> Command {
    Command::new("mediasearch")
        .about("Index and search a media library")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("db")
                .long("db")
                .help("Index directory (default: .mediasearch)")
                .global(true),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .help("JSON output mode")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .subcommand(build_index())
        .subcommand(build_search())
        .subcommand(build_remove())
        .subcommand(build_stats())
}

fn build_index() -> Command {
    Command::new("index")
        .about("Add or update documents from a JSON-lines file")
        .long_about(
            "Each line is an object with \"id\", \"name\" and optional \"overview\".\n\
             Use - to read from stdin.",
        )
        .arg(Arg::new("file").required(true).help("Path to a .jsonl file, or -"))
}

fn build_search() -> Command {
    Command::new("search")
        .about("Search the index")
        .arg(
            Arg::new("query")
                .required(true)
                .num_args(1..)
                .help("Query terms"),
        )
}

fn build_remove() -> Command {
    Command::new("remove")
        .about("Remove documents by id")
        .arg(
            Arg::new("ids")
                .required(true)
                .num_args(1..)
                .help("Document ids"),
        )
}

fn build_stats() -> Command {
    Command::new("stats").about("Show index statistics")
}
