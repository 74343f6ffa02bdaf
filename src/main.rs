use anyhow::{bail, Result};
use serde::Serialize;
use std::path::PathBuf;

use kura::config::Config;
use kura::model::CollectionKind;
use kura::{logging, Archive};

enum Command {
    Import(PathBuf),
    ImportGpx(PathBuf),
    Collections(CollectionKind),
    Collection(String),
    Show(String),
    Delete(String),
    Caption(String, String),
    Tag(String, String),
}

struct Args {
    config_path: Option<PathBuf>,
    system_log: bool,
    command: Command,
}

fn usage_error(message: &str) -> ! {
    eprintln!("Error: {}", message);
    print_help();
    std::process::exit(1);
}

fn parse_args() -> Args {
    let args: Vec<String> = std::env::args().collect();
    let mut config_path = None;
    let mut system_log = false;
    let mut positional = Vec::new();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("kura {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                } else {
                    usage_error("--config requires a path argument");
                }
            }
            "--system-log" => system_log = true,
            arg if arg.starts_with('-') && arg.len() > 1 => {
                usage_error(&format!("unknown argument: {}", arg));
            }
            arg => positional.push(arg.to_string()),
        }
        i += 1;
    }

    let command = match positional.iter().map(String::as_str).collect::<Vec<_>>().as_slice() {
        ["import", path] => Command::Import(PathBuf::from(path)),
        ["import-gpx", path] => Command::ImportGpx(PathBuf::from(path)),
        ["collections", kind] => match kind.parse() {
            Ok(kind) => Command::Collections(kind),
            Err(e) => usage_error(&e.to_string()),
        },
        ["collection", id] => Command::Collection(id.to_string()),
        ["show", id] => Command::Show(id.to_string()),
        ["delete", id] => Command::Delete(id.to_string()),
        ["caption", id, text] => Command::Caption(id.to_string(), text.to_string()),
        ["tag", id, tag] => Command::Tag(id.to_string(), tag.to_string()),
        [] => usage_error("missing command"),
        _ => usage_error(&format!("bad command: {}", positional.join(" "))),
    };

    Args {
        config_path,
        system_log,
        command,
    }
}

fn print_help() {
    println!(
        r#"kura - media archive importer

USAGE:
    kura [OPTIONS] <COMMAND>

COMMANDS:
    import PATH          Import a media file or every media file below a directory
    import-gpx PATH      Import a GPX track or every track below a directory
    collections TYPE     List collections of one type
                         (inbox, camera, timeline_month, timeline_day,
                          places_country, places_region, hashtag)
    collection ID        Show a collection and its media
    show ID              Show one media record
    delete ID            Soft-delete a media record
    caption ID TEXT      Set a media caption
    tag ID TAG           Add a hashtag to a media record

OPTIONS:
    --config, -c PATH   Path to config file
    --system-log        Log to the journal (Linux) or a log file instead of stderr
    --version, -V       Show version
    --help, -h          Show this help message

ENVIRONMENT:
    KURA_CONFIG         Path to config file (overrides default location)
    KURA_LOG            Log level (trace, debug, info, warn, error)
    GOOGLE_API_KEY      Reverse geocoding key when geocoding.api_key is unset

Config file location: $XDG_CONFIG_HOME/kura/config.toml"#
    );
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> Result<()> {
    let args = parse_args();

    if args.system_log {
        let _ = logging::init(Some(Config::config_dir().join("logs")));
    } else {
        let _ = logging::init_stderr();
    }

    let config = match args.config_path {
        Some(path) => Config::load_from(&path)?,
        None => Config::load()?,
    };

    let archive = Archive::open(&config)?;

    match args.command {
        Command::Import(path) => print_json(&archive.import_path(&path)?),
        Command::ImportGpx(path) => print_json(&archive.import_tracks(&path)?),
        Command::Collections(kind) => print_json(&archive.list_collections(kind)?),
        Command::Collection(id) => match archive.collection_detail(&id)? {
            Some(detail) => print_json(&detail),
            None => bail!("collection not found: {}", id),
        },
        Command::Show(id) => match archive.get_media(&id)? {
            Some(record) => print_json(&record),
            None => bail!("media not found: {}", id),
        },
        Command::Delete(id) => {
            let deleted = archive.delete_media(&id)?;
            print_json(&serde_json::json!({ "id": id, "deleted": deleted }))
        }
        Command::Caption(id, text) => print_json(&archive.set_caption(&id, &text)?),
        Command::Tag(id, tag) => print_json(&archive.add_tag(&id, &tag)?),
    }
}
