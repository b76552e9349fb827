use clap::Parser;
use tracing_subscriber::EnvFilter;
use zotindex::{
    ConfigDb,
    DataDir,
    Engine,
    Error,
    Result,
    cli::{
        AnnotationsArgs,
        Cli,
        CollectionsAction,
        Command,
        KeyArgs,
        MatchArgs,
        SeparatorAction,
    },
    config::{self, YEAR_PAGE_SEP_SETTING},
    mcp,
    resolver::{AttachmentLookup, ID_NOT_FOUND},
};

fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if let Ok(env) = std::env::var("ZOTINDEX_LOG") {
        EnvFilter::new(env)
    } else if quiet {
        EnvFilter::new("warn")
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    match &cli.command {
        Command::Completions(args) => args.generate(),
        Command::Separator { action } => cmd_separator(&cli, action)?,
        Command::Mcp => mcp::run_mcp(&cli.engine_options())?,
        Command::Match(args) => cmd_match(&mut open_engine(&cli)?, args)?,
        Command::Attachments(args) => {
            cmd_attachments(&mut open_engine(&cli)?, args)?;
        }
        Command::Record(args) => cmd_record(&mut open_engine(&cli)?, args)?,
        Command::Cite(args) => {
            match open_engine(&cli)?.citation(args.item_id) {
                Some(citation) => println!("{citation}"),
                None => println!("{ID_NOT_FOUND}"),
            }
        }
        Command::Annotations(args) => {
            cmd_annotations(&mut open_engine(&cli)?, args)?;
        }
        Command::Notes(args) => cmd_notes(&mut open_engine(&cli)?, args)?,
        Command::Collections { action } => {
            cmd_collections(&mut open_engine(&cli)?, action)?;
        }
        Command::Info(args) => cmd_info(&open_engine(&cli)?, args.json)?,
    }

    Ok(())
}

fn open_engine(cli: &Cli) -> Result<Engine> {
    Engine::open(&cli.engine_options())
}

fn cmd_info(engine: &Engine, json: bool) -> Result<()> {
    let info = engine.info();
    if json {
        return print_json(&info);
    }

    println!("Zotero database: {}", info.zotero_db.display());
    println!("Better BibTeX database: {}", info.better_bibtex_db.display());
    println!("Data directory: {}", info.data_dir.display());
    println!("Snapshots:");
    println!("  {}", info.zotero_snapshot.display());
    println!("  {}", info.better_bibtex_snapshot.display());
    println!("Settings: {}", info.config_db.display());
    println!("Year/page separator: {:?}", info.year_page_sep);
    println!("Converter: {}", info.converter);
    println!("References: {}", info.references);
    println!("Collections: {}", info.collections);
    println!("Built from store modified at: {}", info.built_from);
    println!("Documents: {}", info.documents.len());
    for (doc, names) in &info.documents {
        println!("  {doc}: {}", names.join(", "));
    }
    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value)?;
    println!("{text}");
    Ok(())
}

fn cmd_match(engine: &mut Engine, args: &MatchArgs) -> Result<()> {
    let lines = engine.matches(&args.pattern, &args.doc);
    if args.json {
        return print_json(&lines);
    }
    for line in &lines {
        println!(
            "{}\t{}\t{}",
            line.citation_key, line.author_summary, line.label
        );
    }
    Ok(())
}

fn cmd_attachments(engine: &mut Engine, args: &KeyArgs) -> Result<()> {
    let lookup = engine.attachments(&args.key);
    if args.json {
        return print_json(&lookup);
    }
    match lookup {
        AttachmentLookup::Found(paths) => {
            for path in &paths {
                println!("{path}");
            }
        }
        miss => println!("{miss}"),
    }
    Ok(())
}

fn cmd_record(engine: &mut Engine, args: &KeyArgs) -> Result<()> {
    let details = engine.record(&args.key).ok_or_else(|| Error::NotFound {
        kind: "reference",
        name: args.key.clone(),
    })?;
    if args.json {
        return print_json(&details);
    }

    let r = &details.reference;
    println!("Stable key: {}", r.stable_key);
    println!(
        "Citation key: {}",
        r.citation_key.as_deref().unwrap_or("(not synced)")
    );
    println!("Item id: {}", r.item_id);
    if let Some(item_type) = &r.item_type {
        println!("Type: {item_type}");
    }
    println!("Title: {}", r.title);
    if !r.year.is_empty() {
        println!("Year: {}", r.year);
    }
    for (role, creators) in &r.creators {
        for c in creators {
            println!("{role}: {}, {}", c.last_name, c.first_name);
        }
    }
    for (name, value) in &r.fields {
        println!("{name}: {value}");
    }
    for attachment in &r.attachments {
        println!("Attachment: {attachment}");
    }
    if !details.collections.is_empty() {
        println!("Collections: {}", details.collections.join(", "));
    }
    Ok(())
}

fn cmd_annotations(engine: &mut Engine, args: &AnnotationsArgs) -> Result<()> {
    let lines = engine.annotations(&args.key, args.offset)?.ok_or_else(|| {
        Error::NotFound {
            kind: "reference",
            name: args.key.clone(),
        }
    })?;
    if args.json {
        return print_json(&lines);
    }
    for line in &lines {
        println!("{line}");
    }
    Ok(())
}

fn cmd_notes(engine: &mut Engine, args: &KeyArgs) -> Result<()> {
    let markdown = engine.notes(&args.key)?.ok_or_else(|| Error::NotFound {
        kind: "reference",
        name: args.key.clone(),
    })?;
    if args.json {
        return print_json(&serde_json::json!({ "markdown": markdown }));
    }
    print!("{markdown}");
    Ok(())
}

fn cmd_collections(
    engine: &mut Engine,
    action: &CollectionsAction,
) -> Result<()> {
    match action {
        CollectionsAction::Set { doc, names } => {
            let assigned = engine.set_collections(doc, names)?;
            if assigned.is_empty() {
                println!("'{doc}' now searches the whole library");
            } else {
                println!("'{doc}' restricted to: {}", assigned.join(", "));
            }
        }
        CollectionsAction::Show { doc, json } => {
            let names = engine.document_collections(doc);
            if *json {
                print_json(&names)?;
            } else if names.is_empty() {
                println!("No collections assigned to '{doc}'.");
            } else {
                for name in names {
                    println!("{name}");
                }
            }
        }
        CollectionsAction::List { json } => {
            let index = engine.index();
            let counts: Vec<(&str, usize)> = index
                .collections()
                .iter()
                .map(|(name, items)| (name.as_str(), items.len()))
                .collect();
            if *json {
                let value: serde_json::Map<String, serde_json::Value> = counts
                    .iter()
                    .map(|(name, n)| (name.to_string(), (*n).into()))
                    .collect();
                print_json(&value)?;
            } else if counts.is_empty() {
                println!("No collections in the library.");
            } else {
                for (name, n) in &counts {
                    println!("{name}\t{n}");
                }
            }
        }
    }
    Ok(())
}

fn cmd_separator(cli: &Cli, action: &SeparatorAction) -> Result<()> {
    let data_dir = DataDir::resolve(cli.data_dir.as_deref())?;
    let config_db = ConfigDb::open(&data_dir.config_db())?;

    match action {
        SeparatorAction::Show { json } => {
            let sep = config::resolve_year_page_sep(
                cli.year_page_sep.as_deref(),
                &config_db,
            )?;
            if *json {
                print_json(&serde_json::json!({ "yearPageSep": sep }))?;
            } else {
                println!("{sep:?}");
            }
        }
        SeparatorAction::Set { value } => {
            config_db.set_setting(YEAR_PAGE_SEP_SETTING, value)?;
            println!("Year/page separator set to {value:?}");
        }
        SeparatorAction::Clear => {
            if config_db.remove_setting(YEAR_PAGE_SEP_SETTING)? {
                println!(
                    "Year/page separator cleared (default: {:?})",
                    config::DEFAULT_YEAR_PAGE_SEP
                );
            } else {
                println!("No year/page separator was set.");
            }
        }
    }
    Ok(())
}
