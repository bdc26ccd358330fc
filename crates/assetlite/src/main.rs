//! `assetlite` - CLI and HTTP server for the asset management service.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::path::Path;

use anyhow::{bail, Context};
use clap::Parser;
use serde_json::Value;
use tracing::info;

use assetlite::cli::{
    Cli, Command, ConfigCommand, OutputFormat, PermissionsCommand, ReportCommand,
};
use assetlite::permission::ADMINISTRATOR;
use assetlite::reports::{Report, ReportFilters, ReportOutput};
use assetlite::{init_logging, Config, DocType, Desk, Site, Storage};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbosity());

    let config = Config::load_from(cli.config.clone()).context("failed to load configuration")?;

    match cli.command {
        Command::Serve(cmd) => handle_serve(&config, cmd.bind.as_deref()),
        Command::Import(cmd) => handle_import(&config, &cmd.file),
        Command::Report(cmd) => handle_report(&config, cmd),
        Command::Permissions(cmd) => handle_permissions(&config, cmd),
        Command::Status(cmd) => handle_status(&config, cmd.json),
        Command::Config(cmd) => handle_config(&config, cmd),
    }
}

fn open_storage(config: &Config) -> anyhow::Result<Storage> {
    let path = config.database_path();
    Storage::open(&path).with_context(|| format!("failed to open database {}", path.display()))
}

fn handle_serve(config: &Config, bind: Option<&str>) -> anyhow::Result<()> {
    config.validate()?;
    let storage = open_storage(config)?;
    let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    runtime.block_on(assetlite::api::serve(config, storage, bind))?;
    Ok(())
}

fn handle_import(config: &Config, file: &Path) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let Value::Array(entries) = serde_json::from_str::<Value>(&raw)
        .with_context(|| format!("{} is not valid JSON", file.display()))?
    else {
        bail!("{} must hold a JSON array of documents", file.display());
    };

    let storage = open_storage(config)?;
    let site = Site::from_config(config)?;
    let imported = Desk::open(&storage, &site, ADMINISTRATOR)?.import(entries)?;

    for doc in &imported {
        println!("{:<24} {}", doc.doctype.as_str(), doc.name);
    }
    info!("Imported {} documents from {}", imported.len(), file.display());
    Ok(())
}

fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn print_table(output: &ReportOutput) {
    let headers: Vec<&str> = output.columns.iter().map(|c| c.label).collect();
    let rows: Vec<Vec<String>> = output
        .rows
        .iter()
        .map(|row| {
            output
                .columns
                .iter()
                .map(|c| cell(row.get(c.fieldname)))
                .collect()
        })
        .collect();
    let widths: Vec<usize> = headers
        .iter()
        .enumerate()
        .map(|(i, header)| {
            rows.iter()
                .map(|row| row[i].chars().count())
                .chain(std::iter::once(header.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let line = |cells: Vec<&str>| {
        let padded: Vec<String> = cells
            .iter()
            .zip(&widths)
            .map(|(cell, width)| format!("{cell:<width$}"))
            .collect();
        println!("{}", padded.join("  ").trim_end());
    };

    println!("{}", output.report);
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    line(headers);
    line(rule.iter().map(String::as_str).collect());
    for row in &rows {
        line(row.iter().map(String::as_str).collect());
    }
    if rows.is_empty() {
        println!("(no rows)");
    }
}

fn handle_report(config: &Config, cmd: ReportCommand) -> anyhow::Result<()> {
    match cmd {
        ReportCommand::List => {
            for report in Report::ALL {
                println!("{:<44} {}", report.title(), report.slug());
            }
        }
        ReportCommand::Run {
            name,
            filters,
            format,
        } => {
            let report: Report = name.parse()?;
            let filters =
                ReportFilters::from_pairs(filters.iter().map(|(k, v)| (k.as_str(), v.as_str())))?;
            let storage = open_storage(config)?;
            let output = report.run(&storage, &filters)?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&output)?),
                OutputFormat::Table => print_table(&output),
            }
        }
    }
    Ok(())
}

fn handle_permissions(config: &Config, cmd: PermissionsCommand) -> anyhow::Result<()> {
    let storage = open_storage(config)?;
    let site = Site::from_config(config)?;
    let value = match cmd {
        PermissionsCommand::Filters { doctype, user } => {
            let desk = Desk::open(&storage, &site, &user)?;
            serde_json::to_value(desk.resolver().permission_filters(&doctype, &user)?)?
        }
        PermissionsCommand::Check {
            doctype,
            name,
            user,
        } => {
            let desk = Desk::open(&storage, &site, &user)?;
            let doctype: DocType = doctype.parse()?;
            serde_json::to_value(desk.resolver().check_document_access(doctype, &name, &user)?)?
        }
        PermissionsCommand::Mappings => {
            let desk = Desk::open(&storage, &site, ADMINISTRATOR)?;
            serde_json::to_value(desk.resolver().configured_doctypes())?
        }
    };
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

fn handle_status(config: &Config, json: bool) -> anyhow::Result<()> {
    let storage = open_storage(config)?;
    let stats = storage.stats()?;
    if json {
        let status = serde_json::json!({
            "database_path": config.database_path(),
            "stats": stats,
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        println!("assetlite status");
        println!("----------------");
        println!("Database:      {}", config.database_path().display());
        println!("Size:          {} bytes", stats.db_size_bytes);
        println!("Files:         {}", stats.total_files);
        println!("Documents:     {}", stats.total_documents);
        for (doctype, count) in &stats.by_doctype {
            println!("  {doctype:<24} {count}");
        }
    }
    Ok(())
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Storage]");
                println!("  Database path:      {}", config.database_path().display());
                println!();
                println!("[Server]");
                println!("  Bind address:       {}", config.server.bind_address);
                println!("  User header:        {}", config.server.user_header);
                println!("  Request timeout:    {}s", config.server.request_timeout_secs);
                println!("  Shutdown timeout:   {}s", config.server.shutdown_timeout_secs);
                println!();
                println!("[Site]");
                println!("  URL:                {}", config.site.url);
                println!("  Default language:   {}", config.site.default_language);
                println!();
                println!("[Permissions]");
                println!("  Mappings:           {}", config.permissions.mappings.len());
                println!("  Role grants:        {}", config.permissions.roles.len());
                println!("  Home pages:         {}", config.permissions.home_pages.len());
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)).and_then(|c| c.validate()) {
                Ok(()) => println!("Configuration is valid."),
                Err(e) => bail!("Configuration error: {e}"),
            }
        }
    }
    Ok(())
}
