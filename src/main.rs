//! Command-line interface for xmlschema-identity

#[cfg(feature = "cli")]
use clap::{Parser, Subcommand};

#[cfg(feature = "cli")]
use std::path::PathBuf;

#[cfg(feature = "cli")]
use xmlschema_identity::loaders::Loader;
#[cfg(feature = "cli")]
use xmlschema_identity::validators::{validate_identities, ValidationSettings, XsdSchema};

#[cfg(feature = "cli")]
#[derive(Parser, Debug)]
#[command(name = "xmlschema-identity")]
#[command(author, version, about = "XML Schema identity constraint checker", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[cfg(feature = "cli")]
#[derive(Subcommand, Debug)]
enum Commands {
    /// Check the key, unique and keyref constraints of an XML document
    Validate {
        /// Path to the JSON schema model
        #[arg(short, long, value_name = "SCHEMA")]
        schema: PathBuf,

        /// Path to the XML file to validate
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Output events as a JSON array
        #[arg(short, long)]
        json: bool,

        /// Allocate fresh field matchers for every selector match
        #[arg(long)]
        no_axis_reuse: bool,
    },
}

#[cfg(feature = "cli")]
fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Validate {
            schema,
            file,
            json,
            no_axis_reuse,
        } => cmd_validate(schema, file, json, no_axis_reuse),
    };

    match result {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(2);
        }
    }
}

/// Returns whether the document is valid
#[cfg(feature = "cli")]
fn cmd_validate(
    schema_path: PathBuf,
    file: PathBuf,
    json_output: bool,
    no_axis_reuse: bool,
) -> Result<bool, Box<dyn std::error::Error>> {
    let schema = XsdSchema::from_file(&schema_path)?;
    let settings = ValidationSettings::new().with_axis_reuse(!no_axis_reuse);
    let xml = Loader::new().with_limits(settings.limits.clone()).load(&file)?;

    let events = validate_identities(&schema, &xml, &settings)?;
    let valid = !events.iter().any(|event| event.is_error());

    if json_output {
        println!("{}", serde_json::to_string_pretty(&events)?);
    } else {
        for event in &events {
            println!("{}", event);
        }
        if valid {
            println!("✓ Identity constraints satisfied");
        } else {
            println!("✗ Identity constraints violated");
        }
    }

    Ok(valid)
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI feature not enabled. Rebuild with --features cli");
    std::process::exit(1);
}
