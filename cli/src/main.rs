use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use argschema_core::{
    ArgMapper, Capabilities, Command, HelpCommand, HelpStyle, Outcome, Populator, Schema,
    load_schema, load_value,
};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use serde_json::Value;
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Serialization format for configuration objects.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum DataFormat {
    Json,
    Yaml,
}

/// Output format of the `tags` listing.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum TagFormat {
    Table,
    Json,
    Yaml,
}

#[derive(Debug, Parser)]
#[command(name = "argschema")]
#[command(version)]
#[command(about = "Inspect and exercise schema-driven command lines")]
#[command(disable_help_subcommand = true)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Debug, Subcommand)]
enum CliCommand {
    /// Render the help or usage text of a schema.
    Help(HelpArgs),
    /// Parse command-line tokens against a schema and print the validated result.
    Parse(ParseArgs),
    /// Validate and complete a JSON or YAML data file.
    Validate(ValidateArgs),
    /// List the command-line tags a schema compiles to.
    Tags(TagsArgs),
}

#[derive(Debug, Args)]
struct StyleArgs {
    /// Maximum line width of rendered help.
    #[arg(long, default_value_t = 80)]
    width: usize,
    /// Program name shown in usage lines (default: schema file name).
    #[arg(long)]
    name: Option<String>,
}

#[derive(Debug, Args)]
struct HelpArgs {
    /// Schema file (.json, otherwise YAML).
    schema: PathBuf,
    /// Help level; higher levels show more advanced options.
    #[arg(long, default_value_t = 0)]
    level: u32,
    /// Render the compact usage line instead of the full help.
    #[arg(long)]
    usage: bool,
    #[command(flatten)]
    style: StyleArgs,
}

#[derive(Debug, Args)]
struct ParseArgs {
    /// Schema file (.json, otherwise YAML).
    schema: PathBuf,
    /// Output format of the configuration object.
    #[arg(long, default_value = "json")]
    format: DataFormat,
    #[command(flatten)]
    style: StyleArgs,
    /// Tokens to parse, after `--`.
    #[arg(last = true)]
    tokens: Vec<String>,
}

#[derive(Debug, Args)]
struct ValidateArgs {
    /// Schema file (.json, otherwise YAML).
    schema: PathBuf,
    /// Data file to validate (.json, otherwise YAML).
    data: PathBuf,
    /// Output format of the completed object.
    #[arg(long, default_value = "json")]
    format: DataFormat,
}

#[derive(Debug, Args)]
struct TagsArgs {
    /// Schema file (.json, otherwise YAML).
    schema: PathBuf,
    #[arg(long, default_value = "table")]
    format: TagFormat,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        CliCommand::Help(args) => run_help(args),
        CliCommand::Parse(args) => run_parse(args),
        CliCommand::Validate(args) => run_validate(args),
        CliCommand::Tags(args) => run_tags(args),
    };

    if let Err(err) = result {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn read_schema(path: &Path) -> Result<Schema, String> {
    load_schema(path).map_err(|err| err.to_string())
}

/// `resize.schema.yaml` -> `resize`.
fn program_name(style: &StyleArgs, schema_path: &Path) -> String {
    style.name.clone().unwrap_or_else(|| {
        schema_path
            .file_name()
            .map(|name| name.to_string_lossy().split('.').next().unwrap_or_default().to_string())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| "command".to_string())
    })
}

fn run_help(args: HelpArgs) -> Result<(), String> {
    let schema = read_schema(&args.schema)?;
    let name = program_name(&args.style, &args.schema);
    let help = HelpCommand::from_schema(name, &schema);
    let style = HelpStyle::default().with_max_width(args.style.width);

    if args.usage {
        print!("{}", help.render_usage_with(args.level, &style));
    } else {
        print!("{}", help.render_help_with(args.level, &style));
    }
    Ok(())
}

fn run_parse(args: ParseArgs) -> Result<(), String> {
    let schema = read_schema(&args.schema)?;
    let name = program_name(&args.style, &args.schema);
    let style = HelpStyle::default().with_max_width(args.style.width);
    let command = Command::new(name).with_schema(schema).with_style(style);
    let caps = Capabilities::builtin();

    debug!(tokens = args.tokens.len(), "parsing");
    match command.run(args.tokens.as_slice(), &caps) {
        Ok(Outcome::Help(text) | Outcome::Usage(text)) => {
            print!("{text}");
            Ok(())
        }
        Ok(Outcome::Version(version)) => {
            println!("{version}");
            Ok(())
        }
        Ok(Outcome::Config { config, .. }) => print_value(&config, args.format),
        Err(err) => {
            if err.is_usage_error() {
                eprint!("{}", command.help(&[]).render_usage_with(0, &style));
            }
            Err(err.to_string())
        }
    }
}

fn run_validate(args: ValidateArgs) -> Result<(), String> {
    let schema = read_schema(&args.schema)?;
    let data = load_value(&args.data).map_err(|err| err.to_string())?;
    let caps = Capabilities::builtin();

    let config = Populator::new(&schema, &caps)
        .populate(data)
        .map_err(|err| format!("{} is invalid:\n{err}", args.data.display()))?;
    print_value(&config, args.format)
}

fn run_tags(args: TagsArgs) -> Result<(), String> {
    let schema = read_schema(&args.schema)?;
    let tags: BTreeMap<&str, &ArgMapper> = schema.tag_map().iter().collect();

    match args.format {
        TagFormat::Json => {
            let json = serde_json::to_string_pretty(&tags)
                .map_err(|err| format!("Failed to serialize tags: {err}"))?;
            println!("{json}");
        }
        TagFormat::Yaml => {
            let yaml = serde_yaml::to_string(&tags)
                .map_err(|err| format!("Failed to serialize tags: {err}"))?;
            print!("{yaml}");
        }
        TagFormat::Table => {
            let width = tags.keys().map(|tag| tag.len()).max().unwrap_or(4);
            for (tag, mapper) in &tags {
                let arity = if mapper.is_array { "..." } else { "" };
                println!(
                    "  {tag:<width$}  {}  {}{arity}",
                    mapper.path.join("."),
                    mapper.item.name(),
                );
            }
        }
    }
    Ok(())
}

fn print_value(value: &Value, format: DataFormat) -> Result<(), String> {
    match format {
        DataFormat::Json => {
            let json = serde_json::to_string_pretty(value)
                .map_err(|err| format!("Failed to serialize output: {err}"))?;
            println!("{json}");
        }
        DataFormat::Yaml => {
            let yaml = serde_yaml::to_string(value)
                .map_err(|err| format!("Failed to serialize output: {err}"))?;
            print!("{yaml}");
        }
    }
    Ok(())
}
