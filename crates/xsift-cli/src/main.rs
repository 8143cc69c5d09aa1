use std::io::{self, Read, Write};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use xsift::{FilterSpec, Validation, ValidationKind, XmlParser};

#[derive(Debug, Parser)]
#[command(
    name = "xsift",
    version,
    about = "Parse, validate and filter XML documents"
)]
struct Args {
    /// Input file (defaults to stdin)
    #[arg(value_name = "INPUT")]
    input: Option<PathBuf>,
    /// Validation to apply (requires --schema unless none)
    #[arg(long, value_enum, default_value = "none")]
    validate: ValidateArg,
    /// Schema file (DTD or XSD, depending on --validate)
    #[arg(long, value_name = "SCHEMA")]
    schema: Option<PathBuf>,
    /// Keep only elements with this name
    #[arg(long, value_name = "NAME")]
    filter_root: Option<String>,
    /// Required attribute for filtered entries, as key=value (repeatable)
    #[arg(long = "attr", value_name = "KEY=VALUE")]
    attrs: Vec<String>,
    /// Output file (defaults to stdout)
    #[arg(short, long, value_name = "OUTPUT")]
    output: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ValidateArg {
    None,
    Dtd,
    Xsd,
}

impl From<ValidateArg> for ValidationKind {
    fn from(value: ValidateArg) -> Self {
        match value {
            ValidateArg::None => Self::None,
            ValidateArg::Dtd => Self::Dtd,
            ValidateArg::Xsd => Self::Xsd,
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let input_data = read_input(&args.input)?;

    let schema_data = match &args.schema {
        Some(path) => Some(
            std::fs::read_to_string(path)
                .with_context(|| format!("failed to read schema file {}", path.display()))?,
        ),
        None => None,
    };
    let validation = Validation::from_kind(args.validate.into(), schema_data.as_deref())
        .context("invalid validation configuration")?;
    let parser = XmlParser::with_validation(validation);

    let doc = match build_filter(&args)? {
        Some(spec) => parser.parse_filtered(&input_data, &spec),
        None => parser.parse(&input_data),
    }
    .context("failed to parse input")?;

    let mut output = xsift::write(&doc);
    output.push('\n');
    write_output(&args.output, output.as_bytes())?;
    Ok(())
}

fn build_filter(args: &Args) -> Result<Option<FilterSpec>> {
    let Some(root) = &args.filter_root else {
        if !args.attrs.is_empty() {
            bail!("--attr requires --filter-root");
        }
        return Ok(None);
    };

    let mut spec = FilterSpec::new(root).context("invalid filter")?;
    for attr in &args.attrs {
        let Some((key, value)) = attr.split_once('=') else {
            bail!("invalid --attr value (expected key=value): {attr}");
        };
        spec = spec.with_attr(key, value);
    }
    Ok(Some(spec))
}

fn read_input(path: &Option<PathBuf>) -> Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read input file {}", path.display())),
        None => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .context("failed to read stdin")?;
            if buffer.trim().is_empty() {
                bail!("no input provided on stdin");
            }
            Ok(buffer)
        }
    }
}

fn write_output(path: &Option<PathBuf>, data: &[u8]) -> Result<()> {
    match path {
        Some(path) => std::fs::write(path, data)
            .with_context(|| format!("failed to write output file {}", path.display())),
        None => {
            io::stdout()
                .write_all(data)
                .context("failed to write stdout")?;
            Ok(())
        }
    }
}
