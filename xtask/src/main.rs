use std::path::PathBuf;

use anyhow::{bail, Context, Result as AnyResult};
use bq27z561::golden_image::{GoldenImage, ParseErrorKind};
use clap::{Parser, Subcommand};

use duct::{cmd, Expression};

/// Target used to make sure the driver stays `no_std`.
const EMBEDDED_TARGET: &str = "thumbv7em-none-eabihf";

#[derive(Debug, Subcommand)]
pub enum Subcommands {
    /// Runs tests.
    Test,

    /// Checks the project for errors.
    Check {
        /// Also check the driver for a bare-metal target.
        #[clap(long)]
        embedded: bool,
    },

    /// Builds the documentation.
    Doc {
        /// Whether to open the documentation in a browser.
        #[clap(long)]
        open: bool,
    },

    /// Runs extra checks (clippy).
    ExtraCheck,

    /// Parses a golden image and prints what it would do.
    Image {
        /// Path to the golden image.
        path: PathBuf,
    },
}

#[derive(Debug, Parser)]
#[clap(about, version, propagate_version = true)]
pub struct Cli {
    #[clap(subcommand)]
    pub subcommand: Subcommands,
}

fn cargo(args: &[&str]) -> Expression {
    println!("🛠️  Running command: cargo {}", args.join(" "));

    cmd("cargo", args)
}

fn checks(embedded: bool) -> AnyResult<()> {
    cargo(&["check", "--workspace"]).run()?;

    if embedded {
        cargo(&[
            "check",
            "-p",
            "bq27z561",
            &format!("--target={EMBEDDED_TARGET}"),
            "--features=defmt",
        ])
        .run()?;
    }

    Ok(())
}

fn docs(open: bool) -> AnyResult<()> {
    let mut args = vec!["doc", "-p", "bq27z561", "-p", "register-access", "--no-deps"];

    if open {
        args.push("--open");
    }

    cargo(&args).run()?;

    Ok(())
}

fn extra_checks() -> AnyResult<()> {
    cargo(&["fmt", "--check"]).run()?;
    cargo(&["clippy", "--workspace", "--features=log"]).run()?;

    Ok(())
}

fn test() -> AnyResult<()> {
    let packages = ["bq27z561", "register-access"];

    let mut args = vec!["test"];

    for p in packages {
        args.push("-p");
        args.push(p);
    }

    cargo(&args).run()?;

    Ok(())
}

fn image(path: PathBuf) -> AnyResult<()> {
    let script =
        std::fs::read(&path).with_context(|| format!("Failed to read {}", path.display()))?;

    match GoldenImage::new(&script).validate() {
        Ok(summary) => {
            println!(
                "✅ {}: {} writes, {} compares, {} delays ({} ms)",
                path.display(),
                summary.writes,
                summary.compares,
                summary.delays,
                summary.total_delay_ms
            );
            Ok(())
        }
        Err(error) => {
            let reason = match error.kind {
                ParseErrorKind::ColonExpected => "expected ':' after the opcode".to_string(),
                ParseErrorKind::Conversion => "malformed number".to_string(),
                ParseErrorKind::InsufficientBytes => "missing address, register or data".to_string(),
                ParseErrorKind::PayloadTooLong => "more than 31 data bytes".to_string(),
                ParseErrorKind::UnrecognizedOpcode(op) => {
                    format!("unrecognized opcode {:?}", char::from(op))
                }
            };
            bail!("{}:{}: {reason}", path.display(), error.line)
        }
    }
}

fn main() -> AnyResult<()> {
    let cli = Cli::parse();

    match cli.subcommand {
        Subcommands::Test => test(),
        Subcommands::Check { embedded } => checks(embedded),
        Subcommands::Doc { open } => docs(open),
        Subcommands::ExtraCheck => extra_checks(),
        Subcommands::Image { path } => image(path),
    }
}
