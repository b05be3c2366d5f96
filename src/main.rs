use std::process::ExitCode;

use anyhow::Context as _;
use clap::Parser as _;

use cutforge::schema::SchemaError;
use cutforge::transcode::TranscodeError;

const EXIT_TRANSCODE: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let Err(err) = try_main().await else {
        return ExitCode::SUCCESS;
    };

    if let Some(schema_err) = err.chain().find_map(|e| e.downcast_ref::<SchemaError>()) {
        eprintln!("validation error: {schema_err}");
        return ExitCode::FAILURE;
    }

    eprintln!("error: {err:#}");
    if err.chain().any(|e| e.is::<TranscodeError>()) {
        return ExitCode::from(EXIT_TRANSCODE);
    }
    ExitCode::FAILURE
}

async fn try_main() -> anyhow::Result<()> {
    let cli = cutforge::cli::Cli::parse();
    cutforge::logging::init(cli.log_format).context("init logging")?;
    tracing::debug!(?cli, "parsed cli");

    match cli.command {
        cutforge::cli::Command::Compile(args) => {
            cutforge::compile::run(args).await.context("compile")?;
        }
        cutforge::cli::Command::Hash(args) => {
            cutforge::address::run(args).context("hash")?;
        }
        cutforge::cli::Command::Select(args) => {
            cutforge::review::run(args).await.context("select")?;
        }
        cutforge::cli::Command::NewCut(args) => {
            cutforge::scaffold::run(args).context("new-cut")?;
        }
    }

    Ok(())
}
