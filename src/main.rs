use clap::{Parser, Subcommand};
use medcase_lib::app::{AppContext, ExportOutput};
use medcase_lib::application::use_cases::export::ExportFormat;
use medcase_lib::infrastructure::config::DEFAULT_CONFIG_FILE;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(
    name = "medcase",
    about = "Prompt test bench and medical case generator",
    version
)]
struct Args {
    /// Optional TOML config file; environment variables override it
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP server (default)
    Serve,
    /// Validate OPENAI_API_KEY and request a short greeting
    CheckConnection,
    /// Export a stored medical case
    Export {
        #[arg(long)]
        case_id: i64,
        /// txt, html or json
        #[arg(short, long, default_value = "txt")]
        format: ExportFormat,
        /// File or directory to write to; stdout when omitted
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

#[actix_web::main]
async fn main() -> ExitCode {
    medcase_lib::init_tracing();
    let args = Args::parse();

    let context = match AppContext::bootstrap(&args.config).await {
        Ok(context) => context,
        Err(e) => {
            tracing::error!(error = %e, "Startup failed");
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => match context.serve().await {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("Error: {}", e);
                ExitCode::FAILURE
            }
        },
        Command::CheckConnection => match context.check_connection().await {
            Ok(report) => {
                if report.succeeded() {
                    println!("Connection successful: {}", report.check.message);
                    println!("Chat models: {}", report.models.join(", "));
                    if let Some(greeting) = &report.greeting {
                        println!("Received response: {}", greeting);
                    }
                    println!("Tokens used: {}", report.usage.total_tokens);
                    ExitCode::SUCCESS
                } else {
                    eprintln!(
                        "Error: {}",
                        report.error.as_deref().unwrap_or(&report.check.message)
                    );
                    ExitCode::FAILURE
                }
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                ExitCode::FAILURE
            }
        },
        Command::Export {
            case_id,
            format,
            out,
        } => match context.export(case_id, format, out).await {
            Ok(ExportOutput::Written(path)) => {
                println!("Exported case {} to {}", case_id, path.display());
                ExitCode::SUCCESS
            }
            Ok(ExportOutput::Rendered(content)) => {
                println!("{}", content);
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                ExitCode::FAILURE
            }
        },
    }
}
