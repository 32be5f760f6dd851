use clap::Parser;
use fintrack_report::{
    build_prompt,
    config::AppConfig,
    dashboard::DashboardClient,
    error::ReportError,
    generation::create_backend,
    models::FinancialSummary,
    synthesizer::ReportSynthesizer,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Generate a FinTrack financial report from the command line
#[derive(Debug, Parser)]
#[command(name = "report", version)]
struct Cli {
    /// Total income in rupiah (reads the finance API when omitted)
    #[arg(long, requires = "expense")]
    income: Option<f64>,

    /// Total expense in rupiah
    #[arg(long, requires = "income")]
    expense: Option<f64>,

    /// Largest expense category
    #[arg(long)]
    category: Option<String>,

    /// Bearer token for the finance API
    #[arg(long, env = "FINTRACK_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Print the prompt and exit without calling the backend
    #[arg(long)]
    print_prompt: bool,

    /// Print the full outcome as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    dotenv::dotenv().ok();
    let cli = Cli::parse();
    let config = AppConfig::from_env()?;

    let summary = match (cli.income, cli.expense) {
        (Some(income), Some(expense)) => {
            FinancialSummary::new(income, expense, cli.category.clone().unwrap_or_default())
        }
        _ => {
            let base_url = config.dashboard_base_url.clone().ok_or_else(|| {
                ReportError::InvalidInput(
                    "pass --income/--expense or set DASHBOARD_API_BASE_URL".to_string(),
                )
            })?;
            let client = DashboardClient::new(base_url, config.generation.timeout)?;
            client.financial_summary(cli.token.as_deref()).await?
        }
    };

    info!(
        income = summary.whole_income(),
        expense = summary.whole_expense(),
        category = summary.top_category(),
        "Generating report"
    );

    if cli.print_prompt {
        println!("{}", build_prompt(&summary));
        return Ok(());
    }

    let backend = create_backend(&config.generation)?;
    let synthesizer = ReportSynthesizer::new(backend, config.generation.params.clone());
    let outcome = synthesizer.generate_report(&summary).await;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        println!("=== RINGKASAN ===\n{}\n", outcome.report.summary);
        println!("=== SARAN ===\n{}", outcome.report.advice);
        if outcome.source.is_fallback() {
            eprintln!("\n(report generation failed; showing fallback text)");
        }
    }

    Ok(())
}
