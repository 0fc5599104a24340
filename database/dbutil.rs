use anyhow::{ Context, Result };
use clap::{ Parser, ValueEnum };
use sqlx::postgres::PgPoolOptions;
use std::env;

use countries::db::script::{ execute_script, split_statements, DELETE_SQL, SCHEMA_SQL, SEED_SQL };

// Define valid operations
#[derive(Debug, Clone, ValueEnum)]
enum Operation {
    /// Create the table and stored routines
    Create,
    /// Drop the table and stored routines
    Delete,
    /// Empty the table and insert the reference rows
    Seed,
    /// Delete, create and seed
    Reset,
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Database utility for the countries schema")]
struct Args {
    /// Operation to perform
    #[arg(value_enum)]
    operation: Operation,

    /// Database URL (overrides .env)
    #[arg(long)]
    database_url: Option<String>,

    /// Skip confirmation prompts
    #[arg(long)]
    yes: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenv::dotenv().ok();

    // Parse command line arguments
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    // Get database URL
    let database_url = match &args.database_url {
        Some(url) => url.clone(),
        None => env::var("DATABASE_URL").context("DATABASE_URL environment variable not set")?,
    };

    log::debug!("Operation: {:?}", args.operation);

    let scripts: Vec<(&str, &str)> = match args.operation {
        Operation::Create => vec![("schema", SCHEMA_SQL)],
        Operation::Delete => vec![("delete", DELETE_SQL)],
        Operation::Seed => vec![("seed", SEED_SQL)],
        Operation::Reset => vec![("delete", DELETE_SQL), ("schema", SCHEMA_SQL), ("seed", SEED_SQL)],
    };

    let destructive = !matches!(args.operation, Operation::Create);
    if destructive && !args.yes && !confirm(&args.operation)? {
        println!("Aborted.");
        return Ok(());
    }

    // Connect to the database
    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect(&database_url).await
        .context("Failed to connect to database")?;

    println!("Connected to database.");

    for (label, sql) in scripts {
        if args.verbose {
            println!("Running {} script ({} statements)", label, split_statements(sql).len());
        }
        let executed = execute_script(&pool, sql).await.with_context(||
            format!("Failed to run {} script", label)
        )?;
        println!("Applied {} script: {} statements", label, executed);
    }

    pool.close().await;
    println!("Database operation completed successfully.");
    Ok(())
}

fn confirm(operation: &Operation) -> Result<bool> {
    println!("WARNING: {:?} removes existing country data.", operation);
    println!("Please type 'yes' to continue or any other input to abort:");

    let mut input = String::new();
    std::io::stdin().read_line(&mut input).context("Failed to read input")?;
    Ok(input.trim().eq_ignore_ascii_case("yes"))
}
