/******************************************************************************
 * COUNTRIES CLI ENTRY POINT
 *
 * Thin command line front end over CountryRepository. Each subcommand runs
 * exactly one repository operation against the configured database.
 ******************************************************************************/

use anyhow::{ bail, Context, Result };
use clap::{ Parser, Subcommand };

use countries::{
    db::{ Database, DbConfig },
    utils::logging::{ log_activity, log_debug, log_error },
    Country,
    CountryBatchRepository,
    CountryQuery,
    CountryRepository,
};

const DEFAULT_BATCH_SIZE: usize = 100;

/// Country table data-access CLI
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Database URL (overrides DATABASE_URL)
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Repository operation to run
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List every country ordered by name
    List {
        /// Read through an explicitly acquired connection
        #[arg(long)]
        raw: bool,
    },
    /// Find countries whose name matches a LIKE pattern
    Find {
        pattern: String,
    },
    /// Look up one country by id
    Get {
        id: i64,
    },
    /// Countries with a population inside [min, max]
    Population {
        min: i32,
        max: i32,
        /// Bind the bounds as named parameters
        #[arg(long)]
        named: bool,
    },
    /// Count all countries
    Count,
    /// Insert a country and print its generated id
    Insert {
        name: String,
        population: i32,
    },
    /// Change the population of one country
    SetPopulation {
        id: i64,
        population: i32,
    },
    /// Delete every country
    DeleteAll {
        /// Skip the confirmation guard
        #[arg(long)]
        yes: bool,
    },
    /// Count countries by name through the stored procedure
    Procedure {
        name: String,
    },
    /// Count countries by name through the stored function
    Function {
        name: String,
    },
    /// Insert generated countries in batches
    Load {
        count: usize,
        #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
        batch_size: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file if present
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // Parse command line arguments
    let cli = Cli::parse();

    let db_config = match &cli.database_url {
        Some(url) => {
            let url = url.clone();
            DbConfig::from_vars(|key| {
                if key == "DATABASE_URL" { Some(url.clone()) } else { std::env::var(key).ok() }
            })
        }
        None => DbConfig::from_env(),
    }.context("Failed to get database configuration")?;

    // Connect to the database
    let db = Database::connect(db_config).await.context("Failed to connect to database")?;
    let repository = CountryRepository::new(db.pool().clone());

    let outcome = run(&cli, &repository).await;
    db.close().await;

    if let Err(err) = &outcome {
        log_error("countries", "command failed", &**err);
    }
    outcome
}

async fn run(cli: &Cli, repository: &CountryRepository) -> Result<()> {
    log_debug("countries", "running command", &cli.command);

    match &cli.command {
        Command::List { raw } => {
            let countries = if *raw {
                repository.find_all_raw().await?
            } else {
                repository.find_all().await?
            };
            print_countries(&countries, cli.json)?;
        }
        Command::Find { pattern } => {
            let countries = repository.find_by_name(pattern).await?;
            print_countries(&countries, cli.json)?;
        }
        Command::Get { id } => {
            match repository.find_by_id(*id).await? {
                Some(country) => print_countries(&[country], cli.json)?,
                None => bail!("No country with id {}", id),
            }
        }
        Command::Population { min, max, named } => {
            let countries = if *named {
                repository.find_by_population_query(&CountryQuery::new(*min, *max)).await?
            } else {
                repository.find_by_population(*min, *max).await?
            };
            print_countries(&countries, cli.json)?;
        }
        Command::Count => {
            println!("{}", repository.count().await?);
        }
        Command::Insert { name, population } => {
            let id = repository.insert_with_generated_key(name, *population).await?;
            log_activity("countries", "inserted", Some(&format!("{} (id {})", name, id)));
            println!("{}", id);
        }
        Command::SetPopulation { id, population } => {
            let updated = repository.update_population(*id, *population).await?;
            if updated == 0 {
                bail!("No country with id {}", id);
            }
            println!("{}", updated);
        }
        Command::DeleteAll { yes } => {
            if !yes {
                bail!("Refusing to delete every country without --yes");
            }
            println!("{}", repository.delete_all().await?);
        }
        Command::Procedure { name } => {
            println!("{}", repository.call_procedure(name).await?);
        }
        Command::Function { name } => {
            println!("{}", repository.call_function(name).await?);
        }
        Command::Load { count, batch_size } => {
            let countries: Vec<Country> = (1..=*count)
                .map(|i| Country::new(format!("Country {}", i), i32::try_from(i).unwrap_or(i32::MAX)))
                .collect();
            repository.insert_batch(&countries, *batch_size).await?;
            println!("{}", repository.count().await?);
        }
    }

    Ok(())
}

fn print_countries(countries: &[Country], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(countries)?);
        return Ok(());
    }

    for country in countries {
        let id = country.id.map(|id| id.to_string()).unwrap_or_else(|| "-".to_string());
        println!("{:>6}  {:<32} {:>12}", id, country.name, country.population);
    }
    Ok(())
}
