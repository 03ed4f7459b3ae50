use chrono::Local;
use clap::{Parser, Subcommand};
use dining_assistant::analysis::analyze_meal;
use dining_assistant::calculator::{calculate_targets, ActivityLevel, BodyProfile, Sex};
use dining_assistant::halls::portal_date;
use dining_assistant::plan::{selected_menu_summary, MealPlanRequest, MealPlanner};
use dining_assistant::providers::{LlmProvider, ProviderFactory};
use dining_assistant::summary::menu_summary;
use dining_assistant::{server, AppConfig, DiningError, MenuPortal};
use log::{debug, error};
use std::process::ExitCode;
use std::sync::Arc;

/// Dining hall menus, nutrition facts and LLM meal recommendations.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
    /// List the configured dining halls and their meal periods
    Halls,
    /// Print one menu
    Menu {
        /// Dining hall name, e.g. "Busch Dining Hall"
        #[arg(long)]
        hall: String,
        /// Meal period as the portal spells it, e.g. "Lunch" or "Knight+Room"
        #[arg(long)]
        period: String,
        /// Date as M/D/YYYY; defaults to today
        #[arg(long)]
        date: Option<String>,
        /// Print the full menu as JSON instead of a summary
        #[arg(long)]
        json: bool,
    },
    /// Print the nutrition facts behind a nutrition-detail link
    Nutrition { link: String },
    /// Estimate nutrition for a free-text meal description
    Analyze { description: String },
    /// Generate a one-day meal plan
    Plan {
        #[arg(long, default_value = "")]
        restrictions: String,
        #[arg(long, default_value = "")]
        calorie_limit: String,
        #[arg(long, default_value = "")]
        avoid: String,
        #[arg(long, default_value = "")]
        maintenance: String,
        /// lose, maintain, gain or muscle
        #[arg(long, default_value = "maintain")]
        goal: String,
        #[arg(long, default_value = "")]
        height: String,
        #[arg(long, default_value = "")]
        weight: String,
        /// Build the plan from today's menu at this hall
        #[arg(long, requires = "period")]
        hall: Option<String>,
        #[arg(long)]
        period: Option<String>,
    },
    /// Calculate BMR, TDEE and macro targets
    Targets {
        #[arg(long)]
        age: u32,
        /// male or female
        #[arg(long)]
        sex: Sex,
        /// e.g. 5'10" or 178cm
        #[arg(long)]
        height: String,
        /// e.g. 170lbs or 77kg
        #[arg(long)]
        weight: String,
        /// sedentary, light, moderate, active or veryActive
        #[arg(long, default_value = "moderate")]
        activity: ActivityLevel,
    },
}

fn logger_init(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();
}

fn provider(config: &AppConfig) -> Result<Arc<dyn LlmProvider>, DiningError> {
    Ok(Arc::from(ProviderFactory::create(&config.llm)?))
}

fn today() -> String {
    portal_date(Local::now().date_naive())
}

async fn run(command: Command, mut config: AppConfig) -> Result<(), DiningError> {
    match command {
        Command::Serve { host, port } => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            server::serve(&config).await?;
        }
        Command::Halls => {
            let portal = MenuPortal::from_config(&config.portal)?;
            for hall in portal.registry().halls() {
                println!("{}: {}", hall.name, hall.meal_periods.join(", "));
            }
        }
        Command::Menu {
            hall,
            period,
            date,
            json,
        } => {
            let portal = MenuPortal::from_config(&config.portal)?;
            let date = date.unwrap_or_else(today);
            let menu = portal.fetch_menu(&hall, &date, &period).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&menu)?);
            } else {
                print!("{}", menu_summary(&menu));
            }
        }
        Command::Nutrition { link } => {
            let portal = MenuPortal::from_config(&config.portal)?;
            let facts = portal.fetch_nutrition(&link).await?;
            println!("{}", serde_json::to_string_pretty(&facts)?);
        }
        Command::Analyze { description } => {
            let provider = provider(&config)?;
            let analysis = analyze_meal(provider.as_ref(), &description).await?;
            println!("{}", serde_json::to_string_pretty(&analysis)?);
        }
        Command::Plan {
            restrictions,
            calorie_limit,
            avoid,
            maintenance,
            goal,
            height,
            weight,
            hall,
            period,
        } => {
            let request = MealPlanRequest {
                dietary_restrictions: restrictions,
                calorie_limit,
                avoid_foods: avoid,
                maintenance_calories: maintenance,
                goal,
                height,
                weight,
                selected_dining_hall: hall,
                selected_meal_period: period,
            };
            let portal = MenuPortal::from_config(&config.portal)?;
            let summary = selected_menu_summary(&portal, &request, &today()).await;
            let plan = MealPlanner::new(provider(&config)?)
                .generate(&request, summary.as_deref())
                .await;
            debug!("Simulated plan: {}", plan.simulated);
            println!("{}", plan.meal_plan);
        }
        Command::Targets {
            age,
            sex,
            height,
            weight,
            activity,
        } => {
            let targets = calculate_targets(&BodyProfile {
                age,
                sex,
                height,
                weight,
                activity_level: activity,
            })?;
            println!("{}", serde_json::to_string_pretty(&targets)?);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    logger_init(args.verbose);

    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            error!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match run(args.command, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
