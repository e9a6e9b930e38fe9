use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use papernet_auth::config::{DEFAULT_BIND, JWT_KEY_ENV};
use papernet_auth::{
    DatabaseConfig, ServiceConfig, UserRepository, UserService, UserStore, create_app,
    create_connection, create_router, ensure_schema,
};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "papernet-auth")]
#[command(about = "Papernet identity and access-control service")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ConfigArgs {
    #[arg(long, env = "SURREALDB_URL", default_value = "memory")]
    db_url: String,
    /// HS256 signing key for bearer tokens
    #[arg(long, env = JWT_KEY_ENV, hide_env_values = true, default_value = "")]
    jwt_key: String,
    /// Validity window of issued tokens
    #[arg(long, default_value_t = 60)]
    token_validity_days: i64,
    /// Deadline for each storage operation
    #[arg(long, default_value_t = 5000)]
    storage_timeout_ms: u64,
}

impl ConfigArgs {
    fn into_config(self, bind: Option<String>) -> ServiceConfig {
        ServiceConfig {
            bind: bind.unwrap_or_else(|| DEFAULT_BIND.to_string()),
            database: DatabaseConfig {
                url: self.db_url,
                ..Default::default()
            },
            jwt_key: self.jwt_key,
            token_validity_days: self.token_validity_days,
            storage_timeout_ms: self.storage_timeout_ms,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Bind address, e.g. 0.0.0.0:1705
        #[arg(long, default_value = DEFAULT_BIND)]
        bind: String,
        #[command(flatten)]
        config: ConfigArgs,
    },
    /// Initialize the database
    Init {
        #[command(flatten)]
        config: ConfigArgs,
    },
    /// Create a user, or update the one with this email
    CreateUser {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long, default_value_t = false)]
        admin: bool,
        #[command(flatten)]
        config: ConfigArgs,
    },
    /// List all users
    ListUsers {
        #[command(flatten)]
        config: ConfigArgs,
    },
    /// Print a bearer token for a user id
    IssueToken {
        user_id: String,
        #[command(flatten)]
        config: ConfigArgs,
    },
}

async fn open_store(config: &ServiceConfig) -> Result<Arc<dyn UserRepository>> {
    info!("Using database url: {}", config.database.url);
    let db = create_connection(config.database.clone()).await?;
    ensure_schema(&db).await?;
    Ok(Arc::new(UserStore::new(db).with_timeout(config.storage_timeout())))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("papernet_auth=info".parse()?)
                .add_directive("surrealdb=warn".parse()?),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { bind, config } => {
            let config = config.into_config(Some(bind));
            info!("Using database url for server: {}", config.database.url);

            let state = create_app(&config).await?;
            let app = create_router(state);

            let listener = tokio::net::TcpListener::bind(&config.bind).await?;
            info!("Identity server listening on http://{}", config.bind);

            axum::serve(listener, app).await?;
        }
        Commands::Init { config } => {
            let config = config.into_config(None);
            info!("Initializing database...");
            let db = create_connection(config.database).await?;
            ensure_schema(&db).await?;
            info!("Database initialized successfully");
        }
        Commands::CreateUser {
            name,
            email,
            admin,
            config,
        } => {
            let config = config.into_config(None);
            let codec = config.token_codec()?;
            let service = UserService::new(open_store(&config).await?, codec);

            let user = service.ensure_user(&name, &email, admin).await?;

            println!("User saved.");
            println!();
            println!("  Id:     {}", user.id);
            println!("  Name:   {}", user.name);
            println!("  Email:  {}", user.email);
            println!("  Admin:  {}", user.is_admin);
        }
        Commands::ListUsers { config } => {
            let config = config.into_config(None);
            let users = open_store(&config).await?.list().await?;

            if users.is_empty() {
                println!("No users found.");
                return Ok(());
            }

            println!(
                "{:<8} {:<20} {:<30} {:<6} {:<8}",
                "ID", "NAME", "EMAIL", "ADMIN", "OWNS"
            );
            println!("{}", "-".repeat(76));

            for user in users {
                println!(
                    "{:<8} {:<20} {:<30} {:<6} {:<8}",
                    user.id,
                    user.name,
                    user.email,
                    if user.is_admin { "yes" } else { "no" },
                    user.owns.len()
                );
            }
        }
        Commands::IssueToken { user_id, config } => {
            let config = config.into_config(None);
            let token = config.token_codec()?.encode(&user_id)?;
            println!("{}", token);
        }
    }

    Ok(())
}
