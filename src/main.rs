use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use dotenvy::dotenv;
use tokio::io::{AsyncBufReadExt, BufReader};

use storefront_client::auth::{Credentials, LoginRequest, RegisterRequest, Scope};
use storefront_client::catalog::{FilterPatch, NewReview, reviews_for_variant};
use storefront_client::common::{ChatEvent, SenderType};
use storefront_client::config::{self, AppConfig};
use storefront_client::error::{ClientError, Result};
use storefront_client::network::{ApiClient, ChatHandle, SessionOptions, WsConnector};
use storefront_client::storage::{SessionStore, ensure_parent_dir};
use storefront_client::ui::{AppState, Surface, render};

#[derive(Parser)]
#[command(
    name = "storefront",
    version,
    about = "Terminal client for the storefront API"
)]
struct Cli {
    /// Path to JSON config file
    #[arg(long, default_value = config::DEFAULT_CONFIG_PATH, value_name = "FILE")]
    config: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List one page of products, optionally filtered
    Products(ProductsArgs),
    /// Show reviews of a product
    Reviews {
        product_id: String,
        /// Only reviews for this variant and size
        #[arg(long, requires = "size_variant")]
        variant: Option<String>,
        #[arg(long)]
        size_variant: Option<String>,
    },
    /// Submit a review (requires login)
    Review {
        product_id: String,
        variant_id: String,
        size_variant_id: String,
        #[arg(long)]
        rating: u8,
        #[arg(long)]
        comment: String,
    },
    Login {
        email: String,
        password: String,
    },
    Register {
        name: String,
        email: String,
        password: String,
    },
    AdminLogin {
        email: String,
        password: String,
    },
    /// Check that the stored admin session is still valid
    AdminCheck,
    /// Forget the stored user session
    Logout,
    /// Open the support chat
    Chat,
}

#[derive(Args)]
struct ProductsArgs {
    #[arg(long, default_value_t = 1)]
    page: u32,
    #[arg(long)]
    limit: Option<u32>,
    #[arg(long)]
    min_price: Option<f64>,
    #[arg(long)]
    max_price: Option<f64>,
    #[arg(long = "category")]
    categories: Vec<String>,
    #[arg(long = "gender")]
    genders: Vec<String>,
    /// Rating bucket (floor of the product rating)
    #[arg(long = "rating")]
    ratings: Vec<u8>,
    /// Minimum discount percentage
    #[arg(long = "discount")]
    discounts: Vec<u8>,
}

impl ProductsArgs {
    fn patch(&self) -> FilterPatch {
        let mut patch = FilterPatch::default()
            .categories(self.categories.iter().cloned())
            .genders(self.genders.iter().cloned())
            .ratings(self.ratings.iter().copied())
            .discounts(self.discounts.iter().copied());
        if self.min_price.is_some() || self.max_price.is_some() {
            patch = patch.price_range(
                self.min_price.unwrap_or(0.0),
                self.max_price.unwrap_or(f64::INFINITY),
            );
        }
        patch
    }
}

#[tokio::main]
async fn main() {
    dotenv().ok();
    env_logger::init();

    let cli = Cli::parse();
    let mut app_config = config::load_config(&cli.config);
    app_config.apply_env_overrides();

    let mut state = AppState::new();
    if let Err(err) = run(cli.command, &app_config, &mut state).await {
        log::error!("Command failed: {err}");
    }
    for notification in &state.notifications {
        eprintln!("{}", render::notification_line(notification));
    }
}

async fn run(command: Command, app_config: &AppConfig, state: &mut AppState) -> Result<()> {
    ensure_parent_dir(&app_config.database_path)
        .map_err(|err| ClientError::Config(format!("cannot create data directory: {err}")))?;
    let sessions = SessionStore::open(&app_config.database_path)?;
    let api = authorized_client(app_config, &sessions)?;

    match command {
        Command::Products(args) => {
            match api.products(args.page, args.limit.unwrap_or(app_config.page_limit)).await {
                Ok(page) => {
                    state.set_page(page);
                    state.update_filter(args.patch());
                    for product in state.visible_products() {
                        println!("{}", render::product_line(&product));
                    }
                    println!("page {}/{}", state.current_page, state.total_pages);
                }
                Err(err) => state.report_error(Surface::Storefront, &err),
            }
        }
        Command::Reviews {
            product_id,
            variant,
            size_variant,
        } => match api.reviews(&product_id).await {
            Ok(reviews) => {
                let shown = match (variant.as_deref(), size_variant.as_deref()) {
                    (Some(variant), Some(size)) => reviews_for_variant(&reviews, variant, size),
                    _ => reviews.iter().collect(),
                };
                println!("{}", render::reviews_summary(&shown));
                for review in shown {
                    println!("{}", render::review_line(review));
                }
            }
            Err(err) => state.report_error(Surface::Storefront, &err),
        },
        Command::Review {
            product_id,
            variant_id,
            size_variant_id,
            rating,
            comment,
        } => {
            let review = NewReview {
                product_id,
                variant_id,
                size_variant_id,
                rating,
                comment,
            };
            match api.add_review(&review).await {
                Ok(()) => println!("Review submitted"),
                Err(err) => state.report_error(Surface::Storefront, &err),
            }
        }
        Command::Login { email, password } => {
            match api.login(&LoginRequest { email, password }).await {
                Ok(credentials) => {
                    // A chat id remembered for a previous user must not carry over
                    sessions.clear_user_session()?;
                    sessions.save_credentials(&credentials)?;
                    println!("Logged in");
                }
                Err(err) => state.report_error(Surface::Storefront, &err),
            }
        }
        Command::Register {
            name,
            email,
            password,
        } => match api.register(&RegisterRequest { name, email, password }).await {
            Ok(()) => println!("Account created, you can log in now"),
            Err(err) => state.report_error(Surface::Storefront, &err),
        },
        Command::AdminLogin { email, password } => {
            match api.admin_login(&LoginRequest { email, password }).await {
                Ok(credentials) => {
                    sessions.save_credentials(&credentials)?;
                    println!("Admin logged in");
                }
                Err(err) => state.report_error(Surface::Admin, &err),
            }
        }
        Command::AdminCheck => match api.verify_admin_session().await {
            Ok(()) => println!("Admin session is valid"),
            Err(err) => {
                if err.is_unauthorized() {
                    sessions.clear_credentials(Scope::Admin)?;
                }
                state.report_error(Surface::Admin, &err);
            }
        },
        Command::Logout => {
            sessions.clear_user_session()?;
            println!("Logged out");
        }
        Command::Chat => {
            let Some(Credentials {
                user_id: Some(user_id),
                ..
            }) = sessions.credentials(Scope::User)?
            else {
                return Err(ClientError::MissingCredentials);
            };
            run_chat(api, app_config, &sessions, state, user_id).await?;
        }
    }

    Ok(())
}

fn authorized_client(app_config: &AppConfig, sessions: &SessionStore) -> Result<ApiClient> {
    let mut api = ApiClient::new(&app_config.api_base_url, app_config.request_timeout())?;
    if let Some(credentials) = sessions.credentials(Scope::User)? {
        api = api.with_user_token(credentials.token);
    }
    if let Some(credentials) = sessions.credentials(Scope::Admin)? {
        api = api.with_admin_token(credentials.token);
    }
    Ok(api)
}

async fn run_chat(
    api: ApiClient,
    app_config: &AppConfig,
    sessions: &SessionStore,
    state: &mut AppState,
    user_id: String,
) -> Result<()> {
    let options = SessionOptions {
        user_id,
        sender_type: SenderType::User,
        reconnect: app_config.reconnect,
        known_chat_id: sessions.chat_id()?,
    };
    let mut handle = ChatHandle::spawn(
        WsConnector::new(&app_config.socket_url),
        Arc::new(api),
        options,
    );
    handle.open_view().await?;
    println!("Type a message and press enter. Ctrl-D to leave.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Ok(Some(line)) = line else {
                    break;
                };
                match handle.send(line.trim()).await {
                    Ok(()) => {}
                    Err(ClientError::Validation(err)) => println!("-- {err}"),
                    Err(err) => return Err(err),
                }
            }
            event = handle.next_event() => {
                let Some(event) = event else {
                    break;
                };
                show_chat_event(&event, state);
                if let ChatEvent::SessionAssigned(chat_id) = &event {
                    sessions.save_chat_id(chat_id)?;
                }
                state.apply_chat_event(event);
            }
        }
    }

    let failed = state.failed_sends();
    if failed > 0 {
        println!("-- {failed} message(s) could not be sent");
    }
    handle.close().await
}

fn show_chat_event(event: &ChatEvent, state: &AppState) {
    match event {
        ChatEvent::TranscriptUpdated(entries) => {
            for line in render::transcript_changes(&state.transcript, entries) {
                println!("{line}");
            }
        }
        ChatEvent::ConnectionChanged(connection) => {
            println!("-- {}", render::connection_line(*connection));
        }
        ChatEvent::SessionAssigned(_) => {}
        ChatEvent::Unavailable { attempts } => {
            println!("-- chat unavailable after {attempts} attempts");
        }
        ChatEvent::Notice(message) => println!("-- {message}"),
    }
}
