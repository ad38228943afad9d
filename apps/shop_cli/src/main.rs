use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use client_core::{
    config::{load_settings_from, DEFAULT_SETTINGS_FILE},
    AuthMethod, AuthSession, CompareAction, CompareSelection, FavoriteError, FavoritesTracker,
    FilterStateController, ListingStatus, PendingFetch, ProfileForm, Route, ShopApi, SignupForm,
};
use shared::{
    domain::{FacetGroup, LaptopId, SortOrder, MAX_PRICE},
    protocol::{FinderFilters, FinderRequest, LoginRequest, Product},
};
use storage::{KeyValueStore, Storage};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "shop", about = "Laptop shop client")]
struct Cli {
    #[arg(long, default_value = DEFAULT_SETTINGS_FILE)]
    config: PathBuf,
    /// Overrides `api_base_url` from the settings file.
    #[arg(long)]
    api_url: Option<String>,
    #[arg(long)]
    store_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Browse the listing. Facet flags toggle selections on top of `--query`.
    List {
        /// Canonical query string, e.g. `brand=HP&page=2`.
        #[arg(long)]
        query: Option<String>,
        #[arg(long)]
        search: Option<String>,
        #[arg(long = "brand")]
        brands: Vec<String>,
        #[arg(long = "category")]
        categories: Vec<String>,
        #[arg(long = "storage")]
        storage: Vec<String>,
        #[arg(long = "performance")]
        performance: Vec<String>,
        #[arg(long = "screen-size")]
        screen_sizes: Vec<String>,
        #[arg(long)]
        min_price: Option<u32>,
        #[arg(long)]
        max_price: Option<u32>,
        /// default, price-asc or price-desc
        #[arg(long)]
        sort: Option<SortOrder>,
        #[arg(long)]
        page: Option<u32>,
    },
    /// Ask the assistant and show its picks.
    Chat {
        #[arg(required = true)]
        message: Vec<String>,
        #[arg(long)]
        history: bool,
    },
    Show {
        id: String,
    },
    /// Mark a product for comparison; the second one opens the comparison.
    Compare {
        id: String,
    },
    Favorites,
    /// Toggle a product in the favorites list.
    Favorite {
        id: String,
    },
    Login {
        #[arg(long, conflicts_with = "email", required_unless_present = "email")]
        username: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        password: String,
    },
    Signup {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        confirm_password: String,
    },
    /// Print the address that starts a Google sign-in.
    GoogleLogin,
    /// Finish a Google sign-in from the query of the redirect it ended on.
    OauthCallback {
        query: String,
    },
    /// Show the signed-in account, or change it when any flag is given.
    Profile {
        #[arg(long)]
        username: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        current_password: Option<String>,
        #[arg(long)]
        new_password: Option<String>,
        #[arg(long)]
        confirm_new_password: Option<String>,
    },
    Logout,
    /// Guided laptop finder.
    Finder {
        query: String,
        #[arg(long)]
        price_min: Option<u32>,
        #[arg(long)]
        price_max: Option<u32>,
        #[arg(long)]
        brand: Option<String>,
        #[arg(long)]
        ram_min: Option<u32>,
        #[arg(long)]
        storage_min: Option<u32>,
        #[arg(long)]
        screen_size: Option<f32>,
    },
    /// Print the facet catalog.
    Facets,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();

    let mut settings = load_settings_from(&cli.config, |key| std::env::var(key).ok());
    if let Some(api_url) = cli.api_url {
        settings.api_base_url = api_url.trim_end_matches('/').to_string();
    }
    if let Some(store_url) = cli.store_url {
        settings.store_url = client_core::config::normalize_store_url(&store_url);
    }

    let store: Arc<dyn KeyValueStore> = Arc::new(
        Storage::new(&settings.store_url)
            .await
            .with_context(|| format!("failed to open store at {}", settings.store_url))?,
    );
    let api = ShopApi::from_settings(&settings)?;
    api.load_auth_token(store.as_ref()).await?;
    let session = AuthSession::new(store.clone());
    info!(api = api.base_url(), "shop client ready");

    match cli.command {
        Command::List {
            query,
            search,
            brands,
            categories,
            storage,
            performance,
            screen_sizes,
            min_price,
            max_price,
            sort,
            page,
        } => {
            let mut controller =
                FilterStateController::new(settings.page_size).with_store(store.clone());
            let mut pending = controller.mount(query.as_deref().unwrap_or("")).await;

            if let Some(text) = search {
                pending = latest(controller.set_search_text(text), pending);
            }
            let facets = [
                (FacetGroup::Brand, brands),
                (FacetGroup::Category, categories),
                (FacetGroup::Storage, storage),
                (FacetGroup::Performance, performance),
                (FacetGroup::ScreenSize, screen_sizes),
            ];
            for (group, ids) in facets {
                for id in ids {
                    pending = latest(controller.toggle_facet(group, &id), pending);
                }
            }
            if min_price.is_some() || max_price.is_some() {
                let range = controller.set_price_range(
                    min_price.unwrap_or(0),
                    max_price.unwrap_or(MAX_PRICE),
                )?;
                pending = latest(range, pending);
            }
            if let Some(order) = sort {
                pending = latest(controller.set_sort_order(order), pending);
            }

            controller.apply(&api, pending).await;
            if let Some(page) = page.filter(|page| *page != controller.state().current_page()) {
                let pending = controller.go_to_page(page);
                if pending.is_none() {
                    eprintln!(
                        "page {page} is out of range (1..={})",
                        controller.result().total_pages
                    );
                }
                controller.apply(&api, pending).await;
            }
            print_listing(&controller);
        }
        Command::Chat { message, history } => {
            let mut controller =
                FilterStateController::new(settings.page_size).with_store(store.clone());
            // Mounting loads the transcript; its listing fetch is superseded.
            let _ = controller.mount("").await;
            let pending = controller.enter_chatbot_mode(&message.join(" "))?;
            controller.apply(&api, Some(pending)).await;

            if history {
                for entry in controller.transcript().messages() {
                    let who = if entry.is_user() { "you" } else { "assistant" };
                    println!("{who}: {}", entry.display_text());
                }
                println!();
            }
            if let Some(specs) = controller.transcript().last_specs() {
                println!("understood: {specs}");
            }
            print_listing(&controller);
        }
        Command::Show { id } => {
            let product = api.laptop(&LaptopId::from(id)).await?;
            print_details(&product);
        }
        Command::Compare { id } => {
            let selection = CompareSelection::new(store.clone());
            match selection.select(&LaptopId::from(id)).await? {
                CompareAction::Pending(id) => {
                    println!("Product {id} added for comparison. Select another product.");
                }
                CompareAction::Navigate(route) => {
                    println!("{route}");
                    if let Route::Compare { first, second } = &route {
                        let (left, right) = api.compare(first, second).await?;
                        print_details(&left);
                        println!();
                        print_details(&right);
                    }
                }
            }
        }
        Command::Favorites => match api.favorites().await {
            Ok(favorites) if favorites.is_empty() => println!("No favorites yet."),
            Ok(favorites) => {
                for favorite in favorites {
                    print_product(&favorite.laptop);
                }
            }
            Err(err) if err.requires_login() => {
                println!("Sign in with `shop login` to see your favorites.");
            }
            Err(err) => return Err(err.into()),
        },
        Command::Favorite { id } => {
            let id = LaptopId::from(id);
            let mut tracker = FavoritesTracker::for_page(format!("/product/{id}"));
            let outcome = match tracker.load(&api).await {
                Ok(()) => tracker.toggle(&api, &id).await,
                Err(err) => Err(err),
            };
            match outcome {
                Ok(true) => println!("Added {id} to favorites."),
                Ok(false) => println!("Removed {id} from favorites."),
                Err(FavoriteError::LoginRequired(route)) => {
                    println!("Sign in with `shop login` first ({route}).");
                }
                Err(FavoriteError::Backend(err)) => {
                    eprintln!("Could not update favorites: {err}");
                }
            }
        }
        Command::Login {
            username,
            email,
            password,
        } => {
            let response = api
                .login(&LoginRequest {
                    username,
                    email,
                    password,
                })
                .await?;
            session
                .save(&response.token, &response.user, AuthMethod::Password)
                .await
                .context("failed to persist session")?;
            println!(
                "{}",
                response
                    .message
                    .unwrap_or_else(|| format!("Signed in as {}", response.user.username))
            );
        }
        Command::Signup {
            username,
            email,
            password,
            confirm_password,
        } => {
            let request = SignupForm {
                username,
                email,
                password,
                confirm_password,
            }
            .validate()?;
            let response = api.signup(&request).await?;
            session
                .save(&response.token, &response.user, AuthMethod::Password)
                .await
                .context("failed to persist session")?;
            println!("Welcome, {}.", response.user.username);
        }
        Command::GoogleLogin => println!("{}", api.google_login_url()),
        Command::OauthCallback { query } => match session.complete_oauth_callback(&query).await? {
            Route::LoginFailed { error } => eprintln!("Google sign-in failed: {error}"),
            route => {
                let name = session
                    .user()
                    .await?
                    .map(|user| user.username)
                    .unwrap_or_default();
                println!("Signed in with Google as {name} ({route}).");
            }
        },
        Command::Profile {
            username,
            email,
            current_password,
            new_password,
            confirm_new_password,
        } => {
            let Some(user) = session.user().await? else {
                println!("Sign in with `shop login` to see your profile.");
                return Ok(());
            };
            let changes = [
                &username,
                &email,
                &current_password,
                &new_password,
                &confirm_new_password,
            ];
            if changes.iter().all(|value| value.is_none()) {
                println!("{} (id {})", user.username, user.id.0);
                if let Some(email) = &user.email {
                    println!("  {email}");
                }
                return Ok(());
            }

            let update = ProfileForm {
                username: username.unwrap_or_else(|| user.username.clone()),
                email: email.unwrap_or_default(),
                current_password: current_password.unwrap_or_default(),
                new_password: new_password.unwrap_or_default(),
                confirm_new_password: confirm_new_password.unwrap_or_default(),
            }
            .validate(session.method().await?)?;
            let updated = api.update_profile(user.id, &update).await?;
            session.update_user(&updated).await?;
            println!("Your profile has been updated successfully");
        }
        Command::Logout => {
            api.logout().await;
            session.clear().await?;
            println!("Signed out.");
        }
        Command::Finder {
            query,
            price_min,
            price_max,
            brand,
            ram_min,
            storage_min,
            screen_size,
        } => {
            let results = api
                .laptop_finder(&FinderRequest {
                    query,
                    filters: FinderFilters {
                        price_min,
                        price_max,
                        brand,
                        ram_min,
                        storage_min,
                        screen_size,
                    },
                })
                .await?;
            if results.is_empty() {
                println!("No laptops match those answers.");
            }
            for product in &results {
                print_product(product);
            }
        }
        Command::Facets => {
            for group in FacetGroup::ALL {
                println!("{group} ({}):", group.query_key());
                for option in group.options() {
                    println!("  {:<24} {}", option.id, option.label);
                }
            }
        }
    }

    Ok(())
}

/// Keeps the newest fetch; a mutation that issued nothing leaves the
/// previous one in place.
fn latest(next: Option<PendingFetch>, previous: Option<PendingFetch>) -> Option<PendingFetch> {
    next.or(previous)
}

fn print_listing(controller: &FilterStateController) {
    println!("{}", controller.listing_route());
    if let Some(notice) = controller.status().notice() {
        println!("{notice}");
    }
    if let ListingStatus::Failed(err) = controller.status() {
        eprintln!("{err}");
    }
    for product in &controller.result().items {
        print_product(product);
    }

    let result = controller.result();
    if let Some(count) = result.total_count {
        let pages = controller
            .visible_page_numbers()
            .into_iter()
            .map(|page| {
                if page == controller.state().current_page() {
                    format!("[{page}]")
                } else {
                    page.to_string()
                }
            })
            .collect::<Vec<_>>()
            .join(" ");
        println!("{count} laptops, page {pages} of {}", result.total_pages);
    }
}

fn print_product(product: &Product) {
    let price = product
        .price
        .map(|price| format!("{price:.0}"))
        .unwrap_or_else(|| "n/a".to_string());
    let stock = if product.in_stock { "" } else { " (out of stock)" };
    println!(
        "{:>6}  {} {}  {price}{stock}",
        product.id.as_str(),
        product.brand,
        product.name
    );
}

fn print_details(product: &Product) {
    println!("{} {} [{}]", product.brand, product.name, product.id);
    let rows = [
        ("Model", product.model.as_deref()),
        ("Category", product.category.as_deref()),
        ("Processor", product.processor.as_deref()),
        ("Graphics", product.graphics.as_deref()),
        ("RAM", product.ram.as_deref()),
        ("Storage", product.storage.as_deref()),
        ("Display", product.display.as_deref()),
        ("Screen size", product.display_size.as_deref()),
        ("Resolution", product.display_resolution.as_deref()),
        ("Seller", product.seller.as_deref()),
        ("Condition", product.condition.as_deref()),
        ("Link", product.product_url.as_deref()),
    ];
    for (label, value) in rows {
        if let Some(value) = value {
            println!("  {label:<12} {value}");
        }
    }
    if let Some(price) = product.price {
        println!("  {:<12} {price:.0}", "Price");
    }
    println!(
        "  {:<12} {}",
        "Stock",
        if product.in_stock { "in stock" } else { "out of stock" }
    );
    println!("  {:<12} {}", "Image", product.image_or_placeholder());
}
