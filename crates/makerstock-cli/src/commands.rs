//! Command handlers.
//!
//! Results go to stdout; notices about cache state go to stderr so output
//! can be piped.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use makerstock_core::api::client::LIVE_STOCK_CACHE_KEY;
use makerstock_core::api::validation::{
    parse_quantity, validate_not_empty, validate_return_quantity,
};
use makerstock_core::inventory::{StockView, ViewPhase};
use makerstock_core::models::{filter_stock, group_by_case, StockItem, StockLevel, WriteOutcome};
use makerstock_core::utils::truncate_string;
use makerstock_core::{ApiClient, CacheManager, Config};

use crate::cli::{CacheAction, Command};

/// Case component lists fetched at once by `cases --components`
const PREFETCH_CONCURRENCY: usize = 10;

/// Width of the component column in stock listings
const COMPONENT_WIDTH: usize = 36;

pub struct App {
    config: Config,
    api: ApiClient,
}

impl App {
    pub fn new(config: Config) -> Result<Self> {
        let cache = match config.cache_dir().and_then(CacheManager::open) {
            Ok(cache) => cache,
            Err(e) => {
                warn!(error = %e, "Disk cache unavailable, caching in memory only");
                CacheManager::in_memory()
            }
        };
        let api = ApiClient::new(&config, Arc::new(cache)).context("Failed to create HTTP client")?;
        Ok(Self { config, api })
    }

    pub async fn run(&self, command: Command) -> Result<ExitCode> {
        match command {
            Command::Stock {
                search,
                cached_only,
                refresh,
            } => {
                let query = search.as_deref().unwrap_or("");
                if cached_only {
                    self.cached_stock(query);
                } else {
                    self.stock(query, refresh).await?;
                }
            }
            Command::Cases { components } => self.cases(components).await?,
            Command::Components { case_name } => {
                let components = self.api.fetch_components_by_case(&case_name).await?;
                if components.is_empty() {
                    println!("No components in {}.", case_name);
                }
                for component in components {
                    println!("{}", component);
                }
            }
            Command::Holdings { user } => self.holdings(user).await?,
            Command::Borrow {
                case_name,
                component,
                quantity,
                user,
            } => return self.borrow(&case_name, &component, &quantity, user).await,
            Command::Return {
                component,
                quantity,
                user,
            } => return self.return_component(&component, &quantity, user).await,
            Command::Cache { action } => self.cache(action),
        }
        Ok(ExitCode::SUCCESS)
    }

    fn cached_age(&self) -> String {
        self.api
            .cache()
            .age_of(LIVE_STOCK_CACHE_KEY)
            .unwrap_or_else(|| "unknown".to_string())
    }

    fn cached_stock(&self, query: &str) {
        match self.api.cached_live_stock() {
            Some(items) => {
                print_stock(&filter_stock(&items, query));
                eprintln!("(cached {})", self.cached_age());
            }
            None => println!("No cached stock. Run `makerstock stock` to fetch it."),
        }
    }

    async fn stock(&self, query: &str, force: bool) -> Result<()> {
        let mut view = StockView::new(self.api.clone());
        if force {
            view.mount_forced();
        } else {
            view.mount();
        }

        // Show whatever is cached while the fetch runs
        let shown = view.items().map(<[StockItem]>::to_vec);
        if shown.is_some() {
            print_stock(&view.filtered(query));
            eprintln!("(cached {}, refreshing...)", self.cached_age());
        }

        view.settle().await;

        match view.phase() {
            ViewPhase::Failed(message) => bail!("{}", message),
            ViewPhase::ShowingStale => {
                eprintln!("Could not refresh stock; showing cached data.");
            }
            _ if shown.as_deref() == view.items() => {
                eprintln!("Stock is up to date.");
            }
            _ => {
                if shown.is_some() {
                    println!();
                    println!("Updated:");
                }
                print_stock(&view.filtered(query));
            }
        }
        Ok(())
    }

    async fn cases(&self, with_components: bool) -> Result<()> {
        let cases = self.api.fetch_cases().await?;
        if cases.is_empty() {
            println!("No cases.");
            return Ok(());
        }
        if !with_components {
            for case_name in &cases {
                println!("{}", case_name);
            }
            return Ok(());
        }

        let lists: Vec<_> = stream::iter(cases.iter())
            .map(|case_name| self.api.fetch_components_by_case(case_name))
            .buffered(PREFETCH_CONCURRENCY)
            .collect()
            .await;
        debug!(cases = cases.len(), "Component lists fetched");

        for (case_name, list) in cases.iter().zip(lists) {
            println!("{}", case_name);
            match list {
                Ok(components) => {
                    for component in components {
                        println!("  {}", component);
                    }
                }
                Err(e) => {
                    warn!(case = %case_name, error = %e, "Failed to load components");
                    println!("  (could not load components: {})", e);
                }
            }
        }
        Ok(())
    }

    /// `--user` if given, else the last user id that completed a write.
    fn resolve_user(&self, user: Option<String>) -> String {
        user.or_else(|| self.config.last_user_id.clone())
            .unwrap_or_default()
    }

    async fn holdings(&self, user: Option<String>) -> Result<()> {
        let user_id = self.resolve_user(user);
        let holdings = self.api.fetch_user_holdings(&user_id).await?;
        if holdings.is_empty() {
            println!("Nothing borrowed.");
        }
        for holding in &holdings {
            println!("{}", holding.display());
        }
        Ok(())
    }

    async fn borrow(
        &self,
        case_name: &str,
        component: &str,
        quantity: &str,
        user: Option<String>,
    ) -> Result<ExitCode> {
        let quantity = parse_quantity(quantity, "Quantity")?;
        let user_id = self.resolve_user(user);
        validate_not_empty(&user_id, "User ID")?;

        if self.config.require_check_in {
            let status = self.api.verify_user(&user_id).await?;
            if !status.active {
                bail!("{} is not checked in.", status.display_name(&user_id));
            }
        }

        let outcome = self
            .api
            .borrow_component(&user_id, case_name, component, quantity)
            .await?;
        Ok(self.finish(&user_id, outcome))
    }

    async fn return_component(
        &self,
        component: &str,
        quantity: &str,
        user: Option<String>,
    ) -> Result<ExitCode> {
        let quantity = parse_quantity(quantity, "Quantity")?;
        let user_id = self.resolve_user(user);

        let holdings = self.api.fetch_user_holdings(&user_id).await?;
        validate_return_quantity(&holdings, component, quantity)?;

        let outcome = self
            .api
            .return_component(&user_id, component, quantity)
            .await?;
        Ok(self.finish(&user_id, outcome))
    }

    fn finish(&self, user_id: &str, outcome: WriteOutcome) -> ExitCode {
        if !outcome.success {
            eprintln!("{}", outcome.message);
            return ExitCode::FAILURE;
        }

        println!("{}", outcome.message);
        if let Err(e) = Config::remember_user(user_id) {
            warn!(error = %e, "Failed to remember user id");
        }
        ExitCode::SUCCESS
    }

    fn cache(&self, action: CacheAction) {
        let cache = self.api.cache();
        match action {
            CacheAction::Clear { key } => {
                cache.invalidate(key.as_deref());
                match key {
                    Some(key) => println!("Cleared {}.", key),
                    None => println!("Cleared all cached data."),
                }
                info!("Cache cleared");
            }
            CacheAction::Show => {
                let entries = cache.entries();
                if entries.is_empty() {
                    println!("Cache is empty.");
                }
                for entry in entries {
                    let state = if entry.stale { "stale" } else { "fresh" };
                    println!("{:<40} {:<10} {}", entry.key, entry.age, state);
                }
            }
        }
    }
}

fn print_stock(items: &[&StockItem]) {
    if items.is_empty() {
        println!("No matching components.");
        return;
    }

    for group in group_by_case(items) {
        println!("{}", group.case_name);
        for item in group.items {
            let marker = match item.level() {
                StockLevel::Out => "  out of stock",
                StockLevel::Low => "  low",
                StockLevel::Available => "",
            };
            println!(
                "  {:<width$} {:>5}{}",
                truncate_string(&item.component, COMPONENT_WIDTH),
                item.stock,
                marker,
                width = COMPONENT_WIDTH
            );
        }
    }
}
