use anyhow::{anyhow, bail, Context, Result};
use chrono::{Local, NaiveDate, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;
use uuid::Uuid;

use shelf_core::{
    apply, categories_of, describe_due, filter_tasks, validate, CatalogStats, CatalogView,
    CategoryFilter, CoreResult, DraftProduct, Priority, PriorityFilter, Product, ProductIds,
    Project, ProjectFilter, QuerySpec, SortField, SortOrder, StatusFilter, Task, TaskFilter,
};
use shelf_fetch::{CatalogSource, DummyJsonSource, DEFAULT_BASE_URL};
use shelf_store::{
    config_path, load_config, resolve_api_url, resolve_store_path, set_api_url, LocalStore,
    ShelfConfig,
};
use shelf_tui::TuiSettings;
use shelf_utils::{capitalize, format_price, init_logging, LogTarget};

const DEFAULT_PROJECT_COLOR: &str = "#3b82f6";

#[derive(Parser)]
#[command(name = "shelf", version, about = "Shelfview product catalog dashboard")]
struct Cli {
    /// Catalog API base URL.
    #[arg(long, global = true)]
    api_url: Option<String>,
    /// Directory holding local tasks and projects.
    #[arg(long, global = true)]
    store: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// List products after search, category filter and sort.
    Products {
        /// Case-insensitive title search.
        #[arg(long, default_value = "")]
        search: String,
        /// Exact category label, or `all`.
        #[arg(long, default_value = "all")]
        category: String,
        /// Sort field.
        #[arg(long, value_enum, default_value = "title")]
        sort: SortFieldArg,
        /// Sort direction.
        #[arg(long, value_enum, default_value = "asc")]
        order: SortOrderArg,
    },
    /// List the distinct product categories.
    Categories,
    /// Show catalog totals.
    Stats,
    /// Check a product draft without saving it.
    Validate {
        #[arg(long, default_value = "")]
        title: String,
        #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
        price: f64,
        #[arg(long, default_value = "")]
        category: String,
        #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
        stock: i64,
        /// Image URL.
        #[arg(long, default_value = "")]
        thumbnail: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        brand: Option<String>,
    },
    /// Manage local tasks.
    Tasks {
        #[command(subcommand)]
        command: TaskCommand,
    },
    /// Manage local projects.
    Projects {
        #[command(subcommand)]
        command: ProjectCommand,
    },
    /// Inspect or change the config file.
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Subcommand)]
enum TaskCommand {
    /// List tasks, open ones first.
    List {
        /// Project id, or `all`.
        #[arg(long, default_value = "all")]
        project: String,
        #[arg(long, value_enum, default_value = "all")]
        priority: PriorityFilterArg,
        #[arg(long, value_enum, default_value = "all")]
        status: StatusFilterArg,
    },
    /// Add a task.
    Add {
        title: String,
        #[arg(long, value_enum, default_value = "medium")]
        priority: PriorityArg,
        /// Project id.
        #[arg(long)]
        project: Option<String>,
        /// Due date as YYYY-MM-DD.
        #[arg(long)]
        due: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
    /// Flip a task between pending and completed.
    Toggle { id: String },
    /// Delete a task.
    Remove { id: String },
}

#[derive(Subcommand)]
enum ProjectCommand {
    /// List projects with their task counts.
    List,
    /// Add a project.
    Add {
        name: String,
        #[arg(long, default_value = DEFAULT_PROJECT_COLOR)]
        color: String,
    },
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Print the effective settings.
    Show,
    /// Persist a new catalog API base URL.
    SetApiUrl { url: String },
}

#[derive(Clone, ValueEnum)]
enum SortFieldArg {
    Title,
    Price,
    Stock,
    Category,
}

impl From<SortFieldArg> for SortField {
    fn from(value: SortFieldArg) -> Self {
        match value {
            SortFieldArg::Title => SortField::Title,
            SortFieldArg::Price => SortField::Price,
            SortFieldArg::Stock => SortField::Stock,
            SortFieldArg::Category => SortField::Category,
        }
    }
}

#[derive(Clone, ValueEnum)]
enum SortOrderArg {
    Asc,
    Desc,
}

impl From<SortOrderArg> for SortOrder {
    fn from(value: SortOrderArg) -> Self {
        match value {
            SortOrderArg::Asc => SortOrder::Ascending,
            SortOrderArg::Desc => SortOrder::Descending,
        }
    }
}

#[derive(Clone, ValueEnum)]
enum PriorityArg {
    High,
    Medium,
    Low,
}

impl From<PriorityArg> for Priority {
    fn from(value: PriorityArg) -> Self {
        match value {
            PriorityArg::High => Priority::High,
            PriorityArg::Medium => Priority::Medium,
            PriorityArg::Low => Priority::Low,
        }
    }
}

#[derive(Clone, ValueEnum)]
enum PriorityFilterArg {
    All,
    High,
    Medium,
    Low,
}

impl From<PriorityFilterArg> for PriorityFilter {
    fn from(value: PriorityFilterArg) -> Self {
        match value {
            PriorityFilterArg::All => PriorityFilter::All,
            PriorityFilterArg::High => PriorityFilter::Only(Priority::High),
            PriorityFilterArg::Medium => PriorityFilter::Only(Priority::Medium),
            PriorityFilterArg::Low => PriorityFilter::Only(Priority::Low),
        }
    }
}

#[derive(Clone, ValueEnum)]
enum StatusFilterArg {
    All,
    Pending,
    Completed,
    Overdue,
}

impl From<StatusFilterArg> for StatusFilter {
    fn from(value: StatusFilterArg) -> Self {
        match value {
            StatusFilterArg::All => StatusFilter::All,
            StatusFilterArg::Pending => StatusFilter::Pending,
            StatusFilterArg::Completed => StatusFilter::Completed,
            StatusFilterArg::Overdue => StatusFilter::Overdue,
        }
    }
}

/// Settings resolved from flags, environment and the config file.
struct Settings {
    api_url: String,
    timeout: Duration,
    store_path: PathBuf,
}

impl Settings {
    fn from_config(
        api_url: Option<String>,
        store: Option<PathBuf>,
        config: &ShelfConfig,
    ) -> Result<Self> {
        let store_path =
            resolve_store_path(store, config).context("failed to resolve store path")?;
        Ok(Self {
            api_url: resolve_api_url(api_url, config)
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            timeout: Duration::from_secs(config.timeout_secs()),
            store_path,
        })
    }

    fn store(&self) -> LocalStore {
        LocalStore::new(self.store_path.clone())
    }
}

/// Config file contents, or the defaults when the file cannot be read.
fn usable_config(loaded: &CoreResult<ShelfConfig>) -> ShelfConfig {
    loaded.as_ref().cloned().unwrap_or_default()
}

fn warn_unreadable_config(loaded: &CoreResult<ShelfConfig>) {
    if let Err(err) = loaded {
        tracing::warn!(%err, "config file unreadable, using defaults");
    }
}

pub fn run() -> Result<()> {
    let Cli {
        api_url,
        store,
        command,
    } = Cli::parse();
    let loaded = load_config();
    let config = usable_config(&loaded);

    let command = match command {
        Some(c) => c,
        None => {
            let settings = Settings::from_config(api_url, store, &config)?;
            init_logging(&LogTarget::File(settings.store_path.clone()))
                .context("failed to initialize logging")?;
            warn_unreadable_config(&loaded);
            return shelf_tui::run(TuiSettings {
                api_url: settings.api_url,
                timeout: settings.timeout,
                store_path: settings.store_path,
            });
        }
    };

    init_logging(&LogTarget::Stderr).context("failed to initialize logging")?;

    if let Command::Validate {
        title,
        price,
        category,
        stock,
        thumbnail,
        description,
        brand,
    } = command
    {
        return validate_draft(&DraftProduct {
            title,
            price,
            category,
            stock,
            thumbnail,
            description,
            brand,
        });
    }

    warn_unreadable_config(&loaded);
    let settings = Settings::from_config(api_url, store, &config)?;

    match command {
        Command::Products {
            search,
            category,
            sort,
            order,
        } => {
            let spec = QuerySpec {
                search_text: search,
                category: CategoryFilter::parse(category),
                sort_field: sort.into(),
                sort_order: order.into(),
            };
            list_products(&settings, &spec)
        }
        Command::Categories => list_categories(&settings),
        Command::Stats => show_stats(&settings),
        Command::Tasks { command } => run_task_command(&settings.store(), command),
        Command::Projects { command } => run_project_command(&settings.store(), command),
        Command::Config { command } => run_config_command(&settings, command),
        Command::Validate { .. } => unreachable!("handled above"),
    }
}

fn fetch_catalog(settings: &Settings) -> Result<Vec<Product>> {
    let source = DummyJsonSource::with_timeout(settings.api_url.clone(), settings.timeout)
        .context("failed to build catalog client")?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to initialize runtime")?;
    runtime
        .block_on(source.fetch_all())
        .context("failed to load products")
}

fn list_products(settings: &Settings, spec: &QuerySpec) -> Result<()> {
    let products = fetch_catalog(settings)?;
    let visible = apply(&products, spec);
    for product in &visible {
        println!("{}", format_product_line(product));
    }
    let stats = CatalogStats {
        total_products: products.len(),
        visible_products: visible.len(),
        ..CatalogStats::default()
    };
    println!("{}", format_showing(&stats, &spec.search_text));
    Ok(())
}

fn list_categories(settings: &Settings) -> Result<()> {
    let products = fetch_catalog(settings)?;
    for category in categories_of(&products) {
        println!("{category}");
    }
    Ok(())
}

fn show_stats(settings: &Settings) -> Result<()> {
    let view = CatalogView::new(fetch_catalog(settings)?);
    println!("{}", format_stats(&view.stats()));
    Ok(())
}

fn validate_draft(draft: &DraftProduct) -> Result<()> {
    match validate(draft, &ProductIds::default()) {
        Ok(product) => {
            let json =
                serde_json::to_string_pretty(&product).context("failed to encode product")?;
            println!("{json}");
            Ok(())
        }
        Err(errors) => {
            for (field, message) in errors.iter() {
                eprintln!("{}: {message}", field.key());
            }
            Err(errors.into())
        }
    }
}

fn run_task_command(store: &LocalStore, command: TaskCommand) -> Result<()> {
    match command {
        TaskCommand::List {
            project,
            priority,
            status,
        } => {
            let filter = TaskFilter {
                project: parse_project_filter(&project)?,
                priority: priority.into(),
                status: status.into(),
            };
            list_tasks(store, &filter, Local::now().date_naive());
            Ok(())
        }
        TaskCommand::Add {
            title,
            priority,
            project,
            due,
            description,
        } => {
            let mut task = Task::new(title, priority.into(), Utc::now()).context("invalid task")?;
            task.description = description.unwrap_or_default();
            task.due_date = due.as_deref().map(parse_due).transpose()?;
            if let Some(project) = project {
                let id = parse_id(&project)?;
                if !store.load_projects().iter().any(|existing| existing.id == id) {
                    bail!("project not found: {id}");
                }
                task.project_id = Some(id);
            }
            let id = task.id;
            store.add_task(task);
            tracing::info!(%id, "task added");
            println!("{id}");
            Ok(())
        }
        TaskCommand::Toggle { id } => {
            let id = parse_id(&id)?;
            let completed = store
                .toggle_task(id)
                .ok_or_else(|| anyhow!("task not found: {id}"))?;
            println!("{}", if completed { "completed" } else { "pending" });
            Ok(())
        }
        TaskCommand::Remove { id } => {
            let id = parse_id(&id)?;
            if !store.remove_task(id) {
                bail!("task not found: {id}");
            }
            Ok(())
        }
    }
}

fn list_tasks(store: &LocalStore, filter: &TaskFilter, today: NaiveDate) {
    let tasks = store.load_tasks();
    let projects = store.load_projects();
    let (pending, completed): (Vec<&Task>, Vec<&Task>) = filter_tasks(&tasks, filter, today)
        .into_iter()
        .partition(|task| !task.completed);
    for task in pending.into_iter().chain(completed) {
        let project = task
            .project_id
            .and_then(|id| projects.iter().find(|project| project.id == id));
        println!("{}", format_task_line(task, project, today));
    }
}

fn run_project_command(store: &LocalStore, command: ProjectCommand) -> Result<()> {
    match command {
        ProjectCommand::List => {
            for project in store.load_projects() {
                println!("{}\t{}\t{}", project.id, project.name, project.task_count);
            }
            Ok(())
        }
        ProjectCommand::Add { name, color } => {
            let project = Project::new(name, color).context("invalid project")?;
            let id = project.id;
            store.add_project(project);
            println!("{id}");
            Ok(())
        }
    }
}

fn run_config_command(settings: &Settings, command: ConfigCommand) -> Result<()> {
    match command {
        ConfigCommand::Show => {
            let path = config_path().context("failed to locate config")?;
            println!("config: {}", path.display());
            println!("api_url: {}", settings.api_url);
            println!("store_path: {}", settings.store_path.display());
            println!("timeout_secs: {}", settings.timeout.as_secs());
            Ok(())
        }
        ConfigCommand::SetApiUrl { url } => {
            set_api_url(&url).context("failed to save config")?;
            println!("API URL set to {url}");
            Ok(())
        }
    }
}

fn parse_id(value: &str) -> Result<Uuid> {
    Uuid::parse_str(value).context("invalid id")
}

fn parse_project_filter(value: &str) -> Result<ProjectFilter> {
    if value == "all" {
        return Ok(ProjectFilter::All);
    }
    Ok(ProjectFilter::Only(parse_id(value)?))
}

fn parse_due(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").context("due date must be YYYY-MM-DD")
}

fn format_product_line(product: &Product) -> String {
    let mut line = format!(
        "{}\t{}\t{}\t{}\t{}\t{}",
        product.id,
        product.title,
        capitalize(&product.category),
        format_price(product.price),
        product.stock,
        product.stock_status().label()
    );
    if let Some(badge) = product.discount_badge() {
        line.push('\t');
        line.push_str(&badge);
    }
    line
}

fn format_showing(stats: &CatalogStats, search: &str) -> String {
    let mut line = format!(
        "Showing {} of {} products",
        stats.visible_products, stats.total_products
    );
    if !search.is_empty() {
        line.push_str(&format!(" for \"{search}\""));
    }
    line
}

fn format_stats(stats: &CatalogStats) -> String {
    format!(
        "Products: {}\nCategories: {}\nTotal Value: {}",
        stats.total_products,
        stats.category_count,
        format_price(stats.total_value)
    )
}

fn format_task_line(task: &Task, project: Option<&Project>, today: NaiveDate) -> String {
    let marker = if task.completed { "[x]" } else { "[ ]" };
    let due = task
        .due_date
        .map(|due| describe_due(due, today))
        .unwrap_or_default();
    let project = project.map(|project| project.name.as_str()).unwrap_or("");
    format!(
        "{}\t{marker} {}\t{}\t{due}\t{project}",
        task.id,
        task.title,
        task.priority.label()
    )
}
