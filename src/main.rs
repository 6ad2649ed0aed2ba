mod app;
mod commands;
mod event;

use clap::{Args, Parser, Subcommand};
use color_eyre::Result;
use std::path::PathBuf;

use coursehub::api::shop_products::ProductStatus;
use coursehub::config::Config;
use coursehub::logging::{self, LogSettings};

#[derive(Parser, Debug)]
#[command(name = "coursehub")]
#[command(about = "Command-line client for CourseHub courses, shop and cart")]
#[command(version)]
struct Cli {
  /// Path to config file (default: $XDG_CONFIG_HOME/coursehub/config.yaml)
  #[arg(short, long, global = true)]
  config: Option<PathBuf>,

  /// More logging (-v info, -vv debug, -vvv trace)
  #[arg(short, long, action = clap::ArgAction::Count, global = true)]
  verbose: u8,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
  /// Demo posts
  #[command(subcommand)]
  Posts(PostsCommand),
  /// Shopping cart
  #[command(subcommand)]
  Cart(CartCommand),
  /// The seller's products
  #[command(subcommand)]
  Products(ProductsCommand),
  /// The seller's courses
  #[command(subcommand)]
  Courses(CoursesCommand),
  /// The public product catalogue
  #[command(subcommand)]
  Catalog(CatalogCommand),
  /// Categories, popular courses and best sellers
  Home,
  /// The signed-in user's profile
  #[command(subcommand)]
  Profile(ProfileCommand),
  /// The signed-in user's shop
  #[command(subcommand)]
  Shop(ShopCommand),
  /// Sign in and print the issued token
  Login(LoginArgs),
  /// Interactive prompt over a live list
  #[command(subcommand)]
  Watch(WatchCommand),
}

#[derive(Subcommand, Debug)]
pub enum PostsCommand {
  /// List posts, loading `pages` pages of ten
  List {
    #[arg(short, long, default_value_t = 1)]
    pages: u32,
  },
  Show {
    id: i64,
  },
  Create {
    #[arg(short, long)]
    title: String,
    #[arg(short, long)]
    body: String,
    #[arg(short, long, default_value_t = 1)]
    user: i64,
  },
  Delete {
    id: i64,
  },
}

#[derive(Subcommand, Debug)]
pub enum CartCommand {
  Show,
  Add {
    product: String,
    #[arg(short, long, default_value_t = 1)]
    quantity: u32,
  },
  Remove {
    product: String,
  },
}

#[derive(Subcommand, Debug)]
pub enum ProductsCommand {
  List,
  Show {
    id: String,
  },
  /// Change a product's status (Draft, Published, OutOfStock, Archived)
  Status {
    id: String,
    #[arg(value_parser = parse_status)]
    status: ProductStatus,
  },
  Delete {
    id: String,
  },
}

#[derive(Subcommand, Debug)]
pub enum CoursesCommand {
  List,
  /// Publish a course; the slug is derived from the title
  Create {
    #[arg(short, long)]
    title: String,
    #[arg(short, long)]
    summary: String,
    #[arg(short, long)]
    category: String,
    /// Thumbnail URL
    #[arg(long)]
    thumbnail: String,
  },
}

#[derive(Subcommand, Debug)]
pub enum CatalogCommand {
  List {
    #[arg(short, long)]
    search: Option<String>,
    #[arg(short, long)]
    category: Option<String>,
    #[arg(short, long, default_value_t = 1)]
    page: u32,
  },
  Show {
    slug: String,
  },
}

#[derive(Subcommand, Debug)]
pub enum ProfileCommand {
  Show,
}

#[derive(Subcommand, Debug)]
pub enum ShopCommand {
  Show,
  /// Apply for a shop; it stays pending until approved
  Register(RegisterArgs),
}

#[derive(Args, Debug)]
pub struct RegisterArgs {
  #[arg(long)]
  pub name: String,
  #[arg(long)]
  pub description: String,
  /// Ten digits starting with 0
  #[arg(long)]
  pub phone: String,
  #[arg(long)]
  pub address: String,
  #[arg(long, default_value = "Individual")]
  pub business_type: String,
  #[arg(long)]
  pub category: String,
  #[arg(long)]
  pub owner_name: String,
  /// yyyy-mm-dd
  #[arg(long)]
  pub owner_dob: String,
  #[arg(long)]
  pub owner_id: String,
  #[arg(long)]
  pub accept_terms: bool,
}

#[derive(Args, Debug)]
pub struct LoginArgs {
  #[arg(short, long)]
  pub username: String,
  /// Read from COURSEHUB_PASSWORD when omitted
  #[arg(short, long, env = "COURSEHUB_PASSWORD", hide_env_values = true)]
  pub password: String,
}

#[derive(Subcommand, Debug)]
pub enum WatchCommand {
  /// Page through posts; type `help` at the prompt
  Posts,
}

fn parse_status(s: &str) -> Result<ProductStatus, String> {
  ProductStatus::parse(s).ok_or_else(|| {
    let all: Vec<String> = ProductStatus::ALL.iter().map(|s| s.to_string()).collect();
    format!("expected one of {}", all.join(", "))
  })
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let cli = Cli::parse();

  let config = Config::load(cli.config.as_deref())?;

  let mut settings = LogSettings::from_verbosity(cli.verbose);
  if cli.verbose == 0 {
    settings.directive = config.log.level.clone();
  }
  settings.file = config.log.file.clone();
  logging::init(&settings)?;

  let app = app::App::new(config)?;
  app.run(cli.command).await
}
