use crate::commands::{self, Action};
use crate::event::{Event, EventHandler};
use crate::{
  CartCommand, CatalogCommand, Command, CoursesCommand, LoginArgs, PostsCommand, ProductsCommand, ProfileCommand,
  RegisterArgs, ShopCommand, WatchCommand,
};
use color_eyre::{eyre::eyre, Result};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use coursehub::api::auth::LoginRequest;
use coursehub::api::cart::AddToCart;
use coursehub::api::home::Category;
use coursehub::api::posts::{NewPost, Post};
use coursehub::api::products::ProductQuery;
use coursehub::api::shop::RegisterShop;
use coursehub::api::shop_courses::NewCourse;
use coursehub::api::ApiClient;
use coursehub::config::Config;
use coursehub::features::{self, posts, Session};
use coursehub::infinite::InfiniteQuery;
use coursehub::notify::ConsoleNotifier;
use coursehub::query::{QueryClient, QueryState, RefetchTrigger};

const TICK_RATE: Duration = Duration::from_millis(250);

/// One CLI invocation: a shared query client over the two backends.
pub struct App {
  client: QueryClient,
  /// CourseHub backend
  api: ApiClient,
  /// Demo posts backend
  posts_api: ApiClient,
  session: Session,
}

impl App {
  pub fn new(config: Config) -> Result<Self> {
    let token = config.api_token();
    let session = Session::new(token.clone());
    let api = ApiClient::new(&config.api.base_url, token.as_deref())?;
    let posts_api = ApiClient::new(&config.api.posts_url, None)?;
    let client = QueryClient::new(config.client_defaults()).with_notifier(Arc::new(ConsoleNotifier));
    debug!(base = %api.base_url(), authenticated = session.is_authenticated(), "app ready");

    Ok(Self {
      client,
      api,
      posts_api,
      session,
    })
  }

  pub async fn run(&self, command: Command) -> Result<()> {
    match command {
      Command::Posts(cmd) => self.posts(cmd).await,
      Command::Cart(cmd) => self.cart(cmd).await,
      Command::Products(cmd) => self.products(cmd).await,
      Command::Courses(cmd) => self.courses(cmd).await,
      Command::Catalog(cmd) => self.catalog(cmd).await,
      Command::Home => self.home().await,
      Command::Profile(ProfileCommand::Show) => self.profile().await,
      Command::Shop(ShopCommand::Show) => self.shop().await,
      Command::Shop(ShopCommand::Register(args)) => self.register_shop(args).await,
      Command::Login(args) => self.login(args).await,
      Command::Watch(WatchCommand::Posts) => self.watch_posts().await,
    }
  }

  async fn posts(&self, cmd: PostsCommand) -> Result<()> {
    match cmd {
      PostsCommand::List { pages } => {
        let list = posts::list_query(&self.client, &self.posts_api);
        expect_loaded(list.fetch().await)?;
        for _ in 1..pages {
          if !list.fetch_next().await? {
            break;
          }
        }
        print_list(&list);
      }
      PostsCommand::Show { id } => {
        let query = posts::detail_query(&self.client, &self.posts_api, id, true);
        if !query.options().enabled {
          return Err(eyre!("Post {} has not been saved on the server", id));
        }
        let post = expect_loaded(query.load().await)?;
        println!("#{} by user {}\n{}\n\n{}", post.id, post.user_id, post.title, post.body);
      }
      PostsCommand::Create { title, body, user } => {
        let input = NewPost {
          user_id: user,
          title,
          body,
        };
        let created = self.client.mutate(&posts::create_post(&self.posts_api), input).await?;
        info!(id = created.id, "server acknowledged post");
      }
      PostsCommand::Delete { id } => {
        self.client.mutate(&posts::delete_post(&self.posts_api), id).await?;
      }
    }
    Ok(())
  }

  async fn cart(&self, cmd: CartCommand) -> Result<()> {
    use features::cart;
    match cmd {
      CartCommand::Show => {
        let cart = expect_loaded(cart::cart_query(&self.client, &self.api).load().await)?;
        if cart.items.is_empty() {
          println!("Your cart is empty");
        }
        for item in &cart.items {
          println!("{:<24} {:>3} x {:>8.2} = {:>9.2}", item.product_name, item.quantity, item.unit_price, item.line_total);
        }
        println!("{:>49.2}", cart.subtotal);
      }
      CartCommand::Add { product, quantity } => {
        let item = AddToCart {
          product_id: product,
          quantity,
        };
        self.client.mutate(&cart::add_to_cart(&self.api), item).await?;
      }
      CartCommand::Remove { product } => {
        self.client.mutate(&cart::remove_from_cart(&self.api), product).await?;
      }
    }
    Ok(())
  }

  async fn products(&self, cmd: ProductsCommand) -> Result<()> {
    use features::shop_products;
    match cmd {
      ProductsCommand::List => {
        let products = expect_loaded(shop_products::list_query(&self.client, &self.api).load().await)?;
        for p in products.iter() {
          println!("{:<38} {:<10} {:>9.2} {:>5}  {}", p.id, p.status, p.price, p.stock, p.name);
        }
      }
      ProductsCommand::Show { id } => {
        let p = expect_loaded(shop_products::detail_query(&self.client, &self.api, &id).load().await)?;
        println!("{} ({})\n{} | {:.2} | stock {}\n\n{}", p.name, p.id, p.status, p.price, p.stock, p.description);
      }
      ProductsCommand::Status { id, status } => {
        self
          .client
          .mutate(&shop_products::update_status(&self.api), (id, status))
          .await?;
      }
      ProductsCommand::Delete { id } => {
        self.client.mutate(&shop_products::delete_product(&self.api), id).await?;
      }
    }
    Ok(())
  }

  async fn courses(&self, cmd: CoursesCommand) -> Result<()> {
    use features::shop_courses;
    self.require_session()?;
    match cmd {
      CoursesCommand::List => {
        let courses = expect_loaded(shop_courses::courses_query(&self.client, &self.api).load().await)?;
        for c in courses.iter() {
          let listed = if c.is_active() { "listed" } else { "hidden" };
          println!("{:<38} {:<7} {:<20} {}", c.id, listed, c.category_name, c.title);
        }
      }
      CoursesCommand::Create {
        title,
        summary,
        category,
        thumbnail,
      } => {
        let input = NewCourse::new(&title, &summary, &category, &thumbnail);
        let course = self.client.mutate(&shop_courses::create_course(&self.api), input).await?;
        println!("{} ({})", course.title, course.slug);
      }
    }
    Ok(())
  }

  async fn catalog(&self, cmd: CatalogCommand) -> Result<()> {
    use features::products;
    match cmd {
      CatalogCommand::List { search, category, page } => {
        let params = ProductQuery {
          search,
          category_id: category,
          page: Some(page),
          page_size: None,
        };
        let list = expect_loaded(products::list_query(&self.client, &self.api, params).load().await)?;
        for p in &list.items {
          println!("{:<30} {:>9.2}  {}", p.slug, p.price, p.name);
        }
        println!("page {} of {} ({} products)", list.page, list.total_pages, list.total_count);
      }
      CatalogCommand::Show { slug } => {
        let p = expect_loaded(products::by_slug_query(&self.client, &self.api, &slug).load().await)?;
        let seller = p.shop_name.as_deref().unwrap_or("unknown seller");
        println!("{} by {}
{:.2} | stock {}

{}", p.name, seller, p.price, p.stock, p.description);
      }
    }
    Ok(())
  }

  async fn home(&self) -> Result<()> {
    let page = expect_loaded(features::home::landing_page_query(&self.client, &self.api).load().await)?;
    println!("Course categories: {}", category_names(&page.top_course_categories));
    println!("Product categories: {}", category_names(&page.top_product_categories));
    println!("\nPopular courses");
    for c in &page.popular_courses {
      println!("  {}", c.title);
    }
    println!("\nBest sellers");
    for p in &page.best_seller_products {
      println!("  {:<40} {:>9.2}", p.name, p.price);
    }
    Ok(())
  }

  async fn register_shop(&self, args: RegisterArgs) -> Result<()> {
    self.require_session()?;
    let input = RegisterShop {
      shop_name: args.name,
      shop_description: args.description,
      shop_phone_number: args.phone,
      shop_address: args.address,
      business_type: args.business_type,
      category_id: args.category,
      owner_full_name: args.owner_name,
      owner_date_of_birth: args.owner_dob,
      owner_personal_id_number: args.owner_id,
      accepted_terms: args.accept_terms,
      ..Default::default()
    };
    self.client.mutate(&features::shop::register_shop(&self.api), input).await?;
    Ok(())
  }

  async fn profile(&self) -> Result<()> {
    self.require_session()?;
    let query = features::profile::my_profile_query(&self.client, &self.api, &self.session);
    match expect_loaded(query.load().await)?.as_ref() {
      Some(p) => println!("{} (@{})\n{}", p.full_name, p.user_name, p.email),
      None => println!("No profile yet"),
    }
    Ok(())
  }

  async fn shop(&self) -> Result<()> {
    self.require_session()?;
    let query = features::shop::my_shop_query(&self.client, &self.api);
    match expect_loaded(query.load().await)?.as_ref() {
      Some(shop) => println!("{} (#{})\n{}", shop.name, shop.id, shop.description.as_deref().unwrap_or_default()),
      None => println!("You don't have a shop yet"),
    }
    Ok(())
  }

  async fn login(&self, args: LoginArgs) -> Result<()> {
    let input = LoginRequest {
      username: args.username,
      password: args.password,
    };
    let result = self.client.mutate(&features::auth::login(&self.api), input).await?;
    println!("export {}={}", coursehub::config::DEFAULT_TOKEN_ENV, result.token);
    Ok(())
  }

  fn require_session(&self) -> Result<()> {
    if self.session.is_authenticated() {
      Ok(())
    } else {
      Err(eyre!("Not signed in. Run `coursehub login` and set {}", coursehub::config::DEFAULT_TOKEN_ENV))
    }
  }

  /// Line-driven loop over the infinite post list. Invalidations of the list
  /// seen between commands trigger a refresh, printed once it lands.
  async fn watch_posts(&self) -> Result<()> {
    let mut list = posts::list_query(&self.client, &self.posts_api);
    expect_loaded(list.fetch().await)?;
    list.poll();
    print_list(&list);
    prompt();

    let mut events = EventHandler::new(TICK_RATE);
    while let Some(event) = events.next().await {
      match event {
        Event::Tick => {
          if list.poll() {
            let state = list.state();
            if state.is_success() && !state.is_stale {
              debug!("post list refreshed");
              print_list(&list);
              prompt();
            }
          }
        }
        Event::Eof => break,
        Event::Line(line) => {
          if line.trim().is_empty() {
            prompt();
            continue;
          }
          let Some((cmd, arg)) = commands::parse(&line) else {
            let names: Vec<&str> = commands::get_suggestions(line.split_whitespace().next().unwrap_or_default())
              .iter()
              .map(|c| c.name)
              .collect();
            if names.is_empty() {
              println!("Unknown command, type `help`");
            } else {
              println!("Did you mean: {}", names.join(", "));
            }
            prompt();
            continue;
          };
          match cmd.action {
            Action::Quit => break,
            Action::Help => {
              for c in commands::COMMANDS {
                println!("  {:<10} {:<16} {}", c.name, c.aliases.join(","), c.description);
              }
            }
            Action::Next => match list.fetch_next().await {
              Ok(true) => print_list(&list),
              Ok(false) => println!("No more posts"),
              Err(err) => println!("Could not load more posts: {}", err),
            },
            Action::Refresh => {
              list.refresh().await;
              print_list(&list);
            }
            Action::Focus | Action::Reconnect => {
              let trigger = if cmd.action == Action::Focus {
                RefetchTrigger::Focus
              } else {
                RefetchTrigger::Reconnect
              };
              if list.handle(trigger).await {
                print_list(&list);
              } else {
                println!("Not configured to refetch on {}", cmd.name);
              }
            }
            Action::Search => {
              let needle = arg.to_lowercase();
              let found = list.filtered(|p| p.title.to_lowercase().contains(&needle));
              for post in &found {
                print_post(post);
              }
              println!("{} of {} loaded posts match", found.len(), list.data().map(|d| d.len()).unwrap_or(0));
            }
          }
          // Changes made by the command itself are already printed
          list.poll();
          prompt();
        }
      }
    }
    Ok(())
  }
}

/// Data of a loaded query, or its error.
fn expect_loaded<T>(state: QueryState<T>) -> Result<Arc<T>> {
  if let Some(err) = state.error {
    return Err(err.into());
  }
  state.data.ok_or_else(|| eyre!("Nothing loaded"))
}

fn category_names(categories: &[Category]) -> String {
  categories.iter().map(|c| c.name.as_str()).collect::<Vec<_>>().join(", ")
}

fn print_post(post: &Post) {
  let marker = if post.is_confirmed() { ' ' } else { '*' };
  println!("{:>6}{} {}", post.id, marker, post.title);
}

fn print_list(list: &InfiniteQuery<Post>) {
  let Some(data) = list.data() else {
    println!("No posts loaded");
    return;
  };
  for post in data.items() {
    print_post(post);
  }
  let total = data.total_count().map(|t| t.to_string()).unwrap_or_else(|| "?".into());
  println!("-- {} of {} posts{}", data.len(), total, if data.has_next() { ", `next` for more" } else { "" });
}

fn prompt() {
  print!("> ");
  let _ = std::io::stdout().flush();
}
