mod commands;
mod logging;
mod render;

use bizdesk::config::Config;
use bizdesk::crm::{
  CachedCrmClient, Cacheable, Client, Domain, EntityType, Expense, Invoice, Meeting, Plan,
  Subscription,
};
use bizdesk::debounce::DebouncedSearch;
use bizdesk::list::ListController;
use bizdesk::params::MemoryHistory;
use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};

use render::TableRow;

#[derive(Parser, Debug)]
#[command(name = "bizdesk")]
#[command(about = "Command-line client for the bizdesk CRM")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/bizdesk/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// API base URL, overriding the config file
  #[arg(long)]
  base_url: Option<String>,

  /// Log to stderr at debug level
  #[arg(short, long)]
  verbose: bool,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// List records, one page at a time
  List {
    entity: String,
    /// Query string of filters and pagination, e.g. "status=paid&page=2"
    #[arg(short, long)]
    query: Option<String>,
    #[arg(long)]
    page: Option<u32>,
    #[arg(long)]
    page_size: Option<u32>,
    #[arg(short, long)]
    search: Option<String>,
  },
  /// Show one record
  Show { entity: String, id: u64 },
  /// Create a record from a JSON payload
  Create {
    entity: String,
    #[arg(long)]
    json: String,
  },
  /// Replace a record with a JSON payload
  Update {
    entity: String,
    id: u64,
    #[arg(long)]
    json: String,
  },
  /// Move a record to another state, e.g. `transition invoices 7 paid`
  Transition {
    entity: String,
    id: u64,
    action: String,
  },
  /// Delete a record
  Delete { entity: String, id: u64 },
  /// Read search terms from stdin, one per line, and list matches as they settle
  Search {
    entity: String,
    #[arg(short, long)]
    query: Option<String>,
  },
  /// List the record types and their aliases
  Entities,
}

/// What to do with the resolved record type.
enum Action {
  List {
    query: Option<String>,
    page: Option<u32>,
    page_size: Option<u32>,
    search: Option<String>,
  },
  Show(u64),
  Create(String),
  Update(u64, String),
  Transition(u64, String),
  Delete(u64),
  Search(Option<String>),
}

impl Command {
  fn split(self) -> Option<(String, Action)> {
    Some(match self {
      Command::List {
        entity,
        query,
        page,
        page_size,
        search,
      } => (
        entity,
        Action::List {
          query,
          page,
          page_size,
          search,
        },
      ),
      Command::Show { entity, id } => (entity, Action::Show(id)),
      Command::Create { entity, json } => (entity, Action::Create(json)),
      Command::Update { entity, id, json } => (entity, Action::Update(id, json)),
      Command::Transition { entity, id, action } => (entity, Action::Transition(id, action)),
      Command::Delete { entity, id } => (entity, Action::Delete(id)),
      Command::Search { entity, query } => (entity, Action::Search(query)),
      Command::Entities => return None,
    })
  }
}

fn resolve_entity(input: &str) -> Result<EntityType> {
  if let Some(entity) = commands::resolve(input) {
    return Ok(entity);
  }
  let suggestions: Vec<&str> = commands::get_suggestions(input)
    .iter()
    .map(|cmd| cmd.name())
    .collect();
  if suggestions.is_empty() {
    Err(eyre!("Unknown record type {:?}. Run `bizdesk entities`.", input))
  } else {
    Err(eyre!(
      "Unknown record type {:?}. Did you mean: {}?",
      input,
      suggestions.join(", ")
    ))
  }
}

fn print_entities() {
  for cmd in commands::ENTITIES {
    println!(
      "{:<14} {:<28} {}",
      cmd.name(),
      cmd.aliases.join(", "),
      cmd.description
    );
  }
}

fn parse_input<E: Cacheable>(json: &str) -> Result<E::Input> {
  serde_json::from_str(json)
    .map_err(|e| eyre!("Invalid {} payload: {}", E::entity_type().label(), e))
}

fn print_record<E: Cacheable>(record: &E) -> Result<()> {
  let json = serde_json::to_string_pretty(record)
    .map_err(|e| eyre!("Failed to render {}: {}", E::entity_type().label(), e))?;
  println!("{}", json);
  Ok(())
}

async fn execute<E: Cacheable + TableRow>(
  crm: &CachedCrmClient,
  config: &Config,
  action: Action,
) -> Result<()> {
  let resource = crm.resource::<E>();
  let label = E::entity_type().label();

  match action {
    Action::List {
      query,
      page,
      page_size,
      search,
    } => {
      let history = MemoryHistory::new(query.unwrap_or_default());
      let mut list = ListController::new(resource, history);
      // Filters and page size both return to page 1, so the page goes last
      if let Some(term) = search {
        list.set_search(&term);
      }
      if let Some(page_size) = page_size {
        list.set_page_size(page_size);
      }
      if let Some(page) = page {
        list.set_page(page);
      }
      let view = list.settled().await;
      println!("{}", render::list_view(&view));
      println!("?{}", list.location());
      if let Some(error) = view.error {
        return Err(eyre!(error));
      }
    }
    Action::Show(id) => match resource.detail(id).await {
      Ok(record) => print_record(record.as_ref())?,
      Err(e) if e.is_not_found() => return Err(eyre!("{} {} not found", label, id)),
      Err(e) => return Err(eyre!("Failed to load {} {}: {}", label, id, e.user_message())),
    },
    Action::Create(json) => {
      let saved = resource
        .create(parse_input::<E>(&json)?)
        .await
        .map_err(|e| eyre!("Failed to create {}: {}", label, e.user_message()))?;
      print_record(&saved)?;
    }
    Action::Update(id, json) => {
      let saved = resource
        .update(id, parse_input::<E>(&json)?)
        .await
        .map_err(|e| eyre!("Failed to update {} {}: {}", label, id, e.user_message()))?;
      print_record(&saved)?;
    }
    Action::Transition(id, action) => {
      let saved = resource
        .transition(id, &action)
        .await
        .map_err(|e| eyre!("Failed to {} {} {}: {}", action, label, id, e.user_message()))?;
      print_record(&saved)?;
    }
    Action::Delete(id) => {
      resource
        .delete(id)
        .await
        .map_err(|e| eyre!("Failed to delete {} {}: {}", label, id, e.user_message()))?;
      println!("deleted {} {}", label, id);
    }
    Action::Search(query) => {
      let history = MemoryHistory::new(query.unwrap_or_default());
      let mut list = ListController::new(resource, history);
      let mut search = DebouncedSearch::from_settings(&config.search);
      let mut lines = BufReader::new(tokio::io::stdin()).lines();

      loop {
        tokio::select! {
          line = lines.next_line() => match line {
            Ok(Some(line)) => search.input(&line),
            Ok(None) => break,
            Err(e) => return Err(eyre!("Failed to read search input: {}", e)),
          },
          Some(term) = search.next() => {
            list.set_search(&term);
            let view = list.settled().await;
            println!("> {}\n{}\n", term, render::list_view(&view));
          }
        }
      }

      // Input ended while a term was settling, or right after it settled
      let mut last = None;
      while let Some(term) = search.try_next() {
        last = Some(term);
      }
      if search.is_pending() {
        last = search.next().await.or(last);
      }
      if let Some(term) = last {
        list.set_search(&term);
        let view = list.settled().await;
        println!("> {}\n{}\n", term, render::list_view(&view));
      }
    }
  }

  Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();
  logging::setup_tracing(args.verbose);

  let Some((entity, action)) = args.command.split() else {
    print_entities();
    return Ok(());
  };
  let entity = resolve_entity(&entity)?;

  // Load configuration
  let mut config = Config::load(args.config.as_deref())?;

  // Override the base URL if specified on command line
  if let Some(base_url) = args.base_url {
    config.api.base_url = base_url;
  }

  let crm = CachedCrmClient::new(&config)?;

  match entity {
    EntityType::Client => execute::<Client>(&crm, &config, action).await,
    EntityType::Domain => execute::<Domain>(&crm, &config, action).await,
    EntityType::Invoice => execute::<Invoice>(&crm, &config, action).await,
    EntityType::Subscription => execute::<Subscription>(&crm, &config, action).await,
    EntityType::Meeting => execute::<Meeting>(&crm, &config, action).await,
    EntityType::Expense => execute::<Expense>(&crm, &config, action).await,
    EntityType::Plan => execute::<Plan>(&crm, &config, action).await,
  }
}
