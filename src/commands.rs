/// Entity names, aliases and autocomplete logic
use bizdesk::crm::EntityType;

#[derive(Debug, Clone)]
pub struct EntityCommand {
  pub entity: EntityType,
  pub aliases: &'static [&'static str],
  pub description: &'static str,
}

impl EntityCommand {
  pub fn name(&self) -> &'static str {
    self.entity.as_str()
  }
}

/// All record types the CLI can address
pub const ENTITIES: &[EntityCommand] = &[
  EntityCommand {
    entity: EntityType::Client,
    aliases: &["c", "client", "customers"],
    description: "Customers and leads",
  },
  EntityCommand {
    entity: EntityType::Domain,
    aliases: &["d", "domain"],
    description: "Registered domains",
  },
  EntityCommand {
    entity: EntityType::Invoice,
    aliases: &["i", "inv", "invoice"],
    description: "Invoices (transitions: paid, sent, cancel)",
  },
  EntityCommand {
    entity: EntityType::Subscription,
    aliases: &["s", "sub", "subscription"],
    description: "Recurring subscriptions (transitions: pause, resume, cancel)",
  },
  EntityCommand {
    entity: EntityType::Meeting,
    aliases: &["m", "meeting", "calendar"],
    description: "Scheduled meetings",
  },
  EntityCommand {
    entity: EntityType::Expense,
    aliases: &["e", "exp", "expense"],
    description: "Business expenses",
  },
  EntityCommand {
    entity: EntityType::Plan,
    aliases: &["p", "plan"],
    description: "Subscription plans",
  },
];

/// Resolve an exact entity name or alias.
pub fn resolve(input: &str) -> Option<EntityType> {
  if let Ok(entity) = input.trim().parse::<EntityType>() {
    return Some(entity);
  }
  let input_lower = input.trim().to_lowercase();
  ENTITIES
    .iter()
    .find(|cmd| cmd.aliases.contains(&input_lower.as_str()))
    .map(|cmd| cmd.entity)
}

/// Get autocomplete suggestions for a given input
pub fn get_suggestions(input: &str) -> Vec<&'static EntityCommand> {
  let input_lower = input.trim().to_lowercase();

  if input_lower.is_empty() {
    return ENTITIES.iter().collect();
  }

  let mut matches: Vec<(&'static EntityCommand, u8)> = Vec::new();

  for cmd in ENTITIES {
    // Exact match on name or alias
    if cmd.name() == input_lower || cmd.aliases.contains(&input_lower.as_str()) {
      matches.push((cmd, 0));
      continue;
    }

    if cmd.name().starts_with(&input_lower) {
      matches.push((cmd, 1));
      continue;
    }

    if cmd.aliases.iter().any(|a| a.starts_with(&input_lower)) {
      matches.push((cmd, 2));
      continue;
    }

    if cmd.name().contains(&input_lower) {
      matches.push((cmd, 3));
      continue;
    }

    // Typo: the input is a prefix of the name minus one character
    let shared = cmd
      .name()
      .chars()
      .zip(input_lower.chars())
      .take_while(|(a, b)| a == b)
      .count();
    if shared >= 3 {
      matches.push((cmd, 4));
    }
  }

  matches.sort_by_key(|(_, priority)| *priority);

  matches.into_iter().map(|(cmd, _)| cmd).collect()
}
