/// Commands understood by the `watch` prompt, and their autocomplete logic

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
  Next,
  Refresh,
  Focus,
  Reconnect,
  Search,
  Help,
  Quit,
}

#[derive(Debug, Clone)]
pub struct Command {
  pub name: &'static str,
  pub aliases: &'static [&'static str],
  pub description: &'static str,
  pub action: Action,
}

/// All available commands
pub const COMMANDS: &[Command] = &[
  Command {
    name: "next",
    aliases: &["n", "more"],
    description: "Load the next page",
    action: Action::Next,
  },
  Command {
    name: "refresh",
    aliases: &["r", "reload"],
    description: "Reload from the first page",
    action: Action::Refresh,
  },
  Command {
    name: "focus",
    aliases: &["f"],
    description: "Simulate the app regaining focus",
    action: Action::Focus,
  },
  Command {
    name: "reconnect",
    aliases: &["online"],
    description: "Simulate the network coming back",
    action: Action::Reconnect,
  },
  Command {
    name: "search",
    aliases: &["s", "filter", "/"],
    description: "Filter loaded posts by title",
    action: Action::Search,
  },
  Command {
    name: "help",
    aliases: &["h", "?"],
    description: "List commands",
    action: Action::Help,
  },
  Command {
    name: "quit",
    aliases: &["q", "exit"],
    description: "Exit coursehub",
    action: Action::Quit,
  },
];

/// Get autocomplete suggestions for a given input
pub fn get_suggestions(input: &str) -> Vec<&'static Command> {
  let input_lower = input.to_lowercase();

  if input_lower.is_empty() {
    return COMMANDS.iter().collect();
  }

  let mut matches: Vec<(&Command, u32)> = Vec::new();

  for cmd in COMMANDS {
    // Exact match on name
    if cmd.name == input_lower {
      matches.push((cmd, 0));
      continue;
    }

    if cmd.aliases.contains(&input_lower.as_str()) {
      matches.push((cmd, 1));
      continue;
    }

    if cmd.name.starts_with(&input_lower) {
      matches.push((cmd, 2));
      continue;
    }

    if cmd.aliases.iter().any(|a| a.starts_with(&input_lower)) {
      matches.push((cmd, 3));
      continue;
    }

    // Fuzzy match (contains)
    if cmd.name.contains(&input_lower) {
      matches.push((cmd, 4));
    }
  }

  matches.sort_by_key(|(_, priority)| *priority);

  matches.into_iter().map(|(cmd, _)| cmd).collect()
}

/// Split a prompt line into the best matching command and its argument.
///
/// A line matches when its first word resolves to exactly one command, or
/// when one candidate is an exact name or alias hit.
pub fn parse(line: &str) -> Option<(&'static Command, &str)> {
  let line = line.trim();
  let (word, rest) = match line.split_once(char::is_whitespace) {
    Some((word, rest)) => (word, rest.trim()),
    None => (line, ""),
  };
  if word.is_empty() {
    return None;
  }

  let suggestions = get_suggestions(word);
  let first = *suggestions.first()?;
  let word = word.to_lowercase();
  let exact = first.name == word || first.aliases.contains(&word.as_str());
  (exact || suggestions.len() == 1).then_some((first, rest))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_empty_input_returns_all() {
    let suggestions = get_suggestions("");
    assert_eq!(suggestions.len(), COMMANDS.len());
  }

  #[test]
  fn test_alias_match() {
    let suggestions = get_suggestions("n");
    assert_eq!(suggestions[0].name, "next");
  }

  #[test]
  fn test_prefix_match() {
    let suggestions = get_suggestions("recon");
    assert_eq!(suggestions[0].name, "reconnect");
  }

  #[test]
  fn test_parse_with_argument() {
    let (cmd, arg) = parse("search  qui est ").unwrap();
    assert_eq!(cmd.action, Action::Search);
    assert_eq!(arg, "qui est");
  }

  #[test]
  fn test_parse_ambiguous_prefix() {
    // "re" could be refresh or reconnect
    assert!(parse("re").is_none());
    assert_eq!(parse("ref").unwrap().0.action, Action::Refresh);
    assert!(parse("   ").is_none());
  }
}
