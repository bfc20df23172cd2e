use crate::ui::command::parser::VERBS;

/// Build the `help` overview from the verb table.
pub fn help_overview() -> String {
    let width = VERBS
        .iter()
        .map(|(long, short, _)| long.len() + short.map(|s| s.len() + 1).unwrap_or(0))
        .max()
        .unwrap_or(0);

    let mut out = String::from("Commands\n");
    for (long, short, summary) in VERBS {
        let name = match short {
            Some(short) => format!("{long}|{short}"),
            None => long.to_string(),
        };
        out.push_str(&format!("  {name:<width$}  {summary}\n"));
    }
    out.push_str(
        "\nAn empty line repeats the last command.\n\
         Input that is not a command is evaluated in the target.\n\
         quit or ctrl-d leaves the debugger.\n",
    );
    out
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_overview_mentions_every_verb() {
        let help = help_overview();
        for (long, _, _) in VERBS {
            assert!(help.contains(long), "help misses `{long}`");
        }
    }
}
