use inquire::*;
use saturn::prelude::*;

use crate::args::*;

fn prompt_error(what: &str) -> impl FnOnce(InquireError) -> SaturnError + '_ {
    move |err| SaturnError::Message(format!("failed to read {what}: {err}"))
}

pub fn prompt_query(initial: Option<&str>) -> Result<String> {
    let query = Text::new("search:")
        .with_help_message("anime title, or part of it")
        .with_initial_value(initial.unwrap_or_default())
        .prompt()
        .map_err(prompt_error("search query"))?;

    Ok(query)
}

/// lets the user pick one of `results`; returns its index.
pub fn select_anime(results: &[SearchResult]) -> Result<usize> {
    let titles: Vec<&str> = results.iter().map(|r| r.title.as_str()).collect();
    let choice = Select::new("anime:", titles)
        .with_page_size(15)
        .with_starting_cursor(0)
        .raw_prompt()
        .map_err(prompt_error("anime"))?;

    Ok(choice.index)
}

pub fn prompt_episodes(available: usize, initial: Option<EpisodeRange>) -> Result<EpisodeRange> {
    let initial = initial
        .map(|range| range.to_string())
        .unwrap_or_else(|| "1".to_string());

    let input = Text::new("episodes:")
        .with_help_message(&format!(
            "a number (e.g. 3), a range (e.g. 1-{available}) or all; {available} available"
        ))
        .with_initial_value(&initial)
        .prompt()
        .map_err(prompt_error("episodes"))?;

    input
        .parse::<EpisodeRange>()
        .map_err(|err| SaturnError::Validation(format!("invalid episode range {input}: {err}")))
}

pub fn confirm(message: &str, default: bool) -> Result<bool> {
    Confirm::new(message)
        .with_default(default)
        .prompt()
        .map_err(prompt_error("confirmation"))
}
