//! Built-in search playbooks.

use crate::perception::types::Selector;
use crate::playbook::types::{Playbook, PlaybookAction, PlaybookStep};

pub const SEARCH_HOME: &str = "https://www.google.com";
pub const SEARCH_BOX: &str = "textarea[name='q']";
pub const RESULTS: &str = "#search";
const RESULTS_TIMEOUT_MS: u64 = 15_000;

/// The `rank`-th organic result link (1-based).
pub fn result_link(rank: usize) -> Selector {
    Selector::xpath(format!("(//*[@id='search']//a[h3])[{rank}]"))
}

fn search_steps(query: &str) -> Vec<PlaybookStep> {
    let search_box = Selector::css(SEARCH_BOX);
    vec![
        PlaybookStep::new(
            "goto_search",
            PlaybookAction::Navigate {
                url: SEARCH_HOME.to_string(),
            },
        )
        .confirm(search_box.clone()),
        PlaybookStep::new(
            "focus_search",
            PlaybookAction::Click {
                selector: search_box.clone(),
            },
        ),
        PlaybookStep::new(
            "type_query",
            PlaybookAction::Fill {
                selector: search_box,
                text: query.to_string(),
            },
        ),
        PlaybookStep::new(
            "submit_query",
            PlaybookAction::PressKey {
                key: "Enter".to_string(),
            },
        ),
        PlaybookStep::new(
            "wait_results",
            PlaybookAction::WaitFor {
                selector: Selector::css(RESULTS),
                timeout_ms: RESULTS_TIMEOUT_MS,
            },
        ),
    ]
}

/// Search for `query` and open the first result.
pub fn build_lookup_playbook(query: &str) -> Playbook {
    let mut steps = search_steps(query);
    steps.push(
        PlaybookStep::new(
            "open_first_result",
            PlaybookAction::Click {
                selector: result_link(1),
            },
        )
        .confirm(Selector::document_root()),
    );
    Playbook {
        name: format!("lookup:{query}"),
        description: "Search for business info and open the first result".to_string(),
        steps,
    }
}

/// Search for `query`, then open, capture and leave each of the first
/// `result_count` results in turn.
pub fn build_research_playbook(query: &str, result_count: usize) -> Playbook {
    let mut steps = search_steps(query);
    for rank in 1..=result_count {
        steps.push(
            PlaybookStep::new(
                format!("open_result_{rank}"),
                PlaybookAction::Click {
                    selector: result_link(rank),
                },
            )
            .confirm(Selector::document_root()),
        );
        steps.push(PlaybookStep::new(
            format!("capture_result_{rank}"),
            PlaybookAction::Screenshot {
                name: format!("research_result_{rank}"),
            },
        ));
        steps.push(
            PlaybookStep::new(format!("back_{rank}"), PlaybookAction::Back)
                .confirm(Selector::css(RESULTS)),
        );
    }
    Playbook {
        name: format!("research:{query}"),
        description: "Open multiple search results and capture screenshots".to_string(),
        steps,
    }
}
