//! Prompt text for the two vision passes.
//!
//! Both prompts pin the reply to a tagged line protocol that
//! [`crate::agent_engine::parser`] understands.

pub fn action_prompt(task: &str) -> String {
    format!(
        "You are a browser automation assistant. Analyze this screenshot and determine the next action.

TASK: {task}

Provide your response in this exact format:
ACTION: [click|type|scroll|navigate|wait]
TARGET: [description of element or URL]
VALUE: [text to type, or N/A]
REASON: [why this action accomplishes the task]
CONFIDENCE: [high|medium|low]

If the task is already complete, respond:
ACTION: complete
REASON: [what was accomplished]"
    )
}

pub fn answer_prompt(question: &str) -> String {
    format!(
        "You are looking at a web page screenshot.
Answer the following question using ONLY visible information:
QUESTION: {question}

If the answer is visible, respond with:
ANSWER: <answer>
CONFIDENCE: <high|medium|low>
EVIDENCE: <brief explanation>

If it is not visible, respond:
ANSWER: NOT_FOUND
CONFIDENCE: low
EVIDENCE: explain why."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_prompt_embeds_task_and_tags() {
        let p = action_prompt("find the weather in Paris");
        assert!(p.contains("TASK: find the weather in Paris"));
        for tag in ["ACTION:", "TARGET:", "VALUE:", "REASON:", "CONFIDENCE:", "ACTION: complete"] {
            assert!(p.contains(tag), "missing {tag}");
        }
    }

    #[test]
    fn answer_prompt_offers_not_found() {
        let p = answer_prompt("What is the phone number?");
        assert!(p.contains("QUESTION: What is the phone number?"));
        assert!(p.contains("ANSWER: NOT_FOUND"));
    }
}
