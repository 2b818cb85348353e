//! Prompt construction for the worker classifier.

use std::fmt::Write as _;

use super::ClassificationRequest;

/// System prompt describing the verdict contract to the model.
pub const SYSTEM_PROMPT: &str = r#"You are an autonomous orchestration monitor analyzing AI coding agent activity.

Analyze the terminal output and determine:

1. Status (choose one):
   - working: agent is actively coding, thinking, or making progress
   - stuck: agent is waiting for approval or user input
   - waiting: agent is waiting for an external process (build, tests, etc.)
   - complete: agent has finished and marked itself complete
   - confused: agent is lost or asking questions it shouldn't
   - error: agent encountered an error

2. Action (choose one):
   - approve: send approval (Y, Enter, 2, etc.) to continue
   - send_keys: send specific keystrokes (put them in "keys")
   - intervene: human intervention needed
   - none: let the agent continue working

3. Keys (required for send_keys, optional for approve):
   use tmux key notation, e.g. "Y", "C-m" for Enter, "C-c" for Ctrl-C.

4. Reasoning: brief explanation (1-2 sentences).

5. Confidence: integer 0-100.

Respond ONLY with valid JSON:
{
  "status": "working|stuck|waiting|complete|confused|error",
  "action": "approve|send_keys|intervene|none",
  "keys": "optional keys to send",
  "reasoning": "brief explanation",
  "confidence": 85
}"#;

/// Render the user message for one classification request.
#[must_use]
pub fn build_user_prompt(request: &ClassificationRequest) -> String {
    let mut prompt = String::new();
    let _ = writeln!(prompt, "Worker ID: {}", request.worker_id);

    if let Some(task) = &request.task_excerpt {
        let _ = writeln!(prompt, "Worker's assigned task: {task}");
    }
    if let Some(event) = &request.last_event {
        let _ = writeln!(prompt, "Last logged event: {event}");
    }

    let _ = writeln!(
        prompt,
        "Terminal output (last {} lines):",
        request.snapshot.lines().count()
    );
    prompt.push_str("```\n");
    prompt.push_str(request.snapshot.trim_end());
    prompt.push_str("\n```");
    prompt
}
