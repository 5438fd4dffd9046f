use std::collections::VecDeque;
use std::io::{self, BufReader, Cursor, Read};
use std::sync::Arc;
use std::time::{Duration, Instant};

use acaceta::{run_ask, run_repl, AskScope};
use answer_provider::AnswerProvider;
use answer_provider_mock::{MockProvider, MockStep};
use pretty_assertions::assert_eq;
use serde_json::json;

fn fast(steps: Vec<MockStep>) -> Arc<MockProvider> {
    Arc::new(MockProvider::new(steps).with_token_delay(Duration::ZERO))
}

fn warranty_steps() -> Vec<MockStep> {
    vec![
        MockStep::Content("The warranty period is 2 years.".to_string()),
        MockStep::Citations(vec![json!({
            "title": "Owner's Manual",
            "preview": "...2 years from purchase...",
            "pages": [4]
        })]),
    ]
}

/// Input whose lines arrive after a pause, like a user typing.
struct TypedLines {
    lines: VecDeque<(Duration, Vec<u8>)>,
}

impl TypedLines {
    fn new(lines: &[(u64, &str)]) -> BufReader<Self> {
        BufReader::new(Self {
            lines: lines
                .iter()
                .map(|(delay_ms, line)| {
                    (
                        Duration::from_millis(*delay_ms),
                        format!("{line}\n").into_bytes(),
                    )
                })
                .collect(),
        })
    }
}

impl Read for TypedLines {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let Some((delay, mut line)) = self.lines.pop_front() else {
            return Ok(0);
        };
        std::thread::sleep(delay);

        let len = line.len().min(buf.len());
        buf[..len].copy_from_slice(&line[..len]);
        if len < line.len() {
            self.lines.push_front((Duration::ZERO, line.split_off(len)));
        }
        Ok(len)
    }
}

fn scope() -> AskScope {
    AskScope {
        indices: vec!["manuals".to_string()],
        filter_dimensions: json!({"brand": ["Acme"]}),
    }
}

#[test]
fn ask_prints_answer_then_sources() {
    let provider = fast(warranty_steps());
    let mut out = Vec::new();

    let message = run_ask(
        provider.clone(),
        "c1",
        "What is the warranty period?",
        &scope(),
        &mut out,
    )
    .expect("ask should finish");

    assert_eq!(message.content, "The warranty period is 2 years.");
    assert!(!message.is_streaming);
    assert!(!message.is_error);
    assert_eq!(message.cited_sections.len(), 1);

    let printed = String::from_utf8(out).expect("utf8 output");
    assert_eq!(
        printed,
        "The warranty period is 2 years.\n\nSources:\n  [1] Owner's Manual (p. 4)\n      ...2 years from purchase...\n"
    );

    let requests = provider.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].chat_id, "c1");
    assert_eq!(requests[0].query, "What is the warranty period?");
    assert_eq!(requests[0].indices, vec!["manuals".to_string()]);
    assert_eq!(requests[0].filter_dimensions, json!({"brand": ["Acme"]}));
}

#[test]
fn ask_reports_failure_with_retry_hint() {
    let provider = fast(vec![MockStep::Fail("Index unavailable".to_string())]);
    let mut out = Vec::new();

    let message = run_ask(provider, "c1", "Anything?", &AskScope::default(), &mut out)
        .expect("ask should settle");

    assert!(message.is_error);
    assert!(message.can_retry());
    assert_eq!(message.content, "Index unavailable");
    assert_eq!(
        String::from_utf8(out).expect("utf8 output"),
        "[error] Index unavailable (type /retry to ask again)\n"
    );
}

#[test]
fn ask_rejects_blank_question() {
    let provider = fast(warranty_steps());
    let mut out = Vec::new();

    let result = run_ask(provider.clone(), "c1", "   ", &AskScope::default(), &mut out);

    assert!(result.is_err());
    assert!(provider.requests().is_empty());
}

#[test]
fn repl_answers_questions_and_handles_commands() {
    let provider = fast(warranty_steps());
    let input = Cursor::new(
        "/retry\n/cancel\n/bogus\n\nWhat is the warranty period?\n"
            .as_bytes()
            .to_vec(),
    );
    let mut out = Vec::new();

    run_repl(provider.clone(), "c1", &scope(), input, &mut out).expect("repl should finish");

    let printed = String::from_utf8(out).expect("utf8 output");
    assert!(printed.starts_with("Chat c1. Type /help for commands.\n"));
    assert!(printed.contains("Nothing to retry.\n"));
    assert!(printed.contains("Nothing to cancel.\n"));
    assert!(printed.contains("Unknown command /bogus. Type /help for commands.\n"));
    assert!(printed.contains("The warranty period is 2 years.\n"));
    assert!(printed.contains("[1] Owner's Manual (p. 4)"));
    assert_eq!(provider.requests().len(), 1);
}

#[test]
fn repl_quit_abandons_a_slow_answer() {
    let provider = fast(vec![
        MockStep::Delay(Duration::from_secs(10)),
        MockStep::Content("too late".to_string()),
    ]);
    let input = Cursor::new(b"Slow question\n/quit\nIgnored question\n".to_vec());
    let mut out = Vec::new();
    let started = Instant::now();

    run_repl(provider.clone(), "c1", &scope(), input, &mut out).expect("repl should quit");

    assert!(started.elapsed() < Duration::from_secs(5));
    let printed = String::from_utf8(out).expect("utf8 output");
    assert!(!printed.contains("too late"));
    assert!(provider.requests().len() <= 1);
}

#[test]
fn mock_provider_is_usable_as_trait_object() {
    let provider: Arc<dyn AnswerProvider> = fast(Vec::new());
    assert_eq!(provider.profile().provider_id, "mock");
}

#[test]
fn repl_chat_to_current_chat_keeps_the_answer() {
    let provider = fast(vec![
        MockStep::Delay(Duration::from_millis(300)),
        MockStep::Content("The warranty is 2 years.".to_string()),
    ]);
    let input = Cursor::new(b"What is the warranty period?\n/chat c1\n".to_vec());
    let mut out = Vec::new();

    run_repl(provider.clone(), "c1", &scope(), input, &mut out).expect("repl should finish");

    let printed = String::from_utf8(out).expect("utf8 output");
    assert!(printed.contains("Already in chat c1.\n"));
    assert!(!printed.contains("Switched to chat"));
    assert!(printed.contains("The warranty is 2 years.\n"));
    assert_eq!(provider.requests().len(), 1);
}

#[test]
fn repl_superseded_answer_ends_its_line() {
    let provider = fast(vec![
        MockStep::Content("Partial answer ".to_string()),
        MockStep::Delay(Duration::from_millis(800)),
        MockStep::Content("finished.".to_string()),
    ]);
    let input = TypedLines::new(&[(0, "First question"), (300, "Second question")]);
    let mut out = Vec::new();

    run_repl(provider.clone(), "c1", &scope(), input, &mut out).expect("repl should finish");

    let printed = String::from_utf8(out).expect("utf8 output");
    assert!(
        printed.ends_with("Partial answer \nPartial answer finished.\n"),
        "unexpected output: {printed:?}"
    );
    assert_eq!(provider.requests().len(), 2);
}
